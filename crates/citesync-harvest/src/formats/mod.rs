pub mod citeproc;
pub mod license;

pub use citeproc::{CitationAuthor, CitationRecord, NamePair, RawRecord, parse_record};
pub use license::is_open_access_license;
