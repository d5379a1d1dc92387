pub mod doi;
pub mod orcid;

pub use doi::{Doi, to_doi};
pub use orcid::{Orcid, validate_orcid};
