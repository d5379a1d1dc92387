pub mod journal;
pub mod open_access;
pub mod paper;
pub mod publication;

pub use journal::{Journal, Publisher};
pub use open_access::OaStatus;
pub use paper::{AuthorName, Paper, PaperAuthor};
pub use publication::{Publication, PublicationType};
