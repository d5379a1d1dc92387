use citesync_core::CatalogError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HarvestError {
    /// Transport failure, non-success status or unparseable body from a metadata endpoint.
    #[error("metadata source {url}: {message}")]
    MetadataSource { url: String, message: String },

    /// The record cannot become a paper (missing authors, title, DOI or date).
    #[error("invalid record: {0}")]
    InvalidRecord(String),

    #[error("invalid DOI: {0}")]
    InvalidDoi(String),

    #[error("invalid ORCID: {0}")]
    InvalidOrcid(String),

    #[error("identifier lists differ in length: expected {expected}, found {found}")]
    IdentityMismatch { expected: usize, found: usize },

    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),
}

impl HarvestError {
    pub(crate) fn metadata_source(url: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::MetadataSource {
            url: url.into(),
            message: message.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, HarvestError>;
