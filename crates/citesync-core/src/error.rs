use thiserror::Error;

/// All errors that can occur in citesync-core.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Paper not found: {0}")]
    PaperNotFound(String),

    #[error("Publication not found: {0}")]
    PublicationNotFound(String),

    /// A write collided with a uniqueness constraint (fingerprint, DOI, name).
    #[error("Conflict: {0}")]
    Conflict(String),

    /// A value does not fit the storage schema (oversized field, missing column value).
    #[error("Data format violation: {0}")]
    DataFormat(String),

    #[error("Migration error at version {version}: {message}")]
    Migration { version: u32, message: String },

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(rusqlite::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl CatalogError {
    /// Conflicts and data-format violations are the storage-side failures
    /// callers are expected to absorb rather than propagate.
    pub fn is_persistence_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_) | Self::DataFormat(_))
    }
}

impl From<rusqlite::Error> for CatalogError {
    fn from(e: rusqlite::Error) -> Self {
        use rusqlite::ffi;

        match &e {
            rusqlite::Error::SqliteFailure(err, msg)
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                let detail = msg.clone().unwrap_or_else(|| err.to_string());
                match err.extended_code {
                    ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
                        CatalogError::Conflict(detail)
                    }
                    _ => CatalogError::DataFormat(detail),
                }
            }
            _ => CatalogError::Database(e),
        }
    }
}

/// Exit codes used by the CLI.
#[repr(i32)]
pub enum ExitCode {
    Success = 0,
    GeneralError = 1,
    NotFound = 2,
    InvalidArgs = 3,
    NetworkError = 6,
    Conflict = 7,
}

pub type Result<T> = std::result::Result<T, CatalogError>;
