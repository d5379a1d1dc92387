pub mod config;
pub mod error;
pub mod models;
pub mod storage;

pub use config::{AppConfig, CatalogConfig, LoggingConfig};
pub use error::{CatalogError, ExitCode, Result};
pub use models::*;

pub use storage::catalog::Catalog;
pub use storage::database::{ConnectionPool, SqliteCatalog};
pub use storage::repositories::{
    JournalRepository, PaperRepository, PublicationRepository, Repository,
    SqliteJournalRepository, SqlitePaperRepository, SqlitePublicationRepository,
};
