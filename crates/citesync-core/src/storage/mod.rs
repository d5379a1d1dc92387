pub mod catalog;
pub mod database;
pub mod repositories;

pub use catalog::Catalog;
pub use database::SqliteCatalog;
