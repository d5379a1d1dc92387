use uuid::Uuid;

use crate::error::Result;
use crate::models::{Journal, Paper, PaperAuthor, Publication, Publisher};

/// The persistent paper/publication/journal/publisher store consumed by the
/// ingestion pipeline.
///
/// Implementations must reject a second paper with an existing fingerprint and
/// a second publication with an existing DOI with [`CatalogError::Conflict`],
/// and values that do not fit the schema with [`CatalogError::DataFormat`].
///
/// [`CatalogError::Conflict`]: crate::error::CatalogError::Conflict
/// [`CatalogError::DataFormat`]: crate::error::CatalogError::DataFormat
pub trait Catalog: Send + Sync {
    fn find_paper_by_fingerprint(&self, fingerprint: &str) -> Result<Option<Paper>>;
    fn get_paper(&self, id: &Uuid) -> Result<Option<Paper>>;
    fn create_paper(&self, paper: &Paper) -> Result<()>;
    fn update_paper_authors(&self, id: &Uuid, authors: &[PaperAuthor]) -> Result<()>;

    fn find_publication_by_doi(&self, doi: &str) -> Result<Option<Publication>>;
    fn create_publication(&self, publication: &Publication) -> Result<()>;
    fn update_publication(&self, publication: &Publication) -> Result<()>;
    fn publications_for_paper(&self, paper_id: &Uuid) -> Result<Vec<Publication>>;

    /// Looks a journal up by title, narrowed by ISSN when one is given.
    fn find_journal(&self, title: &str, issn: Option<&str>) -> Result<Option<Journal>>;
    fn register_journal(&self, journal: &Journal) -> Result<()>;
    fn find_or_create_publisher(&self, name: &str) -> Result<Publisher>;
    fn get_publisher(&self, id: &Uuid) -> Result<Option<Publisher>>;
    /// Records that `name` was observed for the canonical `publisher`.
    fn increment_publisher_alias(&self, name: &str, publisher: &Publisher) -> Result<u32>;

    /// Re-derives the paper's full-text availability from its publications.
    fn recompute_paper_availability(&self, paper_id: &Uuid) -> Result<Paper>;
    /// Re-derives visibility: hidden unless at least one publication is attached.
    fn update_paper_visibility(&self, paper_id: &Uuid) -> Result<Paper>;
}
