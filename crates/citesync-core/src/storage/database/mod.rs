mod connection;
mod migrations;
mod schema;

pub use connection::ConnectionPool;
pub use migrations::{Migration, get_applied_versions, run_migrations};
pub use schema::{MAX_LOCATOR_LEN, MAX_NAME_LEN, MAX_PAPER_TITLE_LEN, SCHEMA_VERSION};

use std::path::Path;

use uuid::Uuid;

use crate::error::{CatalogError, Result};
use crate::models::{Journal, OaStatus, Paper, PaperAuthor, Publication, Publisher};
use crate::storage::catalog::Catalog;
use crate::storage::repositories::{
    JournalRepository, PaperRepository, PublicationRepository, Repository,
    SqliteJournalRepository, SqlitePaperRepository, SqlitePublicationRepository,
};

/// SQLite-backed [`Catalog`].
pub struct SqliteCatalog {
    pool: ConnectionPool,
}

impl SqliteCatalog {
    pub fn open(path: &Path) -> Result<Self> {
        let pool = ConnectionPool::open(path)?;
        tracing::debug!(path = %path.display(), "opened catalog");
        Ok(Self { pool })
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self {
            pool: ConnectionPool::open_in_memory()?,
        })
    }

    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    pub fn count_papers(&self) -> Result<usize> {
        let conn = self.pool.get_connection();
        SqlitePaperRepository::new(&conn).count()
    }

    pub fn count_publications(&self) -> Result<usize> {
        let conn = self.pool.get_connection();
        SqlitePublicationRepository::new(&conn).count()
    }

    fn require_paper(repo: &SqlitePaperRepository<'_>, id: &Uuid) -> Result<Paper> {
        repo.find_by_id(id)?
            .ok_or_else(|| CatalogError::PaperNotFound(id.to_string()))
    }
}

impl Catalog for SqliteCatalog {
    fn find_paper_by_fingerprint(&self, fingerprint: &str) -> Result<Option<Paper>> {
        let conn = self.pool.get_connection();
        SqlitePaperRepository::new(&conn).find_by_fingerprint(fingerprint)
    }

    fn get_paper(&self, id: &Uuid) -> Result<Option<Paper>> {
        let conn = self.pool.get_connection();
        SqlitePaperRepository::new(&conn).find_by_id(id)
    }

    fn create_paper(&self, paper: &Paper) -> Result<()> {
        let conn = self.pool.get_connection();
        SqlitePaperRepository::new(&conn).insert(paper)
    }

    fn update_paper_authors(&self, id: &Uuid, authors: &[PaperAuthor]) -> Result<()> {
        let conn = self.pool.get_connection();
        SqlitePaperRepository::new(&conn).update_authors(id, authors)
    }

    fn find_publication_by_doi(&self, doi: &str) -> Result<Option<Publication>> {
        let conn = self.pool.get_connection();
        SqlitePublicationRepository::new(&conn).find_by_doi(doi)
    }

    fn create_publication(&self, publication: &Publication) -> Result<()> {
        let conn = self.pool.get_connection();
        SqlitePublicationRepository::new(&conn).insert(publication)
    }

    fn update_publication(&self, publication: &Publication) -> Result<()> {
        let conn = self.pool.get_connection();
        SqlitePublicationRepository::new(&conn).update(publication)
    }

    fn publications_for_paper(&self, paper_id: &Uuid) -> Result<Vec<Publication>> {
        let conn = self.pool.get_connection();
        SqlitePublicationRepository::new(&conn).list_for_paper(paper_id)
    }

    fn find_journal(&self, title: &str, issn: Option<&str>) -> Result<Option<Journal>> {
        let conn = self.pool.get_connection();
        SqliteJournalRepository::new(&conn).find_journal(title, issn)
    }

    fn register_journal(&self, journal: &Journal) -> Result<()> {
        let conn = self.pool.get_connection();
        SqliteJournalRepository::new(&conn).insert_journal(journal)
    }

    fn find_or_create_publisher(&self, name: &str) -> Result<Publisher> {
        let conn = self.pool.get_connection();
        let repo = SqliteJournalRepository::new(&conn);
        if let Some(existing) = repo.find_publisher_by_name(name)? {
            return Ok(existing);
        }
        let publisher = Publisher::new(name);
        match repo.insert_publisher(&publisher) {
            Ok(()) => Ok(publisher),
            Err(CatalogError::Conflict(_)) => repo
                .find_publisher_by_name(name)?
                .ok_or_else(|| CatalogError::Conflict(format!("publisher {name}"))),
            Err(e) => Err(e),
        }
    }

    fn get_publisher(&self, id: &Uuid) -> Result<Option<Publisher>> {
        let conn = self.pool.get_connection();
        SqliteJournalRepository::new(&conn).find_publisher_by_id(id)
    }

    fn increment_publisher_alias(&self, name: &str, publisher: &Publisher) -> Result<u32> {
        let conn = self.pool.get_connection();
        SqliteJournalRepository::new(&conn).increment_alias(name, &publisher.id)
    }

    fn recompute_paper_availability(&self, paper_id: &Uuid) -> Result<Paper> {
        let conn = self.pool.get_connection();
        let papers = SqlitePaperRepository::new(&conn);
        let publications = SqlitePublicationRepository::new(&conn).list_for_paper(paper_id)?;

        let pdf_url = publications
            .iter()
            .find(|p| p.has_full_text())
            .and_then(|p| p.pdf_url.clone());
        let status = OaStatus::from_pdf_url(pdf_url.as_deref());

        papers.set_availability(paper_id, pdf_url.as_deref(), status)?;
        Self::require_paper(&papers, paper_id)
    }

    fn update_paper_visibility(&self, paper_id: &Uuid) -> Result<Paper> {
        let conn = self.pool.get_connection();
        let papers = SqlitePaperRepository::new(&conn);
        let attached = SqlitePublicationRepository::new(&conn).list_for_paper(paper_id)?;

        papers.set_visible(paper_id, !attached.is_empty())?;
        Self::require_paper(&papers, paper_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AuthorName;
    use chrono::NaiveDate;

    fn sample_paper(fingerprint: &str) -> Paper {
        Paper::new(
            fingerprint,
            "Deep learning",
            vec![PaperAuthor::new(AuthorName::new("Yann", "LeCun"))],
            NaiveDate::from_ymd_opt(2015, 5, 28).unwrap(),
        )
    }

    fn sample_publication(paper: &Paper, doi: &str) -> Publication {
        let mut publication =
            Publication::new(paper.id, "Nature", format!("oai:crossref.org:{doi}"));
        publication.doi = Some(doi.to_string());
        publication
    }

    #[test]
    fn migrations_are_recorded() {
        let catalog = SqliteCatalog::open_in_memory().unwrap();
        let conn = catalog.pool().get_connection();
        assert_eq!(get_applied_versions(&conn).unwrap(), vec![SCHEMA_VERSION]);
        run_migrations(&conn).unwrap();
        assert_eq!(get_applied_versions(&conn).unwrap(), vec![SCHEMA_VERSION]);
    }

    #[test]
    fn reopening_a_file_keeps_rows() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("nested").join("catalog.db");
        {
            let catalog = SqliteCatalog::open(&path).unwrap();
            assert_eq!(catalog.pool().location(), Some(path.as_path()));
            catalog.create_paper(&sample_paper("fp")).unwrap();
        }
        let catalog = SqliteCatalog::open(&path).unwrap();
        assert_eq!(catalog.count_papers().unwrap(), 1);
    }

    #[test]
    fn paper_roundtrip_by_fingerprint() {
        let catalog = SqliteCatalog::open_in_memory().unwrap();
        let paper = sample_paper("deep-learning/lecun-2015");
        catalog.create_paper(&paper).unwrap();

        let found = catalog
            .find_paper_by_fingerprint("deep-learning/lecun-2015")
            .unwrap()
            .unwrap();
        assert_eq!(found.id, paper.id);
        assert_eq!(found.authors, paper.authors);
        assert_eq!(found.pubdate, paper.pubdate);
        assert!(catalog.find_paper_by_fingerprint("other").unwrap().is_none());
    }

    #[test]
    fn duplicate_fingerprint_is_conflict() {
        let catalog = SqliteCatalog::open_in_memory().unwrap();
        catalog.create_paper(&sample_paper("fp")).unwrap();
        let err = catalog.create_paper(&sample_paper("fp")).unwrap_err();
        assert!(matches!(err, CatalogError::Conflict(_)), "{err:?}");
        assert_eq!(catalog.count_papers().unwrap(), 1);
    }

    #[test]
    fn duplicate_doi_is_conflict() {
        let catalog = SqliteCatalog::open_in_memory().unwrap();
        let paper = sample_paper("fp");
        catalog.create_paper(&paper).unwrap();
        catalog
            .create_publication(&sample_publication(&paper, "10.1/abc"))
            .unwrap();

        let err = catalog
            .create_publication(&sample_publication(&paper, "10.1/abc"))
            .unwrap_err();
        assert!(err.is_persistence_conflict());
        assert_eq!(catalog.count_publications().unwrap(), 1);
    }

    #[test]
    fn oversized_locator_is_data_format() {
        let catalog = SqliteCatalog::open_in_memory().unwrap();
        let paper = sample_paper("fp");
        catalog.create_paper(&paper).unwrap();

        let mut publication = sample_publication(&paper, "10.1/abc");
        publication.pages = Some("1".repeat(MAX_LOCATOR_LEN + 1));
        let err = catalog.create_publication(&publication).unwrap_err();
        assert!(matches!(err, CatalogError::DataFormat(_)), "{err:?}");
    }

    #[test]
    fn publisher_alias_counts_up() {
        let catalog = SqliteCatalog::open_in_memory().unwrap();
        let publisher = catalog.find_or_create_publisher("Springer").unwrap();
        let again = catalog.find_or_create_publisher("Springer").unwrap();
        assert_eq!(publisher.id, again.id);

        assert_eq!(
            catalog
                .increment_publisher_alias("Springer Nature", &publisher)
                .unwrap(),
            1
        );
        assert_eq!(
            catalog
                .increment_publisher_alias("Springer Nature", &publisher)
                .unwrap(),
            2
        );
    }

    #[test]
    fn journal_lookup_prefers_issn_then_title() {
        let catalog = SqliteCatalog::open_in_memory().unwrap();
        let journal = Journal::new("Nature", Some("0028-0836".into()), None);
        catalog.register_journal(&journal).unwrap();

        let by_issn = catalog.find_journal("Whatever", Some("0028-0836")).unwrap();
        assert_eq!(by_issn.map(|j| j.id), Some(journal.id));

        let by_title = catalog.find_journal("nature", None).unwrap();
        assert_eq!(by_title.map(|j| j.id), Some(journal.id));

        assert!(catalog.find_journal("Science", None).unwrap().is_none());
    }

    #[test]
    fn availability_follows_publications() {
        let catalog = SqliteCatalog::open_in_memory().unwrap();
        let paper = sample_paper("fp");
        catalog.create_paper(&paper).unwrap();

        let mut publication = sample_publication(&paper, "10.1/abc");
        catalog.create_publication(&publication).unwrap();
        let refreshed = catalog.recompute_paper_availability(&paper.id).unwrap();
        assert_eq!(refreshed.oa_status, OaStatus::Closed);
        assert!(refreshed.pdf_url.is_none());

        publication.pdf_url = Some("https://doi.org/10.1/abc".into());
        catalog.update_publication(&publication).unwrap();
        let refreshed = catalog.recompute_paper_availability(&paper.id).unwrap();
        assert_eq!(refreshed.oa_status, OaStatus::Open);
        assert_eq!(refreshed.pdf_url.as_deref(), Some("https://doi.org/10.1/abc"));
    }

    #[test]
    fn visibility_requires_a_publication() {
        let catalog = SqliteCatalog::open_in_memory().unwrap();
        let paper = sample_paper("fp");
        catalog.create_paper(&paper).unwrap();
        assert!(!catalog.update_paper_visibility(&paper.id).unwrap().visible);

        catalog
            .create_publication(&sample_publication(&paper, "10.1/abc"))
            .unwrap();
        assert!(catalog.update_paper_visibility(&paper.id).unwrap().visible);
    }

    #[test]
    fn unknown_paper_is_not_found() {
        let catalog = SqliteCatalog::open_in_memory().unwrap();
        let err = catalog.update_paper_visibility(&Uuid::now_v7()).unwrap_err();
        assert!(matches!(err, CatalogError::PaperNotFound(_)));
    }
}
