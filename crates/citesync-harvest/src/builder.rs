use std::sync::Arc;

use chrono::Datelike;
use citesync_core::models::{AuthorName, Journal, Paper, PaperAuthor, Publication, Publisher};
use citesync_core::{Catalog, CatalogError};
use serde::Serialize;

use crate::error::Result;
use crate::formats::CitationRecord;
use crate::identifiers::Orcid;
use crate::identity::{merge_authors, merge_orcids};
use crate::names::{folded_words, surname_key};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SaveStatus {
    /// A new paper was created for this record.
    Created,
    /// The record matched an existing paper by fingerprint.
    Attached,
    /// A publication with this DOI was already stored; nothing changed.
    AlreadyPresent,
}

#[derive(Debug, Clone, Serialize)]
pub struct SaveOutcome {
    pub paper: Paper,
    /// `None` when the record had no container title or the catalog refused the row.
    pub publication: Option<Publication>,
    pub status: SaveStatus,
}

/// Dedup key of a paper: normalized title words, sorted normalized
/// surnames and the year, e.g. `deep-learning/bengio/hinton/lecun-2015`.
pub fn paper_fingerprint(title: &str, authors: &[AuthorName], year: i32) -> String {
    let mut surnames: Vec<String> = authors
        .iter()
        .map(|a| surname_key(&a.last))
        .filter(|k| !k.is_empty())
        .collect();
    surnames.sort();

    let mut fingerprint = folded_words(title).join("-");
    for surname in surnames {
        fingerprint.push('/');
        fingerprint.push_str(&surname);
    }
    fingerprint.push('-');
    fingerprint.push_str(&year.to_string());
    fingerprint
}

/// Turns validated records into papers and publications without ever
/// duplicating either.
pub struct PaperBuilder {
    catalog: Arc<dyn Catalog>,
}

impl PaperBuilder {
    pub fn new(catalog: Arc<dyn Catalog>) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &Arc<dyn Catalog> {
        &self.catalog
    }

    pub fn save_record(
        &self,
        record: &CitationRecord,
        extra_orcids: Option<&[Option<Orcid>]>,
    ) -> Result<SaveOutcome> {
        if let Some(outcome) = self.already_present(record)? {
            tracing::debug!(doi = %record.doi, paper = %outcome.paper.id, "DOI already stored");
            return Ok(outcome);
        }

        let orcids = merge_orcids(extra_orcids, record.orcids())?;
        let authors: Vec<PaperAuthor> = record
            .authors
            .iter()
            .zip(orcids)
            .map(|(author, orcid)| PaperAuthor {
                name: author.name.clone(),
                affiliation: author.affiliation.clone(),
                orcid: orcid.map(String::from),
            })
            .collect();

        let (paper, status) = self.find_or_create_paper(record, authors)?;

        let paper_id = paper.id;
        let publication = match self.create_publication(&paper, record) {
            Ok(publication) => publication,
            Err(CatalogError::Conflict(reason)) => {
                if let Some(outcome) = self.already_present(record)? {
                    tracing::debug!(doi = %record.doi, %reason, "publication stored concurrently");
                    return Ok(outcome);
                }
                tracing::warn!(doi = %record.doi, %reason, "publication not created");
                None
            }
            Err(e) if e.is_persistence_conflict() => {
                tracing::warn!(doi = %record.doi, error = %e, "publication not created");
                None
            }
            Err(e) => return Err(e.into()),
        };

        if publication.is_some() {
            self.catalog.recompute_paper_availability(&paper_id)?;
        }
        let paper = self.catalog.update_paper_visibility(&paper_id)?;

        Ok(SaveOutcome {
            paper,
            publication,
            status,
        })
    }

    /// The stored publication for the record's DOI and its paper, if any.
    fn already_present(&self, record: &CitationRecord) -> Result<Option<SaveOutcome>> {
        let Some(publication) = self.catalog.find_publication_by_doi(record.doi.as_str())? else {
            return Ok(None);
        };
        let paper = self
            .catalog
            .get_paper(&publication.paper_id)?
            .ok_or_else(|| CatalogError::PaperNotFound(publication.paper_id.to_string()))?;
        Ok(Some(SaveOutcome {
            paper,
            publication: Some(publication),
            status: SaveStatus::AlreadyPresent,
        }))
    }

    fn find_or_create_paper(
        &self,
        record: &CitationRecord,
        authors: Vec<PaperAuthor>,
    ) -> Result<(Paper, SaveStatus)> {
        let names: Vec<AuthorName> = authors.iter().map(|a| a.name.clone()).collect();
        let fingerprint = paper_fingerprint(&record.title, &names, record.pubdate.year());

        if let Some(existing) = self.catalog.find_paper_by_fingerprint(&fingerprint)? {
            return Ok((self.attach(existing, &authors)?, SaveStatus::Attached));
        }

        let paper = Paper::new(fingerprint.clone(), record.title.clone(), authors.clone(), record.pubdate);
        match self.catalog.create_paper(&paper) {
            Ok(()) => {
                tracing::debug!(paper = %paper.id, %fingerprint, "created paper");
                Ok((paper, SaveStatus::Created))
            }
            Err(CatalogError::Conflict(reason)) => {
                tracing::debug!(%fingerprint, %reason, "paper created concurrently, reusing it");
                let existing = self
                    .catalog
                    .find_paper_by_fingerprint(&fingerprint)?
                    .ok_or(CatalogError::Conflict(reason))?;
                Ok((self.attach(existing, &authors)?, SaveStatus::Attached))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn attach(&self, mut paper: Paper, authors: &[PaperAuthor]) -> Result<Paper> {
        if let Some(merged) = merge_authors(&paper.authors, authors) {
            self.catalog.update_paper_authors(&paper.id, &merged)?;
            paper.authors = merged;
        }
        Ok(paper)
    }

    fn create_publication(
        &self,
        paper: &Paper,
        record: &CitationRecord,
    ) -> citesync_core::Result<Option<Publication>> {
        let Some(journal_title) = record.container_title.as_deref() else {
            tracing::debug!(doi = %record.doi, "no container title, publication skipped");
            return Ok(None);
        };

        let (journal, publisher) = self.resolve_venue(journal_title, record)?;

        let mut publication = Publication::new(paper.id, journal_title, record.identifier());
        publication.doi = Some(record.doi.to_string());
        publication.issue = record.issue.clone();
        publication.volume = record.volume.clone();
        publication.pages = record.pages.clone();
        publication.pubdate = record.issued;
        publication.pubtype = record.pubtype.clone();
        publication.publisher_name = record.publisher.clone();
        publication.journal_id = journal.map(|j| j.id);
        publication.publisher_id = publisher.map(|p| p.id);
        publication.pdf_url = record.pdf_url();
        publication.splash_url = Some(record.splash_url());

        self.catalog.create_publication(&publication)?;
        Ok(Some(publication))
    }

    /// Journal by (title, ISSN). A known journal lends its publisher and
    /// counts the raw publisher string as an alias of it; otherwise the
    /// publisher is looked up by name and the journal registered.
    fn resolve_venue(
        &self,
        journal_title: &str,
        record: &CitationRecord,
    ) -> citesync_core::Result<(Option<Journal>, Option<Publisher>)> {
        if let Some(journal) = self.catalog.find_journal(journal_title, record.issn.as_deref())? {
            let publisher = match journal.publisher_id {
                Some(id) => self.catalog.get_publisher(&id)?,
                None => None,
            };
            if let (Some(publisher), Some(name)) = (&publisher, record.publisher.as_deref()) {
                let count = self.catalog.increment_publisher_alias(name, publisher)?;
                tracing::trace!(alias = name, publisher = %publisher.name, count, "publisher alias");
            }
            return Ok((Some(journal), publisher));
        }

        let publisher = match record.publisher.as_deref() {
            Some(name) => Some(self.catalog.find_or_create_publisher(name)?),
            None => None,
        };
        let journal = Journal::new(
            journal_title,
            record.issn.clone(),
            publisher.as_ref().map(|p| p.id),
        );
        self.catalog.register_journal(&journal)?;
        Ok((Some(journal), publisher))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::parse_record;
    use citesync_core::SqliteCatalog;
    use serde_json::{Value, json};
    use std::sync::atomic::{AtomicBool, Ordering};
    use uuid::Uuid;

    fn builder() -> (PaperBuilder, Arc<SqliteCatalog>) {
        let catalog = Arc::new(SqliteCatalog::open_in_memory().unwrap());
        (PaperBuilder::new(catalog.clone()), catalog)
    }

    fn record(doi: &str) -> Value {
        json!({
            "DOI": doi,
            "title": ["Deep learning"],
            "container-title": ["Nature"],
            "ISSN": ["0028-0836"],
            "publisher": "Springer Science and Business Media LLC",
            "type": "journal-article",
            "issued": {"date-parts": [[2015, 5, 28]]},
            "author": [
                {"given": "Yann", "family": "LeCun"},
                {"given": "Yoshua", "family": "Bengio"},
                {"given": "Geoffrey", "family": "Hinton"}
            ]
        })
    }

    fn save(builder: &PaperBuilder, value: &Value) -> SaveOutcome {
        builder.save_record(&parse_record(value).unwrap(), None).unwrap()
    }

    #[test]
    fn fingerprint_shape() {
        let authors = vec![
            AuthorName::new("Yann", "LeCun"),
            AuthorName::new("Yoshua", "Bengio"),
            AuthorName::new("Geoffrey", "Hinton"),
        ];
        assert_eq!(
            paper_fingerprint("Deep  Learning!", &authors, 2015),
            "deep-learning/bengio/hinton/lecun-2015"
        );
    }

    #[test]
    fn minimal_record_creates_paper_and_publication() {
        let (builder, catalog) = builder();
        let outcome = save(
            &builder,
            &json!({
                "title": "X",
                "DOI": "10.1/abc",
                "container-title": "J",
                "issued": {"date-parts": [[2020, 1, 1]]},
                "author": [{"given": "A", "family": "B"}]
            }),
        );
        assert_eq!(outcome.status, SaveStatus::Created);
        assert_eq!(outcome.paper.author_names(), vec!["A B"]);
        assert_eq!(outcome.paper.pubdate.to_string(), "2020-01-01");
        assert!(outcome.paper.visible);
        let publication = outcome.publication.unwrap();
        assert_eq!(publication.doi.as_deref(), Some("10.1/abc"));
        assert_eq!(publication.identifier, "oai:crossref.org:10.1/abc");
        assert_eq!(catalog.count_papers().unwrap(), 1);
    }

    #[test]
    fn second_ingestion_is_a_no_op() {
        let (builder, catalog) = builder();
        let first = save(&builder, &record("10.1038/nature14539"));
        let second = save(&builder, &record("10.1038/NATURE14539"));

        assert_eq!(second.status, SaveStatus::AlreadyPresent);
        assert_eq!(first.paper.id, second.paper.id);
        assert_eq!(catalog.count_papers().unwrap(), 1);
        assert_eq!(catalog.count_publications().unwrap(), 1);
    }

    #[test]
    fn same_fingerprint_two_dois() {
        let (builder, catalog) = builder();
        let first = save(&builder, &record("10.1/one"));
        let second = save(&builder, &record("10.1/two"));

        assert_eq!(second.status, SaveStatus::Attached);
        assert_eq!(first.paper.id, second.paper.id);
        assert_eq!(catalog.count_papers().unwrap(), 1);
        assert_eq!(catalog.publications_for_paper(&first.paper.id).unwrap().len(), 2);
    }

    #[test]
    fn known_journal_counts_publisher_alias() {
        let (builder, catalog) = builder();
        let first = save(&builder, &record("10.1/one"));
        let journal_id = first.publication.as_ref().unwrap().journal_id;
        assert!(journal_id.is_some());

        let second = save(&builder, &record("10.1/two"));
        let publication = second.publication.unwrap();
        assert_eq!(publication.journal_id, journal_id);
        let publisher = catalog.get_publisher(&publication.publisher_id.unwrap()).unwrap().unwrap();
        assert_eq!(
            catalog
                .increment_publisher_alias("Springer Science and Business Media LLC", &publisher)
                .unwrap(),
            2
        );
    }

    #[test]
    fn open_license_makes_paper_available() {
        let (builder, _) = builder();
        let mut value = record("10.1/oa");
        value["license"] = json!([{"URL": "http://creativecommons.org/licenses/by/4.0/"}]);
        let outcome = save(&builder, &value);
        assert_eq!(outcome.paper.pdf_url.as_deref(), Some("https://doi.org/10.1/oa"));
        assert_eq!(
            outcome.publication.unwrap().pdf_url.as_deref(),
            Some("https://doi.org/10.1/oa")
        );
    }

    #[test]
    fn no_container_title_hides_new_paper() {
        let (builder, catalog) = builder();
        let mut value = record("10.1/orphan");
        value.as_object_mut().unwrap().remove("container-title");
        let outcome = save(&builder, &value);
        assert_eq!(outcome.status, SaveStatus::Created);
        assert!(outcome.publication.is_none());
        assert!(!outcome.paper.visible);
        assert_eq!(catalog.count_publications().unwrap(), 0);
    }

    #[test]
    fn oversized_locator_is_absorbed() {
        let (builder, catalog) = builder();
        let mut value = record("10.1/long");
        value["page"] = json!("1".repeat(100));
        let outcome = save(&builder, &value);
        assert!(outcome.publication.is_none());
        assert!(!outcome.paper.visible);
        assert_eq!(catalog.count_papers().unwrap(), 1);
    }

    #[test]
    fn orcids_from_caller_are_stored() {
        let (builder, catalog) = builder();
        let record = parse_record(&record("10.1/orcid")).unwrap();
        let extra = vec![Some(Orcid::parse("0000-0002-1825-0097").unwrap()), None, None];
        let outcome = builder.save_record(&record, Some(extra.as_slice())).unwrap();
        let stored = catalog.get_paper(&outcome.paper.id).unwrap().unwrap();
        assert_eq!(stored.authors[0].orcid.as_deref(), Some("0000-0002-1825-0097"));

        let short = vec![None];
        let mut other = record.clone();
        other.doi = crate::identifiers::Doi::parse("10.1/other").unwrap();
        assert!(builder.save_record(&other, Some(short.as_slice())).is_err());
    }

    #[test]
    fn attach_merges_new_identities() {
        let (builder, catalog) = builder();
        let first = save(&builder, &record("10.1/one"));

        let mut value = record("10.1/two");
        value["author"][1]["ORCID"] = json!("https://orcid.org/0000-0002-1694-233X");
        value["author"][2]["affiliation"] = json!([{"name": "University of Toronto"}]);
        save(&builder, &value);

        let stored = catalog.get_paper(&first.paper.id).unwrap().unwrap();
        assert_eq!(stored.authors[1].orcid.as_deref(), Some("0000-0002-1694-233X"));
        assert_eq!(stored.authors[2].affiliation.as_deref(), Some("University of Toronto"));
    }

    #[test]
    fn later_publication_makes_hidden_paper_visible() {
        let (builder, catalog) = builder();
        let mut orphan = record("10.1/a");
        orphan.as_object_mut().unwrap().remove("container-title");
        let hidden = save(&builder, &orphan);
        assert!(!hidden.paper.visible);

        let attached = save(&builder, &record("10.1/b"));
        assert_eq!(attached.status, SaveStatus::Attached);
        assert!(attached.publication.is_some());
        assert!(attached.paper.visible);
        assert!(catalog.get_paper(&hidden.paper.id).unwrap().unwrap().visible);
    }

    /// Misses the first DOI lookup, as if another worker stored the
    /// publication right after it.
    struct StaleDoiLookup {
        inner: Arc<SqliteCatalog>,
        missed: AtomicBool,
    }

    impl Catalog for StaleDoiLookup {
        fn find_paper_by_fingerprint(&self, fingerprint: &str) -> citesync_core::Result<Option<Paper>> {
            self.inner.find_paper_by_fingerprint(fingerprint)
        }
        fn get_paper(&self, id: &Uuid) -> citesync_core::Result<Option<Paper>> {
            self.inner.get_paper(id)
        }
        fn create_paper(&self, paper: &Paper) -> citesync_core::Result<()> {
            self.inner.create_paper(paper)
        }
        fn update_paper_authors(&self, id: &Uuid, authors: &[PaperAuthor]) -> citesync_core::Result<()> {
            self.inner.update_paper_authors(id, authors)
        }
        fn find_publication_by_doi(&self, doi: &str) -> citesync_core::Result<Option<Publication>> {
            if !self.missed.swap(true, Ordering::SeqCst) {
                return Ok(None);
            }
            self.inner.find_publication_by_doi(doi)
        }
        fn create_publication(&self, publication: &Publication) -> citesync_core::Result<()> {
            self.inner.create_publication(publication)
        }
        fn update_publication(&self, publication: &Publication) -> citesync_core::Result<()> {
            self.inner.update_publication(publication)
        }
        fn publications_for_paper(&self, paper_id: &Uuid) -> citesync_core::Result<Vec<Publication>> {
            self.inner.publications_for_paper(paper_id)
        }
        fn find_journal(&self, title: &str, issn: Option<&str>) -> citesync_core::Result<Option<Journal>> {
            self.inner.find_journal(title, issn)
        }
        fn register_journal(&self, journal: &Journal) -> citesync_core::Result<()> {
            self.inner.register_journal(journal)
        }
        fn find_or_create_publisher(&self, name: &str) -> citesync_core::Result<Publisher> {
            self.inner.find_or_create_publisher(name)
        }
        fn get_publisher(&self, id: &Uuid) -> citesync_core::Result<Option<Publisher>> {
            self.inner.get_publisher(id)
        }
        fn increment_publisher_alias(&self, name: &str, publisher: &Publisher) -> citesync_core::Result<u32> {
            self.inner.increment_publisher_alias(name, publisher)
        }
        fn recompute_paper_availability(&self, paper_id: &Uuid) -> citesync_core::Result<Paper> {
            self.inner.recompute_paper_availability(paper_id)
        }
        fn update_paper_visibility(&self, paper_id: &Uuid) -> citesync_core::Result<Paper> {
            self.inner.update_paper_visibility(paper_id)
        }
    }

    #[test]
    fn concurrent_doi_insert_reads_existing_publication() {
        let (builder, catalog) = builder();
        let first = save(&builder, &record("10.1/race"));

        let racing = PaperBuilder::new(Arc::new(StaleDoiLookup {
            inner: catalog.clone(),
            missed: AtomicBool::new(false),
        }));
        let second = save(&racing, &record("10.1/race"));

        assert_eq!(second.status, SaveStatus::AlreadyPresent);
        assert_eq!(second.paper.id, first.paper.id);
        assert_eq!(
            second.publication.unwrap().id,
            first.publication.unwrap().id
        );
        assert!(second.paper.visible);
        assert_eq!(catalog.count_publications().unwrap(), 1);
    }
}
