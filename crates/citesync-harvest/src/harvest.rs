use std::fmt;
use std::sync::Arc;

use citesync_core::Catalog;
use futures::StreamExt;
use serde::Serialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::builder::{PaperBuilder, SaveOutcome, SaveStatus};
use crate::config::HarvestConfig;
use crate::enrichment::{Consolidation, Enricher};
use crate::error::{HarvestError, Result};
use crate::formats::parse_record;
use crate::identifiers::{Doi, Orcid};
use crate::sources::MetadataFetcher;

/// Counters for one ingestion run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub created: usize,
    pub attached: usize,
    pub already_present: usize,
    /// Records rejected as invalid.
    pub skipped: usize,
    /// DOIs no source could resolve.
    pub unresolved: usize,
    /// Records that failed to save, or fetch errors that ended the run.
    pub failed: usize,
}

impl IngestReport {
    pub fn processed(&self) -> usize {
        self.created + self.attached + self.already_present
    }

    fn record(&mut self, status: SaveStatus) {
        match status {
            SaveStatus::Created => self.created += 1,
            SaveStatus::Attached => self.attached += 1,
            SaveStatus::AlreadyPresent => self.already_present += 1,
        }
    }
}

impl fmt::Display for IngestReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} records processed ({} new papers, {} attached, {} already present), {} skipped, {} unresolved, {} failed",
            self.processed(),
            self.created,
            self.attached,
            self.already_present,
            self.skipped,
            self.unresolved,
            self.failed
        )
    }
}

enum RecordResult {
    Saved(SaveStatus),
    Skipped,
    Failed,
}

/// Fetch, parse and save loops over DOI lists and registry searches.
pub struct Harvester {
    config: HarvestConfig,
    fetcher: MetadataFetcher,
    builder: PaperBuilder,
    enricher: Enricher,
    catalog: Arc<dyn Catalog>,
}

impl Harvester {
    pub fn new(config: HarvestConfig, catalog: Arc<dyn Catalog>) -> Result<Self> {
        let config = config.validated()?;
        let fetcher = MetadataFetcher::new(&config)?;
        Ok(Self {
            builder: PaperBuilder::new(catalog.clone()),
            enricher: Enricher::new(fetcher.proxy().clone(), catalog.clone()),
            fetcher,
            config,
            catalog,
        })
    }

    pub fn config(&self) -> &HarvestConfig {
        &self.config
    }

    pub fn fetcher(&self) -> &MetadataFetcher {
        &self.fetcher
    }

    pub fn catalog(&self) -> &Arc<dyn Catalog> {
        &self.catalog
    }

    /// Parses and saves one raw record.
    pub fn save_metadata(
        &self,
        raw: &Value,
        extra_orcids: Option<&[Option<Orcid>]>,
    ) -> Result<SaveOutcome> {
        let record = parse_record(raw)?;
        self.builder.save_record(&record, extra_orcids)
    }

    /// Fetches one DOI through content negotiation and saves it. An unknown
    /// DOI or an unusable record is `Ok(None)`.
    pub async fn create_paper_by_doi(&self, doi: &str) -> Result<Option<SaveOutcome>> {
        let Some(raw) = self.fetcher.fetch_single(doi).await? else {
            return Ok(None);
        };
        match self.save_metadata(&raw, None) {
            Ok(outcome) => Ok(Some(outcome)),
            Err(HarvestError::InvalidRecord(reason)) => {
                tracing::warn!(doi, %reason, "record rejected");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    pub async fn ingest_dois<S: AsRef<str>>(&self, dois: &[S]) -> Result<IngestReport> {
        let fetched = self.fetcher.fetch_batch(dois).await?;
        let mut report = IngestReport::default();

        for (doi, raw) in dois.iter().zip(fetched) {
            let Some(raw) = raw else {
                tracing::warn!(doi = doi.as_ref(), "DOI could not be resolved");
                report.unresolved += 1;
                continue;
            };
            match self.save_one(&raw) {
                RecordResult::Saved(status) => report.record(status),
                RecordResult::Skipped => report.skipped += 1,
                RecordResult::Failed => report.failed += 1,
            }
        }

        tracing::info!(%report, "DOI ingestion finished");
        Ok(report)
    }

    /// Saves the records of a registry search. Stops consuming after
    /// `max_consecutive_skips` rejected or unsaved records in a row.
    pub async fn ingest_search(
        &self,
        query: Option<&str>,
        filters: Vec<(String, String)>,
        max_pages: Option<usize>,
        cancel: CancellationToken,
    ) -> Result<IngestReport> {
        let max_pages = max_pages.unwrap_or(self.config.max_search_pages);
        let scan = self
            .fetcher
            .registry()
            .search_incrementally(query, filters, max_pages, cancel);
        let mut records = Box::pin(scan.into_stream());

        let mut report = IngestReport::default();
        let mut consecutive_skips = 0usize;

        while let Some(item) = records.next().await {
            let raw = match item {
                Ok(raw) => raw,
                Err(e) if report.processed() == 0 => return Err(e),
                Err(e) => {
                    tracing::warn!(error = %e, "search scan failed, keeping partial results");
                    report.failed += 1;
                    break;
                }
            };

            match self.save_one(&raw) {
                RecordResult::Saved(status) => {
                    consecutive_skips = 0;
                    report.record(status);
                }
                skipped => {
                    if matches!(skipped, RecordResult::Failed) {
                        report.failed += 1;
                    } else {
                        report.skipped += 1;
                    }
                    consecutive_skips += 1;
                    if consecutive_skips >= self.config.max_consecutive_skips {
                        tracing::warn!(consecutive_skips, "too many skipped records in a row, stopping");
                        break;
                    }
                }
            }
        }

        tracing::info!(%report, "search ingestion finished");
        Ok(report)
    }

    /// Consolidates the stored publication for `doi`; `None` when it is not stored.
    pub async fn consolidate(&self, doi: &str) -> Result<Option<Consolidation>> {
        let doi = Doi::parse(doi)?;
        let Some(publication) = self.catalog.find_publication_by_doi(doi.as_str())? else {
            return Ok(None);
        };
        self.enricher.consolidate(publication).await.map(Some)
    }

    fn save_one(&self, raw: &Value) -> RecordResult {
        let doi = raw.get("DOI").and_then(Value::as_str).unwrap_or("?");
        match self.save_metadata(raw, None) {
            Ok(outcome) => RecordResult::Saved(outcome.status),
            Err(HarvestError::InvalidRecord(reason)) => {
                tracing::warn!(doi, %reason, "record skipped");
                RecordResult::Skipped
            }
            Err(e) => {
                tracing::warn!(doi, error = %e, "record could not be saved");
                RecordResult::Failed
            }
        }
    }
}
