//! citesync harvest: DOI metadata fetching, citeproc parsing, identity
//! reconciliation and paper/publication building.

pub mod builder;
pub mod config;
pub mod enrichment;
pub mod error;
pub mod formats;
pub mod harvest;
pub mod http;
pub mod identifiers;
pub mod identity;
pub mod names;
pub mod search;
pub mod sources;

pub use builder::{PaperBuilder, SaveOutcome, SaveStatus, paper_fingerprint};
pub use config::HarvestConfig;
pub use enrichment::{Consolidation, Enricher};
pub use error::{HarvestError, Result};
pub use formats::{CitationRecord, parse_record};
pub use harvest::{Harvester, IngestReport};
pub use identifiers::{Doi, Orcid};
pub use search::SearchScan;
pub use sources::{DoiProxy, MetadataFetcher, Registry};
