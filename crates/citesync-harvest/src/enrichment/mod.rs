//! Post-hoc consolidation of stored publications from the proxy's Zotero
//! endpoint (abstracts and PDF attachments).

mod html;

pub use html::sanitize_html;

use std::sync::Arc;

use citesync_core::Catalog;
use citesync_core::models::Publication;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::identifiers::Doi;
use crate::sources::DoiProxy;

const PDF_MIME_TYPE: &str = "application/pdf";

#[derive(Debug, Default, Deserialize)]
struct ZoteroItem {
    #[serde(default, rename = "abstractNote")]
    abstract_note: Option<String>,
    #[serde(default)]
    attachments: Vec<ZoteroAttachment>,
}

#[derive(Debug, Default, Deserialize)]
struct ZoteroAttachment {
    #[serde(default, rename = "mimeType")]
    mime_type: Option<String>,
    #[serde(default)]
    url: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Consolidation {
    pub publication: Publication,
    pub fields_updated: Vec<String>,
}

impl Consolidation {
    pub fn changed(&self) -> bool {
        !self.fields_updated.is_empty()
    }
}

pub struct Enricher {
    proxy: DoiProxy,
    catalog: Arc<dyn Catalog>,
}

impl Enricher {
    pub fn new(proxy: DoiProxy, catalog: Arc<dyn Catalog>) -> Self {
        Self { proxy, catalog }
    }

    /// Pulls the abstract and any PDF attachment for `publication`, saves
    /// what changed and recomputes the owning paper's availability.
    pub async fn consolidate(&self, publication: Publication) -> Result<Consolidation> {
        let mut consolidation = Consolidation {
            publication,
            fields_updated: Vec::new(),
        };
        let Some(doi) = consolidation
            .publication
            .doi
            .as_deref()
            .and_then(|d| Doi::parse(d).ok())
        else {
            tracing::debug!(publication = %consolidation.publication.id, "no DOI, nothing to consolidate");
            return Ok(consolidation);
        };

        let Some(items) = self.proxy.fetch_zotero(&doi).await? else {
            tracing::debug!(%doi, "no zotero metadata");
            return Ok(consolidation);
        };

        for raw in items {
            apply_item(&mut consolidation, raw, &doi);
        }

        if consolidation.changed() {
            self.catalog.update_publication(&consolidation.publication)?;
            self.catalog
                .recompute_paper_availability(&consolidation.publication.paper_id)?;
            tracing::info!(%doi, fields = ?consolidation.fields_updated, "publication consolidated");
        }
        Ok(consolidation)
    }
}

fn apply_item(consolidation: &mut Consolidation, raw: Value, doi: &Doi) {
    let item: ZoteroItem = match serde_json::from_value(raw) {
        Ok(item) => item,
        Err(e) => {
            tracing::warn!(%doi, error = %e, "malformed zotero item skipped");
            return;
        }
    };
    let publication = &mut consolidation.publication;

    if let Some(note) = item.abstract_note {
        let description = sanitize_html(&note);
        if !description.is_empty() && publication.description.as_deref() != Some(description.as_str()) {
            publication.description = Some(description);
            push_unique(&mut consolidation.fields_updated, "description");
        }
    }

    let pdf = item
        .attachments
        .into_iter()
        .filter(|a| a.mime_type.as_deref() == Some(PDF_MIME_TYPE))
        .find_map(|a| a.url.filter(|u| !u.trim().is_empty()));
    if let Some(url) = pdf
        && publication.pdf_url.as_deref() != Some(url.as_str())
    {
        publication.pdf_url = Some(url);
        push_unique(&mut consolidation.fields_updated, "pdf_url");
    }
}

fn push_unique(fields: &mut Vec<String>, field: &str) {
    if !fields.iter().any(|f| f == field) {
        fields.push(field.to_string());
    }
}
