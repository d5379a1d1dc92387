use std::collections::HashMap;

use serde_json::Value;

use crate::config::HarvestConfig;
use crate::error::Result;
use crate::http::RateLimitedClient;
use crate::identifiers::Doi;
use crate::sources::crossref::Registry;
use crate::sources::proxy::DoiProxy;

/// Single and batch DOI metadata retrieval.
#[derive(Clone)]
pub struct MetadataFetcher {
    proxy: DoiProxy,
    registry: Registry,
    supports_batch: bool,
    page_size: usize,
}

impl MetadataFetcher {
    pub fn new(config: &HarvestConfig) -> Result<Self> {
        let client = RateLimitedClient::new(config)?;
        Ok(Self {
            proxy: DoiProxy::new(config, client.clone()),
            registry: Registry::new(config, client),
            supports_batch: config.proxy_supports_batch,
            page_size: config.page_size.clamp(1, crate::config::MAX_PAGE_SIZE),
        })
    }

    pub fn proxy(&self) -> &DoiProxy {
        &self.proxy
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub async fn fetch_single(&self, doi: &str) -> Result<Option<Value>> {
        self.proxy.fetch_single(doi).await
    }

    /// Metadata for every input DOI, aligned with the input: position `i`
    /// holds the record for `dois[i]`, or `None` when nothing resolved it.
    pub async fn fetch_batch<S: AsRef<str>>(&self, dois: &[S]) -> Result<Vec<Option<Value>>> {
        if !self.supports_batch {
            return Ok(self.fetch_each(dois).await);
        }

        let mut results = Vec::with_capacity(dois.len());
        for page in dois.chunks(self.page_size) {
            results.extend(self.fetch_page(page).await?);
        }
        Ok(results)
    }

    async fn fetch_page<S: AsRef<str>>(&self, page: &[S]) -> Result<Vec<Option<Value>>> {
        let canonical: Vec<Option<Doi>> = page.iter().map(|d| Doi::parse(d.as_ref()).ok()).collect();
        let mut wanted: Vec<Doi> = Vec::new();
        for doi in canonical.iter().flatten() {
            if !wanted.contains(doi) {
                wanted.push(doi.clone());
            }
        }
        if wanted.is_empty() {
            return Ok(vec![None; page.len()]);
        }

        let Some(items) = self.registry.works_by_dois(&wanted).await? else {
            tracing::warn!(dois = wanted.len(), "registry rejected DOI batch, page left unresolved");
            return Ok(vec![None; page.len()]);
        };
        let mut found = index_by_doi(items);

        let missing: Vec<Doi> = wanted.into_iter().filter(|d| !found.contains_key(d)).collect();
        if !missing.is_empty() {
            tracing::debug!(missing = missing.len(), "resolving DOIs through the proxy");
            found.extend(index_by_doi(self.proxy.fetch_batch(&missing).await?));
        }

        Ok(canonical
            .iter()
            .map(|doi| doi.as_ref().and_then(|d| found.get(d).cloned()))
            .collect())
    }

    async fn fetch_each<S: AsRef<str>>(&self, dois: &[S]) -> Vec<Option<Value>> {
        let mut results = Vec::with_capacity(dois.len());
        let mut failed = 0usize;
        for doi in dois {
            match self.proxy.fetch_single(doi.as_ref()).await {
                Ok(value) => results.push(value),
                Err(e) => {
                    failed += 1;
                    tracing::warn!(doi = doi.as_ref(), error = %e, "metadata fetch failed, skipping");
                    results.push(None);
                }
            }
        }
        if failed > 0 {
            tracing::info!(failed, total = dois.len(), "sequential fetch finished with failures");
        }
        results
    }
}

fn index_by_doi(items: Vec<Value>) -> HashMap<Doi, Value> {
    items
        .into_iter()
        .filter_map(|item| {
            let doi = item.get("DOI").and_then(Value::as_str).and_then(|d| Doi::parse(d).ok())?;
            Some((doi, item))
        })
        .collect()
}
