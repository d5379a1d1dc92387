use serde::Deserialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::config::HarvestConfig;
use crate::error::Result;
use crate::http::RateLimitedClient;
use crate::identifiers::Doi;
use crate::search::SearchScan;

/// The registry `works` envelope: `{"message": {"items": [...]}}`.
#[derive(Debug, Deserialize)]
struct WorksEnvelope {
    #[serde(default)]
    message: Option<WorksMessage>,
}

#[derive(Debug, Default, Deserialize)]
struct WorksMessage {
    #[serde(default)]
    items: Vec<Value>,
}

/// Client for the registry `works` endpoint (DOI filter lookups and search).
#[derive(Clone)]
pub struct Registry {
    client: RateLimitedClient,
    base_url: String,
    search_rows: usize,
}

impl Registry {
    pub fn new(config: &HarvestConfig, client: RateLimitedClient) -> Self {
        Self {
            client,
            base_url: config.registry_base(),
            search_rows: config.search_rows,
        }
    }

    fn works_url(&self) -> String {
        format!("{}/works", self.base_url)
    }

    /// Looks a page of DOIs up with a `doi:` filter.
    ///
    /// `Ok(None)` when the registry rejects the query (4xx) or answers
    /// without a `message`; callers treat the whole page as unresolved.
    pub async fn works_by_dois(&self, dois: &[Doi]) -> Result<Option<Vec<Value>>> {
        if dois.is_empty() {
            return Ok(Some(Vec::new()));
        }
        let filter = dois
            .iter()
            .map(|d| format!("doi:{d}"))
            .collect::<Vec<_>>()
            .join(",");
        let query = [("filter", filter), ("rows", dois.len().to_string())];

        let envelope: Option<WorksEnvelope> = self
            .client
            .get_json_unless_rejected(&self.works_url(), &query)
            .await?;
        Ok(envelope.and_then(|e| e.message).map(|m| m.items))
    }

    /// One page of search results. An envelope without items is an empty page.
    pub async fn search_page(
        &self,
        query: Option<&str>,
        filters: &[(String, String)],
        offset: usize,
    ) -> Result<Vec<Value>> {
        let mut params: Vec<(&str, String)> = Vec::new();
        if let Some(q) = query.filter(|q| !q.trim().is_empty()) {
            params.push(("query", q.to_string()));
        }
        if !filters.is_empty() {
            let joined = filters
                .iter()
                .map(|(k, v)| format!("{k}:{v}"))
                .collect::<Vec<_>>()
                .join(",");
            params.push(("filter", joined));
        }
        params.push(("rows", self.search_rows.to_string()));
        params.push(("offset", offset.to_string()));

        let envelope: WorksEnvelope = self.client.get_json(&self.works_url(), &params, None).await?;
        Ok(envelope.message.unwrap_or_default().items)
    }

    pub fn search_rows(&self) -> usize {
        self.search_rows
    }

    /// A fresh scan from offset zero over the search results, bounded by `max_pages`.
    pub fn search_incrementally(
        &self,
        query: Option<&str>,
        filters: Vec<(String, String)>,
        max_pages: usize,
        cancel: CancellationToken,
    ) -> SearchScan {
        SearchScan::new(self.clone(), query.map(str::to_string), filters, max_pages, cancel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};

    fn registry_for(server: &Server) -> Registry {
        let config = HarvestConfig {
            registry_url: server.url(),
            ..HarvestConfig::default()
        };
        let client = RateLimitedClient::new(&config).unwrap();
        Registry::new(&config, client)
    }

    #[tokio::test]
    async fn doi_filter_query() {
        let mut server = Server::new_async().await;
        let m = server
            .mock("GET", "/works")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("filter".into(), "doi:10.1/x,doi:10.1/y".into()),
                Matcher::UrlEncoded("rows".into(), "2".into()),
            ]))
            .with_status(200)
            .with_body(r#"{"status":"ok","message":{"items":[{"DOI":"10.1/x"}]}}"#)
            .create_async()
            .await;

        let dois = [Doi::parse("10.1/x").unwrap(), Doi::parse("10.1/y").unwrap()];
        let items = registry_for(&server).works_by_dois(&dois).await.unwrap().unwrap();
        assert_eq!(items.len(), 1);
        m.assert_async().await;
    }

    #[tokio::test]
    async fn envelope_without_message_is_none() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/works")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"status":"failed"}"#)
            .create_async()
            .await;

        let dois = [Doi::parse("10.1/x").unwrap()];
        assert!(registry_for(&server).works_by_dois(&dois).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn search_page_params() {
        let mut server = Server::new_async().await;
        let m = server
            .mock("GET", "/works")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("query".into(), "deep learning".into()),
                Matcher::UrlEncoded("filter".into(), "orcid:0000-0002-1825-0097".into()),
                Matcher::UrlEncoded("rows".into(), "20".into()),
                Matcher::UrlEncoded("offset".into(), "40".into()),
            ]))
            .with_status(200)
            .with_body(r#"{"message":{"items":[{"DOI":"10.1/a"},{"DOI":"10.1/b"}]}}"#)
            .create_async()
            .await;

        let filters = vec![("orcid".to_string(), "0000-0002-1825-0097".to_string())];
        let items = registry_for(&server)
            .search_page(Some("deep learning"), &filters, 40)
            .await
            .unwrap();
        assert_eq!(items.len(), 2);
        m.assert_async().await;
    }
}
