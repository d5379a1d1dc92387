use serde_json::Value;

use crate::config::HarvestConfig;
use crate::error::Result;
use crate::http::RateLimitedClient;
use crate::identifiers::Doi;

pub const CITEPROC_JSON: &str = "application/citeproc+json";

/// The caching content-negotiation proxy: `GET /<doi>`, `POST /batch` and
/// `GET /zotero/<doi>`.
#[derive(Clone)]
pub struct DoiProxy {
    client: RateLimitedClient,
    base_url: String,
}

impl DoiProxy {
    pub fn new(config: &HarvestConfig, client: RateLimitedClient) -> Self {
        Self {
            client,
            base_url: config.proxy_base(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Citeproc JSON for one DOI. Blank input is `Ok(None)`, as is a `null` body.
    pub async fn fetch_single(&self, doi: &str) -> Result<Option<Value>> {
        if doi.trim().is_empty() {
            return Ok(None);
        }
        let doi = Doi::parse(doi)?;
        let url = format!("{}/{}", self.base_url, doi.url_path());
        let value: Value = self.client.get_json(&url, &[], Some(CITEPROC_JSON)).await?;
        Ok((!value.is_null()).then_some(value))
    }

    /// Resolves several DOIs in one round-trip; the answer lists only those
    /// the proxy knows.
    pub async fn fetch_batch(&self, dois: &[Doi]) -> Result<Vec<Value>> {
        if dois.is_empty() {
            return Ok(Vec::new());
        }
        let list: Vec<&str> = dois.iter().map(Doi::as_str).collect();
        let encoded = serde_json::to_string(&list).unwrap_or_else(|_| "[]".to_string());
        let url = format!("{}/batch", self.base_url);
        let value: Value = self.client.post_form_json(&url, &[("dois", encoded)]).await?;
        Ok(match value {
            Value::Array(items) => items.into_iter().filter(|v| !v.is_null()).collect(),
            _ => Vec::new(),
        })
    }

    /// Zotero items for a DOI, `None` when the proxy answers `null`.
    pub async fn fetch_zotero(&self, doi: &Doi) -> Result<Option<Vec<Value>>> {
        let url = format!("{}/zotero/{}", self.base_url, doi.url_path());
        let value: Value = self.client.get_json(&url, &[], None).await?;
        Ok(match value {
            Value::Null => None,
            Value::Array(items) => Some(items),
            item @ Value::Object(_) => Some(vec![item]),
            _ => Some(Vec::new()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HarvestError;
    use mockito::{Matcher, Server};

    fn proxy_for(server: &Server) -> DoiProxy {
        let config = HarvestConfig {
            proxy_domain: server.host_with_port(),
            ..HarvestConfig::default()
        };
        let client = RateLimitedClient::new(&config).unwrap();
        DoiProxy::new(&config, client)
    }

    #[tokio::test]
    async fn fetch_single_uses_content_negotiation() {
        let mut server = Server::new_async().await;
        let m = server
            .mock("GET", "/10.1/abc")
            .match_header("accept", CITEPROC_JSON)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"DOI":"10.1/abc","title":"X"}"#)
            .create_async()
            .await;

        let proxy = proxy_for(&server);
        let value = proxy.fetch_single("https://doi.org/10.1/ABC").await.unwrap().unwrap();
        assert_eq!(value["title"], "X");
        m.assert_async().await;
    }

    #[tokio::test]
    async fn fetch_single_keeps_reserved_characters_in_the_path() {
        let mut server = Server::new_async().await;
        let truncated = server
            .mock("GET", "/10.1/a")
            .with_status(200)
            .with_body(r#"{"DOI":"10.1/a"}"#)
            .expect(0)
            .create_async()
            .await;
        let exact = server
            .mock("GET", "/10.1/a%23b%3Fc")
            .with_status(200)
            .with_body(r#"{"DOI":"10.1/a#b?c"}"#)
            .create_async()
            .await;

        let value = proxy_for(&server).fetch_single("10.1/a#b?c").await.unwrap().unwrap();
        assert_eq!(value["DOI"], "10.1/a#b?c");
        exact.assert_async().await;
        truncated.assert_async().await;
    }

    #[tokio::test]
    async fn fetch_single_blank_and_invalid() {
        let server = Server::new_async().await;
        let proxy = proxy_for(&server);
        assert!(proxy.fetch_single("   ").await.unwrap().is_none());
        assert!(matches!(
            proxy.fetch_single("nope").await,
            Err(HarvestError::InvalidDoi(_))
        ));
    }

    #[tokio::test]
    async fn fetch_single_invalid_json() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/10.1/abc")
            .with_status(200)
            .with_body("not json")
            .create_async()
            .await;

        let err = proxy_for(&server).fetch_single("10.1/abc").await.unwrap_err();
        assert!(matches!(err, HarvestError::MetadataSource { .. }));
    }

    #[tokio::test]
    async fn batch_posts_json_list() {
        let mut server = Server::new_async().await;
        let m = server
            .mock("POST", "/batch")
            .match_body(Matcher::UrlEncoded(
                "dois".into(),
                r#"["10.1/a","10.1/b"]"#.into(),
            ))
            .with_status(200)
            .with_body(r#"[{"DOI":"10.1/a"}, null]"#)
            .create_async()
            .await;

        let dois = [Doi::parse("10.1/a").unwrap(), Doi::parse("10.1/b").unwrap()];
        let items = proxy_for(&server).fetch_batch(&dois).await.unwrap();
        assert_eq!(items.len(), 1);
        m.assert_async().await;
    }

    #[tokio::test]
    async fn zotero_null_is_none() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/zotero/10.1/abc")
            .with_status(200)
            .with_body("null")
            .create_async()
            .await;

        let doi = Doi::parse("10.1/abc").unwrap();
        assert!(proxy_for(&server).fetch_zotero(&doi).await.unwrap().is_none());
    }
}
