use futures::{Stream, TryStreamExt, stream};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::error::{HarvestError, Result};
use crate::sources::crossref::Registry;

/// A lazy, bounded, non-restartable scan over registry search results.
///
/// The scan ends on the first empty page, after `max_pages` pages, on the
/// first error (returned once) or when `cancel` fires. Cancellation is
/// checked before each page request.
pub struct SearchScan {
    registry: Registry,
    query: Option<String>,
    filters: Vec<(String, String)>,
    offset: usize,
    pages_fetched: usize,
    max_pages: usize,
    cancel: CancellationToken,
    exhausted: bool,
}

impl SearchScan {
    pub(crate) fn new(
        registry: Registry,
        query: Option<String>,
        filters: Vec<(String, String)>,
        max_pages: usize,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            registry,
            query,
            filters,
            offset: 0,
            pages_fetched: 0,
            max_pages,
            cancel,
            exhausted: false,
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    pub fn pages_fetched(&self) -> usize {
        self.pages_fetched
    }

    /// The next non-empty page, or `Ok(None)` once the scan is over.
    pub async fn next_page(&mut self) -> Result<Option<Vec<Value>>> {
        if self.exhausted {
            return Ok(None);
        }
        if self.pages_fetched >= self.max_pages {
            tracing::debug!(pages = self.pages_fetched, "search scan reached its page bound");
            self.exhausted = true;
            return Ok(None);
        }
        if self.cancel.is_cancelled() {
            tracing::debug!(pages = self.pages_fetched, "search scan cancelled");
            self.exhausted = true;
            return Ok(None);
        }

        let page = match self
            .registry
            .search_page(self.query.as_deref(), &self.filters, self.offset)
            .await
        {
            Ok(page) => page,
            Err(e) => {
                self.exhausted = true;
                return Err(e);
            }
        };
        self.pages_fetched += 1;
        self.offset += self.registry.search_rows();

        if page.is_empty() {
            self.exhausted = true;
            return Ok(None);
        }
        Ok(Some(page))
    }

    /// The scan as a stream of individual records.
    pub fn into_stream(self) -> impl Stream<Item = Result<Value>> {
        stream::try_unfold(self, |mut scan| async move {
            Ok::<_, HarvestError>(
                scan.next_page()
                    .await?
                    .map(|page| (stream::iter(page.into_iter().map(Ok)), scan)),
            )
        })
        .try_flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HarvestConfig;
    use crate::http::RateLimitedClient;
    use futures::StreamExt;
    use mockito::{Matcher, Server};

    fn registry_for(server: &Server) -> Registry {
        let config = HarvestConfig {
            registry_url: server.url(),
            search_rows: 2,
            ..HarvestConfig::default()
        };
        Registry::new(&config, RateLimitedClient::new(&config).unwrap())
    }

    fn page_at(offset: usize) -> Matcher {
        Matcher::AllOf(vec![
            Matcher::UrlEncoded("rows".into(), "2".into()),
            Matcher::UrlEncoded("offset".into(), offset.to_string()),
        ])
    }

    #[tokio::test]
    async fn full_page_then_empty_page() {
        let mut server = Server::new_async().await;
        let first = server
            .mock("GET", "/works")
            .match_query(page_at(0))
            .with_status(200)
            .with_body(r#"{"message":{"items":[{"DOI":"10.1/a"},{"DOI":"10.1/b"}]}}"#)
            .create_async()
            .await;
        let second = server
            .mock("GET", "/works")
            .match_query(page_at(2))
            .with_status(200)
            .with_body(r#"{"message":{"items":[]}}"#)
            .create_async()
            .await;

        let scan = registry_for(&server).search_incrementally(
            Some("x"),
            Vec::new(),
            2,
            CancellationToken::new(),
        );
        let items: Vec<Value> = scan.into_stream().map(|r| r.unwrap()).collect().await;
        assert_eq!(items.len(), 2);
        first.assert_async().await;
        second.assert_async().await;
    }

    #[tokio::test]
    async fn page_bound_stops_scan() {
        let mut server = Server::new_async().await;
        let m = server
            .mock("GET", "/works")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"message":{"items":[{"DOI":"10.1/a"},{"DOI":"10.1/b"}]}}"#)
            .expect(3)
            .create_async()
            .await;

        let mut scan = registry_for(&server).search_incrementally(
            None,
            Vec::new(),
            3,
            CancellationToken::new(),
        );
        let mut pages = 0;
        while let Some(page) = scan.next_page().await.unwrap() {
            assert_eq!(page.len(), 2);
            pages += 1;
        }
        assert_eq!(pages, 3);
        assert!(scan.is_exhausted());
        m.assert_async().await;
    }

    #[tokio::test]
    async fn zero_pages_makes_no_request() {
        let mut server = Server::new_async().await;
        let m = server
            .mock("GET", "/works")
            .match_query(Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let mut scan = registry_for(&server).search_incrementally(
            Some("x"),
            Vec::new(),
            0,
            CancellationToken::new(),
        );
        assert!(scan.next_page().await.unwrap().is_none());
        m.assert_async().await;
    }

    #[tokio::test]
    async fn cancellation_between_pages() {
        let mut server = Server::new_async().await;
        let m = server
            .mock("GET", "/works")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"message":{"items":[{"DOI":"10.1/a"}]}}"#)
            .expect(1)
            .create_async()
            .await;

        let cancel = CancellationToken::new();
        let mut scan =
            registry_for(&server).search_incrementally(Some("x"), Vec::new(), 10, cancel.clone());
        assert!(scan.next_page().await.unwrap().is_some());
        cancel.cancel();
        assert!(scan.next_page().await.unwrap().is_none());
        assert_eq!(scan.pages_fetched(), 1);
        m.assert_async().await;
    }

    #[tokio::test]
    async fn error_is_yielded_once() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/works")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("{not json")
            .create_async()
            .await;

        let scan = registry_for(&server).search_incrementally(
            Some("x"),
            Vec::new(),
            5,
            CancellationToken::new(),
        );
        let results: Vec<Result<Value>> = scan.into_stream().collect().await;
        assert_eq!(results.len(), 1);
        assert!(matches!(results[0], Err(HarvestError::MetadataSource { .. })));
    }
}
