use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::header::ACCEPT;
use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use tokio::time::sleep;

use crate::config::HarvestConfig;
use crate::error::{HarvestError, Result};

// ─── RateLimitedClient ────────────────────────────────────────────────────────

/// Shared HTTP client: one request at a time per `min_interval`, a fixed
/// per-request timeout and no retries.
#[derive(Clone)]
pub struct RateLimitedClient {
    client: reqwest::Client,
    min_interval: Duration,
    last_request: Arc<Mutex<Option<Instant>>>,
}

impl RateLimitedClient {
    pub fn new(config: &HarvestConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.full_user_agent())
            .timeout(config.timeout())
            .gzip(true)
            .build()
            .map_err(|e| HarvestError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            min_interval: config.min_interval(),
            last_request: Arc::new(Mutex::new(None)),
        })
    }

    async fn wait_for_rate_limit(&self) {
        if self.min_interval.is_zero() {
            return;
        }
        let mut last = self.last_request.lock().await;
        if let Some(t) = *last {
            let elapsed = t.elapsed();
            if elapsed < self.min_interval {
                sleep(self.min_interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }

    async fn send(&self, builder: RequestBuilder, url: &str) -> Result<Response> {
        let request = builder
            .build()
            .map_err(|e| HarvestError::metadata_source(url, e))?;
        let full_url = request.url().to_string();

        self.wait_for_rate_limit().await;
        tracing::debug!(url = %full_url, method = %request.method(), "metadata request");

        self.client
            .execute(request)
            .await
            .map_err(|e| HarvestError::metadata_source(full_url, e))
    }

    async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T> {
        let url = response.url().to_string();
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(HarvestError::metadata_source(
                url,
                format!("HTTP {}: {}", status.as_u16(), truncate(&body, 200)),
            ));
        }
        let text = response
            .text()
            .await
            .map_err(|e| HarvestError::metadata_source(&url, e))?;
        serde_json::from_str(&text)
            .map_err(|e| HarvestError::metadata_source(url, format!("invalid JSON response: {e}")))
    }

    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
        accept: Option<&str>,
    ) -> Result<T> {
        let mut builder = self.client.get(url).query(query);
        if let Some(accept) = accept {
            builder = builder.header(ACCEPT, accept);
        }
        let response = self.send(builder, url).await?;
        Self::read_json(response).await
    }

    /// Like [`get_json`](Self::get_json), but a 4xx answer is `Ok(None)`.
    pub async fn get_json_unless_rejected<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<Option<T>> {
        let response = self.send(self.client.get(url).query(query), url).await?;
        let status = response.status();
        if status.is_client_error() {
            tracing::warn!(url = %response.url(), status = status.as_u16(), "request rejected");
            return Ok(None);
        }
        Self::read_json(response).await.map(Some)
    }

    pub async fn post_form_json<T: DeserializeOwned>(
        &self,
        url: &str,
        form: &[(&str, String)],
    ) -> Result<T> {
        let response = self.send(self.client.post(url).form(form), url).await?;
        Self::read_json(response).await
    }
}

fn truncate(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
