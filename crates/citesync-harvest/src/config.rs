use std::path::Path;
use std::time::Duration;

use citesync_core::AppConfig;
use serde::{Deserialize, Serialize};

use crate::error::{HarvestError, Result};

/// Largest page the registry accepts for a DOI filter query.
pub const MAX_PAGE_SIZE: usize = 100;

/// The `[harvest]` table of `~/.config/citesync/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HarvestConfig {
    /// Host (optionally with scheme) of the content-negotiation proxy.
    pub proxy_domain: String,
    /// Whether the proxy exposes `POST /batch`.
    pub proxy_supports_batch: bool,
    pub registry_url: String,
    /// DOIs per registry batch request, capped at [`MAX_PAGE_SIZE`].
    pub page_size: usize,
    /// Rows per search page.
    pub search_rows: usize,
    pub timeout_secs: u64,
    /// Upper bound on pages per search scan.
    pub max_search_pages: usize,
    pub max_consecutive_skips: usize,
    pub min_interval_ms: u64,
    pub user_agent: String,
    pub polite_pool_email: Option<String>,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            proxy_domain: "doi-cache.dissem.in".to_string(),
            proxy_supports_batch: true,
            registry_url: "https://api.crossref.org".to_string(),
            page_size: MAX_PAGE_SIZE,
            search_rows: 20,
            timeout_secs: 15,
            max_search_pages: 10,
            max_consecutive_skips: 100,
            min_interval_ms: 0,
            user_agent: format!("citesync/{}", env!("CARGO_PKG_VERSION")),
            polite_pool_email: None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    harvest: HarvestConfig,
}

impl HarvestConfig {
    /// Loads the `[harvest]` table from the shared config file and applies
    /// environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&AppConfig::config_path())?;
        config.apply_env_overrides();
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)?;
        let file: ConfigFile = toml::from_str(&contents)?;
        file.harvest.validated()
    }

    /// Honors `CITESYNC_PROXY_DOMAIN` and `CITESYNC_REGISTRY_URL`.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(domain) = std::env::var("CITESYNC_PROXY_DOMAIN")
            && !domain.trim().is_empty()
        {
            self.proxy_domain = domain;
        }
        if let Ok(url) = std::env::var("CITESYNC_REGISTRY_URL")
            && !url.trim().is_empty()
        {
            self.registry_url = url;
        }
    }

    pub fn validated(mut self) -> Result<Self> {
        if self.page_size == 0 {
            return Err(HarvestError::Config("page_size must be positive".to_string()));
        }
        if self.search_rows == 0 {
            return Err(HarvestError::Config("search_rows must be positive".to_string()));
        }
        self.page_size = self.page_size.min(MAX_PAGE_SIZE);
        self.search_rows = self.search_rows.min(MAX_PAGE_SIZE);
        Ok(self)
    }

    /// `http://<proxy_domain>` unless the domain already carries a scheme.
    pub fn proxy_base(&self) -> String {
        base_url(&self.proxy_domain, "http")
    }

    pub fn registry_base(&self) -> String {
        base_url(&self.registry_url, "https")
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms)
    }

    /// User agent with the polite-pool contact appended when configured.
    pub fn full_user_agent(&self) -> String {
        match &self.polite_pool_email {
            Some(email) => format!("{} (mailto:{email})", self.user_agent),
            None => self.user_agent.clone(),
        }
    }
}

fn base_url(raw: &str, default_scheme: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("{default_scheme}://{trimmed}")
    }
}
