use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{HarvestError, Result};

const RESOLVER_PREFIXES: [&str; 4] = [
    "https://doi.org/",
    "http://doi.org/",
    "https://dx.doi.org/",
    "http://dx.doi.org/",
];

/// A canonical DOI: prefix-free, `10.<registrant>/<suffix>`, lowercase.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Doi(String);

impl Doi {
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();
        let stripped = strip_prefix(input);

        // Validate: must start with "10.", contain "/", and have non-empty suffix
        if !stripped.starts_with("10.") {
            return Err(HarvestError::InvalidDoi(input.to_string()));
        }
        let slash_pos = stripped
            .find('/')
            .ok_or_else(|| HarvestError::InvalidDoi(input.to_string()))?;
        if stripped[slash_pos + 1..].trim().is_empty() || stripped.contains(char::is_whitespace) {
            return Err(HarvestError::InvalidDoi(input.to_string()));
        }

        Ok(Self(stripped.to_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The DOI as a URL path, each `/`-separated segment percent-encoded so
    /// `#`, `?` and `%` in a suffix stay part of the path.
    pub fn url_path(&self) -> String {
        self.0
            .split('/')
            .map(urlencoding::encode)
            .collect::<Vec<_>>()
            .join("/")
    }

    /// Resolver URL, `https://doi.org/<doi>`.
    pub fn url(&self) -> String {
        format!("https://doi.org/{}", self.url_path())
    }

    /// OAI identifier of the registry record, `oai:crossref.org:<doi>`.
    pub fn crossref_identifier(&self) -> String {
        format!("oai:crossref.org:{}", self.0)
    }
}

fn strip_prefix(input: &str) -> &str {
    let lower = input.to_ascii_lowercase();
    for prefix in RESOLVER_PREFIXES {
        if lower.starts_with(prefix) {
            return &input[prefix.len()..];
        }
    }
    if lower.starts_with("doi:") {
        return input[4..].trim_start();
    }
    input
}

/// Lenient variant of [`Doi::parse`]: absent or invalid input is `None`.
pub fn to_doi(input: Option<&str>) -> Option<Doi> {
    input.and_then(|s| Doi::parse(s).ok())
}

impl fmt::Display for Doi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Doi {
    type Error = HarvestError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<Doi> for String {
    fn from(doi: Doi) -> Self {
        doi.0
    }
}

impl std::str::FromStr for Doi {
    type Err = HarvestError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
