use serde::{Deserialize, Serialize};

/// Full-text availability of a paper, derived from its publications.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OaStatus {
    /// At least one publication exposes a full-text URL.
    Open,
    #[default]
    Closed,
}

impl OaStatus {
    pub fn from_pdf_url(pdf_url: Option<&str>) -> Self {
        match pdf_url {
            Some(url) if !url.trim().is_empty() => Self::Open,
            _ => Self::Closed,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Closed => "closed",
        }
    }
}

impl std::str::FromStr for OaStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(Self::Open),
            "closed" => Ok(Self::Closed),
            other => Err(format!("unknown availability status: {other}")),
        }
    }
}

impl std::fmt::Display for OaStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
