use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::open_access::OaStatus;

// ─── Authors ────────────────────────────────────────────────

/// A `(first, last)` name pair, already normalized for storage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AuthorName {
    pub first: String,
    pub last: String,
}

impl AuthorName {
    pub fn new(first: impl Into<String>, last: impl Into<String>) -> Self {
        Self {
            first: first.into(),
            last: last.into(),
        }
    }

    /// "First Last", or just the surname for single-name authors.
    pub fn full(&self) -> String {
        if self.first.is_empty() {
            self.last.clone()
        } else {
            format!("{} {}", self.first, self.last)
        }
    }
}

impl std::fmt::Display for AuthorName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.full())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaperAuthor {
    pub name: AuthorName,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub affiliation: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orcid: Option<String>,
}

impl PaperAuthor {
    pub fn new(name: AuthorName) -> Self {
        Self {
            name,
            affiliation: None,
            orcid: None,
        }
    }
}

// ─── Paper ──────────────────────────────────────────────────

/// The canonical record of a work, shared by all its publications.
///
/// Identified by `fingerprint`; the catalog never holds two papers with the same one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paper {
    pub id: Uuid,
    pub fingerprint: String,
    pub title: String,
    pub authors: Vec<PaperAuthor>,
    pub pubdate: NaiveDate,

    /// True iff at least one publication is attached.
    pub visible: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pdf_url: Option<String>,

    #[serde(default)]
    pub oa_status: OaStatus,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Paper {
    pub fn new(
        fingerprint: impl Into<String>,
        title: impl Into<String>,
        authors: Vec<PaperAuthor>,
        pubdate: NaiveDate,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            fingerprint: fingerprint.into(),
            title: title.into(),
            authors,
            pubdate,
            visible: true,
            pdf_url: None,
            oa_status: OaStatus::Closed,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn year(&self) -> i32 {
        self.pubdate.year()
    }

    pub fn author_names(&self) -> Vec<String> {
        self.authors.iter().map(|a| a.name.full()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_name_author_prints_surname_only() {
        assert_eq!(AuthorName::new("", "Arvind").full(), "Arvind");
        assert_eq!(AuthorName::new("Ada", "Lovelace").to_string(), "Ada Lovelace");
    }

    #[test]
    fn new_paper_is_visible_and_closed() {
        let date = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        let paper = Paper::new("x-2020/b", "X", vec![PaperAuthor::new(AuthorName::new("A", "B"))], date);
        assert!(paper.visible);
        assert_eq!(paper.oa_status, OaStatus::Closed);
        assert_eq!(paper.year(), 2020);
        assert_eq!(paper.author_names(), vec!["A B".to_string()]);
    }
}
