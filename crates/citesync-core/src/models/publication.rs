use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Work type as reported by the registry (`type` field of citeproc JSON).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub enum PublicationType {
    JournalArticle,
    BookChapter,
    Book,
    EditedBook,
    Monograph,
    ProceedingsArticle,
    Proceedings,
    PostedContent,
    Report,
    Dataset,
    Dissertation,
    ReferenceEntry,
    Standard,
    /// Anything the registry reports that we do not model, kept verbatim.
    Other(String),
    #[default]
    Unknown,
}

impl PublicationType {
    pub fn from_crossref_type(s: &str) -> Self {
        match s.trim() {
            "journal-article" => Self::JournalArticle,
            "book-chapter" => Self::BookChapter,
            "book" => Self::Book,
            "edited-book" => Self::EditedBook,
            "monograph" => Self::Monograph,
            "proceedings-article" => Self::ProceedingsArticle,
            "proceedings" => Self::Proceedings,
            "posted-content" => Self::PostedContent,
            "report" => Self::Report,
            "dataset" => Self::Dataset,
            "dissertation" => Self::Dissertation,
            "reference-entry" => Self::ReferenceEntry,
            "standard" => Self::Standard,
            "" | "unknown" => Self::Unknown,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::JournalArticle => "journal-article",
            Self::BookChapter => "book-chapter",
            Self::Book => "book",
            Self::EditedBook => "edited-book",
            Self::Monograph => "monograph",
            Self::ProceedingsArticle => "proceedings-article",
            Self::Proceedings => "proceedings",
            Self::PostedContent => "posted-content",
            Self::Report => "report",
            Self::Dataset => "dataset",
            Self::Dissertation => "dissertation",
            Self::ReferenceEntry => "reference-entry",
            Self::Standard => "standard",
            Self::Other(raw) => raw,
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for PublicationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for PublicationType {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for PublicationType {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::from_crossref_type(&raw))
    }
}

/// One concrete appearance of a paper (a DOI-bearing record), owned by exactly one paper.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Publication {
    pub id: Uuid,
    pub paper_id: Uuid,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doi: Option<String>,

    pub journal_title: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issue: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pages: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pubdate: Option<NaiveDate>,

    #[serde(default)]
    pub pubtype: PublicationType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publisher_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub journal_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publisher_id: Option<Uuid>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pdf_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub splash_url: Option<String>,

    /// Abstract, HTML-sanitized.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    pub source: String,
    pub identifier: String,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Publication {
    pub fn new(paper_id: Uuid, journal_title: impl Into<String>, identifier: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            paper_id,
            doi: None,
            journal_title: journal_title.into(),
            issue: None,
            volume: None,
            pages: None,
            pubdate: None,
            pubtype: PublicationType::Unknown,
            publisher_name: None,
            journal_id: None,
            publisher_id: None,
            pdf_url: None,
            splash_url: None,
            description: None,
            source: "crossref".to_string(),
            identifier: identifier.into(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn has_full_text(&self) -> bool {
        self.pdf_url.as_deref().is_some_and(|u| !u.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_types_map_to_variants() {
        assert_eq!(
            PublicationType::from_crossref_type("journal-article"),
            PublicationType::JournalArticle
        );
        assert_eq!(
            PublicationType::from_crossref_type("proceedings-article"),
            PublicationType::ProceedingsArticle
        );
    }

    #[test]
    fn unknown_types_pass_through_verbatim() {
        let ty = PublicationType::from_crossref_type("peer-review");
        assert_eq!(ty, PublicationType::Other("peer-review".to_string()));
        assert_eq!(ty.as_str(), "peer-review");
    }

    #[test]
    fn serde_uses_registry_strings() {
        let json = serde_json::to_string(&PublicationType::BookChapter).unwrap();
        assert_eq!(json, "\"book-chapter\"");
        let back: PublicationType = serde_json::from_str("\"unknown\"").unwrap();
        assert_eq!(back, PublicationType::Unknown);
    }
}
