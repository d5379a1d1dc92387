//! Citeproc JSON (content negotiation) and registry `works` items, parsed
//! into a [`CitationRecord`].

use std::collections::BTreeSet;

use chrono::{Datelike, NaiveDate, Utc};
use citesync_core::models::{AuthorName, PublicationType};
use citesync_core::storage::database::{MAX_NAME_LEN, MAX_PAPER_TITLE_LEN};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::error::{HarvestError, Result};
use crate::formats::license;
use crate::identifiers::{Doi, Orcid, to_doi, validate_orcid};
use crate::names::{normalize_name_words, parse_comma_name};

static RAW_DATE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(\d{4})(?:[-/.](\d{1,2})(?:[-/.](\d{1,2}))?)?")
        .expect("valid raw date regex")
});

/// Earliest year a free-text date may carry.
const MIN_PUBLICATION_YEAR: i32 = 1600;

pub type NamePair = AuthorName;

// ─── Raw shape ───────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            Self::One(v) => vec![v],
            Self::Many(vs) => vs,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum StringOrNumber {
    Text(String),
    Number(serde_json::Number),
}

impl StringOrNumber {
    fn into_text(self) -> String {
        match self {
            Self::Text(s) => s,
            Self::Number(n) => n.to_string(),
        }
    }

    fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Text(s) => s.trim().parse().ok(),
            Self::Number(n) => n.as_i64(),
        }
    }
}

/// First non-blank scalar of a value that may be a scalar, a list or null.
fn first_text<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Option<String>, D::Error> {
    let value = Option::<OneOrMany<Option<StringOrNumber>>>::deserialize(d)?;
    Ok(value.and_then(|v| {
        v.into_vec()
            .into_iter()
            .flatten()
            .map(|s| s.into_text().trim().to_string())
            .find(|s| !s.is_empty())
    }))
}

#[derive(Debug, Default, Deserialize)]
pub struct RawDate {
    #[serde(default, rename = "date-parts")]
    date_parts: Option<Vec<Option<Vec<Option<StringOrNumber>>>>>,
    #[serde(default)]
    raw: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawAffiliation {
    Named { name: Option<String> },
    Text(String),
}

impl RawAffiliation {
    fn name(&self) -> Option<&str> {
        match self {
            Self::Named { name } => name.as_deref(),
            Self::Text(s) => Some(s.as_str()),
        }
        .map(str::trim)
        .filter(|s| !s.is_empty())
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct RawAuthor {
    #[serde(default)]
    given: Option<String>,
    #[serde(default)]
    family: Option<String>,
    #[serde(default)]
    literal: Option<String>,
    #[serde(default, rename = "ORCID")]
    orcid: Option<String>,
    #[serde(default)]
    affiliation: Option<Vec<RawAffiliation>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RawLicense {
    #[serde(default, rename = "URL")]
    url: Option<String>,
}

/// The fields of a citeproc / `works` record this crate reads. Anything
/// else in the document is ignored.
#[derive(Debug, Default, Deserialize)]
pub struct RawRecord {
    #[serde(default, rename = "DOI", deserialize_with = "first_text")]
    doi: Option<String>,
    #[serde(default, deserialize_with = "first_text")]
    title: Option<String>,
    #[serde(default, deserialize_with = "first_text")]
    subtitle: Option<String>,
    #[serde(default, rename = "container-title", deserialize_with = "first_text")]
    container_title: Option<String>,
    #[serde(default, rename = "ISSN", deserialize_with = "first_text")]
    issn: Option<String>,
    #[serde(default, deserialize_with = "first_text")]
    volume: Option<String>,
    #[serde(default, deserialize_with = "first_text")]
    issue: Option<String>,
    #[serde(default, deserialize_with = "first_text")]
    page: Option<String>,
    #[serde(default, deserialize_with = "first_text")]
    publisher: Option<String>,
    #[serde(default, rename = "type")]
    pubtype: Option<String>,
    #[serde(default)]
    issued: Option<RawDate>,
    #[serde(default)]
    created: Option<RawDate>,
    #[serde(default)]
    deposited: Option<RawDate>,
    #[serde(default)]
    license: Option<Vec<Option<RawLicense>>>,
    #[serde(default)]
    author: Option<Vec<RawAuthor>>,
}

// ─── Canonical record ────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct CitationAuthor {
    pub name: NamePair,
    pub affiliation: Option<String>,
    pub orcid: Option<Orcid>,
}

/// A validated record: it has authors, a title, a DOI and a date.
#[derive(Debug, Clone, PartialEq)]
pub struct CitationRecord {
    pub doi: Doi,
    pub title: String,
    pub container_title: Option<String>,
    pub issn: Option<String>,
    pub volume: Option<String>,
    pub issue: Option<String>,
    pub pages: Option<String>,
    pub publisher: Option<String>,
    pub pubtype: PublicationType,
    /// Best known date: issued, then created, then deposited.
    pub pubdate: NaiveDate,
    /// The issued date alone.
    pub issued: Option<NaiveDate>,
    pub licenses: BTreeSet<String>,
    pub authors: Vec<CitationAuthor>,
}

impl CitationRecord {
    /// Resolver URL when any license qualifies as open access.
    pub fn pdf_url(&self) -> Option<String> {
        license::any_open_access(&self.licenses).then(|| self.doi.url())
    }

    pub fn splash_url(&self) -> String {
        self.doi.url()
    }

    pub fn identifier(&self) -> String {
        self.doi.crossref_identifier()
    }

    pub fn orcids(&self) -> Vec<Option<Orcid>> {
        self.authors.iter().map(|a| a.orcid.clone()).collect()
    }
}

/// Parses one raw JSON document into a [`CitationRecord`].
pub fn parse_record(value: &Value) -> Result<CitationRecord> {
    if !value.is_object() {
        return Err(HarvestError::InvalidRecord(format!(
            "expecting an object, got {}",
            json_kind(value)
        )));
    }
    let raw = RawRecord::deserialize(value)
        .map_err(|e| HarvestError::InvalidRecord(format!("malformed record: {e}")))?;
    CitationRecord::try_from(raw)
}

impl TryFrom<RawRecord> for CitationRecord {
    type Error = HarvestError;

    fn try_from(raw: RawRecord) -> Result<Self> {
        let raw_authors = raw.author.unwrap_or_default();
        if raw_authors.is_empty() {
            return Err(HarvestError::InvalidRecord("no author provided".into()));
        }

        let Some(mut title) = raw.title else {
            return Err(HarvestError::InvalidRecord("no title".into()));
        };
        if let Some(subtitle) = raw.subtitle {
            title = format!("{title}: {subtitle}");
        }

        let Some(doi) = to_doi(raw.doi.as_deref()) else {
            return Err(HarvestError::InvalidRecord(format!(
                "no usable DOI ({})",
                raw.doi.as_deref().unwrap_or("absent")
            )));
        };

        let pubdate = [&raw.issued, &raw.created, &raw.deposited]
            .into_iter()
            .flatten()
            .find_map(parse_date)
            .ok_or_else(|| HarvestError::InvalidRecord(format!("{doi}: no publication date")))?;
        let issued = raw.issued.as_ref().and_then(first_dateparts);

        let authors = raw_authors
            .iter()
            .map(|author| {
                let name = convert_to_name_pair(author).ok_or_else(|| {
                    HarvestError::InvalidRecord(format!("{doi}: invalid author"))
                })?;
                Ok(CitationAuthor {
                    name,
                    affiliation: author
                        .affiliation
                        .iter()
                        .flatten()
                        .find_map(RawAffiliation::name)
                        .map(str::to_string),
                    orcid: validate_orcid(author.orcid.as_deref()),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let pubtype = raw
            .pubtype
            .as_deref()
            .map(|t| match t {
                "article" => "journal-article",
                other => other,
            })
            .map(PublicationType::from_crossref_type)
            .unwrap_or_default();

        let licenses = raw
            .license
            .into_iter()
            .flatten()
            .flatten()
            .filter_map(|l| l.url)
            .collect();

        Ok(Self {
            doi,
            title: truncate_chars(&title, MAX_PAPER_TITLE_LEN),
            container_title: raw
                .container_title
                .map(|t| truncate_chars(&t, MAX_NAME_LEN)),
            issn: raw.issn,
            volume: raw.volume,
            issue: raw.issue,
            pages: raw.page,
            publisher: raw.publisher.map(|p| truncate_chars(&p, MAX_NAME_LEN)),
            pubtype,
            pubdate,
            issued,
            licenses,
            authors,
        })
    }
}

fn convert_to_name_pair(author: &RawAuthor) -> Option<NamePair> {
    let non_blank = |s: &Option<String>| {
        s.as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };

    let (first, last) = match (non_blank(&author.given), non_blank(&author.family)) {
        (Some(given), Some(family)) => (given, family),
        (None, Some(family)) => (String::new(), family),
        _ => parse_comma_name(author.literal.as_deref()?)?,
    };
    Some(NamePair::new(
        normalize_name_words(&first),
        normalize_name_words(&last),
    ))
}

// ─── Dates ───────────────────────────────────────────────────

fn epoch() -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(1970, 1, 1)
}

/// `[year, month?, day?]`, missing month and day defaulting to 1.
fn date_from_dateparts(parts: &[Option<StringOrNumber>]) -> Option<NaiveDate> {
    let part = |i: usize| parts.get(i).and_then(|p| p.as_ref()).and_then(StringOrNumber::as_i64);
    let year = i32::try_from(part(0)?).ok()?;
    let month = u32::try_from(part(1).unwrap_or(1)).ok()?;
    let day = u32::try_from(part(2).unwrap_or(1)).ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

fn first_dateparts(date: &RawDate) -> Option<NaiveDate> {
    date.date_parts
        .as_ref()?
        .first()?
        .as_deref()
        .and_then(date_from_dateparts)
}

/// Tries every `date-parts` entry, then the free-text `raw` field. The
/// 1970-01-01 sentinel counts as no date.
fn parse_date(date: &RawDate) -> Option<NaiveDate> {
    let from_parts = date
        .date_parts
        .iter()
        .flatten()
        .flatten()
        .filter_map(|parts| date_from_dateparts(parts))
        .find(|d| Some(*d) != epoch());
    if from_parts.is_some() {
        return from_parts;
    }

    date.raw
        .as_deref()
        .and_then(tolerant_date)
        .filter(|d| valid_publication_date(*d))
}

fn tolerant_date(raw: &str) -> Option<NaiveDate> {
    let caps = RAW_DATE_RE.captures(raw)?;
    let year: i32 = caps.get(1)?.as_str().parse().ok()?;
    let month = caps.get(2).map_or(Some(1), |m| m.as_str().parse().ok())?;
    let day = caps.get(3).map_or(Some(1), |m| m.as_str().parse().ok())?;
    NaiveDate::from_ymd_opt(year, month, day)
}

fn valid_publication_date(date: NaiveDate) -> bool {
    let next_year = Utc::now().year() + 1;
    (MIN_PUBLICATION_YEAR..=next_year).contains(&date.year())
}

// ─── Helpers ─────────────────────────────────────────────────

fn truncate_chars(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}
