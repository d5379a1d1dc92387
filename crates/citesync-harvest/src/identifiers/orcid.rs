use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{HarvestError, Result};

/// A validated ORCID iD in its bare `0000-0002-1825-0097` form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Orcid(String);

impl Orcid {
    /// Accepts bare iDs and `orcid.org` URLs; checks the ISO 7064 11,2 check digit.
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        let lower = trimmed.to_ascii_lowercase();
        let bare = ["https://orcid.org/", "http://orcid.org/", "orcid.org/"]
            .iter()
            .find(|p| lower.starts_with(*p))
            .map_or(trimmed, |p| &trimmed[p.len()..]);

        let digits: Vec<char> = bare.chars().filter(|c| *c != '-').collect();
        let well_formed = digits.len() == 16
            && digits[..15].iter().all(char::is_ascii_digit)
            && (digits[15].is_ascii_digit() || digits[15] == 'X' || digits[15] == 'x');
        if !well_formed {
            return Err(HarvestError::InvalidOrcid(input.to_string()));
        }

        let expected = check_digit(&digits[..15]);
        if digits[15].to_ascii_uppercase() != expected {
            return Err(HarvestError::InvalidOrcid(input.to_string()));
        }

        let canonical: String = digits.iter().map(char::to_ascii_uppercase).collect();
        Ok(Self(format!(
            "{}-{}-{}-{}",
            &canonical[0..4],
            &canonical[4..8],
            &canonical[8..12],
            &canonical[12..16]
        )))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn check_digit(base: &[char]) -> char {
    let total = base
        .iter()
        .filter_map(|c| c.to_digit(10))
        .fold(0u32, |acc, d| (acc + d) * 2);
    let result = (12 - total % 11) % 11;
    if result == 10 {
        'X'
    } else {
        char::from_digit(result, 10).unwrap_or('0')
    }
}

/// Lenient variant: absent or invalid input is `None`.
pub fn validate_orcid(input: Option<&str>) -> Option<Orcid> {
    input.and_then(|s| Orcid::parse(s).ok())
}

impl fmt::Display for Orcid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Orcid {
    type Error = HarvestError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<Orcid> for String {
    fn from(orcid: Orcid) -> Self {
        orcid.0
    }
}
