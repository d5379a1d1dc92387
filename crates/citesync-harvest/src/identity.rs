//! Reconciliation of author identities (ORCID iDs and affiliations) across
//! records of the same paper.

use citesync_core::models::PaperAuthor;

use crate::error::{HarvestError, Result};
use crate::identifiers::Orcid;
use crate::names::{folded_words, surname_key};

/// Normalized Levenshtein similarity above which two affiliations are the same place.
pub const AFFILIATION_SIMILARITY: f64 = 0.8;

/// Positional merge of caller-supplied iDs with those found in the record.
///
/// A known iD is never replaced by an unknown one; the record wins when both
/// are known. Without caller iDs the extracted list is returned as is.
pub fn merge_orcids(
    caller: Option<&[Option<Orcid>]>,
    extracted: Vec<Option<Orcid>>,
) -> Result<Vec<Option<Orcid>>> {
    let Some(caller) = caller else {
        return Ok(extracted);
    };
    if caller.len() != extracted.len() {
        return Err(HarvestError::IdentityMismatch {
            expected: extracted.len(),
            found: caller.len(),
        });
    }
    Ok(extracted
        .into_iter()
        .zip(caller)
        .map(|(new, old)| new.or_else(|| old.clone()))
        .collect())
}

fn normalized(s: &str) -> String {
    folded_words(s).join(" ")
}

fn similar(a: &str, b: &str) -> bool {
    if a.is_empty() || b.is_empty() {
        return false;
    }
    a.contains(b) || b.contains(a) || strsim::normalized_levenshtein(a, b) >= AFFILIATION_SIMILARITY
}

/// Keeps the more specific of two similar affiliations, the existing one otherwise.
pub fn merge_affiliation(existing: Option<&str>, incoming: Option<&str>) -> Option<String> {
    match (existing, incoming) {
        (None, None) => None,
        (Some(a), None) | (None, Some(a)) => Some(a.to_string()),
        (Some(old), Some(new)) => {
            let (old_key, new_key) = (normalized(old), normalized(new));
            if similar(&old_key, &new_key) && new_key.len() > old_key.len() {
                Some(new.to_string())
            } else {
                Some(old.to_string())
            }
        }
    }
}

pub trait MergeIdentity {
    /// Folds `incoming` identity data into `self`; true when anything changed.
    fn merge_identity(&mut self, incoming: &Self) -> bool;
}

impl MergeIdentity for PaperAuthor {
    fn merge_identity(&mut self, incoming: &Self) -> bool {
        let orcid = self.orcid.clone().or_else(|| incoming.orcid.clone());
        let affiliation =
            merge_affiliation(self.affiliation.as_deref(), incoming.affiliation.as_deref());
        let changed = orcid != self.orcid || affiliation != self.affiliation;
        self.orcid = orcid;
        self.affiliation = affiliation;
        changed
    }
}

/// Merged author list when `incoming` lines up with `existing` (same length,
/// same surnames in order) and contributes something; `None` otherwise.
pub fn merge_authors(existing: &[PaperAuthor], incoming: &[PaperAuthor]) -> Option<Vec<PaperAuthor>> {
    if existing.len() != incoming.len() {
        tracing::debug!(
            existing = existing.len(),
            incoming = incoming.len(),
            "author lists differ in length, identities not merged"
        );
        return None;
    }
    let aligned = existing
        .iter()
        .zip(incoming)
        .all(|(a, b)| surname_key(&a.name.last) == surname_key(&b.name.last));
    if !aligned {
        return None;
    }

    let mut merged = existing.to_vec();
    let mut changed = false;
    for (author, other) in merged.iter_mut().zip(incoming) {
        changed |= author.merge_identity(other);
    }
    changed.then_some(merged)
}
