//! Citation resolution against the evidence catalog

use crate::catalog::EvidenceCatalog;
use crate::normalize::normalize;

/// Fixed marker returned when no claimed citation resolves
pub const NO_EVIDENCE_MARKER: &str = "No forensic evidence found for this dimension";

/// Deterministic fallback citation for a criterion's target artifact
///
/// ```rust
/// use court_catalog::fallback_citation;
///
/// assert_eq!(
///     fallback_citation("github_repo"),
///     "No forensic evidence found for this dimension (github_repo)"
/// );
/// ```
#[must_use]
pub fn fallback_citation(target_artifact: &str) -> String {
    let target = target_artifact.trim();
    if target.is_empty() {
        NO_EVIDENCE_MARKER.to_string()
    } else {
        format!("{NO_EVIDENCE_MARKER} ({target})")
    }
}

/// Whether a citation is the "nothing found" marker (with or without a target suffix)
#[must_use]
pub fn is_fallback_marker(citation: &str) -> bool {
    normalize(citation).starts_with(NO_EVIDENCE_MARKER)
}

/// Resolve claimed citations to catalog entries
///
/// Each claim is normalized and accepted on an exact match, otherwise on
/// a case-insensitive substring match in either direction; results are
/// de-duplicated in claim order. When nothing resolves the single
/// `fallback` value is returned.
#[must_use]
pub fn resolve<S: AsRef<str>>(claims: &[S], catalog: &EvidenceCatalog, fallback: &str) -> Vec<String> {
    let mut resolved: Vec<String> = Vec::new();
    for claim in claims {
        if let Some(hit) = resolve_one(claim.as_ref(), catalog) {
            if !resolved.iter().any(|existing| existing == hit) {
                resolved.push(hit.to_string());
            }
        }
    }

    if resolved.is_empty() {
        vec![fallback.to_string()]
    } else {
        resolved
    }
}

/// True iff at least one claim resolves by exact or substring match
///
/// The fallback marker never counts, so a citation list that was
/// replaced by the fallback is always discounted.
#[must_use]
pub fn has_valid_citation<S: AsRef<str>>(claims: &[S], catalog: &EvidenceCatalog) -> bool {
    claims
        .iter()
        .any(|claim| resolve_one(claim.as_ref(), catalog).is_some())
}

fn resolve_one<'c>(claim: &str, catalog: &'c EvidenceCatalog) -> Option<&'c str> {
    let normalized = normalize(claim);
    if normalized.starts_with(NO_EVIDENCE_MARKER) {
        return None;
    }
    catalog.lookup(&normalized)
}
