//! Evidence catalog
//!
//! Provides [`EvidenceCatalog`], the ordered, de-duplicated set of
//! normalized strings judges are allowed to cite.

use crate::normalize::{fold, normalize};
use court_types::{Evidence, EvidenceKey};
use serde_json::Value;
use std::collections::HashSet;

/// Maximum flattened `key: value` facts taken from one structured payload
pub const MAX_FACTS_PER_RECORD: usize = 32;

/// Nesting depth explored when flattening structured payloads
const MAX_FACT_DEPTH: usize = 2;

/// Catalog entry with its cached comparison key
#[derive(Debug, Clone)]
struct CatalogEntry {
    text: String,
    folded: String,
}

/// Normalized, insertion-ordered set of citable evidence strings
///
/// Built once per run from every [`Evidence`] record and its owning
/// detective key. For each record the goal, location, rendered content
/// and (for structured content) flattened `key: value` facts are
/// catalogued, followed by the key itself.
#[derive(Debug, Clone, Default)]
pub struct EvidenceCatalog {
    entries: Vec<CatalogEntry>,
    seen: HashSet<String>,
}

impl EvidenceCatalog {
    /// Create empty catalog
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a catalog from grouped evidence
    pub fn build<'a, I>(groups: I) -> Self
    where
        I: IntoIterator<Item = (&'a EvidenceKey, &'a Vec<Evidence>)>,
    {
        let mut catalog = Self::new();
        for (key, records) in groups {
            for evidence in records {
                catalog.insert_evidence(evidence);
            }
            catalog.insert(key.as_str());
        }
        catalog
    }

    /// Insert one record's citable strings
    pub fn insert_evidence(&mut self, evidence: &Evidence) {
        self.insert(&evidence.goal);
        self.insert(&evidence.location);
        if let Some(text) = evidence.content_text() {
            self.insert(&text);
        }
        if let Some(content) = &evidence.content {
            let mut facts = Vec::new();
            flatten_facts(content, 0, &mut facts);
            for fact in facts.into_iter().take(MAX_FACTS_PER_RECORD) {
                self.insert(&fact);
            }
        }
    }

    /// Insert a raw string, returning whether it was new
    ///
    /// Empty strings (after normalization) are ignored.
    pub fn insert(&mut self, raw: &str) -> bool {
        let text = normalize(raw);
        if text.is_empty() || !self.seen.insert(text.clone()) {
            return false;
        }
        let folded = fold(&text);
        self.entries.push(CatalogEntry { text, folded });
        true
    }

    /// Number of entries
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in insertion order
    pub fn entries(&self) -> impl Iterator<Item = &str> + '_ {
        self.entries.iter().map(|entry| entry.text.as_str())
    }

    /// Exact membership of an already-normalized string
    #[must_use]
    pub fn contains(&self, normalized: &str) -> bool {
        self.seen.contains(normalized)
    }

    /// Find the entry a normalized claim refers to
    ///
    /// Exact match first, then case-insensitive substring in either
    /// direction, first catalog entry wins. Entries made only of
    /// separators match exactly or not at all.
    #[must_use]
    pub fn lookup(&self, normalized_claim: &str) -> Option<&str> {
        if normalized_claim.is_empty() {
            return None;
        }
        if let Some(entry) = self.entries.iter().find(|e| e.text == normalized_claim) {
            return Some(&entry.text);
        }

        let probe = fold(normalized_claim);
        if probe.is_empty() {
            return None;
        }
        self.entries
            .iter()
            .filter(|entry| !entry.folded.is_empty())
            .find(|entry| entry.folded.contains(&probe) || probe.contains(&entry.folded))
            .map(|entry| entry.text.as_str())
    }
}

fn flatten_facts(value: &Value, depth: usize, facts: &mut Vec<String>) {
    let Value::Object(map) = value else {
        return;
    };
    for (key, child) in map {
        if facts.len() >= MAX_FACTS_PER_RECORD {
            return;
        }
        match child {
            Value::String(s) => facts.push(format!("{key}: {s}")),
            Value::Bool(b) => facts.push(format!("{key}: {b}")),
            Value::Number(n) => facts.push(format!("{key}: {n}")),
            Value::Object(_) if depth + 1 < MAX_FACT_DEPTH => flatten_facts(child, depth + 1, facts),
            _ => {}
        }
    }
}
