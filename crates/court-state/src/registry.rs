//! Declared field strategies
//!
//! Provides [`FieldStrategies`], the single table naming how every
//! shared-state field is merged.

use crate::strategy::StrategyKind;

/// Field names of the shared audit state
pub mod fields {
    /// Evidence grouped by detective key
    pub const EVIDENCES: &str = "evidences";
    /// Judicial opinions
    pub const OPINIONS: &str = "opinions";
    /// Trace messages
    pub const MESSAGES: &str = "messages";
    /// Local repository root
    pub const REPO_PATH: &str = "repo_path";
    /// Resolved report document path
    pub const PDF_PATH: &str = "pdf_path";
    /// Rubric criteria snapshot
    pub const CRITERIA: &str = "criteria";
}

/// Registry of declared per-field merge strategies
#[derive(Debug, Clone, Copy, Default)]
pub struct FieldStrategies;

impl FieldStrategies {
    /// Declared strategy for every mergeable field
    pub const DECLARED: &'static [(&'static str, StrategyKind)] = &[
        (fields::EVIDENCES, StrategyKind::KeyedUnion),
        (fields::OPINIONS, StrategyKind::AppendInOrder),
        (fields::MESSAGES, StrategyKind::AppendInOrder),
        (fields::REPO_PATH, StrategyKind::LastWriterWins),
        (fields::PDF_PATH, StrategyKind::LastWriterWins),
        (fields::CRITERIA, StrategyKind::LastWriterWins),
    ];

    /// Strategy declared for a field
    #[must_use]
    pub fn lookup(field: &str) -> Option<StrategyKind> {
        Self::DECLARED
            .iter()
            .find(|(name, _)| *name == field)
            .map(|(_, kind)| *kind)
    }

    /// Fields merged with a scalar strategy
    pub fn scalar_fields() -> impl Iterator<Item = &'static str> {
        Self::DECLARED
            .iter()
            .filter(|(_, kind)| kind.is_scalar())
            .map(|(name, _)| *name)
    }

    /// Number of declared fields
    #[inline]
    #[must_use]
    pub fn len() -> usize {
        Self::DECLARED.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_field_is_declared_once() {
        let mut names: Vec<_> = FieldStrategies::DECLARED.iter().map(|(n, _)| *n).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), FieldStrategies::len());
    }

    #[test]
    fn lookup_matches_declaration() {
        assert_eq!(FieldStrategies::lookup("evidences"), Some(StrategyKind::KeyedUnion));
        assert_eq!(FieldStrategies::lookup("messages"), Some(StrategyKind::AppendInOrder));
        assert_eq!(FieldStrategies::lookup("unknown"), None);
        assert_eq!(
            FieldStrategies::scalar_fields().collect::<Vec<_>>(),
            vec!["repo_path", "pdf_path", "criteria"]
        );
    }
}
