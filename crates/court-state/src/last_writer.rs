//! Last-writer-wins strategy for scalar fields
//!
//! An absent incoming value never clears the current one. Restricting
//! writers to one per barrier is enforced by [`crate::AuditState::merge_barrier`].

use crate::strategy::{MergeError, MergeStrategy, StrategyKind};

/// Replace the current value when the update supplies one
#[derive(Debug, Clone, Copy, Default)]
pub struct LastWriterWins;

impl LastWriterWins {
    /// Create new last-writer-wins strategy
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl<T: Send + Sync> MergeStrategy<Option<T>> for LastWriterWins {
    fn merge(&self, _field: &'static str, current: &mut Option<T>, incoming: Option<T>) -> Result<(), MergeError> {
        if incoming.is_some() {
            *current = incoming;
        }
        Ok(())
    }

    fn kind(&self) -> StrategyKind {
        StrategyKind::LastWriterWins
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_never_clears() {
        let mut current = Some(1);
        LastWriterWins.merge("repo_path", &mut current, None).unwrap();
        assert_eq!(current, Some(1));

        LastWriterWins.merge("repo_path", &mut current, Some(2)).unwrap();
        assert_eq!(current, Some(2));
    }
}
