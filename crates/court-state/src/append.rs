//! Append-in-order strategy

use crate::strategy::{MergeError, MergeStrategy, StrategyKind};

/// Append incoming items after existing ones, preserving producer order
#[derive(Debug, Clone, Copy, Default)]
pub struct AppendInOrder;

impl AppendInOrder {
    /// Create new append strategy
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl<T: Send + Sync> MergeStrategy<Vec<T>> for AppendInOrder {
    fn merge(&self, _field: &'static str, current: &mut Vec<T>, incoming: Vec<T>) -> Result<(), MergeError> {
        current.extend(incoming);
        Ok(())
    }

    fn kind(&self) -> StrategyKind {
        StrategyKind::AppendInOrder
    }
}
