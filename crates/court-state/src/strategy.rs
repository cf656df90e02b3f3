//! Merge strategy trait and core types
//!
//! Provides the [`MergeStrategy`] trait applied field by field when a
//! stage's partial update is folded into the shared state.

use std::fmt;

/// Merge strategy for one state field
///
/// # Contract
/// `merge()` must never remove anything already present in `current`,
/// and on error `current` is left untouched.
pub trait MergeStrategy<V>: Send + Sync + fmt::Debug {
    /// Fold `incoming` into `current`
    ///
    /// # Errors
    /// Returns [`MergeError`] if the update violates the strategy.
    fn merge(&self, field: &'static str, current: &mut V, incoming: V) -> Result<(), MergeError>;

    /// Strategy classification
    fn kind(&self) -> StrategyKind;

    /// Strategy name (for debugging/serialization)
    fn name(&self) -> &'static str {
        self.kind().name()
    }
}

/// Declared strategy classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StrategyKind {
    /// Key-wise disjoint union; colliding keys are an error
    KeyedUnion,
    /// Append in arrival order
    AppendInOrder,
    /// Replace when a new value is supplied, restricted to one writer per barrier
    LastWriterWins,
}

impl StrategyKind {
    /// Stable name
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::KeyedUnion => "KeyedUnion",
            Self::AppendInOrder => "AppendInOrder",
            Self::LastWriterWins => "LastWriterWins",
        }
    }

    /// Whether the field holds a single value
    #[inline]
    #[must_use]
    pub fn is_scalar(self) -> bool {
        matches!(self, Self::LastWriterWins)
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Merge errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MergeError {
    /// Two producers wrote the same key of a keyed-union field
    #[error("key `{key}` of `{field}` is already owned by another producer")]
    KeyCollision {
        /// Field name
        field: &'static str,
        /// Colliding key
        key: String,
    },

    /// More than one update at the same barrier wrote a scalar field
    #[error("`{field}` written by both `{first}` and `{second}` at the same barrier")]
    ScalarConflict {
        /// Field name
        field: &'static str,
        /// Producer whose value was kept
        first: String,
        /// Producer whose value was rejected
        second: String,
    },
}

impl MergeError {
    /// Name of the field that failed to merge
    #[must_use]
    pub fn field(&self) -> &'static str {
        match self {
            Self::KeyCollision { field, .. } | Self::ScalarConflict { field, .. } => field,
        }
    }
}
