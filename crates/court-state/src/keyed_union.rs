//! Keyed union strategy
//!
//! Each producer owns a disjoint set of keys, so union is conflict-free,
//! commutative and associative. A collision means two producers claimed
//! the same key and is reported rather than resolved.

use crate::strategy::{MergeError, MergeStrategy, StrategyKind};
use std::collections::BTreeMap;
use std::fmt::Display;

/// Key-wise disjoint union
#[derive(Debug, Clone, Copy, Default)]
pub struct KeyedUnion;

impl KeyedUnion {
    /// Create new keyed union strategy
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// First incoming key already present in `current`
    fn first_collision<'a, K: Ord, V>(
        current: &BTreeMap<K, V>,
        incoming: &'a BTreeMap<K, V>,
    ) -> Option<&'a K> {
        incoming.keys().find(|key| current.contains_key(*key))
    }
}

impl<K, V> MergeStrategy<BTreeMap<K, V>> for KeyedUnion
where
    K: Ord + Display + Send + Sync,
    V: Send + Sync,
{
    fn merge(
        &self,
        field: &'static str,
        current: &mut BTreeMap<K, V>,
        incoming: BTreeMap<K, V>,
    ) -> Result<(), MergeError> {
        if let Some(key) = Self::first_collision(current, &incoming) {
            return Err(MergeError::KeyCollision {
                field,
                key: key.to_string(),
            });
        }
        current.extend(incoming);
        Ok(())
    }

    fn kind(&self) -> StrategyKind {
        StrategyKind::KeyedUnion
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disjoint_keys_union() {
        let mut current = BTreeMap::from([("a".to_string(), 1)]);
        KeyedUnion
            .merge("evidences", &mut current, BTreeMap::from([("b".to_string(), 2)]))
            .unwrap();
        assert_eq!(current.len(), 2);
    }

    #[test]
    fn collision_leaves_current_untouched() {
        let mut current = BTreeMap::from([("a".to_string(), 1)]);
        let incoming = BTreeMap::from([("z".to_string(), 9), ("a".to_string(), 2)]);

        let err = KeyedUnion.merge("evidences", &mut current, incoming).unwrap_err();
        assert_eq!(
            err,
            MergeError::KeyCollision {
                field: "evidences",
                key: "a".to_string()
            }
        );
        assert_eq!(current, BTreeMap::from([("a".to_string(), 1)]));
    }
}
