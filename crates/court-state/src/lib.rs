//! Shared audit state
//!
//! The record threaded through every stage, with explicitly declared
//! per-field merge strategies.
//!
//! # Core Concepts
//!
//! - [`MergeStrategy`]: Core trait for folding a field update into state
//! - [`KeyedUnion`]: Disjoint key ownership (evidence)
//! - [`AppendInOrder`]: Arrival-ordered logs (opinions, messages)
//! - [`LastWriterWins`]: Single-writer scalars (paths, criteria)
//! - [`FieldStrategies`]: The declared field → strategy table
//! - [`AuditState`] / [`StateUpdate`]: Snapshot and partial update
//!
//! # Example
//!
//! ```rust
//! use court_state::{AuditState, StateUpdate};
//!
//! let state = AuditState::new("https://github.com/acme/agent.git");
//! let outcome = state.merge_barrier([
//!     ("analyze_document", StateUpdate::message("doc done")),
//!     ("analyze_vision", StateUpdate::message("vision done")),
//! ]);
//!
//! assert!(outcome.rejections.is_empty());
//! assert_eq!(outcome.state.messages().len(), 2);
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod append;
mod keyed_union;
mod last_writer;
mod registry;
mod state;
mod strategy;

pub use append::AppendInOrder;
pub use keyed_union::KeyedUnion;
pub use last_writer::LastWriterWins;
pub use registry::{fields, FieldStrategies};
pub use state::{AuditState, BarrierOutcome, EvidenceMap, MergeRejection, StateUpdate};
pub use strategy::{MergeError, MergeStrategy, StrategyKind};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod integration_tests {
    use super::*;

    #[test]
    fn strategies_report_their_declared_kind() {
        assert_eq!(
            MergeStrategy::<EvidenceMap>::kind(&KeyedUnion),
            FieldStrategies::lookup(fields::EVIDENCES).unwrap()
        );
        assert_eq!(
            MergeStrategy::<Vec<String>>::kind(&AppendInOrder),
            FieldStrategies::lookup(fields::MESSAGES).unwrap()
        );
        assert_eq!(
            MergeStrategy::<Option<String>>::name(&LastWriterWins),
            "LastWriterWins"
        );
    }
}
