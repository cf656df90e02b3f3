//! Courtroom kernel
//!
//! Static stage graph executed with explicit join barriers.
//!
//! # Core Concepts
//!
//! - [`Stage`]: One async node returning a partial state update
//! - [`StageGraph`]: Named stages plus "finishes before" edges, validated acyclic
//! - [`Scheduler`]: Runs each level concurrently, merges at the barrier,
//!   isolates stage failures
//!
//! # Example
//!
//! ```rust,ignore
//! use court_kernel::{Scheduler, StageGraph};
//!
//! let graph = StageGraph::builder()
//!     .stage(investigate)
//!     .stage(analyze_document)
//!     .stage(analyze_vision)
//!     .edge("investigate", "analyze_document")
//!     .edge("investigate", "analyze_vision")
//!     .build()?;
//!
//! let outcome = Scheduler::new().run(&graph, AuditState::new(url)).await;
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod error;
mod graph;
mod scheduler;
mod stage;

pub use error::{GraphError, StageError};
pub use graph::{StageGraph, StageGraphBuilder};
pub use scheduler::{RunOutcome, Scheduler, StageReport, StageStatus};
pub use stage::Stage;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude for common imports
pub mod prelude {
    pub use crate::{GraphError, RunOutcome, Scheduler, Stage, StageError, StageGraph};
}

#[cfg(test)]
mod integration_tests {
    use super::*;
    use court_state::{AuditState, StateUpdate};
    use std::sync::Arc;

    struct Named(&'static str);

    #[async_trait::async_trait]
    impl Stage for Named {
        fn name(&self) -> &str {
            self.0
        }

        async fn run(&self, _state: Arc<AuditState>) -> Result<StateUpdate, StageError> {
            Ok(StateUpdate::message(self.0))
        }
    }

    fn stage(name: &'static str) -> Arc<dyn Stage> {
        Arc::new(Named(name))
    }

    #[test]
    fn fan_out_fan_in_levels() {
        let graph = StageGraph::builder()
            .stage(stage("investigate"))
            .stage(stage("analyze_document"))
            .stage(stage("analyze_vision"))
            .stage(stage("aggregate"))
            .edge("investigate", "analyze_document")
            .edge("investigate", "analyze_vision")
            .after("aggregate", ["investigate", "analyze_document", "analyze_vision"])
            .build()
            .unwrap();

        let levels: Vec<Vec<&str>> = graph
            .levels()
            .map(|level| level.iter().map(|s| s.name()).collect())
            .collect();
        assert_eq!(
            levels,
            vec![
                vec!["investigate"],
                vec!["analyze_document", "analyze_vision"],
                vec!["aggregate"],
            ]
        );
        assert_eq!(
            graph.predecessors("aggregate"),
            vec!["investigate", "analyze_document", "analyze_vision"]
        );
        assert_eq!(graph.level_of("analyze_vision"), Some(1));
    }

    #[test]
    fn builder_rejects_invalid_graphs() {
        assert_eq!(StageGraph::builder().build().unwrap_err(), GraphError::Empty);

        let duplicate = StageGraph::builder().stage(stage("a")).stage(stage("a")).build();
        assert_eq!(duplicate.unwrap_err(), GraphError::DuplicateStage("a".into()));

        let unknown = StageGraph::builder().stage(stage("a")).edge("a", "b").build();
        assert_eq!(unknown.unwrap_err(), GraphError::UnknownStage("b".into()));

        let self_loop = StageGraph::builder().stage(stage("a")).edge("a", "a").build();
        assert_eq!(self_loop.unwrap_err(), GraphError::SelfLoop("a".into()));

        let cycle = StageGraph::builder()
            .stage(stage("a"))
            .stage(stage("b"))
            .edge("a", "b")
            .edge("b", "a")
            .build();
        assert!(matches!(cycle.unwrap_err(), GraphError::CycleDetected(_)));
    }

    #[tokio::test]
    async fn later_levels_see_merged_messages() {
        let graph = StageGraph::builder()
            .stage(stage("first"))
            .stage(stage("second"))
            .edge("first", "second")
            .build()
            .unwrap();

        let outcome = Scheduler::new().run(&graph, AuditState::new("r")).await;
        assert_eq!(outcome.state.messages(), ["first".to_string(), "second".to_string()]);
        assert!(outcome.stages.iter().all(|r| !r.recovered()));
    }
}
