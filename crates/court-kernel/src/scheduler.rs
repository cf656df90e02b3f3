//! Barrier scheduler
//!
//! Runs a [`StageGraph`] level by level. Stages within a level run
//! concurrently as separate tasks against the same snapshot; the level
//! boundary is a join barrier where every update is merged in
//! declaration order. A stage that fails or panics is replaced by its
//! [`Stage::recover`] update, so siblings and downstream levels are
//! never affected.

use crate::error::StageError;
use crate::graph::StageGraph;
use crate::stage::Stage;
use court_state::{AuditState, MergeRejection, StateUpdate};
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// How a stage finished
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageStatus {
    /// `run` returned an update
    Completed,
    /// `run` failed or panicked and the recovery update was used
    Recovered {
        /// Error classification
        kind: &'static str,
        /// Error text
        error: String,
    },
}

/// Per-stage execution record
#[derive(Debug, Clone)]
pub struct StageReport {
    /// Stage name
    pub stage: String,
    /// Execution level
    pub level: usize,
    /// Outcome
    pub status: StageStatus,
    /// Wall time from spawn to completion
    pub elapsed: Duration,
}

impl StageReport {
    /// Whether the stage needed recovery
    #[inline]
    #[must_use]
    pub fn recovered(&self) -> bool {
        matches!(self.status, StageStatus::Recovered { .. })
    }
}

/// Result of a full run
#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// Final state
    pub state: AuditState,
    /// One report per stage, in execution order
    pub stages: Vec<StageReport>,
    /// Update parts refused at barriers
    pub rejections: Vec<MergeRejection>,
}

impl RunOutcome {
    /// Report for a stage
    #[must_use]
    pub fn stage(&self, name: &str) -> Option<&StageReport> {
        self.stages.iter().find(|r| r.stage == name)
    }
}

/// Level-by-level executor
#[derive(Debug, Clone, Copy, Default)]
pub struct Scheduler;

impl Scheduler {
    /// Create a scheduler
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Run every stage of `graph` starting from `initial`
    ///
    /// Never fails: stage errors become recovery updates and merge
    /// conflicts become trace messages.
    pub async fn run(&self, graph: &StageGraph, initial: AuditState) -> RunOutcome {
        let mut state = initial;
        let mut reports = Vec::with_capacity(graph.len());
        let mut rejections = Vec::new();

        for (level, stages) in graph.levels().enumerate() {
            let snapshot = Arc::new(state);
            let started = Instant::now();

            let handles: Vec<_> = stages
                .iter()
                .map(|stage| {
                    let stage = Arc::clone(stage);
                    let snapshot = Arc::clone(&snapshot);
                    tracing::info!(stage = stage.name(), level, "stage started");
                    tokio::spawn(async move {
                        let result = stage.run(snapshot).await;
                        (result, started.elapsed())
                    })
                })
                .collect();

            let joined = join_all(handles).await;

            let mut updates: Vec<(String, StateUpdate)> = Vec::with_capacity(stages.len());
            for (stage, result) in stages.iter().zip(joined) {
                let (outcome, elapsed) = match result {
                    Ok((outcome, elapsed)) => (outcome, elapsed),
                    Err(join_error) => (Err(StageError::from_join(join_error)), started.elapsed()),
                };
                let (update, status) = settle(stage, outcome);
                reports.push(StageReport {
                    stage: stage.name().to_string(),
                    level,
                    status,
                    elapsed,
                });
                updates.push((stage.name().to_string(), update));
            }

            // every task has finished, so the snapshot is normally unique again
            let base = Arc::try_unwrap(snapshot).unwrap_or_else(|shared| (*shared).clone());
            let barrier = base.merge_barrier(updates);
            rejections.extend(barrier.rejections);
            state = barrier.state;
            tracing::debug!(level, "barrier merged");
        }

        RunOutcome {
            state,
            stages: reports,
            rejections,
        }
    }
}

fn settle(stage: &Arc<dyn Stage>, outcome: Result<StateUpdate, StageError>) -> (StateUpdate, StageStatus) {
    match outcome {
        Ok(update) => {
            tracing::info!(stage = stage.name(), "stage completed");
            (update, StageStatus::Completed)
        }
        Err(error) => {
            tracing::warn!(stage = stage.name(), kind = error.kind(), %error, "stage failed, using recovery update");
            let update = stage.recover(&error);
            (
                update,
                StageStatus::Recovered {
                    kind: error.kind(),
                    error: error.to_string(),
                },
            )
        }
    }
}
