//! Stage trait

use crate::error::StageError;
use court_state::{AuditState, StateUpdate};
use std::sync::Arc;

/// One node of the audit graph
///
/// A stage is a function of the shared-state snapshot plus whatever
/// collaborators it was constructed with. It returns a partial update
/// that the scheduler merges at the next barrier.
#[async_trait::async_trait]
pub trait Stage: Send + Sync {
    /// Unique stage name
    fn name(&self) -> &str;

    /// Execute against a snapshot of the state
    ///
    /// # Errors
    /// Any [`StageError`] is caught by the scheduler and replaced by
    /// [`Stage::recover`].
    async fn run(&self, state: Arc<AuditState>) -> Result<StateUpdate, StageError>;

    /// Degraded update substituted when `run` fails or panics
    fn recover(&self, error: &StageError) -> StateUpdate {
        StateUpdate::message(format!(
            "{}: stage failed ({error}); continuing with degraded result",
            self.name()
        ))
    }
}
