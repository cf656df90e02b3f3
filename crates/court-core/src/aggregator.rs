//! Fan-in barrier after the detectives

use async_trait::async_trait;
use court_kernel::{Stage, StageError};
use court_state::{AuditState, StateUpdate};
use court_types::EvidenceKey;
use std::sync::Arc;

/// Stage name of the aggregator
pub const AGGREGATE: &str = "aggregate";

/// Checks that every detective reported and names the gaps
///
/// Writes nothing but a trace message; the barrier itself is what
/// synchronizes the parallel tracks.
#[derive(Debug, Default, Clone, Copy)]
pub struct AggregateStage;

impl AggregateStage {
    /// Create the stage
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Detective keys with no evidence in `state`
    #[must_use]
    pub fn missing_keys(state: &AuditState) -> Vec<EvidenceKey> {
        EvidenceKey::detective_keys()
            .into_iter()
            .filter(|key| state.evidence_for(key.as_str()).map_or(true, <[_]>::is_empty))
            .collect()
    }
}

#[async_trait]
impl Stage for AggregateStage {
    fn name(&self) -> &str {
        AGGREGATE
    }

    async fn run(&self, state: Arc<AuditState>) -> Result<StateUpdate, StageError> {
        let missing = Self::missing_keys(&state);
        if missing.is_empty() {
            return Ok(StateUpdate::message(format!(
                "{AGGREGATE}: all parallel forensic tracks synchronized"
            )));
        }

        let names: Vec<&str> = missing.iter().map(EvidenceKey::as_str).collect();
        tracing::warn!(missing = ?names, "evidence gaps before judging");
        Ok(StateUpdate::message(format!(
            "{AGGREGATE}: completed with gaps: [{}]",
            names.join(", ")
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use court_types::Evidence;

    #[tokio::test]
    async fn gaps_are_named() {
        let state = AuditState::new("repo")
            .merge(StateUpdate::new().with_evidence(
                EvidenceKey::repository(),
                vec![Evidence::not_found("goal", "repo", "clone failed")],
            ))
            .unwrap();

        let update = AggregateStage::new().run(Arc::new(state)).await.unwrap();
        assert_eq!(
            update.messages,
            vec!["aggregate: completed with gaps: [doc_analysis, vision_analysis]".to_string()]
        );
        assert!(update.evidences.is_empty());
    }

    #[tokio::test]
    async fn complete_tracks_synchronize() {
        let mut update = StateUpdate::new();
        for key in EvidenceKey::detective_keys() {
            update = update.with_evidence(key, vec![Evidence::not_found("g", "l", "r")]);
        }
        let state = AuditState::new("repo").merge(update).unwrap();

        let update = AggregateStage::new().run(Arc::new(state)).await.unwrap();
        assert_eq!(
            update.messages,
            vec!["aggregate: all parallel forensic tracks synchronized".to_string()]
        );
    }
}
