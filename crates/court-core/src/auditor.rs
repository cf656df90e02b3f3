//! Audit run assembly
//!
//! Wires the eight stages into the fixed graph
//!
//! ```text
//!                 ┌─ analyze_document ─┐              ┌─ judge_prosecutor ─┐
//! investigate ────┤                    ├─ aggregate ──┼─ judge_defense ────┼─ synthesize
//!                 └─ analyze_vision ───┘              └─ judge_tech_lead ──┘
//! ```
//!
//! and runs it over the initial state.

use crate::aggregator::{AggregateStage, AGGREGATE};
use crate::detectives::{DocumentStage, InvestigateStage, VisionStage, ANALYZE_DOCUMENT, ANALYZE_VISION, INVESTIGATE};
use crate::error::{AuditError, Result};
use crate::judges::{stage_name, JudgeStage};
use crate::runtime::AuditRuntime;
use crate::synthesis::{ReportSlot, SynthesizeStage, SYNTHESIZE};
use court_kernel::{Scheduler, Stage, StageGraph, StageReport, StageStatus};
use court_state::AuditState;
use court_types::{AuditReport, Judge};
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};

/// What to audit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditRequest {
    /// Repository URL or local directory
    pub repo_url: String,
    /// Requested report document (absolute, or relative to the repository root)
    pub pdf_path: Option<PathBuf>,
}

impl AuditRequest {
    /// Audit a repository without naming a report document
    #[must_use]
    pub fn new(repo_url: impl Into<String>) -> Self {
        Self {
            repo_url: repo_url.into(),
            pdf_path: None,
        }
    }

    /// Name the report document
    #[must_use]
    pub fn with_pdf_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.pdf_path = Some(path.into());
        self
    }
}

/// Result of a run
#[derive(Debug, Clone)]
pub struct AuditOutcome {
    /// The finished report
    pub report: AuditReport,
    /// Where it was written
    pub report_path: PathBuf,
    /// Final shared state
    pub state: AuditState,
    /// Per-stage outcomes in execution order
    pub stages: Vec<StageReport>,
}

impl AuditOutcome {
    /// Stages that fell back to their degraded update
    #[must_use]
    pub fn recovered_stages(&self) -> Vec<&str> {
        self.stages
            .iter()
            .filter(|report| report.recovered())
            .map(|report| report.stage.as_str())
            .collect()
    }
}

/// Runs audits against one runtime
#[derive(Debug, Clone)]
pub struct Auditor {
    runtime: Arc<AuditRuntime>,
}

impl Auditor {
    /// Create an auditor
    #[must_use]
    pub fn new(runtime: AuditRuntime) -> Self {
        Self {
            runtime: Arc::new(runtime),
        }
    }

    /// Shared runtime
    #[must_use]
    pub fn runtime(&self) -> &AuditRuntime {
        &self.runtime
    }

    /// Build the stage graph, publishing the report into `slot`
    ///
    /// # Errors
    /// [`AuditError::Graph`] if the graph is rejected.
    pub fn graph(&self, slot: ReportSlot) -> Result<StageGraph> {
        let runtime = &self.runtime;
        let judges: Vec<String> = Judge::ALL.into_iter().map(stage_name).collect();

        let mut builder = StageGraph::builder()
            .stage(Arc::new(InvestigateStage::new(Arc::clone(runtime))))
            .stage(Arc::new(DocumentStage::new(Arc::clone(runtime))))
            .stage(Arc::new(VisionStage::new(Arc::clone(runtime))))
            .stage(Arc::new(AggregateStage::new()))
            .edge(INVESTIGATE, ANALYZE_DOCUMENT)
            .edge(INVESTIGATE, ANALYZE_VISION)
            .after(AGGREGATE, [INVESTIGATE, ANALYZE_DOCUMENT, ANALYZE_VISION]);

        for judge in Judge::ALL {
            let stage: Arc<dyn Stage> = Arc::new(JudgeStage::new(judge, Arc::clone(runtime)));
            builder = builder.stage(stage).edge(AGGREGATE, stage_name(judge));
        }
        builder = builder.stage(Arc::new(SynthesizeStage::new(Arc::clone(runtime), slot)));
        Ok(builder.after(SYNTHESIZE, judges).build()?)
    }

    /// Run one audit
    ///
    /// Stage failures never abort the run; only a missing report does.
    ///
    /// # Errors
    /// [`AuditError::Graph`] if the graph is rejected,
    /// [`AuditError::Synthesis`] if the synthesize stage did not publish a report.
    pub async fn run(&self, request: AuditRequest) -> Result<AuditOutcome> {
        let slot: ReportSlot = Arc::new(OnceLock::new());
        let graph = self.graph(Arc::clone(&slot))?;

        let mut initial = AuditState::new(request.repo_url.clone())
            .with_criteria(self.runtime.rubric().dimensions.clone());
        if let Some(pdf) = request.pdf_path {
            initial = initial.with_requested_pdf(pdf);
        }

        tracing::info!(
            repo = %request.repo_url,
            criteria = self.runtime.rubric().dimensions.len(),
            stages = graph.len(),
            "audit started"
        );
        let outcome = Scheduler::new().run(&graph, initial).await;
        for message in outcome.state.messages() {
            tracing::info!(target: "courtroom::trace", "{message}");
        }

        if let Some(StageReport {
            status: StageStatus::Recovered { error, .. },
            ..
        }) = outcome.stage(SYNTHESIZE)
        {
            return Err(AuditError::Synthesis(error.clone()));
        }
        let report = slot
            .get()
            .cloned()
            .ok_or_else(|| AuditError::Synthesis("no report was published".to_string()))?;

        tracing::info!(
            grade = %report.overall_grade,
            score = report.overall_score,
            recovered = outcome.stages.iter().filter(|s| s.recovered()).count(),
            "audit finished"
        );
        Ok(AuditOutcome {
            report,
            report_path: self.runtime.config().report_path.clone(),
            state: outcome.state,
            stages: outcome.stages,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AuditConfig;
    use court_test_utils::{sample_rubric, ScriptedModel};
    use pretty_assertions::assert_eq;

    #[test]
    fn graph_has_the_courtroom_levels() {
        let runtime = AuditRuntime::new(
            AuditConfig::default(),
            sample_rubric(),
            Arc::new(ScriptedModel::replying("{}")),
        );
        let graph = Auditor::new(runtime).graph(Arc::new(OnceLock::new())).unwrap();

        let levels: Vec<Vec<&str>> = graph
            .levels()
            .map(|level| level.iter().map(|stage| stage.name()).collect())
            .collect();
        assert_eq!(
            levels,
            vec![
                vec!["investigate"],
                vec!["analyze_document", "analyze_vision"],
                vec!["aggregate"],
                vec!["judge_prosecutor", "judge_defense", "judge_tech_lead"],
                vec!["synthesize"],
            ]
        );
        assert_eq!(
            graph.predecessors("synthesize"),
            vec!["judge_prosecutor", "judge_defense", "judge_tech_lead"]
        );
    }
}
