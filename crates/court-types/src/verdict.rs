//! Derived verdict records

use crate::opinion::{Judge, Score};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// An opinion after citation validation
///
/// Computed once from a [`crate::JudicialOpinion`] and the evidence catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JudgeRecord {
    /// Role that produced the opinion
    pub judge: Judge,
    /// Raw score
    pub score: Score,
    /// Argument as given
    pub argument: String,
    /// Resolved citations
    pub cited_evidence: Vec<String>,
    /// Score after the citation discount
    pub effective_score: f64,
    /// Whether the citation discount was applied
    pub discounted: bool,
}

/// Final verdict for one criterion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriterionResult {
    /// Criterion id
    pub criterion_id: String,
    /// Criterion display name
    pub criterion_name: String,
    /// Rounded, clamped final score
    pub final_score: u8,
    /// Effective-score spread exceeded the dissent threshold
    pub contested: bool,
    /// Names every present judge's effective score when contested
    pub dissent_summary: Option<String>,
    /// Validated opinions in judge order; empty when no opinion was captured
    pub judge_records: Vec<JudgeRecord>,
}

impl CriterionResult {
    /// Result used when no judge produced an opinion for the criterion
    #[must_use]
    pub fn placeholder(criterion_id: impl Into<String>, criterion_name: impl Into<String>) -> Self {
        Self {
            criterion_id: criterion_id.into(),
            criterion_name: criterion_name.into(),
            final_score: Score::MIN.get(),
            contested: false,
            dissent_summary: None,
            judge_records: Vec::new(),
        }
    }

    /// Whether any opinion was captured
    #[inline]
    #[must_use]
    pub fn has_opinions(&self) -> bool {
        !self.judge_records.is_empty()
    }
}

/// Overall grade band
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Grade {
    /// Overall score of at least 4.5
    MasterThinker,
    /// Overall score of at least 3.0
    CompetentOrchestrator,
    /// Anything lower
    VibeCoder,
}

impl Grade {
    /// Band for an overall score
    #[must_use]
    pub fn for_score(score: f64) -> Self {
        if score >= 4.5 {
            Self::MasterThinker
        } else if score >= 3.0 {
            Self::CompetentOrchestrator
        } else {
            Self::VibeCoder
        }
    }

    /// Report label
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::MasterThinker => "Master Thinker",
            Self::CompetentOrchestrator => "Competent Orchestrator",
            Self::VibeCoder => "The Vibe Coder",
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Terminal artifact of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditReport {
    /// Repository that was audited
    pub repo_url: String,
    /// Generation time
    pub generated_at: DateTime<Utc>,
    /// Mean of all criterion final scores
    pub overall_score: f64,
    /// Band for `overall_score`
    pub overall_grade: Grade,
    /// One result per configured criterion, in rubric order
    pub criteria: Vec<CriterionResult>,
    /// Narrative summary
    pub executive_summary: String,
    /// Remediation bullets
    pub remediation_plan: Vec<String>,
}
