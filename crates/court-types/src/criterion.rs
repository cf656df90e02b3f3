//! Rubric criteria

use serde::{Deserialize, Serialize};

/// Criteria aggregated with role weights when the rubric does not say otherwise
pub const WEIGHTED_CRITERIA: [&str; 2] = ["graph_orchestration", "state_management_rigor"];

/// How judge scores are combined for a criterion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeightClass {
    /// Role-weighted mean (TechLead counts double)
    Weighted,
    /// Plain mean over present judges
    Standard,
}

impl WeightClass {
    /// Default class for a criterion id
    #[must_use]
    pub fn for_id(id: &str) -> Self {
        if WEIGHTED_CRITERIA.contains(&id) {
            Self::Weighted
        } else {
            Self::Standard
        }
    }
}

/// One scored rubric dimension
///
/// Loaded once from the rubric and read-only for the lifetime of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Criterion {
    /// Stable identifier (`graph_orchestration`, ...)
    pub id: String,
    /// Display name
    pub name: String,
    /// What the judges should look for
    #[serde(default)]
    pub forensic_instruction: String,
    /// What a passing implementation looks like
    #[serde(default)]
    pub success_pattern: String,
    /// What a failing implementation looks like
    #[serde(default)]
    pub failure_pattern: String,
    /// Artifact the criterion is assessed against (repository, report, diagrams)
    #[serde(default)]
    pub target_artifact: String,
    /// Aggregation class; derived from the id when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    weight_class: Option<WeightClass>,
}

impl Criterion {
    /// Create a criterion with empty guidance text
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            forensic_instruction: String::new(),
            success_pattern: String::new(),
            failure_pattern: String::new(),
            target_artifact: String::new(),
            weight_class: None,
        }
    }

    /// Set the forensic instruction
    #[must_use]
    pub fn with_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.forensic_instruction = instruction.into();
        self
    }

    /// Set the success and failure patterns
    #[must_use]
    pub fn with_patterns(mut self, success: impl Into<String>, failure: impl Into<String>) -> Self {
        self.success_pattern = success.into();
        self.failure_pattern = failure.into();
        self
    }

    /// Set the target artifact
    #[must_use]
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target_artifact = target.into();
        self
    }

    /// Override the aggregation class
    #[must_use]
    pub fn with_weight_class(mut self, class: WeightClass) -> Self {
        self.weight_class = Some(class);
        self
    }

    /// Aggregation class given in the rubric, if any
    #[inline]
    #[must_use]
    pub fn declared_weight_class(&self) -> Option<WeightClass> {
        self.weight_class
    }

    /// Effective aggregation class
    #[must_use]
    pub fn weight_class(&self) -> WeightClass {
        self.weight_class
            .unwrap_or_else(|| WeightClass::for_id(&self.id))
    }
}
