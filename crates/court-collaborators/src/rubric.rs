//! Rubric configuration
//!
//! The rubric names the criteria in scoring order, one philosophy per
//! judge, and free-form synthesis rules handed to the narrative step. JSON
//! is the default format; `.yaml`/`.yml` files are read as YAML.

use crate::error::RubricError;
use court_types::{Criterion, Judge};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

/// Guidance for one judicial persona
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JudgePhilosophy {
    /// One-paragraph stance
    #[serde(default)]
    pub core_philosophy: String,
    /// Longer guidance text
    #[serde(default)]
    pub handbook: String,
    /// Areas the judge should weigh most
    #[serde(default)]
    pub focus: Vec<String>,
}

/// Parsed rubric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rubric {
    /// Criteria in scoring order
    pub dimensions: Vec<Criterion>,
    /// Philosophy keyed by `prosecutor`, `defense`, `tech_lead`
    #[serde(default)]
    pub judicial_logic: BTreeMap<String, JudgePhilosophy>,
    /// Passed through verbatim to the synthesizer
    #[serde(default)]
    pub synthesis_rules: serde_json::Value,
}

impl Rubric {
    /// Load a rubric from disk
    ///
    /// # Errors
    /// Returns [`RubricError`] when the file is missing, malformed, empty,
    /// or repeats a dimension id.
    pub fn load(path: &Path) -> Result<Self, RubricError> {
        if !path.is_file() {
            return Err(RubricError::NotFound(path.to_path_buf()));
        }
        let text = std::fs::read_to_string(path).map_err(|source| RubricError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let is_yaml = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"));

        let rubric: Self = if is_yaml {
            serde_yaml::from_str(&text).map_err(|source| RubricError::Yaml {
                path: path.to_path_buf(),
                source,
            })?
        } else {
            serde_json::from_str(&text).map_err(|source| RubricError::Json {
                path: path.to_path_buf(),
                source,
            })?
        };

        if rubric.dimensions.is_empty() {
            return Err(RubricError::Empty(path.to_path_buf()));
        }
        rubric.validate()?;
        tracing::info!(path = %path.display(), dimensions = rubric.dimensions.len(), "rubric loaded");
        Ok(rubric)
    }

    /// Build a rubric in memory
    #[must_use]
    pub fn new(dimensions: Vec<Criterion>) -> Self {
        Self {
            dimensions,
            judicial_logic: BTreeMap::new(),
            synthesis_rules: serde_json::Value::Null,
        }
    }

    /// Add a judge philosophy
    #[must_use]
    pub fn with_philosophy(mut self, judge: Judge, philosophy: JudgePhilosophy) -> Self {
        self.judicial_logic.insert(judge.rubric_key().to_string(), philosophy);
        self
    }

    /// Set the synthesis rules
    #[must_use]
    pub fn with_synthesis_rules(mut self, rules: serde_json::Value) -> Self {
        self.synthesis_rules = rules;
        self
    }

    /// Philosophy for a judge, empty when the rubric has none
    #[must_use]
    pub fn philosophy(&self, judge: Judge) -> JudgePhilosophy {
        self.judicial_logic
            .get(judge.rubric_key())
            .cloned()
            .unwrap_or_default()
    }

    fn validate(&self) -> Result<(), RubricError> {
        let mut seen = HashSet::new();
        for criterion in &self.dimensions {
            if !seen.insert(criterion.id.as_str()) {
                return Err(RubricError::DuplicateDimension(criterion.id.clone()));
            }
        }
        Ok(())
    }
}
