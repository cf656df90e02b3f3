//! Run configuration
//!
//! An optional TOML file deserialized into [`AuditConfig`]. Every field
//! has a default, so an empty file (or no file) is a valid configuration.
//!
//! ```toml
//! rubric_path = "rubric.json"
//! report_path = "out/audit_report.md"
//!
//! [model]
//! judge_model = "llama-3.1-8b-instant"
//!
//! [retry]
//! max_attempts = 3
//! rate_limit_pause = 60.0
//!
//! [pacing]
//! per_criterion = 15.0
//! ```

use crate::error::{AuditError, Result};
use crate::scoring::ScoringPolicy;
use court_llm::{RetryPolicy, DEFAULT_ENDPOINT};
use court_types::Judge;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Model backend settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Chat-completions endpoint
    pub endpoint: String,
    /// Environment variable holding the API key
    pub api_key_env: String,
    /// Per-request timeout
    #[serde(with = "secs")]
    pub timeout: Duration,
    /// Model used to refine document requirements
    pub document_model: String,
    /// Multimodal model used for diagrams
    pub vision_model: String,
    /// Model used by the three judges
    pub judge_model: String,
    /// Model used for the narrative
    pub synthesis_model: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_key_env: "GROQ_API_KEY".to_string(),
            timeout: Duration::from_secs(120),
            document_model: "llama-3.3-70b-versatile".to_string(),
            vision_model: "meta-llama/llama-4-scout-17b-16e-instruct".to_string(),
            judge_model: "llama-3.1-8b-instant".to_string(),
            synthesis_model: "llama-3.3-70b-versatile".to_string(),
        }
    }
}

/// Sleeps that keep judge traffic under provider rate limits
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PacingConfig {
    /// Delay before the Prosecutor starts
    #[serde(with = "secs")]
    pub prosecutor_stagger: Duration,
    /// Delay before the Defense starts
    #[serde(with = "secs")]
    pub defense_stagger: Duration,
    /// Delay before the TechLead starts
    #[serde(with = "secs")]
    pub tech_lead_stagger: Duration,
    /// Sleep before every criterion
    #[serde(with = "secs")]
    pub per_criterion: Duration,
    /// Every n-th criterion (1-based) sleeps `slow_down_extra` more; 0 disables
    pub slow_down_every: usize,
    /// Additional sleep on every n-th criterion
    #[serde(with = "secs")]
    pub slow_down_extra: Duration,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            prosecutor_stagger: Duration::ZERO,
            defense_stagger: Duration::from_secs(4),
            tech_lead_stagger: Duration::from_secs(8),
            per_criterion: Duration::from_secs(15),
            slow_down_every: 5,
            slow_down_extra: Duration::from_secs(30),
        }
    }
}

impl PacingConfig {
    /// No sleeps at all
    #[must_use]
    pub fn none() -> Self {
        Self {
            prosecutor_stagger: Duration::ZERO,
            defense_stagger: Duration::ZERO,
            tech_lead_stagger: Duration::ZERO,
            per_criterion: Duration::ZERO,
            slow_down_every: 0,
            slow_down_extra: Duration::ZERO,
        }
    }

    /// Start delay for one judge
    #[must_use]
    pub fn stagger(&self, judge: Judge) -> Duration {
        match judge {
            Judge::Prosecutor => self.prosecutor_stagger,
            Judge::Defense => self.defense_stagger,
            Judge::TechLead => self.tech_lead_stagger,
        }
    }

    /// Sleep before the criterion at 1-based `position`
    #[must_use]
    pub fn before_criterion(&self, position: usize) -> Duration {
        if self.slow_down_every > 0 && position % self.slow_down_every == 0 {
            self.per_criterion + self.slow_down_extra
        } else {
            self.per_criterion
        }
    }
}

/// Limits on what is sent to the models
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvidenceLimits {
    /// Evidence strings offered to each judge
    pub prompt_limit: usize,
    /// Characters of serialized evidence context per judge prompt
    pub context_chars: usize,
    /// Characters of document markdown sent for refinement
    pub markdown_chars: usize,
    /// Images sent to the vision model
    pub max_images: usize,
    /// Characters of forensic instruction and success pattern per prompt
    pub instruction_chars: usize,
}

impl Default for EvidenceLimits {
    fn default() -> Self {
        Self {
            prompt_limit: 18,
            context_chars: 2000,
            markdown_chars: 18_000,
            max_images: 8,
            instruction_chars: 300,
        }
    }
}

/// Narrative request settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthesisConfig {
    /// Characters of each judge argument included in the payload
    pub argument_budget: usize,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self { argument_budget: 600 }
    }
}

/// Complete run configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Rubric file (JSON, or YAML by extension)
    pub rubric_path: PathBuf,
    /// Markdown report destination
    pub report_path: PathBuf,
    /// Model backend
    pub model: ModelConfig,
    /// Retry limits for every external call
    pub retry: RetryPolicy,
    /// Judge pacing
    pub pacing: PacingConfig,
    /// Scoring constants
    pub scoring: ScoringPolicy,
    /// Narrative request
    pub synthesis: SynthesisConfig,
    /// Prompt size limits
    pub evidence: EvidenceLimits,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            rubric_path: PathBuf::from("rubric.json"),
            report_path: PathBuf::from("audit_report.md"),
            model: ModelConfig::default(),
            retry: RetryPolicy::default(),
            pacing: PacingConfig::default(),
            scoring: ScoringPolicy::default(),
            synthesis: SynthesisConfig::default(),
            evidence: EvidenceLimits::default(),
        }
    }
}

impl AuditConfig {
    /// Load from a TOML file, or defaults when `path` is `None`
    ///
    /// # Errors
    /// [`AuditError::ConfigIo`] if the file cannot be read,
    /// [`AuditError::ConfigParse`] if it is not a valid configuration,
    /// [`AuditError::Config`] if a value is out of range.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path).map_err(|source| AuditError::ConfigIo {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&text).map_err(|source| AuditError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        tracing::info!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Check value ranges
    ///
    /// # Errors
    /// [`AuditError::Config`] naming the first invalid field.
    pub fn validate(&self) -> Result<()> {
        if self.retry.max_attempts == 0 {
            return Err(AuditError::Config("retry.max_attempts must be at least 1".into()));
        }
        let weights = self.scoring.weights;
        if [weights.prosecutor, weights.defense, weights.tech_lead]
            .iter()
            .any(|w| !w.is_finite() || *w < 0.0)
        {
            return Err(AuditError::Config("scoring.weights must be finite and non-negative".into()));
        }
        if !(1.0..=5.0).contains(&self.scoring.security_cap) {
            return Err(AuditError::Config("scoring.security_cap must lie in [1, 5]".into()));
        }
        if self.evidence.prompt_limit == 0 {
            return Err(AuditError::Config("evidence.prompt_limit must be at least 1".into()));
        }
        Ok(())
    }

    /// API key from the configured environment variable, if set and non-empty
    #[must_use]
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.model.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
    }
}

mod secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub(super) fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn missing_file_means_defaults() {
        let config = AuditConfig::load(None).unwrap();
        assert_eq!(config, AuditConfig::default());
        assert_eq!(config.model.api_key_env, "GROQ_API_KEY");
        assert_eq!(config.retry.max_attempts, 3);
    }

    #[test]
    fn partial_toml_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("courtroom.toml");
        std::fs::write(
            &path,
            r#"
report_path = "out/report.md"

[pacing]
per_criterion = 0.5

[scoring]
security_cap = 2.0
"#,
        )
        .unwrap();

        let config = AuditConfig::load(Some(&path)).unwrap();
        assert_eq!(config.report_path, PathBuf::from("out/report.md"));
        assert_eq!(config.pacing.per_criterion, Duration::from_millis(500));
        assert_eq!(config.pacing.defense_stagger, Duration::from_secs(4));
        assert!((config.scoring.security_cap - 2.0).abs() < f64::EPSILON);
        assert_eq!(config.scoring.dissent_threshold, 2.0);
        assert_eq!(config.rubric_path, PathBuf::from("rubric.json"));
    }

    #[test]
    fn invalid_files_are_rejected() {
        let dir = tempfile::tempdir().unwrap();

        let broken = dir.path().join("broken.toml");
        std::fs::write(&broken, "report_path = [").unwrap();
        assert!(matches!(AuditConfig::load(Some(&broken)), Err(AuditError::ConfigParse { .. })));

        let zero = dir.path().join("zero.toml");
        std::fs::write(&zero, "[retry]\nmax_attempts = 0\n").unwrap();
        assert!(matches!(AuditConfig::load(Some(&zero)), Err(AuditError::Config(_))));

        let missing = dir.path().join("missing.toml");
        assert!(matches!(AuditConfig::load(Some(&missing)), Err(AuditError::ConfigIo { .. })));
    }

    #[test]
    fn every_fifth_criterion_slows_down() {
        let pacing = PacingConfig::default();
        assert_eq!(pacing.before_criterion(1), Duration::from_secs(15));
        assert_eq!(pacing.before_criterion(5), Duration::from_secs(45));
        assert_eq!(pacing.before_criterion(10), Duration::from_secs(45));
        assert_eq!(pacing.stagger(Judge::TechLead), Duration::from_secs(8));

        let none = PacingConfig::none();
        assert_eq!(none.before_criterion(5), Duration::ZERO);
    }
}
