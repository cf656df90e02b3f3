//! Evidence records produced by detective stages

use crate::error::TypeError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Confidence of a detective finding, always within `[0, 1]`
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Confidence(f64);

impl Confidence {
    /// No confidence at all (used for "not found" evidence)
    pub const NONE: Self = Self(0.0);

    /// Create a validated confidence
    ///
    /// # Errors
    /// Returns [`TypeError::ConfidenceOutOfRange`] for values outside `[0, 1]` or NaN.
    pub fn new(value: f64) -> Result<Self, TypeError> {
        if (0.0..=1.0).contains(&value) {
            Ok(Self(value))
        } else {
            Err(TypeError::ConfidenceOutOfRange(value))
        }
    }

    /// Raw value
    #[inline]
    #[must_use]
    pub fn get(self) -> f64 {
        self.0
    }
}

impl TryFrom<f64> for Confidence {
    type Error = TypeError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Confidence> for f64 {
    fn from(value: Confidence) -> Self {
        value.0
    }
}

/// Detective-owned grouping key in the shared evidence map
///
/// Each detective writes exactly one key, which keeps evidence merges
/// conflict-free.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EvidenceKey(String);

impl EvidenceKey {
    /// Key owned by the repository investigator
    pub const REPOSITORY: &'static str = "repo_analysis";
    /// Key owned by the document analyst
    pub const DOCUMENT: &'static str = "doc_analysis";
    /// Key owned by the diagram analyst
    pub const VISION: &'static str = "vision_analysis";

    /// Create a key
    #[inline]
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Key owned by the repository investigator
    #[must_use]
    pub fn repository() -> Self {
        Self::new(Self::REPOSITORY)
    }

    /// Key owned by the document analyst
    #[must_use]
    pub fn document() -> Self {
        Self::new(Self::DOCUMENT)
    }

    /// Key owned by the diagram analyst
    #[must_use]
    pub fn vision() -> Self {
        Self::new(Self::VISION)
    }

    /// The three keys every complete run is expected to carry
    #[must_use]
    pub fn detective_keys() -> [Self; 3] {
        [Self::document(), Self::repository(), Self::vision()]
    }

    /// Borrow as str
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EvidenceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EvidenceKey {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// One finding produced by a detective stage
///
/// Immutable once created; stages build it with the `with_*` methods and
/// hand it to the shared state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    /// What the detective set out to establish
    pub goal: String,
    /// Whether the goal was met
    pub found: bool,
    /// Optional text or structured payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<serde_json::Value>,
    /// Where the finding came from (path, URL, or artifact name)
    pub location: String,
    /// Why the detective reached its conclusion
    pub rationale: String,
    /// Detective confidence
    pub confidence: Confidence,
}

impl Evidence {
    /// Create evidence with a validated confidence
    ///
    /// # Errors
    /// Returns [`TypeError::ConfidenceOutOfRange`] if `confidence` is outside `[0, 1]`.
    pub fn new(
        goal: impl Into<String>,
        found: bool,
        location: impl Into<String>,
        confidence: f64,
    ) -> Result<Self, TypeError> {
        Ok(Self {
            goal: goal.into(),
            found,
            content: None,
            location: location.into(),
            rationale: String::new(),
            confidence: Confidence::new(confidence)?,
        })
    }

    /// Evidence recording that a goal could not be investigated at all
    #[must_use]
    pub fn not_found(
        goal: impl Into<String>,
        location: impl Into<String>,
        rationale: impl Into<String>,
    ) -> Self {
        Self {
            goal: goal.into(),
            found: false,
            content: None,
            location: location.into(),
            rationale: rationale.into(),
            confidence: Confidence::NONE,
        }
    }

    /// Attach a payload
    #[must_use]
    pub fn with_content(mut self, content: impl Into<serde_json::Value>) -> Self {
        self.content = Some(content.into());
        self
    }

    /// Attach a rationale
    #[must_use]
    pub fn with_rationale(mut self, rationale: impl Into<String>) -> Self {
        self.rationale = rationale.into();
        self
    }

    /// Payload rendered as text (strings verbatim, structures as compact JSON)
    #[must_use]
    pub fn content_text(&self) -> Option<String> {
        self.content.as_ref().map(|value| match value {
            serde_json::Value::String(text) => text.clone(),
            other => other.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confidence_bounds_are_inclusive() {
        assert!(Confidence::new(0.0).is_ok());
        assert!(Confidence::new(1.0).is_ok());
        assert_eq!(
            Confidence::new(-0.1),
            Err(TypeError::ConfidenceOutOfRange(-0.1))
        );
        assert!(Confidence::new(f64::NAN).is_err());
    }

    #[test]
    fn not_found_has_zero_confidence() {
        let evidence = Evidence::not_found("Extract requirements", "report.pdf", "missing file");
        assert!(!evidence.found);
        assert_eq!(evidence.confidence, Confidence::NONE);
        assert!(evidence.content.is_none());
    }

    #[test]
    fn content_text_renders_structures_compactly() {
        let evidence = Evidence::new("g", true, "l", 0.5)
            .unwrap()
            .with_content(serde_json::json!({"stategraph_detected": true}));
        assert_eq!(
            evidence.content_text().as_deref(),
            Some(r#"{"stategraph_detected":true}"#)
        );

        let text = Evidence::new("g", true, "l", 0.5).unwrap().with_content("plain");
        assert_eq!(text.content_text().as_deref(), Some("plain"));
    }
}
