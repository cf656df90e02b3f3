//! Construction errors for domain records

/// Errors raised when a record violates a range invariant
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TypeError {
    /// Confidence outside `[0, 1]` (or not a number)
    #[error("confidence must be within [0, 1], got {0}")]
    ConfidenceOutOfRange(f64),

    /// Score outside `[1, 5]`
    #[error("score must be an integer within [1, 5], got {0}")]
    ScoreOutOfRange(i64),

    /// Unknown judge label
    #[error("unknown judge role: {0}")]
    UnknownJudge(String),

    /// Required text field was empty
    #[error("field `{0}` must not be empty")]
    EmptyField(&'static str),
}
