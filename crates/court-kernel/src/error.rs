//! Error types for the stage graph and stage execution

/// Graph construction errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    /// Graph has no stages
    #[error("stage graph is empty")]
    Empty,

    /// Two stages share a name
    #[error("duplicate stage: {0}")]
    DuplicateStage(String),

    /// Edge references a stage that was never added
    #[error("unknown stage: {0}")]
    UnknownStage(String),

    /// Edge from a stage to itself
    #[error("self loop on stage: {0}")]
    SelfLoop(String),

    /// Edges form a cycle through the named stage
    #[error("cycle detected through stage: {0}")]
    CycleDetected(String),
}

/// Failure of one stage, caught at the stage boundary
///
/// Never propagates past the scheduler: it is converted into a degraded
/// partial update by [`crate::Stage::recover`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StageError {
    /// Required input (document, repository, images) is missing or unreadable
    #[error("input unavailable: {0}")]
    InputUnavailable(String),

    /// External service failed after its retry budget
    #[error("external service error: {0}")]
    External(String),

    /// Anything else
    #[error("unexpected error: {0}")]
    Unexpected(String),

    /// Stage task panicked or was aborted
    #[error("stage panicked: {0}")]
    Panicked(String),
}

impl StageError {
    /// Missing or unreadable input
    pub fn input(error: impl std::fmt::Display) -> Self {
        Self::InputUnavailable(error.to_string())
    }

    /// Exhausted external service
    pub fn external(error: impl std::fmt::Display) -> Self {
        Self::External(error.to_string())
    }

    /// Unexpected failure
    pub fn unexpected(error: impl std::fmt::Display) -> Self {
        Self::Unexpected(error.to_string())
    }

    /// Convert a failed task join
    #[must_use]
    pub fn from_join(error: tokio::task::JoinError) -> Self {
        if error.is_panic() {
            let payload = error.into_panic();
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| (*s).to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "non-string panic payload".to_string());
            Self::Panicked(message)
        } else {
            Self::Panicked(error.to_string())
        }
    }

    /// Short classification label
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InputUnavailable(_) => "input_unavailable",
            Self::External(_) => "external_service",
            Self::Unexpected(_) => "unexpected",
            Self::Panicked(_) => "panic",
        }
    }
}
