//! Error types for audit runs

use court_collaborators::RubricError;
use court_kernel::GraphError;
use court_llm::ServiceFailure;
use std::path::PathBuf;

/// Failures that stop a run
///
/// Only configuration problems and an unusable report surface here; every
/// stage-level failure is absorbed by the scheduler.
#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    /// Invalid configuration value
    #[error("configuration error: {0}")]
    Config(String),

    /// Configuration file could not be read
    #[error("cannot read configuration {path}: {source}")]
    ConfigIo {
        /// File path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Configuration file is not valid TOML for [`crate::AuditConfig`]
    #[error("invalid configuration {path}: {source}")]
    ConfigParse {
        /// File path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: toml::de::Error,
    },

    /// Rubric missing or invalid
    #[error(transparent)]
    Rubric(#[from] RubricError),

    /// Stage graph rejected
    #[error("invalid stage graph: {0}")]
    Graph(#[from] GraphError),

    /// Model backend could not be constructed
    #[error("model backend unavailable: {0}")]
    Service(#[from] ServiceFailure),

    /// Report could not be written
    #[error("cannot write report {path}: {source}")]
    ReportWrite {
        /// Target path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Synthesis produced no report
    #[error("synthesis failed: {0}")]
    Synthesis(String),
}

/// Result type for audit operations
pub type Result<T> = std::result::Result<T, AuditError>;
