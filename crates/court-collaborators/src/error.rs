//! Error types for collaborators

use std::path::PathBuf;
use thiserror::Error;

/// Rubric loading failures
///
/// Every variant is a configuration error: the audit cannot be scheduled.
#[derive(Debug, Error)]
pub enum RubricError {
    /// Rubric file does not exist
    #[error("rubric not found at {0}")]
    NotFound(PathBuf),

    /// I/O error while reading
    #[error("failed to read rubric {path}")]
    Io {
        /// Rubric path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Invalid JSON
    #[error("invalid rubric JSON in {path}")]
    Json {
        /// Rubric path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: serde_json::Error,
    },

    /// Invalid YAML
    #[error("invalid rubric YAML in {path}")]
    Yaml {
        /// Rubric path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: serde_yaml::Error,
    },

    /// Rubric has no dimensions
    #[error("rubric {0} defines no dimensions")]
    Empty(PathBuf),

    /// Two dimensions share an id
    #[error("rubric dimension `{0}` is defined twice")]
    DuplicateDimension(String),
}

/// Document ingestion failures
#[derive(Debug, Error)]
pub enum DocumentError {
    /// File does not exist or is not a regular file
    #[error("document not found: {0}")]
    NotFound(PathBuf),

    /// File exists but could not be converted to text
    #[error("document {path} is unreadable: {reason}")]
    Unreadable {
        /// Document path
        path: PathBuf,
        /// What went wrong
        reason: String,
    },
}

impl DocumentError {
    /// Create an unreadable error
    #[must_use]
    pub fn unreadable(path: impl Into<PathBuf>, reason: impl std::fmt::Display) -> Self {
        Self::Unreadable {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

/// Repository access failures
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Blank repository URL
    #[error("repository URL cannot be empty")]
    EmptyUrl,

    /// Remote refused the credentials or the repository is private
    #[error("authentication failed while cloning {url}; check credentials or repository visibility")]
    AuthFailure {
        /// Repository URL
        url: String,
        /// Tool output
        detail: String,
    },

    /// Any other clone or history failure
    #[error("{operation} failed for {target}: {detail}")]
    Generic {
        /// What was attempted (`clone`, `history`, ...)
        operation: &'static str,
        /// URL or path
        target: String,
        /// Tool output or I/O error text
        detail: String,
    },

    /// Local path to scan does not exist
    #[error("repository path does not exist: {0}")]
    MissingPath(PathBuf),
}

/// Diagram extraction failures
#[derive(Debug, Error)]
pub enum DiagramError {
    /// PDF does not exist
    #[error("PDF file not found: {0}")]
    NotFound(PathBuf),

    /// External extraction tool could not run or failed
    #[error("{tool} failed on {path}: {detail}")]
    ToolFailed {
        /// Tool binary
        tool: String,
        /// PDF path
        path: PathBuf,
        /// Tool output or spawn error
        detail: String,
    },
}
