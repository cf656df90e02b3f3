//! Repository access
//!
//! Local directories are audited in place. Anything else is treated as a
//! clone URL and checked out with `git` into a temporary directory that
//! lives as long as the collaborator.

use crate::error::RepositoryError;
use crate::scanner::{GraphScan, PythonGraphScanner};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Serialize;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Default number of commits reported
pub const HISTORY_LIMIT: usize = 20;

const FIELD_SEP: char = '\u{1f}';
const RECORD_SEP: char = '\u{1e}';

/// One commit of repository history
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitRecord {
    /// Abbreviated hash (10 characters)
    pub hash: String,
    /// Author name
    pub author: String,
    /// Full message, trimmed
    pub message: String,
    /// ISO-8601 commit time
    pub timestamp: String,
}

/// Clones and inspects the audited repository
#[async_trait]
pub trait RepositoryCollaborator: Send + Sync {
    /// Make the repository available locally and return its path
    ///
    /// # Errors
    /// [`RepositoryError::AuthFailure`] when the remote refuses access,
    /// [`RepositoryError::Generic`] for other failures.
    async fn clone_repo(&self, url: &str) -> Result<PathBuf, RepositoryError>;

    /// Structural scan of the checkout
    ///
    /// # Errors
    /// [`RepositoryError::MissingPath`] when `path` does not exist.
    async fn scan(&self, path: &Path) -> Result<GraphScan, RepositoryError>;

    /// Most recent commits, newest first
    ///
    /// # Errors
    /// [`RepositoryError::Generic`] when `path` is not a git repository.
    async fn history(&self, path: &Path, limit: usize) -> Result<Vec<CommitRecord>, RepositoryError>;
}

/// `git` command-line backed repository collaborator
#[derive(Debug)]
pub struct GitRepository {
    git: String,
    scanner: PythonGraphScanner,
    checkouts: Mutex<Vec<TempDir>>,
}

impl Default for GitRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl GitRepository {
    /// Use `git` from `PATH`
    #[must_use]
    pub fn new() -> Self {
        Self {
            git: "git".to_string(),
            scanner: PythonGraphScanner::new(),
            checkouts: Mutex::new(Vec::new()),
        }
    }

    /// Use a specific `git` binary
    #[must_use]
    pub fn with_git(mut self, binary: impl Into<String>) -> Self {
        self.git = binary.into();
        self
    }

    /// Number of temporary checkouts held
    #[must_use]
    pub fn checkouts(&self) -> usize {
        self.checkouts.lock().len()
    }

    async fn run_git(
        &self,
        operation: &'static str,
        target: &str,
        args: &[&OsStr],
    ) -> Result<std::process::Output, RepositoryError> {
        tokio::process::Command::new(&self.git)
            .args(args)
            .output()
            .await
            .map_err(|e| RepositoryError::Generic {
                operation,
                target: target.to_string(),
                detail: format!("cannot run {}: {e}", self.git),
            })
    }
}

#[async_trait]
impl RepositoryCollaborator for GitRepository {
    async fn clone_repo(&self, url: &str) -> Result<PathBuf, RepositoryError> {
        let url = url.trim();
        if url.is_empty() {
            return Err(RepositoryError::EmptyUrl);
        }

        let local = Path::new(url);
        if local.is_dir() {
            tracing::info!(path = %local.display(), "auditing local repository in place");
            return Ok(local.to_path_buf());
        }

        let checkout = tempfile::Builder::new()
            .prefix("courtroom_repo_")
            .tempdir()
            .map_err(|e| RepositoryError::Generic {
                operation: "clone",
                target: url.to_string(),
                detail: e.to_string(),
            })?;
        let destination = checkout.path().join("target_repo");

        tracing::info!(url, "cloning repository");
        let output = self
            .run_git(
                "clone",
                url,
                &[OsStr::new("clone"), OsStr::new("--quiet"), OsStr::new(url), destination.as_os_str()],
            )
            .await?;
        if !output.status.success() {
            return Err(classify_clone_failure(url, &String::from_utf8_lossy(&output.stderr)));
        }

        self.checkouts.lock().push(checkout);
        Ok(destination)
    }

    async fn scan(&self, path: &Path) -> Result<GraphScan, RepositoryError> {
        let scanner = self.scanner;
        let root = path.to_path_buf();
        tokio::task::spawn_blocking(move || scanner.scan(&root))
            .await
            .map_err(|e| RepositoryError::Generic {
                operation: "scan",
                target: path.display().to_string(),
                detail: e.to_string(),
            })?
    }

    async fn history(&self, path: &Path, limit: usize) -> Result<Vec<CommitRecord>, RepositoryError> {
        let format = format!("--pretty=format:%H{FIELD_SEP}%an{FIELD_SEP}%cI{FIELD_SEP}%B{RECORD_SEP}");
        let count = format!("--max-count={limit}");
        let target = path.display().to_string();
        let output = self
            .run_git(
                "history",
                &target,
                &[
                    OsStr::new("-C"),
                    path.as_os_str(),
                    OsStr::new("log"),
                    OsStr::new(&count),
                    OsStr::new(&format),
                ],
            )
            .await?;
        if !output.status.success() {
            return Err(RepositoryError::Generic {
                operation: "history",
                target,
                detail: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(parse_history(&String::from_utf8_lossy(&output.stdout)))
    }
}

/// Map `git clone` stderr to an error class
#[must_use]
pub fn classify_clone_failure(url: &str, stderr: &str) -> RepositoryError {
    let lowered = stderr.to_lowercase();
    let detail = stderr.trim().to_string();
    if lowered.contains("authentication") || lowered.contains("could not read") {
        RepositoryError::AuthFailure {
            url: url.to_string(),
            detail,
        }
    } else {
        RepositoryError::Generic {
            operation: "clone",
            target: url.to_string(),
            detail,
        }
    }
}

fn parse_history(output: &str) -> Vec<CommitRecord> {
    output
        .split(RECORD_SEP)
        .filter_map(|record| {
            let mut fields = record.trim_start_matches('\n').splitn(4, FIELD_SEP);
            let hash = fields.next()?.trim();
            if hash.is_empty() {
                return None;
            }
            Some(CommitRecord {
                hash: hash.chars().take(10).collect(),
                author: fields.next()?.to_string(),
                timestamp: fields.next()?.to_string(),
                message: fields.next().unwrap_or_default().trim().to_string(),
            })
        })
        .collect()
}
