//! Testing utilities for the courtroom workspace
//!
//! Scripted language models, in-memory collaborators and a small rubric.

#![allow(missing_docs)]

use async_trait::async_trait;
use court_collaborators::{
    CommitRecord, DiagramError, DiagramExtractor, DocumentError, DocumentIngestor, GraphScan,
    IngestedDocument, JudgePhilosophy, RepositoryCollaborator, RepositoryError, Rubric,
    ScanSummary,
};
use court_llm::{ChatRequest, LanguageModel, ServiceFailure};
use court_types::{Criterion, Judge};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};

type Reply = Result<String, ServiceFailure>;

/// Language model answering from a script
///
/// Rules are checked in insertion order against the request prompt; the
/// first whose substring occurs wins, otherwise the default reply is used.
/// Every request is recorded.
#[derive(Debug)]
pub struct ScriptedModel {
    rules: Vec<(String, Reply)>,
    default: Reply,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedModel {
    /// Always reply with `text`
    pub fn replying(text: impl Into<String>) -> Self {
        Self::with_default(Ok(text.into()))
    }

    /// Always fail with `failure`
    pub fn failing(failure: ServiceFailure) -> Self {
        Self::with_default(Err(failure))
    }

    fn with_default(default: Reply) -> Self {
        Self {
            rules: Vec::new(),
            default,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Reply with `text` when the prompt contains `needle`
    #[must_use]
    pub fn when(mut self, needle: impl Into<String>, text: impl Into<String>) -> Self {
        self.rules.push((needle.into(), Ok(text.into())));
        self
    }

    /// Fail with `failure` when the prompt contains `needle`
    #[must_use]
    pub fn when_fail(mut self, needle: impl Into<String>, failure: ServiceFailure) -> Self {
        self.rules.push((needle.into(), Err(failure)));
        self
    }

    /// Requests seen so far, in arrival order
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().clone()
    }

    /// Number of requests whose prompt contains `needle`
    pub fn calls(&self, needle: &str) -> usize {
        self.requests
            .lock()
            .iter()
            .filter(|request| request.prompt.contains(needle))
            .count()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn complete(&self, request: &ChatRequest) -> Result<String, ServiceFailure> {
        self.requests.lock().push(request.clone());
        self.rules
            .iter()
            .find(|(needle, _)| request.prompt.contains(needle.as_str()))
            .map_or_else(|| self.default.clone(), |(_, reply)| reply.clone())
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Repository collaborator backed by canned results
#[derive(Debug)]
pub struct FakeRepository {
    checkout: Result<PathBuf, String>,
    scan: Result<GraphScan, String>,
    history: Result<Vec<CommitRecord>, String>,
}

impl FakeRepository {
    /// Checkout at `path` with a StateGraph detected and one commit
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            checkout: Ok(path.into()),
            scan: Ok(stategraph_scan()),
            history: Ok(vec![CommitRecord {
                hash: "0123456789".to_string(),
                author: "Dana".to_string(),
                message: "Wire detectives into the graph".to_string(),
                timestamp: "2026-01-02T03:04:05+00:00".to_string(),
            }]),
        }
    }

    /// Every clone fails with a generic error
    pub fn unreachable(detail: impl Into<String>) -> Self {
        let detail = detail.into();
        Self {
            checkout: Err(detail.clone()),
            scan: Err(detail.clone()),
            history: Err(detail),
        }
    }

    /// Replace the scan result
    #[must_use]
    pub fn with_scan(mut self, scan: GraphScan) -> Self {
        self.scan = Ok(scan);
        self
    }

    /// Make the scan fail
    #[must_use]
    pub fn with_failing_scan(mut self) -> Self {
        self.scan = Err("scan refused".to_string());
        self
    }

    /// Make history fail
    #[must_use]
    pub fn without_history(mut self) -> Self {
        self.history = Err("not a git repository".to_string());
        self
    }
}

#[async_trait]
impl RepositoryCollaborator for FakeRepository {
    async fn clone_repo(&self, url: &str) -> Result<PathBuf, RepositoryError> {
        self.checkout.clone().map_err(|detail| RepositoryError::Generic {
            operation: "clone",
            target: url.to_string(),
            detail,
        })
    }

    async fn scan(&self, path: &Path) -> Result<GraphScan, RepositoryError> {
        self.scan
            .clone()
            .map_err(|_| RepositoryError::MissingPath(path.to_path_buf()))
    }

    async fn history(&self, path: &Path, limit: usize) -> Result<Vec<CommitRecord>, RepositoryError> {
        match &self.history {
            Ok(commits) => Ok(commits.iter().take(limit).cloned().collect()),
            Err(detail) => Err(RepositoryError::Generic {
                operation: "history",
                target: path.display().to_string(),
                detail: detail.clone(),
            }),
        }
    }
}

/// A scan of one file that builds a StateGraph with two nodes
pub fn stategraph_scan() -> GraphScan {
    GraphScan {
        summary: ScanSummary {
            python_files_scanned: 1,
            classes_found: 1,
            functions_found: 2,
            stategraph_detected: true,
            node_definitions_detected: true,
        },
        ..GraphScan::default()
    }
}

/// Document collaborator returning one in-memory document
#[derive(Debug, Default)]
pub struct FakeDocuments {
    markdown: Option<String>,
}

impl FakeDocuments {
    /// Serve `markdown` for every path
    pub fn serving(markdown: impl Into<String>) -> Self {
        Self {
            markdown: Some(markdown.into()),
        }
    }

    /// Every path is missing
    pub fn missing() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentIngestor for FakeDocuments {
    async fn ingest(&self, path: &Path) -> Result<IngestedDocument, DocumentError> {
        match &self.markdown {
            Some(markdown) => Ok(IngestedDocument::from_markdown(path, markdown.clone())),
            None => Err(DocumentError::NotFound(path.to_path_buf())),
        }
    }
}

/// Diagram extractor with canned output
#[derive(Debug)]
pub struct FakeDiagrams {
    images: Result<Vec<PathBuf>, String>,
}

impl FakeDiagrams {
    /// Return these image paths
    pub fn returning(images: Vec<PathBuf>) -> Self {
        Self { images: Ok(images) }
    }

    /// The PDF has no images
    pub fn empty() -> Self {
        Self::returning(Vec::new())
    }

    /// Extraction tool fails
    pub fn broken(detail: impl Into<String>) -> Self {
        Self {
            images: Err(detail.into()),
        }
    }
}

#[async_trait]
impl DiagramExtractor for FakeDiagrams {
    async fn extract_images(&self, pdf: &Path) -> Result<Vec<PathBuf>, DiagramError> {
        self.images.clone().map_err(|detail| DiagramError::ToolFailed {
            tool: "pdfimages".to_string(),
            path: pdf.to_path_buf(),
            detail,
        })
    }
}

/// Three criteria: two weighted, one security-sensitive standard
pub fn sample_rubric() -> Rubric {
    let criteria = vec![
        Criterion::new("graph_orchestration", "Graph Orchestration Architecture")
            .with_instruction("Check that detectives fan out and fan in through an aggregator.")
            .with_patterns("StateGraph with parallel branches", "Linear pipeline")
            .with_target("github_repo"),
        Criterion::new("state_management_rigor", "State Management Rigor")
            .with_instruction("Look for typed state with reducers for parallel writes.")
            .with_patterns("Reducers on shared collections", "Plain dicts overwritten")
            .with_target("github_repo"),
        Criterion::new("safe_tool_engineering", "Safe Tool Engineering")
            .with_instruction("Inspect how the repository is cloned and shell commands are run.")
            .with_patterns("Sandboxed clone in a temp dir", "os.system with raw input")
            .with_target("github_repo"),
    ];

    Rubric::new(criteria)
        .with_philosophy(
            Judge::Prosecutor,
            JudgePhilosophy {
                core_philosophy: "Trust no claim without evidence.".to_string(),
                handbook: "Penalize security gaps hard.".to_string(),
                focus: vec!["security".to_string()],
            },
        )
        .with_philosophy(
            Judge::Defense,
            JudgePhilosophy {
                core_philosophy: "Reward effort and intent.".to_string(),
                handbook: String::new(),
                focus: vec!["creativity".to_string()],
            },
        )
        .with_philosophy(
            Judge::TechLead,
            JudgePhilosophy {
                core_philosophy: "Does it actually work and is it maintainable?".to_string(),
                handbook: String::new(),
                focus: vec!["architecture".to_string()],
            },
        )
        .with_synthesis_rules(serde_json::json!({
            "security_override": "Confirmed security flaws cap the score at 3.",
            "functionality_weight": "TechLead carries the most weight on architecture.",
        }))
}
