//! Collaborators and settings shared by every stage

use crate::config::AuditConfig;
use court_collaborators::{
    DiagramExtractor, DocumentIngestor, GitRepository, PopplerDiagramExtractor,
    RepositoryCollaborator, Rubric, TextDocumentSource,
};
use court_llm::{CallGate, Invoker, LanguageModel};
use std::fmt;
use std::sync::Arc;

/// Everything a stage needs besides the state snapshot
///
/// Constructed once per run and injected into each stage. Tests swap
/// individual collaborators with the `with_*` methods.
#[derive(Clone)]
pub struct AuditRuntime {
    config: AuditConfig,
    rubric: Rubric,
    model: Arc<dyn LanguageModel>,
    documents: Arc<dyn DocumentIngestor>,
    repository: Arc<dyn RepositoryCollaborator>,
    diagrams: Arc<dyn DiagramExtractor>,
    invoker: Invoker,
}

impl AuditRuntime {
    /// Runtime with the default document, repository and diagram collaborators
    #[must_use]
    pub fn new(config: AuditConfig, rubric: Rubric, model: Arc<dyn LanguageModel>) -> Self {
        let invoker = Invoker::new(CallGate::new(), config.retry);
        Self {
            config,
            rubric,
            model,
            documents: Arc::new(TextDocumentSource::new()),
            repository: Arc::new(GitRepository::new()),
            diagrams: Arc::new(PopplerDiagramExtractor::new()),
            invoker,
        }
    }

    /// Replace the document collaborator
    #[must_use]
    pub fn with_documents(mut self, documents: Arc<dyn DocumentIngestor>) -> Self {
        self.documents = documents;
        self
    }

    /// Replace the repository collaborator
    #[must_use]
    pub fn with_repository(mut self, repository: Arc<dyn RepositoryCollaborator>) -> Self {
        self.repository = repository;
        self
    }

    /// Replace the diagram extractor
    #[must_use]
    pub fn with_diagrams(mut self, diagrams: Arc<dyn DiagramExtractor>) -> Self {
        self.diagrams = diagrams;
        self
    }

    /// Share an existing call gate
    #[must_use]
    pub fn with_gate(mut self, gate: CallGate) -> Self {
        self.invoker = Invoker::new(gate, self.config.retry);
        self
    }

    /// Run configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &AuditConfig {
        &self.config
    }

    /// Loaded rubric
    #[inline]
    #[must_use]
    pub fn rubric(&self) -> &Rubric {
        &self.rubric
    }

    /// Model backend
    #[inline]
    #[must_use]
    pub fn model(&self) -> &Arc<dyn LanguageModel> {
        &self.model
    }

    /// Document collaborator
    #[inline]
    #[must_use]
    pub fn documents(&self) -> &dyn DocumentIngestor {
        self.documents.as_ref()
    }

    /// Repository collaborator
    #[inline]
    #[must_use]
    pub fn repository(&self) -> &dyn RepositoryCollaborator {
        self.repository.as_ref()
    }

    /// Diagram extractor
    #[inline]
    #[must_use]
    pub fn diagrams(&self) -> &dyn DiagramExtractor {
        self.diagrams.as_ref()
    }

    /// Retry driver bound to the run's call gate
    #[inline]
    #[must_use]
    pub fn invoker(&self) -> &Invoker {
        &self.invoker
    }
}

impl fmt::Debug for AuditRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuditRuntime")
            .field("config", &self.config)
            .field("criteria", &self.rubric.dimensions.len())
            .field("model", &self.model.name())
            .field("invoker", &self.invoker)
            .finish_non_exhaustive()
    }
}
