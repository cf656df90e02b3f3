//! Courtroom collaborators
//!
//! The boundary between the audit engine and the outside world: the
//! report document, the audited repository, diagrams embedded in the
//! report, and the rubric that drives judging.
//!
//! # Collaborators
//!
//! - [`DocumentIngestor`] / [`TextDocumentSource`]: Markdown, text and PDF
//!   (via `pdftotext`) chunked on headings, with requirement search
//! - [`RepositoryCollaborator`] / [`GitRepository`]: clone or use in place,
//!   tree-sitter scan of Python graph construction, commit history
//! - [`DiagramExtractor`] / [`PopplerDiagramExtractor`]: `pdfimages` output
//! - [`Rubric`]: ordered criteria, judge philosophies, synthesis rules
//! - [`resolve_pdf_path`]: which PDF the document and vision stages read
//!
//! Engine code depends on the traits only, so tests substitute fakes.

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod diagrams;
pub mod document;
pub mod error;
pub mod pdf_path;
pub mod repository;
pub mod rubric;
pub mod scanner;

pub use diagrams::{DiagramExtractor, PopplerDiagramExtractor};
pub use document::{
    DocumentIngestor, IngestedDocument, RequirementDigest, SearchHit, Section, TextDocumentSource,
};
pub use error::{DiagramError, DocumentError, RepositoryError, RubricError};
pub use pdf_path::{resolve_pdf_path, SEARCH_PATTERNS};
pub use repository::{CommitRecord, GitRepository, RepositoryCollaborator, HISTORY_LIMIT};
pub use rubric::{JudgePhilosophy, Rubric};
pub use scanner::{GraphScan, PythonGraphScanner, ScanSummary};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude for common imports
pub mod prelude {
    pub use crate::{
        DiagramExtractor, DocumentIngestor, IngestedDocument, RepositoryCollaborator, Rubric,
    };
}

#[cfg(test)]
mod integration_tests {
    use super::*;
    use std::path::Path;

    #[tokio::test]
    async fn repository_report_is_found_and_searched() {
        let repo = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(repo.path().join("reports")).unwrap();
        std::fs::write(
            repo.path().join("reports/final_report.md"),
            "# Objectives\n\nFan-out detectives then fan-in to an aggregator.\n",
        )
        .unwrap();

        let requested = Path::new("reports/final_report.md");
        let resolved = resolve_pdf_path(Some(repo.path()), Some(requested)).unwrap();
        // no PDF anywhere, so the request is joined to the root
        assert_eq!(resolved, repo.path().join("reports/final_report.md"));

        let document = TextDocumentSource::new().ingest(&resolved).await.unwrap();
        assert!(document.requirements().objectives.contains("aggregator"));
        assert_eq!(
            document.search("aggregator fan-in")[0].section.as_deref(),
            Some("Objectives")
        );
    }
}
