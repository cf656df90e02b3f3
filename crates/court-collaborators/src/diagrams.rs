//! Diagram extraction from PDF reports

use crate::error::DiagramError;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Extracts embedded images from a PDF
#[async_trait]
pub trait DiagramExtractor: Send + Sync {
    /// Write every embedded image to disk and return the paths in page order
    ///
    /// # Errors
    /// [`DiagramError::NotFound`] for a missing PDF,
    /// [`DiagramError::ToolFailed`] when extraction fails.
    async fn extract_images(&self, pdf: &Path) -> Result<Vec<PathBuf>, DiagramError>;
}

/// `pdfimages` (poppler) backed extractor
///
/// Output directories are kept until the extractor is dropped so the
/// returned paths stay valid for the whole run.
#[derive(Debug)]
pub struct PopplerDiagramExtractor {
    pdfimages: String,
    outputs: Mutex<Vec<TempDir>>,
}

impl Default for PopplerDiagramExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl PopplerDiagramExtractor {
    /// Use `pdfimages` from `PATH`
    #[must_use]
    pub fn new() -> Self {
        Self {
            pdfimages: "pdfimages".to_string(),
            outputs: Mutex::new(Vec::new()),
        }
    }

    /// Use a specific `pdfimages` binary
    #[must_use]
    pub fn with_pdfimages(mut self, binary: impl Into<String>) -> Self {
        self.pdfimages = binary.into();
        self
    }

    fn tool_failed(&self, pdf: &Path, detail: impl std::fmt::Display) -> DiagramError {
        DiagramError::ToolFailed {
            tool: self.pdfimages.clone(),
            path: pdf.to_path_buf(),
            detail: detail.to_string(),
        }
    }
}

#[async_trait]
impl DiagramExtractor for PopplerDiagramExtractor {
    async fn extract_images(&self, pdf: &Path) -> Result<Vec<PathBuf>, DiagramError> {
        if !pdf.is_file() {
            return Err(DiagramError::NotFound(pdf.to_path_buf()));
        }

        let output_dir = tempfile::Builder::new()
            .prefix("courtroom_images_")
            .tempdir()
            .map_err(|e| self.tool_failed(pdf, e))?;

        // -p embeds the page number: page-<page>-<index>.png
        let output = tokio::process::Command::new(&self.pdfimages)
            .arg("-png")
            .arg("-p")
            .arg(pdf)
            .arg(output_dir.path().join("page"))
            .output()
            .await
            .map_err(|e| self.tool_failed(pdf, format!("cannot run: {e}")))?;
        if !output.status.success() {
            return Err(self.tool_failed(pdf, String::from_utf8_lossy(&output.stderr).trim()));
        }

        let images = list_images(output_dir.path()).map_err(|e| self.tool_failed(pdf, e))?;
        tracing::debug!(pdf = %pdf.display(), images = images.len(), "diagram images extracted");
        if !images.is_empty() {
            self.outputs.lock().push(output_dir);
        }
        Ok(images)
    }
}

fn list_images(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut images = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() {
            images.push(path);
        }
    }
    images.sort();
    Ok(images)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_pdf_is_not_found() {
        let extractor = PopplerDiagramExtractor::new();
        let result = extractor.extract_images(Path::new("/no/such/report.pdf")).await;
        assert!(matches!(result, Err(DiagramError::NotFound(_))));
    }

    #[tokio::test]
    async fn missing_tool_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let pdf = dir.path().join("report.pdf");
        std::fs::write(&pdf, b"%PDF-1.4").unwrap();

        let extractor = PopplerDiagramExtractor::new().with_pdfimages("definitely-not-pdfimages");
        let result = extractor.extract_images(&pdf).await;
        assert!(matches!(result, Err(DiagramError::ToolFailed { .. })));
    }

    #[test]
    fn images_are_listed_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["page-002-001.png", "page-001-000.png", "page-001-001.png"] {
            std::fs::write(dir.path().join(name), b"png").unwrap();
        }
        let names: Vec<_> = list_images(dir.path())
            .unwrap()
            .into_iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["page-001-000.png", "page-001-001.png", "page-002-001.png"]);
    }
}
