//! Detective stages
//!
//! Each detective owns one evidence key and never fails its stage for a
//! missing input: an unreachable repository, document or diagram becomes
//! a "not found" [`Evidence`] record so the judges still see the gap.

use crate::runtime::AuditRuntime;
use async_trait::async_trait;
use court_collaborators::{resolve_pdf_path, DiagramError, GraphScan, HISTORY_LIMIT, SEARCH_PATTERNS};
use court_kernel::{Stage, StageError};
use court_llm::{complete_json, ChatRequest, ImageAttachment, RequestVariant};
use court_state::{AuditState, StateUpdate};
use court_types::{Evidence, EvidenceKey};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

/// Stage name of the repository investigator
pub const INVESTIGATE: &str = "investigate";
/// Stage name of the document analyst
pub const ANALYZE_DOCUMENT: &str = "analyze_document";
/// Stage name of the diagram inspector
pub const ANALYZE_VISION: &str = "analyze_vision";

const REPOSITORY_GOAL: &str = "Analyze repository graph architecture with AST";
const DOCUMENT_GOAL: &str = "Extract architectural requirements from PDF";
const VISION_GOAL: &str = "Inspect architectural diagrams for StateGraph fidelity";
const VISION_QUESTION: &str = "Is this a StateGraph diagram or a generic box diagram?";

fn location_or_unknown(location: &str) -> String {
    if location.trim().is_empty() {
        "unknown".to_string()
    } else {
        location.to_string()
    }
}

fn evidence(goal: &str, found: bool, location: &Path, confidence: f64) -> Result<Evidence, StageError> {
    Evidence::new(goal, found, location.display().to_string(), confidence).map_err(StageError::unexpected)
}

/// Clones (or opens) the repository, scans it and records its history
///
/// The only writer of `repo_path` and of the resolved `pdf_path`.
#[derive(Debug)]
pub struct InvestigateStage {
    runtime: Arc<AuditRuntime>,
}

impl InvestigateStage {
    /// Create the stage
    #[must_use]
    pub fn new(runtime: Arc<AuditRuntime>) -> Self {
        Self { runtime }
    }

    fn unavailable(url: &str, error: impl std::fmt::Display) -> StateUpdate {
        let text = error.to_string();
        tracing::warn!(url, error = %text, "repository investigation failed");
        let record = Evidence::not_found(
            REPOSITORY_GOAL,
            location_or_unknown(url),
            "Repository investigation failed before structural analysis.",
        )
        .with_content(text.clone());
        StateUpdate::new()
            .with_evidence(EvidenceKey::repository(), vec![record])
            .with_message(format!("{INVESTIGATE}: {text}"))
    }
}

#[async_trait]
impl Stage for InvestigateStage {
    fn name(&self) -> &str {
        INVESTIGATE
    }

    async fn run(&self, state: Arc<AuditState>) -> Result<StateUpdate, StageError> {
        let url = state.repo_url();
        let repository = self.runtime.repository();

        let repo_path = match repository.clone_repo(url).await {
            Ok(path) => path,
            Err(error) => return Ok(Self::unavailable(url, error)),
        };

        let mut update = StateUpdate::new().with_repo_path(repo_path.clone());
        let resolved_pdf = resolve_pdf_path(Some(&repo_path), state.pdf_path());
        if let Some(pdf) = &resolved_pdf {
            update = update.with_pdf_path(pdf.clone());
        }

        let scan: GraphScan = match repository.scan(&repo_path).await {
            Ok(scan) => scan,
            Err(error) => {
                return update
                    .combine(Self::unavailable(url, error))
                    .map_err(StageError::unexpected);
            }
        };

        let history = match repository.history(&repo_path, HISTORY_LIMIT).await {
            Ok(history) => serde_json::to_value(history).map_err(StageError::unexpected)?,
            Err(error) => {
                tracing::warn!(error = %error, "commit history unavailable");
                Value::String(format!("history unavailable: {error}"))
            }
        };

        let mut content = scan.to_value();
        if let Value::Object(map) = &mut content {
            map.insert("git_history".to_string(), history);
        }

        let record = evidence(REPOSITORY_GOAL, scan.summary.stategraph_detected, &repo_path, 0.85)?
            .with_content(content)
            .with_rationale(format!(
                "Scanned {} Python file(s) for graph construction; {} parse error(s).",
                scan.summary.python_files_scanned,
                scan.errors.len()
            ));

        let resolved = resolved_pdf
            .as_deref()
            .map_or_else(|| "none".to_string(), |p| p.display().to_string());
        tracing::info!(repo = %repo_path.display(), pdf = %resolved, "repository investigated");

        Ok(update
            .with_evidence(EvidenceKey::repository(), vec![record])
            .with_message(format!(
                "{INVESTIGATE}: clone and structural analysis completed; resolved PDF path: {resolved}"
            )))
    }
}

/// Ingests the report document and extracts its requirements
#[derive(Debug)]
pub struct DocumentStage {
    runtime: Arc<AuditRuntime>,
}

impl DocumentStage {
    /// Create the stage
    #[must_use]
    pub fn new(runtime: Arc<AuditRuntime>) -> Self {
        Self { runtime }
    }

    fn unavailable(location: &str, rationale: &str, error: impl std::fmt::Display) -> StateUpdate {
        let text = error.to_string();
        tracing::warn!(location, error = %text, "document analysis unavailable");
        let record = Evidence::not_found(DOCUMENT_GOAL, location_or_unknown(location), rationale)
            .with_content(text.clone());
        StateUpdate::new()
            .with_evidence(EvidenceKey::document(), vec![record])
            .with_message(format!("{ANALYZE_DOCUMENT}: {text}"))
    }

    fn refinement_prompt(markdown: &str, limit: usize) -> String {
        let excerpt: String = markdown.chars().take(limit).collect();
        format!(
            "You are a forensic auditor for an agent-graph project. Analyze the provided \
             architectural markdown and extract two focused sections:\n\
             1) Scoring Rubric Rules\n\
             2) Technical Constraints\n\
             Return concise JSON with keys 'scoring_rubric_rules' and 'technical_constraints'.\n\n\
             MARKDOWN:\n{excerpt}"
        )
    }

    async fn refine(&self, markdown: &str) -> Value {
        let config = self.runtime.config();
        let model_name = &config.model.document_model;
        let limit = config.evidence.markdown_chars;
        let original = ChatRequest::new(model_name, Self::refinement_prompt(markdown, limit)).json();
        let simplified = ChatRequest::new(model_name, Self::refinement_prompt(markdown, limit / 2)).json();
        let model = Arc::clone(self.runtime.model());

        let outcome = self
            .runtime
            .invoker()
            .invoke::<Value, _, _>(ANALYZE_DOCUMENT, |variant| {
                let request = match variant {
                    RequestVariant::Original => original.clone(),
                    RequestVariant::Simplified => simplified.clone(),
                };
                let model = Arc::clone(&model);
                async move { complete_json::<Value>(model.as_ref(), &request).await }
            })
            .await;

        match outcome {
            Ok(invocation) => invocation.value,
            Err(error) => {
                tracing::warn!(error = %error, "requirement refinement unavailable");
                Value::Null
            }
        }
    }
}

#[async_trait]
impl Stage for DocumentStage {
    fn name(&self) -> &str {
        ANALYZE_DOCUMENT
    }

    async fn run(&self, state: Arc<AuditState>) -> Result<StateUpdate, StageError> {
        let Some(pdf) = state.pdf_path() else {
            return Ok(Self::unavailable(
                "",
                "No report document path was resolved.",
                "no report document available",
            ));
        };
        let location = pdf.display().to_string();

        let document = match self.runtime.documents().ingest(pdf).await {
            Ok(document) => document,
            Err(error) => {
                return Ok(Self::unavailable(
                    &location,
                    "Report document was missing or unreadable during ingestion.",
                    error,
                ))
            }
        };

        let digest = document.requirements();
        let snippets: BTreeMap<&str, String> = state
            .criteria()
            .iter()
            .map(|criterion| (criterion.id.as_str(), document.best_snippet(&criterion.name)))
            .collect();
        let refined = self.refine(&document.markdown).await;
        let outline = document.structured();

        let payload = json!({
            "source_pdf": location,
            "search_patterns": SEARCH_PATTERNS,
            "objectives": digest.objectives,
            "deliverables": digest.deliverables,
            "constraints": digest.constraints,
            "markdown_length": outline["markdown_length"],
            "sections": outline["sections"],
            "criterion_snippets": snippets,
            "llm_refined_requirements": refined,
        });

        let record = evidence(DOCUMENT_GOAL, true, pdf, 0.9)?
            .with_content(payload)
            .with_rationale(
                "Parsed the report document and extracted requirement sections for judicial reasoning.",
            );
        tracing::info!(pdf = %location, sections = document.sections.len(), "document analyzed");

        Ok(StateUpdate::new()
            .with_evidence(EvidenceKey::document(), vec![record])
            .with_message(format!("{ANALYZE_DOCUMENT}: requirements extracted from {location}")))
    }
}

/// Extracts diagrams from the report and asks the vision model about them
#[derive(Debug)]
pub struct VisionStage {
    runtime: Arc<AuditRuntime>,
}

impl VisionStage {
    /// Create the stage
    #[must_use]
    pub fn new(runtime: Arc<AuditRuntime>) -> Self {
        Self { runtime }
    }

    fn unavailable(location: &str, rationale: &str, error: impl std::fmt::Display) -> StateUpdate {
        let text = error.to_string();
        tracing::warn!(location, error = %text, "diagram inspection unavailable");
        let record = Evidence::not_found(VISION_GOAL, location_or_unknown(location), rationale)
            .with_content(text.clone());
        StateUpdate::new()
            .with_evidence(EvidenceKey::vision(), vec![record])
            .with_message(format!("{ANALYZE_VISION}: {text}"))
    }

    async fn attachments(&self, images: &[std::path::PathBuf]) -> Vec<ImageAttachment> {
        let mut attachments = Vec::new();
        for path in images.iter().take(self.runtime.config().evidence.max_images) {
            match ImageAttachment::from_path(path).await {
                Ok(image) => attachments.push(image),
                Err(error) => tracing::debug!(path = %path.display(), error = %error, "image skipped"),
            }
        }
        attachments
    }

    async fn inspect(&self, attachments: Vec<ImageAttachment>) -> Result<String, String> {
        const PROMPT: &str = "Look at these architectural diagrams from an agent-graph project. \
                              Does the diagram show a 'Fan-In' or 'Aggregator' pattern? \
                              Respond with a brief forensic confirmation.";
        let model_name = &self.runtime.config().model.vision_model;
        let first: Vec<ImageAttachment> = attachments.iter().take(1).cloned().collect();
        let original = ChatRequest::new(model_name, PROMPT).with_images(attachments);
        let simplified = ChatRequest::new(model_name, PROMPT).with_images(first);
        let model = Arc::clone(self.runtime.model());

        self.runtime
            .invoker()
            .invoke::<String, _, _>(ANALYZE_VISION, |variant| {
                let request = match variant {
                    RequestVariant::Original => original.clone(),
                    RequestVariant::Simplified => simplified.clone(),
                };
                let model = Arc::clone(&model);
                async move { model.complete(&request).await }
            })
            .await
            .map(|invocation| invocation.value.trim().to_string())
            .map_err(|error| error.to_string())
    }
}

#[async_trait]
impl Stage for VisionStage {
    fn name(&self) -> &str {
        ANALYZE_VISION
    }

    async fn run(&self, state: Arc<AuditState>) -> Result<StateUpdate, StageError> {
        let Some(pdf) = state.pdf_path() else {
            return Ok(Self::unavailable(
                "",
                "No report document path was resolved.",
                "no report document available",
            ));
        };
        let location = pdf.display().to_string();

        let images = match self.runtime.diagrams().extract_images(pdf).await {
            Ok(images) => images,
            Err(error @ DiagramError::NotFound(_)) => {
                return Ok(Self::unavailable(
                    &location,
                    "Vision inspection failed because the report document was not accessible.",
                    error,
                ))
            }
            Err(error) => {
                return Ok(Self::unavailable(
                    &location,
                    "Diagram extraction failed before inspection.",
                    error,
                ))
            }
        };

        let attachments = self.attachments(&images).await;
        let (status, findings, confidence) = if attachments.is_empty() {
            (
                "no_images",
                "No readable images were found in the report, so diagram analysis could not \
                 confirm fan-in or aggregator patterns."
                    .to_string(),
                0.4,
            )
        } else {
            match self.inspect(attachments).await {
                Ok(findings) => ("analyzed", findings, 0.7),
                Err(error) => {
                    tracing::warn!(error = %error, "vision model unavailable");
                    ("failed", format!("Vision analysis unavailable: {error}"), 0.4)
                }
            }
        };

        let image_paths: Vec<String> = images.iter().map(|p| p.display().to_string()).collect();
        let content = json!({
            "image_count": images.len(),
            "image_paths": image_paths,
            "vision_status": status,
            "question": VISION_QUESTION,
            "forensic_confirmation": findings,
        });
        let record = evidence(VISION_GOAL, !images.is_empty(), pdf, confidence)?
            .with_content(content)
            .with_rationale("Extracted report images and queued them for multimodal classification.");
        tracing::info!(pdf = %location, images = images.len(), status, "diagrams inspected");

        Ok(StateUpdate::new()
            .with_evidence(EvidenceKey::vision(), vec![record])
            .with_message(format!(
                "{ANALYZE_VISION}: {} image(s) from {location}, status {status}",
                images.len()
            )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AuditConfig;
    use court_test_utils::{sample_rubric, FakeDiagrams, FakeDocuments, FakeRepository, ScriptedModel};
    use court_types::Confidence;
    use pretty_assertions::assert_eq;

    fn runtime(model: ScriptedModel) -> AuditRuntime {
        AuditRuntime::new(AuditConfig::default(), sample_rubric(), Arc::new(model))
    }

    fn only(update: &StateUpdate, key: &EvidenceKey) -> Evidence {
        let records = &update.evidences[key];
        assert_eq!(records.len(), 1);
        records[0].clone()
    }

    #[tokio::test]
    async fn investigation_records_scan_history_and_resolved_pdf() {
        let repo = tempfile::tempdir().unwrap();
        let runtime = runtime(ScriptedModel::replying("{}")).with_repository(Arc::new(FakeRepository::at(repo.path())));
        let stage = InvestigateStage::new(Arc::new(runtime));

        let update = stage.run(Arc::new(AuditState::new("https://example.com/agent.git"))).await.unwrap();
        assert_eq!(update.repo_path.as_deref(), Some(repo.path()));
        assert_eq!(update.pdf_path, Some(repo.path().join("reports/final_report.pdf")));

        let record = only(&update, &EvidenceKey::repository());
        assert!(record.found);
        assert_eq!(record.confidence, Confidence::new(0.85).unwrap());
        let content = record.content.unwrap();
        assert_eq!(content["summary"]["stategraph_detected"], json!(true));
        assert_eq!(content["git_history"][0]["hash"], json!("0123456789"));
    }

    #[tokio::test]
    async fn unreachable_repository_becomes_not_found_evidence() {
        let runtime = runtime(ScriptedModel::replying("{}"))
            .with_repository(Arc::new(FakeRepository::unreachable("network down")));
        let stage = InvestigateStage::new(Arc::new(runtime));

        let update = stage.run(Arc::new(AuditState::new("https://example.com/agent.git"))).await.unwrap();
        assert_eq!(update.repo_path, None);
        let record = only(&update, &EvidenceKey::repository());
        assert!(!record.found);
        assert_eq!(record.confidence, Confidence::NONE);
        assert_eq!(record.location, "https://example.com/agent.git");
        assert!(update.messages[0].starts_with("investigate: clone failed"));
    }

    #[tokio::test]
    async fn failed_history_is_noted_inside_the_evidence() {
        let repo = tempfile::tempdir().unwrap();
        let runtime = runtime(ScriptedModel::replying("{}"))
            .with_repository(Arc::new(FakeRepository::at(repo.path()).without_history()));
        let update = InvestigateStage::new(Arc::new(runtime))
            .run(Arc::new(AuditState::new("local")))
            .await
            .unwrap();

        let content = only(&update, &EvidenceKey::repository()).content.unwrap();
        assert!(content["git_history"].as_str().unwrap().starts_with("history unavailable"));
    }

    #[tokio::test]
    async fn document_payload_carries_digest_snippets_and_refinement() {
        let markdown = "# Objectives\n\nBuild a Graph Orchestration Architecture with fan-in.\n\n# Constraints\n\nNo shell injection.\n";
        let model = Arc::new(ScriptedModel::replying(r#"{"scoring_rubric_rules": ["r1"], "technical_constraints": []}"#));
        let runtime = AuditRuntime::new(AuditConfig::default(), sample_rubric(), model.clone())
            .with_documents(Arc::new(FakeDocuments::serving(markdown)));
        let state = AuditState::new("repo")
            .with_criteria(sample_rubric().dimensions)
            .with_requested_pdf("/tmp/report.pdf");

        let update = DocumentStage::new(Arc::new(runtime)).run(Arc::new(state)).await.unwrap();
        let record = only(&update, &EvidenceKey::document());
        assert!(record.found);
        assert_eq!(record.location, "/tmp/report.pdf");
        let content = record.content.unwrap();
        assert!(content["objectives"].as_str().unwrap().contains("fan-in"));
        assert!(content["constraints"].as_str().unwrap().contains("shell injection"));
        assert!(content["criterion_snippets"]["graph_orchestration"]
            .as_str()
            .unwrap()
            .contains("Graph Orchestration"));
        assert_eq!(content["llm_refined_requirements"]["scoring_rubric_rules"], json!(["r1"]));
        assert_eq!(model.calls("forensic auditor"), 1);
    }

    #[tokio::test]
    async fn missing_document_or_path_is_not_found() {
        let runtime = Arc::new(
            runtime(ScriptedModel::replying("{}")).with_documents(Arc::new(FakeDocuments::missing())),
        );

        let no_path = DocumentStage::new(Arc::clone(&runtime)).run(Arc::new(AuditState::new("repo"))).await.unwrap();
        let record = only(&no_path, &EvidenceKey::document());
        assert!(!record.found);
        assert_eq!(record.location, "unknown");

        let state = AuditState::new("repo").with_requested_pdf("/nowhere/report.pdf");
        let missing = DocumentStage::new(runtime).run(Arc::new(state)).await.unwrap();
        let record = only(&missing, &EvidenceKey::document());
        assert!(!record.found);
        assert_eq!(record.location, "/nowhere/report.pdf");
    }

    #[tokio::test]
    async fn vision_inspects_readable_images() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("page-1-000.png");
        std::fs::write(&image, [0x89, b'P', b'N', b'G']).unwrap();
        let model = Arc::new(ScriptedModel::replying("  Fan-in to an aggregator is shown. "));
        let runtime = AuditRuntime::new(AuditConfig::default(), sample_rubric(), model.clone())
            .with_diagrams(Arc::new(FakeDiagrams::returning(vec![image.clone()])));
        let state = AuditState::new("repo").with_requested_pdf(dir.path().join("report.pdf"));

        let update = VisionStage::new(Arc::new(runtime)).run(Arc::new(state)).await.unwrap();
        let record = only(&update, &EvidenceKey::vision());
        assert!(record.found);
        assert_eq!(record.confidence, Confidence::new(0.7).unwrap());
        let content = record.content.unwrap();
        assert_eq!(content["vision_status"], json!("analyzed"));
        assert_eq!(content["forensic_confirmation"], json!("Fan-in to an aggregator is shown."));
        assert_eq!(content["image_paths"], json!([image.display().to_string()]));
        assert_eq!(model.requests()[0].images.len(), 1);
    }

    #[tokio::test]
    async fn vision_without_images_skips_the_model() {
        let model = Arc::new(ScriptedModel::replying("unused"));
        let runtime = AuditRuntime::new(AuditConfig::default(), sample_rubric(), model.clone())
            .with_diagrams(Arc::new(FakeDiagrams::empty()));
        let state = AuditState::new("repo").with_requested_pdf("/tmp/report.pdf");

        let update = VisionStage::new(Arc::new(runtime)).run(Arc::new(state)).await.unwrap();
        let record = only(&update, &EvidenceKey::vision());
        assert!(!record.found);
        assert_eq!(record.content.unwrap()["vision_status"], json!("no_images"));
        assert!(model.requests().is_empty());
    }

    #[tokio::test]
    async fn broken_extractor_is_not_found() {
        let runtime = runtime(ScriptedModel::replying("unused"))
            .with_diagrams(Arc::new(FakeDiagrams::broken("pdfimages: command not found")));
        let state = AuditState::new("repo").with_requested_pdf("/tmp/report.pdf");

        let update = VisionStage::new(Arc::new(runtime)).run(Arc::new(state)).await.unwrap();
        let record = only(&update, &EvidenceKey::vision());
        assert!(!record.found);
        assert_eq!(record.rationale, "Diagram extraction failed before inspection.");
    }
}
