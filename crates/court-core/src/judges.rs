//! Judge stages
//!
//! Three personas score every criterion against the same evidence. Each
//! judge walks the criteria in order, pacing its calls, and resolves the
//! citations it claims against the run's evidence catalog before the
//! opinion enters the state. A judge that cannot finish (its external
//! calls exhausted) contributes a single score-1 fallback opinion instead.

use crate::runtime::AuditRuntime;
use async_trait::async_trait;
use court_catalog::{fallback_citation, normalize, resolve, EvidenceCatalog, NO_EVIDENCE_MARKER};
use court_collaborators::JudgePhilosophy;
use court_kernel::{Stage, StageError};
use court_llm::{complete_json, ChatRequest, ExternalServiceError, RequestVariant};
use court_state::{AuditState, StateUpdate};
use court_types::{Criterion, Judge, JudicialOpinion, Score};
use serde::Deserialize;
use std::sync::Arc;

/// Criterion id of the opinion substituted for a failed judge
pub const JUDGE_FAILURE_CRITERION: &str = "judicial_runtime_error";

const TRUNCATION_MARK: &str = " ...[TRUNCATED]... ";

const OUTPUT_CONTRACT: &str = "You are an API component. Your output is consumed by a strict JSON parser. \
     Respond only with one raw JSON object with the keys judge, criterion_id, score, argument and \
     cited_evidence. No preamble, no markdown code fences.";

/// Stage name for a judge
#[must_use]
pub fn stage_name(judge: Judge) -> String {
    format!("judge_{}", judge.rubric_key())
}

/// Model output before it is bound to a judge and criterion
#[derive(Debug, Clone, Deserialize)]
struct OpinionDraft {
    score: Score,
    #[serde(default)]
    argument: String,
    #[serde(default)]
    cited_evidence: Vec<String>,
}

/// Citable strings offered to the judges, in evidence-key order
///
/// Goal, location and rendered content of each record, then the owning
/// key, all normalized and capped at `limit`. Never empty.
#[must_use]
pub fn evidence_strings(state: &AuditState, limit: usize) -> Vec<String> {
    let mut strings = Vec::new();
    for (key, records) in state.evidences() {
        for record in records {
            let texts = [Some(record.goal.clone()), Some(record.location.clone()), record.content_text()];
            strings.extend(
                texts
                    .into_iter()
                    .flatten()
                    .map(|text| normalize(&text))
                    .filter(|text| !text.is_empty()),
            );
            if strings.len() >= limit {
                break;
            }
        }
        if strings.len() < limit {
            strings.push(key.as_str().to_string());
        }
    }
    strings.truncate(limit);
    if strings.is_empty() {
        strings.push(NO_EVIDENCE_MARKER.to_string());
    }
    strings
}

/// Evidence strings as a JSON array, cut in the middle beyond `max_chars`
#[must_use]
pub fn evidence_context(strings: &[String], max_chars: usize) -> String {
    let payload = serde_json::to_string(strings).unwrap_or_else(|_| "[]".to_string());
    let count = payload.chars().count();
    if count <= max_chars {
        return payload;
    }
    let half = max_chars / 2;
    let head: String = payload.chars().take(half).collect();
    let tail: String = payload.chars().skip(count - half).collect();
    format!("{head}{TRUNCATION_MARK}{tail}")
}

fn capped(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

/// One judicial persona
#[derive(Debug)]
pub struct JudgeStage {
    judge: Judge,
    name: String,
    runtime: Arc<AuditRuntime>,
}

impl JudgeStage {
    /// Create the stage for `judge`
    #[must_use]
    pub fn new(judge: Judge, runtime: Arc<AuditRuntime>) -> Self {
        Self {
            judge,
            name: stage_name(judge),
            runtime,
        }
    }

    /// Role of this stage
    #[inline]
    #[must_use]
    pub fn judge(&self) -> Judge {
        self.judge
    }

    fn prompt(&self, criterion: &Criterion, philosophy: &JudgePhilosophy, context: &str) -> String {
        let limit = self.runtime.config().evidence.instruction_chars;
        let focus = serde_json::to_string(&philosophy.focus).unwrap_or_else(|_| "[]".to_string());
        format!(
            "You are the {judge} in a Digital Courtroom.\n\
             Core Philosophy: {core}\n\
             Handbook: {handbook}\n\
             Focus Areas: {focus}\n\n\
             Criterion ID: {id}\n\
             Criterion Name: {name}\n\
             Forensic Instruction: {instruction}\n\
             Success Pattern: {success}\n\
             Failure Pattern: {failure}\n\n\
             Available evidence strings (you must cite exact strings from this list):\n\
             {context}\n\n\
             When citing evidence, do not copy large JSON objects. Summarize the key finding \
             (e.g. 'stategraph_detected: true') instead.\n\n\
             Return a JSON object with:\n\
             - judge='{judge}'\n\
             - criterion_id='{id}'\n\
             - score from 1 to 5\n\
             - argument with concrete forensic reasoning\n\
             - cited_evidence as exact strings from the provided evidence list only.",
            judge = self.judge,
            core = philosophy.core_philosophy,
            handbook = philosophy.handbook,
            id = criterion.id,
            name = criterion.name,
            instruction = capped(&criterion.forensic_instruction, limit),
            success = capped(&criterion.success_pattern, limit),
            failure = criterion.failure_pattern,
        )
    }

    async fn deliberate(&self, criterion: &Criterion, prompt: String) -> Result<OpinionDraft, ExternalServiceError> {
        let model_name = &self.runtime.config().model.judge_model;
        let simplified_prompt = format!(
            "{prompt}\n\nThe previous attempt failed due to JSON formatting. Please provide a \
             shorter argument and avoid special characters or raw code snippets in your citations."
        );
        let original = ChatRequest::new(model_name, prompt).with_system(OUTPUT_CONTRACT).json();
        let simplified = ChatRequest::new(model_name, simplified_prompt)
            .with_system(OUTPUT_CONTRACT)
            .json();
        let model = Arc::clone(self.runtime.model());
        let label = format!("{}:{}", self.name, criterion.id);

        let invocation = self
            .runtime
            .invoker()
            .invoke::<OpinionDraft, _, _>(&label, |variant| {
                let request = match variant {
                    RequestVariant::Original => original.clone(),
                    RequestVariant::Simplified => simplified.clone(),
                };
                let model = Arc::clone(&model);
                async move { complete_json::<OpinionDraft>(model.as_ref(), &request).await }
            })
            .await?;
        if invocation.salvaged {
            tracing::debug!(judge = %self.judge, criterion = %criterion.id, "opinion salvaged");
        }
        Ok(invocation.value)
    }
}

#[async_trait]
impl Stage for JudgeStage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, state: Arc<AuditState>) -> Result<StateUpdate, StageError> {
        let config = self.runtime.config();
        let stagger = config.pacing.stagger(self.judge);
        if !stagger.is_zero() {
            tokio::time::sleep(stagger).await;
        }

        let strings = evidence_strings(&state, config.evidence.prompt_limit);
        let context = evidence_context(&strings, config.evidence.context_chars);
        let catalog = EvidenceCatalog::build(state.evidences());
        let philosophy = self.runtime.rubric().philosophy(self.judge);

        let criteria = state.criteria();
        let mut opinions = Vec::with_capacity(criteria.len());
        for (index, criterion) in criteria.iter().enumerate() {
            let pause = config.pacing.before_criterion(index + 1);
            if !pause.is_zero() {
                tokio::time::sleep(pause).await;
            }

            let prompt = self.prompt(criterion, &philosophy, &context);
            let draft = self
                .deliberate(criterion, prompt)
                .await
                .map_err(StageError::external)?;

            let target = if criterion.target_artifact.trim().is_empty() {
                "Source"
            } else {
                criterion.target_artifact.as_str()
            };
            let citations = resolve(&draft.cited_evidence, &catalog, &fallback_citation(target));
            tracing::debug!(judge = %self.judge, criterion = %criterion.id, score = %draft.score, "opinion recorded");
            opinions.push(
                JudicialOpinion::new(self.judge, &criterion.id, draft.score, draft.argument)
                    .with_citations(citations),
            );
        }

        tracing::info!(judge = %self.judge, opinions = opinions.len(), "judge finished");
        let count = opinions.len();
        Ok(StateUpdate::new()
            .with_opinions(opinions)
            .with_message(format!("{} completed {count} criterion reviews", self.judge)))
    }

    fn recover(&self, error: &StageError) -> StateUpdate {
        let fallback = JudicialOpinion::new(
            self.judge,
            JUDGE_FAILURE_CRITERION,
            Score::MIN,
            format!("{} could not complete judicial analysis: {error}", self.judge),
        )
        .with_citations([NO_EVIDENCE_MARKER]);
        StateUpdate::new()
            .with_opinions([fallback])
            .with_message(format!("{}: judge failed ({error}); fallback opinion recorded", self.name))
    }
}
