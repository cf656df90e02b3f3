//! Narrative synthesis and the final stage
//!
//! The scorecard is computed deterministically; the model only writes
//! prose around it. Its reply is accepted if it carries the two section
//! markers, or if it embeds a JSON object with `executive_summary` and
//! `remediation_plan` (recovered through the invoker's salvage path).
//! A rejection for size or rate limiting halves the argument budget and
//! retries once; anything else unusable falls back to canned text.

use crate::report::{render, write_report};
use crate::runtime::AuditRuntime;
use crate::scoring::{score_all, Scorecard};
use async_trait::async_trait;
use chrono::Utc;
use court_catalog::EvidenceCatalog;
use court_kernel::{Stage, StageError};
use court_llm::{ChatRequest, ExternalServiceError, RequestVariant, ServiceFailure};
use court_state::{AuditState, StateUpdate};
use court_types::AuditReport;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::{Arc, OnceLock};

/// Stage name of the chief justice
pub const SYNTHESIZE: &str = "synthesize";

/// Marker opening the summary section of a reply
pub const SUMMARY_MARKER: &str = "EXECUTIVE_SUMMARY:";
/// Marker opening the remediation section of a reply
pub const REMEDIATION_MARKER: &str = "REMEDIATION_PLAN:";

const FALLBACK_SUMMARY: &str =
    "The audit identifies mixed compliance with several high-risk gaps that require immediate remediation.";
const FALLBACK_REMEDIATION: [&str; 3] = [
    "Resolve security-sensitive tool usage and enforce safe execution patterns.",
    "Tighten structured-output guarantees and citation validity checks.",
    "Stabilize graph orchestration, especially fan-out/fan-in and synthesis logic.",
];

/// Executive summary and remediation bullets
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "NarrativeWire")]
pub struct Narrative {
    /// Two to four sentences including the overall verdict
    pub executive_summary: String,
    /// One entry per bullet
    pub remediation_plan: Vec<String>,
}

#[derive(Deserialize)]
struct NarrativeWire {
    executive_summary: String,
    #[serde(default)]
    remediation_plan: PlanWire,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PlanWire {
    Text(String),
    Items(Vec<String>),
}

impl Default for PlanWire {
    fn default() -> Self {
        Self::Items(Vec::new())
    }
}

impl From<NarrativeWire> for Narrative {
    fn from(wire: NarrativeWire) -> Self {
        let remediation_plan = match wire.remediation_plan {
            PlanWire::Text(text) => bullets(&text),
            PlanWire::Items(items) => items
                .iter()
                .map(|item| strip_bullet(item).to_string())
                .filter(|item| !item.is_empty())
                .collect(),
        };
        Self {
            executive_summary: wire.executive_summary.trim().to_string(),
            remediation_plan,
        }
    }
}

impl Narrative {
    /// Canned text used when no usable reply was produced
    #[must_use]
    pub fn fallback() -> Self {
        Self {
            executive_summary: FALLBACK_SUMMARY.to_string(),
            remediation_plan: FALLBACK_REMEDIATION.iter().map(|s| (*s).to_string()).collect(),
        }
    }
}

fn strip_bullet(line: &str) -> &str {
    let line = line.trim();
    for prefix in ["- ", "* ", "\u{2022} "] {
        if let Some(rest) = line.strip_prefix(prefix) {
            return rest.trim();
        }
    }
    let digits = line.chars().take_while(char::is_ascii_digit).count();
    if digits > 0 {
        let rest = &line[digits..];
        if let Some(stripped) = rest.strip_prefix(". ").or_else(|| rest.strip_prefix(") ")) {
            return stripped.trim();
        }
    }
    line
}

/// Split a remediation section into bullets
#[must_use]
pub fn bullets(text: &str) -> Vec<String> {
    text.lines()
        .map(strip_bullet)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse a marker-delimited reply
///
/// Returns `None` unless both markers are present and the summary is
/// non-empty.
#[must_use]
pub fn parse_narrative(text: &str) -> Option<Narrative> {
    let (_, after_summary) = text.split_once(SUMMARY_MARKER)?;
    let (summary, plan) = after_summary.split_once(REMEDIATION_MARKER)?;
    let summary = summary.trim();
    if summary.is_empty() {
        return None;
    }
    Some(Narrative {
        executive_summary: summary.to_string(),
        remediation_plan: bullets(plan),
    })
}

fn truncate_chars(text: &str, budget: usize) -> String {
    if text.chars().count() <= budget {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(budget).collect();
    cut.push_str("...");
    cut
}

/// Data block sent to the model
#[must_use]
pub fn synthesis_payload(card: &Scorecard, rules: &Value, budget: usize, with_citations: bool) -> Value {
    let criteria: Vec<Value> = card
        .criteria
        .iter()
        .map(|result| {
            let judges: Vec<Value> = result
                .judge_records
                .iter()
                .map(|record| {
                    let mut entry = json!({
                        "judge": record.judge,
                        "score": record.score.get(),
                        "effective_score": record.effective_score,
                        "discounted": record.discounted,
                        "argument": truncate_chars(&record.argument, budget),
                    });
                    if with_citations {
                        entry["cited_evidence"] = json!(record.cited_evidence);
                    }
                    entry
                })
                .collect();
            json!({
                "criterion_id": result.criterion_id,
                "criterion_name": result.criterion_name,
                "final_score": result.final_score,
                "contested": result.contested,
                "dissent_summary": result.dissent_summary,
                "judges": judges,
            })
        })
        .collect();

    json!({
        "overall_score": card.overall_score,
        "overall_grade": card.overall_grade.label(),
        "criteria": criteria,
        "synthesis_rules": rules,
    })
}

fn synthesis_prompt(payload: &Value) -> String {
    format!(
        "You are the Chief Justice writing the final synthesis for a software audit. \
         Use the deterministic scoring results exactly as provided.\n\n\
         Return plain text using this exact format:\n\
         {SUMMARY_MARKER}\n\
         <2-4 sentences, include overall verdict>\n\n\
         {REMEDIATION_MARKER}\n\
         - bullet 1\n\
         - bullet 2\n\
         - bullet 3\n\n\
         DATA:\n{payload}"
    )
}

fn accept_reply(text: String) -> Result<Narrative, ServiceFailure> {
    match parse_narrative(&text) {
        Some(narrative) => Ok(narrative),
        None => Err(ServiceFailure::malformed(
            format!("reply lacks {SUMMARY_MARKER} / {REMEDIATION_MARKER} sections"),
            text,
        )),
    }
}

/// Writes the narrative around a scorecard
#[derive(Debug, Clone, Copy)]
pub struct NarrativeSynthesizer<'a> {
    runtime: &'a AuditRuntime,
}

impl<'a> NarrativeSynthesizer<'a> {
    /// Bind to a runtime
    #[must_use]
    pub fn new(runtime: &'a AuditRuntime) -> Self {
        Self { runtime }
    }

    /// Narrative for `card`, never failing
    pub async fn narrate(&self, card: &Scorecard) -> Narrative {
        let budget = self.runtime.config().synthesis.argument_budget;
        let error = match self.attempt(card, budget).await {
            Ok(narrative) => return narrative,
            Err(error) => error,
        };

        if error.is_shrinkable() {
            tracing::warn!(error = %error, budget = budget / 2, "retrying synthesis with a smaller payload");
            match self.attempt(card, budget / 2).await {
                Ok(narrative) => return narrative,
                Err(retry) => tracing::warn!(error = %retry, "synthesis unavailable; using canned narrative"),
            }
        } else {
            tracing::warn!(error = %error, "synthesis unavailable; using canned narrative");
        }
        Narrative::fallback()
    }

    async fn attempt(&self, card: &Scorecard, budget: usize) -> Result<Narrative, ExternalServiceError> {
        let rules = &self.runtime.rubric().synthesis_rules;
        let model_name = &self.runtime.config().model.synthesis_model;
        let original = ChatRequest::new(
            model_name,
            synthesis_prompt(&synthesis_payload(card, rules, budget, true)),
        );
        let simplified = ChatRequest::new(
            model_name,
            synthesis_prompt(&synthesis_payload(card, rules, budget / 2, false)),
        );
        let model = Arc::clone(self.runtime.model());

        self.runtime
            .invoker()
            .invoke::<Narrative, _, _>(SYNTHESIZE, |variant| {
                let request = match variant {
                    RequestVariant::Original => original.clone(),
                    RequestVariant::Simplified => simplified.clone(),
                };
                let model = Arc::clone(&model);
                async move { model.complete(&request).await.and_then(accept_reply) }
            })
            .await
            .map(|invocation| invocation.value)
    }
}

/// Slot the synthesize stage fills with the finished report
pub type ReportSlot = Arc<OnceLock<AuditReport>>;

/// Scores, narrates and writes the report
#[derive(Debug)]
pub struct SynthesizeStage {
    runtime: Arc<AuditRuntime>,
    slot: ReportSlot,
}

impl SynthesizeStage {
    /// Create the stage, publishing into `slot`
    #[must_use]
    pub fn new(runtime: Arc<AuditRuntime>, slot: ReportSlot) -> Self {
        Self { runtime, slot }
    }
}

#[async_trait]
impl Stage for SynthesizeStage {
    fn name(&self) -> &str {
        SYNTHESIZE
    }

    async fn run(&self, state: Arc<AuditState>) -> Result<StateUpdate, StageError> {
        let config = self.runtime.config();
        let catalog = EvidenceCatalog::build(state.evidences());
        let card = score_all(state.criteria(), state.opinions(), &catalog, &config.scoring);
        tracing::info!(
            overall = card.overall_score,
            grade = %card.overall_grade,
            criteria = card.criteria.len(),
            "scorecard computed"
        );

        let narrative = NarrativeSynthesizer::new(&self.runtime).narrate(&card).await;
        let report = AuditReport {
            repo_url: state.repo_url().to_string(),
            generated_at: Utc::now(),
            overall_score: card.overall_score,
            overall_grade: card.overall_grade,
            criteria: card.criteria,
            executive_summary: narrative.executive_summary,
            remediation_plan: narrative.remediation_plan,
        };

        let path = &config.report_path;
        write_report(path, &render(&report))
            .await
            .map_err(StageError::unexpected)?;
        if self.slot.set(report).is_err() {
            return Err(StageError::unexpected("report already published for this run"));
        }

        Ok(StateUpdate::message(format!(
            "{SYNTHESIZE}: audit report saved to {}",
            path.display()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AuditConfig;
    use court_test_utils::{sample_rubric, ScriptedModel};
    use court_types::{CriterionResult, Grade};
    use pretty_assertions::assert_eq;

    fn card() -> Scorecard {
        Scorecard {
            criteria: vec![CriterionResult::placeholder("graph_orchestration", "Graph Orchestration")],
            overall_score: 1.0,
            overall_grade: Grade::VibeCoder,
        }
    }

    fn runtime(model: ScriptedModel) -> AuditRuntime {
        AuditRuntime::new(AuditConfig::default(), sample_rubric(), Arc::new(model))
    }

    #[test]
    fn marker_reply_is_split_into_summary_and_bullets() {
        let text = "Preamble\nEXECUTIVE_SUMMARY:\n  Solid graph, weak tools.\n\nREMEDIATION_PLAN:\n- Fix tools\n* Add tests\n3. Document state\n";
        let narrative = parse_narrative(text).unwrap();
        assert_eq!(narrative.executive_summary, "Solid graph, weak tools.");
        assert_eq!(narrative.remediation_plan, vec!["Fix tools", "Add tests", "Document state"]);

        assert_eq!(parse_narrative("EXECUTIVE_SUMMARY: only"), None);
        assert_eq!(parse_narrative("EXECUTIVE_SUMMARY:\n\nREMEDIATION_PLAN:\n- x"), None);
    }

    #[test]
    fn json_plan_accepts_text_or_list() {
        let text: Narrative =
            serde_json::from_str(r#"{"executive_summary":" ok ","remediation_plan":"- a\n- b"}"#).unwrap();
        assert_eq!(text.executive_summary, "ok");
        assert_eq!(text.remediation_plan, vec!["a", "b"]);

        let list: Narrative =
            serde_json::from_str(r#"{"executive_summary":"ok","remediation_plan":["- a","b",""]}"#).unwrap();
        assert_eq!(list.remediation_plan, vec!["a", "b"]);
    }

    #[test]
    fn payload_truncates_arguments_and_drops_citations_when_simplified() {
        let mut card = card();
        card.criteria[0].judge_records.push(court_types::JudgeRecord {
            judge: court_types::Judge::Defense,
            score: court_types::Score::new(4).unwrap(),
            argument: "a".repeat(50),
            cited_evidence: vec!["src/graph.py".into()],
            effective_score: 4.0,
            discounted: false,
        });

        let full = synthesis_payload(&card, &Value::Null, 10, true);
        let judge = &full["criteria"][0]["judges"][0];
        assert_eq!(judge["argument"], json!(format!("{}...", "a".repeat(10))));
        assert_eq!(judge["cited_evidence"], json!(["src/graph.py"]));
        assert_eq!(full["overall_grade"], json!("The Vibe Coder"));

        let short = synthesis_payload(&card, &Value::Null, 10, false);
        assert!(short["criteria"][0]["judges"][0].get("cited_evidence").is_none());
    }

    #[tokio::test]
    async fn embedded_json_reply_is_salvaged() {
        let model = ScriptedModel::replying(
            r#"Sure! {"executive_summary": "Competent work.", "remediation_plan": ["Pin versions"]}"#,
        );
        let narrative = NarrativeSynthesizer::new(&runtime(model)).narrate(&card()).await;
        assert_eq!(narrative.executive_summary, "Competent work.");
        assert_eq!(narrative.remediation_plan, vec!["Pin versions"]);
    }

    #[tokio::test]
    async fn oversized_rejection_retries_once_with_half_budget_then_falls_back() {
        let model = Arc::new(ScriptedModel::failing(ServiceFailure::Oversized {
            message: "context length exceeded".into(),
        }));
        let runtime = AuditRuntime::new(AuditConfig::default(), sample_rubric(), model.clone());

        let narrative = NarrativeSynthesizer::new(&runtime).narrate(&card()).await;
        assert_eq!(narrative, Narrative::fallback());
        assert_eq!(model.requests().len(), 6);
    }

    #[tokio::test]
    async fn unparseable_prose_falls_back_without_shrinking() {
        let model = Arc::new(ScriptedModel::replying("I cannot comply."));
        let runtime = AuditRuntime::new(AuditConfig::default(), sample_rubric(), model.clone());

        let narrative = NarrativeSynthesizer::new(&runtime).narrate(&card()).await;
        assert_eq!(narrative, Narrative::fallback());
        assert_eq!(model.requests().len(), 3);
    }
}
