//! End-to-end runs of the courtroom graph with scripted collaborators

use court_core::synthesis::Narrative;
use court_core::{AuditConfig, AuditRequest, AuditRuntime, Auditor, PacingConfig};
use court_llm::ServiceFailure;
use court_test_utils::{sample_rubric, FakeDiagrams, FakeDocuments, FakeRepository, ScriptedModel};
use court_types::{Grade, Judge};
use pretty_assertions::assert_eq;
use std::path::Path;
use std::sync::Arc;

const REPORT_MARKDOWN: &str = "\
# Objectives

Graph Orchestration Architecture with parallel detectives and a fan-in aggregator.

# Constraints

Clone into a sandboxed temp dir; never call os.system.
";

fn config(report_dir: &Path, pacing: PacingConfig) -> AuditConfig {
    AuditConfig {
        report_path: report_dir.join("out/audit_report.md"),
        pacing,
        ..AuditConfig::default()
    }
}

fn opinion(score: u8, argument: &str) -> String {
    format!(r#"{{"score": {score}, "argument": "{argument}", "cited_evidence": ["repo_analysis"]}}"#)
}

#[tokio::test(start_paused = true)]
async fn scripted_run_produces_contested_verdicts_and_narrative() {
    let repo = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();

    let model = Arc::new(
        ScriptedModel::replying("{}")
            .when(
                "Chief Justice",
                "EXECUTIVE_SUMMARY:\nCompetent orchestration with a split bench.\n\n\
                 REMEDIATION_PLAN:\n- Add reducers to shared lists\n- Document the aggregator\n",
            )
            .when("You are the Prosecutor", opinion(2, "Evidence of reducers is thin"))
            .when("You are the Defense", opinion(5, "Parallel detectives are clearly wired"))
            .when("You are the TechLead", opinion(4, "Fan-in works")),
    );
    let runtime = AuditRuntime::new(config(out.path(), PacingConfig::default()), sample_rubric(), model.clone())
        .with_repository(Arc::new(FakeRepository::at(repo.path())))
        .with_documents(Arc::new(FakeDocuments::serving(REPORT_MARKDOWN)))
        .with_diagrams(Arc::new(FakeDiagrams::empty()));

    let outcome = Auditor::new(runtime)
        .run(AuditRequest::new("https://github.com/acme/agent.git").with_pdf_path("reports/final_report.pdf"))
        .await
        .unwrap();

    assert!(outcome.recovered_stages().is_empty());
    let report = &outcome.report;
    assert_eq!(report.criteria.len(), 3);
    for result in &report.criteria {
        assert_eq!(result.final_score, 4, "{}", result.criterion_id);
        assert!(result.contested);
        let judges: Vec<Judge> = result.judge_records.iter().map(|r| r.judge).collect();
        assert_eq!(judges, Judge::ALL.to_vec());
        assert!(result.judge_records.iter().all(|r| !r.discounted));
    }
    assert!((report.overall_score - 4.0).abs() < f64::EPSILON);
    assert_eq!(report.overall_grade, Grade::CompetentOrchestrator);
    assert_eq!(report.executive_summary, "Competent orchestration with a split bench.");
    assert_eq!(
        report.remediation_plan,
        vec!["Add reducers to shared lists", "Document the aggregator"]
    );

    // one refinement, nine judge reviews, one narrative
    assert_eq!(model.calls("forensic auditor"), 1);
    assert_eq!(model.calls("in a Digital Courtroom"), 9);
    assert_eq!(model.calls("Chief Justice"), 1);

    let written = std::fs::read_to_string(&outcome.report_path).unwrap();
    assert!(written.starts_with("# Executive Summary\n- Repository: https://github.com/acme/agent.git\n"));
    assert!(written.contains("- Overall Grade: **Competent Orchestrator**"));
    assert!(written.contains("### Safe Tool Engineering (`safe_tool_engineering`)"));
    assert!(written.ends_with("- Add reducers to shared lists\n- Document the aggregator\n"));
    assert!(outcome
        .state
        .messages()
        .iter()
        .any(|m| m.starts_with("synthesize: audit report saved to")));
}

#[tokio::test(start_paused = true)]
async fn total_collaborator_failure_still_yields_a_report() {
    let out = tempfile::tempdir().unwrap();
    let model = Arc::new(ScriptedModel::failing(ServiceFailure::RateLimited {
        message: "tokens per minute exceeded".into(),
    }));
    let runtime = AuditRuntime::new(config(out.path(), PacingConfig::none()), sample_rubric(), model)
        .with_repository(Arc::new(FakeRepository::unreachable("could not resolve host")))
        .with_documents(Arc::new(FakeDocuments::missing()))
        .with_diagrams(Arc::new(FakeDiagrams::broken("pdfimages missing")));

    let outcome = Auditor::new(runtime)
        .run(AuditRequest::new("https://github.com/acme/missing.git"))
        .await
        .unwrap();

    assert_eq!(
        outcome.recovered_stages(),
        vec!["judge_prosecutor", "judge_defense", "judge_tech_lead"]
    );
    assert_eq!(outcome.state.opinions().len(), 3);

    let report = &outcome.report;
    assert_eq!(report.criteria.len(), sample_rubric().dimensions.len());
    assert!(report.criteria.iter().all(|r| r.final_score == 1 && !r.has_opinions()));
    assert!((report.overall_score - 1.0).abs() < f64::EPSILON);
    assert_eq!(report.overall_grade, Grade::VibeCoder);

    let fallback = Narrative::fallback();
    assert_eq!(report.executive_summary, fallback.executive_summary);
    assert_eq!(report.remediation_plan, fallback.remediation_plan);

    let written = std::fs::read_to_string(&outcome.report_path).unwrap();
    assert_eq!(written.matches("- No judicial opinion captured for this criterion.").count(), 3);
}

#[tokio::test(start_paused = true)]
async fn failed_narrative_keeps_scores_and_uses_canned_text() {
    let repo = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    let model = Arc::new(
        ScriptedModel::replying("{}")
            .when_fail(
                "Chief Justice",
                ServiceFailure::Oversized {
                    message: "context length exceeded".into(),
                },
            )
            .when("You are the Prosecutor", opinion(4, "Reducers present"))
            .when("You are the Defense", opinion(4, "Well wired"))
            .when("You are the TechLead", opinion(4, "Works")),
    );
    let runtime = AuditRuntime::new(config(out.path(), PacingConfig::none()), sample_rubric(), model.clone())
        .with_repository(Arc::new(FakeRepository::at(repo.path())))
        .with_documents(Arc::new(FakeDocuments::serving(REPORT_MARKDOWN)))
        .with_diagrams(Arc::new(FakeDiagrams::empty()));

    let outcome = Auditor::new(runtime)
        .run(AuditRequest::new("https://github.com/acme/agent.git"))
        .await
        .unwrap();

    assert!(outcome.recovered_stages().is_empty());
    let report = &outcome.report;
    assert!(report.criteria.iter().all(|r| r.final_score == 4 && !r.contested));
    assert_eq!(report.overall_grade, Grade::CompetentOrchestrator);
    assert_eq!(report.executive_summary, Narrative::fallback().executive_summary);
    assert!(model.calls("Chief Justice") >= 2);
}

#[tokio::test]
async fn missing_report_destination_fails_the_run() {
    let out = tempfile::tempdir().unwrap();
    let blocker = out.path().join("not_a_dir");
    std::fs::write(&blocker, "file").unwrap();

    let config = AuditConfig {
        report_path: blocker.join("audit_report.md"),
        pacing: PacingConfig::none(),
        ..AuditConfig::default()
    };
    let runtime = AuditRuntime::new(config, sample_rubric(), Arc::new(ScriptedModel::replying("{}")))
        .with_repository(Arc::new(FakeRepository::unreachable("offline")))
        .with_documents(Arc::new(FakeDocuments::missing()))
        .with_diagrams(Arc::new(FakeDiagrams::empty()));

    let error = Auditor::new(runtime)
        .run(AuditRequest::new("https://github.com/acme/agent.git"))
        .await
        .unwrap_err();
    assert!(matches!(error, court_core::AuditError::Synthesis(_)));
}
