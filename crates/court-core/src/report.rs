//! Markdown report rendering

use crate::error::{AuditError, Result};
use court_types::{AuditReport, CriterionResult};
use std::fmt::Write as _;
use std::path::Path;

/// Render an [`AuditReport`] as Markdown
///
/// Layout is fixed: header, one subsection per criterion in rubric
/// order, remediation bullets.
#[must_use]
pub fn render(report: &AuditReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# Executive Summary");
    let _ = writeln!(out, "- Repository: {}", report.repo_url);
    let _ = writeln!(out, "- Generated: {}", report.generated_at.to_rfc3339());
    let _ = writeln!(out, "- Overall Grade: **{}**", report.overall_grade.label());
    let _ = writeln!(out, "- Total Score: **{:.2} / 5.00**", report.overall_score);
    let _ = writeln!(out, "- High-Level Verdict: {}", one_line(&report.executive_summary));
    out.push('\n');

    let _ = writeln!(out, "## Criterion Breakdown");
    let blocks: Vec<String> = report.criteria.iter().map(criterion_block).collect();
    out.push_str(&blocks.join("\n\n"));
    out.push_str("\n\n");

    let _ = writeln!(out, "## Remediation Plan");
    for item in &report.remediation_plan {
        let _ = writeln!(out, "- {item}");
    }
    out
}

fn one_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn criterion_block(result: &CriterionResult) -> String {
    let mut block = String::new();
    let _ = writeln!(block, "### {} (`{}`)", result.criterion_name, result.criterion_id);
    let _ = writeln!(block, "- Final Score: **{}/5**", result.final_score);
    let _ = writeln!(
        block,
        "- Contested Verdict: **{}**",
        if result.contested { "Yes" } else { "No" }
    );
    if let Some(dissent) = &result.dissent_summary {
        let _ = writeln!(block, "- Dissent Summary: {dissent}");
    }

    if !result.has_opinions() {
        block.push_str("- No judicial opinion captured for this criterion.");
        return block;
    }

    let lines: Vec<String> = result
        .judge_records
        .iter()
        .map(|record| {
            let note = if record.discounted {
                " (discounted for invalid citation)"
            } else {
                ""
            };
            let citations = if record.cited_evidence.is_empty() {
                "No citations".to_string()
            } else {
                record.cited_evidence.join(", ")
            };
            format!(
                "- **{}**: score={}, effective={:.2}{note}\n  - Argument: {}\n  - Citations: {citations}",
                record.judge, record.score, record.effective_score, record.argument
            )
        })
        .collect();
    block.push_str(&lines.join("\n"));
    block
}

/// Write the rendered report, creating parent directories
///
/// # Errors
/// [`AuditError::ReportWrite`] if a directory or the file cannot be written.
pub async fn write_report(path: &Path, markdown: &str) -> Result<()> {
    let failed = |source: std::io::Error| AuditError::ReportWrite {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(failed)?;
    }
    tokio::fs::write(path, markdown).await.map_err(failed)?;
    tracing::info!(path = %path.display(), bytes = markdown.len(), "audit report written");
    Ok(())
}
