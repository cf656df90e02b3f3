use anyhow::{Context, Result};
use clap::{value_parser, Arg, ArgAction, Command};
use court_collaborators::Rubric;
use court_core::{AuditConfig, AuditRequest, AuditRuntime, Auditor};
use court_llm::OpenAiCompatibleModel;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn cli() -> Command {
    Command::new("courtroom")
        .version(court_core::VERSION)
        .about("Forensic audit courtroom for agentic repositories")
        .arg(
            Arg::new("repo-url")
                .long("repo-url")
                .required(true)
                .help("Repository URL or local directory to audit"),
        )
        .arg(
            Arg::new("pdf-path")
                .long("pdf-path")
                .value_parser(value_parser!(PathBuf))
                .help("Report document, absolute or relative to the repository root"),
        )
        .arg(
            Arg::new("rubric")
                .long("rubric")
                .value_parser(value_parser!(PathBuf))
                .help("Rubric file (JSON or YAML)"),
        )
        .arg(
            Arg::new("output")
                .long("output")
                .short('o')
                .value_parser(value_parser!(PathBuf))
                .help("Markdown report destination"),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .env("COURTROOM_CONFIG")
                .value_parser(value_parser!(PathBuf))
                .help("TOML run configuration"),
        )
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON"),
        )
}

fn init_logging(json: bool) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli().get_matches();
    init_logging(matches.get_flag("log-json"));

    let mut config = AuditConfig::load(matches.get_one::<PathBuf>("config").map(PathBuf::as_path))
        .context("failed to load run configuration")?;
    if let Some(rubric) = matches.get_one::<PathBuf>("rubric") {
        config.rubric_path = rubric.clone();
    }
    if let Some(output) = matches.get_one::<PathBuf>("output") {
        config.report_path = output.clone();
    }
    config.validate().context("invalid run configuration")?;

    let rubric = Rubric::load(&config.rubric_path)
        .with_context(|| format!("failed to load rubric {}", config.rubric_path.display()))?;

    let api_key = config.api_key();
    if api_key.is_none() {
        tracing::warn!(
            variable = %config.model.api_key_env,
            "no API key set; model calls will fail and the report will degrade"
        );
    }
    let model = OpenAiCompatibleModel::new(&config.model.endpoint, api_key, config.model.timeout)
        .context("failed to build model client")?;

    let mut request = AuditRequest::new(
        matches
            .get_one::<String>("repo-url")
            .context("--repo-url is required")?
            .clone(),
    );
    if let Some(pdf) = matches.get_one::<PathBuf>("pdf-path") {
        request = request.with_pdf_path(pdf.clone());
    }

    let auditor = Auditor::new(AuditRuntime::new(config, rubric, Arc::new(model)));
    let outcome = auditor.run(request).await.context("audit failed")?;

    let recovered = outcome.recovered_stages();
    if !recovered.is_empty() {
        tracing::warn!(stages = ?recovered, "some stages degraded");
    }
    println!("Overall Grade: {}", outcome.report.overall_grade.label());
    println!("Total Score: {:.2} / 5.00", outcome.report.overall_score);
    println!("Report: {}", outcome.report_path.display());
    Ok(())
}
