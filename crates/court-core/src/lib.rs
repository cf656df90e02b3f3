//! Forensic audit courtroom
//!
//! Audits a software repository and its accompanying report against a
//! rubric. Detectives gather evidence concurrently, three judges score
//! every criterion, and a deterministic engine settles the verdicts
//! before a model writes the narrative around them.
//!
//! # Stages
//!
//! - [`InvestigateStage`]: clone, structural scan, commit history
//! - [`DocumentStage`] / [`VisionStage`]: report requirements and diagrams
//! - [`AggregateStage`]: fan-in, names evidence gaps
//! - [`JudgeStage`]: Prosecutor, Defense and TechLead personas
//! - [`SynthesizeStage`]: scoring, narrative, Markdown report
//!
//! # Example
//!
//! ```rust,ignore
//! use court_core::{AuditConfig, AuditRequest, AuditRuntime, Auditor};
//!
//! let config = AuditConfig::load(None)?;
//! let rubric = Rubric::load(&config.rubric_path)?;
//! let auditor = Auditor::new(AuditRuntime::new(config, rubric, model));
//!
//! let outcome = auditor.run(AuditRequest::new("https://github.com/acme/agent.git")).await?;
//! println!("{}", outcome.report.overall_grade);
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod aggregator;
pub mod auditor;
pub mod config;
pub mod detectives;
pub mod error;
pub mod judges;
pub mod report;
pub mod runtime;
pub mod scoring;
pub mod synthesis;

pub use aggregator::AggregateStage;
pub use auditor::{AuditOutcome, AuditRequest, Auditor};
pub use config::{AuditConfig, EvidenceLimits, ModelConfig, PacingConfig, SynthesisConfig};
pub use detectives::{DocumentStage, InvestigateStage, VisionStage};
pub use error::{AuditError, Result};
pub use judges::{JudgeStage, JUDGE_FAILURE_CRITERION};
pub use report::{render, write_report};
pub use runtime::AuditRuntime;
pub use scoring::{score_all, JudgeWeights, Scorecard, ScoringPolicy};
pub use synthesis::{Narrative, NarrativeSynthesizer, SynthesizeStage};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude for common imports
pub mod prelude {
    pub use crate::{AuditConfig, AuditError, AuditOutcome, AuditRequest, AuditRuntime, Auditor};
}
