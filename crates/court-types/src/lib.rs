//! Courtroom domain records
//!
//! Typed, validated records shared by every stage of an audit run.
//!
//! # Core Concepts
//!
//! - [`Evidence`]: One finding produced by a detective stage
//! - [`Criterion`]: One scored rubric dimension
//! - [`JudicialOpinion`]: One judge's score and argument for one criterion
//! - [`JudgeRecord`]: An opinion after citation validation
//! - [`CriterionResult`]: The final verdict for one criterion
//! - [`AuditReport`]: The terminal artifact of a run
//!
//! Range invariants (confidence in `[0, 1]`, scores in `[1, 5]`) are
//! enforced when a value is constructed, including when it is
//! deserialized from model output.
//!
//! # Example
//!
//! ```rust
//! use court_types::{Evidence, Judge, JudicialOpinion, Score};
//!
//! let evidence = Evidence::new("Analyze repository graph", true, "src/graph.py", 0.85)
//!     .unwrap()
//!     .with_rationale("StateGraph instantiation found");
//!
//! let opinion = JudicialOpinion::new(
//!     Judge::TechLead,
//!     "graph_orchestration",
//!     Score::new(4).unwrap(),
//!     "Fan-out is wired correctly",
//! )
//! .with_citations(["stategraph_detected: true"]);
//!
//! assert!(evidence.found);
//! assert_eq!(opinion.score.get(), 4);
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod criterion;
mod error;
mod evidence;
mod opinion;
mod verdict;

pub use criterion::{Criterion, WeightClass, WEIGHTED_CRITERIA};
pub use error::TypeError;
pub use evidence::{Confidence, Evidence, EvidenceKey};
pub use opinion::{Judge, JudicialOpinion, Score};
pub use verdict::{AuditReport, CriterionResult, Grade, JudgeRecord};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude for common imports
pub mod prelude {
    pub use crate::{
        AuditReport, Confidence, Criterion, CriterionResult, Evidence, EvidenceKey, Grade, Judge,
        JudgeRecord, JudicialOpinion, Score, TypeError, WeightClass,
    };
}

#[cfg(test)]
mod integration_tests {
    use super::*;

    #[test]
    fn opinion_round_trips_through_model_shaped_json() {
        let raw = r#"{
            "judge": "Defense",
            "criterion_id": "state_management_rigor",
            "score": 5,
            "argument": "Reducers are explicit",
            "cited_evidence": ["classes_found: 4"]
        }"#;

        let opinion: JudicialOpinion = serde_json::from_str(raw).unwrap();
        assert_eq!(opinion.judge, Judge::Defense);
        assert_eq!(opinion.score.get(), 5);
        assert_eq!(opinion.cited_evidence, vec!["classes_found: 4".to_string()]);
    }

    #[test]
    fn invalid_ranges_are_rejected_during_deserialization() {
        let bad_score = r#"{"judge":"Prosecutor","criterion_id":"x","score":9,"argument":"","cited_evidence":[]}"#;
        assert!(serde_json::from_str::<JudicialOpinion>(bad_score).is_err());

        let bad_confidence = r#"{"goal":"g","found":true,"location":"l","rationale":"r","confidence":1.5}"#;
        assert!(serde_json::from_str::<Evidence>(bad_confidence).is_err());
    }
}
