//! Deterministic scoring engine
//!
//! Turns judge opinions into one [`CriterionResult`] per configured
//! criterion. Nothing here calls out or reads the clock, so identical
//! inputs always produce identical verdicts.
//!
//! Per criterion:
//!
//! 1. opinions with a matching `criterion_id` become [`JudgeRecord`]s; a
//!    record without a resolvable citation is discounted by one point
//!    (never below 1)
//! 2. weighted criteria use the role weights renormalized over the judges
//!    present, standard criteria take the plain mean
//! 3. a Prosecutor record mentioning a security keyword caps the score
//! 4. the result is clamped to `[1, 5]` and rounded half away from zero
//! 5. an effective-score spread above the dissent threshold marks the
//!    verdict as contested

use court_catalog::{has_valid_citation, EvidenceCatalog};
use court_types::{
    Criterion, CriterionResult, Grade, Judge, JudgeRecord, JudicialOpinion, Score, WeightClass,
    WEIGHTED_CRITERIA,
};
use serde::{Deserialize, Serialize};

/// Role weights for weighted criteria
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JudgeWeights {
    /// Prosecutor weight
    pub prosecutor: f64,
    /// Defense weight
    pub defense: f64,
    /// TechLead weight
    pub tech_lead: f64,
}

impl Default for JudgeWeights {
    fn default() -> Self {
        Self {
            prosecutor: Judge::Prosecutor.weight(),
            defense: Judge::Defense.weight(),
            tech_lead: Judge::TechLead.weight(),
        }
    }
}

impl JudgeWeights {
    /// Weight of one role
    #[must_use]
    pub fn for_judge(&self, judge: Judge) -> f64 {
        match judge {
            Judge::Prosecutor => self.prosecutor,
            Judge::Defense => self.defense,
            Judge::TechLead => self.tech_lead,
        }
    }
}

/// Tunable scoring constants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringPolicy {
    /// Criterion ids aggregated with role weights unless the rubric says otherwise
    pub weighted_criteria: Vec<String>,
    /// Role weights
    pub weights: JudgeWeights,
    /// Keywords in the Prosecutor record that trigger the cap (case-insensitive)
    pub security_keywords: Vec<String>,
    /// Highest score allowed once the cap triggers
    pub security_cap: f64,
    /// Effective-score spread above which the verdict is contested
    pub dissent_threshold: f64,
}

impl Default for ScoringPolicy {
    fn default() -> Self {
        Self {
            weighted_criteria: WEIGHTED_CRITERIA.iter().map(|id| (*id).to_string()).collect(),
            weights: JudgeWeights::default(),
            security_keywords: ["security", "os.system", "shell=true", "vulnerability"]
                .iter()
                .map(|kw| (*kw).to_string())
                .collect(),
            security_cap: 3.0,
            dissent_threshold: 2.0,
        }
    }
}

impl ScoringPolicy {
    /// Aggregation class of a criterion: rubric declaration first, then the weighted set
    #[must_use]
    pub fn class_for(&self, criterion: &Criterion) -> WeightClass {
        criterion.declared_weight_class().unwrap_or_else(|| {
            if self.weighted_criteria.iter().any(|id| id == &criterion.id) {
                WeightClass::Weighted
            } else {
                WeightClass::Standard
            }
        })
    }
}

/// All criterion verdicts plus the overall result
#[derive(Debug, Clone, PartialEq)]
pub struct Scorecard {
    /// One result per configured criterion, in configured order
    pub criteria: Vec<CriterionResult>,
    /// Mean of final scores (1.0 when there are no criteria)
    pub overall_score: f64,
    /// Band for `overall_score`
    pub overall_grade: Grade,
}

/// Validate one opinion's citations and compute its effective score
#[must_use]
pub fn judge_record(opinion: &JudicialOpinion, catalog: &EvidenceCatalog) -> JudgeRecord {
    let valid = has_valid_citation(&opinion.cited_evidence, catalog);
    let raw = opinion.score.as_f64();
    JudgeRecord {
        judge: opinion.judge,
        score: opinion.score,
        argument: opinion.argument.clone(),
        cited_evidence: opinion.cited_evidence.clone(),
        effective_score: if valid { raw } else { (raw - 1.0).max(1.0) },
        discounted: !valid,
    }
}

/// Aggregate effective scores before the security cap
///
/// Returns 1.0 for an empty record set.
#[must_use]
pub fn base_score(class: WeightClass, records: &[JudgeRecord], policy: &ScoringPolicy) -> f64 {
    if records.is_empty() {
        return 1.0;
    }
    match class {
        WeightClass::Weighted => {
            let (numerator, denominator) = records.iter().fold((0.0, 0.0), |(num, den), record| {
                let weight = policy.weights.for_judge(record.judge);
                (num + record.effective_score * weight, den + weight)
            });
            if denominator > 0.0 {
                numerator / denominator
            } else {
                1.0
            }
        }
        WeightClass::Standard => {
            let total: f64 = records.iter().map(|r| r.effective_score).sum();
            total / records.len() as f64
        }
    }
}

/// Whether the Prosecutor record raises a security concern
#[must_use]
pub fn security_flagged(records: &[JudgeRecord], policy: &ScoringPolicy) -> bool {
    records
        .iter()
        .filter(|record| record.judge == Judge::Prosecutor)
        .any(|record| {
            let blob = std::iter::once(record.argument.as_str())
                .chain(record.cited_evidence.iter().map(String::as_str))
                .collect::<Vec<_>>()
                .join(" ")
                .to_lowercase();
            policy
                .security_keywords
                .iter()
                .any(|keyword| blob.contains(&keyword.to_lowercase()))
        })
}

/// Clamp to the score range and round half away from zero
#[must_use]
pub fn finalize(score: f64) -> u8 {
    let low = Score::MIN.as_f64();
    let high = Score::MAX.as_f64();
    let clamped = if score.is_nan() { low } else { score.clamp(low, high) };
    // clamped to [1, 5], so the cast is exact
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let rounded = clamped.round() as u8;
    rounded
}

/// Dissent summary when the effective-score spread exceeds the threshold
#[must_use]
pub fn dissent(records: &[JudgeRecord], policy: &ScoringPolicy) -> Option<String> {
    if records.len() < 2 {
        return None;
    }
    let high = records.iter().map(|r| r.effective_score).fold(f64::MIN, f64::max);
    let low = records.iter().map(|r| r.effective_score).fold(f64::MAX, f64::min);
    let spread = high - low;
    if spread <= policy.dissent_threshold {
        return None;
    }

    let scores = records
        .iter()
        .map(|r| format!("{}: {:.2}", r.judge, r.effective_score))
        .collect::<Vec<_>>()
        .join(", ");
    Some(format!(
        "Contested verdict: effective scores diverged by {spread:.2} points, \
         with TechLead acting as the technical tie-breaker. Scores -> {scores}."
    ))
}

/// Verdict for one criterion
///
/// Only the first opinion per judge counts; records are kept in judge
/// order.
#[must_use]
pub fn score_criterion(
    criterion: &Criterion,
    opinions: &[JudicialOpinion],
    catalog: &EvidenceCatalog,
    policy: &ScoringPolicy,
) -> CriterionResult {
    let mut records: Vec<JudgeRecord> = Vec::new();
    for opinion in opinions.iter().filter(|o| o.criterion_id == criterion.id) {
        if records.iter().any(|r| r.judge == opinion.judge) {
            tracing::warn!(criterion = %criterion.id, judge = %opinion.judge, "duplicate opinion ignored");
            continue;
        }
        records.push(judge_record(opinion, catalog));
    }

    if records.is_empty() {
        return CriterionResult::placeholder(&criterion.id, &criterion.name);
    }
    records.sort_by_key(|r| r.judge);

    let mut score = base_score(policy.class_for(criterion), &records, policy);
    if security_flagged(&records, policy) {
        score = score.min(policy.security_cap);
    }
    let dissent_summary = dissent(&records, policy);

    CriterionResult {
        criterion_id: criterion.id.clone(),
        criterion_name: criterion.name.clone(),
        final_score: finalize(score),
        contested: dissent_summary.is_some(),
        dissent_summary,
        judge_records: records,
    }
}

/// Mean of final scores and its grade band
#[must_use]
pub fn overall(results: &[CriterionResult]) -> (f64, Grade) {
    let score = if results.is_empty() {
        1.0
    } else {
        let total: f64 = results.iter().map(|r| f64::from(r.final_score)).sum();
        total / results.len() as f64
    };
    (score, Grade::for_score(score))
}

/// Score every criterion
#[must_use]
pub fn score_all(
    criteria: &[Criterion],
    opinions: &[JudicialOpinion],
    catalog: &EvidenceCatalog,
    policy: &ScoringPolicy,
) -> Scorecard {
    let results: Vec<CriterionResult> = criteria
        .iter()
        .map(|criterion| score_criterion(criterion, opinions, catalog, policy))
        .collect();
    let (overall_score, overall_grade) = overall(&results);
    Scorecard {
        criteria: results,
        overall_score,
        overall_grade,
    }
}
