//! Shared audit state and partial updates

use crate::append::AppendInOrder;
use crate::keyed_union::KeyedUnion;
use crate::last_writer::LastWriterWins;
use crate::registry::{fields, FieldStrategies};
use crate::strategy::{MergeError, MergeStrategy};
use court_types::{Criterion, Evidence, EvidenceKey, JudicialOpinion};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Evidence grouped by owning detective key
pub type EvidenceMap = BTreeMap<EvidenceKey, Vec<Evidence>>;

/// The record threaded through every stage of a run
///
/// Stages only ever see an immutable snapshot; changes flow back as
/// [`StateUpdate`]s folded in with [`AuditState::merge`] or
/// [`AuditState::merge_barrier`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuditState {
    repo_url: String,
    repo_path: Option<PathBuf>,
    pdf_path: Option<PathBuf>,
    criteria: Option<Vec<Criterion>>,
    evidences: EvidenceMap,
    opinions: Vec<JudicialOpinion>,
    messages: Vec<String>,
}

impl AuditState {
    /// Create the initial state for a repository
    #[must_use]
    pub fn new(repo_url: impl Into<String>) -> Self {
        Self {
            repo_url: repo_url.into(),
            ..Self::default()
        }
    }

    /// Seed the requested report document path
    #[must_use]
    pub fn with_requested_pdf(mut self, path: impl Into<PathBuf>) -> Self {
        self.pdf_path = Some(path.into());
        self
    }

    /// Seed the rubric criteria snapshot
    #[must_use]
    pub fn with_criteria(mut self, criteria: Vec<Criterion>) -> Self {
        self.criteria = Some(criteria);
        self
    }

    /// Repository URL (or local path) under audit
    #[inline]
    #[must_use]
    pub fn repo_url(&self) -> &str {
        &self.repo_url
    }

    /// Local repository root once investigated
    #[inline]
    #[must_use]
    pub fn repo_path(&self) -> Option<&Path> {
        self.repo_path.as_deref()
    }

    /// Report document path (requested before investigation, resolved after)
    #[inline]
    #[must_use]
    pub fn pdf_path(&self) -> Option<&Path> {
        self.pdf_path.as_deref()
    }

    /// Rubric criteria snapshot
    #[inline]
    #[must_use]
    pub fn criteria(&self) -> &[Criterion] {
        self.criteria.as_deref().unwrap_or(&[])
    }

    /// Evidence grouped by detective key
    #[inline]
    #[must_use]
    pub fn evidences(&self) -> &EvidenceMap {
        &self.evidences
    }

    /// Evidence recorded under one key
    #[must_use]
    pub fn evidence_for(&self, key: &str) -> Option<&[Evidence]> {
        self.evidences
            .iter()
            .find(|(k, _)| k.as_str() == key)
            .map(|(_, records)| records.as_slice())
    }

    /// Judicial opinions in arrival order
    #[inline]
    #[must_use]
    pub fn opinions(&self) -> &[JudicialOpinion] {
        &self.opinions
    }

    /// Trace messages in arrival order
    #[inline]
    #[must_use]
    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    /// Merge one update, returning the new state
    ///
    /// Atomic: on error `self` is unchanged and no part of the update applies.
    ///
    /// # Errors
    /// Returns [`MergeError::KeyCollision`] if the update writes an evidence
    /// key that is already present.
    pub fn merge(&self, update: StateUpdate) -> Result<Self, MergeError> {
        let mut next = self.clone();
        next.apply(update)?;
        Ok(next)
    }

    /// Merge every update produced at one barrier, in producer order
    ///
    /// Never fails. A scalar field written by more than one producer keeps
    /// the first value; an evidence update that collides is rejected. Each
    /// rejection is recorded as a trace message, and the rest of the
    /// offending update still applies.
    #[must_use]
    pub fn merge_barrier<I, S>(mut self, updates: I) -> BarrierOutcome
    where
        I: IntoIterator<Item = (S, StateUpdate)>,
        S: Into<String>,
    {
        let mut writers: BTreeMap<&'static str, String> = BTreeMap::new();
        let mut rejections = Vec::new();

        for (producer, mut update) in updates {
            let producer = producer.into();

            for field in update.written_scalars() {
                match writers.get(field) {
                    Some(first) => {
                        update.clear_scalar(field);
                        rejections.push(MergeRejection {
                            producer: producer.clone(),
                            error: MergeError::ScalarConflict {
                                field,
                                first: first.clone(),
                                second: producer.clone(),
                            },
                        });
                    }
                    None => {
                        writers.insert(field, producer.clone());
                    }
                }
            }

            let evidences = std::mem::take(&mut update.evidences);
            if let Err(error) = merge_declared(&KeyedUnion, fields::EVIDENCES, &mut self.evidences, evidences) {
                rejections.push(MergeRejection {
                    producer: producer.clone(),
                    error,
                });
            }

            // remaining fields use infallible strategies
            if let Err(error) = self.apply(update) {
                rejections.push(MergeRejection { producer, error });
            }
        }

        for rejection in &rejections {
            tracing::warn!(producer = %rejection.producer, error = %rejection.error, "state update rejected");
            self.messages
                .push(format!("State: rejected update from {}: {}", rejection.producer, rejection.error));
        }

        BarrierOutcome {
            state: self,
            rejections,
        }
    }

    fn apply(&mut self, update: StateUpdate) -> Result<(), MergeError> {
        merge_declared(&KeyedUnion, fields::EVIDENCES, &mut self.evidences, update.evidences)?;
        merge_declared(&AppendInOrder, fields::OPINIONS, &mut self.opinions, update.opinions)?;
        merge_declared(&AppendInOrder, fields::MESSAGES, &mut self.messages, update.messages)?;
        merge_declared(&LastWriterWins, fields::REPO_PATH, &mut self.repo_path, update.repo_path)?;
        merge_declared(&LastWriterWins, fields::PDF_PATH, &mut self.pdf_path, update.pdf_path)?;
        merge_declared(&LastWriterWins, fields::CRITERIA, &mut self.criteria, update.criteria)?;
        Ok(())
    }
}

/// Partial state produced by one stage
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateUpdate {
    /// New local repository root
    pub repo_path: Option<PathBuf>,
    /// New resolved document path
    pub pdf_path: Option<PathBuf>,
    /// New criteria snapshot
    pub criteria: Option<Vec<Criterion>>,
    /// Evidence under keys owned by the producer
    pub evidences: EvidenceMap,
    /// Opinions to append
    pub opinions: Vec<JudicialOpinion>,
    /// Trace messages to append
    pub messages: Vec<String>,
}

impl StateUpdate {
    /// Create empty update
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Update carrying a single trace message
    #[must_use]
    pub fn message(text: impl Into<String>) -> Self {
        Self::new().with_message(text)
    }

    /// Append a trace message
    #[must_use]
    pub fn with_message(mut self, text: impl Into<String>) -> Self {
        self.messages.push(text.into());
        self
    }

    /// Set evidence under a key (replacing any earlier value in this update)
    #[must_use]
    pub fn with_evidence(mut self, key: impl Into<EvidenceKey>, records: Vec<Evidence>) -> Self {
        self.evidences.insert(key.into(), records);
        self
    }

    /// Append opinions
    #[must_use]
    pub fn with_opinions(mut self, opinions: impl IntoIterator<Item = JudicialOpinion>) -> Self {
        self.opinions.extend(opinions);
        self
    }

    /// Set the repository root
    #[must_use]
    pub fn with_repo_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.repo_path = Some(path.into());
        self
    }

    /// Set the resolved document path
    #[must_use]
    pub fn with_pdf_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.pdf_path = Some(path.into());
        self
    }

    /// Set the criteria snapshot
    #[must_use]
    pub fn with_criteria(mut self, criteria: Vec<Criterion>) -> Self {
        self.criteria = Some(criteria);
        self
    }

    /// Combine two updates with the same per-field strategies
    ///
    /// `self.merge(a.combine(b)?)` equals `self.merge(a)?.merge(b)`.
    ///
    /// # Errors
    /// Returns [`MergeError::KeyCollision`] if both write the same evidence key.
    pub fn combine(mut self, other: Self) -> Result<Self, MergeError> {
        merge_declared(&KeyedUnion, fields::EVIDENCES, &mut self.evidences, other.evidences)?;
        merge_declared(&AppendInOrder, fields::OPINIONS, &mut self.opinions, other.opinions)?;
        merge_declared(&AppendInOrder, fields::MESSAGES, &mut self.messages, other.messages)?;
        merge_declared(&LastWriterWins, fields::REPO_PATH, &mut self.repo_path, other.repo_path)?;
        merge_declared(&LastWriterWins, fields::PDF_PATH, &mut self.pdf_path, other.pdf_path)?;
        merge_declared(&LastWriterWins, fields::CRITERIA, &mut self.criteria, other.criteria)?;
        Ok(self)
    }

    /// Scalar fields this update writes
    #[must_use]
    pub fn written_scalars(&self) -> Vec<&'static str> {
        let mut written = Vec::new();
        if self.repo_path.is_some() {
            written.push(fields::REPO_PATH);
        }
        if self.pdf_path.is_some() {
            written.push(fields::PDF_PATH);
        }
        if self.criteria.is_some() {
            written.push(fields::CRITERIA);
        }
        written
    }

    /// Whether the update carries nothing
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    fn clear_scalar(&mut self, field: &str) {
        match field {
            fields::REPO_PATH => self.repo_path = None,
            fields::PDF_PATH => self.pdf_path = None,
            fields::CRITERIA => self.criteria = None,
            _ => {}
        }
    }
}

/// A part of an update refused at a barrier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeRejection {
    /// Producer (stage name) of the update
    pub producer: String,
    /// Why it was refused
    pub error: MergeError,
}

/// Result of merging one barrier
#[derive(Debug, Clone)]
pub struct BarrierOutcome {
    /// State after the barrier
    pub state: AuditState,
    /// Refused parts of updates, already mirrored into `messages`
    pub rejections: Vec<MergeRejection>,
}

/// Merge one field, checking the strategy against [`FieldStrategies`]
fn merge_declared<S, V>(strategy: &S, field: &'static str, current: &mut V, incoming: V) -> Result<(), MergeError>
where
    S: MergeStrategy<V>,
{
    debug_assert_eq!(
        FieldStrategies::lookup(field),
        Some(strategy.kind()),
        "{field} merged with an undeclared strategy"
    );
    strategy.merge(field, current, incoming)
}

#[cfg(test)]
mod tests {
    use super::*;
    use court_types::{Judge, Score};
    use pretty_assertions::assert_eq;

    fn evidence(goal: &str) -> Evidence {
        Evidence::new(goal, true, "loc", 0.5).unwrap()
    }

    fn opinion(judge: Judge) -> JudicialOpinion {
        JudicialOpinion::new(judge, "c1", Score::new(3).unwrap(), "arg")
    }

    #[test]
    fn merge_returns_new_state_and_keeps_original() {
        let initial = AuditState::new("https://example.com/repo.git");
        let next = initial
            .merge(
                StateUpdate::message("investigated")
                    .with_repo_path("/tmp/repo")
                    .with_evidence("repo_analysis", vec![evidence("g")]),
            )
            .unwrap();

        assert!(initial.repo_path().is_none());
        assert_eq!(next.repo_path(), Some(Path::new("/tmp/repo")));
        assert_eq!(next.messages(), ["investigated".to_string()]);
        assert!(next.evidence_for("repo_analysis").is_some());
    }

    #[test]
    fn colliding_evidence_key_is_atomic_error() {
        let state = AuditState::new("r")
            .merge(StateUpdate::new().with_evidence("doc_analysis", vec![evidence("a")]))
            .unwrap();

        let result = state.merge(
            StateUpdate::message("late")
                .with_evidence("doc_analysis", vec![evidence("b")]),
        );

        assert!(matches!(result, Err(MergeError::KeyCollision { .. })));
        assert!(state.messages().is_empty());
    }

    #[test]
    fn barrier_keeps_first_scalar_writer() {
        let outcome = AuditState::new("r").merge_barrier([
            ("investigate", StateUpdate::new().with_repo_path("/first")),
            ("rogue", StateUpdate::message("hi").with_repo_path("/second")),
        ]);

        assert_eq!(outcome.state.repo_path(), Some(Path::new("/first")));
        assert_eq!(outcome.rejections.len(), 1);
        assert_eq!(outcome.rejections[0].producer, "rogue");
        assert_eq!(outcome.state.messages()[0], "hi");
        assert!(outcome.state.messages()[1].starts_with("State: rejected update from rogue"));
    }

    #[test]
    fn barrier_rejects_evidence_collision_but_keeps_opinions() {
        let outcome = AuditState::new("r").merge_barrier([
            (
                "analyze_document",
                StateUpdate::new().with_evidence("doc_analysis", vec![evidence("a")]),
            ),
            (
                "imposter",
                StateUpdate::new()
                    .with_evidence("doc_analysis", vec![evidence("b")])
                    .with_opinions([opinion(Judge::Defense)]),
            ),
        ]);

        let docs = outcome.state.evidence_for("doc_analysis").unwrap();
        assert_eq!(docs[0].goal, "a");
        assert_eq!(outcome.state.opinions().len(), 1);
        assert_eq!(outcome.rejections.len(), 1);
    }

    #[test]
    fn opinions_preserve_producer_order() {
        let outcome = AuditState::new("r").merge_barrier([
            (
                "judge_prosecutor",
                StateUpdate::new().with_opinions([opinion(Judge::Prosecutor), opinion(Judge::Prosecutor)]),
            ),
            ("judge_defense", StateUpdate::new().with_opinions([opinion(Judge::Defense)])),
        ]);

        let judges: Vec<Judge> = outcome.state.opinions().iter().map(|o| o.judge).collect();
        assert_eq!(judges, vec![Judge::Prosecutor, Judge::Prosecutor, Judge::Defense]);
        assert!(outcome.rejections.is_empty());
    }

    #[test]
    fn combine_matches_sequential_merge() {
        let a = StateUpdate::message("a").with_evidence("k1", vec![evidence("1")]);
        let b = StateUpdate::message("b").with_evidence("k2", vec![evidence("2")]);
        let base = AuditState::new("r");

        let sequential = base.merge(a.clone()).unwrap().merge(b.clone()).unwrap();
        let combined = base.merge(a.combine(b).unwrap()).unwrap();
        assert_eq!(sequential, combined);
    }

    #[test]
    fn applied_strategies_match_declared_table() {
        let applied = [
            (fields::EVIDENCES, MergeStrategy::<EvidenceMap>::kind(&KeyedUnion)),
            (fields::OPINIONS, MergeStrategy::<Vec<JudicialOpinion>>::kind(&AppendInOrder)),
            (fields::MESSAGES, MergeStrategy::<Vec<String>>::kind(&AppendInOrder)),
            (fields::REPO_PATH, MergeStrategy::<Option<PathBuf>>::kind(&LastWriterWins)),
            (fields::PDF_PATH, MergeStrategy::<Option<PathBuf>>::kind(&LastWriterWins)),
            (fields::CRITERIA, MergeStrategy::<Option<Vec<Criterion>>>::kind(&LastWriterWins)),
        ];
        assert_eq!(applied.len(), FieldStrategies::len());
        for (field, kind) in applied {
            assert_eq!(FieldStrategies::lookup(field), Some(kind), "{field}");
        }
    }

    #[test]
    fn empty_update_is_empty() {
        assert!(StateUpdate::new().is_empty());
        assert!(!StateUpdate::message("x").is_empty());
    }
}
