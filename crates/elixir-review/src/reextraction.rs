// crates/elixir-review/src/reextraction.rs
// ============================================================================
// Module: Re-extraction
// Description: Archives the active batch, clears checkpoints, and re-enqueues
//              the pipeline; once the replacement batch exists, inherits
//              reviews by fuzzy text match and exposes a batch-compare diff
//              (spec.md §4.8).
// Dependencies: elixir_core, rapidfuzz
// ============================================================================

use std::sync::Arc;

use elixir_core::AuditDetails;
use elixir_core::AuditEventType;
use elixir_core::AuditLog;
use elixir_core::AuditLogRepository;
use elixir_core::CheckpointStore;
use elixir_core::Criterion;
use elixir_core::CriterionId;
use elixir_core::CriterionRepository;
use elixir_core::CriterionType;
use elixir_core::CriteriaBatchId;
use elixir_core::CriteriaBatchRepository;
use elixir_core::OutboxError;
use elixir_core::OutboxEvent;
use elixir_core::OutboxEventType;
use elixir_core::OutboxStore;
use elixir_core::ProtocolId;
use elixir_core::ProtocolRepository;
use elixir_core::ProtocolStatus;
use elixir_core::ReviewRepository;
use serde_json::json;

/// Minimum `token_set_ratio` score for a new criterion to inherit review
/// state from an archived match (spec.md §4.8).
const INHERIT_THRESHOLD: f64 = 90.0;
/// `compare_batches` threshold above which a matched pair is `Unchanged`.
const UNCHANGED_THRESHOLD: f64 = 90.0;
/// `compare_batches` threshold above which a matched pair is `Changed`
/// rather than `Removed`.
const CHANGED_THRESHOLD: f64 = 70.0;

/// Failure during a re-extraction operation.
#[derive(Debug, thiserror::Error)]
pub enum ReextractionError {
    /// A repository call failed.
    #[error(transparent)]
    Repository(#[from] elixir_core::RepositoryError),
    /// The checkpoint store could not be cleared.
    #[error(transparent)]
    Checkpoint(#[from] elixir_core::CheckpointError),
    /// The outbox event could not be published.
    #[error(transparent)]
    Outbox(#[from] OutboxError),
}

/// Collaborators a re-extraction depends on.
pub struct ReextractionService {
    /// Protocol persistence.
    pub protocols: Arc<dyn ProtocolRepository>,
    /// Criteria batch persistence.
    pub batches: Arc<dyn CriteriaBatchRepository>,
    /// Criterion persistence.
    pub criteria: Arc<dyn CriterionRepository>,
    /// Review row persistence, for inheriting prior review history.
    pub reviews: Arc<dyn ReviewRepository>,
    /// Audit log persistence.
    pub audit_logs: Arc<dyn AuditLogRepository>,
    /// Pipeline checkpoint persistence, cleared before a fresh run.
    pub checkpoints: Arc<dyn CheckpointStore>,
    /// Durable outbox, used to re-enqueue the pipeline.
    pub outbox: Arc<dyn OutboxStore>,
}

impl ReextractionService {
    /// Archives every non-archived batch for the protocol, clears its
    /// checkpoints, resets it to `uploaded`, and publishes a
    /// `reextraction_requested` event so the pipeline re-runs from scratch
    /// (spec.md §4.8, §6).
    ///
    /// # Errors
    /// Returns [`ReextractionError`] if any persistence step fails.
    pub async fn trigger_reextraction(&self, protocol_id: ProtocolId, reason: impl Into<String>) -> Result<(), ReextractionError> {
        let reason = reason.into();

        self.batches.archive_all_for_protocol(protocol_id).await?;
        self.checkpoints.clear_for_protocol(protocol_id).await?;

        let mut protocol = self.protocols.get(protocol_id).await?;
        protocol.status = ProtocolStatus::Uploaded;
        protocol.error_reason = None;
        self.protocols.update(&protocol).await?;

        let event = OutboxEvent::new(OutboxEventType::ReextractionRequested, json!({"protocol_id": protocol_id, "reason": reason}));
        self.outbox.publish(&event).await?;
        Ok(())
    }

    /// Matches each criterion in `new_batch_id` to its best-scoring match in
    /// `archived_batch_id` of the same [`CriterionType`], and for matches
    /// scoring at or above [`INHERIT_THRESHOLD`], carries over the archived
    /// criterion's `review_status`, `conditions`, and review/audit history
    /// (spec.md §4.8).
    ///
    /// # Errors
    /// Returns [`ReextractionError`] if any persistence step fails.
    pub async fn inherit_reviews(&self, archived_batch_id: CriteriaBatchId, new_batch_id: CriteriaBatchId) -> Result<usize, ReextractionError> {
        let archived = self.criteria.list_for_batch(archived_batch_id).await?;
        let new_criteria = self.criteria.list_for_batch(new_batch_id).await?;

        let mut inherited_count = 0;
        for mut criterion in new_criteria {
            let Some((matched, score)) = best_match(&criterion, &archived) else {
                continue;
            };
            if score < INHERIT_THRESHOLD {
                continue;
            }

            criterion.review_status = matched.review_status;
            criterion.conditions = matched.conditions.clone();
            self.criteria.update(&criterion).await?;

            for review in self.reviews.list_for_target(&matched.id.to_string()).await? {
                let mut inherited = review.clone();
                inherited.id = elixir_core::ReviewId::new();
                inherited.target_id = criterion.id.to_string();
                self.reviews.insert(&inherited).await?;
            }

            let details = AuditDetails {
                schema_version: None,
                extra: std::collections::BTreeMap::from([("inherited_from".to_string(), json!(matched.id.to_string())), ("score".to_string(), json!(score))]),
            };
            let log = AuditLog::new(AuditEventType::ReviewInherited, None, elixir_core::ReviewTargetType::Criteria, criterion.id.to_string(), details);
            self.audit_logs.insert(&log).await?;
            inherited_count += 1;
        }

        Ok(inherited_count)
    }
}

/// Finds the archived criterion of the same [`CriterionType`] with the
/// highest `token_set_ratio` score against `criterion`'s text.
fn best_match<'a>(criterion: &Criterion, archived: &'a [Criterion]) -> Option<(&'a Criterion, f64)> {
    archived
        .iter()
        .filter(|candidate| candidate.criterion_type == criterion.criterion_type)
        .map(|candidate| (candidate, token_set_ratio(&criterion.text, &candidate.text)))
        .max_by(|(_, a), (_, b)| a.total_cmp(b))
}

/// Fuzzy text similarity in `[0, 100]`, used both for review inheritance and
/// batch comparison.
fn token_set_ratio(a: &str, b: &str) -> f64 {
    rapidfuzz::fuzz::token_set_ratio(a.chars(), b.chars())
}

// ============================================================================
// SECTION: Batch Compare
// ============================================================================

/// How a criterion changed between two batch versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffKind {
    /// Present in both batches with no meaningful text change.
    Unchanged,
    /// Present in both batches with a meaningfully changed text.
    Changed,
    /// Present in the old batch only.
    Removed,
    /// Present in the new batch only.
    Added,
}

/// One entry of a batch-to-batch comparison.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchDiffEntry {
    /// Matching criterion id in the old batch, if any.
    pub old_criterion_id: Option<CriterionId>,
    /// Matching criterion id in the new batch, if any.
    pub new_criterion_id: Option<CriterionId>,
    /// The classification of this entry.
    pub kind: DiffKind,
    /// The best match score found, when both sides are present.
    pub score: Option<f64>,
}

/// Computes a fuzzy diff between two batches' criteria (spec.md §4.8,
/// `GET /reviews/batch-compare`). Matching is independent per old criterion
/// (greedy, not mutually exclusive), which is sufficient for a
/// human-reviewed diff view rather than a canonical alignment.
#[must_use]
pub fn compare_batches(old: &[Criterion], new: &[Criterion]) -> Vec<BatchDiffEntry> {
    let mut entries = Vec::with_capacity(old.len() + new.len());
    let mut matched_new = std::collections::HashSet::new();

    for old_criterion in old {
        let best = new
            .iter()
            .filter(|candidate| candidate.criterion_type == old_criterion.criterion_type)
            .map(|candidate| (candidate, token_set_ratio(&old_criterion.text, &candidate.text)))
            .max_by(|(_, a), (_, b)| a.total_cmp(b));

        match best {
            Some((match_criterion, score)) if score >= CHANGED_THRESHOLD => {
                matched_new.insert(match_criterion.id);
                let kind = if score >= UNCHANGED_THRESHOLD { DiffKind::Unchanged } else { DiffKind::Changed };
                entries.push(BatchDiffEntry {
                    old_criterion_id: Some(old_criterion.id),
                    new_criterion_id: Some(match_criterion.id),
                    kind,
                    score: Some(score),
                });
            }
            _ => entries.push(BatchDiffEntry { old_criterion_id: Some(old_criterion.id), new_criterion_id: None, kind: DiffKind::Removed, score: None }),
        }
    }

    for new_criterion in new {
        if !matched_new.contains(&new_criterion.id) {
            entries.push(BatchDiffEntry { old_criterion_id: None, new_criterion_id: Some(new_criterion.id), kind: DiffKind::Added, score: None });
        }
    }

    entries
}

#[cfg(test)]
mod tests {
    use elixir_core::Assertion;

    use super::*;

    fn criterion(text: &str, criterion_type: CriterionType) -> Criterion {
        Criterion::new(CriteriaBatchId::new(), criterion_type, text, Assertion::Affirmed, None, 0.9, Some(1))
    }

    #[test]
    fn compare_batches_marks_identical_text_unchanged() {
        let old = vec![criterion("Age >= 18 years", CriterionType::Inclusion)];
        let new = vec![criterion("Age >= 18 years", CriterionType::Inclusion)];
        let entries = compare_batches(&old, &new);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].kind, DiffKind::Unchanged);
    }

    #[test]
    fn compare_batches_marks_unmatched_new_criterion_added() {
        let old = vec![criterion("Age >= 18 years", CriterionType::Inclusion)];
        let new = vec![criterion("Age >= 18 years", CriterionType::Inclusion), criterion("ECOG <= 2", CriterionType::Inclusion)];
        let entries = compare_batches(&old, &new);
        assert!(entries.iter().any(|entry| entry.kind == DiffKind::Added));
    }

    #[test]
    fn compare_batches_marks_unmatched_old_criterion_removed() {
        let old = vec![criterion("Age >= 18 years", CriterionType::Inclusion), criterion("No prior chemotherapy", CriterionType::Exclusion)];
        let new = vec![criterion("Age >= 18 years", CriterionType::Inclusion)];
        let entries = compare_batches(&old, &new);
        assert!(entries.iter().any(|entry| entry.kind == DiffKind::Removed));
    }

    #[test]
    fn best_match_ignores_criteria_of_a_different_type() {
        let criterion_a = criterion("Age >= 18 years", CriterionType::Inclusion);
        let archived = vec![criterion("Age >= 18 years", CriterionType::Exclusion)];
        assert!(best_match(&criterion_a, &archived).is_none());
    }
}
