// crates/elixir-core/src/domain/batch.rs
// ============================================================================
// Module: CriteriaBatch
// Description: One extraction run for a protocol, and its auto-computed
//              review status.
// Purpose: Own a protocol's criteria for one pipeline run and track the
//          batch-level review state machine defined in spec.md §4.7.1.
// Dependencies: crate::identifiers, crate::time, crate::domain::criterion
// ============================================================================

//! ## Overview
//! A protocol may have several batches across its lifetime (re-extractions),
//! but only one non-archived batch is ever active for review at a time.
//! `review_status` is not set directly by callers; it is recomputed from the
//! child criteria's individual `review_status` values via
//! [`compute_batch_review_status`] every time a criterion is reviewed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::domain::criterion::CriterionReviewStatus;
use crate::identifiers::CriteriaBatchId;
use crate::identifiers::ProtocolId;
use crate::time::Timestamp;

// ============================================================================
// SECTION: Batch Review Status
// ============================================================================

/// Auto-computed review status of a [`CriteriaBatch`].
///
/// # Invariants
/// - Always equals [`compute_batch_review_status`] applied to the batch's
///   current children (spec.md §8 invariant 5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchReviewStatus {
    /// No criterion has been reviewed yet.
    PendingReview,
    /// At least one criterion reviewed, not all reviewed yet.
    InProgress,
    /// Every criterion reviewed and all approved.
    Approved,
    /// Every criterion reviewed and at least one rejected.
    Rejected,
    /// Every criterion reviewed with a mixed outcome (approvals plus
    /// modifications, or modifications only) and none rejected.
    Reviewed,
}

/// Recomputes [`BatchReviewStatus`] from the review status of every
/// non-archived criterion in the batch, implementing spec.md §4.7.1:
///
/// - `pending_review` → `in_progress` on first child review.
/// - `in_progress` → `approved` when every criterion is reviewed and all are
///   `approved`.
/// - `in_progress` → `rejected` when every criterion is reviewed and at
///   least one is `rejected`.
/// - `in_progress` → `reviewed` when every criterion is reviewed and the
///   outcome is mixed.
#[must_use]
pub fn compute_batch_review_status(criteria: &[CriterionReviewStatus]) -> BatchReviewStatus {
    if criteria.is_empty() {
        return BatchReviewStatus::PendingReview;
    }

    let reviewed_count = criteria.iter().filter(|status| status.is_reviewed()).count();
    if reviewed_count == 0 {
        return BatchReviewStatus::PendingReview;
    }
    if reviewed_count < criteria.len() {
        return BatchReviewStatus::InProgress;
    }

    // Every criterion has been reviewed.
    let any_rejected = criteria.iter().any(|status| *status == CriterionReviewStatus::Rejected);
    if any_rejected {
        return BatchReviewStatus::Rejected;
    }
    let all_approved = criteria.iter().all(|status| *status == CriterionReviewStatus::Approved);
    if all_approved {
        return BatchReviewStatus::Approved;
    }
    BatchReviewStatus::Reviewed
}

// ============================================================================
// SECTION: CriteriaBatch
// ============================================================================

/// One extraction run for a protocol.
///
/// # Invariants
/// - `review_status` always equals [`compute_batch_review_status`] applied
///   to its non-archived criteria.
/// - Multiple non-archived batches for the same protocol coexist only
///   transiently during re-extraction (the prior batch is archived before
///   the new one is persisted, per §4.8).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriteriaBatch {
    /// Unique identifier.
    pub id: CriteriaBatchId,
    /// Owning protocol.
    pub protocol_id: ProtocolId,
    /// Creation timestamp.
    pub created_at: Timestamp,
    /// Whether this batch has been superseded by a re-extraction.
    pub is_archived: bool,
    /// Auto-computed review status.
    pub review_status: BatchReviewStatus,
    /// Name of the LLM that produced this batch's extraction.
    pub source_llm_name: String,
    /// Version string of the LLM that produced this batch's extraction.
    pub source_llm_version: String,
}

impl CriteriaBatch {
    /// Creates a new, non-archived batch in `pending_review` state.
    #[must_use]
    pub fn new(protocol_id: ProtocolId, source_llm_name: impl Into<String>, source_llm_version: impl Into<String>) -> Self {
        Self {
            id: CriteriaBatchId::new(),
            protocol_id,
            created_at: Timestamp::now(),
            is_archived: false,
            review_status: BatchReviewStatus::PendingReview,
            source_llm_name: source_llm_name.into(),
            source_llm_version: source_llm_version.into(),
        }
    }

    /// Recomputes and stores `review_status` from the given child criteria
    /// review statuses.
    pub fn recompute_review_status(&mut self, criteria: &[CriterionReviewStatus]) {
        self.review_status = compute_batch_review_status(criteria);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_batch_is_pending_review() {
        assert_eq!(compute_batch_review_status(&[]), BatchReviewStatus::PendingReview);
    }

    #[test]
    fn unreviewed_criteria_stay_pending_review() {
        let statuses = vec![CriterionReviewStatus::Unreviewed, CriterionReviewStatus::Unreviewed];
        assert_eq!(compute_batch_review_status(&statuses), BatchReviewStatus::PendingReview);
    }

    #[test]
    fn partial_review_is_in_progress() {
        let statuses = vec![CriterionReviewStatus::Approved, CriterionReviewStatus::Unreviewed];
        assert_eq!(compute_batch_review_status(&statuses), BatchReviewStatus::InProgress);
    }

    #[test]
    fn all_approved_is_approved() {
        let statuses = vec![CriterionReviewStatus::Approved, CriterionReviewStatus::Approved];
        assert_eq!(compute_batch_review_status(&statuses), BatchReviewStatus::Approved);
    }

    #[test]
    fn any_rejected_wins_over_approved_and_modified() {
        let statuses = vec![
            CriterionReviewStatus::Approved,
            CriterionReviewStatus::Rejected,
            CriterionReviewStatus::Modified,
        ];
        assert_eq!(compute_batch_review_status(&statuses), BatchReviewStatus::Rejected);
    }

    #[test]
    fn mixed_approved_and_modified_without_rejection_is_reviewed() {
        let statuses = vec![CriterionReviewStatus::Approved, CriterionReviewStatus::Modified];
        assert_eq!(compute_batch_review_status(&statuses), BatchReviewStatus::Reviewed);
    }

    #[test]
    fn modifications_only_is_reviewed_not_approved() {
        // Spec.md §8 invariant 14: batch becomes `reviewed`, not `approved`,
        // when any child is `modified` even if none are `rejected`.
        let statuses = vec![CriterionReviewStatus::Modified, CriterionReviewStatus::Modified];
        assert_eq!(compute_batch_review_status(&statuses), BatchReviewStatus::Reviewed);
    }
}
