// crates/elixir-core/src/domain/review.rs
// ============================================================================
// Module: Review
// Description: One immutable reviewer action against a criterion, entity, or
//              batch.
// Purpose: Capture the before/after snapshot pair a review action produces,
//          independent of the audit trail that accompanies it.
// Dependencies: crate::identifiers, crate::time
// ============================================================================

//! ## Overview
//! A [`Review`] row is immutable once written. Every committed review has
//! exactly one matching [`crate::domain::audit::AuditLog`] row written in
//! the same transaction (spec.md §8 invariant 1); that pairing is enforced
//! by the service layer in `elixir-review`, not by this type itself.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::identifiers::ReviewId;
use crate::identifiers::ReviewerId;
use crate::time::Timestamp;

// ============================================================================
// SECTION: Target / Action
// ============================================================================

/// The kind of row a review targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewTargetType {
    /// A `Criterion` row.
    Criteria,
    /// An `Entity` row.
    Entity,
    /// A `CriteriaBatch` row.
    Batch,
}

/// The action a reviewer took.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewAction {
    /// Accept the target as extracted.
    Approve,
    /// Reject the target.
    Reject,
    /// Edit the target's text or structured fields.
    Modify,
}

// ============================================================================
// SECTION: Review
// ============================================================================

/// One reviewer action, immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    /// Unique identifier.
    pub id: ReviewId,
    /// What kind of row was targeted.
    pub target_type: ReviewTargetType,
    /// Opaque string form of the target row's identifier (criterion, entity,
    /// or batch id), kept untyped here since one `Review` table spans three
    /// target kinds.
    pub target_id: String,
    /// The reviewer who performed the action.
    pub reviewer_id: ReviewerId,
    /// The action taken.
    pub action: ReviewAction,
    /// Snapshot of the target before the action was applied.
    pub before_value: JsonValue,
    /// Snapshot of the target after the action was applied.
    pub after_value: JsonValue,
    /// Optional reviewer comment.
    pub comment: Option<String>,
    /// Creation timestamp.
    pub created_at: Timestamp,
}

impl Review {
    /// Creates a new review row for the given target/action/snapshots.
    #[must_use]
    #[allow(clippy::too_many_arguments, reason = "mirrors the review-action request shape")]
    pub fn new(
        target_type: ReviewTargetType,
        target_id: impl Into<String>,
        reviewer_id: ReviewerId,
        action: ReviewAction,
        before_value: JsonValue,
        after_value: JsonValue,
        comment: Option<String>,
    ) -> Self {
        Self {
            id: ReviewId::new(),
            target_type,
            target_id: target_id.into(),
            reviewer_id,
            action,
            before_value,
            after_value,
            comment,
            created_at: Timestamp::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_review_stamps_created_at_and_preserves_snapshots() {
        let before = serde_json::json!({"review_status": "unreviewed"});
        let after = serde_json::json!({"review_status": "approved"});
        let review = Review::new(
            ReviewTargetType::Criteria,
            "11111111-1111-1111-1111-111111111111",
            ReviewerId::new(),
            ReviewAction::Approve,
            before.clone(),
            after.clone(),
            None,
        );
        assert_eq!(review.before_value, before);
        assert_eq!(review.after_value, after);
        assert_eq!(review.action, ReviewAction::Approve);
    }
}
