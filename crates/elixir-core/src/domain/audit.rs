// crates/elixir-core/src/domain/audit.rs
// ============================================================================
// Module: AuditLog
// Description: Append-only system or reviewer event log.
// Purpose: Record every grounding decision and review action, tagged with a
//          schema_version so downstream consumers can tell which structured
//          edit shape produced a given entry.
// Dependencies: crate::identifiers, crate::time, crate::domain::review
// ============================================================================

//! ## Overview
//! `AuditLog` rows are append-only and carry `details.schema_version`
//! (spec.md §3), distinguishing three historical request shapes: free-text
//! edits (`text_v1`), single structured field edits (`structured_v1`), and
//! multi-mapping edits introduced in v1.5 (`v1.5-multi`). Every committed
//! [`crate::domain::review::Review`] has exactly one matching `AuditLog` row
//! written in the same transaction (spec.md §8 invariant 1).

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::domain::review::ReviewTargetType;
use crate::identifiers::AuditLogId;
use crate::identifiers::ReviewerId;
use crate::time::Timestamp;

// ============================================================================
// SECTION: Schema Version
// ============================================================================

/// The structured-edit schema version recorded on a review-originated audit
/// entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SchemaVersion {
    /// A free-text edit with no structured field mapping changes.
    #[serde(rename = "text_v1")]
    TextV1,
    /// A single structured field mapping edit.
    #[serde(rename = "structured_v1")]
    StructuredV1,
    /// A multi-mapping structured edit (v1.5+).
    #[serde(rename = "v1.5-multi")]
    V15Multi,
}

impl SchemaVersion {
    /// Derives the schema version from a review request, per spec.md
    /// §4.7 step 6: multi-mapping present → `v1.5-multi`; single structured
    /// field edit → `structured_v1`; text-only → `text_v1`.
    #[must_use]
    pub fn derive(field_mapping_count: usize, has_structured_edit: bool) -> Self {
        if field_mapping_count > 1 {
            Self::V15Multi
        } else if has_structured_edit {
            Self::StructuredV1
        } else {
            Self::TextV1
        }
    }
}

// ============================================================================
// SECTION: Event Type
// ============================================================================

/// The kind of event an audit entry records. Open-ended beyond the variants
/// the pipeline and review flow emit today.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    /// A grounding decision was made (successful or not) for one entity.
    EntityGrounded,
    /// A reviewer applied an approve/reject/modify action.
    ReviewApplied,
    /// A re-extraction was requested for a protocol.
    ReextractionRequested,
    /// Review inheritance was applied while building a new batch.
    ReviewInherited,
    /// Any other system event not covered above.
    Other(String),
}

// ============================================================================
// SECTION: AuditLog
// ============================================================================

/// Details payload attached to an [`AuditLog`] entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuditDetails {
    /// Schema version, present on review-originated entries.
    pub schema_version: Option<SchemaVersion>,
    /// Arbitrary additional structured detail (candidate lists, decisions).
    #[serde(flatten)]
    pub extra: std::collections::BTreeMap<String, JsonValue>,
}

/// One system or reviewer audit event. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditLog {
    /// Unique identifier.
    pub id: AuditLogId,
    /// The kind of event recorded.
    pub event_type: AuditEventType,
    /// The actor responsible, `None` for system events.
    pub actor_id: Option<ReviewerId>,
    /// What kind of row the event concerns.
    pub target_type: ReviewTargetType,
    /// Opaque string form of the target row's identifier.
    pub target_id: String,
    /// Structured detail payload.
    pub details: AuditDetails,
    /// Creation timestamp.
    pub created_at: Timestamp,
}

impl AuditLog {
    /// Creates a new audit entry.
    #[must_use]
    pub fn new(
        event_type: AuditEventType,
        actor_id: Option<ReviewerId>,
        target_type: ReviewTargetType,
        target_id: impl Into<String>,
        details: AuditDetails,
    ) -> Self {
        Self {
            id: AuditLogId::new(),
            event_type,
            actor_id,
            target_type,
            target_id: target_id.into(),
            details,
            created_at: Timestamp::now(),
        }
    }

    /// Returns whether this entry was written within `window` of
    /// `reference`, used by the integrity checker's `(target_type,
    /// target_id, created_at ± window)` join (spec.md §4.9).
    #[must_use]
    pub fn within_window(&self, reference: Timestamp, window: time::Duration) -> bool {
        let delta = if self.created_at >= reference {
            self.created_at.elapsed_since(reference)
        } else {
            reference.elapsed_since(self.created_at)
        };
        delta <= window
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_version_derives_v15_multi_for_multiple_mappings() {
        assert_eq!(SchemaVersion::derive(2, true), SchemaVersion::V15Multi);
    }

    #[test]
    fn schema_version_derives_structured_v1_for_single_structured_edit() {
        assert_eq!(SchemaVersion::derive(1, true), SchemaVersion::StructuredV1);
    }

    #[test]
    fn schema_version_derives_text_v1_for_plain_text_edit() {
        assert_eq!(SchemaVersion::derive(0, false), SchemaVersion::TextV1);
    }

    #[test]
    fn within_window_is_symmetric_around_reference() {
        let reference = Timestamp::now();
        let mut log = AuditLog::new(
            AuditEventType::ReviewApplied,
            Some(ReviewerId::new()),
            ReviewTargetType::Criteria,
            "abc",
            AuditDetails::default(),
        );
        log.created_at = reference.plus(time::Duration::milliseconds(500));
        assert!(log.within_window(reference, time::Duration::seconds(1)));
        log.created_at = reference.plus(time::Duration::seconds(5));
        assert!(!log.within_window(reference, time::Duration::seconds(1)));
    }
}
