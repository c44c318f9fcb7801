// crates/elixir-core/src/domain/protocol.rs
// ============================================================================
// Module: Protocol
// Description: One uploaded clinical-trial protocol PDF and its pipeline
//              lifecycle status.
// Purpose: Model the top-level aggregate the pipeline advances through its
//          seven stages, plus lazy terminal-state archival.
// Dependencies: crate::identifiers, crate::time
// ============================================================================

//! ## Overview
//! A [`Protocol`] is created on upload and its [`ProtocolStatus`] advances
//! monotonically through the pipeline stages (§4.6), then non-monotonically
//! during human review (§4.7). Seven days after entering a terminal state it
//! is archived lazily — on the next read, not by a background sweep.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

use crate::identifiers::ProtocolId;
use crate::time::Timestamp;

// ============================================================================
// SECTION: Pipeline Node
// ============================================================================

/// One of the seven pipeline stage nodes.
///
/// # Invariants
/// - Ordering reflects the state machine's stage sequence; `ground` never
///   fails fatally (per-entity errors accumulate instead), but the variant
///   still exists so `NodeError` can name it if the ground node itself
///   raises (e.g. the entity-extraction LLM call fails entirely).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineNode {
    /// Fetches and parses the PDF.
    Ingest,
    /// Extracts raw inclusion/exclusion criteria via LLM.
    Extract,
    /// Deduplicates, splits enumerations, persists criteria.
    Parse,
    /// Dual-grounds entities against terminology and OMOP.
    Ground,
    /// Persists grounded entities and field mappings.
    Persist,
    /// Builds the expression tree and populates field mapping values.
    Structure,
    /// Resolves ordinal scale values.
    OrdinalResolve,
}

impl PipelineNode {
    /// Returns the canonical snake_case name used in `Protocol.status`
    /// (`"<node>_failed"`) and checkpoint keys.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ingest => "ingest",
            Self::Extract => "extract",
            Self::Parse => "parse",
            Self::Ground => "ground",
            Self::Persist => "persist",
            Self::Structure => "structure",
            Self::OrdinalResolve => "ordinal_resolve",
        }
    }

    /// Returns the node that follows this one, or `None` for the last node.
    #[must_use]
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::Ingest => Some(Self::Extract),
            Self::Extract => Some(Self::Parse),
            Self::Parse => Some(Self::Ground),
            Self::Ground => Some(Self::Persist),
            Self::Persist => Some(Self::Structure),
            Self::Structure => Some(Self::OrdinalResolve),
            Self::OrdinalResolve => None,
        }
    }

    /// All nodes in execution order.
    #[must_use]
    pub const fn all() -> [Self; 7] {
        [
            Self::Ingest,
            Self::Extract,
            Self::Parse,
            Self::Ground,
            Self::Persist,
            Self::Structure,
            Self::OrdinalResolve,
        ]
    }
}

impl fmt::Display for PipelineNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Protocol Status
// ============================================================================

/// Lifecycle status of a [`Protocol`].
///
/// # Invariants
/// - Advances monotonically through pipeline stages on the happy path.
/// - Any `*_failed` variant is reachable from the corresponding in-flight
///   stage and is terminal until a re-trigger resumes from checkpoint.
/// - `dead_letter` is terminal and requires operator intervention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProtocolStatus {
    /// Uploaded, outbox event published, not yet claimed.
    Uploaded,
    /// `ingest` node is running or has completed and `extract` is running.
    Extracting,
    /// `ground` node is running.
    Grounding,
    /// `structure` and `ordinal_resolve` are running.
    Structuring,
    /// Pipeline completed; awaiting human review.
    PendingReview,
    /// Every criterion has been reviewed.
    Reviewed,
    /// Every criterion was reviewed and approved.
    Approved,
    /// At least one criterion was rejected.
    Rejected,
    /// The `extract` node failed.
    ExtractionFailed,
    /// The `ground` node failed in full (zero entities grounded).
    GroundingFailed,
    /// A node other than `extract`/`ground` failed, or the run timed out.
    PipelineFailed,
    /// The triggering outbox event exhausted its retry budget.
    DeadLetter,
}

impl ProtocolStatus {
    /// Returns whether this status is terminal (no further automatic
    /// transition will occur without an explicit re-trigger or review
    /// action).
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Reviewed
                | Self::Approved
                | Self::Rejected
                | Self::ExtractionFailed
                | Self::GroundingFailed
                | Self::PipelineFailed
                | Self::DeadLetter
        )
    }

    /// Builds the `<node>_failed` status for a node failure, per §7.
    #[must_use]
    pub const fn failed_at(node: PipelineNode) -> Self {
        match node {
            PipelineNode::Extract => Self::ExtractionFailed,
            PipelineNode::Ground => Self::GroundingFailed,
            _ => Self::PipelineFailed,
        }
    }
}

// ============================================================================
// SECTION: Protocol Metadata
// ============================================================================

/// Free-form pipeline-computed metadata attached to a protocol.
///
/// # Invariants
/// - `quality_score`, when present, is in `[0, 1]`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProtocolMetadata {
    /// PDF quality score in `[0, 1]`, computed by the ingest node.
    pub quality_score: Option<f64>,
    /// Number of pages in the source PDF.
    pub page_count: Option<u32>,
    /// Technical error detail, set alongside `Protocol.error_reason` on
    /// failure (the human-readable counterpart lives on the protocol row).
    pub error: Option<String>,
}

// ============================================================================
// SECTION: Protocol
// ============================================================================

/// One uploaded clinical-trial protocol PDF.
///
/// # Invariants
/// - `status` advances monotonically through pipeline stages, then
///   non-monotonically during review (§4.7.1).
/// - `error_reason` is set if and only if `status` is a failure variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Protocol {
    /// Unique identifier.
    pub id: ProtocolId,
    /// Human-facing protocol title.
    pub title: String,
    /// Storage-adapter URI for the source PDF.
    pub file_uri: String,
    /// Current lifecycle status.
    pub status: ProtocolStatus,
    /// Human-readable failure reason, set only on a failure status.
    pub error_reason: Option<String>,
    /// Pipeline-computed metadata.
    pub metadata: ProtocolMetadata,
    /// Creation timestamp.
    pub created_at: Timestamp,
    /// Last mutation timestamp.
    pub updated_at: Timestamp,
    /// Whether this protocol has been lazily archived (seven days in a
    /// terminal state, per spec.md §3).
    pub is_archived: bool,
}

/// Number of days a protocol must remain in a terminal state before it is
/// eligible for lazy archival on read.
pub const ARCHIVAL_AFTER_DAYS: i64 = 7;

impl Protocol {
    /// Creates a newly uploaded protocol.
    #[must_use]
    pub fn new(title: impl Into<String>, file_uri: impl Into<String>) -> Self {
        let now = Timestamp::now();
        Self {
            id: ProtocolId::new(),
            title: title.into(),
            file_uri: file_uri.into(),
            status: ProtocolStatus::Uploaded,
            error_reason: None,
            metadata: ProtocolMetadata::default(),
            created_at: now,
            updated_at: now,
            is_archived: false,
        }
    }

    /// Applies a node failure to this protocol: sets `status` to
    /// `<node>_failed`, records `error_reason`, and stamps the technical
    /// detail into metadata.
    pub fn apply_node_failure(&mut self, node: PipelineNode, reason: impl Into<String>, technical_detail: Option<String>) {
        self.status = ProtocolStatus::failed_at(node);
        self.error_reason = Some(reason.into());
        self.metadata.error = technical_detail;
        self.updated_at = Timestamp::now();
    }

    /// Advances the protocol to a new non-failure status.
    pub fn advance(&mut self, status: ProtocolStatus) {
        self.status = status;
        if !matches!(
            status,
            ProtocolStatus::ExtractionFailed
                | ProtocolStatus::GroundingFailed
                | ProtocolStatus::PipelineFailed
                | ProtocolStatus::DeadLetter
        ) {
            self.error_reason = None;
        }
        self.updated_at = Timestamp::now();
    }

    /// Returns whether this protocol is eligible for lazy archival given the
    /// current time: terminal status and `updated_at` at least
    /// [`ARCHIVAL_AFTER_DAYS`] in the past.
    #[must_use]
    pub fn is_archival_eligible(&self, now: Timestamp) -> bool {
        if self.is_archived || !self.status.is_terminal() {
            return false;
        }
        now.elapsed_since(self.updated_at) >= time::Duration::days(ARCHIVAL_AFTER_DAYS)
    }

    /// Archives the protocol in place if eligible; returns whether it
    /// archived anything. Called lazily by read paths (e.g. `GET
    /// /protocols/{id}`), never by a background job, per spec.md §3.
    pub fn archive_if_eligible(&mut self, now: Timestamp) -> bool {
        if self.is_archival_eligible(now) {
            self.is_archived = true;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_protocol_starts_uploaded_and_unarchived() {
        let protocol = Protocol::new("Phase III Diabetes Trial", "s3://bucket/protocol.pdf");
        assert_eq!(protocol.status, ProtocolStatus::Uploaded);
        assert!(!protocol.is_archived);
        assert!(protocol.error_reason.is_none());
    }

    #[test]
    fn node_failure_sets_status_error_reason_and_metadata() {
        let mut protocol = Protocol::new("Trial", "uri");
        protocol.apply_node_failure(PipelineNode::Extract, "service unavailable", Some("circuit breaker open".into()));
        assert_eq!(protocol.status, ProtocolStatus::ExtractionFailed);
        assert_eq!(protocol.error_reason.as_deref(), Some("service unavailable"));
        assert_eq!(protocol.metadata.error.as_deref(), Some("circuit breaker open"));
    }

    #[test]
    fn advancing_to_non_failure_status_clears_error_reason() {
        let mut protocol = Protocol::new("Trial", "uri");
        protocol.apply_node_failure(PipelineNode::Ground, "full grounding failure", None);
        protocol.advance(ProtocolStatus::Grounding);
        assert!(protocol.error_reason.is_none());
    }

    #[test]
    fn failed_at_maps_extract_and_ground_specially_and_others_generically() {
        assert_eq!(ProtocolStatus::failed_at(PipelineNode::Extract), ProtocolStatus::ExtractionFailed);
        assert_eq!(ProtocolStatus::failed_at(PipelineNode::Ground), ProtocolStatus::GroundingFailed);
        assert_eq!(ProtocolStatus::failed_at(PipelineNode::Ingest), ProtocolStatus::PipelineFailed);
        assert_eq!(ProtocolStatus::failed_at(PipelineNode::Structure), ProtocolStatus::PipelineFailed);
    }

    #[test]
    fn archival_requires_terminal_status_and_seven_elapsed_days() {
        let mut protocol = Protocol::new("Trial", "uri");
        protocol.advance(ProtocolStatus::Approved);
        let now = protocol.updated_at;
        assert!(!protocol.is_archival_eligible(now));

        let later = now.plus(time::Duration::days(8));
        assert!(protocol.is_archival_eligible(later));
        assert!(protocol.archive_if_eligible(later));
        assert!(protocol.is_archived);
    }

    #[test]
    fn non_terminal_status_is_never_archival_eligible_regardless_of_age() {
        let protocol = Protocol::new("Trial", "uri");
        let far_future = protocol.updated_at.plus(time::Duration::days(365));
        assert!(!protocol.is_archival_eligible(far_future));
    }

    #[test]
    fn node_next_chains_through_all_seven_stages_in_order() {
        let mut node = PipelineNode::Ingest;
        let mut count = 1;
        while let Some(next) = node.next() {
            node = next;
            count += 1;
        }
        assert_eq!(count, 7);
        assert_eq!(node, PipelineNode::OrdinalResolve);
    }
}
