// crates/elixir-core/src/domain/checkpoint.rs
// ============================================================================
// Module: PipelineCheckpoint
// Description: Serialized node state keyed by (thread_id, node_name).
// Purpose: Let `PipelineRunner` resume a protocol from its last successful
//          node instead of restarting the whole pipeline.
// Dependencies: crate::identifiers, crate::domain::protocol, crate::time
// ============================================================================

//! ## Overview
//! A checkpoint is written after each node returns successfully, atomically
//! with that node's own domain side effects (spec.md §4.6). Re-triggering a
//! protocol's pipeline resumes from the last successful checkpoint, except
//! `ground`, which is always re-run from scratch because its intermediate
//! per-entity state is not checkpointable.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::domain::protocol::PipelineNode;
use crate::identifiers::ProtocolId;
use crate::time::Timestamp;

// ============================================================================
// SECTION: PipelineCheckpoint
// ============================================================================

/// Serialized state for one completed pipeline node.
///
/// # Invariants
/// - Keyed by `(thread_id, node_name)`; `thread_id` is the protocol id.
/// - `ground` checkpoints are written for bookkeeping but are never read
///   back as a resume point (spec.md §4.6 resume policy).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineCheckpoint {
    /// The protocol this checkpoint belongs to (the state machine's
    /// `thread_id`).
    pub thread_id: ProtocolId,
    /// The node that produced this checkpoint.
    pub node_name: PipelineNode,
    /// Opaque serialized node output, passed to the next node.
    pub state: JsonValue,
    /// When this checkpoint was written.
    pub written_at: Timestamp,
}

impl PipelineCheckpoint {
    /// Creates a new checkpoint for the given protocol/node/state.
    #[must_use]
    pub fn new(thread_id: ProtocolId, node_name: PipelineNode, state: JsonValue) -> Self {
        Self { thread_id, node_name, state, written_at: Timestamp::now() }
    }

    /// Returns whether this checkpoint is a valid resume point per spec.md
    /// §4.6: every node except `ground` resumes from its own checkpoint.
    #[must_use]
    pub const fn is_resumable(&self) -> bool {
        !matches!(self.node_name, PipelineNode::Ground)
    }
}

/// Given the set of checkpoints written so far for a protocol, determines
/// the node the pipeline should resume from: the node after the latest
/// resumable checkpoint, or `ingest` if none exist.
#[must_use]
pub fn resume_point(checkpoints: &[PipelineCheckpoint]) -> PipelineNode {
    let latest_resumable = checkpoints
        .iter()
        .filter(|checkpoint| checkpoint.is_resumable())
        .max_by_key(|checkpoint| checkpoint.written_at);

    match latest_resumable {
        Some(checkpoint) => checkpoint.node_name.next().unwrap_or(checkpoint.node_name),
        None => PipelineNode::Ingest,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resume_point_with_no_checkpoints_is_ingest() {
        assert_eq!(resume_point(&[]), PipelineNode::Ingest);
    }

    #[test]
    fn resume_point_advances_past_latest_resumable_checkpoint() {
        let protocol_id = ProtocolId::new();
        let checkpoints = vec![
            PipelineCheckpoint::new(protocol_id, PipelineNode::Ingest, serde_json::json!({})),
            PipelineCheckpoint::new(protocol_id, PipelineNode::Extract, serde_json::json!({})),
        ];
        assert_eq!(resume_point(&checkpoints), PipelineNode::Parse);
    }

    #[test]
    fn ground_checkpoint_is_never_a_resume_point() {
        let protocol_id = ProtocolId::new();
        let checkpoints = vec![
            PipelineCheckpoint::new(protocol_id, PipelineNode::Parse, serde_json::json!({})),
            PipelineCheckpoint::new(protocol_id, PipelineNode::Ground, serde_json::json!({})),
        ];
        // ground is not resumable, so we resume from the node after parse,
        // i.e. ground runs again from scratch.
        assert_eq!(resume_point(&checkpoints), PipelineNode::Ground);
    }
}
