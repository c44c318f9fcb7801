// crates/elixir-core/src/interfaces/checkpoint.rs
// ============================================================================
// Module: CheckpointStore
// Description: Persistence trait for pipeline node checkpoints.
// Purpose: Let `PipelineRunner` resume a protocol's pipeline from its last
//          successful node without depending on the Postgres checkpoint
//          table directly.
// Dependencies: async-trait, crate::domain::checkpoint, thiserror
// ============================================================================

//! ## Overview
//! One row per `(thread_id, node_name)`, written atomically alongside each
//! node's own domain writes (spec.md §4.6). See
//! [`crate::domain::checkpoint::resume_point`] for the resume-node
//! calculation this store's reads feed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::checkpoint::PipelineCheckpoint;
use crate::identifiers::ProtocolId;

// ============================================================================
// SECTION: Error
// ============================================================================

/// Failure interacting with the checkpoint store.
#[derive(Debug, Error)]
#[error("checkpoint backend error: {0}")]
pub struct CheckpointError(pub String);

// ============================================================================
// SECTION: CheckpointStore
// ============================================================================

/// Durable storage for [`PipelineCheckpoint`] rows.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Writes a checkpoint, overwriting any prior checkpoint for the same
    /// `(thread_id, node_name)` pair.
    ///
    /// # Errors
    /// Returns [`CheckpointError`] if the write fails.
    async fn put(&self, checkpoint: &PipelineCheckpoint) -> Result<(), CheckpointError>;

    /// Lists every checkpoint written so far for a protocol.
    ///
    /// # Errors
    /// Returns [`CheckpointError`] if the read fails.
    async fn list_for_protocol(&self, thread_id: ProtocolId) -> Result<Vec<PipelineCheckpoint>, CheckpointError>;

    /// Deletes every checkpoint for a protocol, called before a
    /// re-extraction starts a fresh pipeline run (spec.md §4.8).
    ///
    /// # Errors
    /// Returns [`CheckpointError`] if the delete fails.
    async fn clear_for_protocol(&self, thread_id: ProtocolId) -> Result<(), CheckpointError>;
}
