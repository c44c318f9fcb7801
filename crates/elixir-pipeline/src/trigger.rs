// crates/elixir-pipeline/src/trigger.rs
// ============================================================================
// Module: Pipeline Outbox Handlers
// Description: Outbox handlers adapting `protocol_uploaded` and
//              `reextraction_requested` events into pipeline runs, idempotent
//              under at-least-once delivery.
// Dependencies: elixir_core, elixir_review
// ============================================================================

use std::sync::Arc;

use elixir_core::CriteriaBatchRepository;
use elixir_core::NodeError;
use elixir_core::OutboxError;
use elixir_core::OutboxEvent;
use elixir_core::OutboxEventType;
use elixir_core::OutboxHandler;
use elixir_core::ProtocolId;
use elixir_review::ReextractionService;
use serde::Deserialize;

use crate::runner::is_pipeline_complete;
use crate::runner::PipelineRunner;

/// Payload shape for [`OutboxEventType::ProtocolUploaded`] (spec.md §6).
#[derive(Debug, Deserialize)]
struct ProtocolUploadedPayload {
    protocol_id: ProtocolId,
}

/// Payload shape for [`OutboxEventType::ReextractionRequested`] (spec.md
/// §6): `{protocol_id, reason}`. `reason` is not read here; it was already
/// recorded by [`ReextractionService::trigger_reextraction`] before this
/// event was published.
#[derive(Debug, Deserialize)]
struct ReextractionRequestedPayload {
    protocol_id: ProtocolId,
}

/// Drives a [`PipelineRunner`] run from a `protocol_uploaded` outbox event.
pub struct PipelineOutboxHandler {
    runner: Arc<PipelineRunner>,
}

impl PipelineOutboxHandler {
    /// Creates a handler over the given runner.
    #[must_use]
    pub fn new(runner: Arc<PipelineRunner>) -> Self {
        Self { runner }
    }
}

#[async_trait::async_trait]
impl OutboxHandler for PipelineOutboxHandler {
    fn event_type(&self) -> OutboxEventType {
        OutboxEventType::ProtocolUploaded
    }

    /// Triggers a pipeline run for the event's protocol, treating a protocol
    /// already in a terminal state as a no-op so redelivery of the same
    /// event never re-runs a completed pipeline (spec.md §8 invariant 6).
    async fn handle(&self, event: &OutboxEvent) -> Result<(), OutboxError> {
        let payload: ProtocolUploadedPayload = serde_json::from_value(event.payload.clone())
            .map_err(|error| OutboxError::Handler { event_type: event.event_type, message: error.to_string() })?;

        let protocol = self.runner.protocols.get(payload.protocol_id).await.map_err(|error| OutboxError::Handler {
            event_type: event.event_type,
            message: error.to_string(),
        })?;
        if is_pipeline_complete(protocol.status) {
            return Ok(());
        }

        self.runner.trigger(payload.protocol_id).await.map_err(|error| node_error_to_outbox_error(OutboxEventType::ProtocolUploaded, error))
    }
}

/// Drives a re-extraction's replacement pipeline run from a
/// `reextraction_requested` outbox event, then inherits prior review state
/// into the freshly produced batch (spec.md §4.8).
///
/// By the time this handler runs, [`ReextractionService::trigger_reextraction`]
/// has already archived the protocol's prior active batch and cleared its
/// checkpoints, so the batch [`ReextractionService::batches`] reports as
/// most recently created-but-archived for this protocol is the one the new
/// batch should inherit from.
pub struct ReextractionOutboxHandler {
    runner: Arc<PipelineRunner>,
    reextraction: Arc<ReextractionService>,
}

impl ReextractionOutboxHandler {
    /// Creates a handler over the given runner and re-extraction service.
    #[must_use]
    pub fn new(runner: Arc<PipelineRunner>, reextraction: Arc<ReextractionService>) -> Self {
        Self { runner, reextraction }
    }
}

#[async_trait::async_trait]
impl OutboxHandler for ReextractionOutboxHandler {
    fn event_type(&self) -> OutboxEventType {
        OutboxEventType::ReextractionRequested
    }

    async fn handle(&self, event: &OutboxEvent) -> Result<(), OutboxError> {
        let payload: ReextractionRequestedPayload = serde_json::from_value(event.payload.clone())
            .map_err(|error| OutboxError::Handler { event_type: event.event_type, message: error.to_string() })?;

        // `list_for_protocol` orders newest-created first, so the first
        // archived row is the batch the prior active extraction just
        // superseded — the one review state should be inherited from.
        let archived_batch = self
            .reextraction
            .batches
            .list_for_protocol(payload.protocol_id)
            .await
            .map_err(|error| OutboxError::Handler { event_type: event.event_type, message: error.to_string() })?
            .into_iter()
            .find(|batch| batch.is_archived);

        self.runner
            .trigger(payload.protocol_id)
            .await
            .map_err(|error| node_error_to_outbox_error(OutboxEventType::ReextractionRequested, error))?;

        if let Some(archived_batch) = archived_batch {
            let new_batch = self.reextraction.batches.active_for_protocol(payload.protocol_id).await.map_err(|error| {
                OutboxError::Handler { event_type: event.event_type, message: error.to_string() }
            })?;
            if let Some(new_batch) = new_batch {
                self.reextraction.inherit_reviews(archived_batch.id, new_batch.id).await.map_err(|error| OutboxError::Handler {
                    event_type: event.event_type,
                    message: error.to_string(),
                })?;
            }
        }

        Ok(())
    }
}

/// Maps a pipeline failure to the outbox handler error for `event_type`.
fn node_error_to_outbox_error(event_type: OutboxEventType, error: NodeError) -> OutboxError {
    OutboxError::Handler { event_type, message: error.reason }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_error_carries_its_reason_into_the_outbox_error() {
        let error = node_error_to_outbox_error(OutboxEventType::ProtocolUploaded, NodeError::new(elixir_core::PipelineNode::Ground, "grounding failed"));
        match error {
            OutboxError::Handler { event_type, message } => {
                assert_eq!(event_type, OutboxEventType::ProtocolUploaded);
                assert_eq!(message, "grounding failed");
            }
            OutboxError::Backend(_) => panic!("expected Handler variant"),
        }
    }
}
