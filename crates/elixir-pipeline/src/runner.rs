// crates/elixir-pipeline/src/runner.rs
// ============================================================================
// Module: PipelineRunner
// Description: Holds every collaborator the seven-node pipeline depends on
//              and drives one protocol through them, checkpointing after
//              each node.
// Purpose: The single place a `protocol_uploaded`/`reextraction_requested`
//          outbox event enters the state machine described in spec.md §4.6,
//          §5.
// Dependencies: elixir_core::{interfaces::*, domain::*}, tokio::time
// ============================================================================

//! ## Overview
//! [`PipelineRunner`] owns one `Arc<dyn Trait>` per collaborator, mirroring
//! `elixir-outbox::Consumer`'s own `Arc<dyn OutboxStore>` field shape rather
//! than the teacher's generic `ControlPlane<P, D, S, Pol>` type parameters —
//! trait objects let `elixir-cli` and `system-tests` assemble a runner from a
//! mix of production and fake collaborators without the generic parameter
//! list growing with every new dependency. [`PipelineRunner::trigger`] is the
//! single entry point: it resumes from the last successful checkpoint (spec.
//! md §4.6 resume policy), runs nodes until the pipeline reaches
//! `ordinal_resolve` or a node fails, and bounds the whole run with a soft
//! overall timeout (spec.md §5).

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use elixir_core::AuditLogRepository;
use elixir_core::CheckpointStore;
use elixir_core::CriteriaBatchRepository;
use elixir_core::CriterionRepository;
use elixir_core::DocumentFetcher;
use elixir_core::DocumentParser;
use elixir_core::EntityRepository;
use elixir_core::LlmGateway;
use elixir_core::NodeError;
use elixir_core::OmopMapper;
use elixir_core::PipelineCheckpoint;
use elixir_core::PipelineNode;
use elixir_core::ProtocolId;
use elixir_core::ProtocolRepository;
use elixir_core::ProtocolStatus;
use elixir_core::TerminologyRouter;
use serde_json::Value as JsonValue;

use crate::nodes;

// ============================================================================
// SECTION: PipelineConfig
// ============================================================================

/// Tunable knobs for [`PipelineRunner`], all with the defaults named in
/// spec.md §5.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Maximum number of criteria the `ground` node processes concurrently.
    pub ground_concurrency: usize,
    /// Per-node soft timeout.
    pub node_timeout: Duration,
    /// Soft timeout for the whole pipeline run, from `ingest` through
    /// `ordinal_resolve`.
    pub overall_timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self { ground_concurrency: 4, node_timeout: Duration::from_secs(60), overall_timeout: Duration::from_secs(20 * 60) }
    }
}

// ============================================================================
// SECTION: PipelineRunner
// ============================================================================

/// Everything the seven-node pipeline depends on, plus its tuning
/// configuration.
pub struct PipelineRunner {
    /// Protocol aggregate persistence.
    pub protocols: Arc<dyn ProtocolRepository>,
    /// Criteria batch persistence.
    pub batches: Arc<dyn CriteriaBatchRepository>,
    /// Criterion persistence.
    pub criteria: Arc<dyn CriterionRepository>,
    /// Entity persistence.
    pub entities: Arc<dyn EntityRepository>,
    /// Append-only audit log persistence.
    pub audit_logs: Arc<dyn AuditLogRepository>,
    /// Node checkpoint persistence.
    pub checkpoints: Arc<dyn CheckpointStore>,
    /// Structured-output LLM gateway.
    pub llm: Arc<dyn LlmGateway>,
    /// Multi-vocabulary terminology search router.
    pub terminology: Arc<dyn TerminologyRouter>,
    /// OMOP vocabulary-code and unit/value mapper.
    pub omop: Arc<dyn OmopMapper>,
    /// Storage adapter for fetching a protocol's source document.
    pub documents: Arc<dyn DocumentFetcher>,
    /// PDF-to-text parser.
    pub parser: Arc<dyn DocumentParser>,
    /// Tuning configuration.
    pub config: PipelineConfig,
}

impl PipelineRunner {
    /// Creates a new runner from its collaborators and configuration.
    #[must_use]
    #[allow(clippy::too_many_arguments, reason = "one field per collaborator trait, mirrored 1:1 from the constructor")]
    pub fn new(
        protocols: Arc<dyn ProtocolRepository>,
        batches: Arc<dyn CriteriaBatchRepository>,
        criteria: Arc<dyn CriterionRepository>,
        entities: Arc<dyn EntityRepository>,
        audit_logs: Arc<dyn AuditLogRepository>,
        checkpoints: Arc<dyn CheckpointStore>,
        llm: Arc<dyn LlmGateway>,
        terminology: Arc<dyn TerminologyRouter>,
        omop: Arc<dyn OmopMapper>,
        documents: Arc<dyn DocumentFetcher>,
        parser: Arc<dyn DocumentParser>,
        config: PipelineConfig,
    ) -> Self {
        Self { protocols, batches, criteria, entities, audit_logs, checkpoints, llm, terminology, omop, documents, parser, config }
    }

    /// Runs the pipeline for `protocol_id` to completion or first failure,
    /// bounded by [`PipelineConfig::overall_timeout`]. A timeout is itself
    /// reported as a [`NodeError`] against whichever node was in flight, and
    /// never propagates as a panic or an unbounded hang.
    ///
    /// # Errors
    /// Returns the first [`NodeError`] raised by a node, or a synthesized
    /// timeout error if `overall_timeout` elapses first.
    pub async fn trigger(&self, protocol_id: ProtocolId) -> Result<(), NodeError> {
        match tokio::time::timeout(self.config.overall_timeout, self.run(protocol_id)).await {
            Ok(result) => result,
            Err(_elapsed) => {
                let timeout_error = NodeError::new(PipelineNode::OrdinalResolve, "pipeline run exceeded its overall timeout");
                self.fail_protocol(protocol_id, &timeout_error).await;
                Err(timeout_error)
            }
        }
    }

    /// Drives the node state machine from the protocol's resume point
    /// through `ordinal_resolve`, writing a checkpoint after each successful
    /// node (spec.md §4.6).
    async fn run(&self, protocol_id: ProtocolId) -> Result<(), NodeError> {
        let checkpoints = self.checkpoints.list_for_protocol(protocol_id).await.map_err(|error| {
            NodeError::new(PipelineNode::Ingest, "failed to read checkpoints").with_technical_detail(error.to_string())
        })?;
        let start = elixir_core::resume_point(&checkpoints);
        let mut carry = carry_state(&checkpoints, start);

        let mut current = Some(start);
        while let Some(node) = current {
            let mut protocol = self.protocols.get(protocol_id).await.map_err(|error| {
                NodeError::new(node, "failed to load protocol").with_technical_detail(error.to_string())
            })?;

            match nodes::dispatch(node, self, &mut protocol, &carry).await {
                Ok(state) => {
                    self.protocols.update(&protocol).await.map_err(|error| {
                        NodeError::new(node, "failed to persist protocol").with_technical_detail(error.to_string())
                    })?;
                    let checkpoint = PipelineCheckpoint::new(protocol_id, node, state.clone());
                    self.checkpoints.put(&checkpoint).await.map_err(|error| {
                        NodeError::new(node, "failed to persist checkpoint").with_technical_detail(error.to_string())
                    })?;
                    carry = state;
                    current = node.next();
                }
                Err(error) => {
                    self.fail_protocol(protocol_id, &error).await;
                    return Err(error);
                }
            }
        }

        Ok(())
    }

    /// Applies a node failure to the protocol row, best-effort: a write
    /// failure here is logged but does not mask the original node error.
    async fn fail_protocol(&self, protocol_id: ProtocolId, error: &NodeError) {
        let Ok(mut protocol) = self.protocols.get(protocol_id).await else {
            tracing::error!(%protocol_id, "could not load protocol to record node failure");
            return;
        };
        protocol.apply_node_failure(error.node, error.reason.clone(), error.technical_detail.clone());
        if let Err(write_error) = self.protocols.update(&protocol).await {
            tracing::error!(%protocol_id, %write_error, "failed to persist node failure");
        }
    }
}

// ============================================================================
// SECTION: Resume Helpers
// ============================================================================

/// Returns the state carried forward into `start`: the checkpointed output
/// of the node immediately preceding it in execution order, or
/// [`JsonValue::Null`] if `start` is the first node.
fn carry_state(checkpoints: &[PipelineCheckpoint], start: PipelineNode) -> JsonValue {
    let order = PipelineNode::all();
    let Some(index) = order.iter().position(|node| *node == start) else {
        return JsonValue::Null;
    };
    let Some(previous) = index.checked_sub(1).map(|previous_index| order[previous_index]) else {
        return JsonValue::Null;
    };
    checkpoints
        .iter()
        .filter(|checkpoint| checkpoint.node_name == previous)
        .max_by_key(|checkpoint| checkpoint.written_at)
        .map_or(JsonValue::Null, |checkpoint| checkpoint.state.clone())
}

/// Returns whether `protocol_id`'s current status indicates the pipeline has
/// already reached a terminal, non-retryable state without an explicit
/// re-trigger (used by [`crate::trigger::PipelineOutboxHandler`] to decide
/// idempotently whether a duplicate event should be a no-op).
#[must_use]
pub fn is_pipeline_complete(status: ProtocolStatus) -> bool {
    status.is_terminal()
}

#[cfg(test)]
mod tests {
    use elixir_core::ProtocolId;

    use super::*;

    #[test]
    fn carry_state_is_null_for_the_first_node() {
        assert_eq!(carry_state(&[], PipelineNode::Ingest), JsonValue::Null);
    }

    #[test]
    fn carry_state_reads_the_immediately_preceding_node() {
        let protocol_id = ProtocolId::new();
        let checkpoints = vec![
            PipelineCheckpoint::new(protocol_id, PipelineNode::Ingest, serde_json::json!({"pages": 3})),
            PipelineCheckpoint::new(protocol_id, PipelineNode::Extract, serde_json::json!({"criteria": []})),
        ];
        let carried = carry_state(&checkpoints, PipelineNode::Parse);
        assert_eq!(carried, serde_json::json!({"criteria": []}));
    }

    #[test]
    fn is_pipeline_complete_matches_terminal_statuses() {
        assert!(is_pipeline_complete(ProtocolStatus::Approved));
        assert!(!is_pipeline_complete(ProtocolStatus::Grounding));
    }
}
