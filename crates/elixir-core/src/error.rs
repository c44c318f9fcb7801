// crates/elixir-core/src/error.rs
// ============================================================================
// Module: ElixirTrials Error Taxonomy
// Description: Shared error types crossing crate boundaries in the pipeline.
// Purpose: Give every failure mode named in the error handling design a
//          single, typed home instead of ad-hoc strings or anyhow.
// Dependencies: thiserror
// ============================================================================

//! ## Overview
//! Retries happen *inside* the LLM gateway and *inside* the outbox consumer;
//! node bodies never retry. A node failure is therefore always terminal for
//! the current attempt and is reported upward as [`NodeError`]. Per-entity
//! grounding failures are absorbed by the ground node and never become a
//! [`NodeError`] — they accumulate as [`GroundingFailure`] values in node
//! state instead.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;

use crate::domain::protocol::PipelineNode;

// ============================================================================
// SECTION: API Boundary Errors
// ============================================================================

/// Bad input at the API boundary.
///
/// # Invariants
/// - Maps to HTTP 4xx in the (unbuilt) API layer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("validation error: {message}")]
pub struct ValidationError {
    /// Human-readable description of the bad input.
    pub message: String,
}

impl ValidationError {
    /// Creates a validation error with the given message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

/// A requested resource does not exist.
///
/// # Invariants
/// - Maps to HTTP 404 in the (unbuilt) API layer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("not found: {kind} {id}")]
pub struct NotFound {
    /// The kind of resource that was missing (e.g. `"protocol"`).
    pub kind: &'static str,
    /// The identifier that was looked up.
    pub id: String,
}

impl NotFound {
    /// Creates a not-found error for the given resource kind and identifier.
    #[must_use]
    pub fn new(kind: &'static str, id: impl ToString) -> Self {
        Self { kind, id: id.to_string() }
    }
}

// ============================================================================
// SECTION: Upstream / Circuit Breaker Errors
// ============================================================================

/// The circuit breaker for an upstream target is open.
///
/// # Invariants
/// - Maps to HTTP 503 with `Retry-After: retry_after_secs` in the API layer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("service unavailable: {target} (retry after {retry_after_secs}s)")]
pub struct ServiceUnavailable {
    /// Name of the upstream target whose breaker is open (e.g. `"gemini"`).
    pub target: String,
    /// Seconds until the breaker's open window elapses.
    pub retry_after_secs: u64,
}

/// A transient failure communicating with an upstream LLM or HTTP service.
///
/// # Invariants
/// - Retried inside the gateway; never surfaced to a caller if a retry
///   eventually succeeds.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransientUpstreamError {
    /// Upstream responded with a retryable HTTP status (429 or 5xx).
    #[error("upstream {target} returned retryable status {status}")]
    RetryableStatus {
        /// Upstream target name.
        target: String,
        /// HTTP status code returned.
        status: u16,
    },
    /// A network-level failure occurred (timeout, connection reset, DNS).
    #[error("upstream {target} network error: {message}")]
    Network {
        /// Upstream target name.
        target: String,
        /// Description of the network failure.
        message: String,
    },
}

// ============================================================================
// SECTION: Grounding and Node Errors
// ============================================================================

/// A per-entity grounding failure. Never fatal to the pipeline; accumulated
/// into node state and surfaced only through the criterion's entities.
///
/// # Invariants
/// - Always scoped to one entity attempt; never aggregated into a node error.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("grounding failed for entity {entity_text:?}: {reason}")]
pub struct GroundingFailure {
    /// The original entity mention text.
    pub entity_text: String,
    /// Human-readable reason the entity could not be grounded.
    pub reason: String,
}

/// A pipeline node raised during execution.
///
/// # Invariants
/// - Carries the failing node so `Protocol.status` can be set to
///   `<node>_failed` generically.
/// - Never retried by the node itself; retried only by the outbox at the
///   event level.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("node {node} failed: {reason}")]
pub struct NodeError {
    /// The node that failed.
    pub node: PipelineNode,
    /// Human-readable failure reason, suitable for `Protocol.error_reason`.
    pub reason: String,
    /// Technical detail, suitable for `Protocol.metadata.error`.
    pub technical_detail: Option<String>,
}

impl NodeError {
    /// Creates a node error with only a human-readable reason.
    #[must_use]
    pub fn new(node: PipelineNode, reason: impl Into<String>) -> Self {
        Self { node, reason: reason.into(), technical_detail: None }
    }

    /// Attaches a technical detail string for `Protocol.metadata.error`.
    #[must_use]
    pub fn with_technical_detail(mut self, detail: impl Into<String>) -> Self {
        self.technical_detail = Some(detail.into());
        self
    }
}

// ============================================================================
// SECTION: Integrity Errors
// ============================================================================

/// A domain invariant violation surfaced by the read-only integrity audit.
///
/// # Invariants
/// - Never fatal; surfaced only through `IntegrityChecker::check` results.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("integrity issue ({severity:?}): {message}")]
pub struct IntegrityError {
    /// Severity of the issue.
    pub severity: IntegritySeverity,
    /// Human-readable description.
    pub message: String,
}

/// Severity of an integrity issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum IntegritySeverity {
    /// A hard invariant violation (e.g. orphaned rows).
    Error,
    /// A soft invariant violation worth operator attention.
    Warning,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_error_display_includes_node_name() {
        let err = NodeError::new(PipelineNode::Ground, "LLM timed out");
        assert!(err.to_string().contains("ground"));
    }

    #[test]
    fn node_error_carries_optional_technical_detail() {
        let err = NodeError::new(PipelineNode::Extract, "bad schema")
            .with_technical_detail("JSON schema validation failed at $.criteria[2].type");
        assert!(err.technical_detail.is_some());
    }
}
