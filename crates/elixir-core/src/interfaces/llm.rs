// crates/elixir-core/src/interfaces/llm.rs
// ============================================================================
// Module: LlmGateway
// Description: Structured-output LLM call trait shared by extract/ground/
//              structure/ordinal_resolve.
// Purpose: Give every node a single call shape — a prompt target, a JSON
//          Schema, and a retry/circuit-breaker policy — so `elixir-llm` is
//          the only crate that knows which model backs which target.
// Dependencies: async-trait, jsonschema, serde_json, thiserror
// ============================================================================

//! ## Overview
//! `elixir-llm` wraps a single chat-completions-style HTTP client behind this
//! trait. Every call names a `target` (a logical model slot, e.g.
//! `"extraction"` or `"grounding-agentic"`) so the gateway can apply a
//! per-target circuit breaker (spec.md §4.6.4: three consecutive failures
//! opens the breaker for 60s) independent of retry/backoff within one call
//! (1s/2s/4s, spec.md §4.4).

// ============================================================================
// SECTION: Imports
// ============================================================================

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use thiserror::Error;

// ============================================================================
// SECTION: Request / Response
// ============================================================================

/// One structured-output completion request.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// Logical target name selecting the model and circuit breaker
    /// (e.g. `"extraction"`, `"grounding-agentic"`, `"structure"`).
    pub target: String,
    /// System prompt text.
    pub system_prompt: String,
    /// User turn content (criterion text, entity context, etc).
    pub user_content: String,
    /// JSON Schema the response must validate against.
    pub response_schema: JsonValue,
    /// Maximum agentic retry attempts for this call (spec.md §4.6.4's
    /// "agentic retry loop" bounds retries separately from transport retry).
    pub max_agentic_attempts: u32,
}

/// The validated structured response from a completion call.
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    /// The parsed, schema-validated JSON payload.
    pub payload: JsonValue,
    /// Number of agentic attempts consumed before this response validated.
    pub attempts_used: u32,
    /// Name and version of the model that produced this response, as
    /// reported by the upstream API.
    pub model_name: String,
    /// Model version string.
    pub model_version: String,
}

// ============================================================================
// SECTION: Error
// ============================================================================

/// Failure calling the LLM gateway.
#[derive(Debug, Error)]
pub enum LlmError {
    /// Every agentic attempt produced a response failing schema validation.
    #[error("target {target} exhausted {attempts} attempts without a schema-valid response")]
    SchemaValidationExhausted {
        /// The logical target that was called.
        target: String,
        /// Attempts made before giving up.
        attempts: u32,
    },
    /// A transient upstream failure survived transport-level retry.
    #[error("target {target} upstream error: {message}")]
    Upstream {
        /// The logical target that was called.
        target: String,
        /// Description of the upstream failure.
        message: String,
    },
    /// The circuit breaker for this target is open.
    #[error("target {target} breaker open, retry after {retry_after_secs}s")]
    BreakerOpen {
        /// The logical target whose breaker tripped.
        target: String,
        /// Seconds remaining until the breaker closes.
        retry_after_secs: u64,
    },
}

// ============================================================================
// SECTION: LlmGateway
// ============================================================================

/// Structured-output LLM call gateway.
#[async_trait]
pub trait LlmGateway: Send + Sync {
    /// Issues a structured-output completion call, retrying transport
    /// failures with exponential backoff and validating the response against
    /// `request.response_schema` up to `request.max_agentic_attempts` times.
    ///
    /// # Errors
    /// Returns [`LlmError::BreakerOpen`] if the target's circuit breaker is
    /// open, [`LlmError::Upstream`] if transport retries are exhausted, or
    /// [`LlmError::SchemaValidationExhausted`] if every agentic attempt
    /// produced a response failing schema validation.
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError>;
}
