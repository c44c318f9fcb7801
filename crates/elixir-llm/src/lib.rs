// crates/elixir-llm/src/lib.rs
// ============================================================================
// Module: ElixirTrials LLM Library
// Description: Public API surface for the structured-output LLM gateway.
// Purpose: Give the extract/ground/structure/ordinal_resolve pipeline nodes
//          one `elixir_core::LlmGateway` implementation, backed by HTTP, a
//          per-target circuit breaker, and a (node, model) prompt template
//          store (spec.md §4.4, §4.6.1-4.6.7).
// Dependencies: crate::{breaker, error, gateway, templates}
// ============================================================================

//! ## Overview
//! `elixir-llm` has no knowledge of the pipeline beyond the prompt templates
//! it ships; nodes call it purely through `elixir_core::LlmGateway`, the same
//! way `elixir-omop` is consumed purely through `elixir_core::OmopMapper`.

pub mod breaker;
pub mod error;
pub mod gateway;
pub mod templates;

pub use breaker::TargetBreaker;
pub use error::GatewayError;
pub use gateway::HttpLlmGateway;
pub use templates::ModelKind;
pub use templates::NodeName;
pub use templates::Template;
pub use templates::TemplateStore;
