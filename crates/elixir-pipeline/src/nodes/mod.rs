// crates/elixir-pipeline/src/nodes/mod.rs
// ============================================================================
// Module: Pipeline Nodes
// Description: The seven node implementations and the dispatch table the
//              runner drives them through.
// Purpose: Each node reads the previous node's carry state, performs its
//          work, and returns the carry state for the next node (spec.md
//          §4.6).
// Dependencies: elixir_core, elixir_llm, serde, serde_json
// ============================================================================

mod extract;
mod ground;
mod ingest;
mod ordinal_resolve;
mod parse;
mod persist;
mod schemas;
pub mod state;
mod structure;

use std::sync::OnceLock;

use elixir_core::NodeError;
use elixir_core::PipelineNode;
use elixir_core::Protocol;
use elixir_llm::TemplateStore;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::runner::PipelineRunner;

/// The shared prompt template catalogue, built once per process.
fn templates() -> &'static TemplateStore {
    static STORE: OnceLock<TemplateStore> = OnceLock::new();
    STORE.get_or_init(TemplateStore::default_templates)
}

/// Runs the node `node` against `protocol`, returning its carry state.
///
/// # Errors
/// Returns [`NodeError`] when the node's work fails outright. `ground`
/// accumulates per-entity failures in its own output instead of returning
/// an error for them; see [`ground::run`].
pub async fn dispatch(
    node: PipelineNode,
    runner: &PipelineRunner,
    protocol: &mut Protocol,
    carry: &JsonValue,
) -> Result<JsonValue, NodeError> {
    match node {
        PipelineNode::Ingest => ingest::run(runner, protocol, carry).await,
        PipelineNode::Extract => extract::run(runner, protocol, carry).await,
        PipelineNode::Parse => parse::run(runner, protocol, carry).await,
        PipelineNode::Ground => ground::run(runner, protocol, carry).await,
        PipelineNode::Persist => persist::run(runner, protocol, carry).await,
        PipelineNode::Structure => structure::run(runner, protocol, carry).await,
        PipelineNode::OrdinalResolve => ordinal_resolve::run(runner, protocol, carry).await,
    }
}

/// Serializes `value` into the opaque carry representation, wrapping any
/// failure as a [`NodeError`] for `node`.
fn to_carry<T: Serialize>(node: PipelineNode, value: &T) -> Result<JsonValue, NodeError> {
    serde_json::to_value(value).map_err(|error| {
        NodeError::new(node, "failed to serialize node output").with_technical_detail(error.to_string())
    })
}

/// Deserializes the previous node's carry value into `T`, wrapping any
/// failure as a [`NodeError`] for `node`.
fn from_carry<T: DeserializeOwned>(node: PipelineNode, carry: &JsonValue) -> Result<T, NodeError> {
    serde_json::from_value(carry.clone()).map_err(|error| {
        NodeError::new(node, "failed to read checkpointed node input").with_technical_detail(error.to_string())
    })
}
