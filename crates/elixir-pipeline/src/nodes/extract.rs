// crates/elixir-pipeline/src/nodes/extract.rs
// ============================================================================
// Module: Extract Node
// Description: Extracts raw inclusion/exclusion criteria from ingested page
//              text via a structured-output LLM call (spec.md §4.6.2).
// Dependencies: elixir_core, elixir_llm
// ============================================================================

use elixir_core::CompletionRequest;
use elixir_core::LlmError;
use elixir_core::NodeError;
use elixir_core::PipelineNode;
use elixir_core::Protocol;
use elixir_llm::ModelKind;
use elixir_llm::NodeName;
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

use super::schemas;
use super::state::ExtractState;
use super::state::IngestState;
use crate::runner::PipelineRunner;

/// Maximum agentic retries the extraction call is allowed before the node
/// fails outright; extraction has no per-item fallback the way grounding
/// does, so this is kept small.
const MAX_AGENTIC_ATTEMPTS: u32 = 2;

/// Extracts raw criteria from the ingested document text.
///
/// # Errors
/// Returns [`NodeError`] if the previous node's carry state cannot be read,
/// or the extraction call fails outright (breaker open, transport retries
/// exhausted, or every agentic attempt fails schema validation).
pub async fn run(runner: &PipelineRunner, _protocol: &mut Protocol, carry: &JsonValue) -> Result<JsonValue, NodeError> {
    let ingest_state: IngestState = super::from_carry(PipelineNode::Extract, carry)?;
    let document_text = ingest_state.pages.iter().map(|page| page.text.as_str()).collect::<Vec<_>>().join("\n\n");

    let template = super::templates()
        .get(NodeName::Extract, ModelKind::Gemini)
        .ok_or_else(|| NodeError::new(PipelineNode::Extract, "no extraction template configured"))?;

    let mut vars = BTreeMap::new();
    vars.insert("document_text", document_text);

    let request = CompletionRequest {
        target: "extraction".to_string(),
        system_prompt: template.render_system(&vars),
        user_content: template.render_user(&vars),
        response_schema: schemas::extract_schema(),
        max_agentic_attempts: MAX_AGENTIC_ATTEMPTS,
    };

    let response = runner.llm.complete(request).await.map_err(llm_error)?;
    let extract_state: ExtractState = serde_json::from_value(response.payload)
        .map_err(|error| NodeError::new(PipelineNode::Extract, "extraction response did not match expected shape").with_technical_detail(error.to_string()))?;

    super::to_carry(PipelineNode::Extract, &extract_state)
}

fn llm_error(error: LlmError) -> NodeError {
    match error {
        LlmError::BreakerOpen { target, retry_after_secs } => {
            NodeError::new(PipelineNode::Extract, format!("{target} is temporarily unavailable, retry after {retry_after_secs}s"))
        }
        LlmError::Upstream { target, message } => {
            NodeError::new(PipelineNode::Extract, format!("{target} upstream error")).with_technical_detail(message)
        }
        LlmError::SchemaValidationExhausted { target, attempts } => {
            NodeError::new(PipelineNode::Extract, format!("{target} did not return a valid response after {attempts} attempts"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn llm_error_maps_every_variant_to_the_extract_node() {
        let breaker = llm_error(LlmError::BreakerOpen { target: "extraction".to_string(), retry_after_secs: 30 });
        assert_eq!(breaker.node, PipelineNode::Extract);

        let upstream = llm_error(LlmError::Upstream { target: "extraction".to_string(), message: "timeout".to_string() });
        assert_eq!(upstream.technical_detail.as_deref(), Some("timeout"));

        let exhausted = llm_error(LlmError::SchemaValidationExhausted { target: "extraction".to_string(), attempts: 2 });
        assert!(exhausted.reason.contains("2 attempts"));
    }
}
