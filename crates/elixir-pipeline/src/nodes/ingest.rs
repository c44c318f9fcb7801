// crates/elixir-pipeline/src/nodes/ingest.rs
// ============================================================================
// Module: Ingest Node
// Description: Fetches and parses a protocol's source document, scoring its
//              extraction quality (spec.md §4.6.1).
// Dependencies: elixir_core
// ============================================================================

use elixir_core::DocumentError;
use elixir_core::NodeError;
use elixir_core::PipelineNode;
use elixir_core::Protocol;
use elixir_core::ProtocolStatus;
use serde_json::Value as JsonValue;

use super::state::IngestState;
use super::state::PageText;
use crate::quality;
use crate::runner::PipelineRunner;

/// Fetches `protocol`'s source document, parses it into page text, and
/// scores its extraction quality.
///
/// # Errors
/// Returns [`NodeError`] when the document cannot be fetched or parsed.
pub async fn run(runner: &PipelineRunner, protocol: &mut Protocol, _carry: &JsonValue) -> Result<JsonValue, NodeError> {
    let bytes = runner.documents.fetch(&protocol.file_uri).await.map_err(document_error)?;
    let document = runner.parser.parse(&bytes).map_err(document_error)?;
    let quality_score = quality::score_document(&document);

    let page_count = u32::try_from(document.pages.len()).unwrap_or(u32::MAX);
    protocol.metadata.quality_score = Some(quality_score);
    protocol.metadata.page_count = Some(page_count);
    protocol.advance(ProtocolStatus::Extracting);

    let pages = document
        .pages
        .iter()
        .map(|page| PageText { page_number: page.page_number, text: page.text() })
        .collect();

    super::to_carry(PipelineNode::Ingest, &IngestState { pages, quality_score })
}

fn document_error(error: DocumentError) -> NodeError {
    NodeError::new(PipelineNode::Ingest, "failed to ingest source document").with_technical_detail(error.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_error_carries_technical_detail() {
        let error = document_error(DocumentError::ParseFailed("bad pdf".to_string()));
        assert_eq!(error.node, PipelineNode::Ingest);
        assert!(error.technical_detail.is_some());
    }
}
