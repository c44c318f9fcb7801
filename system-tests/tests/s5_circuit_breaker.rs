// system-tests/tests/s5_circuit_breaker.rs
// ============================================================================
// Scenario: S5 circuit breaker
// Description: The extraction LLM target reports its circuit breaker open;
//              the pipeline surfaces a typed, human-readable failure and
//              lands the protocol in extraction_failed rather than a generic
//              pipeline failure.
// ============================================================================

use std::sync::Arc;

use elixir_core::ParsedDocument;
use elixir_core::ParsedPage;
use elixir_core::Protocol;
use elixir_core::ProtocolStatus;
use elixir_pipeline::runner::PipelineConfig;
use elixir_pipeline::runner::PipelineRunner;
use system_tests::fakes::FakeCheckpointStore;
use system_tests::fakes::FakeDocumentFetcher;
use system_tests::fakes::FakeDocumentParser;
use system_tests::fakes::FakeLlmGateway;
use system_tests::fakes::FakeOmopMapper;
use system_tests::fakes::FakeStore;
use system_tests::fakes::FakeTerminologyRouter;
use system_tests::fakes::ScriptedFailure;

#[tokio::test]
async fn breaker_open_on_extraction_fails_the_protocol_with_a_typed_retry_hint() {
    let store = Arc::new(FakeStore::default());
    let checkpoints = Arc::new(FakeCheckpointStore::default());
    let documents = Arc::new(FakeDocumentFetcher::default());
    let parser = Arc::new(FakeDocumentParser::default());
    let terminology = Arc::new(FakeTerminologyRouter::default());
    let omop = Arc::new(FakeOmopMapper::default());
    let llm = Arc::new(FakeLlmGateway::default());

    let protocol = Protocol::new("Trial", "s3://bucket/protocol.pdf");
    let protocol_id = protocol.id;
    elixir_core::ProtocolRepository::insert(store.as_ref(), &protocol).await.expect("insert protocol");

    let bytes = b"protocol bytes".to_vec();
    documents.insert(protocol.file_uri.clone(), bytes.clone());
    parser.insert(
        bytes,
        ParsedDocument { pages: vec![ParsedPage { page_number: 1, blocks: vec!["Age >= 18 years.".to_string()], extractable_chars: 20, total_chars: 20 }] },
    );

    llm.push_err("extraction", ScriptedFailure::BreakerOpen { retry_after_secs: 60 });

    let runner = PipelineRunner::new(
        store.clone(),
        store.clone(),
        store.clone(),
        store.clone(),
        store.clone(),
        checkpoints,
        llm,
        terminology,
        omop,
        documents,
        parser,
        PipelineConfig::default(),
    );

    let result = runner.trigger(protocol_id).await;
    assert!(result.is_err());

    let failed = elixir_core::ProtocolRepository::get(store.as_ref(), protocol_id).await.expect("load protocol");
    assert_eq!(failed.status, ProtocolStatus::ExtractionFailed);
    assert_eq!(failed.error_reason.as_deref(), Some("extraction is temporarily unavailable, retry after 60s"));
}
