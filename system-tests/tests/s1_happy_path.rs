// system-tests/tests/s1_happy_path.rs
// ============================================================================
// Scenario: S1 happy path
// Description: A clean two-criterion protocol runs ingest through
//              ordinal_resolve without a single retry and lands in
//              pending_review with grounded, structured criteria.
// ============================================================================

use std::sync::Arc;

use elixir_core::Candidate;
use elixir_core::OmopCandidate;
use elixir_core::OmopMatchStrategy;
use elixir_core::ParsedDocument;
use elixir_core::ParsedPage;
use elixir_core::Protocol;
use elixir_core::ProtocolStatus;
use elixir_core::VocabSystem;
use elixir_pipeline::runner::PipelineConfig;
use elixir_pipeline::runner::PipelineRunner;
use serde_json::json;
use system_tests::fakes::FakeCheckpointStore;
use system_tests::fakes::FakeDocumentFetcher;
use system_tests::fakes::FakeDocumentParser;
use system_tests::fakes::FakeLlmGateway;
use system_tests::fakes::FakeOmopMapper;
use system_tests::fakes::FakeStore;
use system_tests::fakes::FakeTerminologyRouter;

#[tokio::test]
async fn happy_path_protocol_reaches_pending_review_fully_grounded_and_structured() {
    let store = Arc::new(FakeStore::default());
    let checkpoints = Arc::new(FakeCheckpointStore::default());
    let documents = Arc::new(FakeDocumentFetcher::default());
    let parser = Arc::new(FakeDocumentParser::default());
    let terminology = Arc::new(FakeTerminologyRouter::default());
    let omop = Arc::new(FakeOmopMapper::default());
    let llm = Arc::new(FakeLlmGateway::default());

    let protocol = Protocol::new("Phase III Diabetes Trial", "s3://bucket/protocol.pdf");
    let protocol_id = protocol.id;
    elixir_core::ProtocolRepository::insert(store.as_ref(), &protocol).await.expect("insert protocol");

    let bytes = b"protocol bytes".to_vec();
    documents.insert(protocol.file_uri.clone(), bytes.clone());
    parser.insert(
        bytes,
        ParsedDocument {
            pages: vec![ParsedPage {
                page_number: 1,
                blocks: vec!["Age >= 18 years.".to_string(), "Diagnosis of type 2 diabetes mellitus.".to_string()],
                extractable_chars: 60,
                total_chars: 60,
            }],
        },
    );

    llm.push_ok(
        "extraction",
        json!({
            "criteria": [
                {"text": "Age >= 18 years", "type": "inclusion", "assertion": "affirmed", "category": "demographic", "confidence": 0.95, "page_number": 1},
                {"text": "Diagnosis of type 2 diabetes mellitus", "type": "inclusion", "assertion": "affirmed", "category": "condition", "confidence": 0.92, "page_number": 1}
            ]
        }),
    );

    llm.push_ok("entity-extraction", json!({"entities": [{"entity_text": "Age", "entity_type": "demographic", "search_term": "age", "span_start": 0, "span_end": 3}]}));
    llm.push_ok(
        "entity-extraction",
        json!({"entities": [{"entity_text": "type 2 diabetes mellitus", "entity_type": "condition", "search_term": "type 2 diabetes mellitus", "span_start": 12, "span_end": 36}]}),
    );

    terminology.insert(
        "age",
        vec![Candidate { system: VocabSystem::Snomed, code: "424144002".to_string(), preferred_term: "Age".to_string(), score: 0.95 }],
    );
    terminology.insert(
        "type 2 diabetes mellitus",
        vec![Candidate { system: VocabSystem::Snomed, code: "44054006".to_string(), preferred_term: "Type 2 diabetes mellitus".to_string(), score: 0.98 }],
    );

    omop.insert_code(
        "age",
        None,
        OmopCandidate { concept_id: 4_265_453, concept_name: "Age".to_string(), strategy: OmopMatchStrategy::Exact, score: 0.95 },
    );
    omop.insert_code(
        "type 2 diabetes mellitus",
        None,
        OmopCandidate { concept_id: 201_826, concept_name: "Type 2 diabetes mellitus".to_string(), strategy: OmopMatchStrategy::Exact, score: 0.98 },
    );
    omop.insert_unit("years", 9448);

    llm.push_ok(
        "grounding-decision",
        json!({"selected_code": "424144002", "selected_system": "snomed", "concept_id": 4_265_453, "preferred_term": "Age", "confidence": 0.95, "reasoning": "exact match"}),
    );
    llm.push_ok(
        "grounding-decision",
        json!({"selected_code": "44054006", "selected_system": "snomed", "concept_id": 201_826, "preferred_term": "Type 2 diabetes mellitus", "confidence": 0.97, "reasoning": "exact match"}),
    );

    llm.push_ok(
        "structure",
        json!({"operator": "AND", "field_mappings": [{"entity": "Age", "relation": ">=", "value": 18, "unit_text": "years"}]}),
    );
    llm.push_ok("structure", json!({"operator": "AND", "field_mappings": []}));

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

    runner.trigger(protocol_id).await.expect("pipeline run succeeds");

    let finished = elixir_core::ProtocolRepository::get(store.as_ref(), protocol_id).await.expect("load protocol");
    assert_eq!(finished.status, ProtocolStatus::PendingReview);
    assert!(finished.error_reason.is_none());

    let batch = elixir_core::CriteriaBatchRepository::active_for_protocol(store.as_ref(), protocol_id)
        .await
        .expect("load batch")
        .expect("an active batch exists");
    let criteria = elixir_core::CriterionRepository::list_for_batch(store.as_ref(), batch.id).await.expect("load criteria");
    assert_eq!(criteria.len(), 2);

    let age_criterion = criteria.iter().find(|criterion| criterion.text.contains("Age")).expect("age criterion present");
    let mapping = age_criterion.conditions.field_mappings.first().expect("age criterion has a field mapping");
    assert_eq!(mapping.entity, "Age");
    assert_eq!(mapping.unit_concept_id, Some(9448));

    let entities = elixir_core::EntityRepository::list_for_batch(store.as_ref(), batch.id).await.expect("load entities");
    assert_eq!(entities.len(), 2);
    assert!(entities.iter().all(|entity| entity.codes.has_any_code()));
}
