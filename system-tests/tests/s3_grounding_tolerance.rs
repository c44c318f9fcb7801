// system-tests/tests/s3_grounding_tolerance.rs
// ============================================================================
// Scenario: S3 grounding tolerance
// Description: One entity exhausts the agentic retry loop without ever
//              reaching grounding confidence while its sibling grounds
//              cleanly; the batch still has at least one grounded entity, so
//              the pipeline reaches pending_review instead of failing.
// ============================================================================

use std::sync::Arc;

use elixir_core::Candidate;
use elixir_core::GroundingMethod;
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
async fn one_entity_exhausting_retries_does_not_fail_a_batch_with_other_grounded_entities() {
    let store = Arc::new(FakeStore::default());
    let checkpoints = Arc::new(FakeCheckpointStore::default());
    let documents = Arc::new(FakeDocumentFetcher::default());
    let parser = Arc::new(FakeDocumentParser::default());
    let terminology = Arc::new(FakeTerminologyRouter::default());
    let omop = Arc::new(FakeOmopMapper::default());
    let llm = Arc::new(FakeLlmGateway::default());

    let protocol = Protocol::new("Ambiguous Symptom Trial", "s3://bucket/ambiguous.pdf");
    let protocol_id = protocol.id;
    elixir_core::ProtocolRepository::insert(store.as_ref(), &protocol).await.expect("insert protocol");

    let bytes = b"protocol bytes".to_vec();
    documents.insert(protocol.file_uri.clone(), bytes.clone());
    parser.insert(
        bytes,
        ParsedDocument {
            pages: vec![ParsedPage {
                page_number: 1,
                blocks: vec!["Age >= 18 years.".to_string(), "Presence of a vague symptom complex.".to_string()],
                extractable_chars: 50,
                total_chars: 50,
            }],
        },
    );

    llm.push_ok(
        "extraction",
        json!({
            "criteria": [
                {"text": "Age >= 18 years", "type": "inclusion", "assertion": "affirmed", "category": "demographic", "confidence": 0.95, "page_number": 1},
                {"text": "Presence of a vague symptom complex", "type": "inclusion", "assertion": "affirmed", "category": "condition", "confidence": 0.6, "page_number": 1}
            ]
        }),
    );

    llm.push_ok("entity-extraction", json!({"entities": [{"entity_text": "Age", "entity_type": "demographic", "search_term": "age", "span_start": 0, "span_end": 3}]}));
    llm.push_ok(
        "entity-extraction",
        json!({"entities": [{"entity_text": "vague symptom complex", "entity_type": "condition", "search_term": "vague symptom complex", "span_start": 11, "span_end": 33}]}),
    );

    terminology.insert(
        "age",
        vec![Candidate { system: VocabSystem::Snomed, code: "424144002".to_string(), preferred_term: "Age".to_string(), score: 0.95 }],
    );
    // "vague symptom complex" is never registered: the router legitimately
    // returns zero candidates for it on every attempt.

    omop.insert_code(
        "age",
        None,
        OmopCandidate { concept_id: 4_265_453, concept_name: "Age".to_string(), strategy: OmopMatchStrategy::Exact, score: 0.95 },
    );

    llm.push_ok(
        "grounding-decision",
        json!({"selected_code": "424144002", "selected_system": "snomed", "concept_id": 4_265_453, "preferred_term": "Age", "confidence": 0.95, "reasoning": "exact match"}),
    );
    for _ in 0..3 {
        llm.push_ok(
            "grounding-decision",
            json!({"selected_code": null, "selected_system": null, "concept_id": null, "preferred_term": null, "confidence": 0.1, "reasoning": "no candidate clears confidence"}),
        );
        llm.push_ok("grounding-agentic", json!({"skip": false, "derived_term": null, "rephrased_query": null, "reasoning": "still unresolved, retry as-is"}));
    }

    llm.push_ok("structure", json!({"operator": "AND", "field_mappings": [{"entity": "Age", "relation": ">=", "value": 18, "unit_text": null}]}));
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

    runner.trigger(protocol_id).await.expect("pipeline run tolerates the partial grounding failure");

    let finished = elixir_core::ProtocolRepository::get(store.as_ref(), protocol_id).await.expect("load protocol");
    assert_eq!(finished.status, ProtocolStatus::PendingReview);

    let batch = elixir_core::CriteriaBatchRepository::active_for_protocol(store.as_ref(), protocol_id)
        .await
        .expect("load batch")
        .expect("an active batch exists");
    let entities = elixir_core::EntityRepository::list_for_batch(store.as_ref(), batch.id).await.expect("load entities");
    assert_eq!(entities.len(), 2);

    let age_entity = entities.iter().find(|entity| entity.entity_text == "Age").expect("age entity present");
    assert!(age_entity.codes.has_any_code());

    let symptom_entity = entities.iter().find(|entity| entity.entity_text == "vague symptom complex").expect("symptom entity present");
    assert_eq!(symptom_entity.grounding_method, GroundingMethod::ExpertReview);
    assert!(!symptom_entity.codes.has_any_code());
}
