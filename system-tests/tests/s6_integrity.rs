// system-tests/tests/s6_integrity.rs
// ============================================================================
// Scenario: S6 integrity
// Description: A read-only integrity sweep flags an entity whose criterion no
//              longer exists as an error, while a grounded-but-unreviewed
//              sibling batch stays clean.
// ============================================================================

use std::sync::Arc;

use elixir_core::Assertion;
use elixir_core::CriteriaBatch;
use elixir_core::CriteriaBatchRepository;
use elixir_core::Criterion;
use elixir_core::CriterionRepository;
use elixir_core::CriterionType;
use elixir_core::Entity;
use elixir_core::EntityRepository;
use elixir_core::EntityType;
use elixir_core::Protocol;
use elixir_core::ProtocolRepository;
use elixir_integrity::IntegrityChecker;
use elixir_integrity::IntegrityScope;
use system_tests::fakes::FakeStore;

fn checker_over(store: Arc<FakeStore>) -> IntegrityChecker {
    IntegrityChecker::new(store.clone(), store.clone(), store.clone(), store.clone(), store.clone(), store)
}

#[tokio::test]
async fn orphaned_entity_is_reported_as_an_error_and_does_not_touch_other_protocols() {
    let store = Arc::new(FakeStore::default());

    let protocol = Protocol::new("Orphan Trial", "s3://bucket/orphan.pdf");
    ProtocolRepository::insert(store.as_ref(), &protocol).await.expect("insert protocol");
    let batch = CriteriaBatch::new(protocol.id, "gemini", "structured-output-v1");
    CriteriaBatchRepository::insert(store.as_ref(), &batch).await.expect("insert batch");

    let orphan = Entity::new(elixir_core::CriterionId::new(), "orphan mention", EntityType::Condition, 0, 13);
    EntityRepository::insert_many(store.as_ref(), std::slice::from_ref(&orphan)).await.expect("insert orphan entity");

    let other_protocol = Protocol::new("Clean Trial", "s3://bucket/clean.pdf");
    ProtocolRepository::insert(store.as_ref(), &other_protocol).await.expect("insert other protocol");
    let other_batch = CriteriaBatch::new(other_protocol.id, "gemini", "structured-output-v1");
    CriteriaBatchRepository::insert(store.as_ref(), &other_batch).await.expect("insert other batch");
    let clean_criterion = Criterion::new(
        other_batch.id,
        CriterionType::Inclusion,
        "Age >= 18 years",
        Assertion::Affirmed,
        Some("demographic".to_string()),
        0.9,
        Some(1),
    );
    CriterionRepository::insert_many(store.as_ref(), std::slice::from_ref(&clean_criterion)).await.expect("insert clean criterion");
    let consent_entity = Entity::new(clean_criterion.id, "willing to provide consent", EntityType::Consent, 0, 27);
    EntityRepository::insert_many(store.as_ref(), std::slice::from_ref(&consent_entity)).await.expect("insert consent entity");

    let checker = checker_over(store);

    let scoped_report = checker.check(IntegrityScope::Protocol(protocol.id)).await.expect("scoped check succeeds");
    assert_eq!(scoped_report.errors().len(), 1);
    assert!(scoped_report.warnings().is_empty());

    let other_report = checker.check(IntegrityScope::Protocol(other_protocol.id)).await.expect("other protocol check succeeds");
    assert!(other_report.is_clean());

    let full_report = checker.check(IntegrityScope::All).await.expect("full sweep succeeds");
    assert_eq!(full_report.errors().len(), 1);
}
