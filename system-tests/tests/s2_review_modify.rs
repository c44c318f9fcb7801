// system-tests/tests/s2_review_modify.rs
// ============================================================================
// Scenario: S2 review modify
// Description: A reviewer submits a multi-mapping structured modify against
//              one of two pending criteria; the audit entry records
//              v1.5-multi and the batch transitions to in_progress since the
//              sibling criterion remains unreviewed.
// ============================================================================

use std::sync::Arc;

use elixir_core::Assertion;
use elixir_core::AuditLogRepository;
use elixir_core::BatchReviewStatus;
use elixir_core::CriteriaBatch;
use elixir_core::CriteriaBatchRepository;
use elixir_core::Criterion;
use elixir_core::CriterionRepository;
use elixir_core::CriterionReviewStatus;
use elixir_core::CriterionType;
use elixir_core::FieldMapping;
use elixir_core::ReviewAction;
use elixir_core::ReviewerId;
use elixir_review::action::ReviewActionRequest;
use elixir_review::action::ReviewService;
use system_tests::fakes::FakeStore;

#[tokio::test]
async fn multi_mapping_modify_records_v15_multi_and_leaves_batch_in_progress() {
    let store = Arc::new(FakeStore::default());
    let batch = CriteriaBatch::new(elixir_core::ProtocolId::new(), "gemini", "structured-output-v1");
    CriteriaBatchRepository::insert(store.as_ref(), &batch).await.expect("insert batch");

    let criterion_a = Criterion::new(batch.id, CriterionType::Inclusion, "Age >= 18 years", Assertion::Affirmed, Some("demographic".to_string()), 0.9, Some(1));
    let criterion_b = Criterion::new(batch.id, CriterionType::Inclusion, "HbA1c between 7% and 10%", Assertion::Affirmed, Some("measurement".to_string()), 0.9, Some(1));
    CriterionRepository::insert_many(store.as_ref(), &[criterion_a.clone(), criterion_b.clone()]).await.expect("insert criteria");

    let service = ReviewService { criteria: store.clone(), entities: store.clone(), batches: store.clone(), transaction: store.clone() };

    let request = ReviewActionRequest {
        reviewer_id: ReviewerId::new(),
        action: ReviewAction::Modify,
        comment: Some("split into two explicit bounds".to_string()),
        modified_text: None,
        modified_structured_fields: Some(vec![
            FieldMapping::unpopulated("HbA1c", None),
            FieldMapping::unpopulated("HbA1c upper bound", None),
        ]),
    };

    service.apply_action(criterion_b.id, &request).await.expect("apply modify action");

    let updated = CriterionRepository::get(store.as_ref(), criterion_b.id).await.expect("load modified criterion");
    assert_eq!(updated.review_status, CriterionReviewStatus::Modified);

    let audit_entries = AuditLogRepository::list_for_target(store.as_ref(), &criterion_b.id.to_string()).await.expect("load audit entries");
    let entry = audit_entries.last().expect("an audit entry was written");
    assert_eq!(entry.details.schema_version, Some(elixir_core::SchemaVersion::V15Multi));

    let updated_batch = CriteriaBatchRepository::get(store.as_ref(), batch.id).await.expect("load batch");
    assert_eq!(updated_batch.review_status, BatchReviewStatus::InProgress);
}
