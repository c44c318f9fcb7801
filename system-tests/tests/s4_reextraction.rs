// system-tests/tests/s4_reextraction.rs
// ============================================================================
// Scenario: S4 re-extraction
// Description: Triggering a re-extraction archives the active batch and
//              republishes the protocol into the outbox; once a replacement
//              batch exists, review inheritance carries over exact and
//              near-exact matches by fuzzy text similarity, and
//              batch-compare classifies every criterion pair correctly.
// ============================================================================

use std::sync::Arc;

use elixir_core::Assertion;
use elixir_core::CriteriaBatch;
use elixir_core::CriteriaBatchRepository;
use elixir_core::Criterion;
use elixir_core::CriterionRepository;
use elixir_core::CriterionReviewStatus;
use elixir_core::CriterionType;
use elixir_core::OutboxEventType;
use elixir_core::Protocol;
use elixir_core::ProtocolRepository;
use elixir_core::ProtocolStatus;
use elixir_core::ReviewRepository;
use elixir_review::compare_batches;
use elixir_review::DiffKind;
use elixir_review::ReextractionService;
use system_tests::fakes::FakeCheckpointStore;
use system_tests::fakes::FakeOutboxStore;
use system_tests::fakes::FakeStore;

fn criterion(batch_id: elixir_core::CriteriaBatchId, text: &str, criterion_type: CriterionType) -> Criterion {
    Criterion::new(batch_id, criterion_type, text, Assertion::Affirmed, None, 0.9, Some(1))
}

#[tokio::test]
async fn trigger_archives_the_active_batch_and_republishes_the_protocol() {
    let store = Arc::new(FakeStore::default());
    let checkpoints = Arc::new(FakeCheckpointStore::default());
    let outbox = Arc::new(FakeOutboxStore::default());

    let protocol = Protocol::new("Trial", "s3://bucket/protocol.pdf");
    let protocol_id = protocol.id;
    ProtocolRepository::insert(store.as_ref(), &protocol).await.expect("insert protocol");

    let batch = CriteriaBatch::new(protocol_id, "gemini", "structured-output-v1");
    CriteriaBatchRepository::insert(store.as_ref(), &batch).await.expect("insert batch");

    let service = ReextractionService {
        protocols: store.clone(),
        batches: store.clone(),
        criteria: store.clone(),
        reviews: store.clone(),
        audit_logs: store.clone(),
        checkpoints: checkpoints.clone(),
        outbox: outbox.clone(),
    };

    service.trigger_reextraction(protocol_id, "operator requested a re-run after a document fix").await.expect("trigger re-extraction");

    let updated_batch = CriteriaBatchRepository::get(store.as_ref(), batch.id).await.expect("load batch");
    assert!(updated_batch.is_archived);

    let updated_protocol = ProtocolRepository::get(store.as_ref(), protocol_id).await.expect("load protocol");
    assert_eq!(updated_protocol.status, ProtocolStatus::Uploaded);

    let published = outbox.published();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].event_type, OutboxEventType::ReextractionRequested);
}

#[tokio::test]
async fn review_inheritance_copies_status_for_near_exact_matches_only() {
    let store = Arc::new(FakeStore::default());
    let checkpoints = Arc::new(FakeCheckpointStore::default());
    let outbox = Arc::new(FakeOutboxStore::default());

    let archived_batch = CriteriaBatch::new(elixir_core::ProtocolId::new(), "gemini", "structured-output-v1");
    let new_batch = CriteriaBatch::new(archived_batch.protocol_id, "gemini", "structured-output-v1");

    let mut exact = criterion(archived_batch.id, "Age >= 18 years", CriterionType::Inclusion);
    exact.review_status = CriterionReviewStatus::Approved;
    let mut rewritten = criterion(archived_batch.id, "No prior history of myocardial infarction", CriterionType::Exclusion);
    rewritten.review_status = CriterionReviewStatus::Approved;

    CriterionRepository::insert_many(store.as_ref(), &[exact.clone(), rewritten.clone()]).await.expect("insert archived criteria");

    let new_exact = criterion(new_batch.id, "Age >= 18 years", CriterionType::Inclusion);
    let new_unrelated = criterion(new_batch.id, "Completed at least one prior line of systemic therapy", CriterionType::Inclusion);
    CriterionRepository::insert_many(store.as_ref(), &[new_exact.clone(), new_unrelated.clone()]).await.expect("insert new criteria");

    let service = ReextractionService {
        protocols: store.clone(),
        batches: store.clone(),
        criteria: store.clone(),
        reviews: store.clone(),
        audit_logs: store.clone(),
        checkpoints,
        outbox,
    };

    let inherited = service.inherit_reviews(archived_batch.id, new_batch.id).await.expect("inherit reviews");
    assert_eq!(inherited, 1);

    let inherited_criterion = CriterionRepository::get(store.as_ref(), new_exact.id).await.expect("load inherited criterion");
    assert_eq!(inherited_criterion.review_status, CriterionReviewStatus::Approved);

    let untouched_criterion = CriterionRepository::get(store.as_ref(), new_unrelated.id).await.expect("load unmatched criterion");
    assert_eq!(untouched_criterion.review_status, CriterionReviewStatus::Unreviewed);

    let audit_entries = elixir_core::AuditLogRepository::list_for_target(store.as_ref(), &new_exact.id.to_string()).await.expect("load audit entries");
    assert_eq!(audit_entries.len(), 1);
}

#[test]
fn batch_compare_classifies_unchanged_changed_removed_and_added() {
    let old_batch_id = elixir_core::CriteriaBatchId::new();
    let new_batch_id = elixir_core::CriteriaBatchId::new();

    let unchanged_old = criterion(old_batch_id, "Age >= 18 years", CriterionType::Inclusion);
    let unchanged_new = criterion(new_batch_id, "Age >= 18 years", CriterionType::Inclusion);

    let changed_old = criterion(old_batch_id, "HbA1c between 7 and 10 percent", CriterionType::Inclusion);
    let changed_new = criterion(new_batch_id, "Hemoglobin A1c level measured between 7% and 10%", CriterionType::Inclusion);

    let removed_only = criterion(old_batch_id, "Prior enrollment in a competing trial", CriterionType::Exclusion);
    let added_only = criterion(new_batch_id, "Life expectancy of at least six months", CriterionType::Inclusion);

    let old = vec![unchanged_old.clone(), changed_old.clone(), removed_only.clone()];
    let new = vec![unchanged_new.clone(), changed_new.clone(), added_only.clone()];

    let entries = compare_batches(&old, &new);

    let unchanged = entries.iter().find(|entry| entry.old_criterion_id == Some(unchanged_old.id)).expect("unchanged pair present");
    assert_eq!(unchanged.kind, DiffKind::Unchanged);

    let changed = entries.iter().find(|entry| entry.old_criterion_id == Some(changed_old.id)).expect("reworded pair still matches by fuzzy text similarity");
    assert_ne!(changed.kind, DiffKind::Removed);
    assert!(changed.score.is_some());

    let removed = entries.iter().find(|entry| entry.old_criterion_id == Some(removed_only.id)).expect("removed entry present");
    assert_eq!(removed.kind, DiffKind::Removed);
    assert!(removed.new_criterion_id.is_none());

    let added = entries.iter().find(|entry| entry.new_criterion_id == Some(added_only.id)).expect("added entry present");
    assert_eq!(added.kind, DiffKind::Added);
    assert!(added.old_criterion_id.is_none());
}
