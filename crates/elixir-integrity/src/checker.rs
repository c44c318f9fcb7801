// crates/elixir-integrity/src/checker.rs
// ============================================================================
// Module: IntegrityChecker
// Description: Read-only invariant audit over entities, reviews, and audit
//              logs, scoped to one protocol or the whole system.
// Purpose: Implement spec.md §4.9's four issue categories — orphaned
//          entities, incomplete audit logs, ungrounded entities, and reviews
//          without an audit trail — as a single non-mutating call.
// Dependencies: async-trait, elixir_core, time
// ============================================================================

//! ## Overview
//! Every check here reads through `elixir_core::interfaces::repository`
//! traits, never a concrete store. Scoping to an empty protocol (no active
//! batch) short-circuits before any entity, review, or audit-log query runs,
//! per spec.md §4.9: "empty scope yields empty result without executing
//! downstream queries."

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::sync::Arc;

use elixir_core::AuditEventType;
use elixir_core::AuditLogRepository;
use elixir_core::CriteriaBatch;
use elixir_core::CriteriaBatchRepository;
use elixir_core::CriterionRepository;
use elixir_core::EntityRepository;
use elixir_core::EntityType;
use elixir_core::IntegrityError;
use elixir_core::IntegritySeverity;
use elixir_core::ProtocolId;
use elixir_core::ProtocolRepository;
use elixir_core::RepositoryError;
use elixir_core::ReviewRepository;

/// One second, the tolerance window spec.md §4.9 specifies for the
/// `(target_type, target_id, created_at ± 1s)` review/audit-log join.
const AUDIT_PAIRING_WINDOW: time::Duration = time::Duration::seconds(1);

/// A page size large enough to enumerate every protocol in one round trip
/// for small/medium deployments; `check` pages further if more exist.
const PROTOCOL_PAGE_SIZE: u32 = 500;

// ============================================================================
// SECTION: Scope
// ============================================================================

/// What `IntegrityChecker::check` audits.
#[derive(Debug, Clone, Copy)]
pub enum IntegrityScope {
    /// Every protocol's active (non-archived) batch.
    All,
    /// One protocol's active batch only.
    Protocol(ProtocolId),
}

// ============================================================================
// SECTION: Report
// ============================================================================

/// The result of one integrity audit run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IntegrityReport {
    /// Every issue found, in the order its check ran.
    pub issues: Vec<IntegrityError>,
}

impl IntegrityReport {
    /// Issues at [`IntegritySeverity::Error`] severity.
    #[must_use]
    pub fn errors(&self) -> Vec<&IntegrityError> {
        self.issues.iter().filter(|issue| issue.severity == IntegritySeverity::Error).collect()
    }

    /// Issues at [`IntegritySeverity::Warning`] severity.
    #[must_use]
    pub fn warnings(&self) -> Vec<&IntegrityError> {
        self.issues.iter().filter(|issue| issue.severity == IntegritySeverity::Warning).collect()
    }

    /// Whether the run found nothing to flag.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }

    fn push(&mut self, severity: IntegritySeverity, message: impl Into<String>) {
        self.issues.push(IntegrityError { severity, message: message.into() });
    }
}

// ============================================================================
// SECTION: IntegrityChecker
// ============================================================================

/// Read-only invariant audit over the protocol/batch/criterion/entity graph
/// (spec.md §4.9).
pub struct IntegrityChecker {
    protocols: Arc<dyn ProtocolRepository>,
    batches: Arc<dyn CriteriaBatchRepository>,
    criteria: Arc<dyn CriterionRepository>,
    entities: Arc<dyn EntityRepository>,
    reviews: Arc<dyn ReviewRepository>,
    audit_logs: Arc<dyn AuditLogRepository>,
}

impl IntegrityChecker {
    /// Builds a checker from its repository collaborators.
    #[must_use]
    pub const fn new(
        protocols: Arc<dyn ProtocolRepository>,
        batches: Arc<dyn CriteriaBatchRepository>,
        criteria: Arc<dyn CriterionRepository>,
        entities: Arc<dyn EntityRepository>,
        reviews: Arc<dyn ReviewRepository>,
        audit_logs: Arc<dyn AuditLogRepository>,
    ) -> Self {
        Self { protocols, batches, criteria, entities, reviews, audit_logs }
    }

    /// Runs every check in spec.md §4.9 over the requested scope.
    ///
    /// # Errors
    /// Returns [`RepositoryError`] if any underlying read fails. Invariant
    /// violations themselves are never errors here — they are collected into
    /// the returned [`IntegrityReport`].
    pub async fn check(&self, scope: IntegrityScope) -> Result<IntegrityReport, RepositoryError> {
        let batches = self.resolve_batches(scope).await?;
        let mut report = IntegrityReport::default();
        if batches.is_empty() {
            return Ok(report);
        }

        for batch in &batches {
            self.check_batch(batch, &mut report).await?;
        }
        Ok(report)
    }

    /// Resolves the set of active batches a scope covers, without touching
    /// criteria, entities, reviews, or audit logs yet.
    async fn resolve_batches(&self, scope: IntegrityScope) -> Result<Vec<CriteriaBatch>, RepositoryError> {
        match scope {
            IntegrityScope::Protocol(protocol_id) => {
                Ok(self.batches.active_for_protocol(protocol_id).await?.into_iter().collect())
            }
            IntegrityScope::All => {
                let mut batches = Vec::new();
                let mut offset = 0;
                loop {
                    let page = self.protocols.list(PROTOCOL_PAGE_SIZE, offset).await?;
                    let page_len = page.len();
                    for protocol in page {
                        if let Some(batch) = self.batches.active_for_protocol(protocol.id).await? {
                            batches.push(batch);
                        }
                    }
                    if u32::try_from(page_len).unwrap_or(0) < PROTOCOL_PAGE_SIZE {
                        break;
                    }
                    offset += PROTOCOL_PAGE_SIZE;
                }
                Ok(batches)
            }
        }
    }

    /// Runs the four §4.9 checks against one batch's criteria and entities.
    async fn check_batch(&self, batch: &CriteriaBatch, report: &mut IntegrityReport) -> Result<(), RepositoryError> {
        let criteria = self.criteria.list_for_batch(batch.id).await?;
        let criterion_ids: BTreeSet<_> = criteria.iter().map(|criterion| criterion.id).collect();
        let entities = self.entities.list_for_batch(batch.id).await?;

        // 1. Orphaned entities (error): criterion_id has no matching Criterion.
        for entity in &entities {
            if !criterion_ids.contains(&entity.criterion_id) {
                report.push(
                    IntegritySeverity::Error,
                    format!("entity {} references nonexistent criterion {}", entity.id, entity.criterion_id),
                );
            }
        }

        // 3. Ungrounded entities (warning): non-consent, no codes, not expert_review.
        for entity in &entities {
            let ungrounded =
                entity.entity_type != EntityType::Consent && !entity.codes.has_any_code() && entity.grounding_method != elixir_core::GroundingMethod::ExpertReview;
            if ungrounded {
                report.push(
                    IntegritySeverity::Warning,
                    format!("entity {} ({:?}) has no vocabulary code and is not flagged for expert review", entity.id, entity.entity_type),
                );
            }
        }

        for criterion in &criteria {
            let target_id = criterion.id.to_string();
            let reviews = self.reviews.list_for_target(&target_id).await?;
            let audit_entries = self.audit_logs.list_for_target(&target_id).await?;

            // 2. Incomplete audit logs (warning): a Review with no matching AuditLog.
            for review in &reviews {
                let has_match = audit_entries.iter().any(|entry| entry.within_window(review.created_at, AUDIT_PAIRING_WINDOW));
                if !has_match {
                    report.push(
                        IntegritySeverity::Warning,
                        format!("review {} on criterion {target_id} has no matching audit log entry", review.id),
                    );
                }
            }

            // 4. Reviews without audit trail (warning): inverse join — a
            // review-originated AuditLog with no matching Review.
            for entry in audit_entries.iter().filter(|entry| entry.event_type == AuditEventType::ReviewApplied) {
                let has_match = reviews.iter().any(|review| entry.within_window(review.created_at, AUDIT_PAIRING_WINDOW));
                if !has_match {
                    report.push(
                        IntegritySeverity::Warning,
                        format!("audit log {} on criterion {target_id} has no matching review row", entry.id),
                    );
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use elixir_core::AuditDetails;
    use elixir_core::AuditLog;
    use elixir_core::Criterion;
    use elixir_core::CriterionType;
    use elixir_core::Entity;
    use elixir_core::Review;
    use elixir_core::ReviewAction;
    use elixir_core::ReviewTargetType;
    use elixir_core::ReviewerId;

    use super::*;

    #[derive(Default)]
    struct FakeStore {
        protocols: Mutex<Vec<elixir_core::Protocol>>,
        batches: Mutex<Vec<CriteriaBatch>>,
        criteria: Mutex<Vec<Criterion>>,
        entities: Mutex<Vec<Entity>>,
        reviews: Mutex<Vec<Review>>,
        audit_logs: Mutex<Vec<AuditLog>>,
    }

    #[async_trait]
    impl ProtocolRepository for FakeStore {
        async fn insert(&self, protocol: &elixir_core::Protocol) -> Result<(), RepositoryError> {
            self.protocols.lock().unwrap_or_else(std::sync::PoisonError::into_inner).push(protocol.clone());
            Ok(())
        }
        async fn get(&self, id: ProtocolId) -> Result<elixir_core::Protocol, RepositoryError> {
            self.protocols
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .iter()
                .find(|protocol| protocol.id == id)
                .cloned()
                .ok_or_else(|| RepositoryError::NotFound { kind: "protocol", id: id.to_string() })
        }
        async fn update(&self, _protocol: &elixir_core::Protocol) -> Result<(), RepositoryError> {
            Ok(())
        }
        async fn list(&self, limit: u32, offset: u32) -> Result<Vec<elixir_core::Protocol>, RepositoryError> {
            let protocols = self.protocols.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            Ok(protocols.iter().skip(offset as usize).take(limit as usize).cloned().collect())
        }
    }

    #[async_trait]
    impl CriteriaBatchRepository for FakeStore {
        async fn insert(&self, batch: &CriteriaBatch) -> Result<(), RepositoryError> {
            self.batches.lock().unwrap_or_else(std::sync::PoisonError::into_inner).push(batch.clone());
            Ok(())
        }
        async fn get(&self, id: elixir_core::CriteriaBatchId) -> Result<CriteriaBatch, RepositoryError> {
            self.batches
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .iter()
                .find(|batch| batch.id == id)
                .cloned()
                .ok_or_else(|| RepositoryError::NotFound { kind: "batch", id: id.to_string() })
        }
        async fn active_for_protocol(&self, protocol_id: ProtocolId) -> Result<Option<CriteriaBatch>, RepositoryError> {
            Ok(self
                .batches
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .iter()
                .find(|batch| batch.protocol_id == protocol_id && !batch.is_archived)
                .cloned())
        }
        async fn update(&self, _batch: &CriteriaBatch) -> Result<(), RepositoryError> {
            Ok(())
        }
        async fn archive_all_for_protocol(&self, _protocol_id: ProtocolId) -> Result<(), RepositoryError> {
            Ok(())
        }
        async fn list_for_protocol(&self, protocol_id: ProtocolId) -> Result<Vec<CriteriaBatch>, RepositoryError> {
            Ok(self
                .batches
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .iter()
                .filter(|batch| batch.protocol_id == protocol_id)
                .cloned()
                .collect())
        }
    }

    #[async_trait]
    impl CriterionRepository for FakeStore {
        async fn insert_many(&self, criteria: &[Criterion]) -> Result<(), RepositoryError> {
            self.criteria.lock().unwrap_or_else(std::sync::PoisonError::into_inner).extend_from_slice(criteria);
            Ok(())
        }
        async fn get(&self, id: elixir_core::CriterionId) -> Result<Criterion, RepositoryError> {
            self.criteria
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .iter()
                .find(|criterion| criterion.id == id)
                .cloned()
                .ok_or_else(|| RepositoryError::NotFound { kind: "criterion", id: id.to_string() })
        }
        async fn list_for_batch(&self, batch_id: elixir_core::CriteriaBatchId) -> Result<Vec<Criterion>, RepositoryError> {
            Ok(self
                .criteria
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .iter()
                .filter(|criterion| criterion.batch_id == batch_id)
                .cloned()
                .collect())
        }
        async fn update(&self, _criterion: &Criterion) -> Result<(), RepositoryError> {
            Ok(())
        }
        async fn put_tree(&self, _criterion_id: elixir_core::CriterionId, _tree: &elixir_core::ExpressionTree) -> Result<(), RepositoryError> {
            Ok(())
        }
        async fn get_tree(&self, _criterion_id: elixir_core::CriterionId) -> Result<Option<elixir_core::ExpressionTree>, RepositoryError> {
            Ok(None)
        }
    }

    #[async_trait]
    impl EntityRepository for FakeStore {
        async fn insert_many(&self, entities: &[Entity]) -> Result<(), RepositoryError> {
            self.entities.lock().unwrap_or_else(std::sync::PoisonError::into_inner).extend_from_slice(entities);
            Ok(())
        }
        async fn get(&self, id: elixir_core::EntityId) -> Result<Entity, RepositoryError> {
            self.entities
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .iter()
                .find(|entity| entity.id == id)
                .cloned()
                .ok_or_else(|| RepositoryError::NotFound { kind: "entity", id: id.to_string() })
        }
        async fn list_for_criterion(&self, criterion_id: elixir_core::CriterionId) -> Result<Vec<Entity>, RepositoryError> {
            Ok(self
                .entities
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .iter()
                .filter(|entity| entity.criterion_id == criterion_id)
                .cloned()
                .collect())
        }
        async fn list_for_batch(&self, batch_id: elixir_core::CriteriaBatchId) -> Result<Vec<Entity>, RepositoryError> {
            let criterion_ids: BTreeSet<_> = self
                .criteria
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .iter()
                .filter(|criterion| criterion.batch_id == batch_id)
                .map(|criterion| criterion.id)
                .collect();
            Ok(self
                .entities
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .iter()
                .filter(|entity| criterion_ids.contains(&entity.criterion_id))
                .cloned()
                .collect())
        }
        async fn update(&self, _entity: &Entity) -> Result<(), RepositoryError> {
            Ok(())
        }
    }

    #[async_trait]
    impl ReviewRepository for FakeStore {
        async fn insert(&self, review: &Review) -> Result<(), RepositoryError> {
            self.reviews.lock().unwrap_or_else(std::sync::PoisonError::into_inner).push(review.clone());
            Ok(())
        }
        async fn list_for_target(&self, target_id: &str) -> Result<Vec<Review>, RepositoryError> {
            Ok(self
                .reviews
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .iter()
                .filter(|review| review.target_id == target_id)
                .cloned()
                .collect())
        }
    }

    #[async_trait]
    impl AuditLogRepository for FakeStore {
        async fn insert(&self, entry: &AuditLog) -> Result<(), RepositoryError> {
            self.audit_logs.lock().unwrap_or_else(std::sync::PoisonError::into_inner).push(entry.clone());
            Ok(())
        }
        async fn get(&self, id: elixir_core::AuditLogId) -> Result<AuditLog, RepositoryError> {
            self.audit_logs
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .iter()
                .find(|entry| entry.id == id)
                .cloned()
                .ok_or_else(|| RepositoryError::NotFound { kind: "audit_log", id: id.to_string() })
        }
        async fn list_for_target(&self, target_id: &str) -> Result<Vec<AuditLog>, RepositoryError> {
            Ok(self
                .audit_logs
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .iter()
                .filter(|entry| entry.target_id == target_id)
                .cloned()
                .collect())
        }
        async fn list_recent(&self, limit: u32) -> Result<Vec<AuditLog>, RepositoryError> {
            Ok(self.audit_logs.lock().unwrap_or_else(std::sync::PoisonError::into_inner).iter().take(limit as usize).cloned().collect())
        }
    }

    fn checker_over(store: Arc<FakeStore>) -> IntegrityChecker {
        IntegrityChecker::new(store.clone(), store.clone(), store.clone(), store.clone(), store.clone(), store)
    }

    #[tokio::test]
    async fn empty_scope_returns_empty_report_without_error() {
        let store = Arc::new(FakeStore::default());
        let checker = checker_over(store);
        let report = checker.check(IntegrityScope::Protocol(ProtocolId::new())).await.expect("check succeeds");
        assert!(report.is_clean());
    }

    #[tokio::test]
    async fn orphaned_entity_is_reported_as_an_error() {
        let store = Arc::new(FakeStore::default());
        let protocol = elixir_core::Protocol::new("t", "uri://doc");
        let batch = CriteriaBatch::new(protocol.id, "gemini", "1.0");
        let orphan = Entity::new(elixir_core::CriterionId::new(), "orphan mention", EntityType::Condition, 0, 5);
        store.protocols.lock().unwrap_or_else(std::sync::PoisonError::into_inner).push(protocol.clone());
        store.batches.lock().unwrap_or_else(std::sync::PoisonError::into_inner).push(batch.clone());
        store.entities.lock().unwrap_or_else(std::sync::PoisonError::into_inner).push(orphan);

        let checker = checker_over(store);
        let report = checker.check(IntegrityScope::Protocol(protocol.id)).await.expect("check succeeds");
        assert_eq!(report.errors().len(), 1);
        assert!(report.warnings().is_empty());
    }

    #[tokio::test]
    async fn ungrounded_non_consent_entity_is_reported_as_a_warning() {
        let store = Arc::new(FakeStore::default());
        let protocol = elixir_core::Protocol::new("t", "uri://doc");
        let batch = CriteriaBatch::new(protocol.id, "gemini", "1.0");
        let criterion =
            Criterion::new(batch.id, CriterionType::Inclusion, "History of diabetes", elixir_core::Assertion::Affirmed, None, 0.9, Some(1));
        let entity = Entity::new(criterion.id, "diabetes", EntityType::Condition, 0, 8);
        store.protocols.lock().unwrap_or_else(std::sync::PoisonError::into_inner).push(protocol.clone());
        store.batches.lock().unwrap_or_else(std::sync::PoisonError::into_inner).push(batch.clone());
        store.criteria.lock().unwrap_or_else(std::sync::PoisonError::into_inner).push(criterion);
        store.entities.lock().unwrap_or_else(std::sync::PoisonError::into_inner).push(entity);

        let checker = checker_over(store);
        let report = checker.check(IntegrityScope::Protocol(protocol.id)).await.expect("check succeeds");
        assert_eq!(report.warnings().len(), 1);
        assert!(report.errors().is_empty());
    }

    #[tokio::test]
    async fn review_without_matching_audit_log_is_a_warning() {
        let store = Arc::new(FakeStore::default());
        let protocol = elixir_core::Protocol::new("t", "uri://doc");
        let batch = CriteriaBatch::new(protocol.id, "gemini", "1.0");
        let criterion =
            Criterion::new(batch.id, CriterionType::Inclusion, "Age >= 18", elixir_core::Assertion::Affirmed, None, 0.9, Some(1));
        let review = Review::new(
            ReviewTargetType::Criteria,
            criterion.id.to_string(),
            ReviewerId::new(),
            ReviewAction::Approve,
            serde_json::json!({}),
            serde_json::json!({}),
            None,
        );
        store.protocols.lock().unwrap_or_else(std::sync::PoisonError::into_inner).push(protocol.clone());
        store.batches.lock().unwrap_or_else(std::sync::PoisonError::into_inner).push(batch.clone());
        store.criteria.lock().unwrap_or_else(std::sync::PoisonError::into_inner).push(criterion);
        store.reviews.lock().unwrap_or_else(std::sync::PoisonError::into_inner).push(review);

        let checker = checker_over(store);
        let report = checker.check(IntegrityScope::Protocol(protocol.id)).await.expect("check succeeds");
        assert_eq!(report.warnings().len(), 1);
    }

    #[tokio::test]
    async fn paired_review_and_audit_log_raise_no_issue() {
        let store = Arc::new(FakeStore::default());
        let protocol = elixir_core::Protocol::new("t", "uri://doc");
        let batch = CriteriaBatch::new(protocol.id, "gemini", "1.0");
        let criterion =
            Criterion::new(batch.id, CriterionType::Inclusion, "Age >= 18", elixir_core::Assertion::Affirmed, None, 0.9, Some(1));
        let review = Review::new(
            ReviewTargetType::Criteria,
            criterion.id.to_string(),
            ReviewerId::new(),
            ReviewAction::Approve,
            serde_json::json!({}),
            serde_json::json!({}),
            None,
        );
        let mut log = AuditLog::new(
            AuditEventType::ReviewApplied,
            Some(review.reviewer_id),
            ReviewTargetType::Criteria,
            criterion.id.to_string(),
            AuditDetails::default(),
        );
        log.created_at = review.created_at;
        store.protocols.lock().unwrap_or_else(std::sync::PoisonError::into_inner).push(protocol.clone());
        store.batches.lock().unwrap_or_else(std::sync::PoisonError::into_inner).push(batch.clone());
        store.criteria.lock().unwrap_or_else(std::sync::PoisonError::into_inner).push(criterion);
        store.reviews.lock().unwrap_or_else(std::sync::PoisonError::into_inner).push(review);
        store.audit_logs.lock().unwrap_or_else(std::sync::PoisonError::into_inner).push(log);

        let checker = checker_over(store);
        let report = checker.check(IntegrityScope::Protocol(protocol.id)).await.expect("check succeeds");
        assert!(report.is_clean());
    }
}
