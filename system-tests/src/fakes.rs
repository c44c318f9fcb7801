// system-tests/src/fakes.rs
// ============================================================================
// Module: In-Memory Fakes
// Description: Scripted, in-memory implementations of every repository and
//              collaborator trait the pipeline/review/integrity crates
//              depend on.
// Purpose: Let scenario tests assemble a `PipelineRunner`, `ReviewService`,
//          `ReextractionService`, and `IntegrityChecker` without a database,
//          LLM provider, or vocabulary/OMOP service.
// Dependencies: async-trait, elixir_core
// ============================================================================

//! ## Overview
//! [`FakeStore`] mirrors the in-memory repository fake already proven out in
//! `elixir-integrity::checker`'s own test module: one `Mutex<Vec<T>>` field
//! per aggregate, implementing all six repository traits so a single
//! `Arc<FakeStore>` can back every collaborator slot that wants a repository.
//! The LLM/terminology/OMOP/document/checkpoint/outbox fakes are scripted:
//! a test pushes the exact response each call should see, in call order per
//! logical key, so scenario tests assert pipeline behavior without a real
//! upstream.

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use elixir_core::AuditLog;
use elixir_core::AuditLogId;
use elixir_core::AuditLogRepository;
use elixir_core::Candidate;
use elixir_core::CheckpointError;
use elixir_core::CheckpointStore;
use elixir_core::CompletionRequest;
use elixir_core::CompletionResponse;
use elixir_core::Criterion;
use elixir_core::CriteriaBatch;
use elixir_core::CriteriaBatchId;
use elixir_core::CriteriaBatchRepository;
use elixir_core::CriterionId;
use elixir_core::CriterionRepository;
use elixir_core::DocumentError;
use elixir_core::DocumentFetcher;
use elixir_core::DocumentParser;
use elixir_core::DomainHint;
use elixir_core::Entity;
use elixir_core::EntityId;
use elixir_core::EntityRepository;
use elixir_core::EntityType;
use elixir_core::ExpressionTree;
use elixir_core::LlmError;
use elixir_core::LlmGateway;
use elixir_core::OmopCandidate;
use elixir_core::OmopError;
use elixir_core::OmopMapper;
use elixir_core::OutboxError;
use elixir_core::OutboxEvent;
use elixir_core::OutboxEventId;
use elixir_core::OutboxStatus;
use elixir_core::OutboxStore;
use elixir_core::ParsedDocument;
use elixir_core::PipelineCheckpoint;
use elixir_core::Protocol;
use elixir_core::ProtocolId;
use elixir_core::ProtocolRepository;
use elixir_core::RepositoryError;
use elixir_core::Review;
use elixir_core::ReviewRepository;
use elixir_core::ReviewTransaction;
use elixir_core::TerminologyError;
use elixir_core::TerminologyRouter;

use serde_json::Value as JsonValue;

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

// ============================================================================
// SECTION: FakeStore (all six repository traits)
// ============================================================================

/// In-memory backing store for every repository trait, shared across a
/// scenario test via `Arc<FakeStore>`.
#[derive(Default)]
pub struct FakeStore {
    pub protocols: Mutex<Vec<Protocol>>,
    pub batches: Mutex<Vec<CriteriaBatch>>,
    pub criteria: Mutex<Vec<Criterion>>,
    pub entities: Mutex<Vec<Entity>>,
    pub reviews: Mutex<Vec<Review>>,
    pub audit_logs: Mutex<Vec<AuditLog>>,
    pub trees: Mutex<HashMap<CriterionId, ExpressionTree>>,
}

#[async_trait]
impl ProtocolRepository for FakeStore {
    async fn insert(&self, protocol: &Protocol) -> Result<(), RepositoryError> {
        lock(&self.protocols).push(protocol.clone());
        Ok(())
    }
    async fn get(&self, id: ProtocolId) -> Result<Protocol, RepositoryError> {
        lock(&self.protocols).iter().find(|protocol| protocol.id == id).cloned().ok_or_else(|| RepositoryError::NotFound { kind: "protocol", id: id.to_string() })
    }
    async fn update(&self, protocol: &Protocol) -> Result<(), RepositoryError> {
        let mut protocols = lock(&self.protocols);
        match protocols.iter_mut().find(|existing| existing.id == protocol.id) {
            Some(existing) => *existing = protocol.clone(),
            None => protocols.push(protocol.clone()),
        }
        Ok(())
    }
    async fn list(&self, limit: u32, offset: u32) -> Result<Vec<Protocol>, RepositoryError> {
        Ok(lock(&self.protocols).iter().skip(offset as usize).take(limit as usize).cloned().collect())
    }
}

#[async_trait]
impl CriteriaBatchRepository for FakeStore {
    async fn insert(&self, batch: &CriteriaBatch) -> Result<(), RepositoryError> {
        lock(&self.batches).push(batch.clone());
        Ok(())
    }
    async fn get(&self, id: CriteriaBatchId) -> Result<CriteriaBatch, RepositoryError> {
        lock(&self.batches).iter().find(|batch| batch.id == id).cloned().ok_or_else(|| RepositoryError::NotFound { kind: "batch", id: id.to_string() })
    }
    async fn active_for_protocol(&self, protocol_id: ProtocolId) -> Result<Option<CriteriaBatch>, RepositoryError> {
        Ok(lock(&self.batches).iter().find(|batch| batch.protocol_id == protocol_id && !batch.is_archived).cloned())
    }
    async fn update(&self, batch: &CriteriaBatch) -> Result<(), RepositoryError> {
        let mut batches = lock(&self.batches);
        match batches.iter_mut().find(|existing| existing.id == batch.id) {
            Some(existing) => *existing = batch.clone(),
            None => batches.push(batch.clone()),
        }
        Ok(())
    }
    async fn archive_all_for_protocol(&self, protocol_id: ProtocolId) -> Result<(), RepositoryError> {
        for batch in lock(&self.batches).iter_mut().filter(|batch| batch.protocol_id == protocol_id) {
            batch.is_archived = true;
        }
        Ok(())
    }
    async fn list_for_protocol(&self, protocol_id: ProtocolId) -> Result<Vec<CriteriaBatch>, RepositoryError> {
        Ok(lock(&self.batches).iter().filter(|batch| batch.protocol_id == protocol_id).cloned().collect())
    }
}

#[async_trait]
impl CriterionRepository for FakeStore {
    async fn insert_many(&self, criteria: &[Criterion]) -> Result<(), RepositoryError> {
        lock(&self.criteria).extend_from_slice(criteria);
        Ok(())
    }
    async fn get(&self, id: CriterionId) -> Result<Criterion, RepositoryError> {
        lock(&self.criteria).iter().find(|criterion| criterion.id == id).cloned().ok_or_else(|| RepositoryError::NotFound { kind: "criterion", id: id.to_string() })
    }
    async fn list_for_batch(&self, batch_id: CriteriaBatchId) -> Result<Vec<Criterion>, RepositoryError> {
        Ok(lock(&self.criteria).iter().filter(|criterion| criterion.batch_id == batch_id).cloned().collect())
    }
    async fn update(&self, criterion: &Criterion) -> Result<(), RepositoryError> {
        let mut criteria = lock(&self.criteria);
        match criteria.iter_mut().find(|existing| existing.id == criterion.id) {
            Some(existing) => *existing = criterion.clone(),
            None => criteria.push(criterion.clone()),
        }
        Ok(())
    }
    async fn put_tree(&self, criterion_id: CriterionId, tree: &ExpressionTree) -> Result<(), RepositoryError> {
        lock(&self.trees).insert(criterion_id, tree.clone());
        Ok(())
    }
    async fn get_tree(&self, criterion_id: CriterionId) -> Result<Option<ExpressionTree>, RepositoryError> {
        Ok(lock(&self.trees).get(&criterion_id).cloned())
    }
}

#[async_trait]
impl EntityRepository for FakeStore {
    async fn insert_many(&self, entities: &[Entity]) -> Result<(), RepositoryError> {
        lock(&self.entities).extend_from_slice(entities);
        Ok(())
    }
    async fn get(&self, id: EntityId) -> Result<Entity, RepositoryError> {
        lock(&self.entities).iter().find(|entity| entity.id == id).cloned().ok_or_else(|| RepositoryError::NotFound { kind: "entity", id: id.to_string() })
    }
    async fn list_for_criterion(&self, criterion_id: CriterionId) -> Result<Vec<Entity>, RepositoryError> {
        Ok(lock(&self.entities).iter().filter(|entity| entity.criterion_id == criterion_id).cloned().collect())
    }
    async fn list_for_batch(&self, batch_id: CriteriaBatchId) -> Result<Vec<Entity>, RepositoryError> {
        let criterion_ids: BTreeSet<_> = lock(&self.criteria).iter().filter(|criterion| criterion.batch_id == batch_id).map(|criterion| criterion.id).collect();
        Ok(lock(&self.entities).iter().filter(|entity| criterion_ids.contains(&entity.criterion_id)).cloned().collect())
    }
    async fn update(&self, entity: &Entity) -> Result<(), RepositoryError> {
        let mut entities = lock(&self.entities);
        match entities.iter_mut().find(|existing| existing.id == entity.id) {
            Some(existing) => *existing = entity.clone(),
            None => entities.push(entity.clone()),
        }
        Ok(())
    }
}

#[async_trait]
impl ReviewRepository for FakeStore {
    async fn insert(&self, review: &Review) -> Result<(), RepositoryError> {
        lock(&self.reviews).push(review.clone());
        Ok(())
    }
    async fn list_for_target(&self, target_id: &str) -> Result<Vec<Review>, RepositoryError> {
        Ok(lock(&self.reviews).iter().filter(|review| review.target_id == target_id).cloned().collect())
    }
}

#[async_trait]
impl AuditLogRepository for FakeStore {
    async fn insert(&self, entry: &AuditLog) -> Result<(), RepositoryError> {
        lock(&self.audit_logs).push(entry.clone());
        Ok(())
    }
    async fn get(&self, id: AuditLogId) -> Result<AuditLog, RepositoryError> {
        lock(&self.audit_logs).iter().find(|entry| entry.id == id).cloned().ok_or_else(|| RepositoryError::NotFound { kind: "audit_log", id: id.to_string() })
    }
    async fn list_for_target(&self, target_id: &str) -> Result<Vec<AuditLog>, RepositoryError> {
        Ok(lock(&self.audit_logs).iter().filter(|entry| entry.target_id == target_id).cloned().collect())
    }
    async fn list_recent(&self, limit: u32) -> Result<Vec<AuditLog>, RepositoryError> {
        Ok(lock(&self.audit_logs).iter().take(limit as usize).cloned().collect())
    }
}

#[async_trait]
impl ReviewTransaction for FakeStore {
    async fn commit_criterion_review(&self, criterion: &Criterion, review: &Review, audit_log: &AuditLog, batch: &CriteriaBatch) -> Result<(), RepositoryError> {
        let mut criteria = lock(&self.criteria);
        match criteria.iter_mut().find(|existing| existing.id == criterion.id) {
            Some(existing) => *existing = criterion.clone(),
            None => criteria.push(criterion.clone()),
        }
        drop(criteria);
        commit_review_and_audit(self, review, audit_log);
        commit_batch(self, batch);
        Ok(())
    }

    async fn commit_entity_review(&self, entity: &Entity, review: &Review, audit_log: &AuditLog, batch: &CriteriaBatch) -> Result<(), RepositoryError> {
        let mut entities = lock(&self.entities);
        match entities.iter_mut().find(|existing| existing.id == entity.id) {
            Some(existing) => *existing = entity.clone(),
            None => entities.push(entity.clone()),
        }
        drop(entities);
        commit_review_and_audit(self, review, audit_log);
        commit_batch(self, batch);
        Ok(())
    }
}

fn commit_review_and_audit(store: &FakeStore, review: &Review, audit_log: &AuditLog) {
    lock(&store.reviews).push(review.clone());
    lock(&store.audit_logs).push(audit_log.clone());
}

fn commit_batch(store: &FakeStore, batch: &CriteriaBatch) {
    let mut batches = lock(&store.batches);
    match batches.iter_mut().find(|existing| existing.id == batch.id) {
        Some(existing) => *existing = batch.clone(),
        None => batches.push(batch.clone()),
    }
}

// ============================================================================
// SECTION: FakeCheckpointStore
// ============================================================================

/// In-memory [`CheckpointStore`].
#[derive(Default)]
pub struct FakeCheckpointStore {
    checkpoints: Mutex<Vec<PipelineCheckpoint>>,
}

#[async_trait]
impl CheckpointStore for FakeCheckpointStore {
    async fn put(&self, checkpoint: &PipelineCheckpoint) -> Result<(), CheckpointError> {
        let mut checkpoints = lock(&self.checkpoints);
        checkpoints.retain(|existing| !(existing.thread_id == checkpoint.thread_id && existing.node_name == checkpoint.node_name));
        checkpoints.push(checkpoint.clone());
        Ok(())
    }
    async fn list_for_protocol(&self, thread_id: ProtocolId) -> Result<Vec<PipelineCheckpoint>, CheckpointError> {
        Ok(lock(&self.checkpoints).iter().filter(|checkpoint| checkpoint.thread_id == thread_id).cloned().collect())
    }
    async fn clear_for_protocol(&self, thread_id: ProtocolId) -> Result<(), CheckpointError> {
        lock(&self.checkpoints).retain(|checkpoint| checkpoint.thread_id != thread_id);
        Ok(())
    }
}

// ============================================================================
// SECTION: FakeOutboxStore
// ============================================================================

/// In-memory [`OutboxStore`]; `claim_batch`/`mark_*` are implemented for
/// completeness but scenario tests mostly just assert on `published()`.
#[derive(Default)]
pub struct FakeOutboxStore {
    events: Mutex<Vec<OutboxEvent>>,
}

impl FakeOutboxStore {
    /// Returns every event published so far, oldest first.
    #[must_use]
    pub fn published(&self) -> Vec<OutboxEvent> {
        lock(&self.events).clone()
    }
}

#[async_trait]
impl OutboxStore for FakeOutboxStore {
    async fn publish(&self, event: &OutboxEvent) -> Result<(), OutboxError> {
        lock(&self.events).push(event.clone());
        Ok(())
    }
    async fn claim_batch(&self, limit: u32) -> Result<Vec<OutboxEvent>, OutboxError> {
        let mut events = lock(&self.events);
        let mut claimed = Vec::new();
        for event in events.iter_mut() {
            if claimed.len() >= limit as usize {
                break;
            }
            if event.status == OutboxStatus::Pending {
                event.mark_claimed();
                claimed.push(event.clone());
            }
        }
        Ok(claimed)
    }
    async fn mark_delivered(&self, id: OutboxEventId) -> Result<(), OutboxError> {
        if let Some(event) = lock(&self.events).iter_mut().find(|event| event.id == id) {
            event.mark_delivered();
        }
        Ok(())
    }
    async fn mark_failed(&self, id: OutboxEventId, error: &str) -> Result<(), OutboxError> {
        if let Some(event) = lock(&self.events).iter_mut().find(|event| event.id == id) {
            let backoff = elixir_core::backoff_for_attempt(event.attempts + 1);
            event.mark_failed(error.to_string(), elixir_core::domain::outbox_event::DEFAULT_MAX_ATTEMPTS, backoff);
        }
        Ok(())
    }
    async fn list_dead_letters(&self) -> Result<Vec<OutboxEvent>, OutboxError> {
        Ok(lock(&self.events).iter().filter(|event| event.status == OutboxStatus::DeadLetter).cloned().collect())
    }
}

// ============================================================================
// SECTION: FakeDocumentFetcher / FakeDocumentParser
// ============================================================================

/// In-memory [`DocumentFetcher`] keyed by exact `file_uri`.
#[derive(Default)]
pub struct FakeDocumentFetcher {
    documents: Mutex<HashMap<String, Vec<u8>>>,
}

impl FakeDocumentFetcher {
    /// Registers the bytes to return for a given `file_uri`.
    pub fn insert(&self, file_uri: impl Into<String>, bytes: Vec<u8>) {
        lock(&self.documents).insert(file_uri.into(), bytes);
    }
}

#[async_trait]
impl DocumentFetcher for FakeDocumentFetcher {
    async fn fetch(&self, file_uri: &str) -> Result<Vec<u8>, DocumentError> {
        lock(&self.documents)
            .get(file_uri)
            .cloned()
            .ok_or_else(|| DocumentError::FetchFailed { uri: file_uri.to_string(), message: "no document registered".to_string() })
    }
}

/// In-memory [`DocumentParser`] keyed by exact byte content.
#[derive(Default)]
pub struct FakeDocumentParser {
    parsed: Mutex<HashMap<Vec<u8>, ParsedDocument>>,
}

impl FakeDocumentParser {
    /// Registers the parsed document to return for exactly these bytes.
    pub fn insert(&self, bytes: Vec<u8>, document: ParsedDocument) {
        lock(&self.parsed).insert(bytes, document);
    }
}

impl DocumentParser for FakeDocumentParser {
    fn parse(&self, bytes: &[u8]) -> Result<ParsedDocument, DocumentError> {
        lock(&self.parsed).get(bytes).cloned().ok_or_else(|| DocumentError::ParseFailed("no parsed document registered for these bytes".to_string()))
    }
}

// ============================================================================
// SECTION: FakeTerminologyRouter
// ============================================================================

/// In-memory [`TerminologyRouter`] keyed by exact search query text.
#[derive(Default)]
pub struct FakeTerminologyRouter {
    candidates: Mutex<HashMap<String, Vec<Candidate>>>,
}

impl FakeTerminologyRouter {
    /// Registers the candidates `route_search` should return for this exact
    /// query string, regardless of entity type.
    pub fn insert(&self, query: impl Into<String>, candidates: Vec<Candidate>) {
        lock(&self.candidates).insert(query.into(), candidates);
    }
}

#[async_trait]
impl TerminologyRouter for FakeTerminologyRouter {
    async fn route_search(&self, _entity_type: EntityType, query: &str) -> Result<Vec<Candidate>, TerminologyError> {
        Ok(lock(&self.candidates).get(query).cloned().unwrap_or_default())
    }
}

// ============================================================================
// SECTION: FakeOmopMapper
// ============================================================================

/// In-memory [`OmopMapper`] keyed by lowercased free-text query for concept
/// mapping (spec.md §4.2: `(query_text, domain_hint) -> concept_id`, a
/// text lookup independent of any vocabulary code) and by exact text for
/// unit/value mapping. The registered `domain_hint`, when present, must
/// match the hint `map_code` is called with, mirroring the real mapper's
/// `domain_id = hint` filter.
#[derive(Default)]
pub struct FakeOmopMapper {
    codes: Mutex<HashMap<String, (Option<DomainHint>, OmopCandidate)>>,
    units: Mutex<HashMap<String, i64>>,
    values: Mutex<HashMap<String, i64>>,
}

impl FakeOmopMapper {
    /// Registers the OMOP candidate a free-text query (optionally scoped to
    /// a domain hint) should resolve to.
    pub fn insert_code(&self, query_text: impl Into<String>, domain_hint: Option<DomainHint>, candidate: OmopCandidate) {
        lock(&self.codes).insert(query_text.into().to_lowercase(), (domain_hint, candidate));
    }
    /// Registers the `concept_id` a unit's free text should resolve to.
    pub fn insert_unit(&self, unit_text: impl Into<String>, concept_id: i64) {
        lock(&self.units).insert(unit_text.into(), concept_id);
    }
    /// Registers the `concept_id` a categorical value's free text should
    /// resolve to.
    pub fn insert_value(&self, value_text: impl Into<String>, concept_id: i64) {
        lock(&self.values).insert(value_text.into(), concept_id);
    }
}

#[async_trait]
impl OmopMapper for FakeOmopMapper {
    async fn map_code(&self, query_text: &str, domain_hint: Option<DomainHint>) -> Result<Option<OmopCandidate>, OmopError> {
        let guard = lock(&self.codes);
        Ok(guard.get(&query_text.to_lowercase()).and_then(|(registered_hint, candidate)| {
            (registered_hint.is_none() || *registered_hint == domain_hint).then(|| candidate.clone())
        }))
    }
    async fn map_unit(&self, unit_text: &str) -> Result<Option<i64>, OmopError> {
        Ok(lock(&self.units).get(unit_text).copied())
    }
    async fn map_value(&self, value_text: &str) -> Result<Option<i64>, OmopError> {
        Ok(lock(&self.values).get(value_text).copied())
    }
}

// ============================================================================
// SECTION: FakeLlmGateway
// ============================================================================

/// One scripted outcome for a `target`'s next call.
#[derive(Debug, Clone)]
pub enum Scripted {
    /// Succeed with this structured payload.
    Payload(JsonValue),
    /// Fail with this error.
    Fail(ScriptedFailure),
}

/// A test-selectable [`LlmError`] variant, since `LlmError` itself does not
/// implement `Clone`.
#[derive(Debug, Clone)]
pub enum ScriptedFailure {
    /// Maps to [`LlmError::BreakerOpen`].
    BreakerOpen { retry_after_secs: u64 },
    /// Maps to [`LlmError::Upstream`].
    Upstream { message: String },
    /// Maps to [`LlmError::SchemaValidationExhausted`].
    SchemaValidationExhausted { attempts: u32 },
}

/// Scripted, call-ordered [`LlmGateway`] fake: each logical `target` has its
/// own FIFO queue of [`Scripted`] outcomes, consumed one per `complete` call.
#[derive(Default)]
pub struct FakeLlmGateway {
    scripts: Mutex<BTreeMap<String, VecDeque<Scripted>>>,
}

impl FakeLlmGateway {
    /// Queues a successful structured response for the next call against
    /// `target`.
    pub fn push_ok(&self, target: impl Into<String>, payload: JsonValue) {
        lock(&self.scripts).entry(target.into()).or_default().push_back(Scripted::Payload(payload));
    }

    /// Queues a failure for the next call against `target`.
    pub fn push_err(&self, target: impl Into<String>, failure: ScriptedFailure) {
        lock(&self.scripts).entry(target.into()).or_default().push_back(Scripted::Fail(failure));
    }
}

#[async_trait]
impl LlmGateway for FakeLlmGateway {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let scripted = lock(&self.scripts).get_mut(&request.target).and_then(VecDeque::pop_front);
        match scripted {
            Some(Scripted::Payload(payload)) => {
                Ok(CompletionResponse { payload, attempts_used: 1, model_name: "fake-model".to_string(), model_version: "0".to_string() })
            }
            Some(Scripted::Fail(ScriptedFailure::BreakerOpen { retry_after_secs })) => {
                Err(LlmError::BreakerOpen { target: request.target, retry_after_secs })
            }
            Some(Scripted::Fail(ScriptedFailure::Upstream { message })) => Err(LlmError::Upstream { target: request.target, message }),
            Some(Scripted::Fail(ScriptedFailure::SchemaValidationExhausted { attempts })) => {
                Err(LlmError::SchemaValidationExhausted { target: request.target, attempts })
            }
            None => Err(LlmError::Upstream { target: request.target, message: "no scripted response queued".to_string() }),
        }
    }
}
