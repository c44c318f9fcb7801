// crates/elixir-core/src/lib.rs
// ============================================================================
// Module: ElixirTrials Core Library
// Description: Public API surface for the ElixirTrials protocol processing
//              pipeline's domain model and collaborator interfaces.
// Purpose: Expose domain types, identifiers, error taxonomy, and interface
//          traits to every other crate in the workspace.
// Dependencies: crate::{domain, interfaces, error, identifiers, time}
// ============================================================================

//! ## Overview
//! `elixir-core` has no knowledge of Postgres, HTTP, or any specific LLM
//! provider. It defines what a `Protocol`, `CriteriaBatch`, `Criterion`, and
//! `Entity` *are* (spec.md §3), the error taxonomy every collaborator raises
//! into (spec.md §7), and the trait boundaries (spec.md §4) that
//! `elixir-pipeline`'s nodes are written against. Everything else in the
//! workspace depends on this crate; it depends on nothing workspace-local.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod domain;
pub mod error;
pub mod identifiers;
pub mod interfaces;
pub mod time;

// ============================================================================
// SECTION: Re-Exports — Domain
// ============================================================================

pub use domain::audit::AuditDetails;
pub use domain::audit::AuditEventType;
pub use domain::audit::AuditLog;
pub use domain::audit::SchemaVersion;
pub use domain::batch::compute_batch_review_status;
pub use domain::batch::BatchReviewStatus;
pub use domain::batch::CriteriaBatch;
pub use domain::checkpoint::resume_point;
pub use domain::checkpoint::PipelineCheckpoint;
pub use domain::criterion::find_duplicate_keys;
pub use domain::criterion::normalize_text;
pub use domain::criterion::Assertion;
pub use domain::criterion::Conditions;
pub use domain::criterion::Criterion;
pub use domain::criterion::CriterionReviewStatus;
pub use domain::criterion::CriterionType;
pub use domain::criterion::FieldMapping;
pub use domain::criterion::MappingValue;
pub use domain::criterion::Relation;
pub use domain::entity::Entity;
pub use domain::entity::EntityCodes;
pub use domain::entity::EntityType;
pub use domain::entity::GroundingMethod;
pub use domain::outbox_event::backoff_for_attempt;
pub use domain::outbox_event::OutboxEvent;
pub use domain::outbox_event::OutboxEventType;
pub use domain::outbox_event::OutboxStatus;
pub use domain::protocol::PipelineNode;
pub use domain::protocol::Protocol;
pub use domain::protocol::ProtocolMetadata;
pub use domain::protocol::ProtocolStatus;
pub use domain::review::Review;
pub use domain::review::ReviewAction;
pub use domain::review::ReviewTargetType;
pub use domain::tree::AtomicCriterion;
pub use domain::tree::ChildRef;
pub use domain::tree::CompositeCriterion;
pub use domain::tree::CriterionRelationship;
pub use domain::tree::ExpressionTree;
pub use domain::tree::Operator;
pub use domain::tree::TreeError;

// ============================================================================
// SECTION: Re-Exports — Errors
// ============================================================================

pub use error::GroundingFailure;
pub use error::IntegrityError;
pub use error::IntegritySeverity;
pub use error::NodeError;
pub use error::NotFound;
pub use error::ServiceUnavailable;
pub use error::TransientUpstreamError;
pub use error::ValidationError;

// ============================================================================
// SECTION: Re-Exports — Identifiers & Time
// ============================================================================

pub use identifiers::AtomicCriterionId;
pub use identifiers::AuditLogId;
pub use identifiers::CompositeCriterionId;
pub use identifiers::CriteriaBatchId;
pub use identifiers::CriterionId;
pub use identifiers::EntityId;
pub use identifiers::OutboxEventId;
pub use identifiers::ProtocolId;
pub use identifiers::ReviewId;
pub use identifiers::ReviewerId;
pub use time::Timestamp;

// ============================================================================
// SECTION: Re-Exports — Interfaces
// ============================================================================

pub use interfaces::checkpoint::CheckpointError;
pub use interfaces::checkpoint::CheckpointStore;
pub use interfaces::document::DocumentError;
pub use interfaces::document::DocumentFetcher;
pub use interfaces::document::DocumentParser;
pub use interfaces::document::ParsedDocument;
pub use interfaces::document::ParsedPage;
pub use interfaces::llm::CompletionRequest;
pub use interfaces::llm::CompletionResponse;
pub use interfaces::llm::LlmError;
pub use interfaces::llm::LlmGateway;
pub use interfaces::omop::DomainHint;
pub use interfaces::omop::OmopCandidate;
pub use interfaces::omop::OmopError;
pub use interfaces::omop::OmopMapper;
pub use interfaces::omop::OmopMatchStrategy;
pub use interfaces::outbox::OutboxError;
pub use interfaces::outbox::OutboxHandler;
pub use interfaces::outbox::OutboxStore;
pub use interfaces::repository::AuditLogRepository;
pub use interfaces::repository::CriteriaBatchRepository;
pub use interfaces::repository::CriterionRepository;
pub use interfaces::repository::EntityRepository;
pub use interfaces::repository::ProtocolRepository;
pub use interfaces::repository::RepositoryError;
pub use interfaces::repository::ReviewRepository;
pub use interfaces::repository::ReviewTransaction;
pub use interfaces::terminology::Candidate;
pub use interfaces::terminology::TerminologyClient;
pub use interfaces::terminology::TerminologyError;
pub use interfaces::terminology::TerminologyRouter;
pub use interfaces::terminology::VocabSystem;
