// crates/elixir-core/src/interfaces/repository.rs
// ============================================================================
// Module: Repository Traits
// Description: Backend-agnostic persistence traits for every aggregate in the
//              domain model.
// Purpose: Let `elixir-pipeline`, `elixir-review`, and `elixir-cli` depend on
//          a trait object instead of `elixir-store-postgres` directly, so
//          system tests can substitute an in-memory fake.
// Dependencies: async-trait, crate::domain, crate::identifiers, crate::error
// ============================================================================

//! ## Overview
//! One trait per aggregate root, mirroring the teacher's
//! `EvidenceProvider`/`ArtifactSink` shape: a small per-concern error enum,
//! then an `#[async_trait]` trait with `# Errors` sections on every method.
//! `elixir-store-postgres` is the only production implementor; system tests
//! use an in-memory fake implementing the same traits.

// ============================================================================
// SECTION: Imports
// ============================================================================

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::audit::AuditLog;
use crate::domain::batch::CriteriaBatch;
use crate::domain::criterion::Criterion;
use crate::domain::entity::Entity;
use crate::domain::protocol::Protocol;
use crate::domain::review::Review;
use crate::domain::tree::ExpressionTree;
use crate::identifiers::AuditLogId;
use crate::identifiers::CriteriaBatchId;
use crate::identifiers::CriterionId;
use crate::identifiers::EntityId;
use crate::identifiers::ProtocolId;

// (ReviewTransaction lives at the bottom of this file, after the per-aggregate
// repository traits it composes.)

// ============================================================================
// SECTION: Error
// ============================================================================

/// Failure mode shared by every repository trait in this module.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// The requested row does not exist.
    #[error("not found: {kind} {id}")]
    NotFound {
        /// Kind of row that was missing.
        kind: &'static str,
        /// Identifier that was looked up.
        id: String,
    },
    /// A uniqueness or referential invariant was violated by the write.
    #[error("constraint violated: {0}")]
    Constraint(String),
    /// The underlying store is unreachable or returned an unexpected error.
    #[error("backend error: {0}")]
    Backend(String),
}

// ============================================================================
// SECTION: ProtocolRepository
// ============================================================================

/// Persistence for [`Protocol`] rows.
#[async_trait]
pub trait ProtocolRepository: Send + Sync {
    /// Inserts a newly uploaded protocol.
    ///
    /// # Errors
    /// Returns [`RepositoryError::Backend`] if the write fails.
    async fn insert(&self, protocol: &Protocol) -> Result<(), RepositoryError>;

    /// Fetches a protocol by id, archiving it in place if it has become
    /// eligible for lazy archival (spec.md §3).
    ///
    /// # Errors
    /// Returns [`RepositoryError::NotFound`] if no such protocol exists.
    async fn get(&self, id: ProtocolId) -> Result<Protocol, RepositoryError>;

    /// Persists the full current state of a protocol.
    ///
    /// # Errors
    /// Returns [`RepositoryError::Backend`] if the write fails.
    async fn update(&self, protocol: &Protocol) -> Result<(), RepositoryError>;

    /// Lists protocols, most recently updated first.
    ///
    /// # Errors
    /// Returns [`RepositoryError::Backend`] if the read fails.
    async fn list(&self, limit: u32, offset: u32) -> Result<Vec<Protocol>, RepositoryError>;
}

// ============================================================================
// SECTION: CriteriaBatchRepository
// ============================================================================

/// Persistence for [`CriteriaBatch`] rows.
#[async_trait]
pub trait CriteriaBatchRepository: Send + Sync {
    /// Inserts a new batch.
    ///
    /// # Errors
    /// Returns [`RepositoryError::Backend`] if the write fails.
    async fn insert(&self, batch: &CriteriaBatch) -> Result<(), RepositoryError>;

    /// Fetches a batch by id.
    ///
    /// # Errors
    /// Returns [`RepositoryError::NotFound`] if no such batch exists.
    async fn get(&self, id: CriteriaBatchId) -> Result<CriteriaBatch, RepositoryError>;

    /// Returns the single non-archived batch for a protocol, if one exists.
    ///
    /// # Errors
    /// Returns [`RepositoryError::Backend`] if the read fails.
    async fn active_for_protocol(&self, protocol_id: ProtocolId) -> Result<Option<CriteriaBatch>, RepositoryError>;

    /// Persists the batch's current `review_status` and archival flag.
    ///
    /// # Errors
    /// Returns [`RepositoryError::Backend`] if the write fails.
    async fn update(&self, batch: &CriteriaBatch) -> Result<(), RepositoryError>;

    /// Archives every non-archived batch for a protocol, used before a
    /// re-extraction persists its replacement (spec.md §4.8).
    ///
    /// # Errors
    /// Returns [`RepositoryError::Backend`] if the write fails.
    async fn archive_all_for_protocol(&self, protocol_id: ProtocolId) -> Result<(), RepositoryError>;

    /// Lists every batch ever created for a protocol, most recently created
    /// first (`GET /protocols/{id}/batches`, spec.md §6). Used by
    /// re-extraction to locate the batch a fresh extraction should inherit
    /// review state from.
    ///
    /// # Errors
    /// Returns [`RepositoryError::Backend`] if the read fails.
    async fn list_for_protocol(&self, protocol_id: ProtocolId) -> Result<Vec<CriteriaBatch>, RepositoryError>;
}

// ============================================================================
// SECTION: CriterionRepository
// ============================================================================

/// Persistence for [`Criterion`] rows and their expression trees.
#[async_trait]
pub trait CriterionRepository: Send + Sync {
    /// Inserts a batch of freshly parsed criteria in one call.
    ///
    /// # Errors
    /// Returns [`RepositoryError::Constraint`] if `(text, criterion_type)`
    /// collides within the batch (spec.md §8 invariant 2).
    async fn insert_many(&self, criteria: &[Criterion]) -> Result<(), RepositoryError>;

    /// Fetches one criterion by id.
    ///
    /// # Errors
    /// Returns [`RepositoryError::NotFound`] if no such criterion exists.
    async fn get(&self, id: CriterionId) -> Result<Criterion, RepositoryError>;

    /// Lists every non-archived criterion belonging to a batch.
    ///
    /// # Errors
    /// Returns [`RepositoryError::Backend`] if the read fails.
    async fn list_for_batch(&self, batch_id: CriteriaBatchId) -> Result<Vec<Criterion>, RepositoryError>;

    /// Persists a criterion's current state, as written by a review action or
    /// the `structure`/`ordinal_resolve` nodes.
    ///
    /// # Errors
    /// Returns [`RepositoryError::Backend`] if the write fails.
    async fn update(&self, criterion: &Criterion) -> Result<(), RepositoryError>;

    /// Persists the expression tree for one criterion, replacing any prior
    /// tree for that criterion.
    ///
    /// # Errors
    /// Returns [`RepositoryError::Backend`] if the write fails.
    async fn put_tree(&self, criterion_id: CriterionId, tree: &ExpressionTree) -> Result<(), RepositoryError>;

    /// Fetches the expression tree for one criterion, if `structure` has run.
    ///
    /// # Errors
    /// Returns [`RepositoryError::Backend`] if the read fails.
    async fn get_tree(&self, criterion_id: CriterionId) -> Result<Option<ExpressionTree>, RepositoryError>;
}

// ============================================================================
// SECTION: EntityRepository
// ============================================================================

/// Persistence for [`Entity`] rows.
#[async_trait]
pub trait EntityRepository: Send + Sync {
    /// Inserts a batch of entities produced by the `ground` node in one call.
    ///
    /// # Errors
    /// Returns [`RepositoryError::Backend`] if the write fails.
    async fn insert_many(&self, entities: &[Entity]) -> Result<(), RepositoryError>;

    /// Fetches one entity by id.
    ///
    /// # Errors
    /// Returns [`RepositoryError::NotFound`] if no such entity exists.
    async fn get(&self, id: EntityId) -> Result<Entity, RepositoryError>;

    /// Lists every entity belonging to a criterion.
    ///
    /// # Errors
    /// Returns [`RepositoryError::Backend`] if the read fails.
    async fn list_for_criterion(&self, criterion_id: CriterionId) -> Result<Vec<Entity>, RepositoryError>;

    /// Lists every entity belonging to any criterion in a batch, used by the
    /// integrity checker's orphan scan (spec.md §4.9).
    ///
    /// # Errors
    /// Returns [`RepositoryError::Backend`] if the read fails.
    async fn list_for_batch(&self, batch_id: CriteriaBatchId) -> Result<Vec<Entity>, RepositoryError>;

    /// Persists an entity's current state, as written by review or grounding.
    ///
    /// # Errors
    /// Returns [`RepositoryError::Backend`] if the write fails.
    async fn update(&self, entity: &Entity) -> Result<(), RepositoryError>;
}

// ============================================================================
// SECTION: ReviewRepository / AuditLogRepository
// ============================================================================

/// Persistence for [`Review`] rows.
#[async_trait]
pub trait ReviewRepository: Send + Sync {
    /// Inserts one immutable review row.
    ///
    /// # Errors
    /// Returns [`RepositoryError::Backend`] if the write fails.
    async fn insert(&self, review: &Review) -> Result<(), RepositoryError>;

    /// Lists every review recorded against a target.
    ///
    /// # Errors
    /// Returns [`RepositoryError::Backend`] if the read fails.
    async fn list_for_target(&self, target_id: &str) -> Result<Vec<Review>, RepositoryError>;
}

/// Persistence for [`AuditLog`] rows.
#[async_trait]
pub trait AuditLogRepository: Send + Sync {
    /// Inserts one append-only audit entry.
    ///
    /// # Errors
    /// Returns [`RepositoryError::Backend`] if the write fails.
    async fn insert(&self, entry: &AuditLog) -> Result<(), RepositoryError>;

    /// Fetches one audit entry by id.
    ///
    /// # Errors
    /// Returns [`RepositoryError::NotFound`] if no such entry exists.
    async fn get(&self, id: AuditLogId) -> Result<AuditLog, RepositoryError>;

    /// Lists audit entries for a target, most recent first.
    ///
    /// # Errors
    /// Returns [`RepositoryError::Backend`] if the read fails.
    async fn list_for_target(&self, target_id: &str) -> Result<Vec<AuditLog>, RepositoryError>;

    /// Lists every audit entry created across the whole system within a
    /// window of `reference`, used by the integrity checker's review/audit
    /// pairing scan (spec.md §4.9).
    ///
    /// # Errors
    /// Returns [`RepositoryError::Backend`] if the read fails.
    async fn list_recent(&self, limit: u32) -> Result<Vec<AuditLog>, RepositoryError>;
}

// ============================================================================
// SECTION: ReviewTransaction
// ============================================================================

/// Commits the write side of a review action as one atomic unit (spec.md
/// §4.7: "Review action is a single atomic DB transaction"; "steps 5 and 6
/// [Review insert, AuditLog insert] commit together or both roll back").
///
/// `elixir-review` computes the updated target, the `Review`/`AuditLog`
/// pair, and the recomputed batch beforehand (reads, pure logic); this trait
/// covers only the four writes that must land together or not at all. A
/// backend implements it directly against its connection/pool rather than
/// by composing the single-row repository traits above, since those each
/// acquire their own connection.
#[async_trait]
pub trait ReviewTransaction: Send + Sync {
    /// Persists a criterion review: the updated `Criterion`, the `Review`
    /// row, the `AuditLog` row, and the recomputed `CriteriaBatch`.
    ///
    /// # Errors
    /// Returns [`RepositoryError::Backend`] if any write fails; none of the
    /// four rows are persisted in that case.
    async fn commit_criterion_review(
        &self,
        criterion: &Criterion,
        review: &Review,
        audit_log: &AuditLog,
        batch: &CriteriaBatch,
    ) -> Result<(), RepositoryError>;

    /// Persists an entity review: the updated `Entity`, the `Review` row,
    /// the `AuditLog` row, and the recomputed `CriteriaBatch`.
    ///
    /// # Errors
    /// Returns [`RepositoryError::Backend`] if any write fails; none of the
    /// four rows are persisted in that case.
    async fn commit_entity_review(
        &self,
        entity: &Entity,
        review: &Review,
        audit_log: &AuditLog,
        batch: &CriteriaBatch,
    ) -> Result<(), RepositoryError>;
}
