// crates/elixir-store-postgres/src/lib.rs
// ============================================================================
// Module: ElixirTrials Postgres Store
// Description: Public API surface for the Postgres-backed repository,
//              outbox, and checkpoint implementations.
// Purpose: The sole crate in the workspace that knows about connection
//          pooling, SQL, and the physical schema; every other crate depends
//          only on the traits in `elixir_core::interfaces`.
// Dependencies: crate::{pool, migrate, error, *_repo, outbox_store,
//               checkpoint_store}
// ============================================================================

//! ## Overview
//! Every aggregate is stored as a typed query-column prefix plus a `data`
//! jsonb payload (see `migrations/0001_init.sql`). [`pool::build_pool`]
//! constructs the connection pool and [`migrate::run_migrations`] must be
//! called once at startup before any repository is used.

// ============================================================================
// SECTION: Modules
// ============================================================================

mod audit_repo;
mod batch_repo;
mod checkpoint_store;
mod criterion_repo;
mod entity_repo;
pub mod error;
pub mod migrate;
mod outbox_store;
pub mod pool;
mod protocol_repo;
mod review_repo;
mod review_transaction;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use audit_repo::PostgresAuditLogRepository;
pub use batch_repo::PostgresCriteriaBatchRepository;
pub use checkpoint_store::PostgresCheckpointStore;
pub use criterion_repo::PostgresCriterionRepository;
pub use entity_repo::PostgresEntityRepository;
pub use error::StoreBackendError;
pub use outbox_store::PostgresOutboxStore;
pub use pool::DEFAULT_POOL_SIZE;
pub use pool::build_pool;
pub use protocol_repo::PostgresProtocolRepository;
pub use review_repo::PostgresReviewRepository;
pub use review_transaction::PostgresReviewTransaction;
