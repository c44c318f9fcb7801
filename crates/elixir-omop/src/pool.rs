// crates/elixir-omop/src/pool.rs
// ============================================================================
// Module: OmopPoolConfig
// Description: Connection pool configuration for the OMOP vocabulary store.
// Purpose: Build a deadpool-postgres pool sized for read-only vocabulary
//          lookups (spec.md §4.2: "pooled Postgres connection", max 5).
// Dependencies: deadpool-postgres, tokio-postgres
// ============================================================================

//! ## Overview
//! Mirrors `helios_persistence::backends::postgres::PostgresBackend`'s pool
//! construction: a `deadpool_postgres::Config` built from explicit fields,
//! no TLS (the vocabulary database is reached over a private network per
//! spec.md's deployment assumptions), sized to 5 connections — small because
//! lookups are short-lived point reads, not the primary store's write path.

// ============================================================================
// SECTION: Imports
// ============================================================================

use deadpool_postgres::Config;
use deadpool_postgres::Pool;
use deadpool_postgres::Runtime;
use tokio_postgres::NoTls;

use crate::error::OmopBackendError;

/// Default pool size for the OMOP vocabulary connection (spec.md §4.2).
pub const DEFAULT_POOL_SIZE: usize = 5;

/// Builds a deadpool-postgres pool from a `postgres://` connection string.
///
/// # Errors
/// Returns [`OmopBackendError`] if the connection string cannot be parsed or
/// the pool fails to build.
pub fn build_pool(connection_string: &str, pool_size: usize) -> Result<Pool, OmopBackendError> {
    let mut config = Config::new();
    config.url = Some(connection_string.to_string());

    config
        .builder(NoTls)
        .map_err(|err| OmopBackendError(format!("failed to build pool builder: {err}")))?
        .max_size(pool_size)
        .runtime(Runtime::Tokio1)
        .build()
        .map_err(|err| OmopBackendError(format!("failed to build connection pool: {err}")))
}
