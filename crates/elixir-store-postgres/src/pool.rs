// crates/elixir-store-postgres/src/pool.rs
// ============================================================================
// Module: StorePoolConfig
// Description: Connection pool configuration for the primary ElixirTrials
//              database.
// Purpose: Build a deadpool-postgres pool sized for concurrent pipeline runs,
//          the outbox consumer, and reviewer HTTP traffic together.
// Dependencies: deadpool-postgres, tokio-postgres
// ============================================================================

//! ## Overview
//! Mirrors `elixir_omop::pool::build_pool` and, further back,
//! `helios_persistence::backends::postgres::PostgresBackend`'s pool
//! construction. Sized larger than the OMOP mapper's read-only pool because
//! the primary store additionally serves the outbox consumer's polling loop
//! and every review-flow write.

// ============================================================================
// SECTION: Imports
// ============================================================================

use deadpool_postgres::Config;
use deadpool_postgres::Pool;
use deadpool_postgres::Runtime;
use tokio_postgres::NoTls;

use crate::error::StoreBackendError;

/// Default pool size for the primary ElixirTrials database.
pub const DEFAULT_POOL_SIZE: usize = 16;

/// Builds a deadpool-postgres pool from a `postgres://` connection string.
///
/// # Errors
/// Returns [`StoreBackendError`] if the connection string cannot be parsed or
/// the pool fails to build.
pub fn build_pool(connection_string: &str, pool_size: usize) -> Result<Pool, StoreBackendError> {
    let mut config = Config::new();
    config.url = Some(connection_string.to_string());

    config
        .builder(NoTls)
        .map_err(|err| StoreBackendError(format!("failed to build pool builder: {err}")))?
        .max_size(pool_size)
        .runtime(Runtime::Tokio1)
        .build()
        .map_err(|err| StoreBackendError(format!("failed to build connection pool: {err}")))
}
