// crates/elixir-store-postgres/src/error.rs
// ============================================================================
// Module: StoreBackendError
// Description: Internal backend failure type, convertible into every public
//              store error `elixir_core` defines (`RepositoryError`,
//              `OutboxError`, `CheckpointError`).
// Purpose: Keep deadpool/tokio-postgres error plumbing out of the public
//          repository contracts, mirroring `elixir-omop::error`.
// Dependencies: std::fmt
// ============================================================================

use std::fmt;

use elixir_core::CheckpointError;
use elixir_core::OutboxError;
use elixir_core::RepositoryError;

/// Internal backend failure, surfaced publicly as each trait's own `Backend`
/// (or equivalent) variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreBackendError(pub String);

impl fmt::Display for StoreBackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for StoreBackendError {}

impl From<StoreBackendError> for RepositoryError {
    fn from(value: StoreBackendError) -> Self {
        Self::Backend(value.0)
    }
}

impl From<StoreBackendError> for OutboxError {
    fn from(value: StoreBackendError) -> Self {
        Self::Backend(value.0)
    }
}

impl From<StoreBackendError> for CheckpointError {
    fn from(value: StoreBackendError) -> Self {
        Self(value.0)
    }
}

impl From<deadpool_postgres::PoolError> for StoreBackendError {
    fn from(value: deadpool_postgres::PoolError) -> Self {
        Self(format!("pool checkout failed: {value}"))
    }
}

impl From<tokio_postgres::Error> for StoreBackendError {
    fn from(value: tokio_postgres::Error) -> Self {
        Self(format!("query failed: {value}"))
    }
}

impl From<serde_json::Error> for StoreBackendError {
    fn from(value: serde_json::Error) -> Self {
        Self(format!("row did not deserialize: {value}"))
    }
}
