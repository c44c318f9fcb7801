// crates/elixir-omop/src/error.rs
// ============================================================================
// Module: OmopBackendError
// Description: Internal backend failure type, convertible into the public
//              `elixir_core::OmopError` at the trait boundary.
// Purpose: Keep deadpool/tokio-postgres error plumbing out of the public
//          `OmopMapper` contract.
// Dependencies: std::fmt
// ============================================================================

use std::fmt;

use elixir_core::OmopError;

/// Internal backend failure, always surfaced publicly as `OmopError::Backend`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OmopBackendError(pub String);

impl fmt::Display for OmopBackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for OmopBackendError {}

impl From<OmopBackendError> for OmopError {
    fn from(value: OmopBackendError) -> Self {
        Self::Backend(value.0)
    }
}

impl From<deadpool_postgres::PoolError> for OmopBackendError {
    fn from(value: deadpool_postgres::PoolError) -> Self {
        Self(format!("pool checkout failed: {value}"))
    }
}

impl From<tokio_postgres::Error> for OmopBackendError {
    fn from(value: tokio_postgres::Error) -> Self {
        Self(format!("query failed: {value}"))
    }
}
