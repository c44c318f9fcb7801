// crates/elixir-llm/src/error.rs
// ============================================================================
// Module: GatewayError
// Description: Internal transport/validation failure type, convertible into
//              the public `elixir_core::LlmError` at the trait boundary.
// Purpose: Keep reqwest/jsonschema error plumbing out of the public
//          `LlmGateway` contract, mirroring `elixir-omop::error`.
// Dependencies: std::fmt
// ============================================================================

use std::fmt;

/// Internal backend failure raised while completing a single attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayError(pub String);

impl fmt::Display for GatewayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for GatewayError {}

impl From<reqwest::Error> for GatewayError {
    fn from(value: reqwest::Error) -> Self {
        Self(format!("request failed: {value}"))
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(value: serde_json::Error) -> Self {
        Self(format!("response was not valid JSON: {value}"))
    }
}
