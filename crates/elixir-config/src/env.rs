// crates/elixir-config/src/env.rs
// ============================================================================
// Module: EnvConfig
// Description: Recognized process environment options (spec.md §6).
// Purpose: Resolve and validate every environment variable the pipeline
//          depends on in one place, failing loudly on a missing required
//          variable rather than panicking deep inside a node.
// Dependencies: thiserror
// ============================================================================

//! ## Overview
//! Mirrors `decision-gate-providers::env`'s posture: explicit parse errors
//! rather than panics, and a clear distinction between required and optional
//! variables. `MODEL_BACKEND` selects between the Gemini developer API and a
//! Vertex-hosted MedGemma endpoint; the Vertex fields are required only when
//! that backend is selected.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::env;

use thiserror::Error;

// ============================================================================
// SECTION: Error
// ============================================================================

/// Failure resolving the process environment into an [`EnvConfig`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EnvConfigError {
    /// A required variable was not set.
    #[error("missing required environment variable: {0}")]
    Missing(&'static str),
    /// A variable was set but failed to parse as its expected type.
    #[error("environment variable {name} has invalid value: {reason}")]
    Invalid {
        /// The variable name.
        name: &'static str,
        /// Why the value was rejected.
        reason: String,
    },
}

// ============================================================================
// SECTION: Model Backend
// ============================================================================

/// Which LLM backend serves structured-output calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelBackend {
    /// The Gemini developer API, authenticated via `GOOGLE_API_KEY`.
    Gemini,
    /// A Vertex AI-hosted MedGemma endpoint.
    Vertex,
}

impl ModelBackend {
    fn parse(raw: &str) -> Result<Self, EnvConfigError> {
        match raw {
            "gemini" => Ok(Self::Gemini),
            "vertex" => Ok(Self::Vertex),
            other => Err(EnvConfigError::Invalid { name: "MODEL_BACKEND", reason: format!("unknown backend {other:?}") }),
        }
    }
}

// ============================================================================
// SECTION: EnvConfig
// ============================================================================

/// Resolved process environment configuration (spec.md §6 "Environment").
///
/// # Invariants
/// - `database_url` and `omop_vocab_url` are always present; every pipeline
///   run needs both the primary store and the OMOP vocabulary database.
/// - `vertex_endpoint_id`/`gcp_project_id`/`gcp_region` are required only
///   when `model_backend` is [`ModelBackend::Vertex`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvConfig {
    /// `GOOGLE_API_KEY` — Gemini developer API key.
    pub google_api_key: Option<String>,
    /// `GEMINI_MODEL_NAME` — model name/version string for Gemini calls.
    pub gemini_model_name: String,
    /// `MODEL_BACKEND` — which backend structured calls are routed to.
    pub model_backend: ModelBackend,
    /// `VERTEX_ENDPOINT_ID` — required when `model_backend` is `vertex`.
    pub vertex_endpoint_id: Option<String>,
    /// `GCP_PROJECT_ID` — required when `model_backend` is `vertex`.
    pub gcp_project_id: Option<String>,
    /// `GCP_REGION` — required when `model_backend` is `vertex`.
    pub gcp_region: Option<String>,
    /// `DATABASE_URL` — primary Postgres connection string.
    pub database_url: String,
    /// `OMOP_VOCAB_URL` — OMOP vocabulary Postgres connection string.
    pub omop_vocab_url: String,
    /// `UMLS_API_KEY` — terminology authentication key.
    pub umls_api_key: Option<String>,
    /// `LOCAL_UPLOAD_DIR` — local storage adapter directory.
    pub local_upload_dir: Option<String>,
    /// `USE_LOCAL_STORAGE` — whether the local storage adapter is active.
    pub use_local_storage: bool,
    /// `MLFLOW_TRACKING_URI` — observability trace sink, referenced only as
    /// a capability per spec.md §1 (trace export is out of scope here).
    pub mlflow_tracking_uri: Option<String>,
    /// `MLFLOW_TRACE_TIMEOUT_SECONDS` — defaults to 300.
    pub mlflow_trace_timeout_seconds: u64,
}

impl EnvConfig {
    /// Resolves configuration from the process environment.
    ///
    /// # Errors
    /// Returns [`EnvConfigError::Missing`] if a required variable is absent,
    /// or [`EnvConfigError::Invalid`] if a present variable fails to parse.
    pub fn from_process_env() -> Result<Self, EnvConfigError> {
        Self::from_map(&env::vars().collect())
    }

    /// Resolves configuration from an explicit key-value map, used by tests
    /// that must not depend on the ambient process environment.
    ///
    /// # Errors
    /// Returns [`EnvConfigError::Missing`] if a required variable is absent,
    /// or [`EnvConfigError::Invalid`] if a present variable fails to parse.
    pub fn from_map(vars: &BTreeMap<String, String>) -> Result<Self, EnvConfigError> {
        let model_backend = match vars.get("MODEL_BACKEND") {
            Some(raw) => ModelBackend::parse(raw)?,
            None => ModelBackend::Gemini,
        };

        let database_url = required(vars, "DATABASE_URL")?;
        let omop_vocab_url = required(vars, "OMOP_VOCAB_URL")?;

        if matches!(model_backend, ModelBackend::Vertex) {
            required(vars, "VERTEX_ENDPOINT_ID")?;
            required(vars, "GCP_PROJECT_ID")?;
            required(vars, "GCP_REGION")?;
        }

        let use_local_storage = vars.get("USE_LOCAL_STORAGE").is_some_and(|raw| raw == "true" || raw == "1");

        let mlflow_trace_timeout_seconds = match vars.get("MLFLOW_TRACE_TIMEOUT_SECONDS") {
            Some(raw) => raw.parse::<u64>().map_err(|_| EnvConfigError::Invalid {
                name: "MLFLOW_TRACE_TIMEOUT_SECONDS",
                reason: format!("{raw:?} is not a non-negative integer"),
            })?,
            None => 300,
        };

        Ok(Self {
            google_api_key: vars.get("GOOGLE_API_KEY").cloned(),
            gemini_model_name: vars.get("GEMINI_MODEL_NAME").cloned().unwrap_or_else(|| "gemini-2.5-pro".to_string()),
            model_backend,
            vertex_endpoint_id: vars.get("VERTEX_ENDPOINT_ID").cloned(),
            gcp_project_id: vars.get("GCP_PROJECT_ID").cloned(),
            gcp_region: vars.get("GCP_REGION").cloned(),
            database_url,
            omop_vocab_url,
            umls_api_key: vars.get("UMLS_API_KEY").cloned(),
            local_upload_dir: vars.get("LOCAL_UPLOAD_DIR").cloned(),
            use_local_storage,
            mlflow_tracking_uri: vars.get("MLFLOW_TRACKING_URI").cloned(),
            mlflow_trace_timeout_seconds,
        })
    }
}

fn required(vars: &BTreeMap<String, String>, name: &'static str) -> Result<String, EnvConfigError> {
    vars.get(name).cloned().ok_or(EnvConfigError::Missing(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_vars() -> BTreeMap<String, String> {
        let mut vars = BTreeMap::new();
        vars.insert("DATABASE_URL".to_string(), "postgres://localhost/elixir".to_string());
        vars.insert("OMOP_VOCAB_URL".to_string(), "postgres://localhost/omop".to_string());
        vars
    }

    #[test]
    fn missing_database_url_is_rejected() {
        let vars = BTreeMap::new();
        assert_eq!(EnvConfig::from_map(&vars), Err(EnvConfigError::Missing("DATABASE_URL")));
    }

    #[test]
    fn defaults_to_gemini_backend_without_vertex_fields() {
        let config = EnvConfig::from_map(&base_vars()).expect("valid config");
        assert_eq!(config.model_backend, ModelBackend::Gemini);
        assert!(config.vertex_endpoint_id.is_none());
    }

    #[test]
    fn vertex_backend_requires_its_companion_fields() {
        let mut vars = base_vars();
        vars.insert("MODEL_BACKEND".to_string(), "vertex".to_string());
        assert_eq!(EnvConfig::from_map(&vars), Err(EnvConfigError::Missing("VERTEX_ENDPOINT_ID")));

        vars.insert("VERTEX_ENDPOINT_ID".to_string(), "projects/p/endpoints/1".to_string());
        vars.insert("GCP_PROJECT_ID".to_string(), "p".to_string());
        vars.insert("GCP_REGION".to_string(), "us-central1".to_string());
        let config = EnvConfig::from_map(&vars).expect("valid config");
        assert_eq!(config.model_backend, ModelBackend::Vertex);
    }

    #[test]
    fn mlflow_timeout_defaults_to_300() {
        let config = EnvConfig::from_map(&base_vars()).expect("valid config");
        assert_eq!(config.mlflow_trace_timeout_seconds, 300);
    }

    #[test]
    fn invalid_mlflow_timeout_is_rejected() {
        let mut vars = base_vars();
        vars.insert("MLFLOW_TRACE_TIMEOUT_SECONDS".to_string(), "not-a-number".to_string());
        assert!(matches!(EnvConfig::from_map(&vars), Err(EnvConfigError::Invalid { name: "MLFLOW_TRACE_TIMEOUT_SECONDS", .. })));
    }
}
