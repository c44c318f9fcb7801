// crates/elixir-llm/src/gateway.rs
// ============================================================================
// Module: HttpLlmGateway
// Description: `elixir_core::LlmGateway` implementor backed by reqwest,
//              with transport retry/backoff, per-target circuit breaking,
//              and JSON Schema response validation.
// Purpose: Give every pipeline node one call shape regardless of which
//          model backs a given target (spec.md §4.4, §4.6.4).
// Dependencies: elixir-core, jsonschema, reqwest, serde_json, tokio, tracing
// ============================================================================

//! ## Overview
//! One HTTP client, one base URL, one API key; the `target` on each
//! [`elixir_core::CompletionRequest`] only selects a breaker instance, never
//! a different endpoint — model routing happens upstream of this crate, at
//! template-selection time. Transport failures (network error, HTTP 429,
//! HTTP 5xx) are retried with 1s/2s/4s backoff before the breaker records a
//! failure; a schema-invalid response is retried as a fresh agentic attempt
//! with the model's own prior output appended as history, up to
//! `request.max_agentic_attempts`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use elixir_core::CompletionRequest;
use elixir_core::CompletionResponse;
use elixir_core::LlmError;
use elixir_core::LlmGateway;
use jsonschema::Draft;
use serde_json::Value as JsonValue;
use tracing::warn;

use crate::breaker::TargetBreaker;
use crate::error::GatewayError;

const TRANSPORT_BACKOFF: [Duration; 3] = [Duration::from_secs(1), Duration::from_secs(2), Duration::from_secs(4)];

// ============================================================================
// SECTION: HttpLlmGateway
// ============================================================================

/// A single upstream completions endpoint, reachable over HTTP, fronted by
/// per-target circuit breakers.
pub struct HttpLlmGateway {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model_name: String,
    model_version: String,
    breakers: Mutex<HashMap<String, TargetBreaker>>,
}

impl HttpLlmGateway {
    /// Builds a gateway against a single completions endpoint.
    #[must_use]
    pub fn new(client: reqwest::Client, endpoint: String, api_key: String, model_name: String, model_version: String) -> Self {
        Self { client, endpoint, api_key, model_name, model_version, breakers: Mutex::new(HashMap::new()) }
    }

    fn breaker_retry_after(&self, target: &str) -> Option<u64> {
        let mut breakers = self.breakers.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        breakers.entry(target.to_string()).or_insert_with(TargetBreaker::new).retry_after_secs()
    }

    fn record_success(&self, target: &str) {
        let breakers = self.breakers.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(breaker) = breakers.get(target) {
            breaker.record_success();
        }
    }

    fn record_failure(&self, target: &str) {
        let mut breakers = self.breakers.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        breakers.entry(target.to_string()).or_insert_with(TargetBreaker::new).record_failure();
    }

    async fn call_once(&self, system_prompt: &str, user_content: &str) -> Result<JsonValue, GatewayError> {
        let body = serde_json::json!({
            "system_prompt": system_prompt,
            "user_content": user_content,
        });
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        if response.status().is_server_error() || response.status().as_u16() == 429 {
            return Err(GatewayError(format!("upstream returned status {}", response.status())));
        }
        let response = response.error_for_status()?;
        let payload: JsonValue = response.json().await?;
        Ok(payload)
    }

    async fn call_with_transport_retry(&self, system_prompt: &str, user_content: &str) -> Result<JsonValue, GatewayError> {
        let mut last_error = None;
        for backoff in TRANSPORT_BACKOFF {
            match self.call_once(system_prompt, user_content).await {
                Ok(payload) => return Ok(payload),
                Err(error) => {
                    warn!(%error, "llm transport call failed, backing off");
                    last_error = Some(error);
                    tokio::time::sleep(backoff).await;
                }
            }
        }
        self.call_once(system_prompt, user_content).await.map_err(|error| last_error.unwrap_or(error))
    }
}

#[async_trait]
impl LlmGateway for HttpLlmGateway {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        if let Some(retry_after_secs) = self.breaker_retry_after(&request.target) {
            return Err(LlmError::BreakerOpen { target: request.target, retry_after_secs });
        }

        let validator = jsonschema::options()
            .with_draft(Draft::Draft202012)
            .build(&request.response_schema)
            .map_err(|error| LlmError::Upstream { target: request.target.clone(), message: format!("invalid response schema: {error}") })?;

        let mut attempts_used = 0;
        let mut history = String::new();
        let max_attempts = request.max_agentic_attempts.max(1);

        while attempts_used < max_attempts {
            attempts_used += 1;
            let user_content =
                if history.is_empty() { request.user_content.clone() } else { format!("{}\n\nPrevious attempt history:\n{history}", request.user_content) };

            let payload = match self.call_with_transport_retry(&request.system_prompt, &user_content).await {
                Ok(payload) => payload,
                Err(error) => {
                    self.record_failure(&request.target);
                    return Err(LlmError::Upstream { target: request.target, message: error.to_string() });
                }
            };

            if validator.is_valid(&payload) {
                self.record_success(&request.target);
                return Ok(CompletionResponse {
                    payload,
                    attempts_used,
                    model_name: self.model_name.clone(),
                    model_version: self.model_version.clone(),
                });
            }

            history.push_str(&format!("attempt {attempts_used}: {payload}\n"));
        }

        self.record_failure(&request.target);
        Err(LlmError::SchemaValidationExhausted { target: request.target, attempts: attempts_used })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn breaker_retry_after_starts_closed_for_a_fresh_target() {
        let gateway = HttpLlmGateway::new(
            reqwest::Client::new(),
            "https://example.invalid/complete".to_string(),
            "key".to_string(),
            "gemini-2.5-pro".to_string(),
            "2026-01-01".to_string(),
        );
        assert_eq!(gateway.breaker_retry_after("extraction"), None);
    }

    #[test]
    fn repeated_failures_open_the_targets_breaker() {
        let gateway = HttpLlmGateway::new(
            reqwest::Client::new(),
            "https://example.invalid/complete".to_string(),
            "key".to_string(),
            "gemini-2.5-pro".to_string(),
            "2026-01-01".to_string(),
        );
        gateway.record_failure("extraction");
        gateway.record_failure("extraction");
        gateway.record_failure("extraction");
        assert!(gateway.breaker_retry_after("extraction").is_some());
        assert_eq!(gateway.breaker_retry_after("structure"), None);
    }
}
