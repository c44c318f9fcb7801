// crates/elixir-terminology/src/adapters.rs
// ============================================================================
// Module: HttpVocabularyClient
// Description: Thin uniform HTTP adapter shared by all six vocabularies.
// Purpose: Give each of UMLS, SNOMED, ICD-10, RxNorm, LOINC, and HPO the same
//          `TerminologyClient` shape (spec.md §4.1), so `ground` never
//          branches on which vocabulary it is calling.
// Dependencies: async-trait, elixir-core, reqwest, serde_json
// ============================================================================

//! ## Overview
//! Each vocabulary is reachable behind a small gateway that normalizes its
//! native response shape to `[{code, preferred_term, score}]` for search and
//! `{code, preferred_term, score}` for a direct lookup — the heterogeneity
//! between UMLS's concept model, SNOMED's browser API, and RxNorm's REST
//! service lives in that gateway layer, not here. [`HttpVocabularyClient`] is
//! instantiated once per vocabulary with a distinct base URL and optional API
//! key (UMLS requires one; the others do not, per spec.md §6).

// ============================================================================
// SECTION: Imports
// ============================================================================

use async_trait::async_trait;
use elixir_core::Candidate;
use elixir_core::TerminologyClient;
use elixir_core::TerminologyError;
use elixir_core::VocabSystem;
use serde::Deserialize;

use crate::breaker::CircuitBreaker;

// ============================================================================
// SECTION: Wire Types
// ============================================================================

#[derive(Debug, Deserialize)]
struct WireCandidate {
    code: String,
    preferred_term: String,
    score: f64,
}

impl WireCandidate {
    fn into_candidate(self, system: VocabSystem) -> Candidate {
        Candidate { system, code: self.code, preferred_term: self.preferred_term, score: self.score }
    }
}

// ============================================================================
// SECTION: HttpVocabularyClient
// ============================================================================

/// An HTTP-backed [`TerminologyClient`] for one vocabulary system.
pub struct HttpVocabularyClient {
    system: VocabSystem,
    base_url: String,
    api_key: Option<String>,
    http: reqwest::Client,
    breaker: CircuitBreaker,
}

impl HttpVocabularyClient {
    /// Builds an adapter for `system`, reachable at `base_url`.
    ///
    /// `api_key` is sent as a bearer token when present; UMLS requires one
    /// (`UMLS_API_KEY`, spec.md §6), the other five vocabularies do not.
    #[must_use]
    pub fn new(system: VocabSystem, base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            system,
            base_url: base_url.into(),
            api_key,
            http: reqwest::Client::new(),
            breaker: CircuitBreaker::new(),
        }
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }

    fn check_breaker(&self) -> Result<(), TerminologyError> {
        if let Some(retry_after_secs) = self.breaker.retry_after_secs() {
            return Err(TerminologyError::BreakerOpen { system: self.system, retry_after_secs });
        }
        Ok(())
    }
}

#[async_trait]
impl TerminologyClient for HttpVocabularyClient {
    fn system(&self) -> VocabSystem {
        self.system
    }

    async fn search(&self, query: &str) -> Result<Vec<Candidate>, TerminologyError> {
        self.check_breaker()?;
        let url = format!("{}/search", self.base_url);
        let request = self.authorized(self.http.get(&url).query(&[("q", query)]));
        let result = async {
            let response = request.send().await.map_err(|err| TerminologyError::Upstream(err.to_string()))?;
            let response = response.error_for_status().map_err(|err| TerminologyError::Upstream(err.to_string()))?;
            response.json::<Vec<WireCandidate>>().await.map_err(|err| TerminologyError::Upstream(err.to_string()))
        }
        .await;
        match result {
            Ok(candidates) => {
                self.breaker.record_success();
                Ok(candidates.into_iter().map(|candidate| candidate.into_candidate(self.system)).collect())
            }
            Err(err) => {
                self.breaker.record_failure();
                Err(err)
            }
        }
    }

    async fn lookup(&self, code: &str) -> Result<Option<Candidate>, TerminologyError> {
        self.check_breaker()?;
        let url = format!("{}/lookup/{code}", self.base_url);
        let request = self.authorized(self.http.get(&url));
        let result = async {
            let response = request.send().await.map_err(|err| TerminologyError::Upstream(err.to_string()))?;
            if response.status() == reqwest::StatusCode::NOT_FOUND {
                return Ok(None);
            }
            let response = response.error_for_status().map_err(|err| TerminologyError::Upstream(err.to_string()))?;
            let candidate =
                response.json::<WireCandidate>().await.map_err(|err| TerminologyError::Upstream(err.to_string()))?;
            Ok(Some(candidate))
        }
        .await;
        match result {
            Ok(candidate) => {
                self.breaker.record_success();
                Ok(candidate.map(|candidate| candidate.into_candidate(self.system)))
            }
            Err(err) => {
                self.breaker.record_failure();
                Err(err)
            }
        }
    }
}
