// crates/elixir-omop/src/mapper.rs
// ============================================================================
// Module: PostgresOmopMapper
// Description: OMOP vocabulary mapper over a pooled read-only Postgres
//              connection.
// Purpose: Implement `elixir_core::OmopMapper`'s exact/synonym/fuzzy cascade
//          (spec.md §4.6.4 step 3, §4.6.5 unit mapping) against the standard
//          OHDSI `concept`/`concept_synonym` tables.
// Dependencies: async-trait, deadpool-postgres, elixir-core, tokio-postgres
// ============================================================================

//! ## Overview
//! Every query filters to `standard_concept = 'S'`, matching spec.md §4.2's
//! requirement that OMOP mapping only ever resolves to a *standard* concept,
//! never a non-standard or classification concept. The fuzzy step relies on
//! the `pg_trgm` extension's `similarity()` function and a minimum threshold
//! of 0.6 (spec.md §4.2).

// ============================================================================
// SECTION: Imports
// ============================================================================

use async_trait::async_trait;
use deadpool_postgres::Pool;
use elixir_core::DomainHint;
use elixir_core::OmopCandidate;
use elixir_core::OmopError;
use elixir_core::OmopMapper;
use elixir_core::OmopMatchStrategy;

use crate::error::OmopBackendError;

/// Minimum `pg_trgm` similarity score accepted for a fuzzy match.
pub const FUZZY_MIN_SIMILARITY: f64 = 0.6;

/// OMOP vocabulary mapper backed by a pooled Postgres connection.
pub struct PostgresOmopMapper {
    pool: Pool,
}

impl PostgresOmopMapper {
    /// Wraps an existing connection pool.
    #[must_use]
    pub const fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OmopMapper for PostgresOmopMapper {
    async fn map_code(&self, query_text: &str, domain_hint: Option<DomainHint>) -> Result<Option<OmopCandidate>, OmopError> {
        let client = self.pool.get().await.map_err(OmopBackendError::from)?;
        let domain_id = domain_hint.map(DomainHint::domain_id);

        let exact = match domain_id {
            Some(domain_id) => {
                client
                    .query_opt(
                        "SELECT concept_id, concept_name FROM concept \
                         WHERE domain_id = $1 AND standard_concept = 'S' \
                         AND lower(concept_name) = lower($2) LIMIT 1",
                        &[&domain_id, &query_text],
                    )
                    .await
            }
            None => {
                client
                    .query_opt(
                        "SELECT concept_id, concept_name FROM concept \
                         WHERE standard_concept = 'S' AND lower(concept_name) = lower($1) LIMIT 1",
                        &[&query_text],
                    )
                    .await
            }
        }
        .map_err(OmopBackendError::from)?;
        if let Some(row) = exact {
            return Ok(Some(OmopCandidate { concept_id: row.get(0), concept_name: row.get(1), strategy: OmopMatchStrategy::Exact, score: 1.0 }));
        }

        let synonym = match domain_id {
            Some(domain_id) => {
                client
                    .query_opt(
                        "SELECT c.concept_id, c.concept_name FROM concept_synonym s \
                         JOIN concept c ON c.concept_id = s.concept_id \
                         WHERE c.domain_id = $1 AND c.standard_concept = 'S' \
                         AND lower(s.concept_synonym_name) = lower($2) \
                         LIMIT 1",
                        &[&domain_id, &query_text],
                    )
                    .await
            }
            None => {
                client
                    .query_opt(
                        "SELECT c.concept_id, c.concept_name FROM concept_synonym s \
                         JOIN concept c ON c.concept_id = s.concept_id \
                         WHERE c.standard_concept = 'S' \
                         AND lower(s.concept_synonym_name) = lower($1) \
                         LIMIT 1",
                        &[&query_text],
                    )
                    .await
            }
        }
        .map_err(OmopBackendError::from)?;
        if let Some(row) = synonym {
            return Ok(Some(OmopCandidate { concept_id: row.get(0), concept_name: row.get(1), strategy: OmopMatchStrategy::Synonym, score: 0.95 }));
        }

        let fuzzy = match domain_id {
            Some(domain_id) => {
                client
                    .query_opt(
                        "SELECT concept_id, concept_name, similarity(concept_name, $1) AS score \
                         FROM concept \
                         WHERE domain_id = $2 AND standard_concept = 'S' AND similarity(concept_name, $1) >= $3 \
                         ORDER BY score DESC LIMIT 1",
                        &[&query_text, &domain_id, &FUZZY_MIN_SIMILARITY],
                    )
                    .await
            }
            None => {
                client
                    .query_opt(
                        "SELECT concept_id, concept_name, similarity(concept_name, $1) AS score \
                         FROM concept \
                         WHERE standard_concept = 'S' AND similarity(concept_name, $1) >= $2 \
                         ORDER BY score DESC LIMIT 1",
                        &[&query_text, &FUZZY_MIN_SIMILARITY],
                    )
                    .await
            }
        }
        .map_err(OmopBackendError::from)?;

        Ok(fuzzy.map(|row| {
            let score: f32 = row.get(2);
            OmopCandidate { concept_id: row.get(0), concept_name: row.get(1), strategy: OmopMatchStrategy::Fuzzy, score: f64::from(score) }
        }))
    }

    async fn map_unit(&self, unit_text: &str) -> Result<Option<i64>, OmopError> {
        let client = self.pool.get().await.map_err(OmopBackendError::from)?;

        let exact = client
            .query_opt(
                "SELECT concept_id FROM concept \
                 WHERE domain_id = 'Unit' AND standard_concept = 'S' \
                 AND lower(concept_name) = lower($1) LIMIT 1",
                &[&unit_text],
            )
            .await
            .map_err(OmopBackendError::from)?;
        if let Some(row) = exact {
            return Ok(Some(row.get(0)));
        }

        let fuzzy = client
            .query_opt(
                "SELECT concept_id FROM concept \
                 WHERE domain_id = 'Unit' AND standard_concept = 'S' \
                 AND similarity(concept_name, $1) >= $2 \
                 ORDER BY similarity(concept_name, $1) DESC LIMIT 1",
                &[&unit_text, &FUZZY_MIN_SIMILARITY],
            )
            .await
            .map_err(OmopBackendError::from)?;
        Ok(fuzzy.map(|row| row.get(0)))
    }

    async fn map_value(&self, value_text: &str) -> Result<Option<i64>, OmopError> {
        let client = self.pool.get().await.map_err(OmopBackendError::from)?;

        let exact = client
            .query_opt(
                "SELECT concept_id FROM concept \
                 WHERE standard_concept = 'S' AND lower(concept_name) = lower($1) LIMIT 1",
                &[&value_text],
            )
            .await
            .map_err(OmopBackendError::from)?;
        if let Some(row) = exact {
            return Ok(Some(row.get(0)));
        }

        let fuzzy = client
            .query_opt(
                "SELECT concept_id FROM concept \
                 WHERE standard_concept = 'S' AND similarity(concept_name, $1) >= $2 \
                 ORDER BY similarity(concept_name, $1) DESC LIMIT 1",
                &[&value_text, &FUZZY_MIN_SIMILARITY],
            )
            .await
            .map_err(OmopBackendError::from)?;
        Ok(fuzzy.map(|row| row.get(0)))
    }
}
