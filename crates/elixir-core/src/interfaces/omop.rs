// crates/elixir-core/src/interfaces/omop.rs
// ============================================================================
// Module: OmopMapper
// Description: Free-text-to-OMOP-concept mapping trait.
// Purpose: Let the `ground`/`structure` nodes resolve a free-text mention or
//          a free-text unit to an OMOP standard `concept_id` without
//          depending on `elixir-omop`'s Postgres query shape directly.
// Dependencies: async-trait, thiserror
// ============================================================================

//! ## Overview
//! OMOP mapping tries, in order, an exact match on `concept.concept_name`, a
//! synonym table lookup, then a `pg_trgm` fuzzy match against
//! `concept.concept_name` (spec.md §4.2, §4.6.4 step 2 Path B). Path B runs
//! independently of Path A (`TerminologyRouter`): it takes the entity's own
//! free-text query plus an optional domain hint, not a vocabulary code, so it
//! never depends on Path A having already produced a candidate.
//! `elixir-omop` is the sole production implementor; it owns the
//! `concept`/`concept_synonym` OMOP-vocabulary tables.

// ============================================================================
// SECTION: Imports
// ============================================================================

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::entity::EntityType;

// ============================================================================
// SECTION: Domain Hint
// ============================================================================

/// The OMOP `domain_id` an entity's mention is expected to resolve into,
/// used to filter `map_code`'s candidate search (spec.md §4.2: "filters by
/// ... `domain_id = hint` when provided").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DomainHint {
    /// `domain_id = 'Condition'`.
    Condition,
    /// `domain_id = 'Measurement'`.
    Measurement,
    /// `domain_id = 'Drug'`.
    Drug,
    /// `domain_id = 'Procedure'`.
    Procedure,
    /// `domain_id = 'Observation'`, used for demographic and other mentions
    /// that have no dedicated OMOP clinical domain of their own.
    Observation,
}

impl DomainHint {
    /// The literal OMOP `concept.domain_id` value this hint filters to.
    #[must_use]
    pub const fn domain_id(self) -> &'static str {
        match self {
            Self::Condition => "Condition",
            Self::Measurement => "Measurement",
            Self::Drug => "Drug",
            Self::Procedure => "Procedure",
            Self::Observation => "Observation",
        }
    }

    /// Derives the domain hint the `ground` node passes for a given entity
    /// type (spec.md §4.6.4 step 2: "`domain_hint_from_type`"). Consent
    /// entities are never routed, so they have no hint; `Other` is left
    /// unhinted rather than guessed.
    #[must_use]
    pub const fn from_entity_type(entity_type: EntityType) -> Option<Self> {
        match entity_type {
            EntityType::Condition => Some(Self::Condition),
            EntityType::Measurement => Some(Self::Measurement),
            EntityType::Drug => Some(Self::Drug),
            EntityType::Procedure => Some(Self::Procedure),
            EntityType::Demographic => Some(Self::Observation),
            EntityType::Consent | EntityType::Other => None,
        }
    }
}

// ============================================================================
// SECTION: Candidate / Strategy
// ============================================================================

/// How an [`OmopCandidate`] was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OmopMatchStrategy {
    /// Direct `(vocabulary_id, concept_code)` join.
    Exact,
    /// Matched via the `concept_synonym` table.
    Synonym,
    /// Matched via trigram similarity against `concept_name`.
    Fuzzy,
}

/// One candidate OMOP standard concept.
#[derive(Debug, Clone, PartialEq)]
pub struct OmopCandidate {
    /// The resolved OMOP `concept_id`.
    pub concept_id: i64,
    /// The OMOP standard concept name.
    pub concept_name: String,
    /// How this candidate was found.
    pub strategy: OmopMatchStrategy,
    /// Match confidence in `[0, 1]`.
    pub score: f64,
}

// ============================================================================
// SECTION: Error
// ============================================================================

/// Failure resolving an OMOP concept.
#[derive(Debug, Error)]
pub enum OmopError {
    /// The backing OMOP vocabulary store is unreachable or errored.
    #[error("OMOP mapping backend error: {0}")]
    Backend(String),
}

// ============================================================================
// SECTION: OmopMapper
// ============================================================================

/// Maps free text to OMOP standard concepts.
#[async_trait]
pub trait OmopMapper: Send + Sync {
    /// Resolves `(query_text, domain_hint)` to its standard OMOP concept,
    /// trying an exact `concept_name` match, then a synonym-table match,
    /// then a `pg_trgm` fuzzy match, filtering to `domain_id = hint` whenever
    /// a hint is given (spec.md §4.2). Independent of any vocabulary-code
    /// result `TerminologyRouter` may have already produced.
    ///
    /// # Errors
    /// Returns [`OmopError`] if the backing store is unreachable.
    async fn map_code(&self, query_text: &str, domain_hint: Option<DomainHint>) -> Result<Option<OmopCandidate>, OmopError>;

    /// Resolves a free-text unit (e.g. `"mg/dL"`) to a UCUM-backed OMOP unit
    /// `concept_id` (spec.md §4.6.5).
    ///
    /// # Errors
    /// Returns [`OmopError`] if the backing store is unreachable.
    async fn map_unit(&self, unit_text: &str) -> Result<Option<i64>, OmopError>;

    /// Resolves a categorical value (e.g. a "positive"/"negative" finding
    /// text) to an OMOP `value_concept_id`.
    ///
    /// # Errors
    /// Returns [`OmopError`] if the backing store is unreachable.
    async fn map_value(&self, value_text: &str) -> Result<Option<i64>, OmopError>;
}
