// crates/elixir-core/src/interfaces/terminology.rs
// ============================================================================
// Module: TerminologyClient
// Description: Vocabulary-search trait backing the dual-grounding algorithm.
// Purpose: Give `elixir-terminology`'s per-vocabulary adapters (UMLS, SNOMED,
//          ICD-10, RxNorm, LOINC, HPO) one uniform search shape the `ground`
//          node can dispatch against via a routing table, without the node
//          knowing which HTTP API backs any given vocabulary.
// Dependencies: async-trait, crate::domain::entity, thiserror
// ============================================================================

//! ## Overview
//! `elixir-terminology` holds one [`TerminologyClient`] implementation per
//! vocabulary plus a `TerminologyRouter` keyed by [`VocabSystem`]
//! (spec.md §4.6.4 "Dynamic dispatch across vocabularies → tagged-variant
//! routing table"). The `ground` node only ever depends on this trait.

// ============================================================================
// SECTION: Imports
// ============================================================================

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::entity::EntityType;

// ============================================================================
// SECTION: Vocabulary System
// ============================================================================

/// One of the six terminology vocabularies a [`TerminologyClient`] may back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VocabSystem {
    /// Unified Medical Language System.
    Umls,
    /// SNOMED Clinical Terms.
    Snomed,
    /// ICD-10 diagnosis codes.
    Icd10,
    /// RxNorm medication codes.
    RxNorm,
    /// Logical Observation Identifiers Names and Codes.
    Loinc,
    /// Human Phenotype Ontology.
    Hpo,
}

impl VocabSystem {
    /// Returns the vocabulary systems worth searching for a given entity
    /// type, in priority order, per spec.md §4.6.4's per-type routing.
    #[must_use]
    pub const fn candidates_for(entity_type: EntityType) -> &'static [Self] {
        match entity_type {
            EntityType::Condition => &[Self::Snomed, Self::Icd10, Self::Umls, Self::Hpo],
            EntityType::Measurement => &[Self::Loinc, Self::Umls],
            EntityType::Drug => &[Self::RxNorm, Self::Umls],
            EntityType::Procedure => &[Self::Snomed, Self::Umls],
            EntityType::Demographic | EntityType::Other => &[Self::Umls],
            EntityType::Consent => &[],
        }
    }
}

// ============================================================================
// SECTION: Candidate
// ============================================================================

/// One candidate concept returned by a terminology search.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    /// The vocabulary system this candidate was matched against.
    pub system: VocabSystem,
    /// The vocabulary-native code (e.g. a SNOMED CT id, an ICD-10 code).
    pub code: String,
    /// The preferred display term for this code.
    pub preferred_term: String,
    /// Match confidence in `[0, 1]`, as scored by the adapter.
    pub score: f64,
}

// ============================================================================
// SECTION: Error
// ============================================================================

/// Failure searching a terminology system.
#[derive(Debug, Error)]
pub enum TerminologyError {
    /// The upstream vocabulary service returned a retryable failure.
    #[error("terminology upstream error: {0}")]
    Upstream(String),
    /// The upstream service's circuit breaker is currently open.
    #[error("terminology breaker open for {system:?}, retry after {retry_after_secs}s")]
    BreakerOpen {
        /// The vocabulary system whose breaker tripped.
        system: VocabSystem,
        /// Seconds remaining until the breaker closes.
        retry_after_secs: u64,
    },
}

// ============================================================================
// SECTION: TerminologyClient
// ============================================================================

/// A single-vocabulary search client.
#[async_trait]
pub trait TerminologyClient: Send + Sync {
    /// The vocabulary system this client searches.
    fn system(&self) -> VocabSystem;

    /// Searches for concepts matching `query`, ranked best-first.
    ///
    /// # Errors
    /// Returns [`TerminologyError`] if the upstream call fails or the
    /// circuit breaker for this vocabulary is open.
    async fn search(&self, query: &str) -> Result<Vec<Candidate>, TerminologyError>;

    /// Looks up a single code's preferred term directly, bypassing search.
    ///
    /// # Errors
    /// Returns [`TerminologyError`] if the upstream call fails.
    async fn lookup(&self, code: &str) -> Result<Option<Candidate>, TerminologyError>;
}

/// Dispatches a search to every vocabulary candidate for an entity type, in
/// priority order, concatenating every system's results and capping the
/// total at 10 (spec.md §4.3: "call each system in order via
/// TerminologyClient; concatenate candidate lists; cap at 10 total; return
/// to ground node"). Score-based filtering is the caller's concern, not the
/// router's.
#[async_trait]
pub trait TerminologyRouter: Send + Sync {
    /// Routes a search across the candidate vocabularies for `entity_type`.
    ///
    /// # Errors
    /// Returns [`TerminologyError`] only if every candidate vocabulary
    /// fails; a vocabulary returning zero matches is not an error.
    async fn route_search(&self, entity_type: EntityType, query: &str) -> Result<Vec<Candidate>, TerminologyError>;
}
