// crates/elixir-terminology/src/lib.rs
// ============================================================================
// Module: ElixirTrials Terminology Library
// Description: Public API surface for vocabulary adapters, the TTL cache, the
//              per-vocabulary circuit breaker, and the routing dispatcher.
// Purpose: Give the `ground` pipeline node one `TerminologyRouter`
//          implementation backed by six uniform HTTP adapters (spec.md §4.1,
//          §4.3, §4.6.4).
// Dependencies: crate::{adapters, breaker, cache, router}
// ============================================================================

//! ## Overview
//! `elixir-terminology` has no knowledge of the pipeline; it is consumed
//! purely through the `elixir_core::{TerminologyClient, TerminologyRouter}`
//! trait boundary, the same way `decision-gate-providers` is consumed purely
//! through `decision_gate_core::EvidenceProvider`.

pub mod adapters;
pub mod breaker;
pub mod cache;
pub mod router;

pub use adapters::HttpVocabularyClient;
pub use breaker::CircuitBreaker;
pub use cache::TtlCache;
pub use router::Router;
