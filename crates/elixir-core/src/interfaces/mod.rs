// crates/elixir-core/src/interfaces/mod.rs
// ============================================================================
// Module: Interfaces
// Description: Re-exports the trait boundaries separating elixir-core from
//              its infrastructure collaborators (spec.md §4).
// Purpose: Group per-collaborator interface modules under one namespace.
// Dependencies: (see individual submodules)
// ============================================================================

//! ## Overview
//! Every infrastructure dependency the pipeline touches — terminology
//! vocabularies, the OMOP vocabulary database, the LLM gateway, the
//! transactional outbox, the checkpoint store, and the domain repositories —
//! is named here as a trait. `elixir-core` depends on nothing but these
//! shapes; concrete adapters live in their own crates (`elixir-terminology`,
//! `elixir-omop`, `elixir-llm`, `elixir-outbox`, `elixir-store-postgres`).

pub mod checkpoint;
pub mod document;
pub mod llm;
pub mod omop;
pub mod outbox;
pub mod repository;
pub mod terminology;
