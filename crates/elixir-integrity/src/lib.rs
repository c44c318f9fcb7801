// crates/elixir-integrity/src/lib.rs
// ============================================================================
// Module: ElixirTrials Integrity Library
// Description: Public API surface for the read-only invariant audit.
// Purpose: Give operators (via the `GET /integrity/check` contract, spec.md
//          §6) a single entry point that surfaces orphaned entities,
//          ungrounded entities, and review/audit-log pairing gaps without
//          mutating any row (spec.md §4.9).
// Dependencies: crate::checker
// ============================================================================

//! ## Overview
//! `elixir-integrity` never writes. Every check it runs reads through the
//! same `elixir_core::interfaces::repository` traits `elixir-pipeline` and
//! `elixir-review` depend on, so it can be pointed at the production store
//! or an in-memory fake with no code change (mirroring the teacher's
//! `NamespaceAuthority` trait seam in `decision-gate-mcp`).

pub mod checker;

pub use checker::IntegrityChecker;
pub use checker::IntegrityReport;
pub use checker::IntegrityScope;
