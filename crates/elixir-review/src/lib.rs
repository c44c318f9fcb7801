// crates/elixir-review/src/lib.rs
// ============================================================================
// Module: ElixirTrials Review Library
// Description: Public API surface for the HITL review transaction, batch
//              agreement metrics, and re-extraction with fuzzy-match review
//              inheritance.
// Purpose: Give the (unbuilt) API layer named in spec.md §6 one crate for
//          every reviewer-facing mutation and read, each implemented as a
//          pure function or a single atomic transaction over the
//          `elixir_core::interfaces::repository` traits (spec.md §4.7, §4.8).
// Dependencies: crate::{action, metrics, reextraction}
// ============================================================================

//! ## Overview
//! `elixir-review` never reaches into storage directly; every service here
//! is constructed from `Arc<dyn ...Repository>` trait objects, the same
//! seam `elixir-pipeline::PipelineRunner` is built from. This keeps review
//! logic testable against the in-memory fakes used across this workspace's
//! unit tests without a database.

pub mod action;
pub mod metrics;
pub mod reextraction;

pub use action::ReviewActionRequest;
pub use action::ReviewError;
pub use action::ReviewService;
pub use metrics::batch_metrics;
pub use metrics::BatchMetrics;
pub use reextraction::compare_batches;
pub use reextraction::BatchDiffEntry;
pub use reextraction::DiffKind;
pub use reextraction::ReextractionError;
pub use reextraction::ReextractionService;
