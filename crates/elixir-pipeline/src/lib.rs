// crates/elixir-pipeline/src/lib.rs
// ============================================================================
// Module: ElixirTrials Pipeline
// Description: The seven-node protocol processing state machine, its
//              checkpointed runner, document quality scoring, ordinal scale
//              lookup, and the SQL export builder.
// Purpose: Turn an uploaded protocol into grounded, structured eligibility
//          criteria (spec.md §4.6), then expose the result as a flat SQL
//          `WHERE` fragment (spec.md §4.10).
// Dependencies: elixir_core, elixir_llm, tokio
// ============================================================================

//! ## Overview
//! [`PipelineRunner`] drives one protocol through `ingest` → `extract` →
//! `parse` → `ground` → `persist` → `structure` → `ordinal_resolve`,
//! checkpointing the opaque carry state after every successful node. The
//! `trigger` module wires that runner to the transactional outbox as an
//! [`elixir_core::OutboxHandler`], so a `protocol_uploaded` or
//! `reextraction_requested` event is the only way the pipeline starts.

pub mod export;
pub mod nodes;
pub mod ordinal_scales;
pub mod quality;
pub mod runner;
pub mod trigger;

pub use export::ExportBuilder;
pub use export::SqlExportBuilder;
pub use quality::report;
pub use quality::score_document;
pub use quality::QualityReport;
pub use runner::is_pipeline_complete;
pub use runner::PipelineConfig;
pub use runner::PipelineRunner;
pub use trigger::PipelineOutboxHandler;
pub use trigger::ReextractionOutboxHandler;
