// crates/elixir-omop/src/lib.rs
// ============================================================================
// Module: ElixirTrials OMOP Library
// Description: Public API surface for the read-only OMOP vocabulary mapper.
// Purpose: Give the `ground` and `structure` pipeline nodes one
//          `elixir_core::OmopMapper` implementation backed by a pooled
//          Postgres connection to the OHDSI vocabulary tables (spec.md
//          §4.2, §4.6.4 step 3, §4.6.5).
// Dependencies: crate::{error, mapper, pool}
// ============================================================================

//! ## Overview
//! `elixir-omop` has no knowledge of the pipeline; it is consumed purely
//! through `elixir_core::OmopMapper`, the same way `elixir-terminology` is
//! consumed purely through `elixir_core::{TerminologyClient,
//! TerminologyRouter}`.

pub mod error;
pub mod mapper;
pub mod pool;

pub use error::OmopBackendError;
pub use mapper::PostgresOmopMapper;
pub use mapper::FUZZY_MIN_SIMILARITY;
pub use pool::build_pool;
pub use pool::DEFAULT_POOL_SIZE;
