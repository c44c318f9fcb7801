// crates/elixir-config/src/lib.rs
// ============================================================================
// Module: ElixirTrials Config Library
// Description: Public API surface for environment configuration, the
//              terminology routing table, the UCUM unit table, and the
//              ordinal scale lookup.
// Purpose: Keep every tunable named in spec.md §4.3, §4.6.6, §4.6.7, and §6
//          in one crate, loaded the way `decision-gate-providers::env`
//          resolves process environment values.
// Dependencies: crate::{env, ordinal_scales, routing, units}
// ============================================================================

//! ## Overview
//! `elixir-config` has no behavior of its own beyond parsing and validating
//! configuration; every table here is read by exactly one collaborator crate
//! (`elixir-terminology`'s router, `elixir-pipeline`'s `structure` and
//! `ordinal_resolve` nodes) at startup.

pub mod env;
pub mod ordinal_scales;
pub mod routing;
pub mod units;

pub use env::EnvConfig;
pub use env::EnvConfigError;
pub use ordinal_scales::OrdinalScale;
pub use ordinal_scales::OrdinalScaleTable;
pub use routing::RoutingTable;
pub use units::UnitTable;
