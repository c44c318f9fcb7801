// crates/elixir-config/src/routing.rs
// ============================================================================
// Module: RoutingTable
// Description: Per-entity-type terminology routing configuration.
// Purpose: Load the entity_type → ordered-vocabulary-list table from
//          spec.md §4.3 as data, so changing a vocabulary order is a
//          configuration edit rather than a code change.
// Dependencies: elixir-core, serde
// ============================================================================

//! ## Overview
//! `elixir-core::VocabSystem::candidates_for` already hardcodes spec.md
//! §4.3's default order as a `const fn` fallback; this module lets an
//! operator override it via TOML without touching `elixir-core`, matching
//! the teacher's "prompts are data" design note (spec.md §9) applied to
//! routing instead of prompts.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use elixir_core::EntityType;
use elixir_core::VocabSystem;
use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: RoutingTable
// ============================================================================

/// An overridable entity_type → ordered vocabulary list table.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RoutingTable {
    /// Overrides keyed by the entity type's snake_case name, matching
    /// `EntityType`'s serde representation.
    #[serde(default)]
    overrides: BTreeMap<String, Vec<VocabName>>,
}

/// Serializable mirror of [`VocabSystem`] for TOML/YAML configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
enum VocabName {
    Umls,
    Snomed,
    Icd10,
    RxNorm,
    Loinc,
    Hpo,
}

impl From<VocabName> for VocabSystem {
    fn from(value: VocabName) -> Self {
        match value {
            VocabName::Umls => Self::Umls,
            VocabName::Snomed => Self::Snomed,
            VocabName::Icd10 => Self::Icd10,
            VocabName::RxNorm => Self::RxNorm,
            VocabName::Loinc => Self::Loinc,
            VocabName::Hpo => Self::Hpo,
        }
    }
}

impl RoutingTable {
    /// Returns the vocabulary systems to search for `entity_type`, in
    /// priority order: an operator override if one is configured, otherwise
    /// the default table built into [`VocabSystem::candidates_for`].
    #[must_use]
    pub fn candidates_for(&self, entity_type: EntityType) -> Vec<VocabSystem> {
        let key = entity_type_key(entity_type);
        self.overrides.get(key).map_or_else(
            || VocabSystem::candidates_for(entity_type).to_vec(),
            |systems| systems.iter().copied().map(VocabSystem::from).collect(),
        )
    }
}

const fn entity_type_key(entity_type: EntityType) -> &'static str {
    match entity_type {
        EntityType::Condition => "condition",
        EntityType::Measurement => "measurement",
        EntityType::Drug => "drug",
        EntityType::Procedure => "procedure",
        EntityType::Demographic => "demographic",
        EntityType::Consent => "consent",
        EntityType::Other => "other",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_table_falls_back_to_default_routing() {
        let table = RoutingTable::default();
        assert_eq!(table.candidates_for(EntityType::Drug), vec![VocabSystem::RxNorm, VocabSystem::Umls]);
    }

    #[test]
    fn consent_never_routes_anywhere_even_without_override() {
        let table = RoutingTable::default();
        assert!(table.candidates_for(EntityType::Consent).is_empty());
    }

    #[test]
    fn override_replaces_the_default_order() {
        let toml_src = r#"
            [overrides]
            condition = ["umls"]
        "#;
        let table: RoutingTable = toml::from_str(toml_src).expect("parse routing table");
        assert_eq!(table.candidates_for(EntityType::Condition), vec![VocabSystem::Umls]);
    }
}
