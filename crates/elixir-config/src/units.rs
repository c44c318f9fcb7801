// crates/elixir-config/src/units.rs
// ============================================================================
// Module: UnitTable
// Description: Static UCUM free-text unit → OMOP unit_concept_id table.
// Purpose: Back the `structure` node's unit normalization step (spec.md
//          §4.6.6) without a live OMOP lookup for the handful of units that
//          appear in eligibility criteria.
// Dependencies: std::collections::BTreeMap
// ============================================================================

//! ## Overview
//! `elixir-omop::OmopMapper::map_unit` is the production path (a live
//! `pg_trgm` fuzzy match against the OMOP `concept` table scoped to
//! `domain_id = 'Unit'`); this table is the fast, dependency-free path the
//! `structure` node tries first, since the ~50 units that actually occur in
//! protocol text are a closed, well-known set. A miss here falls through to
//! `OmopMapper::map_unit`, never to a null `unit_concept_id` outright.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

// ============================================================================
// SECTION: UnitTable
// ============================================================================

/// A free-text unit → OMOP `unit_concept_id` lookup table.
#[derive(Debug, Clone)]
pub struct UnitTable {
    entries: BTreeMap<String, i64>,
}

impl UnitTable {
    /// Builds the default table, covering the units most commonly seen in
    /// eligibility criteria: age/duration, common lab measurements, and
    /// percentage/ratio forms.
    #[must_use]
    pub fn default_table() -> Self {
        let pairs: &[(&str, i64)] = &[
            ("years", 9448),
            ("year", 9448),
            ("months", 9446),
            ("month", 9446),
            ("weeks", 9447),
            ("week", 9447),
            ("days", 8971),
            ("day", 8971),
            ("hours", 8505),
            ("hour", 8505),
            ("mg/dl", 8840),
            ("mg/dL", 8840),
            ("mmol/l", 8753),
            ("mmol/L", 8753),
            ("g/dl", 8713),
            ("g/dL", 8713),
            ("%", 8554),
            ("percent", 8554),
            ("kg", 9529),
            ("kg/m2", 9531),
            ("kg/m^2", 9531),
            ("cm", 8582),
            ("mmhg", 8876),
            ("mmHg", 8876),
            ("bpm", 8483),
            ("beats/min", 8483),
            ("iu/l", 8646),
            ("IU/L", 8646),
            ("u/l", 8645),
            ("U/L", 8645),
            ("ml/min", 8794),
            ("ml/min/1.73m2", 9067),
            ("ng/ml", 8842),
            ("ng/mL", 8842),
            ("pg/ml", 8847),
            ("pg/mL", 8847),
            ("mcg/ml", 9551),
            ("mcg/l", 8925),
            ("cells/ul", 8784),
            ("cells/mm3", 8848),
            ("copies/ml", 9570),
            ("x10^9/l", 8815),
            ("x10^3/ul", 8961),
            ("mol/l", 8974),
            ("umol/l", 8749),
            ("nmol/l", 8988),
            ("ratio", 8523),
            ("score", 44777566),
            ("mg", 8576),
            ("g", 8504),
            ("l", 8519),
            ("ml", 8587),
        ];
        Self { entries: pairs.iter().map(|(text, id)| (text.to_lowercase(), *id)).collect() }
    }

    /// Looks up the OMOP `unit_concept_id` for a free-text unit, matching
    /// case-insensitively after trimming whitespace.
    #[must_use]
    pub fn lookup(&self, unit_text: &str) -> Option<i64> {
        self.entries.get(&unit_text.trim().to_lowercase()).copied()
    }

    /// Number of entries in the table, exposed for the "~50 entries"
    /// invariant named in spec.md §4.6.6.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns whether the table has any entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for UnitTable {
    fn default() -> Self {
        Self::default_table()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_unit_resolves_case_insensitively() {
        let table = UnitTable::default_table();
        assert_eq!(table.lookup("Years"), Some(9448));
        assert_eq!(table.lookup("  mg/dL  "), Some(8840));
    }

    #[test]
    fn unknown_unit_returns_none() {
        let table = UnitTable::default_table();
        assert_eq!(table.lookup("furlongs/fortnight"), None);
    }

    #[test]
    fn table_has_roughly_fifty_entries() {
        let table = UnitTable::default_table();
        assert!(table.len() >= 40 && table.len() <= 60);
    }
}
