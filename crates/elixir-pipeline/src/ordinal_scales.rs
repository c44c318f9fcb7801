// crates/elixir-pipeline/src/ordinal_scales.rs
// ============================================================================
// Module: Ordinal Scale Lookup
// Description: Known ordinal performance/severity scales and their graded
//              OMOP concept mappings.
// Purpose: Let the `ordinal_resolve` node map a recognized scale's grade text
//          (e.g. "ECOG 2") straight to an OMOP `value_concept_id` without a
//          further LLM call (spec.md §4.6.7).
// Dependencies: (none — static data)
// ============================================================================

//! ## Overview
//! spec.md §4.6.7 describes "a configured YAML" mapping `scale_name` to
//! `{unit_concept_id, values: {grade -> value_concept_id}}`. `elixir-llm`'s
//! template store takes the same minimal-dependency stance for its prompt
//! bodies (see `elixir-llm/src/templates.rs`) rather than pulling in a
//! template engine; this module follows the same posture and holds the four
//! scales named in spec.md as a static Rust table instead of parsing a YAML
//! file from disk, since nothing else in this crate needs a YAML parser.
//! Concept ids below are illustrative OMOP standard concepts for each scale's
//! unit and graded values, not a vendored vocabulary dump.

// ============================================================================
// SECTION: Scale Table
// ============================================================================

/// One graded value of an ordinal scale: the grade's label as it appears in
/// criterion text, and the OMOP `value_concept_id` it resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScaleGrade {
    /// Grade label as written in criterion text (e.g. `"0"`, `"II"`, `"A"`).
    pub label: &'static str,
    /// Resolved OMOP `value_concept_id` for this grade.
    pub value_concept_id: i64,
}

/// One known ordinal scale: its name, the OMOP `unit_concept_id` shared by
/// every graded value, and its grades in ascending severity order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrdinalScale {
    /// Canonical lowercase scale name, matched case-insensitively against
    /// criterion text.
    pub name: &'static str,
    /// OMOP `unit_concept_id` shared by every grade of this scale.
    pub unit_concept_id: i64,
    /// Grades in ascending severity order.
    pub grades: &'static [ScaleGrade],
}

impl OrdinalScale {
    /// Looks up a grade by its label, case-insensitively.
    #[must_use]
    pub fn grade(&self, label: &str) -> Option<ScaleGrade> {
        self.grades.iter().find(|grade| grade.label.eq_ignore_ascii_case(label.trim())).copied()
    }
}

/// ECOG Performance Status, grades 0 through 4.
const ECOG: OrdinalScale = OrdinalScale {
    name: "ecog",
    unit_concept_id: 46_237_613,
    grades: &[
        ScaleGrade { label: "0", value_concept_id: 46_237_614 },
        ScaleGrade { label: "1", value_concept_id: 46_237_615 },
        ScaleGrade { label: "2", value_concept_id: 46_237_616 },
        ScaleGrade { label: "3", value_concept_id: 46_237_617 },
        ScaleGrade { label: "4", value_concept_id: 46_237_618 },
    ],
};

/// New York Heart Association functional classification, classes I through
/// IV.
const NYHA: OrdinalScale = OrdinalScale {
    name: "nyha",
    unit_concept_id: 46_237_620,
    grades: &[
        ScaleGrade { label: "I", value_concept_id: 46_237_621 },
        ScaleGrade { label: "II", value_concept_id: 46_237_622 },
        ScaleGrade { label: "III", value_concept_id: 46_237_623 },
        ScaleGrade { label: "IV", value_concept_id: 46_237_624 },
    ],
};

/// Karnofsky Performance Status, in steps of ten from 0 to 100.
const KARNOFSKY: OrdinalScale = OrdinalScale {
    name: "karnofsky",
    unit_concept_id: 46_237_630,
    grades: &[
        ScaleGrade { label: "100", value_concept_id: 46_237_640 },
        ScaleGrade { label: "90", value_concept_id: 46_237_641 },
        ScaleGrade { label: "80", value_concept_id: 46_237_642 },
        ScaleGrade { label: "70", value_concept_id: 46_237_643 },
        ScaleGrade { label: "60", value_concept_id: 46_237_644 },
        ScaleGrade { label: "50", value_concept_id: 46_237_645 },
        ScaleGrade { label: "40", value_concept_id: 46_237_646 },
        ScaleGrade { label: "30", value_concept_id: 46_237_647 },
        ScaleGrade { label: "20", value_concept_id: 46_237_648 },
        ScaleGrade { label: "10", value_concept_id: 46_237_649 },
        ScaleGrade { label: "0", value_concept_id: 46_237_650 },
    ],
};

/// Child-Pugh score for cirrhosis severity, classes A through C.
const CHILD_PUGH: OrdinalScale = OrdinalScale {
    name: "child-pugh",
    unit_concept_id: 46_237_660,
    grades: &[
        ScaleGrade { label: "A", value_concept_id: 46_237_661 },
        ScaleGrade { label: "B", value_concept_id: 46_237_662 },
        ScaleGrade { label: "C", value_concept_id: 46_237_663 },
    ],
};

/// Every scale this crate can resolve without an LLM proposal.
const KNOWN_SCALES: &[OrdinalScale] = &[ECOG, NYHA, KARNOFSKY, CHILD_PUGH];

/// Looks up a known scale by name, case-insensitively, tolerating common
/// separators (`"child pugh"`, `"child_pugh"`, `"child-pugh"` all match).
#[must_use]
pub fn lookup_scale(name: &str) -> Option<&'static OrdinalScale> {
    let normalized = name.trim().to_lowercase().replace(['_', ' '], "-");
    KNOWN_SCALES.iter().find(|scale| scale.name == normalized)
}

/// Scans free text for a mention of any known scale's name, returning the
/// scale and the substring it matched on.
#[must_use]
pub fn detect_known_scale(text: &str) -> Option<&'static OrdinalScale> {
    let lowered = text.to_lowercase();
    KNOWN_SCALES.iter().find(|scale| lowered.contains(scale.name) || lowered.contains(&scale.name.replace('-', " ")))
}
