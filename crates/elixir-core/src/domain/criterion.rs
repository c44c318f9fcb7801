// crates/elixir-core/src/domain/criterion.rs
// ============================================================================
// Module: Criterion
// Description: One eligibility statement, its field mappings, and temporal
//              / numeric annotations.
// Purpose: Model the per-statement row criteria mutate through review, plus
//          the Entity-Relation-Value-Unit field mapping shape used by
//          join-ready exports.
// Dependencies: crate::identifiers, crate::time
// ============================================================================

//! ## Overview
//! A [`Criterion`] is unique within its batch by `(text, criterion_type)`
//! (spec.md §8 invariant 2) and is mutated only via a review action — never
//! directly by a pipeline node after `parse` creates it. `conditions` holds
//! the post-v1.5 `field_mappings` array; before grounding completes it is
//! empty.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value as JsonValue;

use uuid::Uuid;

use crate::identifiers::CriteriaBatchId;
use crate::identifiers::CriterionId;
use crate::time::Timestamp;

// ============================================================================
// SECTION: Criterion Type / Assertion
// ============================================================================

/// Whether a criterion is an inclusion or exclusion statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CriterionType {
    /// Subject must satisfy this criterion to be eligible.
    Inclusion,
    /// Subject satisfying this criterion is excluded.
    Exclusion,
}

/// Whether the extracted phrasing affirms or negates the underlying
/// statement (e.g. "no known history of X" is `Negated`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Assertion {
    /// The statement is affirmed as written.
    Affirmed,
    /// The statement is negated ("no known...", "absence of...").
    Negated,
}

// ============================================================================
// SECTION: Review Status
// ============================================================================

/// Review status of a criterion or entity.
///
/// # Invariants
/// - `Unreviewed` is the only status a freshly parsed criterion may hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CriterionReviewStatus {
    /// No reviewer action has been applied yet (wire form of SQL `NULL`).
    Unreviewed,
    /// A reviewer approved the criterion as extracted.
    Approved,
    /// A reviewer rejected the criterion.
    Rejected,
    /// A reviewer edited the criterion's text or structured fields.
    Modified,
}

impl CriterionReviewStatus {
    /// Returns whether this status represents a completed review action.
    #[must_use]
    pub const fn is_reviewed(self) -> bool {
        !matches!(self, Self::Unreviewed)
    }
}

// ============================================================================
// SECTION: Field Mapping (Entity-Relation-Value-Unit)
// ============================================================================

/// Comparison relation used by a [`FieldMapping`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Relation {
    /// Equal to.
    #[serde(rename = "=")]
    Eq,
    /// Not equal to.
    #[serde(rename = "!=")]
    Ne,
    /// Strictly greater than.
    #[serde(rename = ">")]
    Gt,
    /// Greater than or equal to.
    #[serde(rename = ">=")]
    Ge,
    /// Strictly less than.
    #[serde(rename = "<")]
    Lt,
    /// Less than or equal to.
    #[serde(rename = "<=")]
    Le,
    /// Value falls within an inclusive `{min, max}` range.
    #[serde(rename = "within")]
    Within,
    /// Event did not occur within the given trailing duration.
    #[serde(rename = "not_in_last")]
    NotInLast,
    /// Set/text containment.
    #[serde(rename = "contains")]
    Contains,
    /// Negated set/text containment.
    #[serde(rename = "not_contains")]
    NotContains,
}

/// The value side of a [`FieldMapping`].
///
/// # Invariants
/// - `Range` is only meaningful with [`Relation::Within`].
/// - `Duration` is only meaningful with [`Relation::NotInLast`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MappingValue {
    /// A single scalar number.
    Scalar(f64),
    /// A single text value (e.g. a boolean concept like "positive").
    Text(String),
    /// An inclusive numeric range.
    Range {
        /// Inclusive lower bound.
        min: f64,
        /// Inclusive upper bound.
        max: f64,
    },
    /// A duration paired with a unit (e.g. "6 months").
    Duration {
        /// Numeric duration magnitude.
        duration: f64,
        /// Unit text for the duration (e.g. `"months"`).
        unit: String,
    },
}

/// One Entity-Relation-Value-Unit triplet used for join-ready export.
///
/// # Invariants
/// - `entity` matches the `entity_text` of a sibling [`crate::domain::entity::Entity`]
///   on the same criterion.
/// - A criterion may carry one or more mappings, interpreted conjunctively.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldMapping {
    /// Original entity mention text this mapping refers to.
    pub entity: String,
    /// Resolved OMOP `concept_id` for the entity, when known.
    pub entity_concept_id: Option<i64>,
    /// Comparison relation, populated by the `structure` node.
    pub relation: Option<Relation>,
    /// Comparison value, populated by the `structure` node.
    pub value: Option<MappingValue>,
    /// Free-text unit as extracted (e.g. `"mg/dL"`).
    pub unit_text: Option<String>,
    /// OMOP `unit_concept_id` resolved via the UCUM table.
    pub unit_concept_id: Option<i64>,
    /// OMOP `concept_id` for a boolean/categorical value (e.g. a SNOMED
    /// "positive"/"negative" concept).
    pub value_concept_id: Option<i64>,
}

impl FieldMapping {
    /// Creates an unpopulated mapping for an entity, as written by the
    /// `persist` node before `structure` fills in relation/value.
    #[must_use]
    pub fn unpopulated(entity: impl Into<String>, entity_concept_id: Option<i64>) -> Self {
        Self {
            entity: entity.into(),
            entity_concept_id,
            relation: None,
            value: None,
            unit_text: None,
            unit_concept_id: None,
            value_concept_id: None,
        }
    }
}

/// The JSON-shaped `conditions` bag on a [`Criterion`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Conditions {
    /// Field mappings populated from `persist` onward.
    #[serde(default)]
    pub field_mappings: Vec<FieldMapping>,
}

// ============================================================================
// SECTION: Criterion
// ============================================================================

/// One eligibility statement extracted from a protocol.
///
/// # Invariants
/// - `(text, criterion_type)` is unique within `batch_id` among
///   non-archived batches (spec.md §8 invariant 2).
/// - Mutated only via a review action once created by `parse`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Criterion {
    /// Unique identifier, stable across re-runs of `parse` on unchanged
    /// extraction output via [`stable_criterion_id`].
    pub id: CriterionId,
    /// Owning batch.
    pub batch_id: CriteriaBatchId,
    /// Inclusion or exclusion.
    pub criterion_type: CriterionType,
    /// Extracted criterion text.
    pub text: String,
    /// Whether the statement is affirmed or negated.
    pub assertion: Assertion,
    /// Free-form category tag assigned by the extraction LLM.
    pub category: Option<String>,
    /// Extraction confidence in `[0, 1]`.
    pub confidence: f64,
    /// Source page number.
    pub page_number: Option<u32>,
    /// Review status; `None`/`Unreviewed` until a reviewer acts.
    pub review_status: CriterionReviewStatus,
    /// Structured field mappings and other post-extraction annotations.
    pub conditions: Conditions,
    /// Free-text temporal constraint, if any (e.g. "within 6 months").
    pub temporal_constraint: Option<String>,
    /// Raw numeric thresholds captured before unit normalization, as JSON.
    pub numeric_thresholds: Option<JsonValue>,
}

/// Fixed namespace UUID [`stable_criterion_id`] derives every criterion id
/// from, so that re-running `parse` on unchanged extraction output is
/// reproducible rather than re-randomized (spec.md §8 invariant 7).
const CRITERION_ID_NAMESPACE: Uuid = Uuid::from_u128(0x8a3d_0c2e_8e0b_4a6d_9b1f_2d7c5e4a1f60);

/// Derives a [`CriterionId`] deterministically from the batch it belongs to
/// and its de-duplication key, so the same `(batch_id, text, criterion_type)`
/// always yields the same id (spec.md §8 invariant 7).
#[must_use]
pub fn stable_criterion_id(batch_id: CriteriaBatchId, text: &str, criterion_type: CriterionType) -> CriterionId {
    let key = format!("{}|{}|{:?}", batch_id.get(), normalize_text(text), criterion_type);
    CriterionId::from_uuid(Uuid::new_v5(&CRITERION_ID_NAMESPACE, key.as_bytes()))
}

impl Criterion {
    /// Creates a freshly parsed, unreviewed criterion.
    #[must_use]
    #[allow(clippy::too_many_arguments, reason = "mirrors the extraction schema's flat shape")]
    pub fn new(
        batch_id: CriteriaBatchId,
        criterion_type: CriterionType,
        text: impl Into<String>,
        assertion: Assertion,
        category: Option<String>,
        confidence: f64,
        page_number: Option<u32>,
    ) -> Self {
        let text = text.into();
        Self {
            id: stable_criterion_id(batch_id, &text, criterion_type),
            batch_id,
            criterion_type,
            text,
            assertion,
            category,
            confidence,
            page_number,
            review_status: CriterionReviewStatus::Unreviewed,
            conditions: Conditions::default(),
            temporal_constraint: None,
            numeric_thresholds: None,
        }
    }

    /// Normalized key used to detect duplicates within a batch: lowercased,
    /// whitespace-collapsed text paired with the criterion type.
    #[must_use]
    pub fn dedupe_key(&self) -> (String, CriterionType) {
        (normalize_text(&self.text), self.criterion_type)
    }
}

/// Lowercases and collapses runs of whitespace, matching the `parse` node's
/// dedupe-by-normalized-text rule (spec.md §4.6.3a).
#[must_use]
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

/// Checks whether a set of criteria in the same batch violates the
/// `(text, criterion_type)` uniqueness invariant (spec.md §8 invariant 2).
/// Returns the duplicate keys found, if any.
#[must_use]
pub fn find_duplicate_keys(criteria: &[Criterion]) -> Vec<(String, CriterionType)> {
    let mut seen = BTreeSet::new();
    let mut duplicates = Vec::new();
    for criterion in criteria {
        let key = criterion.dedupe_key();
        let key_for_set = (key.0.clone(), matches!(key.1, CriterionType::Exclusion));
        if !seen.insert(key_for_set) {
            duplicates.push(key);
        }
    }
    duplicates
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(batch: CriteriaBatchId, text: &str, kind: CriterionType) -> Criterion {
        Criterion::new(batch, kind, text, Assertion::Affirmed, None, 0.9, Some(1))
    }

    #[test]
    fn dedupe_key_normalizes_case_and_whitespace() {
        let batch = CriteriaBatchId::new();
        let a = sample(batch, "Age  >=   18 years", CriterionType::Inclusion);
        let b = sample(batch, "age >= 18 years", CriterionType::Inclusion);
        assert_eq!(a.dedupe_key(), b.dedupe_key());
    }

    #[test]
    fn duplicate_keys_are_detected_within_a_batch() {
        let batch = CriteriaBatchId::new();
        let criteria = vec![
            sample(batch, "Age >= 18 years", CriterionType::Inclusion),
            sample(batch, "age >= 18 years", CriterionType::Inclusion),
            sample(batch, "Age >= 18 years", CriterionType::Exclusion),
        ];
        let duplicates = find_duplicate_keys(&criteria);
        assert_eq!(duplicates.len(), 1);
    }

    #[test]
    fn same_text_different_type_is_not_a_duplicate() {
        let batch = CriteriaBatchId::new();
        let criteria = vec![
            sample(batch, "History of diabetes", CriterionType::Inclusion),
            sample(batch, "History of diabetes", CriterionType::Exclusion),
        ];
        assert!(find_duplicate_keys(&criteria).is_empty());
    }

    #[test]
    fn stable_criterion_id_is_deterministic_for_unchanged_input() {
        let batch = CriteriaBatchId::new();
        let first = sample(batch, "Age >= 18 years", CriterionType::Inclusion);
        let second = sample(batch, "age  >=   18 years", CriterionType::Inclusion);
        assert_eq!(first.id, second.id, "re-running parse on unchanged text must reproduce the same id");
    }

    #[test]
    fn stable_criterion_id_differs_by_type_and_batch() {
        let batch = CriteriaBatchId::new();
        let other_batch = CriteriaBatchId::new();
        let inclusion = sample(batch, "Age >= 18 years", CriterionType::Inclusion);
        let exclusion = sample(batch, "Age >= 18 years", CriterionType::Exclusion);
        let other = sample(other_batch, "Age >= 18 years", CriterionType::Inclusion);
        assert_ne!(inclusion.id, exclusion.id);
        assert_ne!(inclusion.id, other.id);
    }

    #[test]
    fn field_mapping_serializes_relation_with_symbolic_tag() {
        let mapping = FieldMapping {
            entity: "Age".to_string(),
            entity_concept_id: None,
            relation: Some(Relation::Ge),
            value: Some(MappingValue::Scalar(18.0)),
            unit_text: Some("years".to_string()),
            unit_concept_id: Some(9448),
            value_concept_id: None,
        };
        let json = serde_json::to_value(&mapping).expect("serialize");
        assert_eq!(json["relation"], serde_json::json!(">="));
    }
}
