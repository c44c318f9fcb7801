// crates/elixir-core/src/domain/entity.rs
// ============================================================================
// Module: Entity
// Description: One grounded medical concept inside a criterion.
// Purpose: Hold the original mention, span, candidate codes across six
//          vocabularies, and the grounding method that produced them.
// Dependencies: crate::identifiers, crate::domain::criterion
// ============================================================================

//! ## Overview
//! An [`Entity`] is produced by the `ground` node's entity-extraction step
//! and mutated by the dual-grounding + agentic retry algorithm (spec.md
//! §4.6.4). Its code fields are populated independently per vocabulary;
//! `grounding_method` records how (or whether) grounding succeeded.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::domain::criterion::CriterionReviewStatus;
use crate::identifiers::CriterionId;
use crate::identifiers::EntityId;

// ============================================================================
// SECTION: Entity Type
// ============================================================================

/// The clinical category of an entity mention, used to select the
/// [`crate::domain::entity::EntityType`]-keyed routing table in
/// `elixir-terminology`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    /// A disease, disorder, or abnormal finding.
    Condition,
    /// A lab value, vital sign, or other measurement.
    Measurement,
    /// A medication or therapeutic substance.
    Drug,
    /// A medical procedure or intervention.
    Procedure,
    /// An age, sex, or other demographic attribute.
    Demographic,
    /// A consent-related statement; never groundable, always skipped.
    Consent,
    /// Anything not covered by the above.
    Other,
}

impl EntityType {
    /// Consent entities are short-circuited before routing (spec.md §4.6.4).
    #[must_use]
    pub const fn is_groundable(self) -> bool {
        !matches!(self, Self::Consent)
    }
}

// ============================================================================
// SECTION: Grounding Method
// ============================================================================

/// How (or whether) an entity was grounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroundingMethod {
    /// Grounded via an exact terminology match.
    Exact,
    /// Grounded via a terminology search/fuzzy match.
    Search,
    /// Grounded via the agentic retry loop's reasoning.
    Agentic,
    /// The agentic loop exhausted its attempts without confidence; a human
    /// must review and ground it manually.
    ExpertReview,
    /// Never attempted (consent entities).
    Skipped,
}

// ============================================================================
// SECTION: Codes
// ============================================================================

/// The six vocabulary code slots an entity may carry.
///
/// # Invariants
/// - Either `grounding_method` is `Skipped`, or at least one field here is
///   `Some`, or `grounding_method` is `ExpertReview` (spec.md §3 Entity
///   invariant, §8 invariant 3).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityCodes {
    /// UMLS Concept Unique Identifier.
    pub umls_cui: Option<String>,
    /// SNOMED CT code.
    pub snomed_code: Option<String>,
    /// ICD-10 code.
    pub icd10_code: Option<String>,
    /// RxNorm code.
    pub rxnorm_code: Option<String>,
    /// LOINC code.
    pub loinc_code: Option<String>,
    /// Human Phenotype Ontology code.
    pub hpo_code: Option<String>,
}

impl EntityCodes {
    /// Returns whether any vocabulary code field is populated.
    #[must_use]
    pub const fn has_any_code(&self) -> bool {
        self.umls_cui.is_some()
            || self.snomed_code.is_some()
            || self.icd10_code.is_some()
            || self.rxnorm_code.is_some()
            || self.loinc_code.is_some()
            || self.hpo_code.is_some()
    }
}

// ============================================================================
// SECTION: Entity
// ============================================================================

/// One grounded medical concept inside a criterion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Unique identifier.
    pub id: EntityId,
    /// Owning criterion.
    pub criterion_id: CriterionId,
    /// Original mention text as extracted.
    pub entity_text: String,
    /// Clinical category.
    pub entity_type: EntityType,
    /// Start offset of the mention within `Criterion.text`.
    pub span_start: u32,
    /// End offset (exclusive) of the mention within `Criterion.text`.
    pub span_end: u32,
    /// Surrounding context captured for the grounding/decision prompts.
    pub context_window: Option<JsonValue>,
    /// Vocabulary codes, populated independently.
    pub codes: EntityCodes,
    /// OMOP standard concept preferred term, when resolved.
    pub preferred_term: Option<String>,
    /// Combined grounding confidence in `[0, 1]`.
    pub grounding_confidence: f64,
    /// How grounding was achieved (or why it was skipped/deferred).
    pub grounding_method: GroundingMethod,
    /// Review status; distinct from the owning criterion's own status.
    pub review_status: CriterionReviewStatus,
}

impl Entity {
    /// Creates a freshly extracted, ungrounded entity.
    #[must_use]
    pub fn new(criterion_id: CriterionId, entity_text: impl Into<String>, entity_type: EntityType, span_start: u32, span_end: u32) -> Self {
        Self {
            id: EntityId::new(),
            criterion_id,
            entity_text: entity_text.into(),
            entity_type,
            span_start,
            span_end,
            context_window: None,
            codes: EntityCodes::default(),
            preferred_term: None,
            grounding_confidence: 0.0,
            grounding_method: GroundingMethod::Skipped,
            review_status: CriterionReviewStatus::Unreviewed,
        }
    }

    /// Validates the invariant from spec.md §3/§8 invariant 3: either
    /// skipped, expert-reviewed, or carrying at least one code.
    #[must_use]
    pub fn satisfies_grounding_invariant(&self) -> bool {
        match self.grounding_method {
            GroundingMethod::Skipped | GroundingMethod::ExpertReview => true,
            GroundingMethod::Exact | GroundingMethod::Search | GroundingMethod::Agentic => {
                self.codes.has_any_code()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consent_entities_are_never_groundable() {
        assert!(!EntityType::Consent.is_groundable());
        assert!(EntityType::Condition.is_groundable());
    }

    #[test]
    fn skipped_entity_satisfies_invariant_without_codes() {
        let mut entity = Entity::new(CriterionId::new(), "consent to participate", EntityType::Consent, 0, 10);
        entity.grounding_method = GroundingMethod::Skipped;
        assert!(entity.satisfies_grounding_invariant());
    }

    #[test]
    fn expert_review_satisfies_invariant_even_without_codes() {
        let mut entity = Entity::new(CriterionId::new(), "rare finding", EntityType::Condition, 0, 10);
        entity.grounding_method = GroundingMethod::ExpertReview;
        assert!(entity.satisfies_grounding_invariant());
    }

    #[test]
    fn exact_grounding_without_any_code_violates_invariant() {
        let mut entity = Entity::new(CriterionId::new(), "diabetes", EntityType::Condition, 0, 8);
        entity.grounding_method = GroundingMethod::Exact;
        assert!(!entity.satisfies_grounding_invariant());
        entity.codes.snomed_code = Some("44054006".to_string());
        assert!(entity.satisfies_grounding_invariant());
    }
}
