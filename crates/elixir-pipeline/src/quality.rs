// crates/elixir-pipeline/src/quality.rs
// ============================================================================
// Module: Document Quality Scoring
// Description: Pure scoring functions over a parsed document and an
//              extraction batch, used by `ingest` and surfaced to operators.
// Purpose: Give the `ingest` node a single score to stamp onto
//          `Protocol.metadata.quality_score`, and give operators a richer
//          post-pipeline report (spec.md §4.6.1, SPEC_FULL.md §4.6.0/§4.10).
// Dependencies: elixir_core::{ParsedDocument, Protocol, Criterion, Entity}
// ============================================================================

//! ## Overview
//! [`score_document`] implements the weighted formula named in spec.md
//! §4.6.1: extractability dominates, page count and encoding cleanliness
//! contribute smaller corrections. [`report`] is the SUPPLEMENT surface
//! named in SPEC_FULL.md §4.10 — it is never written back to the protocol
//! row, only returned to an operator or the CLI.

// ============================================================================
// SECTION: Imports
// ============================================================================

use elixir_core::Criterion;
use elixir_core::Entity;
use elixir_core::GroundingMethod;
use elixir_core::ParsedDocument;
use elixir_core::Protocol;
use elixir_core::ProtocolId;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Page count at or above which a document is considered to have enough
/// material to extract a full criteria set from.
const SUFFICIENT_PAGE_COUNT: f64 = 3.0;

/// Weight applied to the text-extractability component.
const TEXT_EXTRACTABILITY_WEIGHT: f64 = 0.70;

/// Weight applied to the page-count-sufficiency component.
const PAGE_COUNT_WEIGHT: f64 = 0.20;

/// Weight applied to the encoding-cleanliness component.
const ENCODING_WEIGHT: f64 = 0.10;

// ============================================================================
// SECTION: Document Score
// ============================================================================

/// Scores a parsed document in `[0, 1]`, weighting text extractability most
/// heavily, then page count sufficiency, then encoding cleanliness (spec.md
/// §4.6.1).
#[must_use]
pub fn score_document(document: &ParsedDocument) -> f64 {
    let extractability = text_extractability(document);
    let page_sufficiency = page_count_sufficiency(document);
    let encoding = encoding_bonus(document);

    (TEXT_EXTRACTABILITY_WEIGHT * extractability) + (PAGE_COUNT_WEIGHT * page_sufficiency) + (ENCODING_WEIGHT * encoding)
}

/// Ratio of confidently extractable characters to total characters across
/// every page. A document with no characters at all scores zero.
fn text_extractability(document: &ParsedDocument) -> f64 {
    let total: u64 = document.pages.iter().map(|page| u64::from(page.total_chars)).sum();
    if total == 0 {
        return 0.0;
    }
    let extractable: u64 = document.pages.iter().map(|page| u64::from(page.extractable_chars)).sum();
    #[allow(clippy::cast_precision_loss, reason = "character counts are far below f64's exact-integer range")]
    let ratio = extractable as f64 / total as f64;
    ratio.clamp(0.0, 1.0)
}

/// Linear ramp to 1.0 at [`SUFFICIENT_PAGE_COUNT`] pages; shorter documents
/// score proportionally lower.
fn page_count_sufficiency(document: &ParsedDocument) -> f64 {
    #[allow(clippy::cast_precision_loss, reason = "page counts are far below f64's exact-integer range")]
    let page_count = document.pages.len() as f64;
    (page_count / SUFFICIENT_PAGE_COUNT).clamp(0.0, 1.0)
}

/// Fraction of pages with no garbled (non-extractable) content at all.
fn encoding_bonus(document: &ParsedDocument) -> f64 {
    if document.pages.is_empty() {
        return 0.0;
    }
    let clean_pages = document.pages.iter().filter(|page| page.extractable_chars == page.total_chars).count();
    #[allow(clippy::cast_precision_loss, reason = "page counts are far below f64's exact-integer range")]
    let ratio = clean_pages as f64 / document.pages.len() as f64;
    ratio
}

// ============================================================================
// SECTION: Quality Report
// ============================================================================

/// A post-pipeline quality/evaluation summary for one protocol
/// (SPEC_FULL.md §4.10 SUPPLEMENT), combining the document score computed at
/// `ingest` with the grounding and review outcomes of its active batch.
#[derive(Debug, Clone, PartialEq)]
pub struct QualityReport {
    /// The protocol this report summarizes.
    pub protocol_id: ProtocolId,
    /// The document quality score stamped by `ingest`, if the protocol has
    /// reached that stage.
    pub document_score: Option<f64>,
    /// Number of criteria in the active batch.
    pub criteria_count: usize,
    /// Fraction of groundable entities that carry at least one vocabulary
    /// code, `0.0` if there are no groundable entities.
    pub grounded_entity_ratio: f64,
    /// Fraction of groundable entities that exhausted agentic grounding and
    /// were deferred to a human.
    pub expert_review_ratio: f64,
}

/// Builds a [`QualityReport`] from a protocol and its active batch's
/// criteria/entities.
#[must_use]
pub fn report(protocol: &Protocol, criteria: &[Criterion], entities: &[Entity]) -> QualityReport {
    let groundable: Vec<&Entity> = entities.iter().filter(|entity| entity.entity_type.is_groundable()).collect();
    let groundable_count = groundable.len();

    let grounded_count = groundable.iter().filter(|entity| entity.codes.has_any_code()).count();
    let expert_review_count = groundable.iter().filter(|entity| entity.grounding_method == GroundingMethod::ExpertReview).count();

    #[allow(clippy::cast_precision_loss, reason = "entity counts are far below f64's exact-integer range")]
    let grounded_entity_ratio = if groundable_count == 0 { 0.0 } else { grounded_count as f64 / groundable_count as f64 };
    #[allow(clippy::cast_precision_loss, reason = "entity counts are far below f64's exact-integer range")]
    let expert_review_ratio = if groundable_count == 0 { 0.0 } else { expert_review_count as f64 / groundable_count as f64 };

    QualityReport {
        protocol_id: protocol.id,
        document_score: protocol.metadata.quality_score,
        criteria_count: criteria.len(),
        grounded_entity_ratio,
        expert_review_ratio,
    }
}

#[cfg(test)]
mod tests {
    use elixir_core::EntityType;

    use super::*;

    fn page(extractable: u32, total: u32) -> elixir_core::ParsedPage {
        elixir_core::ParsedPage { page_number: 1, blocks: vec!["text".to_string()], extractable_chars: extractable, total_chars: total }
    }

    #[test]
    fn fully_clean_three_page_document_scores_close_to_one() {
        let document = ParsedDocument { pages: vec![page(100, 100), page(100, 100), page(100, 100)] };
        let score = score_document(&document);
        assert!(score > 0.95, "expected near-perfect score, got {score}");
    }

    #[test]
    fn empty_document_scores_zero() {
        let document = ParsedDocument::default();
        assert_eq!(score_document(&document), 0.0);
    }

    #[test]
    fn short_garbled_document_scores_low() {
        let document = ParsedDocument { pages: vec![page(10, 100)] };
        let score = score_document(&document);
        assert!(score < 0.2, "expected low score, got {score}");
    }

    #[test]
    fn report_computes_grounded_and_expert_review_ratios_over_groundable_entities_only() {
        let protocol = Protocol::new("Trial", "uri");
        let criterion_id = elixir_core::CriterionId::new();
        let mut grounded = Entity::new(criterion_id, "diabetes", EntityType::Condition, 0, 8);
        grounded.codes.snomed_code = Some("44054006".to_string());
        let mut expert = Entity::new(criterion_id, "rare finding", EntityType::Condition, 0, 12);
        expert.grounding_method = GroundingMethod::ExpertReview;
        let consent = Entity::new(criterion_id, "consent to participate", EntityType::Consent, 0, 22);

        let report = report(&protocol, &[], &[grounded, expert, consent]);
        assert_eq!(report.grounded_entity_ratio, 0.5);
        assert_eq!(report.expert_review_ratio, 0.5);
    }
}
