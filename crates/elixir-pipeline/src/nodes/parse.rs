// crates/elixir-pipeline/src/nodes/parse.rs
// ============================================================================
// Module: Parse Node
// Description: Dedupes extracted criteria, creates the batch, and persists
//              the parsed criteria (spec.md §4.6.3).
// Dependencies: elixir_core
// ============================================================================

use elixir_core::Assertion;
use elixir_core::CriteriaBatch;
use elixir_core::CriteriaBatchId;
use elixir_core::Criterion;
use elixir_core::CriterionType;
use elixir_core::NodeError;
use elixir_core::PipelineNode;
use elixir_core::Protocol;
use elixir_core::ProtocolStatus;
use serde_json::Value as JsonValue;

use super::state::ExtractState;
use super::state::ExtractedCriterion;
use super::state::ParseState;
use crate::runner::PipelineRunner;

/// Name and version reported for criteria produced by this pipeline, used to
/// stamp the batch's provenance fields.
const SOURCE_LLM_NAME: &str = "gemini";
const SOURCE_LLM_VERSION: &str = "structured-output-v1";

/// Dedupes the extraction output, creates a batch, and persists its criteria.
///
/// # Errors
/// Returns [`NodeError`] if the previous node's carry state cannot be read
/// or the batch/criteria cannot be persisted.
pub async fn run(runner: &PipelineRunner, protocol: &mut Protocol, carry: &JsonValue) -> Result<JsonValue, NodeError> {
    let extract_state: ExtractState = super::from_carry(PipelineNode::Parse, carry)?;

    let batch = CriteriaBatch::new(protocol.id, SOURCE_LLM_NAME, SOURCE_LLM_VERSION);
    let criteria = build_criteria(batch.id, &extract_state.criteria);

    runner.batches.insert(&batch).await.map_err(|error| {
        NodeError::new(PipelineNode::Parse, "failed to persist criteria batch").with_technical_detail(error.to_string())
    })?;
    runner.criteria.insert_many(&criteria).await.map_err(|error| {
        NodeError::new(PipelineNode::Parse, "failed to persist criteria").with_technical_detail(error.to_string())
    })?;

    protocol.advance(ProtocolStatus::Grounding);

    let criterion_ids = criteria.iter().map(|criterion| criterion.id).collect();
    super::to_carry(PipelineNode::Parse, &ParseState { batch_id: batch.id, criterion_ids })
}

/// Builds the batch's [`Criterion`] rows, splitting enumerated statements and
/// dropping duplicates by `(normalized text, criterion_type)` (spec.md §4.6.3,
/// §8 invariant 2).
fn build_criteria(batch_id: CriteriaBatchId, extracted: &[ExtractedCriterion]) -> Vec<Criterion> {
    let mut seen = std::collections::BTreeSet::new();
    let mut criteria = Vec::new();

    for item in extracted {
        for text in split_enumeration(&item.text) {
            let key = (elixir_core::normalize_text(&text), matches!(item.criterion_type, CriterionType::Exclusion));
            if !seen.insert(key) {
                continue;
            }
            let assertion = normalize_assertion(&text, item.assertion);
            criteria.push(Criterion::new(batch_id, item.criterion_type, text, assertion, item.category.clone(), item.confidence, item.page_number));
        }
    }

    criteria
}

/// Splits an enumerated criterion statement (`"a, b, or c"`-style lists
/// introduced by a shared stem) into its individual clauses. Statements
/// without a recognized enumeration separator are returned unchanged
/// (spec.md §4.6.3b).
fn split_enumeration(text: &str) -> Vec<String> {
    let trimmed = text.trim();
    if !trimmed.contains(';') {
        return vec![trimmed.to_string()];
    }
    trimmed
        .split(';')
        .map(str::trim)
        .filter(|clause| !clause.is_empty())
        .map(|clause| clause.trim_end_matches('.').to_string())
        .collect()
}

/// Overrides the default assertion derived by the extraction model when the
/// criterion text itself carries an explicit negation marker the model
/// missed (spec.md §4.6.3c).
fn normalize_assertion(text: &str, assertion: Assertion) -> Assertion {
    const NEGATION_MARKERS: [&str; 3] = ["no known history of", "absence of", "without evidence of"];
    let lowered = text.to_lowercase();
    if NEGATION_MARKERS.iter().any(|marker| lowered.contains(marker)) {
        Assertion::Negated
    } else {
        assertion
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_enumeration_leaves_plain_statements_unchanged() {
        assert_eq!(split_enumeration("Age >= 18 years"), vec!["Age >= 18 years".to_string()]);
    }

    #[test]
    fn split_enumeration_splits_on_semicolons() {
        let clauses = split_enumeration("ALT > 3x ULN; AST > 3x ULN; bilirubin > 2x ULN.");
        assert_eq!(clauses, vec!["ALT > 3x ULN".to_string(), "AST > 3x ULN".to_string(), "bilirubin > 2x ULN".to_string()]);
    }

    #[test]
    fn normalize_assertion_flips_to_negated_on_explicit_marker() {
        let result = normalize_assertion("No known history of seizure disorder", Assertion::Affirmed);
        assert_eq!(result, Assertion::Negated);
    }

    #[test]
    fn normalize_assertion_leaves_unmarked_text_alone() {
        let result = normalize_assertion("Age >= 18 years", Assertion::Affirmed);
        assert_eq!(result, Assertion::Affirmed);
    }

    #[test]
    fn build_criteria_drops_duplicate_text_and_type_pairs() {
        let batch_id = elixir_core::CriteriaBatchId::new();
        let extracted = vec![
            ExtractedCriterion {
                text: "Age >= 18 years".to_string(),
                criterion_type: CriterionType::Inclusion,
                assertion: Assertion::Affirmed,
                category: None,
                confidence: 0.9,
                page_number: Some(1),
            },
            ExtractedCriterion {
                text: "age  >= 18  years".to_string(),
                criterion_type: CriterionType::Inclusion,
                assertion: Assertion::Affirmed,
                category: None,
                confidence: 0.8,
                page_number: Some(2),
            },
        ];
        assert_eq!(build_criteria(batch_id, &extracted).len(), 1);
    }
}
