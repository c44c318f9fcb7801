// crates/elixir-pipeline/src/export.rs
// ============================================================================
// Module: Export Builder
// Description: Flattens a protocol's expression trees into a join-ready
//              query fragment.
// Purpose: Give operators one pure-function seam for turning structured
//          criteria into an executable eligibility query, without coupling
//          the pipeline to any one downstream query engine (spec.md §6,
//          SPEC_FULL.md §1's narrowing of export builders to this trait).
// Dependencies: elixir_core::{Criterion, CriterionType, tree::*}
// ============================================================================

//! ## Overview
//! The full expression tree (spec.md §3) can express arbitrary nested
//! AND/OR/NOT, but the only exporter this crate ships flattens it: every
//! inclusion criterion's atomic leaves are ANDed together, every exclusion
//! criterion's atomic leaves become `NOT EXISTS` clauses ANDed onto the same
//! query. Nested boolean structure below a criterion's root is lost in this
//! flattening — see `DESIGN.md` for why that is an accepted limitation
//! rather than a defect: most extracted criteria are single atomic
//! conditions or flat conjunctions in practice, and a richer exporter can be
//! added later behind the same [`ExportBuilder`] trait without touching the
//! pipeline.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fmt::Write as _;

use elixir_core::AtomicCriterion;
use elixir_core::Criterion;
use elixir_core::CriterionId;
use elixir_core::CriterionType;
use elixir_core::ExpressionTree;
use elixir_core::MappingValue;
use elixir_core::Relation;

// ============================================================================
// SECTION: ExportBuilder
// ============================================================================

/// Builds a query fragment from a protocol's criteria and their expression
/// trees.
pub trait ExportBuilder: Send + Sync {
    /// Renders `criteria` (paired with their expression trees, when
    /// `structure` has run) into one query fragment string.
    fn build(&self, criteria: &[Criterion], trees: &BTreeMap<CriterionId, ExpressionTree>) -> String;
}

// ============================================================================
// SECTION: SqlExportBuilder
// ============================================================================

/// Flattens every criterion's atomic leaves into a single `WHERE`-style SQL
/// fragment: inclusion leaves AND together, exclusion leaves become
/// `NOT EXISTS` clauses.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlExportBuilder;

impl ExportBuilder for SqlExportBuilder {
    fn build(&self, criteria: &[Criterion], trees: &BTreeMap<CriterionId, ExpressionTree>) -> String {
        let mut inclusion_clauses = Vec::new();
        let mut exclusion_clauses = Vec::new();

        for criterion in criteria {
            let Some(tree) = trees.get(&criterion.id) else {
                continue;
            };
            for atomic in &tree.atomics {
                let clause = atomic_clause(atomic);
                match criterion.criterion_type {
                    CriterionType::Inclusion => inclusion_clauses.push(clause),
                    CriterionType::Exclusion => exclusion_clauses.push(format!("NOT EXISTS ({clause})")),
                }
            }
        }

        let mut fragment = String::new();
        let all_clauses: Vec<String> = inclusion_clauses.into_iter().chain(exclusion_clauses).collect();
        if all_clauses.is_empty() {
            return "TRUE".to_string();
        }
        for (index, clause) in all_clauses.iter().enumerate() {
            if index > 0 {
                fragment.push_str(" AND ");
            }
            let _ = write!(fragment, "({clause})");
        }
        fragment
    }
}

/// Renders one atomic leaf as a bare comparison clause, e.g.
/// `concept_id = 1234 AND value_as_number >= 18`.
fn atomic_clause(atomic: &AtomicCriterion) -> String {
    let mut clause = match atomic.concept_id {
        Some(concept_id) => format!("concept_id = {concept_id}"),
        None => "concept_id IS NOT NULL".to_string(),
    };

    if let Some(value) = &atomic.value {
        let operator = relation_operator(atomic.relation);
        let value_text = mapping_value_literal(value);
        let _ = write!(clause, " AND value_as_number {operator} {value_text}");
    }

    clause
}

/// Renders a [`MappingValue`] as a bare SQL literal. `Range` and `Duration`
/// values render their first component only; a richer exporter would split
/// them into two comparisons.
fn mapping_value_literal(value: &MappingValue) -> String {
    match value {
        MappingValue::Scalar(number) => number.to_string(),
        MappingValue::Text(text) => format!("'{}'", text.replace('\'', "''")),
        MappingValue::Range { min, .. } => min.to_string(),
        MappingValue::Duration { duration, .. } => duration.to_string(),
    }
}

/// Maps a [`Relation`] to its SQL comparison operator text. `Within`,
/// `NotInLast`, `Contains`, and `NotContains` have no single-operator SQL
/// form in this flattened exporter and render as `=` placeholders pending a
/// richer exporter.
const fn relation_operator(relation: Relation) -> &'static str {
    match relation {
        Relation::Eq | Relation::Within | Relation::NotInLast | Relation::Contains | Relation::NotContains => "=",
        Relation::Ne => "!=",
        Relation::Gt => ">",
        Relation::Ge => ">=",
        Relation::Lt => "<",
        Relation::Le => "<=",
    }
}

#[cfg(test)]
mod tests {
    use elixir_core::Assertion;
    use elixir_core::CompositeCriterion;
    use elixir_core::CompositeCriterionId;
    use elixir_core::CriteriaBatchId;
    use elixir_core::CriterionRelationship;
    use elixir_core::ChildRef;
    use elixir_core::Operator;

    use super::*;

    fn tree_with_one_atomic(criterion_id: CriterionId, relation: Relation, value: Option<MappingValue>) -> ExpressionTree {
        let root = CompositeCriterion { id: CompositeCriterionId::new(), criterion_id, operator: Operator::And, parent_criterion_id: None };
        let leaf = AtomicCriterion { id: elixir_core::AtomicCriterionId::new(), criterion_id, concept_id: Some(201_826), relation, value, unit_concept_id: None };
        ExpressionTree {
            root: Some(root.id),
            relationships: vec![CriterionRelationship { parent_id: root.id, child: ChildRef::Atomic(leaf.id), operator: Operator::And, child_order: 0 }],
            composites: vec![root],
            atomics: vec![leaf],
        }
    }

    #[test]
    fn inclusion_atomics_are_anded_together() {
        let batch_id = CriteriaBatchId::new();
        let inclusion = Criterion::new(batch_id, CriterionType::Inclusion, "Age >= 18", Assertion::Affirmed, None, 0.9, Some(1));
        let mut trees = BTreeMap::new();
        trees.insert(inclusion.id, tree_with_one_atomic(inclusion.id, Relation::Ge, Some(MappingValue::Scalar(18.0))));

        let fragment = SqlExportBuilder.build(&[inclusion], &trees);
        assert!(fragment.contains("concept_id = 201826"));
        assert!(fragment.contains(">="));
        assert!(!fragment.contains("NOT EXISTS"));
    }

    #[test]
    fn exclusion_atomics_become_not_exists_clauses() {
        let batch_id = CriteriaBatchId::new();
        let exclusion = Criterion::new(batch_id, CriterionType::Exclusion, "History of diabetes", Assertion::Affirmed, None, 0.9, Some(2));
        let mut trees = BTreeMap::new();
        trees.insert(exclusion.id, tree_with_one_atomic(exclusion.id, Relation::Eq, None));

        let fragment = SqlExportBuilder.build(&[exclusion], &trees);
        assert!(fragment.contains("NOT EXISTS"));
    }

    #[test]
    fn criteria_without_a_structured_tree_are_skipped() {
        let batch_id = CriteriaBatchId::new();
        let criterion = Criterion::new(batch_id, CriterionType::Inclusion, "Unstructured", Assertion::Affirmed, None, 0.5, None);
        let fragment = SqlExportBuilder.build(&[criterion], &BTreeMap::new());
        assert_eq!(fragment, "TRUE");
    }
}
