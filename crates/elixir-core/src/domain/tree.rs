// crates/elixir-core/src/domain/tree.rs
// ============================================================================
// Module: Criterion Expression Tree
// Description: Atomic/composite/relationship rows forming the per-criterion
//              AND/OR/NOT expression tree.
// Purpose: Give the `structure` node a persistable tree shape distinct from
//          the flat `FieldMapping` list, for export builders that need real
//          boolean structure (CIRCE, FHIR) rather than a flattened query.
// Dependencies: crate::identifiers
// ============================================================================

//! ## Overview
//! The teacher repo's `ret-logic` crate models a generic boolean requirement
//! tree (`Requirement<P>`), but its core `Requirement`/`TriState` types were
//! not present in the retrieved pack — only the DSL parser and its tests
//! were retrieved, and the DSL depends on modules that do not exist in this
//! workspace. Rather than fabricate that missing core, this module
//! implements a tree specialized to the domain directly: atomic leaves hold
//! `(concept_id, relation, value, unit_concept_id)`, composite nodes combine
//! children with `AND`/`OR`/`NOT`, and `CriterionRelationship` rows encode
//! parent/child edges with an explicit `child_order` (see `DESIGN.md`).
//!
//! Invariant: the tree reachable from one criterion's root composite node is
//! acyclic (spec.md §3).

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashSet;

use serde::Deserialize;
use serde::Serialize;

use crate::domain::criterion::MappingValue;
use crate::domain::criterion::Relation;
use crate::identifiers::AtomicCriterionId;
use crate::identifiers::CompositeCriterionId;
use crate::identifiers::CriterionId;

// ============================================================================
// SECTION: Atomic Criterion
// ============================================================================

/// One leaf condition in the expression tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AtomicCriterion {
    /// Unique identifier.
    pub id: AtomicCriterionId,
    /// Owning criterion (back-pointer, not ownership per spec.md §3).
    pub criterion_id: CriterionId,
    /// OMOP `concept_id` this leaf tests.
    pub concept_id: Option<i64>,
    /// Comparison relation.
    pub relation: Relation,
    /// Comparison value.
    pub value: Option<MappingValue>,
    /// OMOP `unit_concept_id`, when the value carries a unit.
    pub unit_concept_id: Option<i64>,
}

// ============================================================================
// SECTION: Composite Criterion
// ============================================================================

/// Boolean operator combining an interior node's children.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Operator {
    /// All children must hold.
    And,
    /// At least one child must hold.
    Or,
    /// The single child must not hold.
    Not,
}

/// An interior node combining children via AND/OR/NOT.
///
/// # Invariants
/// - `NOT` nodes have exactly one child relationship.
/// - `parent_criterion_id` is reserved for future manual-restructuring flows
///   and is deliberately unused by the automated pipeline (spec.md §9).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositeCriterion {
    /// Unique identifier.
    pub id: CompositeCriterionId,
    /// Owning criterion (back-pointer, not ownership).
    pub criterion_id: CriterionId,
    /// Combining operator.
    pub operator: Operator,
    /// Reserved for future manual-restructuring flows; unused by the
    /// pipeline today.
    pub parent_criterion_id: Option<CompositeCriterionId>,
}

// ============================================================================
// SECTION: Relationship (Tree Edges)
// ============================================================================

/// A child reference of a [`CompositeCriterion`]: either another composite
/// node or an atomic leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChildRef {
    /// An interior composite child.
    Composite(CompositeCriterionId),
    /// A leaf atomic child.
    Atomic(AtomicCriterionId),
}

/// One edge linking a composite parent to an atomic or composite child.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CriterionRelationship {
    /// Parent composite node.
    pub parent_id: CompositeCriterionId,
    /// Referenced child.
    pub child: ChildRef,
    /// Operator duplicated from the parent for query convenience.
    pub operator: Operator,
    /// Zero-based ordering among sibling children.
    pub child_order: u32,
}

// ============================================================================
// SECTION: Tree Validation
// ============================================================================

/// A fully materialized expression tree for one criterion, as persisted by
/// the `structure` node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExpressionTree {
    /// All composite nodes, including the root.
    pub composites: Vec<CompositeCriterion>,
    /// All atomic leaves.
    pub atomics: Vec<AtomicCriterion>,
    /// All parent/child edges.
    pub relationships: Vec<CriterionRelationship>,
    /// The root composite node's identifier.
    pub root: Option<CompositeCriterionId>,
}

/// Errors that can occur validating an [`ExpressionTree`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TreeError {
    /// The tree has no declared root.
    #[error("expression tree has no root")]
    MissingRoot,
    /// A cycle was detected while walking the tree.
    #[error("expression tree contains a cycle")]
    Cycle,
    /// A `NOT` node did not have exactly one child.
    #[error("NOT node {0:?} must have exactly one child")]
    NotArity(CompositeCriterionId),
}

impl ExpressionTree {
    /// Validates that the tree is acyclic and rooted at exactly one
    /// composite node, and that every `NOT` node has exactly one child
    /// (spec.md §3 invariant).
    ///
    /// # Errors
    /// Returns [`TreeError`] if the root is missing, a cycle is found, or a
    /// `NOT` node's arity is violated.
    pub fn validate(&self) -> Result<(), TreeError> {
        let root = self.root.ok_or(TreeError::MissingRoot)?;

        for node in &self.composites {
            if node.operator == Operator::Not {
                let arity = self.relationships.iter().filter(|edge| edge.parent_id == node.id).count();
                if arity != 1 {
                    return Err(TreeError::NotArity(node.id));
                }
            }
        }

        let mut visiting = HashSet::new();
        let mut visited = HashSet::new();
        self.visit(root, &mut visiting, &mut visited)
    }

    fn visit(
        &self,
        node: CompositeCriterionId,
        visiting: &mut HashSet<CompositeCriterionId>,
        visited: &mut HashSet<CompositeCriterionId>,
    ) -> Result<(), TreeError> {
        if visited.contains(&node) {
            return Ok(());
        }
        if !visiting.insert(node) {
            return Err(TreeError::Cycle);
        }
        for edge in self.relationships.iter().filter(|edge| edge.parent_id == node) {
            if let ChildRef::Composite(child) = edge.child {
                self.visit(child, visiting, visited)?;
            }
        }
        visiting.remove(&node);
        visited.insert(node);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn atomic(criterion_id: CriterionId, relation: Relation) -> AtomicCriterion {
        AtomicCriterion { id: AtomicCriterionId::new(), criterion_id, concept_id: Some(1), relation, value: None, unit_concept_id: None }
    }

    #[test]
    fn single_atomic_under_and_root_validates() {
        let criterion_id = CriterionId::new();
        let root = CompositeCriterion { id: CompositeCriterionId::new(), criterion_id, operator: Operator::And, parent_criterion_id: None };
        let leaf = atomic(criterion_id, Relation::Ge);
        let tree = ExpressionTree {
            root: Some(root.id),
            relationships: vec![CriterionRelationship { parent_id: root.id, child: ChildRef::Atomic(leaf.id), operator: Operator::And, child_order: 0 }],
            composites: vec![root],
            atomics: vec![leaf],
        };
        assert!(tree.validate().is_ok());
    }

    #[test]
    fn missing_root_is_rejected() {
        let tree = ExpressionTree::default();
        assert_eq!(tree.validate(), Err(TreeError::MissingRoot));
    }

    #[test]
    fn not_node_requires_exactly_one_child() {
        let criterion_id = CriterionId::new();
        let root = CompositeCriterion { id: CompositeCriterionId::new(), criterion_id, operator: Operator::Not, parent_criterion_id: None };
        let a = atomic(criterion_id, Relation::Eq);
        let b = atomic(criterion_id, Relation::Eq);
        let tree = ExpressionTree {
            root: Some(root.id),
            relationships: vec![
                CriterionRelationship { parent_id: root.id, child: ChildRef::Atomic(a.id), operator: Operator::Not, child_order: 0 },
                CriterionRelationship { parent_id: root.id, child: ChildRef::Atomic(b.id), operator: Operator::Not, child_order: 1 },
            ],
            composites: vec![root],
            atomics: vec![a, b],
        };
        assert_eq!(tree.validate(), Err(TreeError::NotArity(tree.root.expect("root set"))));
    }

    #[test]
    fn cyclic_composite_chain_is_rejected() {
        let criterion_id = CriterionId::new();
        let root = CompositeCriterion { id: CompositeCriterionId::new(), criterion_id, operator: Operator::And, parent_criterion_id: None };
        let child = CompositeCriterion { id: CompositeCriterionId::new(), criterion_id, operator: Operator::Or, parent_criterion_id: None };
        let tree = ExpressionTree {
            root: Some(root.id),
            relationships: vec![
                CriterionRelationship { parent_id: root.id, child: ChildRef::Composite(child.id), operator: Operator::And, child_order: 0 },
                CriterionRelationship { parent_id: child.id, child: ChildRef::Composite(root.id), operator: Operator::Or, child_order: 0 },
            ],
            composites: vec![root, child],
            atomics: vec![],
        };
        assert_eq!(tree.validate(), Err(TreeError::Cycle));
    }
}
