// crates/elixir-pipeline/src/nodes/structure.rs
// ============================================================================
// Module: Structure Node
// Description: Decomposes each criterion into an AND/OR/NOT expression tree
//              over its grounded entities, normalizing units and boolean
//              values through OMOP (spec.md §4.6.6).
// Dependencies: elixir_core, elixir_llm
// ============================================================================

use std::collections::BTreeMap;

use elixir_core::AtomicCriterion;
use elixir_core::AtomicCriterionId;
use elixir_core::ChildRef;
use elixir_core::CompletionRequest;
use elixir_core::CompositeCriterion;
use elixir_core::CompositeCriterionId;
use elixir_core::Criterion;
use elixir_core::CriterionRelationship;
use elixir_core::Entity;
use elixir_core::ExpressionTree;
use elixir_core::FieldMapping;
use elixir_core::LlmError;
use elixir_core::LlmGateway;
use elixir_core::MappingValue;
use elixir_core::NodeError;
use elixir_core::OmopMapper;
use elixir_core::PipelineNode;
use elixir_core::Protocol;
use elixir_llm::ModelKind;
use elixir_llm::NodeName;
use serde_json::Value as JsonValue;

use super::schemas;
use super::state::ParseState;
use super::state::StructureDecomposition;
use super::state::StructureFieldMapping;
use super::state::StructureState;
use crate::runner::PipelineRunner;

/// Builds and persists an expression tree for every criterion in the batch.
///
/// # Errors
/// Returns [`NodeError`] if the previous node's carry state cannot be read,
/// a criterion's decomposition call fails, or a built tree fails validation.
pub async fn run(runner: &PipelineRunner, _protocol: &mut Protocol, carry: &JsonValue) -> Result<JsonValue, NodeError> {
    let parse_state: ParseState = super::from_carry(PipelineNode::Structure, carry)?;
    let criteria = runner.criteria.list_for_batch(parse_state.batch_id).await.map_err(|error| {
        NodeError::new(PipelineNode::Structure, "failed to load criteria for batch").with_technical_detail(error.to_string())
    })?;

    let mut criterion_count = 0;
    for mut criterion in criteria {
        let entities = runner.entities.list_for_criterion(criterion.id).await.map_err(|error| {
            NodeError::new(PipelineNode::Structure, "failed to load entities for criterion").with_technical_detail(error.to_string())
        })?;
        if entities.is_empty() {
            continue;
        }

        let decomposition = decompose(runner.llm.as_ref(), &criterion, &entities).await.map_err(|error| {
            NodeError::new(PipelineNode::Structure, "criterion decomposition failed").with_technical_detail(error.to_string())
        })?;

        let tree = build_tree(runner.omop.as_ref(), criterion.id, &decomposition, &entities).await;
        tree.validate().map_err(|error| {
            NodeError::new(PipelineNode::Structure, "expression tree failed validation").with_technical_detail(error.to_string())
        })?;
        runner.criteria.put_tree(criterion.id, &tree).await.map_err(|error| {
            NodeError::new(PipelineNode::Structure, "failed to persist expression tree").with_technical_detail(error.to_string())
        })?;

        criterion.conditions.field_mappings = build_field_mappings(runner.omop.as_ref(), &decomposition, &entities).await;
        runner.criteria.update(&criterion).await.map_err(|error| {
            NodeError::new(PipelineNode::Structure, "failed to persist structured field mappings").with_technical_detail(error.to_string())
        })?;
        criterion_count += 1;
    }

    super::to_carry(PipelineNode::Structure, &StructureState { batch_id: parse_state.batch_id, criterion_count })
}

/// Calls the structure decomposition target for one criterion.
async fn decompose(llm: &dyn LlmGateway, criterion: &Criterion, entities: &[Entity]) -> Result<StructureDecomposition, LlmError> {
    let template = super::templates().get(NodeName::Structure, ModelKind::Gemini);
    let Some(template) = template else {
        return Err(LlmError::Upstream { target: "structure".to_string(), message: "no template configured".to_string() });
    };

    let mut vars = BTreeMap::new();
    vars.insert("criterion_text", criterion.text.clone());
    vars.insert("entities", entities.iter().map(|entity| entity.entity_text.as_str()).collect::<Vec<_>>().join(", "));

    let request = CompletionRequest {
        target: "structure".to_string(),
        system_prompt: template.render_system(&vars),
        user_content: template.render_user(&vars),
        response_schema: schemas::structure_schema(),
        max_agentic_attempts: 2,
    };
    let response = llm.complete(request).await?;
    serde_json::from_value(response.payload).map_err(|error| LlmError::Upstream { target: "structure".to_string(), message: error.to_string() })
}

/// Converts a flat [`StructureDecomposition`] into a rooted [`ExpressionTree`]
/// of one composite root over one atomic leaf per field mapping, resolving
/// each leaf's entity to an OMOP concept id and normalizing its unit/value
/// through [`OmopMapper`] (spec.md §4.6.5, §4.6.6).
async fn build_tree(omop: &dyn OmopMapper, criterion_id: elixir_core::CriterionId, decomposition: &StructureDecomposition, entities: &[Entity]) -> ExpressionTree {
    let root_id = CompositeCriterionId::new();
    let root = CompositeCriterion { id: root_id, criterion_id, operator: decomposition.operator, parent_criterion_id: None };

    let mut atomics = Vec::with_capacity(decomposition.field_mappings.len());
    let mut relationships = Vec::with_capacity(decomposition.field_mappings.len());

    for (order, mapping) in decomposition.field_mappings.iter().enumerate() {
        let leaf_id = AtomicCriterionId::new();
        let concept_id = match entities.iter().find(|entity| entity.entity_text == mapping.entity) {
            Some(entity) => resolve_concept_id(omop, entity).await,
            None => None,
        };
        let unit_concept_id = resolve_unit(omop, mapping).await;
        let value = resolve_value(omop, mapping).await;

        atomics.push(AtomicCriterion { id: leaf_id, criterion_id, concept_id, relation: mapping.relation, value, unit_concept_id });
        relationships.push(CriterionRelationship {
            parent_id: root_id,
            child: ChildRef::Atomic(leaf_id),
            operator: decomposition.operator,
            child_order: u32::try_from(order).unwrap_or(u32::MAX),
        });
    }

    ExpressionTree { composites: vec![root], atomics, relationships, root: Some(root_id) }
}

/// Builds the [`Criterion::conditions`] field mappings `structure` writes
/// back onto the owning criterion, with `relation`/`value` populated from
/// the decomposition and `unit_concept_id`/`value_concept_id` resolved
/// through OMOP (spec.md §4.6.6).
async fn build_field_mappings(omop: &dyn OmopMapper, decomposition: &StructureDecomposition, entities: &[Entity]) -> Vec<FieldMapping> {
    let mut mappings = Vec::with_capacity(decomposition.field_mappings.len());
    for mapping in &decomposition.field_mappings {
        let entity_concept_id = match entities.iter().find(|entity| entity.entity_text == mapping.entity) {
            Some(entity) => resolve_concept_id(omop, entity).await,
            None => None,
        };
        let unit_concept_id = resolve_unit(omop, mapping).await;
        let (value, value_concept_id) = resolve_value(omop, mapping).await;
        mappings.push(FieldMapping {
            entity: mapping.entity.clone(),
            entity_concept_id,
            relation: Some(mapping.relation),
            value,
            unit_text: mapping.unit_text.clone(),
            unit_concept_id,
            value_concept_id,
        });
    }
    mappings
}

/// Resolves a field mapping's free-text unit through the OMOP UCUM table.
async fn resolve_unit(omop: &dyn OmopMapper, mapping: &StructureFieldMapping) -> Option<i64> {
    let unit_text = mapping.unit_text.as_deref()?;
    omop.map_unit(unit_text).await.ok().flatten()
}

/// Resolves a text-valued field mapping (e.g. `"positive"`) to its OMOP
/// boolean/categorical value concept, leaving scalar/range/duration values
/// untouched. Returns the original value alongside the resolved
/// `value_concept_id`, if any.
async fn resolve_value(omop: &dyn OmopMapper, mapping: &StructureFieldMapping) -> (Option<MappingValue>, Option<i64>) {
    if let Some(MappingValue::Text(text)) = &mapping.value {
        if let Ok(Some(value_concept_id)) = omop.map_value(text).await {
            return (Some(MappingValue::Text(text.clone())), Some(value_concept_id));
        }
    }
    (mapping.value.clone(), None)
}

/// Re-resolves a grounded entity's preferred term to its OMOP `concept_id`,
/// independently of whichever vocabulary code the `ground` node populated
/// (spec.md §4.2: OMOP mapping is a free-text query, not a code lookup).
/// Entities with no vocabulary code at all are not re-queried.
async fn resolve_concept_id(omop: &dyn OmopMapper, entity: &Entity) -> Option<i64> {
    if !entity.codes.has_any_code() {
        return None;
    }
    let query_text = entity.preferred_term.as_deref().unwrap_or(&entity.entity_text);
    let domain_hint = elixir_core::DomainHint::from_entity_type(entity.entity_type);
    omop.map_code(query_text, domain_hint).await.ok().flatten().map(|candidate| candidate.concept_id)
}

#[cfg(test)]
mod tests {
    use elixir_core::CriterionId;
    use elixir_core::Operator;
    use elixir_core::Relation;

    use super::*;

    #[test]
    fn build_tree_assigns_sequential_child_order() {
        let criterion_id = CriterionId::new();
        let decomposition = StructureDecomposition {
            operator: Operator::And,
            field_mappings: vec![
                StructureFieldMapping { entity: "Age".to_string(), relation: Relation::Ge, value: None, unit_text: None },
                StructureFieldMapping { entity: "ECOG".to_string(), relation: Relation::Le, value: None, unit_text: None },
            ],
        };
        let tree = futures_executor_block_on_build_tree(criterion_id, &decomposition);
        assert_eq!(tree.relationships.len(), 2);
        assert_eq!(tree.relationships[0].child_order, 0);
        assert_eq!(tree.relationships[1].child_order, 1);
        assert!(tree.validate().is_ok());
    }

    /// Test-only synchronous shim around [`build_tree`] using a no-op OMOP
    /// mapper, since the unit under test never awaits across a real runtime.
    fn futures_executor_block_on_build_tree(criterion_id: CriterionId, decomposition: &StructureDecomposition) -> ExpressionTree {
        struct NoopOmop;

        #[async_trait::async_trait]
        impl OmopMapper for NoopOmop {
            async fn map_code(&self, _query_text: &str, _domain_hint: Option<elixir_core::DomainHint>) -> Result<Option<elixir_core::OmopCandidate>, elixir_core::OmopError> {
                Ok(None)
            }
            async fn map_unit(&self, _unit_text: &str) -> Result<Option<i64>, elixir_core::OmopError> {
                Ok(None)
            }
            async fn map_value(&self, _value_text: &str) -> Result<Option<i64>, elixir_core::OmopError> {
                Ok(None)
            }
        }

        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("build current-thread runtime")
            .block_on(build_tree(&NoopOmop, criterion_id, decomposition, &[]))
    }
}
