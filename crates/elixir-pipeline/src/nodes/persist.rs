// crates/elixir-pipeline/src/nodes/persist.rs
// ============================================================================
// Module: Persist Node
// Description: Persists grounded entities and attaches an unpopulated field
//              mapping per entity to its owning criterion (spec.md §4.6.5).
// Dependencies: elixir_core
// ============================================================================

use elixir_core::DomainHint;
use elixir_core::Entity;
use elixir_core::FieldMapping;
use elixir_core::NodeError;
use elixir_core::OmopMapper;
use elixir_core::PipelineNode;
use elixir_core::Protocol;
use elixir_core::ProtocolStatus;
use serde_json::Value as JsonValue;

use super::state::GroundState;
use super::state::PersistState;
use crate::runner::PipelineRunner;

/// Persists the batch's grounded entities and attaches one unpopulated field
/// mapping per entity to its owning criterion, then advances the protocol
/// into the structuring stage.
///
/// # Errors
/// Returns [`NodeError`] if the previous node's carry state cannot be read,
/// or entities/criteria cannot be persisted.
pub async fn run(runner: &PipelineRunner, protocol: &mut Protocol, carry: &JsonValue) -> Result<JsonValue, NodeError> {
    let ground_state: GroundState = super::from_carry(PipelineNode::Persist, carry)?;

    runner.entities.insert_many(&ground_state.entities).await.map_err(|error| {
        NodeError::new(PipelineNode::Persist, "failed to persist grounded entities").with_technical_detail(error.to_string())
    })?;

    let criteria = runner.criteria.list_for_batch(ground_state.batch_id).await.map_err(|error| {
        NodeError::new(PipelineNode::Persist, "failed to load criteria for batch").with_technical_detail(error.to_string())
    })?;

    for mut criterion in criteria {
        let owned: Vec<&Entity> = ground_state.entities.iter().filter(|entity| entity.criterion_id == criterion.id).collect();
        if owned.is_empty() {
            continue;
        }
        let mut mappings = Vec::with_capacity(owned.len());
        for entity in owned {
            let entity_concept_id = resolve_concept_id(runner.omop.as_ref(), entity).await;
            mappings.push(FieldMapping::unpopulated(entity.entity_text.clone(), entity_concept_id));
        }
        criterion.conditions.field_mappings = mappings;
        runner.criteria.update(&criterion).await.map_err(|error| {
            NodeError::new(PipelineNode::Persist, "failed to persist criterion field mappings").with_technical_detail(error.to_string())
        })?;
    }

    let grounded_count = ground_state.entities.iter().filter(|entity| entity.codes.has_any_code()).count();
    protocol.advance(ProtocolStatus::Structuring);

    super::to_carry(
        PipelineNode::Persist,
        &PersistState { batch_id: ground_state.batch_id, entity_count: ground_state.entities.len(), grounded_count },
    )
}

/// Re-resolves an already-grounded entity's preferred term to its OMOP
/// `concept_id`, independently of whichever vocabulary code the `ground`
/// node populated (spec.md §4.2: OMOP mapping is a free-text query, not a
/// code lookup). Entities with no vocabulary code at all are not re-queried.
async fn resolve_concept_id(omop: &dyn OmopMapper, entity: &Entity) -> Option<i64> {
    if !entity.codes.has_any_code() {
        return None;
    }
    let query_text = entity.preferred_term.as_deref().unwrap_or(&entity.entity_text);
    let domain_hint = DomainHint::from_entity_type(entity.entity_type);
    omop.map_code(query_text, domain_hint).await.ok().flatten().map(|candidate| candidate.concept_id)
}

#[cfg(test)]
mod tests {
    use elixir_core::CriterionId;
    use elixir_core::EntityType;

    use super::*;

    #[test]
    fn resolve_concept_id_domain_hint_follows_entity_type() {
        let mut entity = Entity::new(CriterionId::new(), "diabetes", EntityType::Condition, 0, 8);
        entity.codes.snomed_code = Some("44054006".to_string());
        assert!(entity.codes.has_any_code());
        assert_eq!(DomainHint::from_entity_type(entity.entity_type), Some(DomainHint::Condition));
    }

    #[test]
    fn ungrounded_entity_has_no_code_to_re_resolve() {
        let entity = Entity::new(CriterionId::new(), "finding", EntityType::Condition, 0, 7);
        assert!(!entity.codes.has_any_code());
    }
}
