// crates/elixir-review/src/action.rs
// ============================================================================
// Module: Review Action
// Description: The atomic review-action transaction over a Criterion or
//              Entity: snapshot, apply, snapshot, status update, Review +
//              AuditLog pair, batch recompute (spec.md §4.7).
// Dependencies: elixir_core
// ============================================================================

use std::sync::Arc;

use elixir_core::AuditDetails;
use elixir_core::AuditEventType;
use elixir_core::AuditLog;
use elixir_core::Criterion;
use elixir_core::CriterionId;
use elixir_core::CriterionRepository;
use elixir_core::CriterionReviewStatus;
use elixir_core::CriteriaBatchRepository;
use elixir_core::Entity;
use elixir_core::EntityId;
use elixir_core::EntityRepository;
use elixir_core::FieldMapping;
use elixir_core::NotFound;
use elixir_core::Review;
use elixir_core::ReviewAction;
use elixir_core::ReviewTargetType;
use elixir_core::ReviewTransaction;
use elixir_core::ReviewerId;
use elixir_core::SchemaVersion;
use elixir_core::ValidationError;
use serde_json::json;

/// Failure applying a review action.
#[derive(Debug, thiserror::Error)]
pub enum ReviewError {
    /// The target criterion does not exist.
    #[error(transparent)]
    NotFound(#[from] NotFound),
    /// The request body was malformed (e.g. `modify` without any edit).
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// A repository call failed.
    #[error(transparent)]
    Repository(#[from] elixir_core::RepositoryError),
}

/// The body of a review action request against one criterion or entity
/// (spec.md §6 `POST /reviews/criteria/{id}/action`,
/// `POST /reviews/entities/{id}/action`).
#[derive(Debug, Clone)]
pub struct ReviewActionRequest {
    /// The reviewer performing the action.
    pub reviewer_id: ReviewerId,
    /// Approve, reject, or modify.
    pub action: ReviewAction,
    /// Optional free-text reviewer comment.
    pub comment: Option<String>,
    /// Replacement criterion/entity text, for a text-only `modify`.
    pub modified_text: Option<String>,
    /// Replacement field mappings, for a structured `modify` (criteria
    /// only; an entity action carrying this is a validation error).
    pub modified_structured_fields: Option<Vec<FieldMapping>>,
}

/// Collaborators a review action transaction depends on.
pub struct ReviewService {
    /// Criterion persistence.
    pub criteria: Arc<dyn CriterionRepository>,
    /// Entity persistence.
    pub entities: Arc<dyn EntityRepository>,
    /// Criteria batch persistence, for the post-action auto-transition.
    pub batches: Arc<dyn CriteriaBatchRepository>,
    /// Commits the target update, `Review` insert, `AuditLog` insert, and
    /// batch update as one atomic unit (spec.md §4.7 invariant: steps 5 and
    /// 6 commit together or both roll back).
    pub transaction: Arc<dyn ReviewTransaction>,
}

impl ReviewService {
    /// Applies a review action to a criterion: snapshots before/after state,
    /// updates its review status, writes the paired `Review`/`AuditLog` rows,
    /// and recomputes the parent batch's review status (spec.md §4.7,
    /// §4.7.1), all inside one atomic transaction.
    ///
    /// # Errors
    /// Returns [`ReviewError::NotFound`] if the criterion does not exist,
    /// [`ReviewError::Validation`] if `modify` carries no edit, or
    /// [`ReviewError::Repository`] if the transaction fails (in which case
    /// none of its writes are persisted).
    pub async fn apply_action(&self, criterion_id: CriterionId, request: &ReviewActionRequest) -> Result<Review, ReviewError> {
        let mut criterion = self.criteria.get(criterion_id).await?;
        let before_value = snapshot_criterion(&criterion);

        if request.action == ReviewAction::Modify {
            apply_criterion_modification(&mut criterion, request)?;
        }
        criterion.review_status = status_for(request.action);
        let after_value = snapshot_criterion(&criterion);

        let review = Review::new(
            ReviewTargetType::Criteria,
            criterion.id.to_string(),
            request.reviewer_id,
            request.action,
            before_value,
            after_value,
            request.comment.clone(),
        );
        let audit_log = audit_log_for(&review, ReviewTargetType::Criteria, criterion.id.to_string(), request);
        let batch = self.recomputed_batch(criterion.batch_id).await?;

        self.transaction.commit_criterion_review(&criterion, &review, &audit_log, &batch).await?;
        Ok(review)
    }

    /// Applies a review action to an entity, with the same atomic shape as
    /// [`Self::apply_action`] (spec.md §4.7 step 1: "Load target (Criterion
    /// or Entity)").
    ///
    /// # Errors
    /// Returns [`ReviewError::NotFound`] if the entity does not exist,
    /// [`ReviewError::Validation`] if `modify` carries no edit or carries
    /// structured field mappings (entities have none to edit), or
    /// [`ReviewError::Repository`] if the transaction fails.
    pub async fn apply_entity_action(&self, entity_id: EntityId, request: &ReviewActionRequest) -> Result<Review, ReviewError> {
        let mut entity = self.entities.get(entity_id).await?;
        let before_value = snapshot_entity(&entity);

        if request.action == ReviewAction::Modify {
            apply_entity_modification(&mut entity, request)?;
        }
        entity.review_status = status_for(request.action);
        let after_value = snapshot_entity(&entity);

        let review = Review::new(
            ReviewTargetType::Entity,
            entity.id.to_string(),
            request.reviewer_id,
            request.action,
            before_value,
            after_value,
            request.comment.clone(),
        );
        let audit_log = audit_log_for(&review, ReviewTargetType::Entity, entity.id.to_string(), request);
        let owning_criterion = self.criteria.get(entity.criterion_id).await?;
        let batch = self.recomputed_batch(owning_criterion.batch_id).await?;

        self.transaction.commit_entity_review(&entity, &review, &audit_log, &batch).await?;
        Ok(review)
    }

    /// Reloads every non-archived criterion in a batch and returns it with
    /// its auto-transitioned review status recomputed (spec.md §4.7.1),
    /// without persisting — persistence happens inside the caller's
    /// [`ReviewTransaction`] call alongside the rest of the action.
    async fn recomputed_batch(&self, batch_id: elixir_core::CriteriaBatchId) -> Result<elixir_core::CriteriaBatch, ReviewError> {
        let mut batch = self.batches.get(batch_id).await?;
        let criteria = self.criteria.list_for_batch(batch_id).await?;
        let statuses: Vec<CriterionReviewStatus> = criteria.iter().map(|criterion| criterion.review_status).collect();
        batch.recompute_review_status(&statuses);
        Ok(batch)
    }
}

/// Serializes the fields a review snapshot captures: review status and
/// structured conditions, matching the shape `schema_version` is derived
/// against.
fn snapshot_criterion(criterion: &Criterion) -> serde_json::Value {
    json!({
        "text": criterion.text,
        "review_status": criterion.review_status,
        "conditions": criterion.conditions,
    })
}

/// Serializes the fields an entity review snapshot captures.
fn snapshot_entity(entity: &Entity) -> serde_json::Value {
    json!({
        "entity_text": entity.entity_text,
        "review_status": entity.review_status,
        "codes": entity.codes,
        "preferred_term": entity.preferred_term,
    })
}

/// Applies a `modify` action's edits onto a criterion in place.
fn apply_criterion_modification(criterion: &mut Criterion, request: &ReviewActionRequest) -> Result<(), ValidationError> {
    if request.modified_text.is_none() && request.modified_structured_fields.is_none() {
        return Err(ValidationError::new("modify action requires modified_text or modified_structured_fields"));
    }
    if let Some(text) = &request.modified_text {
        criterion.text = text.clone();
    }
    if let Some(field_mappings) = &request.modified_structured_fields {
        criterion.conditions.field_mappings = field_mappings.clone();
    }
    Ok(())
}

/// Applies a `modify` action's edits onto an entity in place. Entities carry
/// no structured field mappings of their own, so a request supplying
/// `modified_structured_fields` is rejected rather than silently ignored.
fn apply_entity_modification(entity: &mut Entity, request: &ReviewActionRequest) -> Result<(), ValidationError> {
    if request.modified_structured_fields.is_some() {
        return Err(ValidationError::new("entity modify action does not accept modified_structured_fields"));
    }
    let Some(text) = &request.modified_text else {
        return Err(ValidationError::new("modify action requires modified_text"));
    };
    entity.entity_text = text.clone();
    Ok(())
}

/// Maps a review action to the review status it produces. Criteria and
/// entities share [`CriterionReviewStatus`] for this field.
fn status_for(action: ReviewAction) -> CriterionReviewStatus {
    match action {
        ReviewAction::Approve => CriterionReviewStatus::Approved,
        ReviewAction::Reject => CriterionReviewStatus::Rejected,
        ReviewAction::Modify => CriterionReviewStatus::Modified,
    }
}

/// Builds the paired `AuditLog` row for a just-built `Review` (spec.md §4.7
/// step 6).
fn audit_log_for(review: &Review, target_type: ReviewTargetType, target_id: String, request: &ReviewActionRequest) -> AuditLog {
    let schema_version = schema_version_for(request);
    let details = AuditDetails { schema_version: Some(schema_version), extra: std::collections::BTreeMap::new() };
    AuditLog::new(AuditEventType::ReviewApplied, Some(review.reviewer_id), target_type, target_id, details)
}

/// Derives the audit schema version for a request: multi-mapping present →
/// `v1.5-multi`; single structured field edit → `structured_v1`; anything
/// else (approve/reject, or a text-only modify) → `text_v1` (spec.md §4.7
/// step 6).
fn schema_version_for(request: &ReviewActionRequest) -> SchemaVersion {
    let field_mapping_count = request.modified_structured_fields.as_ref().map_or(0, Vec::len);
    let has_structured_edit = request.modified_structured_fields.is_some();
    SchemaVersion::derive(field_mapping_count, has_structured_edit)
}

#[cfg(test)]
mod tests {
    use elixir_core::Relation;

    use super::*;

    #[test]
    fn schema_version_text_only_modify_is_text_v1() {
        let request = ReviewActionRequest {
            reviewer_id: ReviewerId::new(),
            action: ReviewAction::Modify,
            comment: None,
            modified_text: Some("Age >= 21 years".to_string()),
            modified_structured_fields: None,
        };
        assert_eq!(schema_version_for(&request), SchemaVersion::TextV1);
    }

    #[test]
    fn schema_version_single_mapping_is_structured_v1() {
        let mut mapping = FieldMapping::unpopulated("Age", Some(1));
        mapping.relation = Some(Relation::Ge);
        let request = ReviewActionRequest {
            reviewer_id: ReviewerId::new(),
            action: ReviewAction::Modify,
            comment: None,
            modified_text: None,
            modified_structured_fields: Some(vec![mapping]),
        };
        assert_eq!(schema_version_for(&request), SchemaVersion::StructuredV1);
    }

    #[test]
    fn schema_version_multiple_mappings_is_v15_multi() {
        let request = ReviewActionRequest {
            reviewer_id: ReviewerId::new(),
            action: ReviewAction::Modify,
            comment: None,
            modified_text: None,
            modified_structured_fields: Some(vec![FieldMapping::unpopulated("Age", None), FieldMapping::unpopulated("ECOG", None)]),
        };
        assert_eq!(schema_version_for(&request), SchemaVersion::V15Multi);
    }

    #[test]
    fn status_for_maps_every_action() {
        assert_eq!(status_for(ReviewAction::Approve), CriterionReviewStatus::Approved);
        assert_eq!(status_for(ReviewAction::Reject), CriterionReviewStatus::Rejected);
        assert_eq!(status_for(ReviewAction::Modify), CriterionReviewStatus::Modified);
    }

    #[test]
    fn entity_modification_rejects_structured_fields() {
        let mut entity = Entity::new(CriterionId::new(), "diabetes", elixir_core::EntityType::Condition, 0, 8);
        let request = ReviewActionRequest {
            reviewer_id: ReviewerId::new(),
            action: ReviewAction::Modify,
            comment: None,
            modified_text: None,
            modified_structured_fields: Some(vec![FieldMapping::unpopulated("Age", None)]),
        };
        assert!(apply_entity_modification(&mut entity, &request).is_err());
    }

    #[test]
    fn entity_modification_applies_replacement_text() {
        let mut entity = Entity::new(CriterionId::new(), "diabetes", elixir_core::EntityType::Condition, 0, 8);
        let request = ReviewActionRequest {
            reviewer_id: ReviewerId::new(),
            action: ReviewAction::Modify,
            comment: None,
            modified_text: Some("type 2 diabetes mellitus".to_string()),
            modified_structured_fields: None,
        };
        apply_entity_modification(&mut entity, &request).expect("text-only modify is valid");
        assert_eq!(entity.entity_text, "type 2 diabetes mellitus");
    }
}
