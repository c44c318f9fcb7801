// crates/elixir-pipeline/src/nodes/ground.rs
// ============================================================================
// Module: Ground Node
// Description: Extracts groundable entities per criterion, then dual-grounds
//              each one against terminology search and OMOP mapping,
//              reconciling the two paths with a MedGemma decision and an
//              agentic retry loop (spec.md §4.6.4).
// Dependencies: elixir_core, elixir_llm, tokio
// ============================================================================

//! ## Overview
//! Per criterion: one structured-output call extracts entity mentions. Each
//! groundable entity is then processed concurrently, bounded by
//! [`crate::runner::PipelineConfig::ground_concurrency`]: a terminology
//! search (Path A) and an OMOP mapping call over the same free-text search
//! term (Path B) run independently of one another, and a MedGemma decision
//! reconciles both into a single selection.
//! When the combined confidence falls below the grounding threshold, an
//! agentic reasoning call proposes a skip, a derived parent term, or a
//! rephrased search term, and the attempt repeats up to three times before
//! the entity is handed to a human reviewer. None of this is fatal to the
//! node itself — only a batch that grounds nothing at all is.

use std::sync::Arc;
use std::collections::BTreeMap;

use elixir_core::Criterion;
use elixir_core::Entity;
use elixir_core::EntityType;
use elixir_core::GroundingMethod;
use elixir_core::CompletionRequest;
use elixir_core::Candidate;
use elixir_core::LlmError;
use elixir_core::LlmGateway;
use elixir_core::NodeError;
use elixir_core::OmopCandidate;
use elixir_core::OmopMapper;
use elixir_core::PipelineNode;
use elixir_core::Protocol;
use elixir_core::TerminologyRouter;
use elixir_core::AuditDetails;
use elixir_core::AuditEventType;
use elixir_core::AuditLog;
use elixir_core::ReviewTargetType;
use elixir_llm::ModelKind;
use elixir_llm::NodeName;
use serde_json::Value as JsonValue;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use super::schemas;
use super::state::AgenticReasoningResult;
use super::state::EntityExtractionResult;
use super::state::GroundState;
use super::state::GroundingDecision;
use super::state::ParseState;
use crate::runner::PipelineRunner;

/// Minimum combined confidence for an entity to be considered grounded.
const MIN_CONFIDENCE: f64 = 0.5;
/// Combined confidence at or above which a first-attempt grounding counts as
/// an exact match rather than a fuzzy search result.
const EXACT_THRESHOLD: f64 = 0.9;
/// Minimum terminology search score worth carrying into the decision step.
const MIN_SEARCH_SCORE: f64 = 0.3;
/// Maximum grounding attempts (initial search plus agentic retries) before
/// an entity is handed to a human reviewer (spec.md §4.6.4 step 5).
const MAX_GROUND_ATTEMPTS: u32 = 3;

/// The collaborators an individual entity's grounding needs, cloned out of
/// the runner so each concurrent task owns what it touches.
#[derive(Clone)]
struct Collaborators {
    llm: Arc<dyn LlmGateway>,
    terminology: Arc<dyn TerminologyRouter>,
    omop: Arc<dyn OmopMapper>,
}

/// Extracts and dual-grounds every entity across a batch's criteria.
///
/// # Errors
/// Returns [`NodeError`] if the previous node's carry state cannot be read,
/// the criteria cannot be listed, or the batch grounds zero entities outright
/// (entity extraction failed for every criterion, or none of the entities
/// extracted could be grounded). Per-entity grounding shortfalls never
/// surface here; they accumulate in the returned state's `errors`.
pub async fn run(runner: &PipelineRunner, protocol: &mut Protocol, carry: &JsonValue) -> Result<JsonValue, NodeError> {
    let parse_state: ParseState = super::from_carry(PipelineNode::Ground, carry)?;
    let criteria = runner.criteria.list_for_batch(parse_state.batch_id).await.map_err(|error| {
        NodeError::new(PipelineNode::Ground, "failed to load criteria for batch").with_technical_detail(error.to_string())
    })?;

    let collaborators = Collaborators { llm: runner.llm.clone(), terminology: runner.terminology.clone(), omop: runner.omop.clone() };
    let semaphore = Arc::new(Semaphore::new(runner.config.ground_concurrency.max(1)));

    let mut entities = Vec::new();
    let mut errors = Vec::new();
    let mut extraction_attempted = false;
    let mut extraction_succeeded = false;

    for criterion in &criteria {
        let extracted = match extract_entities(&collaborators.llm, criterion).await {
            Ok(extracted) => extracted,
            Err(error) => {
                extraction_attempted = true;
                errors.push(format!("entity extraction failed for criterion {}: {error}", criterion.id));
                continue;
            }
        };
        extraction_attempted = true;
        if !extracted.entities.is_empty() {
            extraction_succeeded = true;
        }

        let mut set = JoinSet::new();
        for mention in extracted.entities {
            let collaborators = collaborators.clone();
            let semaphore = semaphore.clone();
            let criterion_id = criterion.id;
            let criterion_text = criterion.text.clone();
            set.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                ground_entity(&collaborators, criterion_id, &criterion_text, mention).await
            });
        }
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((entity, error)) => {
                    if let Some(error) = error {
                        errors.push(error);
                    }
                    entities.push(entity);
                }
                Err(join_error) => errors.push(format!("grounding task panicked: {join_error}")),
            }
        }
    }

    if extraction_attempted && !extraction_succeeded {
        return Err(NodeError::new(PipelineNode::Ground, "entity extraction failed for every criterion in this batch"));
    }

    let grounded_count = entities.iter().filter(|entity| entity.codes.has_any_code()).count();
    if !entities.is_empty() && grounded_count == 0 {
        return Err(NodeError::new(PipelineNode::Ground, "no entities in this batch could be grounded"));
    }

    for entity in &entities {
        let audit = AuditLog::new(
            AuditEventType::EntityGrounded,
            None,
            ReviewTargetType::Entity,
            entity.id.to_string(),
            AuditDetails { schema_version: None, extra: audit_extra(entity) },
        );
        if let Err(error) = runner.audit_logs.insert(&audit).await {
            errors.push(format!("failed to record grounding audit entry for entity {}: {error}", entity.id));
        }
    }

    super::to_carry(PipelineNode::Ground, &GroundState { batch_id: parse_state.batch_id, entities, errors })
}

/// Builds the audit detail payload for one grounded entity.
fn audit_extra(entity: &Entity) -> BTreeMap<String, JsonValue> {
    let mut extra = BTreeMap::new();
    extra.insert("entity_text".to_string(), JsonValue::String(entity.entity_text.clone()));
    extra.insert("grounding_method".to_string(), serde_json::to_value(entity.grounding_method).unwrap_or(JsonValue::Null));
    extra.insert("grounding_confidence".to_string(), serde_json::json!(entity.grounding_confidence));
    extra
}

/// Calls the entity-extraction LLM target for one criterion.
async fn extract_entities(llm: &Arc<dyn LlmGateway>, criterion: &Criterion) -> Result<EntityExtractionResult, LlmError> {
    let template = super::templates().get(NodeName::GroundEntityExtraction, ModelKind::Gemini);
    let Some(template) = template else {
        return Err(LlmError::Upstream { target: "entity-extraction".to_string(), message: "no template configured".to_string() });
    };

    let mut vars = BTreeMap::new();
    vars.insert("criterion_type", format!("{:?}", criterion.criterion_type));
    vars.insert("criterion_text", criterion.text.clone());

    let request = CompletionRequest {
        target: "entity-extraction".to_string(),
        system_prompt: template.render_system(&vars),
        user_content: template.render_user(&vars),
        response_schema: schemas::entity_extraction_schema(),
        max_agentic_attempts: 2,
    };
    let response = llm.complete(request).await?;
    serde_json::from_value(response.payload)
        .map_err(|error| LlmError::Upstream { target: "entity-extraction".to_string(), message: error.to_string() })
}

/// Dual-grounds one extracted entity mention, retrying with agentic
/// reasoning up to [`MAX_GROUND_ATTEMPTS`] times before deferring to a human
/// reviewer. Always returns an [`Entity`]; the second element is a
/// human-readable note when the entity needed expert review.
async fn ground_entity(
    collaborators: &Collaborators,
    criterion_id: elixir_core::CriterionId,
    criterion_text: &str,
    mention: super::state::ExtractedEntity,
) -> (Entity, Option<String>) {
    let mut entity = Entity::new(criterion_id, mention.entity_text.clone(), mention.entity_type, mention.span_start, mention.span_end);

    if !mention.entity_type.is_groundable() {
        entity.grounding_method = GroundingMethod::Skipped;
        return (entity, None);
    }

    let mut search_term = mention.search_term.clone();
    let mut history: Vec<String> = Vec::new();
    let domain_hint = elixir_core::DomainHint::from_entity_type(mention.entity_type);

    for attempt in 0..MAX_GROUND_ATTEMPTS {
        // Path A (TerminologyRouter) and Path B (OMOPMapper) run independently
        // and concurrently (spec.md §4.6.4 step 2); Path B never waits on
        // Path A producing a candidate.
        let (candidates, omop_candidate) = tokio::join!(
            collaborators.terminology.route_search(mention.entity_type, &search_term),
            collaborators.omop.map_code(&search_term, domain_hint),
        );
        let candidates: Vec<Candidate> =
            candidates.unwrap_or_default().into_iter().filter(|candidate| candidate.score >= MIN_SEARCH_SCORE).collect();
        let omop_candidate = omop_candidate.ok().flatten();
        let top = candidates.first();

        let Ok(decision) = decide(&collaborators.llm, criterion_text, &mention.entity_text, &candidates, omop_candidate.as_ref()).await else {
            history.push(format!("decision call failed on attempt {attempt}"));
            continue;
        };

        let path_confidences = [top.map(|candidate| candidate.score), omop_candidate.as_ref().map(|candidate| candidate.score)];
        let max_path_confidence = path_confidences.into_iter().flatten().fold(0.0_f64, f64::max);
        let combined_confidence = 0.6 * decision.confidence + 0.4 * max_path_confidence;

        if combined_confidence >= MIN_CONFIDENCE {
            apply_decision(&mut entity, &decision);
            entity.grounding_confidence = combined_confidence;
            entity.grounding_method = match (attempt, combined_confidence >= EXACT_THRESHOLD) {
                (0, true) => GroundingMethod::Exact,
                (0, false) => GroundingMethod::Search,
                _ => GroundingMethod::Agentic,
            };
            return (entity, None);
        }

        let Ok(reasoning) = agentic_reasoning(&collaborators.llm, &mention.entity_text, &history).await else {
            break;
        };
        if reasoning.skip {
            entity.grounding_method = GroundingMethod::Skipped;
            return (entity, None);
        }
        if let Some(rephrased) = reasoning.rephrased_query {
            search_term = rephrased;
        } else if let Some(derived) = reasoning.derived_term {
            search_term = derived;
        }
        history.push(reasoning.reasoning);
    }

    entity.grounding_method = GroundingMethod::ExpertReview;
    let message = format!("entity {:?} exhausted grounding attempts and was flagged for expert review", entity.entity_text);
    (entity, Some(message))
}

/// Copies a grounding decision's selected code into the entity's matching
/// vocabulary field and preferred term.
fn apply_decision(entity: &mut Entity, decision: &GroundingDecision) {
    entity.preferred_term = decision.preferred_term.clone();
    let Some(code) = decision.selected_code.clone() else { return };
    match decision.selected_system.as_deref() {
        Some("umls") => entity.codes.umls_cui = Some(code),
        Some("snomed") => entity.codes.snomed_code = Some(code),
        Some("icd10") => entity.codes.icd10_code = Some(code),
        Some("rxnorm") => entity.codes.rxnorm_code = Some(code),
        Some("loinc") => entity.codes.loinc_code = Some(code),
        Some("hpo") => entity.codes.hpo_code = Some(code),
        _ => {}
    }
}

/// Calls the MedGemma decision target reconciling a terminology search result
/// with an OMOP mapping candidate.
async fn decide(
    llm: &Arc<dyn LlmGateway>,
    criterion_text: &str,
    entity_text: &str,
    candidates: &[Candidate],
    omop_candidate: Option<&OmopCandidate>,
) -> Result<GroundingDecision, LlmError> {
    let template = super::templates().get(NodeName::GroundDecision, ModelKind::MedGemma);
    let Some(template) = template else {
        return Err(LlmError::Upstream { target: "grounding-decision".to_string(), message: "no template configured".to_string() });
    };

    let mut vars = BTreeMap::new();
    vars.insert("entity_text", entity_text.to_string());
    vars.insert("criterion_context", criterion_text.to_string());
    vars.insert("terminology_candidates", format!("{candidates:?}"));
    vars.insert("omop_candidate", format!("{omop_candidate:?}"));

    let request = CompletionRequest {
        target: "grounding-decision".to_string(),
        system_prompt: template.render_system(&vars),
        user_content: template.render_user(&vars),
        response_schema: schemas::grounding_decision_schema(),
        max_agentic_attempts: 2,
    };
    let response = llm.complete(request).await?;
    serde_json::from_value(response.payload)
        .map_err(|error| LlmError::Upstream { target: "grounding-decision".to_string(), message: error.to_string() })
}

/// Calls the agentic-retry reasoning target for an entity that did not reach
/// grounding confidence.
async fn agentic_reasoning(llm: &Arc<dyn LlmGateway>, entity_text: &str, history: &[String]) -> Result<AgenticReasoningResult, LlmError> {
    let template = super::templates().get(NodeName::GroundAgenticRetry, ModelKind::MedGemma);
    let Some(template) = template else {
        return Err(LlmError::Upstream { target: "grounding-agentic".to_string(), message: "no template configured".to_string() });
    };

    let mut vars = BTreeMap::new();
    vars.insert("entity_text", entity_text.to_string());
    vars.insert("iteration_history", history.join(" | "));

    let request = CompletionRequest {
        target: "grounding-agentic".to_string(),
        system_prompt: template.render_system(&vars),
        user_content: template.render_user(&vars),
        response_schema: schemas::agentic_reasoning_schema(),
        max_agentic_attempts: 2,
    };
    let response = llm.complete(request).await?;
    serde_json::from_value(response.payload)
        .map_err(|error| LlmError::Upstream { target: "grounding-agentic".to_string(), message: error.to_string() })
}
