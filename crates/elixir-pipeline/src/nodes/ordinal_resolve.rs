// crates/elixir-pipeline/src/nodes/ordinal_resolve.rs
// ============================================================================
// Module: Ordinal Resolve Node
// Description: Resolves ordinal performance/severity scale mentions (ECOG,
//              NYHA, Karnofsky, Child-Pugh) to graded OMOP value concepts,
//              falling back to a flagged-for-review proposal for unrecognized
//              scales (spec.md §4.6.7).
// Dependencies: elixir_core, elixir_llm, crate::ordinal_scales
// ============================================================================

use std::collections::BTreeMap;

use elixir_core::AuditDetails;
use elixir_core::AuditEventType;
use elixir_core::AuditLog;
use elixir_core::CompletionRequest;
use elixir_core::Criterion;
use elixir_core::LlmError;
use elixir_core::LlmGateway;
use elixir_core::MappingValue;
use elixir_core::NodeError;
use elixir_core::PipelineNode;
use elixir_core::Protocol;
use elixir_core::ProtocolStatus;
use elixir_core::ReviewTargetType;
use elixir_llm::ModelKind;
use elixir_llm::NodeName;
use serde::Deserialize;
use serde_json::json;
use serde_json::Value as JsonValue;

use crate::ordinal_scales::detect_known_scale;
use crate::ordinal_scales::OrdinalScale;
use crate::runner::PipelineRunner;

use super::schemas;
use super::state::ParseState;
use super::state::OrdinalResolveState;

/// Resolves known ordinal scale mentions to graded OMOP concepts, proposes
/// an unknown scale's grading through a structured LLM call otherwise, and
/// advances the protocol into the pending-review stage.
///
/// # Errors
/// Returns [`NodeError`] if the previous node's carry state cannot be read
/// or a criterion cannot be persisted.
pub async fn run(runner: &PipelineRunner, protocol: &mut Protocol, carry: &JsonValue) -> Result<JsonValue, NodeError> {
    let parse_state: ParseState = super::from_carry(PipelineNode::OrdinalResolve, carry)?;
    let criteria = runner.criteria.list_for_batch(parse_state.batch_id).await.map_err(|error| {
        NodeError::new(PipelineNode::OrdinalResolve, "failed to load criteria for batch").with_technical_detail(error.to_string())
    })?;

    let mut known_scale_matches = 0;
    let mut proposals_recorded = 0;

    for mut criterion in criteria {
        let Some(scale) = detect_known_scale(&criterion.text) else {
            continue;
        };

        if let Some(grade) = find_grade_label(scale, &criterion.text) {
            if let Some(grade) = scale.grade(&grade) {
                apply_known_grade(&mut criterion, scale, grade.label, grade.value_concept_id);
                runner.criteria.update(&criterion).await.map_err(|error| {
                    NodeError::new(PipelineNode::OrdinalResolve, "failed to persist resolved ordinal grade").with_technical_detail(error.to_string())
                })?;
                known_scale_matches += 1;
                continue;
            }
        }

        let proposal = propose_grading(runner.llm.as_ref(), scale, &criterion.text).await.map_err(|error| {
            NodeError::new(PipelineNode::OrdinalResolve, "ordinal scale proposal call failed").with_technical_detail(error.to_string())
        })?;
        record_proposal(runner, &criterion, &proposal).await.map_err(|error| {
            NodeError::new(PipelineNode::OrdinalResolve, "failed to record ordinal scale proposal").with_technical_detail(error.to_string())
        })?;
        proposals_recorded += 1;
    }

    protocol.advance(ProtocolStatus::PendingReview);

    super::to_carry(
        PipelineNode::OrdinalResolve,
        &OrdinalResolveState { batch_id: parse_state.batch_id, known_scale_matches, proposals_recorded },
    )
}

/// Finds which of a scale's grade labels is mentioned in criterion text,
/// matched as a whole word, case-insensitively.
fn find_grade_label(scale: &OrdinalScale, text: &str) -> Option<String> {
    let lowered = text.to_lowercase();
    scale
        .grades
        .iter()
        .find(|grade| {
            lowered.split(|c: char| !c.is_alphanumeric()).any(|word| word.eq_ignore_ascii_case(grade.label))
        })
        .map(|grade| grade.label.to_string())
}

/// Writes a resolved grade into the criterion's first field mapping, since
/// ordinal resolution targets the same categorical-value slot the
/// `structure` node leaves for boolean/categorical concepts.
fn apply_known_grade(criterion: &mut Criterion, scale: &OrdinalScale, label: &str, value_concept_id: i64) {
    let Some(mapping) = criterion.conditions.field_mappings.first_mut() else {
        return;
    };
    mapping.value = Some(MappingValue::Text(label.to_string()));
    mapping.value_concept_id = Some(value_concept_id);
    mapping.unit_concept_id = Some(scale.unit_concept_id);
}

/// The shape returned by the ordinal scale proposal target.
#[derive(Debug, Deserialize)]
struct OrdinalProposal {
    scale_name: String,
    grade: String,
    reasoning: String,
}

/// Calls the ordinal scale proposal target for a criterion whose scale
/// mention did not resolve to a known grade.
async fn propose_grading(llm: &dyn LlmGateway, scale: &OrdinalScale, criterion_text: &str) -> Result<OrdinalProposal, LlmError> {
    let template = super::templates().get(NodeName::OrdinalResolve, ModelKind::Gemini);
    let Some(template) = template else {
        return Err(LlmError::Upstream { target: "ordinal-proposal".to_string(), message: "no template configured".to_string() });
    };

    let mut vars = BTreeMap::new();
    vars.insert("criterion_text", criterion_text.to_string());
    vars.insert("scale_name", scale.name.to_string());

    let request = CompletionRequest {
        target: "ordinal-proposal".to_string(),
        system_prompt: template.render_system(&vars),
        user_content: template.render_user(&vars),
        response_schema: schemas::ordinal_proposal_schema(),
        max_agentic_attempts: 2,
    };
    let response = llm.complete(request).await?;
    serde_json::from_value(response.payload).map_err(|error| LlmError::Upstream { target: "ordinal-proposal".to_string(), message: error.to_string() })
}

/// Records an unresolved scale's proposed grading as an audit entry flagged
/// for human review, since no known scale table entry backs it.
async fn record_proposal(runner: &PipelineRunner, criterion: &Criterion, proposal: &OrdinalProposal) -> Result<(), elixir_core::RepositoryError> {
    let details = AuditDetails {
        schema_version: None,
        extra: BTreeMap::from([
            ("scale_name".to_string(), json!(proposal.scale_name)),
            ("grade".to_string(), json!(proposal.grade)),
            ("reasoning".to_string(), json!(proposal.reasoning)),
        ]),
    };
    let log = AuditLog::new(
        AuditEventType::Other("ordinal_scale_proposed".to_string()),
        None,
        ReviewTargetType::Criteria,
        criterion.id.to_string(),
        details,
    );
    runner.audit_logs.insert(&log).await
}
