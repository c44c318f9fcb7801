// crates/elixir-pipeline/src/nodes/state.rs
// ============================================================================
// Module: Node Carry State
// Description: Serializable shapes each node reads from and writes to the
//              checkpointed `carry` value passed between nodes.
// Purpose: Give `PipelineRunner` one opaque `serde_json::Value` per
//          checkpoint (spec.md §4.6) while giving each node a typed view of
//          what it actually reads and produces.
// Dependencies: serde, serde_json, elixir_core
// ============================================================================

//! ## Overview
//! Every node's output becomes the next node's `carry` input. These types
//! are the typed mirror of that JSON value — never persisted as domain rows
//! themselves, only as `PipelineCheckpoint.state`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use elixir_core::Assertion;
use elixir_core::CriteriaBatchId;
use elixir_core::CriterionId;
use elixir_core::CriterionType;
use elixir_core::Entity;
use elixir_core::EntityType;
use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: ingest
// ============================================================================

/// One page's extracted text, carried from `ingest` to `extract`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageText {
    /// One-based page number.
    pub page_number: u32,
    /// Concatenated block text for this page.
    pub text: String,
}

/// Output of the `ingest` node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestState {
    /// Parsed pages, in order.
    pub pages: Vec<PageText>,
    /// Document quality score in `[0, 1]` (spec.md §4.6.1).
    pub quality_score: f64,
}

// ============================================================================
// SECTION: extract
// ============================================================================

/// One criterion as returned by the extraction LLM call, before `parse`
/// dedupes and splits it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedCriterion {
    /// Extracted criterion text.
    pub text: String,
    /// Inclusion or exclusion.
    #[serde(rename = "type")]
    pub criterion_type: CriterionType,
    /// Affirmed or negated phrasing.
    pub assertion: Assertion,
    /// Free-form category tag assigned by the extraction model.
    #[serde(default)]
    pub category: Option<String>,
    /// Extraction confidence in `[0, 1]`.
    pub confidence: f64,
    /// Source page number, when the model could attribute one.
    #[serde(default)]
    pub page_number: Option<u32>,
}

/// Output of the `extract` node.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractState {
    /// Raw extracted criteria, not yet deduped or persisted.
    pub criteria: Vec<ExtractedCriterion>,
}

// ============================================================================
// SECTION: parse
// ============================================================================

/// Output of the `parse` node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParseState {
    /// The batch `parse` created for this extraction run.
    pub batch_id: CriteriaBatchId,
    /// Ids of the criteria `parse` persisted, in batch order.
    pub criterion_ids: Vec<CriterionId>,
}

// ============================================================================
// SECTION: ground
// ============================================================================

/// One entity mention as returned by the ground node's entity-extraction
/// call, before dual grounding resolves its codes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedEntity {
    /// Original mention text.
    pub entity_text: String,
    /// Clinical category.
    pub entity_type: EntityType,
    /// Search term to route through terminology/OMOP search.
    pub search_term: String,
    /// Start offset within the criterion's text.
    #[serde(default)]
    pub span_start: u32,
    /// End offset within the criterion's text.
    #[serde(default)]
    pub span_end: u32,
}

/// Response shape of the entity-extraction call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntityExtractionResult {
    /// Extracted entity mentions for one criterion.
    pub entities: Vec<ExtractedEntity>,
}

/// The MedGemma decision result for one grounding attempt (spec.md §4.6.4
/// step 3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroundingDecision {
    /// Vocabulary-native code selected, if any.
    #[serde(default)]
    pub selected_code: Option<String>,
    /// Name of the vocabulary system `selected_code` belongs to.
    #[serde(default)]
    pub selected_system: Option<String>,
    /// OMOP `concept_id`, preferred over a terminology code for exports.
    #[serde(default)]
    pub concept_id: Option<i64>,
    /// Preferred display term for the selected code.
    #[serde(default)]
    pub preferred_term: Option<String>,
    /// Decision confidence in `[0, 1]`.
    pub confidence: f64,
    /// Free-text rationale for the decision.
    pub reasoning: String,
}

/// The agentic retry reasoning result (spec.md §4.6.4 step 5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgenticReasoningResult {
    /// Whether the entity should be skipped outright (Q1).
    pub skip: bool,
    /// A standard parent term this entity derives from, if any (Q2).
    #[serde(default)]
    pub derived_term: Option<String>,
    /// A rephrased search term to retry with (Q3).
    #[serde(default)]
    pub rephrased_query: Option<String>,
    /// Free-text rationale.
    pub reasoning: String,
}

/// Output of the `ground` node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroundState {
    /// The batch being grounded.
    pub batch_id: CriteriaBatchId,
    /// Every entity produced across the batch's criteria.
    pub entities: Vec<Entity>,
    /// Accumulated per-entity failure messages; never fatal (spec.md
    /// §4.6.4).
    pub errors: Vec<String>,
}

// ============================================================================
// SECTION: persist
// ============================================================================

/// Output of the `persist` node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistState {
    /// The batch that was persisted.
    pub batch_id: CriteriaBatchId,
    /// Total entities written.
    pub entity_count: usize,
    /// Entities that carry at least one vocabulary code.
    pub grounded_count: usize,
}

// ============================================================================
// SECTION: structure
// ============================================================================

/// One field mapping as decomposed by the `structure` node's LLM call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructureFieldMapping {
    /// Entity mention text this mapping refers to.
    pub entity: String,
    /// Comparison relation.
    pub relation: elixir_core::Relation,
    /// Comparison value.
    #[serde(default)]
    pub value: Option<elixir_core::MappingValue>,
    /// Free-text unit, when the value carries one.
    #[serde(default)]
    pub unit_text: Option<String>,
}

/// Response shape of the `structure` node's per-criterion decomposition
/// call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructureDecomposition {
    /// Root boolean operator combining the field mappings.
    pub operator: elixir_core::Operator,
    /// Decomposed field mappings.
    pub field_mappings: Vec<StructureFieldMapping>,
}

/// Output of the `structure` node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructureState {
    /// The batch that was structured.
    pub batch_id: CriteriaBatchId,
    /// Number of criteria a tree was built for.
    pub criterion_count: usize,
}

// ============================================================================
// SECTION: ordinal_resolve
// ============================================================================

/// Output of the `ordinal_resolve` node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrdinalResolveState {
    /// The batch that was resolved.
    pub batch_id: CriteriaBatchId,
    /// Number of criteria a known ordinal scale was written through for.
    pub known_scale_matches: usize,
    /// Number of criteria an unresolved-scale proposal was recorded for.
    pub proposals_recorded: usize,
}
