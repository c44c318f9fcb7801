// crates/elixir-pipeline/src/nodes/schemas.rs
// ============================================================================
// Module: Node Response Schemas
// Description: JSON Schema literals passed as `CompletionRequest::response_schema`
//              for each node's structured-output calls.
// Purpose: Keep the schemas next to the carry-state types they validate
//          rather than inline in each node file.
// Dependencies: serde_json
// ============================================================================

use serde_json::json;
use serde_json::Value as JsonValue;

/// Schema for the `extract` node's criteria list.
pub fn extract_schema() -> JsonValue {
    json!({
        "type": "object",
        "properties": {
            "criteria": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "text": {"type": "string"},
                        "type": {"type": "string", "enum": ["inclusion", "exclusion"]},
                        "assertion": {"type": "string", "enum": ["affirmed", "negated"]},
                        "category": {"type": ["string", "null"]},
                        "confidence": {"type": "number", "minimum": 0.0, "maximum": 1.0},
                        "page_number": {"type": ["integer", "null"]}
                    },
                    "required": ["text", "type", "assertion", "confidence"]
                }
            }
        },
        "required": ["criteria"]
    })
}

/// Schema for the `ground` node's entity-extraction call.
pub fn entity_extraction_schema() -> JsonValue {
    json!({
        "type": "object",
        "properties": {
            "entities": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "entity_text": {"type": "string"},
                        "entity_type": {
                            "type": "string",
                            "enum": ["condition", "measurement", "drug", "procedure", "demographic", "consent", "other"]
                        },
                        "search_term": {"type": "string"},
                        "span_start": {"type": "integer", "minimum": 0},
                        "span_end": {"type": "integer", "minimum": 0}
                    },
                    "required": ["entity_text", "entity_type", "search_term"]
                }
            }
        },
        "required": ["entities"]
    })
}

/// Schema for the `ground` node's decision call.
pub fn grounding_decision_schema() -> JsonValue {
    json!({
        "type": "object",
        "properties": {
            "selected_code": {"type": ["string", "null"]},
            "selected_system": {
                "type": ["string", "null"],
                "enum": ["umls", "snomed", "icd10", "rxnorm", "loinc", "hpo", null]
            },
            "concept_id": {"type": ["integer", "null"]},
            "preferred_term": {"type": ["string", "null"]},
            "confidence": {"type": "number", "minimum": 0.0, "maximum": 1.0},
            "reasoning": {"type": "string"}
        },
        "required": ["confidence", "reasoning"]
    })
}

/// Schema for the `ground` node's agentic-retry reasoning call.
pub fn agentic_reasoning_schema() -> JsonValue {
    json!({
        "type": "object",
        "properties": {
            "skip": {"type": "boolean"},
            "derived_term": {"type": ["string", "null"]},
            "rephrased_query": {"type": ["string", "null"]},
            "reasoning": {"type": "string"}
        },
        "required": ["skip", "reasoning"]
    })
}

/// Schema for the `structure` node's per-criterion decomposition call.
pub fn structure_schema() -> JsonValue {
    json!({
        "type": "object",
        "properties": {
            "operator": {"type": "string", "enum": ["AND", "OR", "NOT"]},
            "field_mappings": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "entity": {"type": "string"},
                        "relation": {
                            "type": "string",
                            "enum": ["=", "!=", ">", ">=", "<", "<=", "within", "not_in_last", "contains", "not_contains"]
                        },
                        "value": {},
                        "unit_text": {"type": ["string", "null"]}
                    },
                    "required": ["entity", "relation"]
                }
            }
        },
        "required": ["operator", "field_mappings"]
    })
}

/// Schema for the `ordinal_resolve` node's unresolved-scale proposal call.
pub fn ordinal_proposal_schema() -> JsonValue {
    json!({
        "type": "object",
        "properties": {
            "scale_name": {"type": "string"},
            "grade": {"type": "string"},
            "reasoning": {"type": "string"}
        },
        "required": ["scale_name", "grade", "reasoning"]
    })
}
