// crates/elixir-llm/src/templates.rs
// ============================================================================
// Module: TemplateStore
// Description: (node, model) keyed prompt template store with `{{var}}`
//              substitution.
// Purpose: Implement spec.md §9's design note — "Model-specific prompt
//          templates → template store keyed by (node, model); prompts are
//          data" — so changing a decomposition rule is a template edit, not
//          a code change.
// Dependencies: std::collections::BTreeMap
// ============================================================================

//! ## Overview
//! No full Jinja engine is pulled in; templates are embedded strings with
//! `{{var}}` placeholders substituted by exact text match, matching the
//! teacher's minimal-dependency posture elsewhere in the workspace. A
//! missing variable is left as the literal `{{var}}` text rather than
//! erroring, since an empty criterion field is a legitimate input, not a
//! template bug.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

// ============================================================================
// SECTION: Node / Model Kind
// ============================================================================

/// Which pipeline node a template renders for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum NodeName {
    /// The `extract` node's criteria-extraction prompt.
    Extract,
    /// The `ground` node's entity-extraction prompt.
    GroundEntityExtraction,
    /// The `ground` node's MedGemma decision prompt.
    GroundDecision,
    /// The `ground` node's agentic retry prompt.
    GroundAgenticRetry,
    /// The `structure` node's expression-tree decomposition prompt.
    Structure,
    /// The `ordinal_resolve` node's unknown-scale proposal prompt.
    OrdinalResolve,
    /// A reviewer-triggered single-criterion correction proposal; read-only,
    /// never persisted directly.
    RerunProposal,
}

/// Which model backs a given template instantiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ModelKind {
    /// Gemini structured-output calls.
    Gemini,
    /// MedGemma agentic-reasoning calls.
    MedGemma,
}

// ============================================================================
// SECTION: Template
// ============================================================================

/// One renderable prompt template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    /// System prompt text, rendered with the same variable substitution as
    /// `user_body`.
    pub system: String,
    /// User-turn body text with `{{var}}` placeholders.
    pub user_body: String,
}

impl Template {
    /// Renders `user_body` by substituting every `{{key}}` occurrence with
    /// its value from `vars`. Unmatched placeholders are left verbatim.
    #[must_use]
    pub fn render_user(&self, vars: &BTreeMap<&str, String>) -> String {
        render(&self.user_body, vars)
    }

    /// Renders `system` the same way as [`Template::render_user`].
    #[must_use]
    pub fn render_system(&self, vars: &BTreeMap<&str, String>) -> String {
        render(&self.system, vars)
    }
}

fn render(template: &str, vars: &BTreeMap<&str, String>) -> String {
    let mut rendered = template.to_string();
    for (key, value) in vars {
        rendered = rendered.replace(&format!("{{{{{key}}}}}"), value);
    }
    rendered
}

// ============================================================================
// SECTION: TemplateStore
// ============================================================================

/// A `(NodeName, ModelKind)`-keyed collection of [`Template`]s.
#[derive(Debug, Clone, Default)]
pub struct TemplateStore {
    templates: BTreeMap<(NodeName, ModelKind), Template>,
}

impl TemplateStore {
    /// Builds the default template set, covering every node/model pairing
    /// the pipeline calls today.
    #[must_use]
    pub fn default_templates() -> Self {
        let mut store = Self::default();
        store.insert(
            NodeName::Extract,
            ModelKind::Gemini,
            Template {
                system: "Extract only inclusion/exclusion eligibility criteria from the protocol \
                         text. Preserve source page numbers. Mark negated phrasing (\"no known \
                         history of\", \"absence of\") as assertion=negated."
                    .to_string(),
                user_body: "{{document_text}}".to_string(),
            },
        );
        store.insert(
            NodeName::GroundEntityExtraction,
            ModelKind::Gemini,
            Template {
                system: "Extract every groundable medical entity mentioned in the criterion. Each \
                         entity must map to exactly one UMLS CUI: decompose compound phrases like \
                         \"liver abnormality (e.g. cirrhosis, transplant)\" into atomic entities \
                         (\"liver abnormality\", \"cirrhosis\", \"transplant\"). Never emit an \
                         entire parenthetical clause as one entity."
                    .to_string(),
                user_body: "criterion_type: {{criterion_type}}\ntext: {{criterion_text}}".to_string(),
            },
        );
        store.insert(
            NodeName::GroundDecision,
            ModelKind::MedGemma,
            Template {
                system: "Given an entity mention, its criterion context, and two independent \
                         candidate lists (terminology search results and an OMOP mapping), decide \
                         the single best grounding: selected_code, selected_system, concept_id, \
                         preferred_term, confidence, reasoning."
                    .to_string(),
                user_body: "entity: {{entity_text}}\ncriterion_context: {{criterion_context}}\n\
                            terminology_candidates: {{terminology_candidates}}\nomop_candidate: {{omop_candidate}}"
                    .to_string(),
            },
        );
        store.insert(
            NodeName::GroundAgenticRetry,
            ModelKind::MedGemma,
            Template {
                system: "An entity could not be confidently grounded. Answer three questions: \
                         (Q1) Is this a valid groundable medical concept, or should it be skipped? \
                         (Q2) Is it a derived concept that maps to a standard parent? \
                         (Q3) Can the search term be rephrased to ground more confidently? Each \
                         retry attempt must propose a different search_term than the previous \
                         attempt."
                    .to_string(),
                user_body: "entity: {{entity_text}}\niteration_history: {{iteration_history}}".to_string(),
            },
        );
        store.insert(
            NodeName::Structure,
            ModelKind::Gemini,
            Template {
                system: "Decompose the criterion text into an AND/OR/NOT expression tree over its \
                         grounded entities, and populate each field mapping's relation and value. \
                         Map free-text units through the UCUM table; map boolean findings \
                         (\"positive\"/\"negative\") to SNOMED value concepts."
                    .to_string(),
                user_body: "text: {{criterion_text}}\nentities: {{entities}}".to_string(),
            },
        );
        store.insert(
            NodeName::OrdinalResolve,
            ModelKind::Gemini,
            Template {
                system: "The criterion references an ordinal clinical scale not in the known-scale \
                         lookup table. Propose a unit_concept_id and a grade-to-value_concept_id \
                         mapping by analogy with the known scales. This proposal is not persisted \
                         as authoritative; it is flagged for human review."
                    .to_string(),
                user_body: "text: {{criterion_text}}\nknown_scale_examples: {{known_scale_examples}}".to_string(),
            },
        );
        store.insert(
            NodeName::RerunProposal,
            ModelKind::Gemini,
            Template {
                system: "A reviewer is reconsidering one already-extracted criterion. Propose a \
                         corrected text and, when applicable, corrected field mappings. This is a \
                         read-only suggestion: it is shown to the reviewer but never written to the \
                         criterion directly."
                    .to_string(),
                user_body: "current_text: {{criterion_text}}\ncurrent_field_mappings: {{field_mappings}}\nreviewer_comment: {{reviewer_comment}}"
                    .to_string(),
            },
        );
        store
    }

    /// Inserts or replaces the template for a `(node, model)` pair.
    pub fn insert(&mut self, node: NodeName, model: ModelKind, template: Template) {
        self.templates.insert((node, model), template);
    }

    /// Looks up the template for a `(node, model)` pair.
    #[must_use]
    pub fn get(&self, node: NodeName, model: ModelKind) -> Option<&Template> {
        self.templates.get(&(node, model))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_templates_cover_every_pipeline_call_site() {
        let store = TemplateStore::default_templates();
        assert!(store.get(NodeName::Extract, ModelKind::Gemini).is_some());
        assert!(store.get(NodeName::GroundDecision, ModelKind::MedGemma).is_some());
        assert!(store.get(NodeName::Structure, ModelKind::Gemini).is_some());
    }

    #[test]
    fn render_substitutes_known_variables_and_leaves_unknown_ones_verbatim() {
        let template = Template { system: String::new(), user_body: "hello {{name}}, {{missing}}".to_string() };
        let mut vars = BTreeMap::new();
        vars.insert("name", "world".to_string());
        assert_eq!(template.render_user(&vars), "hello world, {{missing}}");
    }
}
