//! Template analysis: derive a [`FieldMappingRuleSet`] once per template schema.

use serde_json::{json, Value};
use tracing::{info, warn};

use crate::llm_client::prompts::render;
use crate::llm_client::{call_json, CallOptions, TextGenerator};
use crate::mapping::models::{FieldMappingRuleSet, SectionKind, TemplateDefinition};
use crate::mapping::prompts::{ANALYZE_PROMPT_TEMPLATE, ANALYZE_SYSTEM};

/// Compact description of the template sent to the model.
pub fn template_summary(template: &TemplateDefinition) -> Value {
    let sections: Vec<Value> = template
        .components
        .iter()
        .map(|section| {
            let fields: Vec<Value> = section
                .effective_fields()
                .iter()
                .filter_map(|f| {
                    let key = f.key()?;
                    Some(json!({
                        "id": key,
                        "label": f.label,
                        "description": f.description,
                        "data_source": f.data_source,
                        "synonyms": f.synonyms,
                        "type": f.field_type,
                    }))
                })
                .collect();
            json!({
                "type": section.section_type,
                "title": section.title,
                "fields": fields,
            })
        })
        .collect();
    Value::Array(sections)
}

/// Asks the model for a rule set. Any failure yields an empty set, which
/// makes fills fall back to heuristic resolution.
pub async fn analyze_template(llm: &dyn TextGenerator, template: &TemplateDefinition) -> FieldMappingRuleSet {
    if template.is_unstructured() {
        return FieldMappingRuleSet::default();
    }

    let summary = serde_json::to_string_pretty(&template_summary(template)).unwrap_or_default();
    let prompt = render(ANALYZE_PROMPT_TEMPLATE, &[("template_summary", summary.as_str())]);

    let mut rules = match call_json::<FieldMappingRuleSet>(llm, ANALYZE_SYSTEM, &prompt, CallOptions::precise(2000)).await {
        Ok((rules, partial)) => {
            if partial.is_some() {
                warn!("template analysis output was truncated; rule set may be incomplete");
            }
            rules
        }
        Err(e) => {
            warn!(error = %e, "template analysis failed; using heuristic resolution");
            return FieldMappingRuleSet::default();
        }
    };

    flag_fields_without_source(template, &mut rules);
    info!(
        sections = rules.field_mapping.len(),
        complex_fields = rules.complex_fields.len(),
        "template analyzed"
    );
    rules
}

/// A field without a declared data source is flagged for external fill; the
/// flag only matters when rules and heuristics leave it empty.
fn flag_fields_without_source(template: &TemplateDefinition, rules: &mut FieldMappingRuleSet) {
    for section in &template.components {
        let kind = section.kind();
        if matches!(kind, SectionKind::Other(_)) {
            continue;
        }
        for field in section.effective_fields() {
            let Some(key) = field.key() else { continue };
            let declared = field.data_source.as_deref().map(str::trim).unwrap_or_default();
            if !declared.is_empty() {
                continue;
            }
            rules
                .field_mapping
                .entry(kind.as_key().to_string())
                .or_default()
                .entry(key.to_string())
                .or_default()
                .needs_ai_extraction = true;
        }
    }
}
