//! Template persistence. The rule set is regenerated whenever the schema is
//! written, so a stored template always carries rules for its current schema.

use serde_json::Value;
use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::llm_client::TextGenerator;
use crate::mapping::analyzer::analyze_template;
use crate::mapping::models::{FieldMappingRuleSet, TemplateDefinition};
use crate::mapping::rules::CompiledRuleSet;
use crate::models::template::TemplateRow;

/// A template ready to fill: its definition plus compiled rules, if any.
pub struct LoadedTemplate {
    pub row: TemplateRow,
    pub definition: TemplateDefinition,
    pub rules: Option<CompiledRuleSet>,
}

impl LoadedTemplate {
    pub fn from_row(row: TemplateRow) -> Result<Self, AppError> {
        let definition = parse_definition(&row.template_schema)?;
        let rules = row
            .mapping_rules
            .as_ref()
            .and_then(|value| {
                serde_json::from_value::<FieldMappingRuleSet>(value.clone())
                    .inspect_err(|e| warn!(template_id = %row.id, error = %e, "stored mapping rules do not decode"))
                    .ok()
            })
            .and_then(|rules| CompiledRuleSet::compile(&rules));
        Ok(Self {
            row,
            definition,
            rules,
        })
    }
}

pub fn parse_definition(schema: &Value) -> Result<TemplateDefinition, AppError> {
    serde_json::from_value(schema.clone())
        .map_err(|e| AppError::Validation(format!("template_schema is not a valid template: {e}")))
}

/// Analyzed rules in their stored form; `None` when analysis produced nothing.
async fn analyzed_rules(llm: &dyn TextGenerator, definition: &TemplateDefinition) -> Option<Value> {
    let rules = analyze_template(llm, definition).await;
    if !rules.is_valid() {
        return None;
    }
    serde_json::to_value(&rules).ok()
}

pub async fn create_template(
    pool: &PgPool,
    llm: &dyn TextGenerator,
    tenant_id: Uuid,
    name: &str,
    schema: Value,
) -> Result<TemplateRow, AppError> {
    let definition = parse_definition(&schema)?;
    let mapping_rules = analyzed_rules(llm, &definition).await;

    let row = sqlx::query_as::<_, TemplateRow>(
        r#"
        INSERT INTO templates (id, tenant_id, name, template_schema, mapping_rules)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(tenant_id)
    .bind(name)
    .bind(schema)
    .bind(mapping_rules)
    .fetch_one(pool)
    .await?;

    info!(template_id = %row.id, has_rules = row.mapping_rules.is_some(), "template created");
    Ok(row)
}

/// Replaces the schema and its rule set in one statement. Fills already
/// holding the previous rules finish with them.
pub async fn update_template(
    pool: &PgPool,
    llm: &dyn TextGenerator,
    tenant_id: Uuid,
    id: Uuid,
    name: Option<&str>,
    schema: Value,
) -> Result<TemplateRow, AppError> {
    let definition = parse_definition(&schema)?;
    let mapping_rules = analyzed_rules(llm, &definition).await;

    let row = sqlx::query_as::<_, TemplateRow>(
        r#"
        UPDATE templates
        SET name = COALESCE($2, name),
            template_schema = $3,
            mapping_rules = $4,
            updated_at = NOW()
        WHERE id = $1 AND tenant_id = $5
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(name)
    .bind(schema)
    .bind(mapping_rules)
    .bind(tenant_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Template {id} not found")))?;

    info!(template_id = %row.id, has_rules = row.mapping_rules.is_some(), "template rules regenerated");
    Ok(row)
}

/// Templates of other tenants are reported as not found.
pub async fn load_template(pool: &PgPool, tenant_id: Uuid, id: Uuid) -> Result<LoadedTemplate, AppError> {
    let row = sqlx::query_as::<_, TemplateRow>("SELECT * FROM templates WHERE id = $1 AND tenant_id = $2")
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Template {id} not found")))?;
    LoadedTemplate::from_row(row)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    fn row(schema: Value, rules: Option<Value>) -> TemplateRow {
        TemplateRow {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            name: "Standard".into(),
            template_schema: schema,
            mapping_rules: rules,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_loaded_template_compiles_stored_rules() {
        let loaded = LoadedTemplate::from_row(row(
            json!({"components": [{"type": "basic_info", "fields": [{"id": "name"}]}]}),
            Some(json!({"field_mapping": {"basic_info": {"name": {"data_source": "parsed_data.basic_info.name"}}}})),
        ))
        .unwrap();
        assert_eq!(loaded.definition.components.len(), 1);
        assert!(loaded.rules.is_some());
    }

    #[test]
    fn test_unreadable_or_empty_rules_mean_heuristics() {
        let schema = json!({"components": []});
        assert!(LoadedTemplate::from_row(row(schema.clone(), Some(json!("garbage"))))
            .unwrap()
            .rules
            .is_none());
        assert!(LoadedTemplate::from_row(row(schema, Some(json!({"field_mapping": {}}))))
            .unwrap()
            .rules
            .is_none());
    }

    #[test]
    fn test_invalid_schema_is_validation_error() {
        let err = parse_definition(&json!({"components": "nope"})).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
}
