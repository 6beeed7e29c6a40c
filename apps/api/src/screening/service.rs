use sqlx::PgPool;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::screening::FilterRuleRow;
use crate::screening::models::FilterRule;

/// Active rules for a tenant, highest priority first.
pub async fn load_active_rules(pool: &PgPool, tenant_id: Uuid) -> Result<Vec<FilterRule>, AppError> {
    let rows = sqlx::query_as::<_, FilterRuleRow>(
        r#"
        SELECT * FROM filter_rules
        WHERE tenant_id = $1 AND is_active
        ORDER BY priority DESC, created_at ASC
        "#,
    )
    .bind(tenant_id)
    .fetch_all(pool)
    .await?;
    Ok(rows.iter().map(FilterRule::from).collect())
}
