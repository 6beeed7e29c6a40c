use sqlx::PgPool;
use tracing::warn;
use uuid::Uuid;

use crate::errors::AppError;
use crate::matching::models::{JobPosition, MatchModel};
use crate::matching::orchestrator::MatchContext;
use crate::models::matching::{JobPositionRow, MatchModelRow};
use crate::screening::service::load_active_rules;

pub async fn load_job(pool: &PgPool, tenant_id: Uuid, job_id: Uuid) -> Result<JobPosition, AppError> {
    sqlx::query_as::<_, JobPositionRow>("SELECT * FROM job_positions WHERE id = $1 AND tenant_id = $2")
        .bind(job_id)
        .bind(tenant_id)
        .fetch_optional(pool)
        .await?
        .map(JobPosition::from)
        .ok_or_else(|| AppError::NotFound(format!("Job {job_id} not found")))
}

/// The requested model, or the tenant's active default. `None` means the
/// built-in weights apply.
pub async fn load_match_model(
    pool: &PgPool,
    tenant_id: Uuid,
    model_id: Option<Uuid>,
) -> Result<Option<MatchModel>, AppError> {
    let row = match model_id {
        Some(id) => Some(
            sqlx::query_as::<_, MatchModelRow>(
                "SELECT * FROM match_models WHERE id = $1 AND tenant_id = $2",
            )
            .bind(id)
            .bind(tenant_id)
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Match model {id} not found")))?,
        ),
        None => {
            sqlx::query_as::<_, MatchModelRow>(
                r#"
                SELECT * FROM match_models
                WHERE tenant_id = $1 AND is_default AND is_active
                LIMIT 1
                "#,
            )
            .bind(tenant_id)
            .fetch_optional(pool)
            .await?
        }
    };

    if let Some(row) = row.as_ref().filter(|r| !r.is_active) {
        warn!(model_id = %row.id, "requested match model is inactive; using it anyway");
    }
    Ok(row.as_ref().map(MatchModel::from))
}

/// Job, model and filter rules for one matching run.
pub async fn load_context(
    pool: &PgPool,
    tenant_id: Uuid,
    job_id: Uuid,
    model_id: Option<Uuid>,
) -> Result<MatchContext, AppError> {
    let job = load_job(pool, tenant_id, job_id).await?;
    let model = load_match_model(pool, tenant_id, model_id).await?;
    let rules = load_active_rules(pool, tenant_id).await?;
    Ok(MatchContext {
        tenant_id,
        job,
        model,
        rules,
    })
}
