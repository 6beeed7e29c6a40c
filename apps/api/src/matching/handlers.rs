use std::sync::Arc;

use axum::{extract::State, Json};
use serde::Deserialize;
use uuid::Uuid;

use crate::errors::AppError;
use crate::extraction::service::load_tenant_resume;
use crate::matching::batch::{run_batch, BatchResponse};
use crate::matching::models::MatchResult;
use crate::matching::service::load_context;
use crate::state::AppState;

/// Upper bound on `resume_ids` per batch request.
const MAX_BATCH_SIZE: usize = 200;

#[derive(Debug, Deserialize)]
pub struct MatchRequest {
    pub tenant_id: Uuid,
    pub resume_id: Uuid,
    pub job_id: Uuid,
    pub match_model_id: Option<Uuid>,
}

fn default_auto_filter() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct BatchMatchRequest {
    pub tenant_id: Uuid,
    pub job_id: Uuid,
    pub resume_ids: Vec<Uuid>,
    #[serde(default = "default_auto_filter")]
    pub auto_filter: bool,
    pub match_model_id: Option<Uuid>,
}

/// POST /api/v1/match
pub async fn handle_match(
    State(state): State<AppState>,
    Json(req): Json<MatchRequest>,
) -> Result<Json<MatchResult>, AppError> {
    let ctx = load_context(&state.db, req.tenant_id, req.job_id, req.match_model_id).await?;
    let resume = load_tenant_resume(&state.db, req.tenant_id, req.resume_id).await?;
    let result = state.pipeline.run(&ctx, req.resume_id, &resume, None).await?;
    Ok(Json(result))
}

/// POST /api/v1/match/batch
pub async fn handle_match_batch(
    State(state): State<AppState>,
    Json(req): Json<BatchMatchRequest>,
) -> Result<Json<BatchResponse>, AppError> {
    if req.resume_ids.is_empty() {
        return Err(AppError::Validation("resume_ids must not be empty".to_string()));
    }
    if req.resume_ids.len() > MAX_BATCH_SIZE {
        return Err(AppError::Validation(format!(
            "at most {MAX_BATCH_SIZE} resumes per batch, got {}",
            req.resume_ids.len()
        )));
    }

    let ctx = load_context(&state.db, req.tenant_id, req.job_id, req.match_model_id).await?;
    let pool = state.db.clone();
    let tenant_id = req.tenant_id;
    let response = run_batch(
        Arc::clone(&state.pipeline),
        Arc::new(ctx),
        &req.resume_ids,
        req.auto_filter,
        state.config.match_concurrency,
        move |id| {
            let pool = pool.clone();
            async move { load_tenant_resume(&pool, tenant_id, id).await }
        },
    )
    .await;
    Ok(Json(response))
}
