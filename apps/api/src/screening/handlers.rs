use axum::{extract::State, Json};
use serde::Deserialize;
use uuid::Uuid;

use crate::errors::AppError;
use crate::extraction::models::CanonicalResume;
use crate::extraction::service::load_tenant_resume;
use crate::screening::engine::evaluate;
use crate::screening::models::Evaluation;
use crate::screening::service::load_active_rules;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct EvaluateRequest {
    pub tenant_id: Uuid,
    pub resume_id: Option<Uuid>,
    /// Inline resume, used when `resume_id` is absent.
    pub resume: Option<CanonicalResume>,
}

/// POST /api/v1/filter/evaluate
pub async fn handle_evaluate(
    State(state): State<AppState>,
    Json(req): Json<EvaluateRequest>,
) -> Result<Json<Evaluation>, AppError> {
    let resume = match (req.resume_id, req.resume) {
        (Some(id), _) => load_tenant_resume(&state.db, req.tenant_id, id).await?,
        (None, Some(resume)) => resume,
        (None, None) => {
            return Err(AppError::Validation(
                "either resume_id or resume is required".to_string(),
            ))
        }
    };
    let rules = load_active_rules(&state.db, req.tenant_id).await?;
    Ok(Json(evaluate(&rules, &resume)))
}
