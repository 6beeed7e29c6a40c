use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::errors::AppError;
use crate::extraction::models::CanonicalResume;
use crate::extraction::recovery::{recover, PartialParse};
use crate::extraction::service::{load_resume, parse_resume_text, store_resume};
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request / response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct RecoverRequest {
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct RecoverResponse {
    pub value: Value,
    pub partial: Option<PartialParse>,
}

#[derive(Debug, Deserialize)]
pub struct ParseResumeRequest {
    pub tenant_id: Uuid,
    pub raw_text: String,
}

#[derive(Debug, Deserialize)]
pub struct TenantQuery {
    pub tenant_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct ResumeResponse {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub cached: bool,
    pub resume: CanonicalResume,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/extraction/recover
pub async fn handle_recover(Json(req): Json<RecoverRequest>) -> Result<Json<RecoverResponse>, AppError> {
    let recovered = recover(&req.text)?;
    Ok(Json(RecoverResponse {
        value: recovered.value,
        partial: recovered.partial,
    }))
}

/// POST /api/v1/resumes/parse
pub async fn handle_parse_resume(
    State(state): State<AppState>,
    Json(req): Json<ParseResumeRequest>,
) -> Result<(StatusCode, Json<ResumeResponse>), AppError> {
    let parsed = parse_resume_text(state.llm.as_ref(), &state.parse_cache, &req.raw_text).await?;
    let row = store_resume(&state.db, req.tenant_id, &parsed).await?;
    Ok((
        StatusCode::CREATED,
        Json(ResumeResponse {
            id: row.id,
            tenant_id: row.tenant_id,
            cached: parsed.cached,
            resume: parsed.resume,
        }),
    ))
}

/// GET /api/v1/resumes/:id?tenant_id=
pub async fn handle_get_resume(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<TenantQuery>,
) -> Result<Json<ResumeResponse>, AppError> {
    let row = load_resume(&state.db, query.tenant_id, id).await?;
    Ok(Json(ResumeResponse {
        id: row.id,
        tenant_id: row.tenant_id,
        cached: false,
        resume: row.canonical(),
    }))
}
