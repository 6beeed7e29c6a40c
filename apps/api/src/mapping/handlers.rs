use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use crate::errors::AppError;
use crate::extraction::service::load_tenant_resume;
use crate::mapping::engine::fill;
use crate::mapping::external_fill::LlmFieldFiller;
use crate::mapping::models::FilledTemplate;
use crate::mapping::service::{create_template, load_template, update_template};
use crate::models::template::TemplateRow;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateTemplateRequest {
    pub tenant_id: Uuid,
    pub name: String,
    pub template_schema: Value,
}

#[derive(Debug, Deserialize)]
pub struct UpdateTemplateRequest {
    pub tenant_id: Uuid,
    pub name: Option<String>,
    pub template_schema: Value,
}

#[derive(Debug, Deserialize)]
pub struct FillRequest {
    pub tenant_id: Uuid,
    pub resume_id: Uuid,
}

/// POST /api/v1/templates
pub async fn handle_create_template(
    State(state): State<AppState>,
    Json(req): Json<CreateTemplateRequest>,
) -> Result<(StatusCode, Json<TemplateRow>), AppError> {
    if req.name.trim().is_empty() {
        return Err(AppError::Validation("name must not be empty".to_string()));
    }
    let row = create_template(
        &state.db,
        state.llm.as_ref(),
        req.tenant_id,
        req.name.trim(),
        req.template_schema,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(row)))
}

/// PUT /api/v1/templates/:id
pub async fn handle_update_template(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateTemplateRequest>,
) -> Result<Json<TemplateRow>, AppError> {
    let row = update_template(
        &state.db,
        state.llm.as_ref(),
        req.tenant_id,
        id,
        req.name.as_deref().map(str::trim).filter(|n| !n.is_empty()),
        req.template_schema,
    )
    .await?;
    Ok(Json(row))
}

/// POST /api/v1/templates/:id/fill
pub async fn handle_fill_template(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<FillRequest>,
) -> Result<Json<FilledTemplate>, AppError> {
    let template = load_template(&state.db, req.tenant_id, id).await?;
    let resume = load_tenant_resume(&state.db, req.tenant_id, req.resume_id).await?;
    let filler = LlmFieldFiller::new(Arc::clone(&state.llm));

    let filled = fill(
        &template.definition,
        &resume,
        template.rules.as_ref(),
        &filler,
        &state.config.fill_options(),
    )
    .await;
    Ok(Json(filled))
}
