use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::AppError;
use crate::models::settings::SystemSettingRow;
use crate::settings::service::{get_setting, put_setting};
use crate::state::AppState;

const MAX_KEY_LEN: usize = 128;

#[derive(Debug, Deserialize)]
pub struct PutSettingRequest {
    pub value: Value,
}

#[derive(Debug, Serialize)]
pub struct SettingResponse {
    pub key: String,
    pub value: Value,
}

fn validate_key(key: &str) -> Result<(), AppError> {
    if key.trim().is_empty() || key.len() > MAX_KEY_LEN {
        return Err(AppError::Validation(format!(
            "setting key must be 1-{MAX_KEY_LEN} characters"
        )));
    }
    Ok(())
}

/// GET /api/v1/settings/:key
pub async fn handle_get_setting(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<SettingResponse>, AppError> {
    validate_key(&key)?;
    let value = get_setting(&state.db, &state.settings, &key).await?;
    Ok(Json(SettingResponse { key, value }))
}

/// PUT /api/v1/settings/:key
pub async fn handle_put_setting(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Json(req): Json<PutSettingRequest>,
) -> Result<Json<SystemSettingRow>, AppError> {
    validate_key(&key)?;
    if req.value.is_null() {
        return Err(AppError::UnprocessableEntity(format!(
            "setting '{key}' cannot be set to null"
        )));
    }
    let row = put_setting(&state.db, &state.settings, &key, req.value).await?;
    Ok(Json(row))
}
