use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct JobPositionRow {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub requirements: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MatchModelRow {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    /// `{"weights": {...}, "thresholds": {...}}`
    pub config: Value,
    pub is_default: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MatchResultRow {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub resume_id: Uuid,
    pub job_id: Uuid,
    pub match_score: f64,
    pub label: String,
    pub breakdown: Value,
    pub llm_analysis: Value,
    pub filter_result: Value,
    pub is_partial: bool,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
