use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

use crate::extraction::models::CanonicalResume;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ResumeRow {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub content_hash: String,
    /// Serialized [`CanonicalResume`], including its `partial` marker.
    pub parsed_data: Value,
    pub is_partial: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ResumeRow {
    /// Stored rows were written by this service, so a decode failure means
    /// the row was edited out of band. Falls back to an empty resume.
    pub fn canonical(&self) -> CanonicalResume {
        serde_json::from_value(self.parsed_data.clone()).unwrap_or_else(|e| {
            tracing::warn!(resume_id = %self.id, error = %e, "stored resume does not decode");
            CanonicalResume::default()
        })
    }
}
