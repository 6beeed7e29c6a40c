//! Persistence of match results, one row per (resume, job).

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::errors::AppError;
use crate::matching::models::{MatchRecord, MatchResult};
use crate::models::matching::MatchResultRow;

#[async_trait]
pub trait MatchStore: Send + Sync {
    /// Inserts the record, or overwrites the existing row for the same pair.
    async fn upsert(&self, record: &MatchRecord) -> Result<MatchResult, AppError>;
}

pub struct PgMatchStore {
    pool: PgPool,
}

impl PgMatchStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MatchStore for PgMatchStore {
    async fn upsert(&self, record: &MatchRecord) -> Result<MatchResult, AppError> {
        let breakdown = serde_json::to_value(&record.breakdown).map_err(anyhow::Error::from)?;
        let analysis = serde_json::to_value(&record.analysis).map_err(anyhow::Error::from)?;
        let filter = serde_json::to_value(&record.filter).map_err(anyhow::Error::from)?;

        let row = sqlx::query_as::<_, MatchResultRow>(
            r#"
            INSERT INTO resume_job_matches
                (id, tenant_id, resume_id, job_id, match_score, label,
                 breakdown, llm_analysis, filter_result, is_partial)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (resume_id, job_id) DO UPDATE SET
                match_score   = EXCLUDED.match_score,
                label         = EXCLUDED.label,
                breakdown     = EXCLUDED.breakdown,
                llm_analysis  = EXCLUDED.llm_analysis,
                filter_result = EXCLUDED.filter_result,
                is_partial    = EXCLUDED.is_partial,
                status        = 'pending',
                updated_at    = NOW()
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(record.tenant_id)
        .bind(record.resume_id)
        .bind(record.job_id)
        .bind(record.score)
        .bind(record.label.as_str())
        .bind(breakdown)
        .bind(analysis)
        .bind(filter)
        .bind(record.partial)
        .fetch_one(&self.pool)
        .await?;

        MatchResult::try_from(row).map_err(|e| AppError::Internal(e.into()))
    }
}

#[cfg(test)]
pub mod memory {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::*;

    /// Keyed the same way as the table's unique constraint.
    #[derive(Default)]
    pub struct InMemoryMatchStore {
        pub rows: Mutex<HashMap<(Uuid, Uuid), MatchResult>>,
    }

    impl InMemoryMatchStore {
        pub fn len(&self) -> usize {
            self.rows.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl MatchStore for InMemoryMatchStore {
        async fn upsert(&self, record: &MatchRecord) -> Result<MatchResult, AppError> {
            let mut rows = self.rows.lock().unwrap();
            let key = (record.resume_id, record.job_id);
            let id = rows.get(&key).map(|r| r.id).unwrap_or_else(Uuid::new_v4);
            let result = MatchResult {
                id,
                record: record.clone(),
                status: "pending".to_string(),
            };
            rows.insert(key, result.clone());
            Ok(result)
        }
    }
}
