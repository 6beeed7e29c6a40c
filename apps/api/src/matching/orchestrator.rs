//! One resume against one job: similarity, filter, analysis, fusion, upsert.
//!
//! Stages run strictly in that order. Only the store write can fail the
//! match; every other stage degrades into the breakdown.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::extraction::models::CanonicalResume;
use crate::matching::analysis::{analyze_or_degrade, QualitativeAnalyst};
use crate::matching::fusion::{extract_org_score, fuse, Signals};
use crate::matching::models::{JobPosition, MatchModel, MatchRecord, MatchResult};
use crate::matching::similarity::SimilaritySource;
use crate::matching::store::MatchStore;
use crate::screening::engine::evaluate;
use crate::screening::models::{Evaluation, FilterRule};

/// Everything shared by all resumes matched against one job.
#[derive(Debug, Clone)]
pub struct MatchContext {
    pub tenant_id: Uuid,
    pub job: JobPosition,
    pub model: Option<MatchModel>,
    pub rules: Vec<FilterRule>,
}

pub struct MatchPipeline {
    pub analyst: Arc<dyn QualitativeAnalyst>,
    pub similarity: Arc<dyn SimilaritySource>,
    pub store: Arc<dyn MatchStore>,
    /// Hard limit on the qualitative analysis call.
    pub timeout: Duration,
}

impl MatchPipeline {
    /// `filter` is reused when the caller already screened the resume.
    pub async fn run(
        &self,
        ctx: &MatchContext,
        resume_id: Uuid,
        resume: &CanonicalResume,
        filter: Option<Evaluation>,
    ) -> Result<MatchResult, AppError> {
        let vector_similarity = self.similarity.similarity(resume, &ctx.job).await;
        let filter = filter.unwrap_or_else(|| evaluate(&ctx.rules, resume));
        let analysis = analyze_or_degrade(self.analyst.as_ref(), resume, &ctx.job, self.timeout).await;
        let org_score = extract_org_score(&analysis);

        let breakdown = fuse(
            Signals {
                vector_similarity,
                filter: Some(&filter),
                analysis: &analysis,
                org_score,
            },
            Some(&ctx.job),
            ctx.model.as_ref(),
        );

        let record = MatchRecord {
            tenant_id: ctx.tenant_id,
            resume_id,
            job_id: ctx.job.id,
            score: breakdown.final_score,
            label: breakdown.label,
            partial: resume.partial.is_some() || !breakdown.degraded.is_empty(),
            breakdown,
            analysis,
            filter,
        };
        let result = self.store.upsert(&record).await?;
        info!(
            %resume_id,
            job_id = %ctx.job.id,
            score = result.record.score,
            label = result.record.label.as_str(),
            "match stored"
        );
        Ok(result)
    }
}
