//! Batch matching: many resumes against one job.
//!
//! Each item runs on its own task under a semaphore, so an error or a panic
//! fails only that item. Results keep the input order.

use std::future::Future;
use std::sync::Arc;

use futures::future::join_all;
use serde::Serialize;
use tokio::sync::Semaphore;
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::extraction::models::CanonicalResume;
use crate::matching::models::{MatchLabel, MatchResult};
use crate::matching::orchestrator::{MatchContext, MatchPipeline};
use crate::screening::engine::evaluate;

#[derive(Debug, Serialize)]
pub struct BatchItem {
    pub resume_id: Uuid,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<MatchResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A resume that pre-screening rejected and that was therefore not matched.
#[derive(Debug, Serialize)]
pub struct FilteredOut {
    pub resume_id: Uuid,
    pub reason: String,
}

#[derive(Debug, Default, Serialize, PartialEq, Eq)]
pub struct BatchSummary {
    pub strongly_recommended: usize,
    pub recommended: usize,
    pub cautious: usize,
    pub not_recommended: usize,
}

impl BatchSummary {
    fn count(&mut self, label: MatchLabel) {
        match label {
            MatchLabel::StronglyRecommended => self.strongly_recommended += 1,
            MatchLabel::Recommended => self.recommended += 1,
            MatchLabel::Cautious => self.cautious += 1,
            MatchLabel::NotRecommended => self.not_recommended += 1,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BatchResponse {
    /// Number of resumes requested.
    pub total: usize,
    pub success: usize,
    pub failed: usize,
    pub filtered_out: Vec<FilteredOut>,
    pub summary: BatchSummary,
    pub results: Vec<BatchItem>,
}

enum ItemOutcome {
    Matched(MatchResult),
    Filtered(String),
    Failed(String),
}

/// Matches every id in `resume_ids` against `ctx.job`.
///
/// With `auto_filter`, resumes that fail the tenant's rules are reported in
/// `filtered_out` instead of being matched.
pub async fn run_batch<L, Fut>(
    pipeline: Arc<MatchPipeline>,
    ctx: Arc<MatchContext>,
    resume_ids: &[Uuid],
    auto_filter: bool,
    concurrency: usize,
    load: L,
) -> BatchResponse
where
    L: Fn(Uuid) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<CanonicalResume, AppError>> + Send + 'static,
{
    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let load = Arc::new(load);

    let handles: Vec<_> = resume_ids
        .iter()
        .copied()
        .map(|resume_id| {
            let semaphore = Arc::clone(&semaphore);
            let pipeline = Arc::clone(&pipeline);
            let ctx = Arc::clone(&ctx);
            let load = Arc::clone(&load);
            tokio::spawn(async move {
                match semaphore.acquire_owned().await {
                    Ok(_permit) => match_one(&pipeline, &ctx, resume_id, auto_filter, load.as_ref()).await,
                    Err(e) => ItemOutcome::Failed(e.to_string()),
                }
            })
        })
        .collect();

    let joined = join_all(handles).await;
    let outcomes = resume_ids.iter().copied().zip(joined).map(|(resume_id, joined)| {
        let outcome = joined.unwrap_or_else(|e| {
            warn!(%resume_id, error = %e, "batch item task aborted");
            ItemOutcome::Failed(format!("match task aborted: {e}"))
        });
        (resume_id, outcome)
    });

    let mut response = BatchResponse {
        total: resume_ids.len(),
        success: 0,
        failed: 0,
        filtered_out: Vec::new(),
        summary: BatchSummary::default(),
        results: Vec::new(),
    };
    for (resume_id, outcome) in outcomes {
        match outcome {
            ItemOutcome::Matched(result) => {
                response.success += 1;
                response.summary.count(result.record.label);
                response.results.push(BatchItem {
                    resume_id,
                    success: true,
                    data: Some(result),
                    error: None,
                });
            }
            ItemOutcome::Filtered(reason) => response.filtered_out.push(FilteredOut { resume_id, reason }),
            ItemOutcome::Failed(error) => {
                response.failed += 1;
                response.results.push(BatchItem {
                    resume_id,
                    success: false,
                    data: None,
                    error: Some(error),
                });
            }
        }
    }
    info!(
        job_id = %ctx.job.id,
        total = response.total,
        success = response.success,
        failed = response.failed,
        filtered_out = response.filtered_out.len(),
        "batch match finished"
    );
    response
}

async fn match_one<L, Fut>(
    pipeline: &MatchPipeline,
    ctx: &MatchContext,
    resume_id: Uuid,
    auto_filter: bool,
    load: &L,
) -> ItemOutcome
where
    L: Fn(Uuid) -> Fut,
    Fut: Future<Output = Result<CanonicalResume, AppError>>,
{
    let resume = match load(resume_id).await {
        Ok(resume) => resume,
        Err(e) => {
            warn!(%resume_id, error = %e, "batch item could not load resume");
            return ItemOutcome::Failed(e.to_string());
        }
    };

    let filter = if auto_filter {
        let evaluation = evaluate(&ctx.rules, &resume);
        if !evaluation.passed {
            return ItemOutcome::Filtered(evaluation.summary);
        }
        Some(evaluation)
    } else {
        None
    };

    match pipeline.run(ctx, resume_id, &resume, filter).await {
        Ok(result) => ItemOutcome::Matched(result),
        Err(e) => {
            warn!(%resume_id, job_id = %ctx.job.id, error = %e, "batch item match failed");
            ItemOutcome::Failed(e.to_string())
        }
    }
}
