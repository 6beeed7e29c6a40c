//! Qualitative candidate/job analysis by the model.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::extraction::models::CanonicalResume;
use crate::llm_client::prompts::{render, NO_INVENTION_INSTRUCTION};
use crate::llm_client::{call_json, CallOptions, LlmError, TextGenerator};
use crate::matching::models::{JobPosition, LlmAnalysis};
use crate::matching::prompts::{MATCH_ANALYSIS_PROMPT_TEMPLATE, MATCH_ANALYSIS_SYSTEM};

#[async_trait]
pub trait QualitativeAnalyst: Send + Sync {
    async fn analyze(&self, resume: &CanonicalResume, job: &JobPosition) -> Result<LlmAnalysis, LlmError>;
}

pub struct LlmAnalyst {
    llm: Arc<dyn TextGenerator>,
}

impl LlmAnalyst {
    pub fn new(llm: Arc<dyn TextGenerator>) -> Self {
        Self { llm }
    }
}

pub fn job_summary(job: &JobPosition) -> String {
    let mut out = format!("Title: {}", job.title);
    if let Some(description) = job.description.as_deref().filter(|d| !d.trim().is_empty()) {
        out.push_str(&format!("\nDescription: {description}"));
    }
    if let Some(requirements) = job.requirements.as_deref().filter(|r| !r.trim().is_empty()) {
        out.push_str(&format!("\nRequirements: {requirements}"));
    }
    out
}

#[async_trait]
impl QualitativeAnalyst for LlmAnalyst {
    async fn analyze(&self, resume: &CanonicalResume, job: &JobPosition) -> Result<LlmAnalysis, LlmError> {
        let resume_json = serde_json::to_string_pretty(resume).unwrap_or_default();
        let job_text = job_summary(job);
        let prompt = render(
            MATCH_ANALYSIS_PROMPT_TEMPLATE,
            &[
                ("job", job_text.as_str()),
                ("resume", resume_json.as_str()),
                ("constraints", NO_INVENTION_INSTRUCTION),
            ],
        );

        let (analysis, partial): (LlmAnalysis, _) =
            call_json(self.llm.as_ref(), MATCH_ANALYSIS_SYSTEM, &prompt, CallOptions::default()).await?;
        if let Some(p) = partial {
            warn!(job_id = %job.id, retained = p.retained_ratio, "match analysis was truncated; using salvaged fields");
        }
        Ok(LlmAnalysis {
            failed: false,
            ..analysis
        })
    }
}

/// Runs the analyst under `timeout`. Errors and timeouts become a failed
/// analysis so the match can still be scored.
pub async fn analyze_or_degrade(
    analyst: &dyn QualitativeAnalyst,
    resume: &CanonicalResume,
    job: &JobPosition,
    timeout: Duration,
) -> LlmAnalysis {
    match tokio::time::timeout(timeout, analyst.analyze(resume, job)).await {
        Ok(Ok(analysis)) => {
            info!(job_id = %job.id, score = analysis.score, "match analysis complete");
            analysis
        }
        Ok(Err(e)) => {
            warn!(job_id = %job.id, error = %e, "match analysis failed; scoring without it");
            LlmAnalysis::failed(e.to_string())
        }
        Err(_) => {
            warn!(job_id = %job.id, ?timeout, "match analysis timed out; scoring without it");
            LlmAnalysis::failed(format!("timed out after {}s", timeout.as_secs()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::testing::{Reply, ScriptedGenerator};
    use crate::matching::models::ANALYSIS_FAILED;
    use uuid::Uuid;

    fn job() -> JobPosition {
        JobPosition {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            title: "Rust Engineer".into(),
            description: Some("Build the matching service".into()),
            requirements: None,
        }
    }

    #[tokio::test]
    async fn test_analysis_reads_model_json() {
        let generator = Arc::new(ScriptedGenerator::text(
            r#"{"score": 8, "strengths": ["Rust"], "organization_match": {"score": 7, "analysis": "ok"}, "recommendation": "recommended"}"#,
        ));
        let analyst = LlmAnalyst::new(generator.clone());
        let analysis = analyze_or_degrade(&analyst, &CanonicalResume::default(), &job(), Duration::from_secs(5)).await;
        assert_eq!(analysis.score, 8.0);
        assert_eq!(analysis.strengths, vec!["Rust".to_string()]);
        assert!(!analysis.failed);

        let prompt = generator.prompts.lock().unwrap()[0].clone();
        assert!(prompt.contains("Title: Rust Engineer"));
        assert!(prompt.contains("Never invent"));
        assert!(!prompt.contains("{resume}"));
    }

    #[tokio::test]
    async fn test_llm_failure_degrades() {
        let analyst = LlmAnalyst::new(Arc::new(ScriptedGenerator::new(vec![Reply::Fail])));
        let analysis = analyze_or_degrade(&analyst, &CanonicalResume::default(), &job(), Duration::from_secs(5)).await;
        assert!(analysis.failed);
        assert_eq!(analysis.score, 0.0);
        assert_eq!(analysis.recommendation, ANALYSIS_FAILED);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_degrades() {
        let analyst = LlmAnalyst::new(Arc::new(ScriptedGenerator::new(vec![Reply::Hang])));
        let analysis = analyze_or_degrade(&analyst, &CanonicalResume::default(), &job(), Duration::from_secs(30)).await;
        assert!(analysis.failed);
        assert!(analysis.detailed_analysis.contains("timed out"));
    }

    #[test]
    fn test_job_summary_skips_blank_sections() {
        let mut j = job();
        j.description = Some("  ".into());
        j.requirements = Some("5 years".into());
        assert_eq!(job_summary(&j), "Title: Rust Engineer\nRequirements: 5 years");
    }
}
