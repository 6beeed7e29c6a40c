use serde_json::Value;
use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::extraction::cache::ParseCache;
use crate::extraction::models::CanonicalResume;
use crate::extraction::normalize::normalize_resume;
use crate::extraction::preprocess::preprocess_text;
use crate::extraction::prompts::{RESUME_PARSE_PROMPT_TEMPLATE, RESUME_PARSE_SYSTEM};
use crate::llm_client::prompts::render;
use crate::llm_client::{call_json, CallOptions, TextGenerator};
use crate::models::resume::ResumeRow;

const PARSE_MAX_TOKENS: u32 = 8000;

#[derive(Debug)]
pub struct ParsedResume {
    pub resume: CanonicalResume,
    pub content_hash: String,
    pub cached: bool,
}

/// Raw resume text → canonical resume. A salvaged (truncated) model answer
/// is accepted and flagged; an unrecoverable one is a `ParseError`.
pub async fn parse_resume_text(
    llm: &dyn TextGenerator,
    cache: &ParseCache,
    raw_text: &str,
) -> Result<ParsedResume, AppError> {
    let text = preprocess_text(raw_text);
    if text.is_empty() {
        return Err(AppError::Validation("raw_text is empty".to_string()));
    }
    let content_hash = ParseCache::key_for(&text);

    if let Some(resume) = cache.get(&text).await {
        return Ok(ParsedResume {
            resume,
            content_hash,
            cached: true,
        });
    }

    let prompt = render(RESUME_PARSE_PROMPT_TEMPLATE, &[("raw_text", text.as_str())]);
    let options = CallOptions {
        temperature: 0.1,
        max_tokens: PARSE_MAX_TOKENS,
    };
    let (value, partial): (Value, _) = call_json(llm, RESUME_PARSE_SYSTEM, &prompt, options).await?;

    if let Some(p) = &partial {
        warn!(
            retained_ratio = p.retained_ratio,
            "resume parse was salvaged from a truncated model answer"
        );
    }
    let resume = normalize_resume(&value, partial);
    info!(
        work_experiences = resume.work_experiences.len(),
        education = resume.education.len(),
        projects = resume.projects.len(),
        warnings = resume.warnings.len(),
        "resume parsed"
    );
    cache.put(&text, &resume).await;

    Ok(ParsedResume {
        resume,
        content_hash,
        cached: false,
    })
}

pub async fn store_resume(
    pool: &PgPool,
    tenant_id: Uuid,
    parsed: &ParsedResume,
) -> Result<ResumeRow, AppError> {
    let parsed_data = serde_json::to_value(&parsed.resume).map_err(anyhow::Error::from)?;
    let row = sqlx::query_as::<_, ResumeRow>(
        r#"
        INSERT INTO resumes (id, tenant_id, content_hash, parsed_data, is_partial)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(tenant_id)
    .bind(&parsed.content_hash)
    .bind(parsed_data)
    .bind(parsed.resume.partial.is_some())
    .fetch_one(pool)
    .await?;
    Ok(row)
}

/// Resumes of other tenants are reported as not found.
pub async fn load_resume(pool: &PgPool, tenant_id: Uuid, id: Uuid) -> Result<ResumeRow, AppError> {
    sqlx::query_as::<_, ResumeRow>("SELECT * FROM resumes WHERE id = $1 AND tenant_id = $2")
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Resume {id} not found")))
}

pub async fn load_tenant_resume(pool: &PgPool, tenant_id: Uuid, id: Uuid) -> Result<CanonicalResume, AppError> {
    Ok(load_resume(pool, tenant_id, id).await?.canonical())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::testing::{Reply, ScriptedGenerator};

    #[tokio::test]
    async fn test_parse_normalizes_model_output() {
        let reply = r#"```json
        {"basic_info": {"姓名": "李雷", "mobile": "13800138000"},
         "work_experiences": [
            {"company": "Old Co", "start_date": "2017.01", "end_date": "2018.12"},
            {"company": "New Co", "start_date": "2019年4月", "end_date": "至今"},
         ]}
        ```"#;
        let llm = ScriptedGenerator::text(reply);
        let parsed = parse_resume_text(&llm, &ParseCache::disabled(), "Li Lei resume text")
            .await
            .unwrap();
        assert!(!parsed.cached);
        assert!(parsed.resume.partial.is_none());
        assert_eq!(parsed.resume.basic("name"), Some("李雷"));
        assert_eq!(parsed.resume.work_experiences[0].company, "New Co");
        assert!(llm.prompts.lock().unwrap()[0].contains("Li Lei resume text"));
    }

    #[tokio::test]
    async fn test_truncated_answer_is_flagged_partial() {
        let reply = r#"{"basic_info": {"name": "Li Lei", "email": "li@example.com"}, "skills": {"soft": ["communica"#;
        let llm = ScriptedGenerator::text(reply);
        let parsed = parse_resume_text(&llm, &ParseCache::disabled(), "text")
            .await
            .unwrap();
        assert!(parsed.resume.partial.is_some());
        assert_eq!(parsed.resume.basic("name"), Some("Li Lei"));
    }

    #[tokio::test]
    async fn test_unrecoverable_answer_is_parse_error() {
        let llm = ScriptedGenerator::text("sorry, I can't help with that");
        let err = parse_resume_text(&llm, &ParseCache::disabled(), "text")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Parse(_)));
    }

    #[tokio::test]
    async fn test_transport_failure_is_llm_error() {
        let llm = ScriptedGenerator::new(vec![Reply::Fail]);
        let err = parse_resume_text(&llm, &ParseCache::disabled(), "text")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Llm(_)));
    }

    #[tokio::test]
    async fn test_blank_text_is_rejected_without_calling_model() {
        let llm = ScriptedGenerator::text("{}");
        let err = parse_resume_text(&llm, &ParseCache::disabled(), " \n \n")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(llm.calls(), 0);
    }
}
