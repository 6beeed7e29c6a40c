//! Tier C: fill fields that rules and heuristics left empty by asking the model.
//!
//! Each task carries only the field and its immediate data (one row or one
//! sub-object). Tasks run concurrently under a semaphore, each with its own
//! timeout. A failed or timed-out task leaves the field blank. Values come
//! back as generated; the engine applies the shared display post-processing.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::extraction::models::CanonicalResume;
use crate::extraction::recovery::ParseError;
use crate::llm_client::prompts::render;
use crate::llm_client::{call_json, CallOptions, LlmError, TextGenerator};
use crate::mapping::models::{FieldRule, FieldShape, FieldSpec, TemplateDefinition};
use crate::mapping::prompts::{
    FIELD_FILL_PROMPT_TEMPLATE, FIELD_FILL_SYSTEM, TEMPLATE_FILL_PROMPT_TEMPLATE, TEMPLATE_FILL_SYSTEM,
};
use crate::mapping::text::is_blank;

#[derive(Debug, Error)]
pub enum FillError {
    #[error("external fill timed out after {0:?}")]
    Timeout(Duration),

    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("response did not contain field '{0}'")]
    MissingField(String),
}

/// One field queued for external fill.
#[derive(Debug, Clone, Serialize)]
pub struct FillTask {
    pub section_type: String,
    pub section_index: usize,
    pub field_id: String,
    pub row_index: Option<usize>,
    pub field: FieldSpec,
    pub rule: Option<FieldRule>,
    /// The row or sub-object the value should come from.
    pub context: Value,
}

#[derive(Debug)]
pub struct FillOutcome {
    pub task: FillTask,
    pub value: Option<Value>,
}

#[async_trait]
pub trait FieldFiller: Send + Sync {
    /// Returns the value for `task.field_id`.
    async fn fill_field(&self, task: &FillTask) -> Result<Value, FillError>;

    /// Lays out a template that declares no sections.
    async fn fill_template(
        &self,
        template: &TemplateDefinition,
        resume: &CanonicalResume,
    ) -> Result<TemplateDefinition, FillError>;
}

// ────────────────────────────────────────────────────────────────────────────
// LlmFieldFiller
// ────────────────────────────────────────────────────────────────────────────

pub struct LlmFieldFiller {
    llm: Arc<dyn TextGenerator>,
}

impl LlmFieldFiller {
    pub fn new(llm: Arc<dyn TextGenerator>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl FieldFiller for LlmFieldFiller {
    async fn fill_field(&self, task: &FillTask) -> Result<Value, FillError> {
        let shape = match task.field.shape() {
            FieldShape::Text => "text",
            FieldShape::Textarea => "textarea",
            FieldShape::List => "list",
        };
        let context = serde_json::to_string_pretty(&task.context).unwrap_or_default();
        let prompt = render(
            FIELD_FILL_PROMPT_TEMPLATE,
            &[
                ("field_id", task.field_id.as_str()),
                ("field_label", task.field.label.as_deref().unwrap_or(&task.field_id)),
                ("field_description", task.field.description.as_deref().unwrap_or("")),
                ("field_shape", shape),
                ("context", context.as_str()),
            ],
        );

        let (value, _partial): (Value, _) =
            call_json(self.llm.as_ref(), FIELD_FILL_SYSTEM, &prompt, CallOptions::precise(1000)).await?;

        value
            .get(&task.field_id)
            .cloned()
            .ok_or_else(|| FillError::MissingField(task.field_id.clone()))
    }

    async fn fill_template(
        &self,
        template: &TemplateDefinition,
        resume: &CanonicalResume,
    ) -> Result<TemplateDefinition, FillError> {
        let template_json = serde_json::to_string_pretty(template).unwrap_or_default();
        let resume_json = serde_json::to_string_pretty(resume).unwrap_or_default();
        let prompt = render(
            TEMPLATE_FILL_PROMPT_TEMPLATE,
            &[("template", template_json.as_str()), ("resume", resume_json.as_str())],
        );
        let (filled, _partial) =
            call_json(self.llm.as_ref(), TEMPLATE_FILL_SYSTEM, &prompt, CallOptions::default()).await?;
        Ok(filled)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Task runner
// ────────────────────────────────────────────────────────────────────────────

/// Runs every task with at most `concurrency` in flight. Output order matches input.
pub async fn run_tasks(
    filler: &dyn FieldFiller,
    tasks: Vec<FillTask>,
    concurrency: usize,
    timeout: Duration,
) -> Vec<FillOutcome> {
    if tasks.is_empty() {
        return Vec::new();
    }
    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));

    let futures = tasks.into_iter().map(|task| {
        let semaphore = Arc::clone(&semaphore);
        async move {
            let value = match semaphore.acquire().await {
                Ok(_permit) => fill_one(filler, &task, timeout).await,
                Err(_) => None,
            };
            FillOutcome { task, value }
        }
    });

    join_all(futures).await
}

async fn fill_one(filler: &dyn FieldFiller, task: &FillTask, timeout: Duration) -> Option<Value> {
    let result = match tokio::time::timeout(timeout, filler.fill_field(task)).await {
        Ok(r) => r,
        Err(_) => Err(FillError::Timeout(timeout)),
    };
    match result {
        Ok(value) => {
            if is_blank(&value) {
                debug!(field = %task.field_id, "external fill returned a blank value");
                None
            } else {
                Some(value)
            }
        }
        Err(e) => {
            warn!(
                section = %task.section_type,
                field = %task.field_id,
                row = ?task.row_index,
                error = %e,
                "external fill failed; leaving field blank"
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::llm_client::testing::{Reply, ScriptedGenerator};

    fn task(field_id: &str, shape: Option<&str>) -> FillTask {
        FillTask {
            section_type: "basic_info".into(),
            section_index: 0,
            field_id: field_id.into(),
            row_index: None,
            field: FieldSpec {
                field_type: shape.map(String::from),
                ..FieldSpec::simple(field_id)
            },
            rule: None,
            context: json!({"name": "Li"}),
        }
    }

    #[tokio::test]
    async fn test_llm_filler_reads_field_through_recovery() {
        let generator = Arc::new(ScriptedGenerator::text("{'summary': 'Seasoned engineer',}"));
        let filler = LlmFieldFiller::new(generator.clone());
        let value = filler.fill_field(&task("summary", None)).await.unwrap();
        assert_eq!(value, json!("Seasoned engineer"));
        assert!(generator.prompts.lock().unwrap()[0].contains("FIELD ID: summary"));
    }

    #[tokio::test]
    async fn test_missing_field_is_error() {
        let filler = LlmFieldFiller::new(Arc::new(ScriptedGenerator::text(r#"{"other": 1}"#)));
        let err = filler.fill_field(&task("summary", None)).await.unwrap_err();
        assert!(matches!(err, FillError::MissingField(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_and_failure_leave_fields_blank() {
        let generator = Arc::new(ScriptedGenerator::new(vec![
            Reply::Text(r#"{"a": "ok"}"#.into()),
            Reply::Hang,
            Reply::Fail,
        ]));
        let filler = LlmFieldFiller::new(generator);
        // concurrency 1 keeps the scripted replies in task order
        let outcomes = run_tasks(
            &filler,
            vec![task("a", None), task("b", None), task("c", None)],
            1,
            Duration::from_secs(30),
        )
        .await;
        assert_eq!(outcomes.len(), 3);
        assert_eq!(outcomes[0].value, Some(json!("ok")));
        assert_eq!(outcomes[1].value, None);
        assert_eq!(outcomes[2].value, None);
        assert_eq!(outcomes[2].task.field_id, "c");
    }
}
