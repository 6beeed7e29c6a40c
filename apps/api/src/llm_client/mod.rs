//! LLM Client: the single point of entry for all model calls in the service.
//!
//! ARCHITECTURAL RULE: No other module may call the completion API directly.
//! All LLM interactions MUST go through this module, and model text only becomes
//! structured data through `extraction::recovery`.
//!
//! Speaks the OpenAI-compatible `/chat/completions` and `/embeddings` protocol.

use async_trait::async_trait;
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::extraction::recovery::{self, ParseError, PartialParse};

pub mod prompts;

const MAX_RETRIES: u32 = 3;
const DEFAULT_MAX_TOKENS: u32 = 4096;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("authentication rejected by LLM provider (status {status})")]
    Auth { status: u16 },

    #[error("rate limited after {retries} retries")]
    RateLimited { retries: u32 },

    #[error("LLM request rejected (status {status}): {message}")]
    BadRequest { status: u16, message: String },

    #[error("LLM provider error (status {status}): {message}")]
    Server { status: u16, message: String },

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("LLM returned empty content")]
    EmptyContent,

    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// Sampling options for one call.
#[derive(Debug, Clone, Copy)]
pub struct CallOptions {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for CallOptions {
    fn default() -> Self {
        Self {
            temperature: 0.3,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }
}

impl CallOptions {
    pub fn precise(max_tokens: u32) -> Self {
        Self {
            temperature: 0.1,
            max_tokens,
        }
    }
}

/// Raw-text completion. Implemented by [`LlmClient`]; tests substitute scripted fakes.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn complete(&self, system: &str, prompt: &str, options: CallOptions) -> Result<String, LlmError>;
}

/// Calls the model and reads its text through the recovery parser.
pub async fn call_json<T: DeserializeOwned>(
    generator: &dyn TextGenerator,
    system: &str,
    prompt: &str,
    options: CallOptions,
) -> Result<(T, Option<PartialParse>), LlmError> {
    let text = generator.complete(system, prompt, options).await?;
    Ok(recovery::recover_as(&text)?)
}

// ────────────────────────────────────────────────────────────────────────────
// Wire types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub choices: Vec<Choice>,
    #[serde(default)]
    pub usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
pub struct Choice {
    pub message: ResponseMessage,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ResponseMessage {
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub prompt_tokens: u32,
    #[serde(default)]
    pub completion_tokens: u32,
}

impl ChatResponse {
    /// Text of the first choice, if any.
    pub fn text(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|c| c.message.content.as_deref())
            .filter(|t| !t.trim().is_empty())
    }
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct ProviderError {
    error: ProviderErrorBody,
}

#[derive(Debug, Deserialize)]
struct ProviderErrorBody {
    message: String,
}

// ────────────────────────────────────────────────────────────────────────────
// Client
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct LlmSettings {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub embedding_model: Option<String>,
    pub timeout_secs: u64,
}

/// The single LLM client used by all services.
/// Wraps the chat-completion API with retry logic.
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    settings: LlmSettings,
}

impl LlmClient {
    pub fn new(settings: LlmSettings) -> Result<Self, LlmError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(settings.timeout_secs))
            .build()?;
        Ok(Self { client, settings })
    }

    pub fn model(&self) -> &str {
        &self.settings.model
    }

    pub fn embedding_model(&self) -> Option<&str> {
        self.settings.embedding_model.as_deref()
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.settings.base_url.trim_end_matches('/'), path)
    }

    /// POSTs `body`, retrying 429 and 5xx with exponential backoff.
    async fn post_with_retry<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<reqwest::Response, LlmError> {
        let url = self.endpoint(path);
        let mut last_error: Option<LlmError> = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s
                let delay = std::time::Duration::from_millis(1000 * (1 << (attempt - 1)));
                warn!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "LLM call failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }

            let response = self
                .client
                .post(&url)
                .bearer_auth(&self.settings.api_key)
                .json(body)
                .send()
                .await;

            let response = match response {
                Ok(r) => r,
                Err(e) => {
                    last_error = Some(LlmError::Network(e));
                    continue;
                }
            };

            let status = response.status();

            if status.as_u16() == 429 {
                warn!(%status, "LLM provider rate limited the request");
                last_error = Some(LlmError::RateLimited { retries: attempt + 1 });
                continue;
            }

            if status.is_server_error() {
                let body = response.text().await.unwrap_or_default();
                warn!(%status, body = %body, "LLM provider returned server error");
                last_error = Some(LlmError::Server {
                    status: status.as_u16(),
                    message: body,
                });
                continue;
            }

            if status.as_u16() == 401 || status.as_u16() == 403 {
                return Err(LlmError::Auth {
                    status: status.as_u16(),
                });
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                let message = serde_json::from_str::<ProviderError>(&body)
                    .map(|e| e.error.message)
                    .unwrap_or(body);
                return Err(LlmError::BadRequest {
                    status: status.as_u16(),
                    message,
                });
            }

            return Ok(response);
        }

        Err(last_error.unwrap_or(LlmError::RateLimited {
            retries: MAX_RETRIES,
        }))
    }

    /// Makes a raw chat-completion call, returning the full response object.
    pub async fn call(&self, system: &str, prompt: &str, options: CallOptions) -> Result<ChatResponse, LlmError> {
        let request_body = ChatRequest {
            model: &self.settings.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature: options.temperature,
            max_tokens: options.max_tokens,
        };

        let response: ChatResponse = self
            .post_with_retry("chat/completions", &request_body)
            .await?
            .json()
            .await?;

        if let Some(usage) = &response.usage {
            debug!(
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "LLM call succeeded"
            );
        }
        if let Some(reason) = response.choices.first().and_then(|c| c.finish_reason.as_deref()) {
            if reason == "length" {
                warn!("LLM output hit the token limit; expect truncated JSON");
            }
        }

        Ok(response)
    }

    /// Embeds `text` with the configured embedding model.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        let Some(model) = self.settings.embedding_model.as_deref() else {
            return Err(LlmError::BadRequest {
                status: 0,
                message: "no embedding model configured".to_string(),
            });
        };
        let response: EmbeddingResponse = self
            .post_with_retry("embeddings", &EmbeddingRequest { model, input: text })
            .await?
            .json()
            .await?;
        response
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or(LlmError::EmptyContent)
    }
}

#[async_trait]
impl TextGenerator for LlmClient {
    async fn complete(&self, system: &str, prompt: &str, options: CallOptions) -> Result<String, LlmError> {
        let response = self.call(system, prompt, options).await?;
        response
            .text()
            .map(str::to_string)
            .ok_or(LlmError::EmptyContent)
    }
}

#[cfg(test)]
pub mod testing {
    //! Scripted [`TextGenerator`] for tests.

    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    use super::*;

    pub enum Reply {
        Text(String),
        Fail,
        Hang,
    }

    pub struct ScriptedGenerator {
        replies: Mutex<VecDeque<Reply>>,
        pub prompts: Mutex<Vec<String>>,
    }

    impl ScriptedGenerator {
        pub fn new(replies: Vec<Reply>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                prompts: Mutex::new(Vec::new()),
            }
        }

        pub fn text(reply: &str) -> Self {
            Self::new(vec![Reply::Text(reply.to_string())])
        }

        pub fn calls(&self) -> usize {
            self.prompts.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl TextGenerator for ScriptedGenerator {
        async fn complete(&self, _system: &str, prompt: &str, _options: CallOptions) -> Result<String, LlmError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            let reply = self.replies.lock().unwrap().pop_front();
            match reply {
                Some(Reply::Text(t)) => Ok(t),
                Some(Reply::Hang) => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Err(LlmError::EmptyContent)
                }
                Some(Reply::Fail) | None => Err(LlmError::Server {
                    status: 500,
                    message: "scripted failure".to_string(),
                }),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    #[test]
    fn test_chat_response_text() {
        let r: ChatResponse = serde_json::from_str(
            r#"{"choices":[{"message":{"content":"{\"a\":1}"},"finish_reason":"stop"}],"usage":{"prompt_tokens":3,"completion_tokens":4}}"#,
        )
        .unwrap();
        assert_eq!(r.text(), Some("{\"a\":1}"));

        let empty: ChatResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert!(empty.text().is_none());
    }

    #[test]
    fn test_endpoint_join() {
        let client = LlmClient::new(LlmSettings {
            base_url: "https://api.example.com/v1/".into(),
            api_key: "k".into(),
            model: "m".into(),
            embedding_model: None,
            timeout_secs: 5,
        })
        .unwrap();
        assert_eq!(client.endpoint("chat/completions"), "https://api.example.com/v1/chat/completions");
    }

    #[tokio::test]
    async fn test_call_json_goes_through_recovery() {
        let generator = ScriptedGenerator::text("```json\n{'score': 8,}\n```");
        #[derive(Deserialize)]
        struct Out {
            score: u32,
        }
        let (out, partial): (Out, _) = call_json(&generator, "sys", "prompt", CallOptions::default())
            .await
            .unwrap();
        assert_eq!(out.score, 8);
        assert!(partial.is_none());
    }

    #[tokio::test]
    async fn test_call_json_parse_error_is_typed() {
        let generator = ScriptedGenerator::text("sorry, I cannot help");
        let err = call_json::<serde_json::Value>(&generator, "sys", "prompt", CallOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::Parse(_)));
    }
}
