use std::time::Duration;

use anyhow::{Context, Result};

use crate::llm_client::LlmSettings;
use crate::mapping::engine::FillOptions;

/// Application configuration loaded from environment variables.
/// Startup fails if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    /// Parse cache; absent means no caching.
    pub redis_url: Option<String>,
    pub llm_base_url: String,
    pub llm_api_key: String,
    pub llm_model: String,
    pub embedding_model: Option<String>,
    pub llm_timeout_secs: u64,
    pub fill_timeout_secs: u64,
    pub template_fill_timeout_secs: u64,
    pub match_concurrency: usize,
    pub fill_concurrency: usize,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let require = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .with_context(|| format!("Required environment variable '{key}' is not set"))
        };
        let optional = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let number = |key: &str, default: u64| -> Result<u64> {
            match optional(key) {
                Some(v) => v
                    .trim()
                    .parse::<u64>()
                    .with_context(|| format!("{key} must be a non-negative integer")),
                None => Ok(default),
            }
        };

        Ok(Config {
            database_url: require("DATABASE_URL")?,
            redis_url: optional("REDIS_URL"),
            llm_base_url: optional("LLM_BASE_URL").unwrap_or_else(|| "https://api.deepseek.com/v1".to_string()),
            llm_api_key: require("LLM_API_KEY")?,
            llm_model: optional("LLM_MODEL").unwrap_or_else(|| "deepseek-chat".to_string()),
            embedding_model: optional("EMBEDDING_MODEL"),
            llm_timeout_secs: number("LLM_TIMEOUT_SECS", 120)?,
            fill_timeout_secs: number("FILL_TIMEOUT_SECS", 30)?,
            template_fill_timeout_secs: number("TEMPLATE_FILL_TIMEOUT_SECS", 180)?,
            match_concurrency: number("MATCH_CONCURRENCY", 4)?.max(1) as usize,
            fill_concurrency: number("FILL_CONCURRENCY", 4)?.max(1) as usize,
            port: optional("PORT")
                .unwrap_or_else(|| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: optional("RUST_LOG").unwrap_or_else(|| "info".to_string()),
        })
    }

    pub fn llm_settings(&self) -> LlmSettings {
        LlmSettings {
            base_url: self.llm_base_url.clone(),
            api_key: self.llm_api_key.clone(),
            model: self.llm_model.clone(),
            embedding_model: self.embedding_model.clone(),
            timeout_secs: self.llm_timeout_secs,
        }
    }

    pub fn fill_options(&self) -> FillOptions {
        FillOptions {
            field_timeout: Duration::from_secs(self.fill_timeout_secs),
            template_timeout: Duration::from_secs(self.template_fill_timeout_secs),
            concurrency: self.fill_concurrency,
        }
    }

    /// Limit on the qualitative analysis call of one match.
    pub fn match_timeout(&self) -> Duration {
        Duration::from_secs(self.llm_timeout_secs)
    }
}
