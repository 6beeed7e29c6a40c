use std::sync::Arc;

use sqlx::PgPool;

use crate::config::Config;
use crate::extraction::cache::ParseCache;
use crate::llm_client::TextGenerator;
use crate::matching::orchestrator::MatchPipeline;
use crate::settings::cache::SettingsCache;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    /// Chat completions. `LlmClient` in production.
    pub llm: Arc<dyn TextGenerator>,
    /// Redis-backed; a no-op when `REDIS_URL` is unset.
    pub parse_cache: ParseCache,
    pub settings: SettingsCache,
    pub pipeline: Arc<MatchPipeline>,
    pub config: Config,
}
