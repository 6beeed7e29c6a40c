mod config;
mod db;
mod errors;
mod extraction;
mod llm_client;
mod mapping;
mod matching;
mod models;
mod routes;
mod screening;
mod settings;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::db::create_pool;
use crate::extraction::cache::ParseCache;
use crate::llm_client::LlmClient;
use crate::matching::analysis::LlmAnalyst;
use crate::matching::orchestrator::MatchPipeline;
use crate::matching::similarity::{EmbeddingSimilarity, NoSimilarity, SimilaritySource};
use crate::matching::store::PgMatchStore;
use crate::routes::build_router;
use crate::settings::cache::SettingsCache;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={}",
                env!("CARGO_PKG_NAME").replace('-', "_"),
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting {} v{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL (runs migrations)
    let db = create_pool(&config.database_url).await?;

    // Parse cache is optional
    let parse_cache = ParseCache::new(config.redis_url.as_deref());
    info!(enabled = parse_cache.is_enabled(), "Parse cache initialized");

    // Initialize LLM client
    let llm = Arc::new(LlmClient::new(config.llm_settings()).context("failed to build LLM client")?);
    info!(
        model = llm.model(),
        embedding_model = llm.embedding_model().unwrap_or("none"),
        "LLM client initialized"
    );

    let similarity: Arc<dyn SimilaritySource> = if llm.embedding_model().is_some() {
        Arc::new(EmbeddingSimilarity::new(Arc::clone(&llm)))
    } else {
        Arc::new(NoSimilarity)
    };
    let pipeline = Arc::new(MatchPipeline {
        analyst: Arc::new(LlmAnalyst::new(llm.clone())),
        similarity,
        store: Arc::new(PgMatchStore::new(db.clone())),
        timeout: config.match_timeout(),
    });

    // Build app state
    let state = AppState {
        db,
        llm,
        parse_cache,
        settings: SettingsCache::new(),
        pipeline,
        config: config.clone(),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
