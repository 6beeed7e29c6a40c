pub mod health;

use axum::{
    routing::{get, post, put},
    Router,
};

use crate::extraction::handlers as extraction;
use crate::mapping::handlers as mapping;
use crate::matching::handlers as matching;
use crate::screening::handlers as screening;
use crate::settings::handlers as settings;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Extraction
        .route("/api/v1/extraction/recover", post(extraction::handle_recover))
        .route("/api/v1/resumes/parse", post(extraction::handle_parse_resume))
        .route("/api/v1/resumes/:id", get(extraction::handle_get_resume))
        // Templates
        .route("/api/v1/templates", post(mapping::handle_create_template))
        .route("/api/v1/templates/:id", put(mapping::handle_update_template))
        .route(
            "/api/v1/templates/:id/fill",
            post(mapping::handle_fill_template),
        )
        // Screening and matching
        .route("/api/v1/filter/evaluate", post(screening::handle_evaluate))
        .route("/api/v1/match", post(matching::handle_match))
        .route("/api/v1/match/batch", post(matching::handle_match_batch))
        // Settings
        .route(
            "/api/v1/settings/:key",
            get(settings::handle_get_setting).put(settings::handle_put_setting),
        )
        .with_state(state)
}
