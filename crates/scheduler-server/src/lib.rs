use scheduler_core::{AttemptEngine, ProblemCatalogue, ReviewScheduler, SessionLifecycleManager, Store, TagMasteryEngine};
use std::sync::Arc;

pub mod http;
pub mod protocol;

/// Application state shared across all handlers.
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub attempt_engine: Arc<AttemptEngine>,
    pub tag_mastery: Arc<TagMasteryEngine>,
    pub review_scheduler: Arc<ReviewScheduler>,
    pub catalogue: Arc<ProblemCatalogue>,
    pub lifecycle: Arc<SessionLifecycleManager>,
}

/// Build the full router (routes + CORS) around a shared `AppState`.
pub fn build_router(state: Arc<AppState>) -> axum::Router {
    axum::Router::new()
        .merge(http::create_http_router())
        .layer(tower_http::cors::CorsLayer::permissive())
        .with_state(state)
}
