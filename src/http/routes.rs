use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use super::handlers;
use super::state::AppState;

/// Create the HTTP router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/start_session", post(handlers::start_session))
        .route("/audio_chunk", post(handlers::audio_chunk))
        .route("/stop_session", post(handlers::stop_session))
        .route("/sessions", get(handlers::list_sessions))
        .route("/sessions/:session_id/stats", get(handlers::session_stats))
        .route("/metrics", get(handlers::metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
