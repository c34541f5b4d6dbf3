use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use super::handlers;
use super::state::AppState;

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Session control
        .route("/sessions/start", post(handlers::start_session))
        .route("/sessions/stop/:room", post(handlers::stop_session))
        .route("/sessions/clear/:room", post(handlers::force_clear))
        // Session queries
        .route("/sessions/:room/status", get(handlers::session_status))
        // Request logging
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
