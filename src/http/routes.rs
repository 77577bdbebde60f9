use super::handlers;
use super::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Session commands
        .route("/conversations/start", post(handlers::start_conversation))
        .route(
            "/conversations/:user_id/stop",
            post(handlers::stop_conversation),
        )
        .route(
            "/conversations/:user_id/end",
            post(handlers::end_conversation),
        )
        // Read-only queries
        .route("/conversations/:user_id/status", get(handlers::get_status))
        .route("/conversations/:user_id/limits", get(handlers::check_limits))
        .route("/conversations/:user_id/usage", get(handlers::get_usage))
        // Add tracing middleware for request logging
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
