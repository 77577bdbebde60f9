use super::state::{AppState, StartConversationError};
use crate::error::MeteringError;
use crate::session::CountdownSnapshot;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct StartConversationRequest {
    /// Authenticated user the session is metered against
    pub user_id: String,

    /// Optional conversation ID (if not provided, generate UUID)
    pub conversation_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StartConversationResponse {
    pub user_id: String,
    pub conversation_id: String,
    pub status: String,
    pub snapshot: CountdownSnapshot,
}

#[derive(Debug, Serialize)]
pub struct StopConversationResponse {
    pub user_id: String,
    pub status: String,
    pub snapshot: CountdownSnapshot,
}

#[derive(Debug, Serialize)]
pub struct LimitCheckResponse {
    pub user_id: String,
    pub allowed: bool,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn metering_error_response(err: MeteringError) -> Response {
    let status = match &err {
        MeteringError::LimitExceeded(_) => StatusCode::TOO_MANY_REQUESTS,
        MeteringError::QuotaUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        MeteringError::SessionStartFailed(_) | MeteringError::SessionEndFailed(_) => {
            StatusCode::BAD_GATEWAY
        }
    };

    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
        .into_response()
}

fn context_not_found(user_id: &str) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            error: format!("No open conversation context for user {}", user_id),
        }),
    )
        .into_response()
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /conversations/start
/// Open (or reuse) the user's conversation context and start a session
pub async fn start_conversation(
    State(state): State<AppState>,
    Json(req): Json<StartConversationRequest>,
) -> impl IntoResponse {
    // Generate or use provided conversation ID
    let conversation_id = req
        .conversation_id
        .unwrap_or_else(|| format!("conv-{}", uuid::Uuid::new_v4()));

    info!(
        "Start requested for user {} (conversation {})",
        req.user_id, conversation_id
    );

    // Context resolution and the start itself run under the registry lock in
    // AppState; racing starts for the same user serialize there
    let context = match state
        .start_conversation(&req.user_id, &conversation_id)
        .await
    {
        Ok(context) => context,
        Err(StartConversationError::Busy {
            conversation_id: live,
        }) => {
            return (
                StatusCode::CONFLICT,
                Json(ErrorResponse {
                    error: format!(
                        "User {} already has a session in conversation {}",
                        req.user_id, live
                    ),
                }),
            )
                .into_response();
        }
        Err(StartConversationError::Metering(err)) => {
            error!("Failed to start session for user {}: {}", req.user_id, err);
            return metering_error_response(err);
        }
    };

    let snapshot = context.controller().snapshot().await;

    (
        StatusCode::OK,
        Json(StartConversationResponse {
            user_id: req.user_id,
            conversation_id,
            status: "recording".to_string(),
            snapshot,
        }),
    )
        .into_response()
}

/// POST /conversations/:user_id/stop
/// Stop the user's active session
pub async fn stop_conversation(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> impl IntoResponse {
    info!("Stop requested for user {}", user_id);

    let context = {
        let contexts = state.contexts.read().await;
        contexts.get(&user_id).cloned()
    };

    let Some(context) = context else {
        return context_not_found(&user_id);
    };

    if let Err(err) = context.controller().stop_recording().await {
        // State is already idle; the close just was not recorded remotely
        error!("Session close not recorded for user {}: {}", user_id, err);
        return metering_error_response(err);
    }

    let snapshot = context.controller().snapshot().await;

    (
        StatusCode::OK,
        Json(StopConversationResponse {
            user_id,
            status: "stopped".to_string(),
            snapshot,
        }),
    )
        .into_response()
}

/// POST /conversations/:user_id/end
/// End the conversation, stopping the session if one is active
pub async fn end_conversation(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> impl IntoResponse {
    info!("End requested for user {}", user_id);

    let context = {
        let contexts = state.contexts.read().await;
        contexts.get(&user_id).cloned()
    };

    let Some(context) = context else {
        return context_not_found(&user_id);
    };

    if let Err(err) = context.controller().end_conversation().await {
        error!("End failed for user {}: {}", user_id, err);
        return metering_error_response(err);
    }

    let snapshot = context.controller().snapshot().await;

    (
        StatusCode::OK,
        Json(StopConversationResponse {
            user_id,
            status: "ended".to_string(),
            snapshot,
        }),
    )
        .into_response()
}

/// GET /conversations/:user_id/status
/// Current countdown snapshot for the user's context
pub async fn get_status(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> impl IntoResponse {
    let contexts = state.contexts.read().await;

    match contexts.get(&user_id) {
        Some(context) => {
            let snapshot = context.controller().snapshot().await;
            (StatusCode::OK, Json(snapshot)).into_response()
        }
        None => context_not_found(&user_id),
    }
}

/// GET /conversations/:user_id/limits
/// Evaluate both usage limits without side effects
pub async fn check_limits(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> impl IntoResponse {
    let context = {
        let contexts = state.contexts.read().await;
        contexts.get(&user_id).cloned()
    };

    let Some(context) = context else {
        return context_not_found(&user_id);
    };

    match context.controller().check_usage_limit().await {
        Ok(allowed) => (
            StatusCode::OK,
            Json(LimitCheckResponse { user_id, allowed }),
        )
            .into_response(),
        Err(err) => metering_error_response(err),
    }
}

/// GET /conversations/:user_id/usage
/// The authority's accounting row for the user
pub async fn get_usage(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> impl IntoResponse {
    match state.gateway.get_usage(&user_id).await {
        Ok(usage) => (StatusCode::OK, Json(usage)).into_response(),
        Err(err) => metering_error_response(err),
    }
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
