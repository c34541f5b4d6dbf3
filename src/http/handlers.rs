use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use super::state::AppState;
use crate::error::SessionError;
use crate::pipeline::PipelineReport;
use crate::session::StartedSession;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct StartSessionRequest {
    pub room: String,
}

#[derive(Debug, Serialize)]
pub struct StartSessionResponse {
    #[serde(flatten)]
    pub session: StartedSession,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct StopSessionResponse {
    pub room: String,
    /// None when the session stopped before anything was captured
    pub report: Option<PipelineReport>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_status(err: &SessionError) -> StatusCode {
    match err {
        SessionError::AlreadyActive(_) => StatusCode::CONFLICT,
        SessionError::NotActive(_) => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /sessions/start
/// Start recording in a room
pub async fn start_session(
    State(state): State<AppState>,
    Json(req): Json<StartSessionRequest>,
) -> impl IntoResponse {
    info!("start requested for room: {}", req.room);

    match state.registry.start(&req.room).await {
        Ok(session) => {
            let message = format!(
                "Recording started (session {}); stop to generate the recap",
                session.session_id
            );
            (
                StatusCode::OK,
                Json(StartSessionResponse { session, message }),
            )
                .into_response()
        }
        Err(e) => {
            error!("failed to start session for {}: {}", req.room, e);
            (
                error_status(&e),
                Json(ErrorResponse {
                    error: e.to_string(),
                }),
            )
                .into_response()
        }
    }
}

/// POST /sessions/stop/:room
/// Stop recording and run the post-processing pipeline
pub async fn stop_session(
    State(state): State<AppState>,
    Path(room): Path<String>,
) -> impl IntoResponse {
    info!("stop requested for room: {}", room);

    match state.registry.stop(&room).await {
        Ok(report) => (
            StatusCode::OK,
            Json(StopSessionResponse { room, report }),
        )
            .into_response(),
        Err(e) => {
            error!("failed to stop session for {}: {}", room, e);
            (
                error_status(&e),
                Json(ErrorResponse {
                    error: e.to_string(),
                }),
            )
                .into_response()
        }
    }
}

/// GET /sessions/:room/status
/// Status of the room's session
pub async fn session_status(
    State(state): State<AppState>,
    Path(room): Path<String>,
) -> impl IntoResponse {
    match state.registry.get(&room).await {
        Some(status) => (StatusCode::OK, Json(status)).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: format!("no active session for room {room}"),
            }),
        )
            .into_response(),
    }
}

/// POST /sessions/clear/:room
/// Forcibly drop a session believed stuck
pub async fn force_clear(
    State(state): State<AppState>,
    Path(room): Path<String>,
) -> impl IntoResponse {
    if state.registry.force_clear(&room).await {
        (StatusCode::OK, Json(serde_json::json!({ "cleared": room }))).into_response()
    } else {
        (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: format!("no active session for room {room}"),
            }),
        )
            .into_response()
    }
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
