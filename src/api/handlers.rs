//! HTTP request handlers

use super::sse::sse_stream;
use super::types::{
    CommandRequest, ErrorResponse, HealthResponse, SuccessResponse, ThreadResponse, MAX_INPUT_CHARS,
};
use super::{AppState, SESSION_HEADER};
use crate::db::DbError;
use axum::{
    extract::State,
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Input handling, streamed back as SSE
        .route("/api/command", post(send_command))
        // Thread retrieval
        .route("/api/thread", get(get_thread))
        // Session lifecycle
        .route("/api/session", delete(delete_session))
        .route("/api/health", get(health))
        .route("/version", get(get_version))
        .with_state(state)
}

fn session_header(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|id| !id.is_empty())
}

fn require_session(headers: &HeaderMap) -> Result<&str, AppError> {
    session_header(headers)
        .ok_or_else(|| AppError::BadRequest(format!("Missing {SESSION_HEADER} header")))
}

// ============================================================
// Commands
// ============================================================

async fn send_command(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CommandRequest>,
) -> Result<Response, AppError> {
    let input = req.command.trim();
    if input.is_empty() {
        return Err(AppError::BadRequest("command must not be empty".to_string()));
    }
    if input.chars().count() > MAX_INPUT_CHARS {
        return Err(AppError::BadRequest(format!(
            "command is longer than {MAX_INPUT_CHARS} characters"
        )));
    }

    // Unknown or expired sessions silently start over
    let session_id = match session_header(&headers) {
        Some(id) => match state.db.touch_session(id, state.session_ttl) {
            Ok(session) => session.id,
            Err(DbError::SessionNotFound(_)) => {
                tracing::info!(stale = %id, "Session not found, starting a new one");
                state.db.create_session(state.session_ttl)?.id
            }
            Err(e) => return Err(e.into()),
        },
        None => state.db.create_session(state.session_ttl)?.id,
    };

    let header = HeaderValue::from_str(&session_id)
        .map_err(|e| AppError::Internal(format!("session id not a valid header: {e}")))?;

    let handle = state.runtime.start(session_id, input.to_string());
    let mut response = sse_stream(handle).into_response();
    response.headers_mut().insert(SESSION_HEADER, header);
    Ok(response)
}

// ============================================================
// Thread and Session
// ============================================================

async fn get_thread(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ThreadResponse>, AppError> {
    let id = require_session(&headers)?;
    let session = state.db.touch_session(id, state.session_ttl)?;
    let messages = state.db.get_messages(&session.id)?;

    Ok(Json(ThreadResponse {
        session_id: session.id,
        messages,
    }))
}

async fn delete_session(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<SuccessResponse>, AppError> {
    let id = require_session(&headers)?;
    // Stop any run still writing to this thread
    state.runtime.locks().remove(id);
    state.db.destroy_session(id)?;
    tracing::info!(session_id = %id, "Session destroyed");

    Ok(Json(SuccessResponse { success: true }))
}

// ============================================================
// Service Info
// ============================================================

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        model: state.model_id.clone(),
    })
}

async fn get_version() -> &'static str {
    concat!("cogitatio ", env!("CARGO_PKG_VERSION"))
}

// ============================================================
// Error Handling
// ============================================================

#[derive(Debug)]
enum AppError {
    BadRequest(String),
    NotFound(String),
    Internal(String),
}

impl From<DbError> for AppError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::SessionNotFound(id) => AppError::NotFound(format!("Session not found: {id}")),
            other => AppError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "Request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = Json(ErrorResponse::new(message));
        (status, body).into_response()
    }
}
