//! HTTP API server.
//!
//! Exposes the chat pipeline over a small JSON API:
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/api/chat` | Submit a query, get a response plus fragments |
//! | `POST` | `/api/chat/session` | Create a chat session |
//! | `GET`  | `/api/chat/history/{session_id}` | Ordered session history |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! Error responses use `{ "error": { "code": "...", "message": "..." } }`.
//! A missing or whitespace-only query is rejected with `400` before the
//! pipeline runs.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted to support
//! browser-based chat frontends.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::config::Config;
use crate::history::SessionStore;
use crate::models::{ChatMessage, Fragment};
use crate::pipeline::ChatPipeline;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
struct AppState {
    pipeline: Arc<ChatPipeline>,
    sessions: Arc<SessionStore>,
}

/// Start the HTTP API server on the configured bind address. Runs until
/// the process is terminated.
pub async fn run_server(
    config: &Config,
    pipeline: Arc<ChatPipeline>,
    sessions: Arc<SessionStore>,
) -> anyhow::Result<()> {
    let state = AppState { pipeline, sessions };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/api/chat", post(handle_chat))
        .route("/api/chat/session", post(handle_create_session))
        .route("/api/chat/history/{session_id}", get(handle_history))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state);

    info!("chat API listening on http://{}", config.server.bind);

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

fn internal_error(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message: message.into(),
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /api/chat/session ============

#[derive(Serialize)]
struct SessionResponse {
    session_id: String,
}

async fn handle_create_session(
    State(state): State<AppState>,
) -> Result<Json<SessionResponse>, AppError> {
    let session_id = state
        .sessions
        .create_session()
        .await
        .map_err(|e| internal_error(format!("failed to create session: {}", e)))?;

    Ok(Json(SessionResponse { session_id }))
}

// ============ GET /api/chat/history/{session_id} ============

#[derive(Serialize)]
struct HistoryResponse {
    history: Vec<ChatMessage>,
}

async fn handle_history(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Json<HistoryResponse> {
    let history = state.sessions.history(&session_id).await;
    Json(HistoryResponse { history })
}

// ============ POST /api/chat ============

#[derive(Deserialize)]
struct ChatRequest {
    #[serde(default)]
    query: Option<String>,
    #[serde(default)]
    session_id: Option<String>,
}

#[derive(Serialize)]
struct ChatResponse {
    response: String,
    fragments: Vec<Fragment>,
}

async fn handle_chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    let query = validate_query(request.query.as_deref()).map_err(bad_request)?;

    let outcome = state
        .pipeline
        .process(query, request.session_id.as_deref())
        .await;

    Ok(Json(ChatResponse {
        response: outcome.response,
        fragments: outcome.fragments,
    }))
}

/// Boundary check: the pipeline never runs for a missing, empty, or
/// whitespace-only query.
fn validate_query(query: Option<&str>) -> Result<&str, &'static str> {
    match query {
        Some(query) if !query.trim().is_empty() => Ok(query),
        _ => Err("query must not be empty"),
    }
}
