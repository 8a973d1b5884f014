//! HTTP API module - REST endpoints and WebSocket

mod channel;
mod websocket;

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::actions::{ActionExecutor, ActionRequest};
pub use channel::SocketChannel;
pub use websocket::{ClientMessage, ConnectionManager, ParticipantSession, ServerMessage};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub executor: ActionExecutor,
    pub connections: Arc<ConnectionManager>,
    pub channel: Arc<SocketChannel>,
}

/// Build the API router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/", get(root))
        .route("/actions", post(submit_action))
        .route("/documents/{id}", get(get_document))
        .route("/ws", get(websocket::ws_handler))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
}

/// Root endpoint
async fn root() -> impl IntoResponse {
    Json(RootResponse {
        name: "vttd",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Serialize)]
struct RootResponse {
    name: &'static str,
    version: &'static str,
}

/// Health check endpoint
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy",
        documents: state.executor.store().len().await,
        participants: state.connections.participants().await.len(),
        pending_requests: state.channel.pending_count(),
    })
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    documents: usize,
    participants: usize,
    pending_requests: usize,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

fn error_response(status: StatusCode, error: impl Into<String>) -> axum::response::Response {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
        }),
    )
        .into_response()
}

/// Run one action to completion
///
/// Rolls and confirmations it needs go out over the participants' sockets,
/// so the response arrives only once they have answered.
async fn submit_action(
    State(state): State<AppState>,
    Json(request): Json<ActionRequest>,
) -> axum::response::Response {
    if request.issuer_id.trim().is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "issuer_id is required");
    }
    let outcome = state.executor.submit(request, state.channel.as_ref()).await;
    if !outcome.is_completed() {
        warn!(
            "Action {} ended {:?}",
            outcome.request_id, outcome.phase
        );
    }
    Json(outcome).into_response()
}

/// Current live state of one document
async fn get_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> axum::response::Response {
    match state.executor.store().get(&id).await {
        Some(doc) => Json(doc).into_response(),
        None => error_response(StatusCode::NOT_FOUND, format!("Document {} not found", id)),
    }
}
