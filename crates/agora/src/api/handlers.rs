//! HTTP and WebSocket handlers.

use axum::{
    Json,
    extract::{State, WebSocketUpgrade},
    http::StatusCode,
    response::Response,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::error::ApiResult;
use super::state::AppState;
use crate::auth::CurrentUser;
use crate::chat::{Identity, StoredMessage};
use crate::ws::session;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// GET /health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// GET /api/v1/messages
///
/// Message history from the database, newest first.
pub async fn list_messages(State(state): State<AppState>) -> ApiResult<Json<Vec<StoredMessage>>> {
    let messages = state.chat.history().await?;
    Ok(Json(messages))
}

#[derive(Debug, Deserialize)]
pub struct CreateMessageRequest {
    pub content: String,
}

/// POST /api/v1/messages
///
/// Same pipeline as a WebSocket submission: validate, persist, broadcast
/// to connected sessions.
pub async fn create_message(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(req): Json<CreateMessageRequest>,
) -> ApiResult<(StatusCode, Json<StoredMessage>)> {
    let identity = Identity {
        user_id: user.id().to_string(),
        username: user.username().to_string(),
    };

    let message = state.chat.submit(&identity, &req.content).await?;
    Ok((StatusCode::CREATED, Json(message)))
}

/// Hub statistics response.
#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub connected_sessions: usize,
    pub retained_messages: usize,
}

/// GET /api/v1/stats
pub async fn stats(State(state): State<AppState>) -> Json<StatsResponse> {
    let connected_sessions = state.hub.session_count().await;
    let retained_messages = state.hub.recent().await.len();

    Json(StatsResponse {
        connected_sessions,
        retained_messages,
    })
}

/// GET /api/v1/ws
///
/// Upgrades to a WebSocket session for the authenticated user.
pub async fn ws_handler(
    State(state): State<AppState>,
    user: CurrentUser,
    ws: WebSocketUpgrade,
) -> Response {
    let identity = Identity {
        user_id: user.id().to_string(),
        username: user.username().to_string(),
    };

    info!(user_id = %identity.user_id, username = %identity.username, "WebSocket upgrade");

    let hub = state.hub.clone();
    let chat = state.chat.clone();
    let config = state.session_config.clone();

    ws.on_upgrade(move |socket| session::run(socket, identity, hub, chat, config))
}
