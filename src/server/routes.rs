//! HTTP route handlers for the chat relay.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::archive::ArchivedMessage;
use super::prompt;
use super::state::AppState;
use crate::llm::upstream::{UpstreamError, UpstreamMessage};

/// Create the API router with all routes.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/chat", post(chat))
        .route(
            "/conversation/{id}",
            put(put_conversation).delete(delete_conversation),
        )
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "solace-relay",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

const fn default_temperature() -> f32 {
    0.7
}

/// One history entry as sent by the client.
#[derive(Debug, Clone, Deserialize)]
pub struct HistoryEntry {
    /// `user` or `assistant`.
    pub role: String,
    /// Message text.
    pub content: String,
}

/// Chat turn request.
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    /// The current user message.
    pub message: String,
    /// History before the current message; the current message is never
    /// repeated here.
    #[serde(default)]
    pub conversation_history: Vec<HistoryEntry>,
    /// Conversation id; a fresh one is minted when absent.
    pub conversation_id: Option<String>,
    /// Sampling temperature for the upstream model.
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

/// Chat turn response.
#[derive(Debug, Serialize)]
pub struct ChatResponse {
    /// The assistant's reply.
    pub response: String,
    /// Authoritative conversation id; the client adopts it.
    pub conversation_id: String,
}

/// Handle one chat turn.
///
/// Windows the history, recalls background topics from the archived copy,
/// calls the upstream model and records the completed turn. Upstream
/// failures surface as precise status codes; nothing is substituted here.
async fn chat(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, (StatusCode, String)> {
    let conversation_id = resolve_conversation_id(request.conversation_id);

    let history: Vec<UpstreamMessage> = request
        .conversation_history
        .iter()
        .map(|entry| UpstreamMessage {
            role: entry.role.clone(),
            content: entry.content.clone(),
        })
        .collect();
    let window = prompt::sliding_window(&history);
    let recalled =
        state
            .archive
            .recall_user_messages(&conversation_id, window.len(), prompt::RECALL_LIMIT);
    let messages = prompt::assemble(&recalled, &window, &request.message);

    tracing::debug!(
        conversation = %conversation_id,
        window = window.len(),
        recalled = recalled.len(),
        "forwarding chat turn upstream"
    );

    let response = state
        .upstream
        .generate(&messages, request.temperature)
        .await
        .map_err(upstream_error_response)?;

    state
        .archive
        .record_turn(&conversation_id, &request.message, &response);

    Ok(Json(ChatResponse {
        response,
        conversation_id,
    }))
}

/// Conversation id to answer with: the client's when one was sent, a
/// freshly minted one otherwise. The client adopts whatever comes back.
fn resolve_conversation_id(requested: Option<String>) -> String {
    requested.unwrap_or_else(|| Uuid::new_v4().simple().to_string())
}

/// One replicated message.
#[derive(Debug, Deserialize)]
pub struct UpsertEntry {
    /// Message author role.
    pub role: String,
    /// Message text.
    pub content: String,
    /// RFC 3339 append instant, when the client knows it.
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// Full-conversation replication request.
#[derive(Debug, Deserialize)]
pub struct ConversationUpsertRequest {
    /// Every message, oldest first.
    pub messages: Vec<UpsertEntry>,
    /// Client-chosen title.
    pub title: String,
    /// Client-side update instant.
    #[serde(rename = "updatedAt")]
    pub updated_at: String,
}

/// Replace the archived copy of a conversation.
async fn put_conversation(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(request): Json<ConversationUpsertRequest>,
) -> StatusCode {
    tracing::debug!(
        conversation = %id,
        client_updated_at = %request.updated_at,
        "replication received"
    );
    let messages = request
        .messages
        .into_iter()
        .map(|entry| ArchivedMessage {
            role: entry.role,
            content: entry.content,
            timestamp: entry.timestamp,
        })
        .collect();
    state.archive.upsert(&id, messages, &request.title);
    StatusCode::NO_CONTENT
}

/// Remove the archived copy of a conversation. Absence is not an error.
async fn delete_conversation(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> StatusCode {
    let _ = state.archive.remove(&id);
    StatusCode::NO_CONTENT
}

fn upstream_error_response(err: UpstreamError) -> (StatusCode, String) {
    let status = match &err {
        UpstreamError::Timeout => StatusCode::GATEWAY_TIMEOUT,
        UpstreamError::Unreachable => StatusCode::SERVICE_UNAVAILABLE,
        UpstreamError::HttpStatusNotOk(code) => {
            StatusCode::from_u16(*code).unwrap_or(StatusCode::BAD_GATEWAY)
        }
        UpstreamError::MalformedResponse => StatusCode::BAD_GATEWAY,
        UpstreamError::HttpClient(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, format!("Upstream error: {err}"))
}
