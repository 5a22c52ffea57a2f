use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::core::errors::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub query: String,
    #[serde(default)]
    pub source_ids: Vec<String>,
    /// Accepted for API compatibility; the server-side transcript is
    /// authoritative and this is ignored.
    #[serde(default)]
    #[allow(dead_code)]
    pub chat_history: Vec<Value>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryRequest {
    #[serde(default)]
    pub source_ids: Vec<String>,
}

pub async fn chat(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ChatRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if payload.query.trim().is_empty() {
        return Err(ApiError::BadRequest("Query must not be empty".to_string()));
    }

    tracing::info!("Chat query: {:.100}...", payload.query);
    let outcome = state
        .chat
        .process_query(&payload.query, &payload.source_ids)
        .await;

    Ok(Json(json!({
        "answer": outcome.answer,
        "citations": outcome.citations,
        "source_ids_used": outcome.source_ids_used,
        "session_key": outcome.session_key,
        "processing_time": outcome.processing_time,
    })))
}

pub async fn get_chat_history(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<HistoryRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (session_key, transcript) = state.chat.history(&payload.source_ids).await;
    let message_count = transcript.len();

    Ok(Json(json!({
        "session_key": session_key,
        "chat_history": transcript,
        "message_count": message_count,
    })))
}

pub async fn list_sessions(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let sessions = state.chat.registry().active_sessions().await;
    let result: Vec<Value> = sessions
        .into_iter()
        .map(|s| {
            json!({
                "session_key": s.session_key,
                "message_count": s.message_count,
            })
        })
        .collect();
    Ok(Json(json!({ "sessions": result })))
}

pub async fn clear_session(
    State(state): State<Arc<AppState>>,
    Path(session_key): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    if !state.chat.registry().evict(&session_key).await {
        return Err(ApiError::NotFound("Session not found".to_string()));
    }
    Ok(Json(json!({ "status": "success" })))
}

pub async fn clear_all_sessions(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    state.chat.registry().evict_all().await;
    Ok(Json(json!({ "status": "success" })))
}
