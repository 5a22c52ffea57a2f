use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::core::errors::ApiError;
use crate::state::AppState;

pub async fn list_sources(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let sources = state.store.list_sources().await?;
    Ok(Json(json!({
        "total_count": sources.len(),
        "sources": sources,
    })))
}

pub async fn get_source(
    State(state): State<Arc<AppState>>,
    Path(source_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let source = state
        .store
        .get_source(&source_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Source not found".to_string()))?;
    Ok(Json(source))
}

pub async fn delete_source(
    State(state): State<Arc<AppState>>,
    Path(source_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    state.store.delete_source(&source_id).await?;
    Ok(Json(json!({
        "status": "success",
        "message": format!("Deleted source {}", source_id),
    })))
}
