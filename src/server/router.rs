use std::sync::Arc;

use axum::http::{header, HeaderValue, Method};
use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::server::handlers::{chat, health, sources};
use crate::state::AppState;

/// Creates the application router: CORS, request tracing, chat and source
/// catalog endpoints.
pub fn router(state: Arc<AppState>) -> Router {
    let cors_layer = build_cors_layer(&state);
    Router::new()
        .route("/health", get(health::health))
        .route("/api/chat", post(chat::chat))
        .route("/api/chat/history", post(chat::get_chat_history))
        .route(
            "/api/chat/sessions",
            get(chat::list_sessions).delete(chat::clear_all_sessions),
        )
        .route(
            "/api/chat/sessions/:session_key",
            delete(chat::clear_session),
        )
        .route("/api/sources", get(sources::list_sources))
        .route(
            "/api/sources/:source_id",
            get(sources::get_source).delete(sources::delete_source),
        )
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer)
        .with_state(state)
}

fn build_cors_layer(state: &Arc<AppState>) -> CorsLayer {
    let origins: Vec<HeaderValue> = state
        .settings
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE])
}
