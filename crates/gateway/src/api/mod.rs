pub mod chat;
pub mod events;
pub mod sessions;
pub mod threads;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{delete, get, post};
use axum::Router;

use tl_domain::error::Error;

use crate::state::AppState;

/// Build the full API router.
pub fn router() -> Router<AppState> {
    Router::new()
        // Chat (core runtime): submit or continue a turn, live transport
        .route("/v1/chat", post(chat::chat))
        // Resumable read (long poll)
        .route("/v1/sessions/:id/events", get(events::list_events))
        // Session management
        .route("/v1/sessions", get(sessions::list_sessions))
        .route("/v1/sessions/:id", get(sessions::get_session))
        .route("/v1/sessions/:id", delete(sessions::purge_session))
        .route("/v1/sessions/:id/messages", get(sessions::get_messages))
        .route("/v1/sessions/:id/abort", post(sessions::abort_session))
        // Thread mappings (chat-platform connectors)
        .route("/v1/threads/resolve", post(threads::resolve_thread))
        .route("/v1/threads/bind", post(threads::bind_thread))
        // Health probe
        .route("/v1/health", get(health))
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "ok": true }))
}

/// Map the error taxonomy onto HTTP statuses with a stable error code.
pub(crate) fn error_response(e: &Error) -> Response {
    let (status, code) = match e {
        Error::NotConfigured(_) => (StatusCode::SERVICE_UNAVAILABLE, "not_configured"),
        Error::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "invalid_request"),
        Error::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
        Error::Conflict(_) => (StatusCode::CONFLICT, "conflict"),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
    };
    (
        status,
        Json(serde_json::json!({ "error": code, "message": e.to_string() })),
    )
        .into_response()
}
