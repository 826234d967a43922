//! Thread mapping endpoints for chat-platform connectors.
//!
//! A connector resolves its thread key before submitting: a hit means
//! "continue that session", a miss means "create one via /v1/chat, then
//! bind the key".

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::Value;

use tl_domain::error::Error;

use crate::api::error_response;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ResolveBody {
    pub thread_key: String,
}

/// POST /v1/threads/resolve — look up a thread's session, if any.
pub async fn resolve_thread(
    State(state): State<AppState>,
    Json(body): Json<ResolveBody>,
) -> impl IntoResponse {
    match state.store.resolve_thread(&body.thread_key) {
        Ok(Some(mapping)) => Json(serde_json::json!({
            "found": true,
            "session_id": mapping.session_id,
            "context": mapping.context,
        }))
        .into_response(),
        Ok(None) => Json(serde_json::json!({ "found": false })).into_response(),
        Err(e) => error_response(&e.into()),
    }
}

#[derive(Debug, Deserialize)]
pub struct BindBody {
    pub thread_key: String,
    pub session_id: String,
    /// Opaque context keys the connector wants to keep with the mapping.
    #[serde(default)]
    pub context: Option<Value>,
}

/// POST /v1/threads/bind — upsert the thread → session mapping.
pub async fn bind_thread(
    State(state): State<AppState>,
    Json(body): Json<BindBody>,
) -> impl IntoResponse {
    match state.store.get_session(&body.session_id) {
        Ok(Some(_)) => {}
        Ok(None) => {
            return error_response(&Error::NotFound(format!("session {}", body.session_id)))
        }
        Err(e) => return error_response(&e.into()),
    }

    let context = body.context.unwrap_or_else(|| serde_json::json!({}));
    match state
        .store
        .upsert_thread(&body.thread_key, &body.session_id, &context)
    {
        Ok(()) => Json(serde_json::json!({ "ok": true })).into_response(),
        Err(e) => error_response(&e.into()),
    }
}
