//! Session management endpoints: listing, replay, abort, purge.

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;

use tl_domain::error::Error;
use tl_domain::event::{EventType, TerminalPayload};
use tl_store::{SessionStatus, StatusExtras};

use crate::api::error_response;
use crate::runtime::replay;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListSessionsQuery {
    #[serde(default = "d_limit")]
    pub limit: usize,
    #[serde(default)]
    pub offset: usize,
}

fn d_limit() -> usize {
    50
}

/// GET /v1/sessions — summaries, newest first.
pub async fn list_sessions(
    State(state): State<AppState>,
    Query(query): Query<ListSessionsQuery>,
) -> impl IntoResponse {
    match state.store.list_sessions(query.limit.min(500), query.offset) {
        Ok(sessions) => Json(serde_json::json!({
            "sessions": sessions,
            "count": sessions.len(),
        }))
        .into_response(),
        Err(e) => error_response(&e.into()),
    }
}

/// GET /v1/sessions/:id — one session row.
pub async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    match state.store.get_session(&session_id) {
        Ok(Some(row)) => Json(row).into_response(),
        Ok(None) => error_response(&Error::NotFound(format!("session {session_id}"))),
        Err(e) => error_response(&e.into()),
    }
}

/// GET /v1/sessions/:id/messages — reconstruction plus the summary row.
pub async fn get_messages(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    let session = match state.store.get_session(&session_id) {
        Ok(Some(row)) => row,
        Ok(None) => return error_response(&Error::NotFound(format!("session {session_id}"))),
        Err(e) => return error_response(&e.into()),
    };
    match state.store.list_events(&session_id, None) {
        Ok(events) => {
            let messages = replay::reconstruct(&events);
            Json(serde_json::json!({
                "session": session,
                "messages": messages,
            }))
            .into_response()
        }
        Err(e) => error_response(&e.into()),
    }
}

/// POST /v1/sessions/:id/abort — explicit user-initiated completion.
///
/// Sets the status to `completed` and appends `session_aborted`; the run's
/// event queue observes the status change within the abort-check interval
/// and stops the worker from inside its own task. Idempotent: aborting a
/// non-running session succeeds without mutating anything.
pub async fn abort_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    match state.store.get_session(&session_id) {
        Ok(Some(_)) => {}
        Ok(None) => return error_response(&Error::NotFound(format!("session {session_id}"))),
        Err(e) => return error_response(&e.into()),
    }

    let transitioned = state.store.transition_from_running(
        &session_id,
        SessionStatus::Completed,
        StatusExtras {
            completed_at: Some(Some(Utc::now())),
            ..Default::default()
        },
    );
    match transitioned {
        Ok(true) => {
            let payload = serde_json::to_value(TerminalPayload {
                message: "aborted by user".into(),
            })
            .unwrap_or_default();
            if let Err(e) = state
                .store
                .append(&session_id, &EventType::SessionAborted, &payload)
            {
                tracing::warn!(session_id = %session_id, error = %e,
                    "failed to append session_aborted");
            }
            tracing::info!(session_id = %session_id, "session aborted");
            Json(serde_json::json!({ "ok": true })).into_response()
        }
        Ok(false) => {
            Json(serde_json::json!({ "ok": true, "note": "not running" })).into_response()
        }
        Err(e) => error_response(&e.into()),
    }
}

/// DELETE /v1/sessions/:id — whole-session purge.
pub async fn purge_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    match state.store.purge_session(&session_id) {
        Ok(true) => Json(serde_json::json!({ "ok": true })).into_response(),
        Ok(false) => error_response(&Error::NotFound(format!("session {session_id}"))),
        Err(e) => error_response(&e.into()),
    }
}
