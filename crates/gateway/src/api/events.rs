//! Resumable read endpoint — the catch-up long poll over the event log.

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use crate::api::error_response;
use crate::runtime::reader;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    /// Strictly exclusive cursor: only events with a greater id return.
    #[serde(default)]
    pub after: Option<i64>,
}

pub async fn list_events(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Query(query): Query<ListQuery>,
) -> impl IntoResponse {
    match reader::list(&state.store, &state.config.runtime, &session_id, query.after).await {
        Ok(result) => Json(serde_json::json!({
            "status": result.status,
            "events": result.events,
        }))
        .into_response(),
        Err(e) => error_response(&e),
    }
}
