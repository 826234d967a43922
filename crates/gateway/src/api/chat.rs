//! Chat endpoint — submit or continue a turn and hold the live transport.
//!
//! The SSE stream is pure liveness: one `session` event immediately, a
//! `heartbeat` every interval while the run task is alive, one `done` with
//! the terminal status. Agent data never travels here — the event log is
//! the source of truth, so a disconnected client loses nothing.

use axum::extract::State;
use axum::response::sse::{Event, Sse};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use tl_domain::message::Message;
use tl_store::SessionStatus;

use crate::api::error_response;
use crate::runtime::{start_turn, TurnRequest};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ChatBody {
    /// User message text.
    pub message: String,
    /// Continue this session; omit to create a new one.
    #[serde(default)]
    pub session_id: Option<String>,
    /// Explicit history seed (chat-platform connectors); skips log replay.
    #[serde(default)]
    pub context: Option<Vec<Message>>,
}

pub async fn chat(State(state): State<AppState>, Json(body): Json<ChatBody>) -> impl IntoResponse {
    let handle = match start_turn(
        &state,
        TurnRequest {
            message: body.message,
            session_id: body.session_id,
            context: body.context,
        },
    ) {
        Ok(handle) => handle,
        Err(e) => return error_response(&e),
    };

    let heartbeat_interval = state.config.runtime.heartbeat_interval();
    let session_id = handle.session_id;
    let mut done = handle.done;

    let stream = async_stream::stream! {
        yield Ok::<_, std::convert::Infallible>(
            Event::default()
                .event("session")
                .data(serde_json::json!({ "session_id": session_id }).to_string()),
        );

        let mut heartbeat = tokio::time::interval(heartbeat_interval);
        heartbeat.tick().await; // the first tick fires immediately; skip it

        loop {
            tokio::select! {
                _ = heartbeat.tick() => {
                    yield Ok(Event::default().event("heartbeat").data("{}"));
                }
                result = &mut done => {
                    // A dropped sender means the run task died; the client
                    // falls back to the reader's stale-session recovery.
                    let status = result.unwrap_or(SessionStatus::Error);
                    yield Ok(Event::default()
                        .event("done")
                        .data(serde_json::json!({ "status": status }).to_string()));
                    break;
                }
            }
        }
    };

    Sse::new(stream).into_response()
}
