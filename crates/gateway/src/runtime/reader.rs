//! Resumable reader — ordered catch-up reads with a bounded long poll.
//!
//! `after_event_id` is strictly exclusive: a client that always passes back
//! the highest id it has seen observes every event exactly once. The reader
//! is also the sole place worker death becomes visible: a `running` session
//! with no activity past the stale ceiling is transitioned to `error` here,
//! without any cooperation from the (dead) worker.

use std::sync::Arc;

use chrono::Utc;
use tokio::time::Instant;

use tl_domain::config::RuntimeConfig;
use tl_domain::error::{Error, Result};
use tl_domain::event::{EventType, TerminalPayload};
use tl_store::{EventRow, EventStore, SessionRow, SessionStatus, StatusExtras};

#[derive(Debug)]
pub struct ReadResult {
    pub status: SessionStatus,
    pub events: Vec<EventRow>,
}

/// Return every event after the cursor, blocking up to the long-poll
/// timeout while the session is still `running` and no events arrive.
pub async fn list(
    store: &Arc<EventStore>,
    runtime: &RuntimeConfig,
    session_id: &str,
    after_event_id: Option<i64>,
) -> Result<ReadResult> {
    let mut session = load(store, session_id)?;
    recover_if_stale(store, runtime, &mut session)?;

    let deadline = Instant::now() + runtime.long_poll_timeout();
    loop {
        let events = store
            .list_events(session_id, after_event_id)
            .map_err(Error::from)?;
        if !events.is_empty() || session.status != SessionStatus::Running {
            return Ok(ReadResult {
                status: session.status,
                events,
            });
        }
        if Instant::now() >= deadline {
            return Ok(ReadResult {
                status: session.status,
                events: Vec::new(),
            });
        }

        tokio::time::sleep(runtime.long_poll_interval()).await;
        session = load(store, session_id)?;
    }
}

fn load(store: &EventStore, session_id: &str) -> Result<SessionRow> {
    store
        .get_session(session_id)
        .map_err(Error::from)?
        .ok_or_else(|| Error::NotFound(format!("session {session_id}")))
}

/// Stale-session recovery: a `running` session whose last activity is older
/// than the ceiling gets a terminal `error` status and a trailing
/// `session_error` event. The compare-and-set transition makes concurrent
/// readers elect a single writer.
pub fn recover_if_stale(
    store: &EventStore,
    runtime: &RuntimeConfig,
    session: &mut SessionRow,
) -> Result<()> {
    if session.status != SessionStatus::Running {
        return Ok(());
    }
    let age = Utc::now().signed_duration_since(session.updated_at);
    if age.to_std().unwrap_or_default() <= runtime.stale_session_max() {
        return Ok(());
    }

    let won = store
        .transition_from_running(
            &session.id,
            SessionStatus::Error,
            StatusExtras {
                error: Some(Some("timed out".into())),
                completed_at: Some(Some(Utc::now())),
                ..Default::default()
            },
        )
        .map_err(Error::from)?;
    if won {
        tracing::warn!(session_id = %session.id, "stale running session marked as timed out");
        store
            .append(
                &session.id,
                &EventType::SessionError,
                &serde_json::to_value(TerminalPayload {
                    message: "timed out".into(),
                })
                .map_err(Error::Json)?,
            )
            .map_err(Error::from)?;
    }
    session.status = SessionStatus::Error;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn runtime(stale_ms: u64) -> RuntimeConfig {
        RuntimeConfig {
            heartbeat_interval_ms: 10_000,
            abort_check_interval_ms: 2_000,
            long_poll_timeout_ms: 200,
            long_poll_interval_ms: 20,
            stale_session_max_ms: stale_ms,
        }
    }

    fn seeded() -> Arc<EventStore> {
        let store = Arc::new(EventStore::open_in_memory().unwrap());
        store
            .upsert_session(&tl_store::SessionRow::new("s1", "hi"))
            .unwrap();
        store
    }

    #[tokio::test]
    async fn unknown_session_is_not_found() {
        let store = seeded();
        let err = list(&store, &runtime(60_000), "ghost", None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn returns_immediately_when_events_exist() {
        let store = seeded();
        store
            .append("s1", &EventType::AgentStart, &serde_json::json!({}))
            .unwrap();
        let result = list(&store, &runtime(60_000), "s1", None).await.unwrap();
        assert_eq!(result.events.len(), 1);
        assert_eq!(result.status, SessionStatus::Running);
    }

    #[tokio::test]
    async fn cursor_is_exclusive_and_repeatable() {
        let store = seeded();
        let first = store
            .append("s1", &EventType::AgentStart, &serde_json::json!({}))
            .unwrap();
        store
            .append("s1", &EventType::AgentEnd, &serde_json::json!({}))
            .unwrap();

        let a = list(&store, &runtime(60_000), "s1", Some(first))
            .await
            .unwrap();
        let b = list(&store, &runtime(60_000), "s1", Some(first))
            .await
            .unwrap();
        assert_eq!(a.events.len(), 1);
        // Same cursor, no new events in between: the same set comes back.
        assert_eq!(a.events[0].id, b.events[0].id);
        assert!(a.events.iter().all(|e| e.id > first));
    }

    #[tokio::test]
    async fn terminal_session_returns_without_blocking() {
        let store = seeded();
        store
            .set_status("s1", SessionStatus::Completed, StatusExtras::default())
            .unwrap();
        let start = std::time::Instant::now();
        let result = list(&store, &runtime(60_000), "s1", None).await.unwrap();
        assert_eq!(result.status, SessionStatus::Completed);
        assert!(result.events.is_empty());
        assert!(start.elapsed() < Duration::from_millis(100));
    }

    #[tokio::test]
    async fn long_poll_returns_empty_at_timeout() {
        let store = seeded();
        let start = std::time::Instant::now();
        let result = list(&store, &runtime(60_000), "s1", None).await.unwrap();
        assert!(result.events.is_empty());
        assert_eq!(result.status, SessionStatus::Running);
        assert!(start.elapsed() >= Duration::from_millis(200));
    }

    #[tokio::test]
    async fn long_poll_wakes_on_new_event() {
        let store = seeded();
        let writer = store.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            writer
                .append("s1", &EventType::TurnStart, &serde_json::json!({}))
                .unwrap();
        });
        let result = list(&store, &runtime(60_000), "s1", None).await.unwrap();
        assert_eq!(result.events.len(), 1);
    }

    #[tokio::test]
    async fn stale_running_session_is_marked_timed_out() {
        let store = seeded();
        store
            .append("s1", &EventType::AgentStart, &serde_json::json!({}))
            .unwrap();

        // stale ceiling of zero: any age trips the probe
        let result = list(&store, &runtime(0), "s1", None).await.unwrap();
        assert_eq!(result.status, SessionStatus::Error);

        let last = result.events.last().unwrap();
        assert_eq!(last.kind, "session_error");
        assert_eq!(last.data["message"], "timed out");

        let row = store.get_session("s1").unwrap().unwrap();
        assert_eq!(row.status, SessionStatus::Error);
        assert_eq!(row.error.as_deref(), Some("timed out"));

        // A subsequent read past the session_error id returns nothing new.
        let after = list(&store, &runtime(0), "s1", Some(last.id))
            .await
            .unwrap();
        assert!(after.events.is_empty());
        assert_eq!(after.status, SessionStatus::Error);
    }

    #[tokio::test]
    async fn fresh_running_session_is_not_probed() {
        let store = seeded();
        store
            .append("s1", &EventType::AgentStart, &serde_json::json!({}))
            .unwrap();
        let result = list(&store, &runtime(60_000), "s1", None).await.unwrap();
        assert_eq!(result.status, SessionStatus::Running);
    }
}
