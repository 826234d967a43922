//! Per-run event queue — the single writer for a session's log.
//!
//! Pushes are accepted synchronously and appended in FIFO order by one
//! worker task, which also polls the session's status row for an externally
//! signalled abort. When the status leaves `running`, the queue latches
//! `was_aborted_externally`, fires the `on_abort` callback exactly once,
//! and silently drops everything still in flight so nothing lands in the
//! log after the abort was recorded.
//!
//! Append failures never interrupt the agent run: transient ones are
//! retried once, then logged and dropped.

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::{mpsc, oneshot};

use tl_domain::event::{EventSink, EventType};
use tl_store::{EventStore, SessionStatus};

pub type OnAbort = Box<dyn Fn() + Send + Sync>;

enum Cmd {
    Append { kind: EventType, data: Value },
    Flush(oneshot::Sender<()>),
}

struct QueueShared {
    count: AtomicI64,
    aborted: AtomicBool,
}

#[derive(Clone)]
pub struct EventQueue {
    tx: mpsc::UnboundedSender<Cmd>,
    shared: Arc<QueueShared>,
}

impl EventQueue {
    pub fn new(
        store: Arc<EventStore>,
        session_id: String,
        abort_check_interval: Duration,
        on_abort: OnAbort,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let shared = Arc::new(QueueShared {
            count: AtomicI64::new(0),
            aborted: AtomicBool::new(false),
        });

        tokio::spawn(worker(
            store,
            session_id,
            abort_check_interval,
            on_abort,
            rx,
            shared.clone(),
        ));

        Self { tx, shared }
    }

    /// Accept an event for appending, strictly after all prior pushes.
    pub fn push(&self, kind: EventType, data: Value) {
        self.shared.count.fetch_add(1, Ordering::Relaxed);
        // Send only fails when the worker is gone, i.e. at shutdown.
        let _ = self.tx.send(Cmd::Append { kind, data });
    }

    /// Completes when every push accepted before this call has been
    /// appended or dropped.
    pub async fn flush(&self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.tx.send(Cmd::Flush(ack_tx)).is_ok() {
            let _ = ack_rx.await;
        }
    }

    /// Number of events pushed so far.
    pub fn count(&self) -> i64 {
        self.shared.count.load(Ordering::Relaxed)
    }

    /// True once the abort poll has observed a non-`running` status.
    pub fn was_aborted_externally(&self) -> bool {
        self.shared.aborted.load(Ordering::Acquire)
    }
}

impl EventSink for EventQueue {
    fn emit(&self, kind: EventType, data: Value) {
        self.push(kind, data);
    }
}

async fn worker(
    store: Arc<EventStore>,
    session_id: String,
    abort_check_interval: Duration,
    on_abort: OnAbort,
    mut rx: mpsc::UnboundedReceiver<Cmd>,
    shared: Arc<QueueShared>,
) {
    let mut poll = tokio::time::interval(abort_check_interval);
    poll.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    poll.tick().await; // the first tick is immediate; skip it

    let check_abort = |shared: &QueueShared| {
        if shared.aborted.load(Ordering::Acquire) {
            return;
        }
        match store.get_session(&session_id) {
            Ok(Some(row)) if row.status != SessionStatus::Running => {
                shared.aborted.store(true, Ordering::Release);
                tracing::info!(session_id = %session_id, status = row.status.as_str(),
                    "external abort observed; stopping run");
                on_abort();
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(session_id = %session_id, error = %e, "abort check read failed");
            }
        }
    };

    loop {
        tokio::select! {
            // Poll even while no events flow, so a long tool call cannot
            // delay abort detection past the check interval.
            _ = poll.tick() => check_abort(&shared),
            cmd = rx.recv() => match cmd {
                None => break,
                Some(Cmd::Flush(ack)) => {
                    let _ = ack.send(());
                }
                Some(Cmd::Append { kind, data }) => {
                    if shared.aborted.load(Ordering::Acquire) {
                        continue;
                    }
                    append_best_effort(&store, &session_id, &kind, &data);
                }
            },
        }
    }
}

fn append_best_effort(store: &EventStore, session_id: &str, kind: &EventType, data: &Value) {
    match store.append(session_id, kind, data) {
        Ok(_) => {}
        Err(e) if e.is_transient() => {
            tracing::warn!(session_id, kind = kind.as_str(), error = %e,
                "transient append failure; retrying once");
            if let Err(e) = store.append(session_id, kind, data) {
                tracing::warn!(session_id, kind = kind.as_str(), error = %e,
                    "append retry failed; dropping event");
            }
        }
        Err(e) => {
            tracing::warn!(session_id, kind = kind.as_str(), error = %e, "dropping event");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use tl_store::{SessionRow, StatusExtras};

    fn seeded_store(id: &str) -> Arc<EventStore> {
        let store = Arc::new(EventStore::open_in_memory().unwrap());
        store.upsert_session(&SessionRow::new(id, "hi")).unwrap();
        store
    }

    fn noop() -> OnAbort {
        Box::new(|| {})
    }

    #[tokio::test]
    async fn pushes_append_in_order() {
        let store = seeded_store("s1");
        let queue = EventQueue::new(
            store.clone(),
            "s1".into(),
            Duration::from_secs(60),
            noop(),
        );

        for i in 0..20 {
            queue.push(EventType::TurnStart, serde_json::json!({ "seq": i }));
        }
        queue.flush().await;

        let events = store.list_events("s1", None).unwrap();
        assert_eq!(events.len(), 20);
        for (i, event) in events.iter().enumerate() {
            assert_eq!(event.data["seq"], i as i64);
        }
        assert_eq!(queue.count(), 20);
    }

    #[tokio::test]
    async fn flush_is_a_barrier() {
        let store = seeded_store("s1");
        let queue = EventQueue::new(
            store.clone(),
            "s1".into(),
            Duration::from_secs(60),
            noop(),
        );

        queue.push(EventType::AgentStart, serde_json::json!({}));
        queue.flush().await;
        assert_eq!(store.list_events("s1", None).unwrap().len(), 1);

        queue.push(EventType::AgentEnd, serde_json::json!({}));
        queue.flush().await;
        assert_eq!(store.list_events("s1", None).unwrap().len(), 2);
    }

    #[tokio::test]
    async fn external_abort_latches_and_drops() {
        let store = seeded_store("s1");
        let aborted = Arc::new(AtomicBool::new(false));
        let abort_flag = aborted.clone();
        let queue = EventQueue::new(
            store.clone(),
            "s1".into(),
            Duration::from_millis(20),
            Box::new(move || {
                abort_flag.store(true, Ordering::SeqCst);
            }),
        );

        queue.push(EventType::AgentStart, serde_json::json!({}));
        queue.flush().await;

        // Someone else completes the session (the abort endpoint).
        store
            .transition_from_running("s1", SessionStatus::Completed, StatusExtras::default())
            .unwrap();

        // Wait for the poll to notice.
        for _ in 0..50 {
            if queue.was_aborted_externally() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(queue.was_aborted_externally());
        assert!(aborted.load(Ordering::SeqCst));

        // Later pushes are dropped silently.
        queue.push(EventType::TurnStart, serde_json::json!({}));
        queue.push(EventType::AgentEnd, serde_json::json!({}));
        queue.flush().await;
        assert_eq!(store.list_events("s1", None).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn abort_detected_without_event_flow() {
        // A run stuck in a long tool call pushes nothing, but the poll
        // still notices the abort.
        let store = seeded_store("s1");
        let queue = EventQueue::new(
            store.clone(),
            "s1".into(),
            Duration::from_millis(20),
            noop(),
        );

        store
            .transition_from_running("s1", SessionStatus::Error, StatusExtras::default())
            .unwrap();

        for _ in 0..50 {
            if queue.was_aborted_externally() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("abort was not detected by the idle poll");
    }

    #[tokio::test]
    async fn running_status_does_not_latch() {
        let store = seeded_store("s1");
        let queue = EventQueue::new(
            store.clone(),
            "s1".into(),
            Duration::from_millis(10),
            noop(),
        );
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(!queue.was_aborted_externally());
    }
}
