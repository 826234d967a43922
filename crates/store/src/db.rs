//! SQLite-backed event log store.
//!
//! The `events` table's auto-increment primary key is the monotonic event
//! id: within a session, append order equals id order, and readers use the
//! id as an exclusive cursor. The store does not interpret event payloads.
//!
//! All methods are synchronous; callers treat them as fast local I/O. The
//! single connection behind a mutex, combined with the one-writer-per-run
//! event queue, is what upholds ordered persistence.

use std::path::Path;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;

use tl_domain::event::EventType;
use tl_domain::message::Usage;

use crate::error::{Result, StoreError};
use crate::records::{
    EventRow, MountRecord, SessionRow, SessionStatus, SessionSummary, StatusExtras, ThreadMapping,
};

pub struct EventStore {
    conn: Mutex<Connection>,
}

impl EventStore {
    pub fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::Fatal(format!("creating {}: {e}", parent.display())))?;
        }
        let conn = Connection::open(db_path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.lock().execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS sessions (
                id TEXT PRIMARY KEY,
                initial_message TEXT NOT NULL,
                status TEXT NOT NULL,
                response TEXT,
                usage TEXT,
                event_count INTEGER NOT NULL DEFAULT 0,
                error TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                completed_at TEXT
            );

            CREATE TABLE IF NOT EXISTS events (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id TEXT NOT NULL,
                type TEXT NOT NULL,
                data TEXT NOT NULL,
                created_at TEXT NOT NULL,
                FOREIGN KEY (session_id) REFERENCES sessions(id)
            );

            CREATE TABLE IF NOT EXISTS threads (
                thread_key TEXT PRIMARY KEY,
                session_id TEXT NOT NULL,
                context TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS mounts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id TEXT NOT NULL,
                mount_path TEXT NOT NULL,
                mount_type TEXT NOT NULL,
                config TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_events_session ON events(session_id, id);
            CREATE INDEX IF NOT EXISTS idx_sessions_created ON sessions(created_at DESC);
            CREATE INDEX IF NOT EXISTS idx_mounts_session ON mounts(session_id);
            "#,
        )?;
        Ok(())
    }

    // ── Events ────────────────────────────────────────────────────

    /// Append one event and return its id. Touches the session's
    /// `updated_at` so the stale probe sees activity.
    pub fn append(&self, session_id: &str, kind: &EventType, data: &Value) -> Result<i64> {
        let conn = self.conn.lock();
        let now = Utc::now().to_rfc3339();
        conn.execute(
            "INSERT INTO events (session_id, type, data, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![session_id, kind.as_str(), data.to_string(), now],
        )?;
        let id = conn.last_insert_rowid();
        conn.execute(
            "UPDATE sessions SET updated_at = ?1 WHERE id = ?2",
            params![now, session_id],
        )?;
        Ok(id)
    }

    /// Ordered events after the exclusive cursor. `None` starts at the
    /// beginning. Never skips; returns `[]` when caught up.
    pub fn list_events(&self, session_id: &str, after_id: Option<i64>) -> Result<Vec<EventRow>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, session_id, type, data, created_at FROM events
             WHERE session_id = ?1 AND id > ?2 ORDER BY id ASC",
        )?;
        let rows = stmt.query_map(params![session_id, after_id.unwrap_or(0)], row_to_event)?;
        let mut events = Vec::new();
        for row in rows {
            events.push(row?);
        }
        Ok(events)
    }

    // ── Sessions ──────────────────────────────────────────────────

    pub fn get_session(&self, id: &str) -> Result<Option<SessionRow>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT id, initial_message, status, response, usage, event_count, error,
                    created_at, updated_at, completed_at
             FROM sessions WHERE id = ?1",
            params![id],
            row_to_session,
        )
        .optional()
        .map_err(StoreError::from)
    }

    pub fn upsert_session(&self, row: &SessionRow) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            r#"
            INSERT INTO sessions (id, initial_message, status, response, usage, event_count,
                                  error, created_at, updated_at, completed_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            ON CONFLICT(id) DO UPDATE SET
                initial_message = ?2,
                status = ?3,
                response = ?4,
                usage = ?5,
                event_count = ?6,
                error = ?7,
                updated_at = ?9,
                completed_at = ?10
            "#,
            params![
                row.id,
                row.initial_message,
                row.status.as_str(),
                row.response.as_ref().map(|v| v.to_string()),
                row.usage
                    .as_ref()
                    .map(|u| serde_json::to_string(u).unwrap_or_default()),
                row.event_count,
                row.error,
                row.created_at.to_rfc3339(),
                row.updated_at.to_rfc3339(),
                row.completed_at.map(|t| t.to_rfc3339()),
            ],
        )?;
        Ok(())
    }

    /// Transition a session's status, applying any extras atomically.
    pub fn set_status(&self, id: &str, status: SessionStatus, extras: StatusExtras) -> Result<()> {
        let conn = self.conn.lock();
        let changed = conn.execute(
            "UPDATE sessions SET status = ?1, updated_at = ?2 WHERE id = ?3",
            params![status.as_str(), Utc::now().to_rfc3339(), id],
        )?;
        if changed == 0 {
            return Err(StoreError::Fatal(format!("unknown session: {id}")));
        }
        apply_extras(&conn, id, &extras)?;
        Ok(())
    }

    /// Compare-and-set transition out of `running`. Returns `false` without
    /// touching anything when the session is not currently `running`, so
    /// racing terminators (abort endpoint, stale probe, orchestrator) write
    /// at most one terminal outcome.
    pub fn transition_from_running(
        &self,
        id: &str,
        status: SessionStatus,
        extras: StatusExtras,
    ) -> Result<bool> {
        let conn = self.conn.lock();
        let changed = conn.execute(
            "UPDATE sessions SET status = ?1, updated_at = ?2
             WHERE id = ?3 AND status = 'running'",
            params![status.as_str(), Utc::now().to_rfc3339(), id],
        )?;
        if changed == 0 {
            return Ok(false);
        }
        apply_extras(&conn, id, &extras)?;
        Ok(true)
    }

    /// Add a turn's token counters to the session aggregate.
    pub fn add_usage(&self, id: &str, usage: &Usage) -> Result<()> {
        let conn = self.conn.lock();
        let existing: Option<String> = conn
            .query_row(
                "SELECT usage FROM sessions WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()?
            .flatten();
        let mut total: Usage = existing
            .and_then(|raw| serde_json::from_str(&raw).ok())
            .unwrap_or_default();
        total.add(usage);
        conn.execute(
            "UPDATE sessions SET usage = ?1 WHERE id = ?2",
            params![
                serde_json::to_string(&total)
                    .map_err(|e| StoreError::Fatal(format!("serializing usage: {e}")))?,
                id
            ],
        )?;
        Ok(())
    }

    /// Session summaries, newest first.
    pub fn list_sessions(&self, limit: usize, offset: usize) -> Result<Vec<SessionSummary>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, initial_message, status, event_count, created_at, completed_at
             FROM sessions ORDER BY created_at DESC, id DESC LIMIT ?1 OFFSET ?2",
        )?;
        let rows = stmt.query_map(params![limit as i64, offset as i64], |row| {
            Ok(SessionSummary {
                id: row.get(0)?,
                initial_message: row.get(1)?,
                status: parse_status(&row.get::<_, String>(2)?),
                event_count: row.get(3)?,
                created_at: parse_ts(&row.get::<_, String>(4)?),
                completed_at: row
                    .get::<_, Option<String>>(5)?
                    .map(|s| parse_ts(&s)),
            })
        })?;
        let mut sessions = Vec::new();
        for row in rows {
            sessions.push(row?);
        }
        Ok(sessions)
    }

    /// Whole-session purge — the only way events are ever deleted.
    pub fn purge_session(&self, id: &str) -> Result<bool> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM events WHERE session_id = ?1", params![id])?;
        tx.execute("DELETE FROM mounts WHERE session_id = ?1", params![id])?;
        tx.execute("DELETE FROM threads WHERE session_id = ?1", params![id])?;
        let removed = tx.execute("DELETE FROM sessions WHERE id = ?1", params![id])?;
        tx.commit()?;
        Ok(removed > 0)
    }

    // ── Thread mappings ───────────────────────────────────────────

    pub fn resolve_thread(&self, thread_key: &str) -> Result<Option<ThreadMapping>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT thread_key, session_id, context, created_at, updated_at
             FROM threads WHERE thread_key = ?1",
            params![thread_key],
            |row| {
                Ok(ThreadMapping {
                    thread_key: row.get(0)?,
                    session_id: row.get(1)?,
                    context: parse_json(&row.get::<_, String>(2)?),
                    created_at: parse_ts(&row.get::<_, String>(3)?),
                    updated_at: parse_ts(&row.get::<_, String>(4)?),
                })
            },
        )
        .optional()
        .map_err(StoreError::from)
    }

    pub fn upsert_thread(&self, thread_key: &str, session_id: &str, context: &Value) -> Result<()> {
        let conn = self.conn.lock();
        let now = Utc::now().to_rfc3339();
        conn.execute(
            r#"
            INSERT INTO threads (thread_key, session_id, context, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?4)
            ON CONFLICT(thread_key) DO UPDATE SET
                session_id = ?2,
                context = ?3,
                updated_at = ?4
            "#,
            params![thread_key, session_id, context.to_string(), now],
        )?;
        Ok(())
    }

    // ── Mount records ─────────────────────────────────────────────

    pub fn add_mount(
        &self,
        session_id: &str,
        mount_path: &str,
        mount_type: &str,
        config: &Value,
    ) -> Result<i64> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO mounts (session_id, mount_path, mount_type, config, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                session_id,
                mount_path,
                mount_type,
                config.to_string(),
                Utc::now().to_rfc3339()
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn list_mounts(&self, session_id: &str) -> Result<Vec<MountRecord>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, session_id, mount_path, mount_type, config, created_at
             FROM mounts WHERE session_id = ?1 ORDER BY id ASC",
        )?;
        let rows = stmt.query_map(params![session_id], |row| {
            Ok(MountRecord {
                id: row.get(0)?,
                session_id: row.get(1)?,
                mount_path: row.get(2)?,
                mount_type: row.get(3)?,
                config: parse_json(&row.get::<_, String>(4)?),
                created_at: parse_ts(&row.get::<_, String>(5)?),
            })
        })?;
        let mut mounts = Vec::new();
        for row in rows {
            mounts.push(row?);
        }
        Ok(mounts)
    }

    pub fn remove_mount(&self, session_id: &str, mount_path: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let removed = conn.execute(
            "DELETE FROM mounts WHERE session_id = ?1 AND mount_path = ?2",
            params![session_id, mount_path],
        )?;
        Ok(removed > 0)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Row mapping helpers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn apply_extras(
    conn: &Connection,
    id: &str,
    extras: &StatusExtras,
) -> std::result::Result<(), rusqlite::Error> {
    if let Some(response) = &extras.response {
        conn.execute(
            "UPDATE sessions SET response = ?1 WHERE id = ?2",
            params![response.to_string(), id],
        )?;
    }
    if let Some(count) = extras.event_count {
        conn.execute(
            "UPDATE sessions SET event_count = ?1 WHERE id = ?2",
            params![count, id],
        )?;
    }
    if let Some(error) = &extras.error {
        conn.execute(
            "UPDATE sessions SET error = ?1 WHERE id = ?2",
            params![error, id],
        )?;
    }
    if let Some(completed_at) = extras.completed_at {
        conn.execute(
            "UPDATE sessions SET completed_at = ?1 WHERE id = ?2",
            params![completed_at.map(|t| t.to_rfc3339()), id],
        )?;
    }
    Ok(())
}

fn row_to_event(row: &rusqlite::Row<'_>) -> rusqlite::Result<EventRow> {
    Ok(EventRow {
        id: row.get(0)?,
        session_id: row.get(1)?,
        kind: row.get(2)?,
        data: parse_json(&row.get::<_, String>(3)?),
        created_at: parse_ts(&row.get::<_, String>(4)?),
    })
}

fn row_to_session(row: &rusqlite::Row<'_>) -> rusqlite::Result<SessionRow> {
    Ok(SessionRow {
        id: row.get(0)?,
        initial_message: row.get(1)?,
        status: parse_status(&row.get::<_, String>(2)?),
        response: row
            .get::<_, Option<String>>(3)?
            .map(|s| parse_json(&s)),
        usage: row
            .get::<_, Option<String>>(4)?
            .and_then(|s| serde_json::from_str(&s).ok()),
        event_count: row.get(5)?,
        error: row.get(6)?,
        created_at: parse_ts(&row.get::<_, String>(7)?),
        updated_at: parse_ts(&row.get::<_, String>(8)?),
        completed_at: row
            .get::<_, Option<String>>(9)?
            .map(|s| parse_ts(&s)),
    })
}

fn parse_status(s: &str) -> SessionStatus {
    SessionStatus::parse(s).unwrap_or(SessionStatus::Error)
}

fn parse_json(s: &str) -> Value {
    serde_json::from_str(s).unwrap_or(Value::Null)
}

fn parse_ts(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> EventStore {
        EventStore::open_in_memory().unwrap()
    }

    fn seed_session(store: &EventStore, id: &str) {
        store
            .upsert_session(&SessionRow::new(id, "hello"))
            .unwrap();
    }

    #[test]
    fn append_returns_strictly_increasing_ids() {
        let store = store();
        seed_session(&store, "s1");
        let mut last = 0;
        for i in 0..10 {
            let id = store
                .append(
                    "s1",
                    &EventType::TurnStart,
                    &serde_json::json!({ "n": i }),
                )
                .unwrap();
            assert!(id > last, "id {id} not greater than {last}");
            last = id;
        }
    }

    #[test]
    fn list_events_cursor_is_exclusive() {
        let store = store();
        seed_session(&store, "s1");
        let first = store
            .append("s1", &EventType::AgentStart, &serde_json::json!({}))
            .unwrap();
        let second = store
            .append("s1", &EventType::AgentEnd, &serde_json::json!({}))
            .unwrap();

        let all = store.list_events("s1", None).unwrap();
        assert_eq!(all.len(), 2);

        // An event with id k is never returned by list(after_id = k).
        let after_first = store.list_events("s1", Some(first)).unwrap();
        assert_eq!(after_first.len(), 1);
        assert_eq!(after_first[0].id, second);

        let caught_up = store.list_events("s1", Some(second)).unwrap();
        assert!(caught_up.is_empty());
    }

    #[test]
    fn list_events_scoped_per_session() {
        let store = store();
        seed_session(&store, "a");
        seed_session(&store, "b");
        store
            .append("a", &EventType::AgentStart, &serde_json::json!({}))
            .unwrap();
        store
            .append("b", &EventType::AgentStart, &serde_json::json!({}))
            .unwrap();
        assert_eq!(store.list_events("a", None).unwrap().len(), 1);
        assert_eq!(store.list_events("b", None).unwrap().len(), 1);
    }

    #[test]
    fn session_round_trip() {
        let store = store();
        seed_session(&store, "s1");
        let row = store.get_session("s1").unwrap().unwrap();
        assert_eq!(row.id, "s1");
        assert_eq!(row.initial_message, "hello");
        assert_eq!(row.status, SessionStatus::Running);
        assert!(row.completed_at.is_none());

        assert!(store.get_session("ghost").unwrap().is_none());
    }

    #[test]
    fn set_status_applies_extras() {
        let store = store();
        seed_session(&store, "s1");
        store
            .set_status(
                "s1",
                SessionStatus::Completed,
                StatusExtras {
                    response: Some(serde_json::json!([{"role": "user"}])),
                    event_count: Some(7),
                    completed_at: Some(Some(Utc::now())),
                    ..Default::default()
                },
            )
            .unwrap();
        let row = store.get_session("s1").unwrap().unwrap();
        assert_eq!(row.status, SessionStatus::Completed);
        assert_eq!(row.event_count, 7);
        assert!(row.completed_at.is_some());
        assert!(row.response.is_some());
    }

    #[test]
    fn continuation_clears_completed_at() {
        let store = store();
        seed_session(&store, "s1");
        store
            .set_status(
                "s1",
                SessionStatus::Completed,
                StatusExtras {
                    completed_at: Some(Some(Utc::now())),
                    ..Default::default()
                },
            )
            .unwrap();
        store
            .set_status(
                "s1",
                SessionStatus::Running,
                StatusExtras {
                    completed_at: Some(None),
                    ..Default::default()
                },
            )
            .unwrap();
        let row = store.get_session("s1").unwrap().unwrap();
        assert_eq!(row.status, SessionStatus::Running);
        assert!(row.completed_at.is_none());
    }

    #[test]
    fn transition_from_running_is_single_winner() {
        let store = store();
        seed_session(&store, "s1");
        assert!(store
            .transition_from_running(
                "s1",
                SessionStatus::Completed,
                StatusExtras {
                    completed_at: Some(Some(Utc::now())),
                    ..Default::default()
                },
            )
            .unwrap());
        // A second terminator loses the race and must not overwrite.
        assert!(!store
            .transition_from_running(
                "s1",
                SessionStatus::Error,
                StatusExtras {
                    error: Some(Some("timed out".into())),
                    ..Default::default()
                },
            )
            .unwrap());
        let row = store.get_session("s1").unwrap().unwrap();
        assert_eq!(row.status, SessionStatus::Completed);
        assert!(row.error.is_none());
    }

    #[test]
    fn set_status_unknown_session_is_fatal() {
        let store = store();
        let err = store
            .set_status("ghost", SessionStatus::Error, StatusExtras::default())
            .unwrap_err();
        assert!(!err.is_transient());
    }

    #[test]
    fn add_usage_accumulates_across_turns() {
        let store = store();
        seed_session(&store, "s1");
        let turn = Usage {
            input_tokens: 10,
            output_tokens: 20,
            total_tokens: 30,
        };
        store.add_usage("s1", &turn).unwrap();
        store.add_usage("s1", &turn).unwrap();
        let row = store.get_session("s1").unwrap().unwrap();
        assert_eq!(row.usage.unwrap().total_tokens, 60);
    }

    #[test]
    fn list_sessions_newest_first_with_pagination() {
        let store = store();
        for i in 0..5 {
            seed_session(&store, &format!("s{i}"));
        }
        let page = store.list_sessions(2, 0).unwrap();
        assert_eq!(page.len(), 2);
        // Same created_at second is possible; ties break on rowid order.
        let rest = store.list_sessions(10, 2).unwrap();
        assert_eq!(rest.len(), 3);
    }

    #[test]
    fn purge_session_removes_everything() {
        let store = store();
        seed_session(&store, "s1");
        store
            .append("s1", &EventType::AgentStart, &serde_json::json!({}))
            .unwrap();
        store
            .add_mount("s1", "/repo", "git", &serde_json::json!({"url": "x"}))
            .unwrap();
        store
            .upsert_thread("t1", "s1", &serde_json::json!({}))
            .unwrap();

        assert!(store.purge_session("s1").unwrap());
        assert!(store.get_session("s1").unwrap().is_none());
        assert!(store.list_events("s1", None).unwrap().is_empty());
        assert!(store.list_mounts("s1").unwrap().is_empty());
        assert!(store.resolve_thread("t1").unwrap().is_none());

        assert!(!store.purge_session("s1").unwrap());
    }

    #[test]
    fn thread_mapping_upsert_and_resolve() {
        let store = store();
        seed_session(&store, "s1");
        store
            .upsert_thread("chan:42", "s1", &serde_json::json!({"platform": "irc"}))
            .unwrap();
        let mapping = store.resolve_thread("chan:42").unwrap().unwrap();
        assert_eq!(mapping.session_id, "s1");

        // Re-point the thread at another session.
        seed_session(&store, "s2");
        store
            .upsert_thread("chan:42", "s2", &serde_json::json!({}))
            .unwrap();
        let mapping = store.resolve_thread("chan:42").unwrap().unwrap();
        assert_eq!(mapping.session_id, "s2");
    }

    #[test]
    fn mounts_round_trip() {
        let store = store();
        seed_session(&store, "s1");
        store
            .add_mount("s1", "/work/repo", "git", &serde_json::json!({"url": "u"}))
            .unwrap();
        store
            .add_mount("s1", "/work/data", "blob", &serde_json::json!({}))
            .unwrap();
        let mounts = store.list_mounts("s1").unwrap();
        assert_eq!(mounts.len(), 2);
        assert_eq!(mounts[0].mount_path, "/work/repo");

        assert!(store.remove_mount("s1", "/work/repo").unwrap());
        assert_eq!(store.list_mounts("s1").unwrap().len(), 1);
        assert!(!store.remove_mount("s1", "/work/repo").unwrap());
    }

    #[test]
    fn append_touches_updated_at() {
        let store = store();
        seed_session(&store, "s1");
        let before = store.get_session("s1").unwrap().unwrap().updated_at;
        std::thread::sleep(std::time::Duration::from_millis(5));
        store
            .append("s1", &EventType::TurnStart, &serde_json::json!({}))
            .unwrap();
        let after = store.get_session("s1").unwrap().unwrap().updated_at;
        assert!(after > before);
    }

    #[test]
    fn unknown_event_type_string_survives_round_trip() {
        let store = store();
        seed_session(&store, "s1");
        store
            .append(
                "s1",
                &EventType::Other("future_event".into()),
                &serde_json::json!({"x": 1}),
            )
            .unwrap();
        let events = store.list_events("s1", None).unwrap();
        assert_eq!(events[0].kind, "future_event");
    }

    #[test]
    fn file_backed_store_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.db");
        {
            let store = EventStore::open(&path).unwrap();
            seed_session(&store, "s1");
            store
                .append("s1", &EventType::AgentStart, &serde_json::json!({}))
                .unwrap();
        }
        let store = EventStore::open(&path).unwrap();
        assert_eq!(store.list_events("s1", None).unwrap().len(), 1);
        assert!(store.get_session("s1").unwrap().is_some());
    }
}
