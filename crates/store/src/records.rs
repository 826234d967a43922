//! Row types for the relational store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use tl_domain::message::Usage;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Session status
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Running,
    Completed,
    Error,
}

impl SessionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionStatus::Running => "running",
            SessionStatus::Completed => "completed",
            SessionStatus::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "running" => Some(SessionStatus::Running),
            "completed" => Some(SessionStatus::Completed),
            "error" => Some(SessionStatus::Error),
            _ => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, SessionStatus::Running)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Rows
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A session's mutable lifecycle row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRow {
    pub id: String,
    pub initial_message: String,
    pub status: SessionStatus,
    /// Serialized final message history of the last completed turn.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<Value>,
    /// Aggregate token counters, summed over all turns.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
    pub event_count: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl SessionRow {
    /// A fresh `running` session.
    pub fn new(id: impl Into<String>, initial_message: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            initial_message: initial_message.into(),
            status: SessionStatus::Running,
            response: None,
            usage: None,
            event_count: 0,
            error: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }
}

/// One appended event. `id` is the global monotonic cursor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRow {
    pub id: i64,
    pub session_id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub data: Value,
    pub created_at: DateTime<Utc>,
}

/// Session listing shape for the sessions index endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: String,
    pub initial_message: String,
    pub status: SessionStatus,
    pub event_count: i64,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

/// Chat-platform thread → session mapping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadMapping {
    pub thread_key: String,
    pub session_id: String,
    /// Opaque context keys supplied by the front-end connector.
    pub context: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A tool-owned mount to restore at session activation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MountRecord {
    pub id: i64,
    pub session_id: String,
    pub mount_path: String,
    pub mount_type: String,
    pub config: Value,
    pub created_at: DateTime<Utc>,
}

/// Optional fields applied together with a status transition.
///
/// Two-level `Option`s distinguish "leave untouched" (`None`) from
/// "clear" (`Some(None)`) and "set" (`Some(Some(_))`).
#[derive(Debug, Clone, Default)]
pub struct StatusExtras {
    pub response: Option<Value>,
    pub event_count: Option<i64>,
    pub error: Option<Option<String>>,
    pub completed_at: Option<Option<DateTime<Utc>>>,
}
