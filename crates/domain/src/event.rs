//! The persisted event taxonomy.
//!
//! Every record in the event log has a `type` drawn from [`EventType`] and a
//! structured `data` payload. Readers must tolerate type strings they do not
//! know; the parser maps those to [`EventType::Other`], which replay ignores.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::message::Message;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventType {
    UserMessage,
    AgentStart,
    TurnStart,
    MessageEnd,
    ToolExecutionStart,
    ToolExecutionUpdate,
    ToolExecutionEnd,
    TurnEnd,
    AgentEnd,
    ArtifactUpdate,
    SessionComplete,
    SessionError,
    SessionAborted,
    /// Unknown type, carried verbatim for forward compatibility.
    Other(String),
}

impl EventType {
    pub fn as_str(&self) -> &str {
        match self {
            EventType::UserMessage => "user_message",
            EventType::AgentStart => "agent_start",
            EventType::TurnStart => "turn_start",
            EventType::MessageEnd => "message_end",
            EventType::ToolExecutionStart => "tool_execution_start",
            EventType::ToolExecutionUpdate => "tool_execution_update",
            EventType::ToolExecutionEnd => "tool_execution_end",
            EventType::TurnEnd => "turn_end",
            EventType::AgentEnd => "agent_end",
            EventType::ArtifactUpdate => "artifact_update",
            EventType::SessionComplete => "session_complete",
            EventType::SessionError => "session_error",
            EventType::SessionAborted => "session_aborted",
            EventType::Other(s) => s.as_str(),
        }
    }

    /// True for the single trailing event of a terminal session.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            EventType::SessionComplete | EventType::SessionError | EventType::SessionAborted
        )
    }
}

impl From<&str> for EventType {
    fn from(s: &str) -> Self {
        match s {
            "user_message" => EventType::UserMessage,
            "agent_start" => EventType::AgentStart,
            "turn_start" => EventType::TurnStart,
            "message_end" => EventType::MessageEnd,
            "tool_execution_start" => EventType::ToolExecutionStart,
            "tool_execution_update" => EventType::ToolExecutionUpdate,
            "tool_execution_end" => EventType::ToolExecutionEnd,
            "turn_end" => EventType::TurnEnd,
            "agent_end" => EventType::AgentEnd,
            "artifact_update" => EventType::ArtifactUpdate,
            "session_complete" => EventType::SessionComplete,
            "session_error" => EventType::SessionError,
            "session_aborted" => EventType::SessionAborted,
            other => EventType::Other(other.to_owned()),
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Typed payloads
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Payload of `user_message` and `message_end` events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagePayload {
    pub message: Message,
}

/// Payload of `turn_end`: the assistant message that closed the turn plus
/// its tool results in tool_call order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnEndPayload {
    pub message: Message,
    pub tool_results: Vec<Message>,
}

/// Payload of `tool_execution_start`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolStartPayload {
    pub tool_name: String,
    pub call_id: String,
    pub arguments: Value,
}

/// Payload of `tool_execution_end`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolEndPayload {
    pub tool_name: String,
    pub call_id: String,
    pub is_error: bool,
    pub result: Message,
}

/// Payload of `session_error` and `session_aborted`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerminalPayload {
    pub message: String,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Event sink
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Ordered, best-effort destination for log events.
///
/// The per-run event queue implements this; tools receive it so they can
/// emit `artifact_update` records through the same serialized path as the
/// agent loop.
pub trait EventSink: Send + Sync {
    fn emit(&self, kind: EventType, data: Value);
}

/// A sink that drops everything. Used where no log is attached.
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _kind: EventType, _data: Value) {}
}
