use serde::Serialize;
use std::pin::Pin;

use crate::message::Usage;

/// A boxed async stream, used for model streaming responses.
pub type BoxStream<'a, T> = Pin<Box<dyn futures_core::Stream<Item = T> + Send + 'a>>;

/// Events emitted while streaming one model turn (provider-agnostic).
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// A text token chunk.
    Token { text: String },

    /// Reasoning/thinking content.
    Reasoning { text: String },

    /// A tool call has started.
    ToolCallStarted { call_id: String, tool_name: String },

    /// Incremental tool call argument data.
    ToolCallDelta { call_id: String, delta: String },

    /// A tool call is complete with full arguments.
    ToolCallFinished {
        call_id: String,
        tool_name: String,
        arguments: serde_json::Value,
    },

    /// Stream is finished.
    Done {
        usage: Option<Usage>,
        finish_reason: Option<String>,
    },

    /// The provider reported an error mid-stream.
    Error { message: String },
}
