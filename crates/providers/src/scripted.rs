//! A deterministic in-memory model for tests.
//!
//! Turns are queued up front; each `chat_stream` call pops the next one and
//! replays its events, optionally pacing them so tests can interleave
//! cancellation. Every received request is recorded for assertions.

use std::collections::VecDeque;
use std::time::Duration;

use parking_lot::Mutex;

use tl_domain::error::{Error, Result};
use tl_domain::message::{ToolCall, Usage};
use tl_domain::stream::{BoxStream, StreamEvent};

use crate::traits::{ChatModel, ChatRequest};

/// One scripted model turn.
pub enum ScriptedTurn {
    /// Replay these events in order, sleeping `event_delay` before each.
    Stream {
        events: Vec<StreamEvent>,
        event_delay: Duration,
    },
    /// Fail the request before any event is produced.
    ConnectError(String),
}

impl ScriptedTurn {
    /// A plain assistant turn: one token chunk, then `Done`.
    pub fn text(text: impl Into<String>) -> Self {
        ScriptedTurn::Stream {
            events: vec![
                StreamEvent::Token { text: text.into() },
                StreamEvent::Done {
                    usage: Some(default_usage()),
                    finish_reason: Some("stop".into()),
                },
            ],
            event_delay: Duration::ZERO,
        }
    }

    /// An assistant turn that requests the given tool calls.
    pub fn tool_calls(text: impl Into<String>, calls: Vec<ToolCall>) -> Self {
        let mut events = Vec::new();
        let text = text.into();
        if !text.is_empty() {
            events.push(StreamEvent::Token { text });
        }
        for call in calls {
            events.push(StreamEvent::ToolCallStarted {
                call_id: call.call_id.clone(),
                tool_name: call.tool_name.clone(),
            });
            events.push(StreamEvent::ToolCallFinished {
                call_id: call.call_id,
                tool_name: call.tool_name,
                arguments: call.arguments,
            });
        }
        events.push(StreamEvent::Done {
            usage: Some(default_usage()),
            finish_reason: Some("tool_calls".into()),
        });
        ScriptedTurn::Stream {
            events,
            event_delay: Duration::ZERO,
        }
    }

    /// A turn that reports a provider error mid-stream.
    pub fn stream_error(message: impl Into<String>) -> Self {
        ScriptedTurn::Stream {
            events: vec![StreamEvent::Error {
                message: message.into(),
            }],
            event_delay: Duration::ZERO,
        }
    }

    /// Pace the turn's events for cancellation-interleaving tests.
    pub fn with_event_delay(self, delay: Duration) -> Self {
        match self {
            ScriptedTurn::Stream { events, .. } => ScriptedTurn::Stream {
                events,
                event_delay: delay,
            },
            other => other,
        }
    }
}

fn default_usage() -> Usage {
    Usage {
        input_tokens: 10,
        output_tokens: 4,
        total_tokens: 14,
    }
}

#[derive(Default)]
pub struct ScriptedModel {
    turns: Mutex<VecDeque<ScriptedTurn>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, turn: ScriptedTurn) {
        self.turns.lock().push_back(turn);
    }

    /// Requests seen so far, in call order.
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait::async_trait]
impl ChatModel for ScriptedModel {
    async fn chat_stream(
        &self,
        req: &ChatRequest,
    ) -> Result<BoxStream<'static, Result<StreamEvent>>> {
        self.requests.lock().push(req.clone());
        let turn = self
            .turns
            .lock()
            .pop_front()
            .ok_or_else(|| Error::Model("scripted model: no turns left".into()))?;

        match turn {
            ScriptedTurn::ConnectError(message) => Err(Error::Model(message)),
            ScriptedTurn::Stream {
                events,
                event_delay,
            } => {
                let stream = async_stream::stream! {
                    for event in events {
                        if !event_delay.is_zero() {
                            tokio::time::sleep(event_delay).await;
                        }
                        yield Ok(event);
                    }
                };
                Ok(Box::pin(stream))
            }
        }
    }

    fn model_id(&self) -> &str {
        "scripted"
    }
}
