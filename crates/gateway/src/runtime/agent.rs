//! The agent loop — the model↔tool state machine.
//!
//! One [`Agent`] drives one prompt to termination: call the model, stream
//! the assistant message, dispatch any tool calls, append the results, and
//! go again until the model answers without tool calls or the run is
//! aborted. Listeners observe every lifecycle event; the orchestrator's
//! listener forwards the durable ones into the event queue.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures_util::StreamExt;
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;

use tl_domain::cancel::CancelToken;
use tl_domain::error::{Error, Result};
use tl_domain::event::{
    EventType, MessagePayload, ToolEndPayload, ToolStartPayload, TurnEndPayload,
};
use tl_domain::message::{ContentBlock, Message, ToolCall, Usage};
use tl_domain::stream::StreamEvent;
use tl_providers::{ChatModel, ChatRequest};
use tl_tools::{ToolContext, ToolExecutor};

/// Cap on model turns per prompt; hitting it is a model failure.
const MAX_TURNS: usize = 32;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// AgentEvent
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Lifecycle events emitted while a prompt runs.
///
/// `MessageStart` and `MessageUpdate` are transient: they feed live UIs and
/// never reach the event log.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    AgentStart,
    TurnStart,
    MessageStart,
    MessageUpdate {
        delta: String,
    },
    MessageEnd {
        message: Message,
    },
    ToolExecutionStart {
        tool_name: String,
        call_id: String,
        arguments: Value,
    },
    ToolExecutionEnd {
        tool_name: String,
        call_id: String,
        is_error: bool,
        result: Message,
    },
    TurnEnd {
        message: Message,
        tool_results: Vec<Message>,
    },
    AgentEnd,
}

impl AgentEvent {
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            AgentEvent::MessageStart | AgentEvent::MessageUpdate { .. }
        )
    }

    /// The log record for this event, or `None` for transient events.
    pub fn to_record(&self) -> Option<(EventType, Value)> {
        let empty = || serde_json::json!({});
        match self {
            AgentEvent::MessageStart | AgentEvent::MessageUpdate { .. } => None,
            AgentEvent::AgentStart => Some((EventType::AgentStart, empty())),
            AgentEvent::TurnStart => Some((EventType::TurnStart, empty())),
            AgentEvent::AgentEnd => Some((EventType::AgentEnd, empty())),
            AgentEvent::MessageEnd { message } => Some((
                EventType::MessageEnd,
                serde_json::to_value(MessagePayload {
                    message: message.clone(),
                })
                .unwrap_or_default(),
            )),
            AgentEvent::ToolExecutionStart {
                tool_name,
                call_id,
                arguments,
            } => Some((
                EventType::ToolExecutionStart,
                serde_json::to_value(ToolStartPayload {
                    tool_name: tool_name.clone(),
                    call_id: call_id.clone(),
                    arguments: arguments.clone(),
                })
                .unwrap_or_default(),
            )),
            AgentEvent::ToolExecutionEnd {
                tool_name,
                call_id,
                is_error,
                result,
            } => Some((
                EventType::ToolExecutionEnd,
                serde_json::to_value(ToolEndPayload {
                    tool_name: tool_name.clone(),
                    call_id: call_id.clone(),
                    is_error: *is_error,
                    result: result.clone(),
                })
                .unwrap_or_default(),
            )),
            AgentEvent::TurnEnd {
                message,
                tool_results,
            } => Some((
                EventType::TurnEnd,
                serde_json::to_value(TurnEndPayload {
                    message: message.clone(),
                    tool_results: tool_results.clone(),
                })
                .unwrap_or_default(),
            )),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Agent
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub type Listener = Box<dyn Fn(&AgentEvent) + Send + Sync>;

/// Display-only history transformation applied right before the model call
/// (e.g. folding speaker prefixes into the text). Persisted state is never
/// touched.
pub type ConvertToLlm = Box<dyn Fn(&[Message]) -> Vec<Message> + Send + Sync>;

pub struct AgentConfig {
    pub system_prompt: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

pub struct Agent {
    provider: Arc<dyn ChatModel>,
    executor: ToolExecutor,
    tool_ctx: ToolContext,
    config: AgentConfig,
    messages: Mutex<Vec<Message>>,
    listeners: Mutex<Vec<(u64, Listener)>>,
    next_listener_id: AtomicU64,
    cancel: CancelToken,
    convert_to_llm: Option<ConvertToLlm>,
    usage: Mutex<Usage>,
}

impl Agent {
    pub fn new(
        provider: Arc<dyn ChatModel>,
        executor: ToolExecutor,
        tool_ctx: ToolContext,
        config: AgentConfig,
        cancel: CancelToken,
        convert_to_llm: Option<ConvertToLlm>,
    ) -> Self {
        Self {
            provider,
            executor,
            tool_ctx,
            config,
            messages: Mutex::new(Vec::new()),
            listeners: Mutex::new(Vec::new()),
            next_listener_id: AtomicU64::new(1),
            cancel,
            convert_to_llm,
            usage: Mutex::new(Usage::default()),
        }
    }

    /// Register a listener; invoked synchronously, in registration order,
    /// at every emission. Returns an id for [`Agent::unsubscribe`].
    pub fn subscribe(&self, listener: Listener) -> u64 {
        let id = self.next_listener_id.fetch_add(1, Ordering::Relaxed);
        self.listeners.lock().push((id, listener));
        id
    }

    pub fn unsubscribe(&self, id: u64) {
        self.listeners.lock().retain(|(lid, _)| *lid != id);
    }

    /// Idempotent. The loop exits at its next check; in-flight model and
    /// tool calls receive the cancel signal.
    pub fn abort(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Whole-history replacement, used when reconstructing from the log.
    pub fn replace_messages(&self, messages: Vec<Message>) {
        *self.messages.lock() = messages;
    }

    pub fn messages(&self) -> Vec<Message> {
        self.messages.lock().clone()
    }

    /// Token counters summed over every turn of this run.
    pub fn total_usage(&self) -> Usage {
        *self.usage.lock()
    }

    fn emit(&self, event: AgentEvent) {
        let listeners = self.listeners.lock();
        for (_, listener) in listeners.iter() {
            listener(&event);
        }
    }

    /// Append the user message and drive turns until the model answers
    /// without tool calls, the run is aborted, or the model fails.
    pub async fn prompt(&self, message: Message) -> Result<()> {
        self.emit(AgentEvent::AgentStart);
        self.messages.lock().push(message);

        for turn in 0..MAX_TURNS {
            if self.cancel.is_cancelled() {
                self.emit(AgentEvent::AgentEnd);
                return Ok(());
            }

            self.emit(AgentEvent::TurnStart);
            tracing::debug!(turn, "model turn starting");

            let Some(assistant) = self.stream_one_turn().await? else {
                // Cancelled mid-stream; nothing durable was emitted.
                self.emit(AgentEvent::AgentEnd);
                return Ok(());
            };

            self.emit(AgentEvent::MessageEnd {
                message: assistant.clone(),
            });
            self.messages.lock().push(assistant.clone());

            let calls = assistant.tool_calls();
            if calls.is_empty() {
                self.emit(AgentEvent::TurnEnd {
                    message: assistant,
                    tool_results: Vec::new(),
                });
                self.emit(AgentEvent::AgentEnd);
                return Ok(());
            }

            // Dispatch serially, in the order of the tool_call blocks;
            // turn_end.tool_results must match that order for replay.
            let mut tool_results = Vec::with_capacity(calls.len());
            for call in &calls {
                if self.cancel.is_cancelled() {
                    self.emit(AgentEvent::AgentEnd);
                    return Ok(());
                }

                self.emit(AgentEvent::ToolExecutionStart {
                    tool_name: call.tool_name.clone(),
                    call_id: call.call_id.clone(),
                    arguments: call.arguments.clone(),
                });

                let result = self
                    .executor
                    .invoke(
                        &call.tool_name,
                        &call.call_id,
                        call.arguments.clone(),
                        &self.tool_ctx,
                    )
                    .await;
                let is_error = matches!(&result, Message::ToolResult { is_error: true, .. });

                self.emit(AgentEvent::ToolExecutionEnd {
                    tool_name: call.tool_name.clone(),
                    call_id: call.call_id.clone(),
                    is_error,
                    result: result.clone(),
                });
                tool_results.push(result);
            }

            self.messages.lock().extend(tool_results.iter().cloned());
            self.emit(AgentEvent::TurnEnd {
                message: assistant,
                tool_results,
            });
        }

        Err(Error::Model(format!("turn limit reached ({MAX_TURNS})")))
    }

    /// Run one model call to completion. Returns the assembled assistant
    /// message, or `None` if the run was cancelled mid-stream.
    async fn stream_one_turn(&self) -> Result<Option<Message>> {
        let history = {
            let messages = self.messages.lock();
            match &self.convert_to_llm {
                Some(convert) => convert(&messages),
                None => messages.clone(),
            }
        };
        let req = ChatRequest {
            system_prompt: self.config.system_prompt.clone(),
            messages: history,
            tools: self.executor.definitions(),
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };

        let mut stream = self.provider.chat_stream(&req).await?;

        let mut text = String::new();
        let mut reasoning = String::new();
        let mut finished_calls: Vec<ToolCall> = Vec::new();
        let mut partial_calls: Vec<(String, String, String)> = Vec::new(); // (call_id, name, args)
        let mut turn_usage: Option<Usage> = None;
        let mut started = false;

        loop {
            let event = tokio::select! {
                _ = self.cancel.cancelled() => return Ok(None),
                next = stream.next() => match next {
                    Some(event) => event?,
                    None => break,
                },
            };

            match event {
                StreamEvent::Token { text: chunk } => {
                    if !started {
                        started = true;
                        self.emit(AgentEvent::MessageStart);
                    }
                    self.emit(AgentEvent::MessageUpdate {
                        delta: chunk.clone(),
                    });
                    text.push_str(&chunk);
                }
                StreamEvent::Reasoning { text: chunk } => {
                    if !started {
                        started = true;
                        self.emit(AgentEvent::MessageStart);
                    }
                    reasoning.push_str(&chunk);
                }
                StreamEvent::ToolCallStarted { call_id, tool_name } => {
                    partial_calls.push((call_id, tool_name, String::new()));
                }
                StreamEvent::ToolCallDelta { call_id, delta } => {
                    if let Some((_, _, args)) =
                        partial_calls.iter_mut().find(|(id, _, _)| *id == call_id)
                    {
                        args.push_str(&delta);
                    }
                }
                StreamEvent::ToolCallFinished {
                    call_id,
                    tool_name,
                    arguments,
                } => {
                    partial_calls.retain(|(id, _, _)| *id != call_id);
                    finished_calls.push(ToolCall {
                        call_id,
                        tool_name,
                        arguments,
                    });
                }
                StreamEvent::Done { usage, .. } => {
                    turn_usage = usage;
                }
                StreamEvent::Error { message } => {
                    return Err(Error::Model(message));
                }
            }
        }

        // Some providers only stream start+delta; assemble the leftovers.
        for (call_id, tool_name, args) in partial_calls.drain(..) {
            let arguments = if args.trim().is_empty() {
                Value::Object(Default::default())
            } else {
                serde_json::from_str(&args).unwrap_or_else(|e| {
                    tracing::warn!(
                        call_id = %call_id,
                        tool = %tool_name,
                        error = %e,
                        "tool call arguments are not valid JSON; defaulting to empty object"
                    );
                    Value::Object(Default::default())
                })
            };
            finished_calls.push(ToolCall {
                call_id,
                tool_name,
                arguments,
            });
        }

        if let Some(usage) = &turn_usage {
            self.usage.lock().add(usage);
        }

        let mut content = Vec::new();
        if !reasoning.is_empty() {
            content.push(ContentBlock::Reasoning { text: reasoning });
        }
        if !text.is_empty() {
            content.push(ContentBlock::Text { text });
        }
        for call in finished_calls {
            content.push(ContentBlock::ToolCall {
                call_id: call.call_id,
                tool_name: call.tool_name,
                arguments: call.arguments,
            });
        }

        Ok(Some(Message::Assistant {
            content,
            timestamp: Some(chrono::Utc::now()),
            usage: turn_usage,
        }))
    }
}
