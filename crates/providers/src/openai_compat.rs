//! OpenAI-compatible adapter.
//!
//! Works with OpenAI, Ollama, vLLM, LM Studio, and any other endpoint that
//! follows the OpenAI chat completions contract.

use serde_json::Value;

use tl_domain::config::ModelConfig;
use tl_domain::error::{Error, Result};
use tl_domain::message::{ContentBlock, Message, ToolDefinition, Usage};
use tl_domain::stream::{BoxStream, StreamEvent};

use crate::from_reqwest;
use crate::sse::event_stream;
use crate::traits::{ChatModel, ChatRequest};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Adapter struct
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct OpenAiCompatModel {
    base_url: String,
    api_key: String,
    model: String,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
    client: reqwest::Client,
}

impl OpenAiCompatModel {
    /// Build the adapter from config, reading the credential from the
    /// environment variable the config names. A missing credential is a
    /// `NotConfigured` error — callers refuse the turn before creating a
    /// session.
    pub fn from_config(cfg: &ModelConfig) -> Result<Self> {
        let api_key = std::env::var(&cfg.api_key_env)
            .ok()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| Error::NotConfigured(format!("{} is unset", cfg.api_key_env)))?;

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(cfg.request_timeout_sec))
            .build()
            .map_err(from_reqwest)?;

        Ok(Self {
            base_url: cfg.base_url.trim_end_matches('/').to_owned(),
            api_key,
            model: cfg.model.clone(),
            temperature: cfg.temperature,
            max_tokens: cfg.max_tokens,
            client,
        })
    }

    fn build_body(&self, req: &ChatRequest) -> Value {
        let mut messages = Vec::with_capacity(req.messages.len() + 1);
        if !req.system_prompt.is_empty() {
            messages.push(serde_json::json!({
                "role": "system",
                "content": req.system_prompt,
            }));
        }
        messages.extend(req.messages.iter().map(message_to_wire));

        let mut body = serde_json::json!({
            "model": self.model,
            "messages": messages,
            "stream": true,
            "stream_options": { "include_usage": true },
        });
        if !req.tools.is_empty() {
            body["tools"] = Value::Array(req.tools.iter().map(tool_to_wire).collect());
        }
        if let Some(temp) = req.temperature.or(self.temperature) {
            body["temperature"] = serde_json::json!(temp);
        }
        if let Some(max) = req.max_tokens.or(self.max_tokens) {
            body["max_tokens"] = serde_json::json!(max);
        }
        body
    }
}

#[async_trait::async_trait]
impl ChatModel for OpenAiCompatModel {
    async fn chat_stream(
        &self,
        req: &ChatRequest,
    ) -> Result<BoxStream<'static, Result<StreamEvent>>> {
        let url = format!("{}/chat/completions", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&self.build_body(req))
            .send()
            .await
            .map_err(from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Model(format!("{status}: {body}")));
        }

        let mut state = StreamState::default();
        Ok(event_stream(response, move |payload| {
            state.parse(payload)
        }))
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Message serialization
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn message_to_wire(msg: &Message) -> Value {
    match msg {
        Message::User { .. } => serde_json::json!({
            "role": "user",
            "content": msg.text(),
        }),
        Message::Assistant { content, .. } => {
            let text = msg.text();
            let tool_calls: Vec<Value> = content
                .iter()
                .filter_map(|block| match block {
                    ContentBlock::ToolCall {
                        call_id,
                        tool_name,
                        arguments,
                    } => Some(serde_json::json!({
                        "id": call_id,
                        "type": "function",
                        "function": {
                            "name": tool_name,
                            "arguments": arguments.to_string(),
                        },
                    })),
                    _ => None,
                })
                .collect();

            let mut obj = serde_json::json!({ "role": "assistant" });
            obj["content"] = if text.is_empty() {
                Value::Null
            } else {
                Value::String(text)
            };
            if !tool_calls.is_empty() {
                obj["tool_calls"] = Value::Array(tool_calls);
            }
            obj
        }
        Message::ToolResult { call_id, .. } => serde_json::json!({
            "role": "tool",
            "tool_call_id": call_id,
            "content": msg.text(),
        }),
    }
}

fn tool_to_wire(def: &ToolDefinition) -> Value {
    serde_json::json!({
        "type": "function",
        "function": {
            "name": def.name,
            "description": def.description,
            "parameters": def.parameters,
        },
    })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Stream parsing
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Tool-call fragments are keyed by chunk `index` and assembled across
/// deltas; complete calls are flushed as `ToolCallFinished` at `[DONE]`.
#[derive(Default)]
struct StreamState {
    calls: Vec<PartialCall>,
    usage: Option<Usage>,
    finish_reason: Option<String>,
}

struct PartialCall {
    index: u64,
    call_id: String,
    tool_name: String,
    arguments: String,
}

impl StreamState {
    fn parse(&mut self, payload: &str) -> Vec<Result<StreamEvent>> {
        if payload == "[DONE]" {
            let mut events = self.flush_calls();
            events.push(Ok(StreamEvent::Done {
                usage: self.usage.take(),
                finish_reason: self.finish_reason.take(),
            }));
            return events;
        }

        let chunk: Value = match serde_json::from_str(payload) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(error = %e, "skipping malformed stream chunk");
                return Vec::new();
            }
        };

        if let Some(err) = chunk.get("error") {
            let message = err
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("provider error")
                .to_owned();
            return vec![Ok(StreamEvent::Error { message })];
        }

        if let Some(usage) = chunk.get("usage").filter(|u| !u.is_null()) {
            self.usage = Some(Usage {
                input_tokens: usage["prompt_tokens"].as_u64().unwrap_or(0) as u32,
                output_tokens: usage["completion_tokens"].as_u64().unwrap_or(0) as u32,
                total_tokens: usage["total_tokens"].as_u64().unwrap_or(0) as u32,
            });
        }

        let mut events = Vec::new();
        let Some(choice) = chunk["choices"].get(0) else {
            return events;
        };

        if let Some(reason) = choice["finish_reason"].as_str() {
            self.finish_reason = Some(reason.to_owned());
        }

        let delta = &choice["delta"];
        if let Some(text) = delta["reasoning_content"].as_str() {
            if !text.is_empty() {
                events.push(Ok(StreamEvent::Reasoning { text: text.into() }));
            }
        }
        if let Some(text) = delta["content"].as_str() {
            if !text.is_empty() {
                events.push(Ok(StreamEvent::Token { text: text.into() }));
            }
        }

        if let Some(tool_calls) = delta["tool_calls"].as_array() {
            for tc in tool_calls {
                let index = tc["index"].as_u64().unwrap_or(0);
                if let Some(id) = tc["id"].as_str() {
                    let tool_name = tc["function"]["name"].as_str().unwrap_or("").to_owned();
                    events.push(Ok(StreamEvent::ToolCallStarted {
                        call_id: id.to_owned(),
                        tool_name: tool_name.clone(),
                    }));
                    self.calls.push(PartialCall {
                        index,
                        call_id: id.to_owned(),
                        tool_name,
                        arguments: String::new(),
                    });
                }
                if let Some(fragment) = tc["function"]["arguments"].as_str() {
                    if let Some(call) = self.calls.iter_mut().find(|c| c.index == index) {
                        call.arguments.push_str(fragment);
                        events.push(Ok(StreamEvent::ToolCallDelta {
                            call_id: call.call_id.clone(),
                            delta: fragment.to_owned(),
                        }));
                    }
                }
            }
        }

        events
    }

    fn flush_calls(&mut self) -> Vec<Result<StreamEvent>> {
        self.calls
            .drain(..)
            .map(|call| {
                let arguments = if call.arguments.trim().is_empty() {
                    Value::Object(Default::default())
                } else {
                    serde_json::from_str(&call.arguments).unwrap_or_else(|e| {
                        tracing::warn!(
                            call_id = %call.call_id,
                            tool = %call.tool_name,
                            error = %e,
                            "tool call arguments are not valid JSON; defaulting to empty object"
                        );
                        Value::Object(Default::default())
                    })
                };
                Ok(StreamEvent::ToolCallFinished {
                    call_id: call.call_id,
                    tool_name: call.tool_name,
                    arguments,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(events: &[Result<StreamEvent>]) -> Vec<String> {
        events
            .iter()
            .filter_map(|e| match e {
                Ok(StreamEvent::Token { text }) => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn content_deltas_become_tokens() {
        let mut state = StreamState::default();
        let events =
            state.parse(r#"{"choices":[{"delta":{"content":"hel"},"finish_reason":null}]}"#);
        assert_eq!(texts(&events), vec!["hel"]);
    }

    #[test]
    fn tool_call_assembled_across_chunks() {
        let mut state = StreamState::default();
        let started = state.parse(
            r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"id":"c1","function":{"name":"shell","arguments":""}}]}}]}"#,
        );
        assert!(matches!(
            started[0],
            Ok(StreamEvent::ToolCallStarted { ref call_id, .. }) if call_id == "c1"
        ));

        state.parse(
            r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"function":{"arguments":"{\"command\":"}}]}}]}"#,
        );
        state.parse(
            r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"function":{"arguments":"\"ls\"}"}}]}}]}"#,
        );

        let done = state.parse("[DONE]");
        assert_eq!(done.len(), 2);
        match &done[0] {
            Ok(StreamEvent::ToolCallFinished {
                call_id,
                tool_name,
                arguments,
            }) => {
                assert_eq!(call_id, "c1");
                assert_eq!(tool_name, "shell");
                assert_eq!(arguments["command"], "ls");
            }
            other => panic!("expected ToolCallFinished, got {other:?}"),
        }
        assert!(matches!(done[1], Ok(StreamEvent::Done { .. })));
    }

    #[test]
    fn usage_carried_into_done() {
        let mut state = StreamState::default();
        state.parse(
            r#"{"choices":[],"usage":{"prompt_tokens":5,"completion_tokens":7,"total_tokens":12}}"#,
        );
        let done = state.parse("[DONE]");
        match &done[0] {
            Ok(StreamEvent::Done { usage, .. }) => {
                let usage = usage.as_ref().unwrap();
                assert_eq!(usage.input_tokens, 5);
                assert_eq!(usage.output_tokens, 7);
                assert_eq!(usage.total_tokens, 12);
            }
            other => panic!("expected Done, got {other:?}"),
        }
    }

    #[test]
    fn invalid_tool_arguments_default_to_empty_object() {
        let mut state = StreamState::default();
        state.parse(
            r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"id":"c1","function":{"name":"shell","arguments":"not json"}}]}}]}"#,
        );
        let done = state.parse("[DONE]");
        match &done[0] {
            Ok(StreamEvent::ToolCallFinished { arguments, .. }) => {
                assert_eq!(arguments, &serde_json::json!({}));
            }
            other => panic!("expected ToolCallFinished, got {other:?}"),
        }
    }

    #[test]
    fn provider_error_chunk_becomes_error_event() {
        let mut state = StreamState::default();
        let events = state.parse(r#"{"error":{"message":"rate limited"}}"#);
        assert!(matches!(
            events[0],
            Ok(StreamEvent::Error { ref message }) if message == "rate limited"
        ));
    }

    #[test]
    fn malformed_chunk_is_skipped() {
        let mut state = StreamState::default();
        assert!(state.parse("{not json").is_empty());
    }

    #[test]
    fn assistant_message_serializes_tool_calls() {
        let msg = Message::Assistant {
            content: vec![
                ContentBlock::Text { text: "on it".into() },
                ContentBlock::ToolCall {
                    call_id: "c1".into(),
                    tool_name: "shell".into(),
                    arguments: serde_json::json!({"command": "ls"}),
                },
            ],
            timestamp: None,
            usage: None,
        };
        let wire = message_to_wire(&msg);
        assert_eq!(wire["role"], "assistant");
        assert_eq!(wire["content"], "on it");
        assert_eq!(wire["tool_calls"][0]["id"], "c1");
        assert_eq!(wire["tool_calls"][0]["function"]["name"], "shell");
    }

    #[test]
    fn tool_result_message_serializes_with_call_id() {
        let msg = Message::tool_result_text("c1", "shell", "output", false);
        let wire = message_to_wire(&msg);
        assert_eq!(wire["role"], "tool");
        assert_eq!(wire["tool_call_id"], "c1");
        assert_eq!(wire["content"], "output");
    }
}
