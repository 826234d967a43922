use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Internal tool call format (provider-agnostic).
/// Every adapter converts provider-specific tool calls to/from this.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub call_id: String,
    pub tool_name: String,
    pub arguments: Value,
}

/// Tool definition exposed to the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON Schema for the tool's parameters.
    pub parameters: Value,
}

/// Aggregate token counters for a model turn or a whole session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub total_tokens: u32,
}

impl Usage {
    /// Accumulate another usage sample into this one.
    pub fn add(&mut self, other: &Usage) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
        self.total_tokens += other.total_tokens;
    }
}

/// One block of message content.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    ToolCall {
        call_id: String,
        tool_name: String,
        arguments: Value,
    },
    Image {
        url: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        media_type: Option<String>,
    },
    Reasoning {
        text: String,
    },
}

/// A message in the conversation, tagged by role.
///
/// `prefix` on user messages is a display-only speaker tag; it reaches the
/// model only through the orchestrator's `convert_to_llm` hook.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Message {
    User {
        content: Vec<ContentBlock>,
        #[serde(skip_serializing_if = "Option::is_none")]
        timestamp: Option<DateTime<Utc>>,
        #[serde(skip_serializing_if = "Option::is_none")]
        prefix: Option<String>,
    },
    Assistant {
        content: Vec<ContentBlock>,
        #[serde(skip_serializing_if = "Option::is_none")]
        timestamp: Option<DateTime<Utc>>,
        #[serde(skip_serializing_if = "Option::is_none")]
        usage: Option<Usage>,
    },
    ToolResult {
        call_id: String,
        tool_name: String,
        content: Vec<ContentBlock>,
        #[serde(default)]
        is_error: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        timestamp: Option<DateTime<Utc>>,
    },
}

// ── Convenience constructors ───────────────────────────────────────

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Message::User {
            content: vec![ContentBlock::Text { text: text.into() }],
            timestamp: Some(Utc::now()),
            prefix: None,
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Message::Assistant {
            content: vec![ContentBlock::Text { text: text.into() }],
            timestamp: Some(Utc::now()),
            usage: None,
        }
    }

    pub fn tool_result(
        call_id: impl Into<String>,
        tool_name: impl Into<String>,
        content: Vec<ContentBlock>,
        is_error: bool,
    ) -> Self {
        Message::ToolResult {
            call_id: call_id.into(),
            tool_name: tool_name.into(),
            content,
            is_error,
            timestamp: Some(Utc::now()),
        }
    }

    /// A tool_result carrying a single text block.
    pub fn tool_result_text(
        call_id: impl Into<String>,
        tool_name: impl Into<String>,
        text: impl Into<String>,
        is_error: bool,
    ) -> Self {
        Self::tool_result(
            call_id,
            tool_name,
            vec![ContentBlock::Text { text: text.into() }],
            is_error,
        )
    }

    pub fn role(&self) -> &'static str {
        match self {
            Message::User { .. } => "user",
            Message::Assistant { .. } => "assistant",
            Message::ToolResult { .. } => "tool_result",
        }
    }

    pub fn content(&self) -> &[ContentBlock] {
        match self {
            Message::User { content, .. }
            | Message::Assistant { content, .. }
            | Message::ToolResult { content, .. } => content,
        }
    }

    /// Join all text blocks, skipping non-text content.
    pub fn text(&self) -> String {
        self.content()
            .iter()
            .filter_map(|b| match b {
                ContentBlock::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Tool calls carried by this message, in content order.
    pub fn tool_calls(&self) -> Vec<ToolCall> {
        self.content()
            .iter()
            .filter_map(|b| match b {
                ContentBlock::ToolCall {
                    call_id,
                    tool_name,
                    arguments,
                } => Some(ToolCall {
                    call_id: call_id.clone(),
                    tool_name: tool_name.clone(),
                    arguments: arguments.clone(),
                }),
                _ => None,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_tag_round_trips() {
        let msg = Message::user("hello");
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["role"], "user");
        let back: Message = serde_json::from_value(json).unwrap();
        assert_eq!(back.text(), "hello");
    }

    #[test]
    fn tool_calls_preserve_content_order() {
        let msg = Message::Assistant {
            content: vec![
                ContentBlock::Text {
                    text: "working".into(),
                },
                ContentBlock::ToolCall {
                    call_id: "c1".into(),
                    tool_name: "shell".into(),
                    arguments: serde_json::json!({"command": "ls"}),
                },
                ContentBlock::ToolCall {
                    call_id: "c2".into(),
                    tool_name: "http_fetch".into(),
                    arguments: serde_json::json!({"url": "https://example.com"}),
                },
            ],
            timestamp: None,
            usage: None,
        };
        let calls = msg.tool_calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].call_id, "c1");
        assert_eq!(calls[1].call_id, "c2");
    }

    #[test]
    fn text_skips_non_text_blocks() {
        let msg = Message::Assistant {
            content: vec![
                ContentBlock::Reasoning {
                    text: "hmm".into(),
                },
                ContentBlock::Text { text: "one".into() },
                ContentBlock::Text { text: "two".into() },
            ],
            timestamp: None,
            usage: None,
        };
        assert_eq!(msg.text(), "one\ntwo");
    }

    #[test]
    fn tool_result_is_error_defaults_false() {
        let json = serde_json::json!({
            "role": "tool_result",
            "call_id": "c1",
            "tool_name": "shell",
            "content": [{"type": "text", "text": "ok"}],
        });
        let msg: Message = serde_json::from_value(json).unwrap();
        match msg {
            Message::ToolResult { is_error, .. } => assert!(!is_error),
            _ => panic!("expected tool_result"),
        }
    }

    #[test]
    fn usage_add_accumulates() {
        let mut total = Usage::default();
        total.add(&Usage {
            input_tokens: 10,
            output_tokens: 5,
            total_tokens: 15,
        });
        total.add(&Usage {
            input_tokens: 1,
            output_tokens: 2,
            total_tokens: 3,
        });
        assert_eq!(total.input_tokens, 11);
        assert_eq!(total.output_tokens, 7);
        assert_eq!(total.total_tokens, 18);
    }
}
