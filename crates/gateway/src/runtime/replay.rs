//! Conversation reconstruction — the deterministic mapping from a session's
//! event log back to a message history the model can continue.
//!
//! Only three event types matter: `user_message` carries the user turn,
//! `message_end` carries the authoritative final assistant message (never
//! the streamed deltas), and `turn_end` is the one place tool_results are
//! grouped in their canonical order. Everything else — including event
//! types this build does not know — is ignored.

use tl_domain::event::{EventType, MessagePayload, TurnEndPayload};
use tl_domain::message::Message;
use tl_store::EventRow;

pub fn reconstruct(events: &[EventRow]) -> Vec<Message> {
    let mut messages = Vec::new();

    for event in events {
        match EventType::from(event.kind.as_str()) {
            EventType::UserMessage | EventType::MessageEnd => {
                match serde_json::from_value::<MessagePayload>(event.data.clone()) {
                    Ok(payload) => messages.push(payload.message),
                    Err(e) => {
                        tracing::warn!(event_id = event.id, error = %e,
                            "skipping malformed message payload");
                    }
                }
            }
            EventType::TurnEnd => {
                match serde_json::from_value::<TurnEndPayload>(event.data.clone()) {
                    Ok(payload) => messages.extend(payload.tool_results),
                    Err(e) => {
                        tracing::warn!(event_id = event.id, error = %e,
                            "skipping malformed turn_end payload");
                    }
                }
            }
            _ => {}
        }
    }

    messages
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::Utc;
    use serde_json::Value;
    use tl_domain::message::ContentBlock;

    fn row(id: i64, kind: &str, data: Value) -> EventRow {
        EventRow {
            id,
            session_id: "s1".into(),
            kind: kind.into(),
            data,
            created_at: Utc::now(),
        }
    }

    fn message_data(message: Message) -> Value {
        serde_json::to_value(MessagePayload { message }).unwrap()
    }

    #[test]
    fn single_turn_reconstructs_user_and_assistant() {
        let events = vec![
            row(1, "user_message", message_data(Message::user("ping"))),
            row(2, "agent_start", serde_json::json!({})),
            row(3, "turn_start", serde_json::json!({})),
            row(4, "message_end", message_data(Message::assistant("pong"))),
            row(
                5,
                "turn_end",
                serde_json::to_value(TurnEndPayload {
                    message: Message::assistant("pong"),
                    tool_results: vec![],
                })
                .unwrap(),
            ),
            row(6, "agent_end", serde_json::json!({})),
            row(7, "session_complete", serde_json::json!({})),
        ];

        let messages = reconstruct(&events);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role(), "user");
        assert_eq!(messages[0].text(), "ping");
        assert_eq!(messages[1].role(), "assistant");
        assert_eq!(messages[1].text(), "pong");
    }

    #[test]
    fn tool_turn_keeps_call_result_pairing() {
        let assistant = Message::Assistant {
            content: vec![
                ContentBlock::Text {
                    text: "checking".into(),
                },
                ContentBlock::ToolCall {
                    call_id: "c1".into(),
                    tool_name: "shell".into(),
                    arguments: serde_json::json!({"command": "wc -l /x"}),
                },
            ],
            timestamp: None,
            usage: None,
        };
        let result = Message::tool_result_text("c1", "shell", "42", false);

        let events = vec![
            row(1, "user_message", message_data(Message::user("count"))),
            row(2, "message_end", message_data(assistant.clone())),
            row(
                3,
                "turn_end",
                serde_json::to_value(TurnEndPayload {
                    message: assistant,
                    tool_results: vec![result],
                })
                .unwrap(),
            ),
            row(4, "message_end", message_data(Message::assistant("42 lines"))),
        ];

        let messages = reconstruct(&events);
        assert_eq!(messages.len(), 4);

        // tool_call in the assistant message pairs with the following
        // tool_result, so the model accepts this as a continuation prefix.
        let calls = messages[1].tool_calls();
        assert_eq!(calls.len(), 1);
        match &messages[2] {
            Message::ToolResult { call_id, .. } => assert_eq!(call_id, &calls[0].call_id),
            other => panic!("expected tool_result, got {other:?}"),
        }
        assert_eq!(messages[3].text(), "42 lines");
    }

    #[test]
    fn unknown_and_auxiliary_events_are_ignored() {
        let events = vec![
            row(1, "user_message", message_data(Message::user("hi"))),
            row(2, "artifact_update", serde_json::json!({"path": "a.txt"})),
            row(3, "from_the_future", serde_json::json!({"v": 2})),
            row(4, "session_error", serde_json::json!({"message": "timed out"})),
        ];
        let messages = reconstruct(&events);
        assert_eq!(messages.len(), 1);
    }

    #[test]
    fn malformed_payloads_are_skipped() {
        let events = vec![
            row(1, "user_message", serde_json::json!({"nope": true})),
            row(2, "message_end", message_data(Message::assistant("ok"))),
        ];
        let messages = reconstruct(&events);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].text(), "ok");
    }

    #[test]
    fn empty_log_reconstructs_empty_history() {
        assert!(reconstruct(&[]).is_empty());
    }
}
