//! Tool invocation with failure containment.
//!
//! Policy: unknown tool names, thrown errors, panics, and cancellation all
//! come back as ordinary `is_error` tool_results the model can see. No other
//! layer translates tool failures.

use std::collections::HashMap;
use std::sync::Arc;

use futures_util::FutureExt;
use serde_json::Value;

use tl_domain::message::{Message, ToolDefinition};

use crate::{Tool, ToolContext};

pub struct ToolExecutor {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolExecutor {
    pub fn new(tools: Vec<Arc<dyn Tool>>) -> Self {
        let tools = tools
            .into_iter()
            .map(|t| (t.definition().name, t))
            .collect();
        Self { tools }
    }

    /// Tool schema advertised to the model.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<ToolDefinition> =
            self.tools.values().map(|t| t.definition()).collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    /// Invoke a tool by name. Always returns a tool_result message.
    pub async fn invoke(
        &self,
        name: &str,
        call_id: &str,
        arguments: Value,
        ctx: &ToolContext,
    ) -> Message {
        let Some(tool) = self.tools.get(name) else {
            return Message::tool_result_text(call_id, name, format!("unknown tool: {name}"), true);
        };

        if ctx.cancel.is_cancelled() {
            return Message::tool_result_text(call_id, name, "aborted", true);
        }

        let invocation = std::panic::AssertUnwindSafe(tool.invoke(arguments, ctx)).catch_unwind();

        tokio::select! {
            _ = ctx.cancel.cancelled() => {
                Message::tool_result_text(call_id, name, "aborted", true)
            }
            outcome = invocation => match outcome {
                Ok(Ok(content)) => Message::tool_result(call_id, name, content, false),
                Ok(Err(e)) => {
                    tracing::warn!(tool = name, call_id, error = %e, "tool invocation failed");
                    Message::tool_result_text(call_id, name, e.to_string(), true)
                }
                Err(panic) => {
                    let reason = panic
                        .downcast_ref::<&str>()
                        .map(|s| s.to_string())
                        .or_else(|| panic.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "tool panicked".into());
                    tracing::error!(tool = name, call_id, %reason, "tool panicked");
                    Message::tool_result_text(call_id, name, format!("tool panicked: {reason}"), true)
                }
            }
        }
    }
}
