//! Built-in tools and the tool executor.
//!
//! The executor is the only thing the agent loop knows about tools: invoke
//! by name with typed arguments, get back a tool_result message, never an
//! exception. Individual tools are stateful per session and owned by the
//! orchestrator.

pub mod executor;
pub mod fetch;
pub mod shell;
pub mod workspace;

pub use executor::ToolExecutor;
pub use fetch::HttpFetchTool;
pub use shell::ShellTool;
pub use workspace::{Mount, WorkspaceTool};

use std::sync::Arc;

use serde_json::Value;

use tl_domain::cancel::CancelToken;
use tl_domain::error::Result;
use tl_domain::event::EventSink;
use tl_domain::message::{ContentBlock, ToolDefinition};

/// Per-invocation context handed to every tool.
pub struct ToolContext {
    pub session_id: String,
    pub cancel: CancelToken,
    /// Ordered path into the session's event log, for tools that record
    /// artifact changes.
    pub sink: Arc<dyn EventSink>,
}

/// An externally-implemented capability the model can invoke.
///
/// Errors returned from `invoke` become `is_error` tool_results; they are
/// never fatal to the session.
#[async_trait::async_trait]
pub trait Tool: Send + Sync {
    fn definition(&self) -> ToolDefinition;

    async fn invoke(&self, arguments: Value, ctx: &ToolContext) -> Result<Vec<ContentBlock>>;
}
