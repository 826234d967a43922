//! Workspace tool — a session-scoped virtual filesystem.
//!
//! Each session owns a directory under the configured root. Writes emit
//! `artifact_update` events so readers can track produced files. Mounts
//! recorded in the store are restored as directories before the agent loop
//! starts; their contents are the mounting tool's business.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::Value;

use tl_domain::error::{Error, Result};
use tl_domain::event::EventType;
use tl_domain::message::{ContentBlock, ToolDefinition};

use crate::{Tool, ToolContext};

/// A mount to restore at session activation, mapped from the store's
/// mount records by the orchestrator.
#[derive(Debug, Clone)]
pub struct Mount {
    pub mount_path: String,
    pub mount_type: String,
    pub config: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum WorkspaceAction {
    Read,
    Write,
    List,
}

#[derive(Debug, Deserialize)]
struct WorkspaceArgs {
    action: WorkspaceAction,
    #[serde(default)]
    path: Option<String>,
    #[serde(default)]
    content: Option<String>,
}

pub struct WorkspaceTool {
    dir: PathBuf,
}

impl WorkspaceTool {
    /// Create (or reopen) the session's workspace directory.
    pub fn new(root: &Path, session_id: &str) -> Result<Self> {
        let dir = root.join(session_id);
        std::fs::create_dir_all(&dir).map_err(Error::Io)?;
        Ok(Self { dir })
    }

    /// The session's directory, shared with the shell tool as its workdir.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Re-create mount points recorded for this session.
    pub fn restore_mounts(&self, mounts: &[Mount]) -> Result<()> {
        for mount in mounts {
            let path = self.resolve(&mount.mount_path)?;
            std::fs::create_dir_all(&path).map_err(Error::Io)?;
            tracing::debug!(
                mount_path = %mount.mount_path,
                mount_type = %mount.mount_type,
                "mount restored"
            );
        }
        Ok(())
    }

    /// Map a workspace-relative path onto disk, rejecting escapes.
    fn resolve(&self, rel: &str) -> Result<PathBuf> {
        let rel = rel.trim_start_matches('/');
        let mut resolved = self.dir.clone();
        for part in Path::new(rel).components() {
            match part {
                std::path::Component::Normal(p) => resolved.push(p),
                std::path::Component::CurDir => {}
                _ => {
                    return Err(Error::InvalidRequest(format!(
                        "path escapes the workspace: {rel}"
                    )))
                }
            }
        }
        Ok(resolved)
    }
}

#[async_trait::async_trait]
impl Tool for WorkspaceTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "workspace".into(),
            description: "Read, write, and list files in the session workspace.".into(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "action": { "type": "string", "enum": ["read", "write", "list"] },
                    "path": { "type": "string", "description": "Workspace-relative path" },
                    "content": { "type": "string", "description": "File content (write only)" }
                },
                "required": ["action"]
            }),
        }
    }

    async fn invoke(&self, arguments: Value, ctx: &ToolContext) -> Result<Vec<ContentBlock>> {
        let args: WorkspaceArgs = serde_json::from_value(arguments)
            .map_err(|e| Error::InvalidRequest(format!("workspace arguments: {e}")))?;

        match args.action {
            WorkspaceAction::Read => {
                let rel = args
                    .path
                    .ok_or_else(|| Error::InvalidRequest("path is required for read".into()))?;
                let text =
                    std::fs::read_to_string(self.resolve(&rel)?).map_err(Error::Io)?;
                Ok(vec![ContentBlock::Text { text }])
            }
            WorkspaceAction::Write => {
                let rel = args
                    .path
                    .ok_or_else(|| Error::InvalidRequest("path is required for write".into()))?;
                let content = args.content.unwrap_or_default();
                let path = self.resolve(&rel)?;
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent).map_err(Error::Io)?;
                }
                std::fs::write(&path, &content).map_err(Error::Io)?;

                ctx.sink.emit(
                    EventType::ArtifactUpdate,
                    serde_json::json!({ "path": rel, "bytes": content.len() }),
                );

                Ok(vec![ContentBlock::Text {
                    text: format!("wrote {} bytes to {rel}", content.len()),
                }])
            }
            WorkspaceAction::List => {
                let dir = match args.path {
                    Some(rel) => self.resolve(&rel)?,
                    None => self.dir.clone(),
                };
                let mut names = Vec::new();
                for entry in std::fs::read_dir(&dir).map_err(Error::Io)? {
                    let entry = entry.map_err(Error::Io)?;
                    let mut name = entry.file_name().to_string_lossy().into_owned();
                    if entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
                        name.push('/');
                    }
                    names.push(name);
                }
                names.sort();
                Ok(vec![ContentBlock::Text {
                    text: names.join("\n"),
                }])
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use parking_lot::Mutex;
    use tl_domain::cancel::CancelToken;
    use tl_domain::event::EventSink;

    /// Sink that records emitted events for assertions.
    #[derive(Default)]
    struct RecordingSink {
        events: Mutex<Vec<(String, Value)>>,
    }

    impl EventSink for RecordingSink {
        fn emit(&self, kind: EventType, data: Value) {
            self.events.lock().push((kind.as_str().to_owned(), data));
        }
    }

    fn ctx_with_sink(sink: Arc<RecordingSink>) -> ToolContext {
        ToolContext {
            session_id: "s1".into(),
            cancel: CancelToken::new(),
            sink,
        }
    }

    #[tokio::test]
    async fn write_read_list_round_trip() {
        let root = tempfile::tempdir().unwrap();
        let tool = WorkspaceTool::new(root.path(), "s1").unwrap();
        let sink = Arc::new(RecordingSink::default());
        let ctx = ctx_with_sink(sink.clone());

        tool.invoke(
            serde_json::json!({"action": "write", "path": "notes/out.txt", "content": "data"}),
            &ctx,
        )
        .await
        .unwrap();

        let read = tool
            .invoke(
                serde_json::json!({"action": "read", "path": "notes/out.txt"}),
                &ctx,
            )
            .await
            .unwrap();
        match &read[0] {
            ContentBlock::Text { text } => assert_eq!(text, "data"),
            other => panic!("expected text block, got {other:?}"),
        }

        let listed = tool
            .invoke(serde_json::json!({"action": "list"}), &ctx)
            .await
            .unwrap();
        match &listed[0] {
            ContentBlock::Text { text } => assert_eq!(text, "notes/"),
            other => panic!("expected text block, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn write_emits_artifact_update() {
        let root = tempfile::tempdir().unwrap();
        let tool = WorkspaceTool::new(root.path(), "s1").unwrap();
        let sink = Arc::new(RecordingSink::default());
        let ctx = ctx_with_sink(sink.clone());

        tool.invoke(
            serde_json::json!({"action": "write", "path": "a.txt", "content": "xy"}),
            &ctx,
        )
        .await
        .unwrap();

        let events = sink.events.lock();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].0, "artifact_update");
        assert_eq!(events[0].1["path"], "a.txt");
        assert_eq!(events[0].1["bytes"], 2);
    }

    #[tokio::test]
    async fn path_escape_is_rejected() {
        let root = tempfile::tempdir().unwrap();
        let tool = WorkspaceTool::new(root.path(), "s1").unwrap();
        let ctx = ctx_with_sink(Arc::new(RecordingSink::default()));

        let err = tool
            .invoke(
                serde_json::json!({"action": "read", "path": "../other/secret"}),
                &ctx,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn sessions_are_isolated() {
        let root = tempfile::tempdir().unwrap();
        let a = WorkspaceTool::new(root.path(), "a").unwrap();
        let b = WorkspaceTool::new(root.path(), "b").unwrap();
        assert_ne!(a.dir(), b.dir());
    }

    #[test]
    fn restore_mounts_creates_directories() {
        let root = tempfile::tempdir().unwrap();
        let tool = WorkspaceTool::new(root.path(), "s1").unwrap();
        tool.restore_mounts(&[Mount {
            mount_path: "repo".into(),
            mount_type: "git".into(),
            config: serde_json::json!({"url": "https://example.com/r.git"}),
        }])
        .unwrap();
        assert!(tool.dir().join("repo").is_dir());
    }
}
