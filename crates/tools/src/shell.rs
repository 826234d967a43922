//! Shell tool — run a command in the session workspace and return its
//! output. Foreground-only: the command either finishes within the timeout
//! or is killed.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;
use tokio::process::Command;

use tl_domain::config::ShellConfig;
use tl_domain::error::{Error, Result};
use tl_domain::message::{ContentBlock, ToolDefinition};

use crate::{Tool, ToolContext};

#[derive(Debug, Deserialize)]
struct ShellArgs {
    command: String,
    /// Override hard timeout (seconds).
    timeout_sec: Option<u64>,
}

pub struct ShellTool {
    config: ShellConfig,
    workdir: PathBuf,
}

impl ShellTool {
    pub fn new(config: ShellConfig, workdir: PathBuf) -> Self {
        Self { config, workdir }
    }
}

#[async_trait::async_trait]
impl Tool for ShellTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "shell".into(),
            description: "Run a shell command in the session workspace and return its output."
                .into(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "command": { "type": "string", "description": "Shell command to execute" },
                    "timeout_sec": { "type": "integer", "description": "Hard timeout in seconds" }
                },
                "required": ["command"]
            }),
        }
    }

    async fn invoke(&self, arguments: Value, _ctx: &ToolContext) -> Result<Vec<ContentBlock>> {
        let args: ShellArgs = serde_json::from_value(arguments)
            .map_err(|e| Error::InvalidRequest(format!("shell arguments: {e}")))?;
        let timeout = Duration::from_secs(args.timeout_sec.unwrap_or(self.config.timeout_sec));

        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(&args.command)
            .current_dir(&self.workdir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = tokio::time::timeout(timeout, cmd.output())
            .await
            .map_err(|_| Error::Other(format!("command timed out after {}s", timeout.as_secs())))?
            .map_err(|e| Error::Other(format!("failed to spawn: {e}")))?;

        let mut text = String::new();
        text.push_str(&String::from_utf8_lossy(&output.stdout));
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.is_empty() {
            if !text.is_empty() && !text.ends_with('\n') {
                text.push('\n');
            }
            text.push_str(&stderr);
        }
        if !output.status.success() {
            if !text.is_empty() && !text.ends_with('\n') {
                text.push('\n');
            }
            text.push_str(&format!("exit code: {}", output.status.code().unwrap_or(-1)));
        }
        truncate_in_place(&mut text, self.config.max_output_chars);

        Ok(vec![ContentBlock::Text { text }])
    }
}

fn truncate_in_place(s: &mut String, max_chars: usize) {
    if let Some((idx, _)) = s.char_indices().nth(max_chars) {
        s.truncate(idx);
        s.push_str("\n[output truncated]");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use tl_domain::cancel::CancelToken;
    use tl_domain::event::NullSink;

    fn ctx() -> ToolContext {
        ToolContext {
            session_id: "s1".into(),
            cancel: CancelToken::new(),
            sink: Arc::new(NullSink),
        }
    }

    fn tool(dir: &std::path::Path) -> ShellTool {
        ShellTool::new(ShellConfig::default(), dir.to_path_buf())
    }

    #[tokio::test]
    async fn captures_stdout() {
        let dir = tempfile::tempdir().unwrap();
        let blocks = tool(dir.path())
            .invoke(serde_json::json!({"command": "echo hello"}), &ctx())
            .await
            .unwrap();
        match &blocks[0] {
            ContentBlock::Text { text } => assert_eq!(text.trim(), "hello"),
            other => panic!("expected text block, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn reports_exit_code_and_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let blocks = tool(dir.path())
            .invoke(
                serde_json::json!({"command": "echo oops >&2; exit 3"}),
                &ctx(),
            )
            .await
            .unwrap();
        let text = match &blocks[0] {
            ContentBlock::Text { text } => text,
            other => panic!("expected text block, got {other:?}"),
        };
        assert!(text.contains("oops"));
        assert!(text.contains("exit code: 3"));
    }

    #[tokio::test]
    async fn runs_in_the_session_workdir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("marker.txt"), "here").unwrap();
        let blocks = tool(dir.path())
            .invoke(serde_json::json!({"command": "cat marker.txt"}), &ctx())
            .await
            .unwrap();
        match &blocks[0] {
            ContentBlock::Text { text } => assert_eq!(text, "here"),
            other => panic!("expected text block, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn timeout_kills_the_command() {
        let dir = tempfile::tempdir().unwrap();
        let err = tool(dir.path())
            .invoke(
                serde_json::json!({"command": "sleep 30", "timeout_sec": 1}),
                &ctx(),
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }

    #[tokio::test]
    async fn missing_command_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let err = tool(dir.path())
            .invoke(serde_json::json!({}), &ctx())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(_)));
    }

    #[test]
    fn truncation_appends_marker() {
        let mut s = "abcdefgh".to_string();
        truncate_in_place(&mut s, 4);
        assert_eq!(s, "abcd\n[output truncated]");
    }
}
