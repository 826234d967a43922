use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tools (shell / workspace / http_fetch)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Configuration for the built-in tools.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolsConfig {
    #[serde(default)]
    pub shell: ShellConfig,
    #[serde(default)]
    pub workspace: WorkspaceConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShellConfig {
    /// Hard timeout for a command (seconds).
    #[serde(default = "d_shell_timeout")]
    pub timeout_sec: u64,
    /// Max output chars returned to the model per invocation.
    #[serde(default = "d_max_output")]
    pub max_output_chars: usize,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            timeout_sec: d_shell_timeout(),
            max_output_chars: d_max_output(),
        }
    }
}

/// Session-scoped virtual filesystem settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    /// Root under which each session gets its own directory.
    #[serde(default = "d_workspace_root")]
    pub root: PathBuf,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            root: d_workspace_root(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Response body cap (bytes).
    #[serde(default = "d_fetch_max_bytes")]
    pub max_bytes: usize,
    /// Request timeout (seconds).
    #[serde(default = "d_fetch_timeout")]
    pub timeout_sec: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_bytes: d_fetch_max_bytes(),
            timeout_sec: d_fetch_timeout(),
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_shell_timeout() -> u64 {
    60
}
fn d_max_output() -> usize {
    200_000
}
fn d_workspace_root() -> PathBuf {
    PathBuf::from("./data/workspace")
}
fn d_fetch_max_bytes() -> usize {
    1_000_000
}
fn d_fetch_timeout() -> u64 {
    30
}
