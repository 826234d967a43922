use serde::{Deserialize, Serialize};
use std::time::Duration;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Runtime intervals
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Liveness and polling intervals for the session runtime. All values are
/// milliseconds so tests can tune them below one second.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Live transport heartbeat period.
    #[serde(default = "d_heartbeat")]
    pub heartbeat_interval_ms: u64,
    /// Minimum spacing between the event queue's external-abort checks.
    #[serde(default = "d_abort_check")]
    pub abort_check_interval_ms: u64,
    /// Ceiling on one resumable-read long poll.
    #[serde(default = "d_long_poll_timeout")]
    pub long_poll_timeout_ms: u64,
    /// Log re-poll spacing inside a long poll.
    #[serde(default = "d_long_poll_interval")]
    pub long_poll_interval_ms: u64,
    /// A `running` session idle for longer than this is declared dead by
    /// the resumable reader.
    #[serde(default = "d_stale_session")]
    pub stale_session_max_ms: u64,
}

impl RuntimeConfig {
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }
    pub fn abort_check_interval(&self) -> Duration {
        Duration::from_millis(self.abort_check_interval_ms)
    }
    pub fn long_poll_timeout(&self) -> Duration {
        Duration::from_millis(self.long_poll_timeout_ms)
    }
    pub fn long_poll_interval(&self) -> Duration {
        Duration::from_millis(self.long_poll_interval_ms)
    }
    pub fn stale_session_max(&self) -> Duration {
        Duration::from_millis(self.stale_session_max_ms)
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_ms: d_heartbeat(),
            abort_check_interval_ms: d_abort_check(),
            long_poll_timeout_ms: d_long_poll_timeout(),
            long_poll_interval_ms: d_long_poll_interval(),
            stale_session_max_ms: d_stale_session(),
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_heartbeat() -> u64 {
    10_000
}
fn d_abort_check() -> u64 {
    2_000
}
fn d_long_poll_timeout() -> u64 {
    25_000
}
fn d_long_poll_interval() -> u64 {
    1_000
}
fn d_stale_session() -> u64 {
    300_000
}
