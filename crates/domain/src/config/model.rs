use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Model provider
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Chat-model endpoint configuration. The credential itself never lives in
/// the config file — only the name of the environment variable that holds it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Base URL of an OpenAI-compatible chat completions endpoint.
    #[serde(default = "d_base_url")]
    pub base_url: String,
    /// Model identifier sent with every request.
    #[serde(default = "d_model")]
    pub model: String,
    /// Environment variable holding the bearer token.
    #[serde(default = "d_api_key_env")]
    pub api_key_env: String,
    /// System prompt prepended to every turn.
    #[serde(default = "d_system_prompt")]
    pub system_prompt: String,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    /// Request timeout (seconds) for a single model call.
    #[serde(default = "d_request_timeout")]
    pub request_timeout_sec: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            base_url: d_base_url(),
            model: d_model(),
            api_key_env: d_api_key_env(),
            system_prompt: d_system_prompt(),
            temperature: None,
            max_tokens: None,
            request_timeout_sec: d_request_timeout(),
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_base_url() -> String {
    "https://api.openai.com/v1".into()
}
fn d_model() -> String {
    "gpt-4o".into()
}
fn d_api_key_env() -> String {
    "THREADLINE_API_KEY".into()
}
fn d_system_prompt() -> String {
    "You are a helpful assistant with access to tools.".into()
}
fn d_request_timeout() -> u64 {
    120
}
