//! HTTP fetch tool — fetch a URL with strict limits.
//!
//! Only http/https, no private or loopback targets, hard byte cap, bounded
//! redirects.

use std::net::{IpAddr, ToSocketAddrs};
use std::time::Duration;

use futures_util::StreamExt;
use serde::Deserialize;
use serde_json::Value;

use tl_domain::config::FetchConfig;
use tl_domain::error::{Error, Result};
use tl_domain::message::{ContentBlock, ToolDefinition};

use crate::{Tool, ToolContext};

#[derive(Debug, Deserialize)]
struct FetchArgs {
    url: String,
}

pub struct HttpFetchTool {
    client: reqwest::Client,
    max_bytes: usize,
}

impl HttpFetchTool {
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_sec))
            .redirect(reqwest::redirect::Policy::limited(5))
            .user_agent("threadline/0.1")
            .build()
            .map_err(|e| Error::Other(format!("building fetch client: {e}")))?;
        Ok(Self {
            client,
            max_bytes: config.max_bytes,
        })
    }
}

/// Reject non-http(s) schemes and hosts that resolve to private, loopback,
/// or link-local addresses.
fn validate_url(raw: &str) -> std::result::Result<(), String> {
    let parsed = reqwest::Url::parse(raw).map_err(|e| format!("invalid URL: {e}"))?;
    match parsed.scheme() {
        "http" | "https" => {}
        other => return Err(format!("blocked scheme: {other}")),
    }
    let host = parsed.host_str().ok_or_else(|| "URL has no host".to_owned())?;
    let port = parsed.port_or_known_default().unwrap_or(80);
    let addrs = format!("{host}:{port}")
        .to_socket_addrs()
        .map_err(|e| format!("DNS resolution failed for {host}: {e}"))?;
    for addr in addrs {
        if is_private_ip(&addr.ip()) {
            return Err(format!(
                "blocked private address: {host} resolves to {}",
                addr.ip()
            ));
        }
    }
    Ok(())
}

fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local()
                || v4.is_broadcast()
                || v4.is_unspecified()
        }
        IpAddr::V6(v6) => {
            v6.is_loopback()
                || v6.is_unspecified()
                // fc00::/7 unique-local and fe80::/10 link-local
                || (v6.segments()[0] & 0xFE00) == 0xFC00
                || (v6.segments()[0] & 0xFFC0) == 0xFE80
        }
    }
}

#[async_trait::async_trait]
impl Tool for HttpFetchTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "http_fetch".into(),
            description: "Fetch a URL over http(s) and return the response body as text.".into(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "url": { "type": "string", "description": "URL to fetch" }
                },
                "required": ["url"]
            }),
        }
    }

    async fn invoke(&self, arguments: Value, _ctx: &ToolContext) -> Result<Vec<ContentBlock>> {
        let args: FetchArgs = serde_json::from_value(arguments)
            .map_err(|e| Error::InvalidRequest(format!("http_fetch arguments: {e}")))?;

        validate_url(&args.url).map_err(Error::InvalidRequest)?;

        let response = self
            .client
            .get(&args.url)
            .send()
            .await
            .map_err(|e| Error::Other(format!("fetch {}: {e}", args.url)))?;
        let status = response.status();

        let mut body = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| Error::Other(format!("reading body: {e}")))?;
            if body.len() + chunk.len() > self.max_bytes {
                return Err(Error::Other(format!(
                    "response exceeded {} byte limit",
                    self.max_bytes
                )));
            }
            body.extend_from_slice(&chunk);
        }

        let text = String::from_utf8_lossy(&body).into_owned();
        if status.is_success() {
            Ok(vec![ContentBlock::Text { text }])
        } else {
            Err(Error::Other(format!("{status}: {text}")))
        }
    }
}
