//! HTTP client construction, SSE line parsing, and status mapping.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};

use crate::error::{Result, ToolweaveError};

/// Build a client suitable for long-lived streaming responses. Only the
/// connect phase is bounded; idle detection is done per chunk.
pub fn streaming_client() -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(30))
        .pool_max_idle_per_host(10)
        .build()?)
}

/// Build Anthropic-style headers (x-api-key).
pub fn anthropic_headers(api_key: &str, version: &str) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(ACCEPT, HeaderValue::from_static("text/event-stream"));
    let key = HeaderValue::from_str(api_key)
        .map_err(|_| ToolweaveError::Configuration("API key is not a valid header value".into()))?;
    headers.insert("x-api-key", key);
    let version = HeaderValue::from_str(version)
        .map_err(|_| ToolweaveError::Configuration(format!("invalid API version '{version}'")))?;
    headers.insert("anthropic-version", version);
    Ok(headers)
}

/// Parse an SSE `data:` line, returning `None` for other fields and `[DONE]`.
pub fn parse_sse_data(line: &str) -> Option<&str> {
    let data = line.strip_prefix("data:")?.trim_start();
    if data == "[DONE]" {
        return None;
    }
    Some(data)
}

/// Splits a byte stream into complete lines. Bytes are buffered until a
/// newline so multi-byte characters split across chunks decode intact.
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `bytes` and drain every complete line, trimmed.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(bytes);
        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            lines.push(String::from_utf8_lossy(&line).trim().to_string());
        }
        lines
    }

    /// Whatever remains after the stream ends (a final unterminated line).
    pub fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.pending);
        let line = String::from_utf8_lossy(&rest).trim().to_string();
        (!line.is_empty()).then_some(line)
    }
}

/// Map a non-success HTTP status to an error.
pub fn status_to_error(status: u16, body: &str) -> ToolweaveError {
    match status {
        401 | 403 => ToolweaveError::Authentication(body.to_string()),
        429 => ToolweaveError::RateLimited {
            retry_after_ms: extract_retry_after(body),
        },
        _ => ToolweaveError::api(status, error_message(body)),
    }
}

fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| body.to_string())
}

fn extract_retry_after(body: &str) -> Option<u64> {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v["error"]["retry_after"].as_f64())
        .map(|s| (s * 1000.0) as u64)
}
