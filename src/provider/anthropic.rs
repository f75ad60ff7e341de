//! Anthropic Messages API streaming client.

use async_trait::async_trait;
use futures::StreamExt;
use serde_json::json;
use tracing::debug;

use crate::config::AnthropicConfig;
use crate::error::{Result, ToolweaveError};
use crate::stream::WireChunk;
use crate::types::{ContentBlock, Message, Role};

use super::http::{anthropic_headers, parse_sse_data, status_to_error, streaming_client, LineBuffer};
use super::{ChunkStream, ModelClient, ModelRequest};

const API_VERSION: &str = "2023-06-01";

pub struct AnthropicClient {
    config: AnthropicConfig,
    http: reqwest::Client,
}

impl AnthropicClient {
    pub fn new(config: AnthropicConfig) -> Result<Self> {
        Ok(Self {
            config,
            http: streaming_client()?,
        })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    fn build_request_body(&self, request: &ModelRequest) -> serde_json::Value {
        let mut body = json!({
            "model": self.config.model,
            "max_tokens": request.max_output_tokens,
            "stream": true,
            "messages": request.messages.iter().map(build_message).collect::<Vec<_>>(),
        });
        if let Some(system) = &request.system {
            body["system"] = json!(system);
        }
        if let Some(tools) = &request.tools {
            body["tools"] = json!(tools);
        }
        body
    }
}

#[async_trait]
impl ModelClient for AnthropicClient {
    fn provider_name(&self) -> &str {
        "anthropic"
    }

    async fn stream(&self, request: &ModelRequest) -> Result<ChunkStream> {
        let body = self.build_request_body(request);
        let url = format!("{}/messages", self.config.base_url);

        debug!(
            model = %self.config.model,
            messages = request.messages.len(),
            tools = request.tools.as_ref().map_or(0, Vec::len),
            "anthropic stream"
        );

        let resp = self
            .http
            .post(&url)
            .headers(anthropic_headers(&self.config.api_key, API_VERSION)?)
            .json(&body)
            .send()
            .await?;

        let status = resp.status().as_u16();
        if status != 200 {
            let body_text = resp.text().await.unwrap_or_default();
            return Err(status_to_error(status, &body_text));
        }

        let byte_stream = resp.bytes_stream();
        let stream = async_stream::stream! {
            let mut lines = LineBuffer::new();
            let mut failed = false;
            futures::pin_mut!(byte_stream);

            'read: while let Some(chunk) = byte_stream.next().await {
                let chunk = match chunk {
                    Ok(c) => c,
                    Err(e) => {
                        failed = true;
                        yield Err(ToolweaveError::Network(e));
                        break 'read;
                    }
                };
                for line in lines.push(&chunk) {
                    if let Some(parsed) = parse_line(&line) {
                        failed = parsed.is_err();
                        yield parsed;
                        if failed {
                            break 'read;
                        }
                    }
                }
            }
            if !failed {
                if let Some(parsed) = lines.finish().as_deref().and_then(parse_line) {
                    yield parsed;
                }
            }
        };

        Ok(Box::pin(stream))
    }
}

fn parse_line(line: &str) -> Option<Result<WireChunk>> {
    if line.is_empty() || line.starts_with(':') {
        return None;
    }
    let data = parse_sse_data(line)?;
    Some(serde_json::from_str::<WireChunk>(data).map_err(ToolweaveError::from))
}

fn build_message(message: &Message) -> serde_json::Value {
    let role = match message.role {
        Role::User => "user",
        Role::Assistant => "assistant",
    };
    let content: Vec<serde_json::Value> = message
        .content
        .iter()
        .filter_map(|block| match block {
            ContentBlock::Text { text } if text.is_empty() => None,
            ContentBlock::Text { text } => Some(json!({"type": "text", "text": text})),
            ContentBlock::ToolUse { id, name, input } => Some(json!({
                "type": "tool_use",
                "id": id,
                "name": name,
                "input": input,
            })),
            ContentBlock::ToolResult {
                tool_use_id,
                content,
                is_error,
            } => Some(json!({
                "type": "tool_result",
                "tool_use_id": tool_use_id,
                "content": tool_result_text(content),
                "is_error": is_error,
            })),
        })
        .collect();
    json!({ "role": role, "content": content })
}

fn tool_result_text(content: &serde_json::Value) -> String {
    match content {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
