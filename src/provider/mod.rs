//! Model client trait and implementations.

pub mod http;

#[cfg(feature = "anthropic")]
pub mod anthropic;

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::Result;
use crate::stream::WireChunk;
use crate::tools::ToolDefinition;
use crate::types::Message;

/// One model invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelRequest {
    pub system: Option<String>,
    pub messages: Vec<Message>,
    /// `None` when no tools are offered; never `Some(vec![])`.
    pub tools: Option<Vec<ToolDefinition>>,
    pub max_output_tokens: u32,
}

impl ModelRequest {
    pub fn new(messages: Vec<Message>, tools: Vec<ToolDefinition>, max_output_tokens: u32) -> Self {
        Self {
            system: None,
            messages,
            tools: (!tools.is_empty()).then_some(tools),
            max_output_tokens,
        }
    }

    pub fn with_system(mut self, system: Option<String>) -> Self {
        self.system = system;
        self
    }
}

/// Stream of wire chunks for one turn.
pub type ChunkStream = BoxStream<'static, Result<WireChunk>>;

/// A token-streaming language model.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Provider name (e.g. "anthropic").
    fn provider_name(&self) -> &str;

    /// Start a streamed completion. Errors returned here happen before any
    /// chunk is produced; errors inside the stream are mid-turn failures.
    async fn stream(&self, request: &ModelRequest) -> Result<ChunkStream>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_tool_list_becomes_none() {
        let request = ModelRequest::new(vec![Message::user("ping")], Vec::new(), 1024);
        assert!(request.tools.is_none());
        assert!(request.system.is_none());
    }
}
