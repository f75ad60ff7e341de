//! Capability provider trait and a closure-backed in-process provider.

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{Result, ToolweaveError};

/// Tool definition offered to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

impl ToolDefinition {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: serde_json::Value,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
        }
    }
}

/// An external system that executes named tools (e.g. an MCP server or
/// an analytics backend).
#[async_trait]
pub trait CapabilityProvider: Send + Sync {
    /// Tools this provider exposes, named without the provider prefix.
    async fn list_tools(&self) -> Result<Vec<ToolDefinition>>;

    /// Invoke `tool_id` with `input`.
    async fn call_tool(&self, tool_id: &str, input: serde_json::Value)
        -> Result<serde_json::Value>;
}

type ToolHandler = dyn Fn(serde_json::Value) -> Pin<Box<dyn Future<Output = Result<serde_json::Value>> + Send>>
    + Send
    + Sync;

struct LocalTool {
    definition: ToolDefinition,
    handler: Arc<ToolHandler>,
}

/// Provider whose tools are async closures registered in-process.
#[derive(Default)]
pub struct LocalProvider {
    tools: BTreeMap<String, LocalTool>,
}

impl LocalProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. A later registration with the same name replaces
    /// the earlier one.
    pub fn with_tool<F, Fut>(mut self, definition: ToolDefinition, handler: F) -> Self
    where
        F: Fn(serde_json::Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<serde_json::Value>> + Send + 'static,
    {
        self.tools.insert(
            definition.name.clone(),
            LocalTool {
                definition,
                handler: Arc::new(move |input| Box::pin(handler(input))),
            },
        );
        self
    }
}

#[async_trait]
impl CapabilityProvider for LocalProvider {
    async fn list_tools(&self) -> Result<Vec<ToolDefinition>> {
        Ok(self.tools.values().map(|t| t.definition.clone()).collect())
    }

    async fn call_tool(
        &self,
        tool_id: &str,
        input: serde_json::Value,
    ) -> Result<serde_json::Value> {
        let tool = self
            .tools
            .get(tool_id)
            .ok_or_else(|| ToolweaveError::tool(tool_id, "tool not found"))?;
        (tool.handler)(input).await
    }
}

impl std::fmt::Debug for LocalProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalProvider")
            .field("tools", &self.tools.keys().collect::<Vec<_>>())
            .finish()
    }
}
