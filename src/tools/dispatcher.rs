//! Routes namespaced tool calls to capability providers.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::debug;

use super::provider::{CapabilityProvider, ToolDefinition};
use crate::error::{Result, ToolweaveError};
use crate::types::{ToolCall, ToolStatus};
use crate::util::timeout::with_timeout;

/// Separator between provider id and tool id.
pub const NAMESPACE_SEPARATOR: &str = "__";

/// A tool name of the form `<provider>__<tool>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespacedToolName {
    pub provider_id: String,
    pub tool_id: String,
}

impl NamespacedToolName {
    pub fn new(provider_id: impl Into<String>, tool_id: impl Into<String>) -> Self {
        Self {
            provider_id: provider_id.into(),
            tool_id: tool_id.into(),
        }
    }

    /// Parse a namespaced name. Anything other than exactly one separator
    /// with non-empty halves is rejected.
    pub fn parse(name: &str) -> Result<Self> {
        let parts: Vec<&str> = name.split(NAMESPACE_SEPARATOR).collect();
        match parts.as_slice() {
            [provider, tool] if !provider.is_empty() && !tool.is_empty() => {
                Ok(Self::new(*provider, *tool))
            }
            _ => Err(ToolweaveError::MalformedToolName(name.to_string())),
        }
    }
}

impl fmt::Display for NamespacedToolName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{NAMESPACE_SEPARATOR}{}", self.provider_id, self.tool_id)
    }
}

/// Resolves namespaced tool names to providers and invokes them.
///
/// Constructed explicitly and passed to the orchestrator; there is no
/// process-wide registry.
#[derive(Clone, Default)]
pub struct ToolDispatcher {
    providers: BTreeMap<String, Arc<dyn CapabilityProvider>>,
    timeout: Option<Duration>,
}

impl ToolDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider under `id`. Ids must not contain the separator.
    pub fn with_provider(
        mut self,
        id: impl Into<String>,
        provider: Arc<dyn CapabilityProvider>,
    ) -> Result<Self> {
        let id = id.into();
        if id.is_empty() || id.contains(NAMESPACE_SEPARATOR) {
            return Err(ToolweaveError::Configuration(format!(
                "invalid capability provider id '{id}'"
            )));
        }
        self.providers.insert(id, provider);
        Ok(self)
    }

    /// Bound every tool invocation by `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Tools grouped by provider id.
    pub async fn list_tools(&self) -> Result<BTreeMap<String, Vec<ToolDefinition>>> {
        let mut out = BTreeMap::new();
        for (id, provider) in &self.providers {
            out.insert(id.clone(), provider.list_tools().await?);
        }
        Ok(out)
    }

    /// Flattened definitions with namespaced names, as offered to the model.
    pub async fn tool_definitions(&self) -> Result<Vec<ToolDefinition>> {
        Ok(self
            .list_tools()
            .await?
            .into_iter()
            .flat_map(|(provider_id, tools)| {
                tools.into_iter().map(move |tool| ToolDefinition {
                    name: NamespacedToolName::new(provider_id.clone(), tool.name).to_string(),
                    description: tool.description,
                    input_schema: tool.input_schema,
                })
            })
            .collect())
    }

    /// Route `namespaced_name` to its provider and invoke it.
    pub async fn execute(
        &self,
        namespaced_name: &str,
        input: serde_json::Value,
    ) -> Result<serde_json::Value> {
        let name = NamespacedToolName::parse(namespaced_name)?;
        let provider = self
            .providers
            .get(&name.provider_id)
            .ok_or_else(|| ToolweaveError::UnknownProvider(name.provider_id.clone()))?;
        let call = provider.call_tool(&name.tool_id, input);
        match self.timeout {
            Some(timeout) => with_timeout(timeout, call).await,
            None => call.await,
        }
    }

    /// Execute `call`, recording status, output or error, and wall-clock
    /// times. Failures are captured on the call and never returned.
    ///
    /// An error already on the call (discarded arguments) is kept: a
    /// successful run leaves it in place, a failed run prefixes it.
    pub async fn dispatch(&self, call: &mut ToolCall) {
        let argument_error = call.error.take();
        call.start_time = Some(Utc::now());
        call.status = ToolStatus::Running;
        let result = self.execute(&call.name, call.input.clone()).await;
        call.end_time = Some(Utc::now());
        match result {
            Ok(output) => {
                call.status = ToolStatus::Completed;
                call.output = Some(output);
                call.error = argument_error;
            }
            Err(err) => {
                call.status = ToolStatus::Error;
                call.output = None;
                call.error = Some(match argument_error {
                    Some(prior) => format!("{prior}; {err}"),
                    None => err.to_string(),
                });
            }
        }
        debug!(
            call_id = %call.id,
            tool = %call.name,
            status = ?call.status,
            duration_ms = call.duration_ms(),
            "tool dispatched"
        );
    }
}

impl fmt::Debug for ToolDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolDispatcher")
            .field("providers", &self.providers.keys().collect::<Vec<_>>())
            .field("timeout", &self.timeout)
            .finish()
    }
}
