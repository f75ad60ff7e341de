//! Convenience re-exports for common use.

pub use crate::agent_loop::{EventStream, Orchestrator, RunOutcome};
pub use crate::config::{LoopConfig, ToolExecutionMode};
pub use crate::error::{Result, ToolweaveError};
pub use crate::provider::{ModelClient, ModelRequest};
pub use crate::tools::{CapabilityProvider, LocalProvider, ToolDefinition, ToolDispatcher};
pub use crate::types::{
    ChatMessage, ContentBlock, Message, Role, StopReason, StreamEvent, ToolCall, ToolStatus,
};

#[cfg(feature = "anthropic")]
pub use crate::config::AnthropicConfig;
#[cfg(feature = "anthropic")]
pub use crate::provider::anthropic::AnthropicClient;
