//! Tool providers and namespaced dispatch.

pub mod dispatcher;
pub mod provider;

pub use dispatcher::{NamespacedToolName, ToolDispatcher, NAMESPACE_SEPARATOR};
pub use provider::{CapabilityProvider, LocalProvider, ToolDefinition};
