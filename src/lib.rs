//! Toolweave: streaming tool orchestration for language models.
//!
//! Drives a multi-turn conversation with a token-streaming model: text is
//! forwarded as it arrives, tool calls are accumulated from partial-json
//! fragments, executed against capability providers, and fed back to the
//! model until it produces a final answer.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use futures::StreamExt;
//! use toolweave::prelude::*;
//!
//! # async fn example() -> toolweave::error::Result<()> {
//! let model = AnthropicClient::new(AnthropicConfig::from_env()?)?;
//! let orchestrator = Orchestrator::new(Arc::new(model), ToolDispatcher::new(), LoopConfig::from_env()?);
//!
//! let mut events = orchestrator.run(&[], "What moved ETH today?");
//! while let Some(event) = events.next().await {
//!     print!("{}", event?.to_sse_frame()?);
//! }
//! println!("stopped: {:?}", events.stop_reason());
//! # Ok(())
//! # }
//! ```

pub mod agent_loop;
pub mod config;
pub mod error;
pub mod prelude;
pub mod provider;
pub mod stream;
pub mod tools;
pub mod transcript;
pub mod types;
pub mod util;
