//! Streaming tool-orchestration loop.

pub mod events;
pub mod runner;
mod tool_phase;

pub use events::{EventStream, RunOutcome};
pub use runner::Orchestrator;
