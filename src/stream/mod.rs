//! Response-stream decoding and tool-argument accumulation.

pub mod accumulator;
pub mod decoder;

pub use accumulator::{finalize_input, CloseOutcome, ToolCallAccumulator};
pub use decoder::{DecodedEvent, StreamDecoder, WireChunk};
