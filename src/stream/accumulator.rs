//! Buffers tool-call argument fragments and finalizes them at block close.

use std::collections::HashMap;

use crate::error::{Result, ToolweaveError};
use crate::types::{ToolCall, ToolStatus};

/// Parse the concatenated argument buffer of a closed tool call.
///
/// An empty or whitespace-only buffer is a call with no arguments and
/// yields `{}`.
pub fn finalize_input(raw: &str) -> std::result::Result<serde_json::Value, serde_json::Error> {
    if raw.trim().is_empty() {
        return Ok(serde_json::Value::Object(Default::default()));
    }
    serde_json::from_str(raw)
}

/// Result of closing a tool call.
#[derive(Debug, Clone, PartialEq)]
pub enum CloseOutcome {
    /// Arguments parsed; the call is ready to dispatch.
    Parsed,
    /// Arguments were not valid JSON; input fell back to `{}`.
    Malformed(String),
}

/// Tool calls opened during one turn, kept in open order.
#[derive(Debug, Default)]
pub struct ToolCallAccumulator {
    calls: Vec<ToolCall>,
    index: HashMap<String, usize>,
}

impl ToolCallAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn get(&self, id: &str) -> Option<&ToolCall> {
        self.index.get(id).map(|&i| &self.calls[i])
    }

    /// Register a newly opened call.
    pub fn open(&mut self, id: impl Into<String>, name: impl Into<String>) -> Result<&ToolCall> {
        let call = ToolCall::new(id, name);
        if self.index.contains_key(&call.id) {
            return Err(ToolweaveError::Stream(format!(
                "duplicate tool call id {} in one turn",
                call.id
            )));
        }
        self.index.insert(call.id.clone(), self.calls.len());
        self.calls.push(call);
        Ok(&self.calls[self.calls.len() - 1])
    }

    /// Append a partial-json fragment to the call's buffer.
    pub fn append(&mut self, id: &str, fragment: &str) -> Result<()> {
        self.call_mut(id)?.push_input_fragment(fragment);
        Ok(())
    }

    /// Parse the call's buffered arguments exactly once.
    pub fn close(&mut self, id: &str) -> Result<(CloseOutcome, &ToolCall)> {
        let call = self.call_mut(id)?;
        let raw = call.take_raw_input();
        let outcome = match finalize_input(&raw) {
            Ok(input) => {
                call.input = input;
                call.status = ToolStatus::Running;
                CloseOutcome::Parsed
            }
            Err(err) => {
                let message = ToolweaveError::MalformedToolArguments {
                    call_id: call.id.clone(),
                    message: err.to_string(),
                }
                .to_string();
                tracing::warn!(call_id = %call.id, tool = %call.name, error = %err, "tool arguments are not valid JSON");
                call.input = serde_json::Value::Object(Default::default());
                call.status = ToolStatus::Error;
                call.error = Some(message.clone());
                CloseOutcome::Malformed(message)
            }
        };
        Ok((outcome, &*call))
    }

    /// Calls in the order they were opened.
    pub fn into_calls(self) -> Vec<ToolCall> {
        self.calls
    }

    fn call_mut(&mut self, id: &str) -> Result<&mut ToolCall> {
        let i = *self
            .index
            .get(id)
            .ok_or_else(|| ToolweaveError::InvalidState(format!("unknown tool call id {id}")))?;
        Ok(&mut self.calls[i])
    }
}
