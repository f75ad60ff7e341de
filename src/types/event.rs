//! Tool-call records and the events emitted to callers.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::EnumString;

/// Lifecycle status of a tool call.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ToolStatus {
    Pending,
    Running,
    Completed,
    Error,
}

/// A tool call requested by the model during one orchestration call.
///
/// `raw_input` holds the concatenated partial-json fragments until the
/// block closes; `input` is only meaningful after that.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub input: serde_json::Value,
    #[serde(skip)]
    raw_input: String,
    pub status: ToolStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            input: serde_json::Value::Object(Default::default()),
            raw_input: String::new(),
            status: ToolStatus::Pending,
            output: None,
            error: None,
            start_time: None,
            end_time: None,
        }
    }

    /// Append a partial-json fragment in arrival order.
    pub fn push_input_fragment(&mut self, fragment: &str) {
        self.raw_input.push_str(fragment);
    }

    pub fn raw_input(&self) -> &str {
        &self.raw_input
    }

    pub(crate) fn take_raw_input(&mut self) -> String {
        std::mem::take(&mut self.raw_input)
    }

    /// Wall-clock dispatch duration, once both ends are recorded.
    pub fn duration_ms(&self) -> Option<u64> {
        let (start, end) = (self.start_time?, self.end_time?);
        Some((end - start).num_milliseconds().max(0) as u64)
    }
}

/// Events emitted to the consumer of an orchestration call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    Text {
        content: String,
    },
    ToolStart {
        tool_call: ToolCall,
    },
    ToolProgress {
        content: String,
        tool_call: ToolCall,
    },
    ToolComplete {
        tool_call: ToolCall,
    },
    ToolError {
        tool_call: ToolCall,
    },
    ToolResult {
        tool_id: String,
        input: serde_json::Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        output: Option<serde_json::Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        duration_ms: Option<u64>,
    },
}

impl StreamEvent {
    /// Build the terminal result event for a finished call.
    pub fn result_for(call: &ToolCall) -> Self {
        Self::ToolResult {
            tool_id: call.id.clone(),
            input: call.input.clone(),
            output: call.output.clone(),
            error: call.error.clone(),
            duration_ms: call.duration_ms(),
        }
    }

    /// The tool call id this event refers to, if any.
    pub fn tool_id(&self) -> Option<&str> {
        match self {
            Self::Text { .. } => None,
            Self::ToolStart { tool_call }
            | Self::ToolProgress { tool_call, .. }
            | Self::ToolComplete { tool_call }
            | Self::ToolError { tool_call } => Some(&tool_call.id),
            Self::ToolResult { tool_id, .. } => Some(tool_id),
        }
    }

    /// Render as a server-sent-events frame (`data: <json>\n\n`).
    pub fn to_sse_frame(&self) -> Result<String, serde_json::Error> {
        Ok(format!("data: {}\n\n", serde_json::to_string(self)?))
    }
}

/// Why the model ended a turn.
#[derive(Debug, Clone, PartialEq, Eq, Hash, EnumString, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
#[strum(serialize_all = "snake_case")]
pub enum StopReason {
    EndTurn,
    ToolUse,
    MaxTokens,
    StopSequence,
    PauseTurn,
    Refusal,
    #[strum(default)]
    Other(String),
}

impl StopReason {
    pub fn as_str(&self) -> &str {
        match self {
            Self::EndTurn => "end_turn",
            Self::ToolUse => "tool_use",
            Self::MaxTokens => "max_tokens",
            Self::StopSequence => "stop_sequence",
            Self::PauseTurn => "pause_turn",
            Self::Refusal => "refusal",
            Self::Other(reason) => reason,
        }
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for StopReason {
    fn from(value: String) -> Self {
        match Self::from_str(&value) {
            Ok(reason) => reason,
            Err(_) => Self::Other(value),
        }
    }
}

impl From<StopReason> for String {
    fn from(value: StopReason) -> Self {
        value.as_str().to_string()
    }
}
