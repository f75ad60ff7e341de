//! Wire chunk model and the decoder that turns chunks into semantic events.

use serde::{Deserialize, Serialize};

use crate::error::{Result, ToolweaveError};
use crate::types::StopReason;

/// One chunk of a streamed model response, discriminated by `type`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WireChunk {
    MessageStart {
        #[serde(default)]
        message: serde_json::Value,
    },
    ContentBlockStart {
        #[serde(default)]
        index: usize,
        content_block: WireBlock,
    },
    ContentBlockDelta {
        #[serde(default)]
        index: usize,
        delta: WireDelta,
    },
    ContentBlockStop {
        #[serde(default)]
        index: usize,
    },
    MessageDelta {
        delta: MessageDeltaBody,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        usage: Option<serde_json::Value>,
    },
    MessageStop,
    Ping,
    Error {
        error: WireError,
    },
    #[serde(other)]
    Unknown,
}

/// Block header carried by `content_block_start`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WireBlock {
    Text {
        #[serde(default)]
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
    },
    #[serde(other)]
    Unknown,
}

/// Incremental payload carried by `content_block_delta`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WireDelta {
    TextDelta { text: String },
    InputJsonDelta { partial_json: String },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MessageDeltaBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<StopReason>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WireError {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub message: String,
}

impl WireChunk {
    pub fn text(text: impl Into<String>) -> Self {
        Self::ContentBlockDelta {
            index: 0,
            delta: WireDelta::TextDelta { text: text.into() },
        }
    }

    pub fn tool_use_start(index: usize, id: impl Into<String>, name: impl Into<String>) -> Self {
        Self::ContentBlockStart {
            index,
            content_block: WireBlock::ToolUse {
                id: id.into(),
                name: name.into(),
            },
        }
    }

    pub fn partial_json(index: usize, fragment: impl Into<String>) -> Self {
        Self::ContentBlockDelta {
            index,
            delta: WireDelta::InputJsonDelta {
                partial_json: fragment.into(),
            },
        }
    }

    pub fn block_stop(index: usize) -> Self {
        Self::ContentBlockStop { index }
    }

    pub fn stop(reason: StopReason) -> Self {
        Self::MessageDelta {
            delta: MessageDeltaBody {
                stop_reason: Some(reason),
            },
            usage: None,
        }
    }
}

/// Semantic events produced by [`StreamDecoder`].
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedEvent {
    Text(String),
    ToolCallOpened { id: String, name: String },
    ToolCallArgument { id: String, fragment: String },
    ToolCallClosed { id: String },
    TurnEnd(StopReason),
}

#[derive(Debug, Clone, PartialEq)]
enum OpenBlock {
    Text,
    ToolUse(String),
    Other,
}

/// Tracks the currently open content block for one turn.
///
/// At most one block is open at a time; partial-json fragments always
/// belong to the open tool-use block.
#[derive(Debug, Default)]
pub struct StreamDecoder {
    open: Option<OpenBlock>,
    stop_reason: Option<StopReason>,
}

impl StreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop reason observed so far in this turn.
    pub fn stop_reason(&self) -> Option<&StopReason> {
        self.stop_reason.as_ref()
    }

    /// Id of the tool-use block that is still open, if any.
    pub fn open_tool_call(&self) -> Option<&str> {
        match &self.open {
            Some(OpenBlock::ToolUse(id)) => Some(id.as_str()),
            _ => None,
        }
    }

    /// Decode one chunk. Chunks with no semantic meaning yield `None`.
    pub fn decode(&mut self, chunk: WireChunk) -> Result<Option<DecodedEvent>> {
        match chunk {
            WireChunk::ContentBlockStart { content_block, .. } => {
                if let Some(OpenBlock::ToolUse(id)) = &self.open {
                    return Err(ToolweaveError::Stream(format!(
                        "content block opened while tool call {id} is still open"
                    )));
                }
                match content_block {
                    WireBlock::ToolUse { id, name } => {
                        self.open = Some(OpenBlock::ToolUse(id.clone()));
                        Ok(Some(DecodedEvent::ToolCallOpened { id, name }))
                    }
                    WireBlock::Text { text } => {
                        self.open = Some(OpenBlock::Text);
                        Ok((!text.is_empty()).then_some(DecodedEvent::Text(text)))
                    }
                    WireBlock::Unknown => {
                        self.open = Some(OpenBlock::Other);
                        Ok(None)
                    }
                }
            }
            WireChunk::ContentBlockDelta { delta, .. } => match delta {
                WireDelta::TextDelta { text } => {
                    Ok((!text.is_empty()).then_some(DecodedEvent::Text(text)))
                }
                WireDelta::InputJsonDelta { partial_json } => match &self.open {
                    Some(OpenBlock::ToolUse(id)) => Ok(Some(DecodedEvent::ToolCallArgument {
                        id: id.clone(),
                        fragment: partial_json,
                    })),
                    _ => Err(ToolweaveError::Stream(
                        "input_json_delta received with no open tool call".into(),
                    )),
                },
                WireDelta::Unknown => Ok(None),
            },
            WireChunk::ContentBlockStop { .. } => match self.open.take() {
                Some(OpenBlock::ToolUse(id)) => Ok(Some(DecodedEvent::ToolCallClosed { id })),
                _ => Ok(None),
            },
            WireChunk::MessageDelta { delta, .. } => match delta.stop_reason {
                Some(reason) => {
                    self.stop_reason = Some(reason.clone());
                    Ok(Some(DecodedEvent::TurnEnd(reason)))
                }
                None => Ok(None),
            },
            WireChunk::Error { error } => Err(ToolweaveError::Stream(format!(
                "{}: {}",
                error.kind, error.message
            ))),
            WireChunk::MessageStart { .. }
            | WireChunk::MessageStop
            | WireChunk::Ping
            | WireChunk::Unknown => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn chunk(value: serde_json::Value) -> WireChunk {
        serde_json::from_value(value).expect("chunk should parse")
    }

    #[test]
    fn parses_anthropic_wire_shapes() {
        assert_eq!(
            chunk(json!({
                "type": "content_block_start",
                "index": 1,
                "content_block": {"type": "tool_use", "id": "toolu_1", "name": "files__read", "input": {}}
            })),
            WireChunk::tool_use_start(1, "toolu_1", "files__read")
        );
        assert_eq!(
            chunk(json!({
                "type": "content_block_delta",
                "index": 1,
                "delta": {"type": "input_json_delta", "partial_json": "{\"pa"}
            })),
            WireChunk::partial_json(1, "{\"pa")
        );
        assert_eq!(
            chunk(json!({
                "type": "message_delta",
                "delta": {"stop_reason": "end_turn", "stop_sequence": null},
                "usage": {"output_tokens": 12}
            })),
            WireChunk::MessageDelta {
                delta: MessageDeltaBody {
                    stop_reason: Some(StopReason::EndTurn)
                },
                usage: Some(json!({"output_tokens": 12})),
            }
        );
        assert_eq!(chunk(json!({"type": "ping"})), WireChunk::Ping);
        assert_eq!(chunk(json!({"type": "future_event", "x": 1})), WireChunk::Unknown);
        assert_eq!(
            chunk(json!({
                "type": "content_block_delta",
                "index": 0,
                "delta": {"type": "thinking_delta", "thinking": "hmm"}
            })),
            WireChunk::ContentBlockDelta {
                index: 0,
                delta: WireDelta::Unknown
            }
        );
    }

    #[test]
    fn decodes_tool_call_lifecycle() {
        let mut decoder = StreamDecoder::new();
        let events: Vec<_> = [
            WireChunk::text("Let me look."),
            WireChunk::tool_use_start(1, "toolu_1", "files__read"),
            WireChunk::partial_json(1, "{\"path\""),
            WireChunk::partial_json(1, ":\"/tmp/x\"}"),
            WireChunk::block_stop(1),
            WireChunk::stop(StopReason::ToolUse),
        ]
        .into_iter()
        .filter_map(|c| decoder.decode(c).unwrap())
        .collect();

        assert_eq!(
            events,
            vec![
                DecodedEvent::Text("Let me look.".into()),
                DecodedEvent::ToolCallOpened {
                    id: "toolu_1".into(),
                    name: "files__read".into()
                },
                DecodedEvent::ToolCallArgument {
                    id: "toolu_1".into(),
                    fragment: "{\"path\"".into()
                },
                DecodedEvent::ToolCallArgument {
                    id: "toolu_1".into(),
                    fragment: ":\"/tmp/x\"}".into()
                },
                DecodedEvent::ToolCallClosed { id: "toolu_1".into() },
                DecodedEvent::TurnEnd(StopReason::ToolUse),
            ]
        );
        assert_eq!(decoder.stop_reason(), Some(&StopReason::ToolUse));
    }

    #[test]
    fn closing_a_text_block_is_silent() {
        let mut decoder = StreamDecoder::new();
        let start = chunk(json!({
            "type": "content_block_start",
            "index": 0,
            "content_block": {"type": "text", "text": ""}
        }));
        assert_eq!(decoder.decode(start).unwrap(), None);
        assert_eq!(decoder.decode(WireChunk::block_stop(0)).unwrap(), None);
    }

    #[test]
    fn open_tool_call_is_tracked_until_block_stop() {
        let mut decoder = StreamDecoder::new();
        assert_eq!(decoder.open_tool_call(), None);
        decoder
            .decode(WireChunk::tool_use_start(1, "toolu_1", "files__read"))
            .unwrap();
        assert_eq!(decoder.open_tool_call(), Some("toolu_1"));
        decoder.decode(WireChunk::block_stop(1)).unwrap();
        assert_eq!(decoder.open_tool_call(), None);
    }

    #[test]
    fn orphan_partial_json_is_a_stream_error() {
        let mut decoder = StreamDecoder::new();
        let err = decoder
            .decode(WireChunk::partial_json(0, "{}"))
            .expect_err("fragment without open tool call");
        assert!(matches!(err, ToolweaveError::Stream(_)));
    }

    #[test]
    fn nested_tool_open_is_rejected() {
        let mut decoder = StreamDecoder::new();
        decoder
            .decode(WireChunk::tool_use_start(0, "a", "x__y"))
            .unwrap();
        assert!(decoder
            .decode(WireChunk::tool_use_start(1, "b", "x__z"))
            .is_err());
    }

    #[test]
    fn wire_error_chunk_surfaces_message() {
        let mut decoder = StreamDecoder::new();
        let err = decoder
            .decode(chunk(json!({
                "type": "error",
                "error": {"type": "overloaded_error", "message": "Overloaded"}
            })))
            .unwrap_err();
        assert_eq!(err.to_string(), "Stream error: overloaded_error: Overloaded");
    }
}
