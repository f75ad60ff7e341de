//! Shared test helpers: scripted model client and recording providers.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::StreamExt;
use serde_json::json;

use toolweave::error::{Result, ToolweaveError};
use toolweave::provider::{ChunkStream, ModelClient, ModelRequest};
use toolweave::stream::WireChunk;
use toolweave::tools::{CapabilityProvider, ToolDefinition};
use toolweave::types::{StopReason, StreamEvent};

/// One scripted model turn.
pub type Turn = Vec<Result<WireChunk>>;

/// A model client that replays scripted turns and records every request.
#[derive(Default)]
pub struct MockModelClient {
    turns: Mutex<VecDeque<Turn>>,
    open_failures: Mutex<VecDeque<ToolweaveError>>,
    repeat: Option<Vec<WireChunk>>,
    hang_after: Option<Vec<WireChunk>>,
    requests: Mutex<Vec<ModelRequest>>,
}

impl MockModelClient {
    pub fn new(turns: Vec<Turn>) -> Self {
        Self {
            turns: Mutex::new(turns.into()),
            ..Default::default()
        }
    }

    /// Replays the same turn forever.
    pub fn looping(turn: Vec<WireChunk>) -> Self {
        Self {
            repeat: Some(turn),
            ..Default::default()
        }
    }

    /// Emits `chunks` and then never produces another chunk.
    pub fn hanging(chunks: Vec<WireChunk>) -> Self {
        Self {
            hang_after: Some(chunks),
            ..Default::default()
        }
    }

    /// Fail the next `stream` call before any chunk is produced.
    pub fn fail_next_open(self, err: ToolweaveError) -> Self {
        self.open_failures.lock().unwrap().push_back(err);
        self
    }

    pub fn requests(&self) -> Vec<ModelRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn invocations(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl ModelClient for MockModelClient {
    fn provider_name(&self) -> &str {
        "mock"
    }

    async fn stream(&self, request: &ModelRequest) -> Result<ChunkStream> {
        self.requests.lock().unwrap().push(request.clone());
        if let Some(err) = self.open_failures.lock().unwrap().pop_front() {
            return Err(err);
        }
        if let Some(chunks) = &self.hang_after {
            let head = futures::stream::iter(chunks.clone().into_iter().map(Ok));
            return Ok(head.chain(futures::stream::pending()).boxed());
        }
        if let Some(turn) = &self.repeat {
            return Ok(futures::stream::iter(turn.clone().into_iter().map(Ok)).boxed());
        }
        let turn = self
            .turns
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| ToolweaveError::InvalidState("no scripted turn left".into()))?;
        Ok(futures::stream::iter(turn).boxed())
    }
}

/// A turn that streams `fragments` as text and ends with `end_turn`.
pub fn text_turn(fragments: &[&str]) -> Turn {
    let mut turn: Turn = fragments.iter().map(|f| Ok(WireChunk::text(*f))).collect();
    turn.push(Ok(WireChunk::stop(StopReason::EndTurn)));
    turn
}

/// A turn requesting tools, each given as `(id, name, argument fragments)`.
pub fn tool_turn(text: Option<&str>, calls: &[(&str, &str, &[&str])]) -> Vec<WireChunk> {
    let mut turn = Vec::new();
    if let Some(text) = text {
        turn.push(WireChunk::text(text));
        turn.push(WireChunk::block_stop(0));
    }
    for (i, (id, name, fragments)) in calls.iter().enumerate() {
        let index = i + 1;
        turn.push(WireChunk::tool_use_start(index, *id, *name));
        for fragment in fragments.iter() {
            turn.push(WireChunk::partial_json(index, *fragment));
        }
        turn.push(WireChunk::block_stop(index));
    }
    turn.push(WireChunk::stop(StopReason::ToolUse));
    turn
}

pub fn ok_turn(chunks: Vec<WireChunk>) -> Turn {
    chunks.into_iter().map(Ok).collect()
}

/// Provider that records every call and answers from a closure.
pub struct RecordingProvider {
    tools: Vec<ToolDefinition>,
    pub calls: Mutex<Vec<(String, serde_json::Value)>>,
    respond: Box<dyn Fn(&str, &serde_json::Value) -> Result<serde_json::Value> + Send + Sync>,
}

impl RecordingProvider {
    pub fn new<F>(tool_names: &[&str], respond: F) -> Arc<Self>
    where
        F: Fn(&str, &serde_json::Value) -> Result<serde_json::Value> + Send + Sync + 'static,
    {
        Arc::new(Self {
            tools: tool_names
                .iter()
                .map(|name| ToolDefinition::new(*name, format!("{name} tool"), json!({"type": "object"})))
                .collect(),
            calls: Mutex::new(Vec::new()),
            respond: Box::new(respond),
        })
    }

    pub fn calls(&self) -> Vec<(String, serde_json::Value)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CapabilityProvider for RecordingProvider {
    async fn list_tools(&self) -> Result<Vec<ToolDefinition>> {
        Ok(self.tools.clone())
    }

    async fn call_tool(&self, tool_id: &str, input: serde_json::Value) -> Result<serde_json::Value> {
        self.calls
            .lock()
            .unwrap()
            .push((tool_id.to_string(), input.clone()));
        (self.respond)(tool_id, &input)
    }
}

/// Short labels for event sequences, e.g. `"start:toolu_1"`.
pub fn labels(events: &[StreamEvent]) -> Vec<String> {
    events
        .iter()
        .map(|event| match event {
            StreamEvent::Text { content } => format!("text:{content}"),
            StreamEvent::ToolStart { tool_call } => format!("start:{}", tool_call.id),
            StreamEvent::ToolProgress { tool_call, .. } => format!("progress:{}", tool_call.id),
            StreamEvent::ToolComplete { tool_call } => format!("complete:{}", tool_call.id),
            StreamEvent::ToolError { tool_call } => format!("error:{}", tool_call.id),
            StreamEvent::ToolResult { tool_id, .. } => format!("result:{tool_id}"),
        })
        .collect()
}
