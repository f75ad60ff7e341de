//! Turn-loop controller: invoke the model, decode, run tools, repeat.

use std::sync::Arc;

use futures::future::join_all;
use futures::stream::{BoxStream, Stream};
use futures::StreamExt;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::{LoopConfig, ToolExecutionMode};
use crate::error::{Result, ToolweaveError};
use crate::provider::{ChunkStream, ModelClient, ModelRequest};
use crate::stream::{CloseOutcome, DecodedEvent, StreamDecoder, ToolCallAccumulator};
use crate::tools::{ToolDefinition, ToolDispatcher};
use crate::transcript::build_transcript;
use crate::types::{ChatMessage, Message, StopReason, StreamEvent, ToolCall};

use super::events::{Emission, EventStream};
use super::tool_phase::{
    assistant_message, completion_events, dispatch_detached, progress_event, tool_results_message,
};

/// Drives a multi-turn conversation with a streaming model and a set of
/// capability providers.
///
/// The orchestrator is cheap to share; each [`Orchestrator::run`] call owns
/// its own transcript.
#[derive(Clone)]
pub struct Orchestrator {
    model: Arc<dyn ModelClient>,
    dispatcher: Arc<ToolDispatcher>,
    config: LoopConfig,
}

impl Orchestrator {
    pub fn new(model: Arc<dyn ModelClient>, dispatcher: ToolDispatcher, config: LoopConfig) -> Self {
        let dispatcher = match config.tool_timeout() {
            Some(timeout) => dispatcher.with_timeout(timeout),
            None => dispatcher,
        };
        Self {
            model,
            dispatcher: Arc::new(dispatcher),
            config,
        }
    }

    pub fn config(&self) -> &LoopConfig {
        &self.config
    }

    /// Start an orchestration call from stored history plus a new user input.
    pub fn run(&self, history: &[ChatMessage], input: &str) -> EventStream {
        self.run_messages(build_transcript(history, input))
    }

    /// Start an orchestration call from an already-built transcript.
    pub fn run_messages(&self, messages: Vec<Message>) -> EventStream {
        let run_id = Uuid::new_v4();
        let model = Arc::clone(&self.model);
        let dispatcher = Arc::clone(&self.dispatcher);
        let config = self.config.clone();

        let stream = async_stream::try_stream! {
            let tools = dispatcher.tool_definitions().await?;
            let mut messages = messages;
            let mut turn = 0usize;

            debug!(%run_id, provider = model.provider_name(), tools = tools.len(), "orchestration start");

            loop {
                turn += 1;
                check_turn_budget(turn, config.max_turns)?;

                let request = build_request(&config, &messages, &tools);
                let mut chunks = config
                    .retry
                    .execute("open model stream", || model.stream(&request))
                    .await?;

                let mut decoder = StreamDecoder::new();
                let mut calls = ToolCallAccumulator::new();
                let mut turn_text = String::new();

                while let Some(chunk) = next_chunk(&mut chunks, &config).await? {
                    let Some(decoded) = decoder.decode(chunk)? else {
                        continue;
                    };
                    match decoded {
                        DecodedEvent::Text(content) => {
                            turn_text.push_str(&content);
                            yield Emission::Event(StreamEvent::Text { content });
                        }
                        DecodedEvent::ToolCallOpened { id, name } => {
                            let tool_call = calls.open(id, name)?.clone();
                            yield Emission::Event(StreamEvent::ToolStart { tool_call });
                        }
                        DecodedEvent::ToolCallArgument { id, fragment } => {
                            calls.append(&id, &fragment)?;
                        }
                        DecodedEvent::ToolCallClosed { id } => {
                            let (outcome, call) = calls.close(&id)?;
                            if let CloseOutcome::Malformed(_) = outcome {
                                let tool_call = call.clone();
                                yield Emission::Event(StreamEvent::ToolError { tool_call });
                            }
                        }
                        DecodedEvent::TurnEnd(_) => {}
                    }
                }

                // A block cut off by the end of the turn still gets its
                // buffered arguments parsed.
                if let Some(id) = decoder.open_tool_call() {
                    warn!(%run_id, call_id = %id, "turn ended with tool call still open");
                    let (outcome, call) = calls.close(id)?;
                    if let CloseOutcome::Malformed(_) = outcome {
                        let tool_call = call.clone();
                        yield Emission::Event(StreamEvent::ToolError { tool_call });
                    }
                }

                let stop_reason = turn_stop_reason(&decoder)?;
                debug!(
                    %run_id,
                    turn,
                    stop_reason = %stop_reason,
                    tool_calls = calls.len(),
                    text_len = turn_text.len(),
                    "turn complete"
                );

                if calls.is_empty() {
                    debug!(%run_id, turns = turn, "orchestration done");
                    yield Emission::Finished(stop_reason);
                    break;
                }

                let mut calls = calls.into_calls();
                messages.push(assistant_message(&turn_text, &calls));

                match config.tool_execution {
                    ToolExecutionMode::Sequential => {
                        for call in calls.iter_mut() {
                            let progress = progress_event(call);
                            yield Emission::Event(progress);
                            *call = dispatch_detached(Arc::clone(&dispatcher), call.clone()).await;
                            for event in completion_events(call) {
                                yield Emission::Event(event);
                            }
                        }
                    }
                    ToolExecutionMode::Concurrent => {
                        for call in calls.iter_mut() {
                            let progress = progress_event(call);
                            yield Emission::Event(progress);
                        }
                        calls = run_concurrently(&dispatcher, calls).await;
                        for call in &calls {
                            for event in completion_events(call) {
                                yield Emission::Event(event);
                            }
                        }
                    }
                }

                messages.push(tool_results_message(&calls));
            }
        };

        EventStream::new(run_id, boxed(stream))
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("model", &self.model.provider_name())
            .field("dispatcher", &self.dispatcher)
            .field("config", &self.config)
            .finish()
    }
}

fn boxed<S>(stream: S) -> BoxStream<'static, Result<Emission>>
where
    S: Stream<Item = Result<Emission>> + Send + 'static,
{
    Box::pin(stream)
}

fn check_turn_budget(turn: usize, max_turns: usize) -> Result<()> {
    if turn > max_turns {
        return Err(ToolweaveError::MaxTurnsExceeded { max_turns });
    }
    Ok(())
}

fn build_request(config: &LoopConfig, messages: &[Message], tools: &[ToolDefinition]) -> ModelRequest {
    ModelRequest::new(messages.to_vec(), tools.to_vec(), config.max_output_tokens)
        .with_system(config.system_prompt.clone())
}

/// Next chunk of the turn, bounded by the idle timeout when configured.
async fn next_chunk(
    chunks: &mut ChunkStream,
    config: &LoopConfig,
) -> Result<Option<crate::stream::WireChunk>> {
    let next = match config.stream_idle_timeout() {
        Some(idle) => tokio::time::timeout(idle, chunks.next())
            .await
            .map_err(|_| ToolweaveError::Timeout(idle.as_millis() as u64))?,
        None => chunks.next().await,
    };
    next.transpose()
}

/// A turn whose stream ends without `message_delta` was cut off.
fn turn_stop_reason(decoder: &StreamDecoder) -> Result<StopReason> {
    decoder
        .stop_reason()
        .cloned()
        .ok_or_else(|| ToolweaveError::Stream("model stream ended without a stop reason".into()))
}

async fn run_concurrently(dispatcher: &Arc<ToolDispatcher>, calls: Vec<ToolCall>) -> Vec<ToolCall> {
    join_all(
        calls
            .into_iter()
            .map(|call| dispatch_detached(Arc::clone(dispatcher), call)),
    )
    .await
}
