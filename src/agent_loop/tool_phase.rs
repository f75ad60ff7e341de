//! Tool phase of a turn: dispatch, lifecycle events, transcript blocks.

use std::sync::Arc;

use tracing::warn;

use crate::tools::ToolDispatcher;
use crate::types::{ContentBlock, Message, Role, StreamEvent, ToolCall, ToolStatus};

/// Run one call on its own task so it finishes even if the caller stops
/// consuming events mid-dispatch. A panicking tool becomes a tool error.
pub(crate) async fn dispatch_detached(dispatcher: Arc<ToolDispatcher>, call: ToolCall) -> ToolCall {
    let fallback = call.clone();
    let handle = tokio::spawn(async move {
        let mut call = call;
        dispatcher.dispatch(&mut call).await;
        call
    });
    match handle.await {
        Ok(call) => call,
        Err(err) => {
            warn!(call_id = %fallback.id, tool = %fallback.name, error = %err, "tool task failed");
            let mut call = fallback;
            call.status = ToolStatus::Error;
            call.error = Some(format!("tool task failed: {err}"));
            call.end_time = Some(chrono::Utc::now());
            call
        }
    }
}

/// Marks the call as running and builds its progress event.
pub(crate) fn progress_event(call: &mut ToolCall) -> StreamEvent {
    call.status = ToolStatus::Running;
    StreamEvent::ToolProgress {
        content: format!("Running {}", call.name),
        tool_call: call.clone(),
    }
}

/// `ToolComplete` or `ToolError`, followed by the terminal `ToolResult`.
pub(crate) fn completion_events(call: &ToolCall) -> [StreamEvent; 2] {
    let status = match call.status {
        ToolStatus::Completed => StreamEvent::ToolComplete {
            tool_call: call.clone(),
        },
        _ => StreamEvent::ToolError {
            tool_call: call.clone(),
        },
    };
    [status, StreamEvent::result_for(call)]
}

/// The assistant message the provider produced this turn, rebuilt from
/// streamed fragments: optional text, then tool uses in open order.
pub(crate) fn assistant_message(turn_text: &str, calls: &[ToolCall]) -> Message {
    let mut content = Vec::with_capacity(calls.len() + 1);
    if !turn_text.is_empty() {
        content.push(ContentBlock::text(turn_text));
    }
    content.extend(calls.iter().map(|call| ContentBlock::ToolUse {
        id: call.id.clone(),
        name: call.name.clone(),
        input: call.input.clone(),
    }));
    Message {
        role: Role::Assistant,
        content,
    }
}

/// One user message carrying every tool result of the turn, in open order.
pub(crate) fn tool_results_message(calls: &[ToolCall]) -> Message {
    let content = calls
        .iter()
        .map(|call| match (&call.status, &call.error) {
            (ToolStatus::Completed, None) => ContentBlock::ToolResult {
                tool_use_id: call.id.clone(),
                content: call.output.clone().unwrap_or(serde_json::Value::Null),
                is_error: false,
            },
            (ToolStatus::Completed, Some(argument_error)) => ContentBlock::ToolResult {
                tool_use_id: call.id.clone(),
                content: serde_json::Value::String(format!(
                    "{argument_error}. The tool ran with empty input and returned: {}",
                    call.output.clone().unwrap_or(serde_json::Value::Null)
                )),
                is_error: true,
            },
            (_, error) => ContentBlock::ToolResult {
                tool_use_id: call.id.clone(),
                content: serde_json::Value::String(
                    error.clone().unwrap_or_else(|| "tool call failed".to_string()),
                ),
                is_error: true,
            },
        })
        .collect();
    Message {
        role: Role::User,
        content,
    }
}
