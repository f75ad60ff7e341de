//! The caller-facing event sequence of one orchestration call.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::stream::{BoxStream, Stream};
use futures::StreamExt;
use uuid::Uuid;

use crate::error::{Result, ToolweaveError};
use crate::types::{StopReason, StreamEvent};

/// Internal item type: events, then a single terminal stop reason.
#[derive(Debug)]
pub(crate) enum Emission {
    Event(StreamEvent),
    Finished(StopReason),
}

/// Lazy, forward-only sequence of [`StreamEvent`]s.
///
/// The stream ends after the final turn; the reason that turn stopped is
/// then available from [`EventStream::stop_reason`]. A fatal error is
/// yielded once as `Err` and ends the stream. Dropping the stream stops
/// the loop: no further model invocation is made, and a tool call that
/// is already running finishes in the background.
pub struct EventStream {
    run_id: Uuid,
    inner: BoxStream<'static, Result<Emission>>,
    stop_reason: Option<StopReason>,
    done: bool,
}

/// Everything a fully drained [`EventStream`] produced.
#[derive(Debug, Clone, PartialEq)]
pub struct RunOutcome {
    pub events: Vec<StreamEvent>,
    pub stop_reason: StopReason,
}

impl EventStream {
    pub(crate) fn new(run_id: Uuid, inner: BoxStream<'static, Result<Emission>>) -> Self {
        Self {
            run_id,
            inner,
            stop_reason: None,
            done: false,
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// The final turn's stop reason; `None` until the stream has ended
    /// successfully.
    pub fn stop_reason(&self) -> Option<&StopReason> {
        self.stop_reason.as_ref()
    }

    /// Drain the stream, failing on the first fatal error.
    pub async fn collect_all(mut self) -> Result<RunOutcome> {
        let mut events = Vec::new();
        while let Some(event) = self.next().await {
            events.push(event?);
        }
        let stop_reason = self.stop_reason.take().ok_or_else(|| {
            ToolweaveError::InvalidState("event stream ended without a stop reason".into())
        })?;
        Ok(RunOutcome {
            events,
            stop_reason,
        })
    }
}

impl Stream for EventStream {
    type Item = Result<StreamEvent>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.done {
            return Poll::Ready(None);
        }
        match self.inner.poll_next_unpin(cx) {
            Poll::Ready(Some(Ok(Emission::Event(event)))) => Poll::Ready(Some(Ok(event))),
            Poll::Ready(Some(Ok(Emission::Finished(reason)))) => {
                self.stop_reason = Some(reason);
                self.done = true;
                Poll::Ready(None)
            }
            Poll::Ready(Some(Err(err))) => {
                self.done = true;
                Poll::Ready(Some(Err(err)))
            }
            Poll::Ready(None) => {
                self.done = true;
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl std::fmt::Debug for EventStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventStream")
            .field("run_id", &self.run_id)
            .field("stop_reason", &self.stop_reason)
            .field("done", &self.done)
            .finish()
    }
}
