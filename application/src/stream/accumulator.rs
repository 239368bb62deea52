//! Stream accumulator
//!
//! Consumes a [`DeltaStream`] into the running answer buffer, reporting every
//! change to a synchronous callback in arrival order.

use crate::ports::provider::DeltaStream;
use chatline_domain::StreamEvent;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Why the callback is being invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateKind {
    /// A non-empty fragment was appended.
    Delta,
    /// Forced flush of the whole buffer when the stream ends, so a consumer
    /// that batches updates cannot drop the tail.
    FinalFlush,
}

/// A buffer change handed to the callback.
#[derive(Debug, Clone, Copy)]
pub struct BufferUpdate<'a> {
    /// Fragment appended by this update; empty for a final flush.
    pub delta: &'a str,
    /// The whole buffer after the update.
    pub buffer: &'a str,
    pub kind: UpdateKind,
}

/// How consumption ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamOutcome {
    /// The provider finished the response.
    Completed,
    /// The provider or transport failed mid-stream.
    Failed(String),
    /// No event arrived within the inactivity timeout.
    TimedOut(Duration),
    /// The consumer went away; nothing was reported after the cancel.
    Cancelled,
}

impl StreamOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, StreamOutcome::Completed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StreamOutcome::Completed => "completed",
            StreamOutcome::Failed(_) => "failed",
            StreamOutcome::TimedOut(_) => "timed_out",
            StreamOutcome::Cancelled => "cancelled",
        }
    }
}

/// Result of consuming one stream. `text` keeps whatever arrived, including
/// the partial answer of a failed stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccumulatedAnswer {
    pub text: String,
    pub outcome: StreamOutcome,
    /// Number of non-empty fragments applied.
    pub fragments: usize,
}

/// Folds provider fragments into an append-only buffer.
#[derive(Debug, Clone)]
pub struct StreamAccumulator {
    inactivity_timeout: Duration,
}

impl StreamAccumulator {
    pub fn new(inactivity_timeout: Duration) -> Self {
        Self { inactivity_timeout }
    }

    pub fn inactivity_timeout(&self) -> Duration {
        self.inactivity_timeout
    }

    /// Consume `stream` until it ends, fails, stalls or `cancellation` fires.
    ///
    /// Fragments are applied strictly in arrival order and never coalesced.
    /// Empty fragments are skipped. Unless cancelled, the callback receives
    /// exactly one [`UpdateKind::FinalFlush`] after the last fragment.
    pub async fn consume<F>(
        &self,
        mut stream: DeltaStream,
        cancellation: &CancellationToken,
        mut on_update: F,
    ) -> AccumulatedAnswer
    where
        F: FnMut(BufferUpdate<'_>),
    {
        let mut text = String::new();
        let mut fragments = 0usize;

        let outcome = loop {
            let next = tokio::select! {
                biased;
                _ = cancellation.cancelled() => {
                    stream.cancel();
                    debug!("Stream cancelled after {} fragments", fragments);
                    return AccumulatedAnswer {
                        text,
                        outcome: StreamOutcome::Cancelled,
                        fragments,
                    };
                }
                next = tokio::time::timeout(self.inactivity_timeout, stream.next_event()) => next,
            };

            match next {
                Err(_) => {
                    stream.cancel();
                    warn!(
                        "No stream activity for {:?}, cancelling ({} bytes received)",
                        self.inactivity_timeout,
                        text.len()
                    );
                    break StreamOutcome::TimedOut(self.inactivity_timeout);
                }
                Ok(Some(StreamEvent::Delta(fragment))) => {
                    if fragment.is_empty() {
                        continue;
                    }
                    text.push_str(&fragment);
                    fragments += 1;
                    on_update(BufferUpdate {
                        delta: &fragment,
                        buffer: &text,
                        kind: UpdateKind::Delta,
                    });
                }
                Ok(Some(StreamEvent::Completed)) => break StreamOutcome::Completed,
                Ok(Some(StreamEvent::Error(e))) => {
                    warn!("Stream failed after {} bytes: {}", text.len(), e);
                    break StreamOutcome::Failed(e);
                }
                Ok(None) => {
                    // Producer ended without a terminal event
                    debug!("Stream channel closed ({} bytes)", text.len());
                    break StreamOutcome::Completed;
                }
            }
        };

        on_update(BufferUpdate {
            delta: "",
            buffer: &text,
            kind: UpdateKind::FinalFlush,
        });

        AccumulatedAnswer {
            text,
            outcome,
            fragments,
        }
    }
}

impl Default for StreamAccumulator {
    fn default() -> Self {
        Self::new(Duration::from_secs(60))
    }
}
