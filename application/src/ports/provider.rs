//! Provider port
//!
//! Defines the interface every streaming language-model backend implements,
//! and [`DeltaStream`], the uniform lazy sequence of text fragments they
//! produce.

use async_trait::async_trait;
use chatline_domain::{InlineImage, ModelId, ProviderKind, ProviderRequest, StreamEvent};
use futures::Stream;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Errors raised before a provider stream is established.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Request does not match provider: expected {expected}, got {actual}")]
    RequestMismatch {
        expected: &'static str,
        actual: &'static str,
    },

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Cancelled")]
    Cancelled,
}

/// Handle for receiving the fragments of one provider response.
///
/// Finite, ordered and not restartable. Dropping or cancelling the handle
/// cancels the producer so the underlying connection is closed instead of
/// being left to drain.
pub struct DeltaStream {
    receiver: mpsc::Receiver<StreamEvent>,
    cancellation: CancellationToken,
}

impl DeltaStream {
    pub fn new(receiver: mpsc::Receiver<StreamEvent>, cancellation: CancellationToken) -> Self {
        Self {
            receiver,
            cancellation,
        }
    }

    /// Create a connected sender / stream pair.
    pub fn channel(buffer: usize) -> (mpsc::Sender<StreamEvent>, Self) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (tx, Self::new(rx, CancellationToken::new()))
    }

    /// A stream that yields `events` and then ends.
    pub fn from_events(events: Vec<StreamEvent>) -> Self {
        let (tx, stream) = Self::channel(events.len() + 1);
        for event in events {
            // Capacity covers every event, so this cannot fail
            let _ = tx.try_send(event);
        }
        stream
    }

    /// Token the producer watches; cancelled when this handle is cancelled or dropped.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    /// Receive the next event, or `None` once the producer is gone.
    pub async fn next_event(&mut self) -> Option<StreamEvent> {
        self.receiver.recv().await
    }

    /// Stop the producer and refuse any event still in flight.
    pub fn cancel(&mut self) {
        self.cancellation.cancel();
        self.receiver.close();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }
}

impl Stream for DeltaStream {
    type Item = StreamEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

impl Drop for DeltaStream {
    fn drop(&mut self) {
        self.cancellation.cancel();
    }
}

impl std::fmt::Debug for DeltaStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeltaStream")
            .field("cancelled", &self.cancellation.is_cancelled())
            .finish()
    }
}

/// A streaming language-model backend.
///
/// Implementations (adapters) live in the infrastructure layer.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Vocabulary this adapter speaks.
    fn kind(&self) -> ProviderKind;

    /// Open a response stream for `request`.
    ///
    /// `attachment` is only passed to adapters whose kind supports
    /// attachments.
    async fn stream(
        &self,
        model: ModelId,
        request: &ProviderRequest,
        attachment: Option<&InlineImage>,
    ) -> Result<DeltaStream, ProviderError>;
}

/// The closed set of adapters, one per [`ProviderKind`].
#[derive(Clone)]
pub struct ProviderSet {
    assistant: Arc<dyn ProviderAdapter>,
    native: Arc<dyn ProviderAdapter>,
}

impl ProviderSet {
    pub fn new(assistant: Arc<dyn ProviderAdapter>, native: Arc<dyn ProviderAdapter>) -> Self {
        Self { assistant, native }
    }

    /// Adapter that serves `model`.
    pub fn for_model(&self, model: ModelId) -> &dyn ProviderAdapter {
        match model.provider_kind() {
            ProviderKind::AssistantVocabulary => self.assistant.as_ref(),
            ProviderKind::NativeVocabulary => self.native.as_ref(),
        }
    }
}
