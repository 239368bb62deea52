//! Type definitions for the chat-turn use case.

use crate::ports::chat_repository::PersistenceError;
use crate::ports::provider::ProviderError;
use chatline_domain::{ConversationId, IdempotencyKey, MappingError};
use std::time::Duration;
use thiserror::Error;

/// Errors that can end a chat turn
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TurnError {
    #[error("Cannot build provider request: {0}")]
    Mapping(#[from] MappingError),

    #[error("Unsupported model: {0}")]
    UnsupportedModel(String),

    #[error("Provider stream failed: {0}")]
    ProviderStream(String),

    #[error("No response from provider for {0:?}")]
    StreamTimeout(Duration),

    #[error("Could not save the conversation: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("Attachment not ready: {0}")]
    AttachmentUpload(String),

    #[error("A response is still being generated")]
    TurnInFlight,

    #[error("No failed commit to retry")]
    NothingToRetry,

    #[error("Turn cancelled")]
    Cancelled,
}

impl TurnError {
    /// Check if this error represents a cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, TurnError::Cancelled)
    }

    /// Errors the user must acknowledge before continuing.
    pub fn is_blocking(&self) -> bool {
        matches!(self, TurnError::UnsupportedModel(_))
    }
}

impl From<ProviderError> for TurnError {
    fn from(e: ProviderError) -> Self {
        match e {
            ProviderError::Cancelled => TurnError::Cancelled,
            other => TurnError::ProviderStream(other.to_string()),
        }
    }
}

/// Non-fatal conditions surfaced while a turn proceeds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnWarning {
    /// The selected model cannot take images; the attachment is saved with
    /// the turn but not sent to the provider.
    AttachmentUnsupported { model: String },
}

impl std::fmt::Display for TurnWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TurnWarning::AttachmentUnsupported { model } => write!(
                f,
                "{} does not accept images; the image is saved but not sent",
                model
            ),
        }
    }
}

/// How a submission ended when it did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// Nothing to do (blank input, or bootstrap not applicable / already run).
    Ignored,
    /// The turn was streamed and saved.
    Committed {
        conversation_id: ConversationId,
        answer: String,
        idempotency_key: IdempotencyKey,
        /// The stream failed and the partial answer was saved anyway.
        partial: bool,
    },
}

impl TurnOutcome {
    pub fn answer(&self) -> Option<&str> {
        match self {
            TurnOutcome::Ignored => None,
            TurnOutcome::Committed { answer, .. } => Some(answer),
        }
    }
}
