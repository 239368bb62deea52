//! Chat repository port
//!
//! Defines how the application reads conversations from, and appends finished
//! turns to, the chat API that fronts the document store.

use async_trait::async_trait;
use chatline_domain::{Conversation, ConversationId, IdempotencyKey};
use serde::Serialize;
use thiserror::Error;

/// Errors that can occur while talking to the chat API
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PersistenceError {
    /// The API answered with an error payload; `body` is surfaced verbatim.
    #[error("Chat API rejected the request ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Conversation not found: {0}")]
    NotFound(ConversationId),

    #[error("Not signed in")]
    Unauthenticated,

    #[error("Unexpected response: {0}")]
    InvalidResponse(String),
}

/// One finished turn to append to a conversation.
///
/// Serializes to the request body `{question?, answer, img?}`; the
/// idempotency key travels separately (as a request header).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TurnCommit {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question: Option<String>,
    pub answer: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub img: Option<String>,
    #[serde(skip)]
    pub idempotency_key: IdempotencyKey,
}

impl TurnCommit {
    pub fn new(idempotency_key: IdempotencyKey, answer: impl Into<String>) -> Self {
        Self {
            question: None,
            answer: answer.into(),
            img: None,
            idempotency_key,
        }
    }

    pub fn with_question(mut self, question: Option<String>) -> Self {
        self.question = question.filter(|q| !q.is_empty());
        self
    }

    pub fn with_img(mut self, img: Option<String>) -> Self {
        self.img = img;
        self
    }
}

/// Repository for conversations behind the chat API.
#[async_trait]
pub trait ChatRepository: Send + Sync {
    /// Load a conversation with its full history.
    async fn load(&self, id: &ConversationId) -> Result<Conversation, PersistenceError>;

    /// Append a finished turn, returning the id of the updated conversation.
    ///
    /// Implementations must treat a repeated `idempotency_key` as the same
    /// commit.
    async fn append_turn(
        &self,
        id: &ConversationId,
        commit: &TurnCommit,
    ) -> Result<ConversationId, PersistenceError>;
}
