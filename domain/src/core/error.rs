//! Domain error types

use thiserror::Error;

/// Domain-level errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("Unsupported model: {0}")]
    UnsupportedModel(String),

    #[error("Malformed history: {0}")]
    Mapping(#[from] MappingError),

    #[error("Invalid conversation: {0}")]
    InvalidConversation(String),
}

/// Errors raised while converting persisted history into a provider request.
///
/// These are local failures: a request that fails to map never reaches the
/// network.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MappingError {
    #[error("turn {index} has no parts")]
    EmptyParts { index: usize },

    #[error("nothing to send: history is empty and no new message was given")]
    NothingToSend,
}
