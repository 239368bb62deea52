//! Chat persistence adapters.
//!
//! - [`HttpChatRepository`] — the chat API over HTTP
//! - [`InMemoryChatRepository`] — process-local store for offline use and tests

mod http_repository;
mod memory;

pub use http_repository::{HttpChatRepository, IDEMPOTENCY_HEADER};
pub use memory::InMemoryChatRepository;
