//! Infrastructure layer for chatline
//!
//! This crate contains adapters that implement the ports defined in the
//! application layer: streaming providers, chat persistence, caching,
//! identity, attachment loading, configuration file loading and JSONL
//! turn logging.

pub mod attachment;
pub mod cache;
pub mod config;
pub mod identity;
pub mod logging;
pub mod persistence;
pub mod providers;

// Re-export commonly used types
pub use attachment::{AttachmentError, load_image};
pub use cache::InMemoryConversationCache;
pub use config::{
    ConfigLoader, ConfigValidationError, FileConfig, FileLoggingConfig, FilePersistenceConfig,
    FileReplConfig, PersistenceBackend,
};
pub use identity::StaticIdentity;
pub use logging::JsonlConversationLogger;
pub use persistence::{HttpChatRepository, InMemoryChatRepository};
pub use providers::{GeminiAdapter, GeminiSettings, OpenAiAdapter, OpenAiSettings};
