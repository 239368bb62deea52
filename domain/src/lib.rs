//! Domain layer for chatline
//!
//! This crate contains conversations, per-turn stream state and the mapping
//! from persisted history to provider requests. It has no dependencies on
//! infrastructure or presentation concerns.
//!
//! # Core Concepts
//!
//! - **Conversation**: a persisted, provider-agnostic chat history bound to one model
//! - **Turn**: one user prompt plus the model's response
//! - **Delta**: an incremental text fragment of a streaming response

pub mod conversation;
pub mod core;
pub mod stream;
pub mod util;

// Re-export commonly used types
pub use conversation::{
    attachment::{InlineImage, PendingAttachment, StoredAsset, UploadState},
    entities::{Conversation, ConversationId, ConversationTurn, Part, Role},
    idempotency::IdempotencyKey,
    mapping::{
        ChatCompletionRequest, ChatMessage, ChatRole, DEFAULT_SYSTEM_PROMPT, NativeChatRequest,
        NativeContent, ProviderRequest, to_provider_request,
    },
};
pub use crate::core::{
    error::{DomainError, MappingError},
    model::{ModelId, ProviderKind},
};
pub use stream::{
    event::StreamEvent,
    scroll::{AnchorState, ScrollOrigin, ScrollTarget, ViewportMetrics},
    state::{StreamState, TurnPhase},
};
