//! Application layer for chatline
//!
//! This crate contains use cases, port definitions, stream consumption and
//! application configuration. It depends only on the domain layer.

pub mod config;
pub mod ports;
pub mod stream;
pub mod use_cases;

// Re-export commonly used types
pub use config::{DEFAULT_SCROLL_THRESHOLD, StreamParams};
pub use ports::{
    chat_repository::{ChatRepository, PersistenceError, TurnCommit},
    conversation_cache::{ConversationCache, NoConversationCache},
    conversation_logger::{ConversationEvent, ConversationLogger, NoConversationLogger},
    identity::{AuthenticatedUser, IdentityProvider},
    provider::{DeltaStream, ProviderAdapter, ProviderError, ProviderSet},
    turn_observer::{NoTurnObserver, TurnObserver},
    viewport::{NoViewPort, ViewPort},
};
pub use stream::{
    accumulator::{
        AccumulatedAnswer, BufferUpdate, StreamAccumulator, StreamOutcome, UpdateKind,
    },
    scroll::ScrollAnchor,
};
pub use use_cases::chat_turn::{ChatTurnController, TurnError, TurnOutcome, TurnWarning};
pub use use_cases::load_conversation::LoadConversationUseCase;
pub use use_cases::persist_turn::PersistenceGate;
