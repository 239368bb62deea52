//! Conversation cache port
//!
//! Cached views of conversations held by the presentation layer. The
//! persistence gate invalidates an entry after a successful commit so the next
//! read reflects the new turn.

use chatline_domain::{Conversation, ConversationId};

pub trait ConversationCache: Send + Sync {
    fn get(&self, id: &ConversationId) -> Option<Conversation>;

    fn put(&self, conversation: Conversation);

    fn invalidate(&self, id: &ConversationId);
}

/// Cache that stores nothing.
pub struct NoConversationCache;

impl ConversationCache for NoConversationCache {
    fn get(&self, _id: &ConversationId) -> Option<Conversation> {
        None
    }

    fn put(&self, _conversation: Conversation) {}

    fn invalidate(&self, _id: &ConversationId) {}
}
