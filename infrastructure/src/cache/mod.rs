//! In-memory conversation cache

use chatline_application::ConversationCache;
use chatline_domain::{Conversation, ConversationId};
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::trace;

#[derive(Default)]
pub struct InMemoryConversationCache {
    entries: RwLock<HashMap<ConversationId, Conversation>>,
}

impl InMemoryConversationCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ConversationCache for InMemoryConversationCache {
    fn get(&self, id: &ConversationId) -> Option<Conversation> {
        self.entries.read().ok()?.get(id).cloned()
    }

    fn put(&self, conversation: Conversation) {
        if let Ok(mut entries) = self.entries.write() {
            entries.insert(conversation.id.clone(), conversation);
        }
    }

    fn invalidate(&self, id: &ConversationId) {
        if let Ok(mut entries) = self.entries.write()
            && entries.remove(id).is_some()
        {
            trace!("Invalidated cached conversation {}", id);
        }
    }
}
