//! Load a conversation, preferring the cached copy.

use crate::ports::chat_repository::{ChatRepository, PersistenceError};
use crate::ports::conversation_cache::ConversationCache;
use chatline_domain::{Conversation, ConversationId};
use std::sync::Arc;
use tracing::debug;

pub struct LoadConversationUseCase {
    repository: Arc<dyn ChatRepository>,
    cache: Arc<dyn ConversationCache>,
}

impl LoadConversationUseCase {
    pub fn new(repository: Arc<dyn ChatRepository>, cache: Arc<dyn ConversationCache>) -> Self {
        Self { repository, cache }
    }

    pub async fn execute(&self, id: &ConversationId) -> Result<Conversation, PersistenceError> {
        if let Some(conversation) = self.cache.get(id) {
            debug!("Conversation {} served from cache", id);
            return Ok(conversation);
        }

        let conversation = self.repository.load(id).await?;
        debug!(
            "Loaded conversation {} ({} turns)",
            id,
            conversation.history.len()
        );
        self.cache.put(conversation.clone());
        Ok(conversation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::chat_repository::TurnCommit;
    use async_trait::async_trait;
    use chatline_domain::{ConversationTurn, ModelId};
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct OneConversation {
        loads: AtomicUsize,
    }

    #[async_trait]
    impl ChatRepository for OneConversation {
        async fn load(&self, id: &ConversationId) -> Result<Conversation, PersistenceError> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            if id.as_str() != "c1" {
                return Err(PersistenceError::NotFound(id.clone()));
            }
            Ok(Conversation::new("c1", "u1", ModelId::Gpt4o)
                .with_history(vec![ConversationTurn::user("hi")]))
        }

        async fn append_turn(
            &self,
            id: &ConversationId,
            _commit: &TurnCommit,
        ) -> Result<ConversationId, PersistenceError> {
            Ok(id.clone())
        }
    }

    #[derive(Default)]
    struct MapCache(Mutex<HashMap<ConversationId, Conversation>>);

    impl ConversationCache for MapCache {
        fn get(&self, id: &ConversationId) -> Option<Conversation> {
            self.0.lock().unwrap().get(id).cloned()
        }

        fn put(&self, conversation: Conversation) {
            self.0
                .lock()
                .unwrap()
                .insert(conversation.id.clone(), conversation);
        }

        fn invalidate(&self, id: &ConversationId) {
            self.0.lock().unwrap().remove(id);
        }
    }

    #[tokio::test]
    async fn test_second_load_hits_cache() {
        let repo = Arc::new(OneConversation {
            loads: AtomicUsize::new(0),
        });
        let cache = Arc::new(MapCache::default());
        let use_case = LoadConversationUseCase::new(repo.clone(), cache.clone());

        let first = use_case.execute(&ConversationId::new("c1")).await.unwrap();
        let second = use_case.execute(&ConversationId::new("c1")).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(repo.loads.load(Ordering::SeqCst), 1);

        cache.invalidate(&ConversationId::new("c1"));
        use_case.execute(&ConversationId::new("c1")).await.unwrap();
        assert_eq!(repo.loads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_missing_conversation_is_not_found() {
        let use_case = LoadConversationUseCase::new(
            Arc::new(OneConversation {
                loads: AtomicUsize::new(0),
            }),
            Arc::new(MapCache::default()),
        );
        let err = use_case
            .execute(&ConversationId::new("nope"))
            .await
            .unwrap_err();
        assert!(matches!(err, PersistenceError::NotFound(_)));
    }
}
