//! In-memory chat repository
//!
//! Holds conversations in process memory and applies commits the way the chat
//! API does: a user turn for the question (if any), then the model turn.
//! Commits are de-duplicated by idempotency key.

use async_trait::async_trait;
use chatline_application::{ChatRepository, PersistenceError, TurnCommit};
use chatline_domain::{Conversation, ConversationId, IdempotencyKey};
use std::collections::{HashMap, HashSet};
use std::sync::RwLock;
use tracing::debug;

#[derive(Default)]
pub struct InMemoryChatRepository {
    conversations: RwLock<HashMap<ConversationId, Conversation>>,
    applied: RwLock<HashSet<IdempotencyKey>>,
}

impl InMemoryChatRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_conversation(self, conversation: Conversation) -> Self {
        self.insert(conversation);
        self
    }

    pub fn insert(&self, conversation: Conversation) {
        if let Ok(mut conversations) = self.conversations.write() {
            conversations.insert(conversation.id.clone(), conversation);
        }
    }

    pub fn get(&self, id: &ConversationId) -> Option<Conversation> {
        self.conversations
            .read()
            .ok()
            .and_then(|c| c.get(id).cloned())
    }
}

#[async_trait]
impl ChatRepository for InMemoryChatRepository {
    async fn load(&self, id: &ConversationId) -> Result<Conversation, PersistenceError> {
        self.get(id)
            .ok_or_else(|| PersistenceError::NotFound(id.clone()))
    }

    async fn append_turn(
        &self,
        id: &ConversationId,
        commit: &TurnCommit,
    ) -> Result<ConversationId, PersistenceError> {
        let mut applied = self
            .applied
            .write()
            .map_err(|e| PersistenceError::ConnectionError(e.to_string()))?;
        if applied.contains(&commit.idempotency_key) {
            debug!("Duplicate commit {} ignored", commit.idempotency_key);
            return Ok(id.clone());
        }

        let mut conversations = self
            .conversations
            .write()
            .map_err(|e| PersistenceError::ConnectionError(e.to_string()))?;
        let conversation = conversations
            .get_mut(id)
            .ok_or_else(|| PersistenceError::NotFound(id.clone()))?;

        conversation.record_exchange(
            commit.question.as_deref(),
            &commit.answer,
            commit.img.as_deref(),
        );
        applied.insert(commit.idempotency_key.clone());
        Ok(id.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatline_domain::{ConversationTurn, ModelId, Role};

    fn repo() -> InMemoryChatRepository {
        InMemoryChatRepository::new().with_conversation(
            Conversation::new("c1", "u1", ModelId::Gpt4o)
                .with_history(vec![ConversationTurn::user("hi")]),
        )
    }

    #[tokio::test]
    async fn test_append_adds_question_and_answer() {
        let repo = repo();
        let id = ConversationId::new("c1");
        let commit = TurnCommit::new(IdempotencyKey::new(id.clone(), 1), "fine")
            .with_question(Some("how are you?".to_string()))
            .with_img(Some("/uploads/a.png".to_string()));

        repo.append_turn(&id, &commit).await.unwrap();

        let history = repo.load(&id).await.unwrap().history;
        assert_eq!(history.len(), 3);
        assert_eq!(history[1].role, Role::User);
        assert_eq!(history[1].img.as_deref(), Some("/uploads/a.png"));
        assert_eq!(history[2].role, Role::Model);
        assert_eq!(history[2].first_text(), Some("fine"));
    }

    #[tokio::test]
    async fn test_repeated_key_is_applied_once() {
        let repo = repo();
        let id = ConversationId::new("c1");
        let commit = TurnCommit::new(IdempotencyKey::new(id.clone(), 1), "hello");

        repo.append_turn(&id, &commit).await.unwrap();
        repo.append_turn(&id, &commit).await.unwrap();

        assert_eq!(repo.load(&id).await.unwrap().history.len(), 2);
    }

    #[tokio::test]
    async fn test_unknown_conversation() {
        let repo = repo();
        let id = ConversationId::new("missing");
        let err = repo
            .append_turn(&id, &TurnCommit::new(IdempotencyKey::new(id.clone(), 0), "x"))
            .await
            .unwrap_err();
        assert_eq!(err, PersistenceError::NotFound(id));
    }
}
