//! Persistence gate
//!
//! Commits a finished turn to the chat API exactly once per idempotency key,
//! invalidates the cached conversation on success and decides what happens to
//! the on-screen stream state afterwards.

use crate::ports::chat_repository::{ChatRepository, PersistenceError, TurnCommit};
use crate::ports::conversation_cache::ConversationCache;
use chatline_domain::{ConversationId, IdempotencyKey, StreamState};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

pub struct PersistenceGate {
    repository: Arc<dyn ChatRepository>,
    cache: Arc<dyn ConversationCache>,
    acknowledged: Mutex<HashMap<IdempotencyKey, ConversationId>>,
}

impl PersistenceGate {
    pub fn new(repository: Arc<dyn ChatRepository>, cache: Arc<dyn ConversationCache>) -> Self {
        Self {
            repository,
            cache,
            acknowledged: Mutex::new(HashMap::new()),
        }
    }

    /// Append `commit` to `conversation_id`.
    ///
    /// A key that was already acknowledged short-circuits to the stored
    /// result without touching the repository, so retrying a commit can never
    /// duplicate the turn.
    pub async fn commit(
        &self,
        conversation_id: &ConversationId,
        commit: &TurnCommit,
    ) -> Result<ConversationId, PersistenceError> {
        if let Some(existing) = self.acknowledged_id(&commit.idempotency_key) {
            debug!(
                "Commit {} already acknowledged, skipping",
                commit.idempotency_key
            );
            return Ok(existing);
        }

        match self.repository.append_turn(conversation_id, commit).await {
            Ok(id) => {
                self.cache.invalidate(conversation_id);
                self.acknowledged
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .insert(commit.idempotency_key.clone(), id.clone());
                info!(
                    "Committed turn {} ({} bytes)",
                    commit.idempotency_key,
                    commit.answer.len()
                );
                Ok(id)
            }
            Err(e) => {
                warn!("Commit {} failed: {}", commit.idempotency_key, e);
                Err(e)
            }
        }
    }

    pub fn is_acknowledged(&self, key: &IdempotencyKey) -> bool {
        self.acknowledged_id(key).is_some()
    }

    fn acknowledged_id(&self, key: &IdempotencyKey) -> Option<ConversationId> {
        self.acknowledged
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .cloned()
    }

    /// Apply the outcome of a commit to the stream state.
    ///
    /// On success the ephemeral state is cleared, since the persisted history
    /// now holds the turn. On failure only the typing indicator is cleared and
    /// the answer stays visible.
    pub fn settle(state: &mut StreamState, result: &Result<ConversationId, PersistenceError>) {
        match result {
            Ok(_) => state.reset(),
            Err(_) => state.stop_streaming(),
        }
    }
}
