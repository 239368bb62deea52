//! Idempotency keys for turn commits

use super::entities::ConversationId;
use serde::{Deserialize, Serialize};

/// Key identifying one commit of one turn.
///
/// Scoped to `(conversation id, turn sequence number)` so a retried commit of
/// the same turn carries the same key and the chat API can drop the duplicate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IdempotencyKey {
    conversation_id: ConversationId,
    turn_sequence: usize,
}

impl IdempotencyKey {
    pub fn new(conversation_id: ConversationId, turn_sequence: usize) -> Self {
        Self {
            conversation_id,
            turn_sequence,
        }
    }

    pub fn conversation_id(&self) -> &ConversationId {
        &self.conversation_id
    }

    pub fn turn_sequence(&self) -> usize {
        self.turn_sequence
    }

    /// Header value sent with the commit request.
    pub fn as_header_value(&self) -> String {
        format!("{}:{}", self.conversation_id, self.turn_sequence)
    }
}

impl std::fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_header_value())
    }
}
