//! Conversation entities
//!
//! Field names follow the document store's JSON shape so the same types are
//! used for API payloads and in-process state.

use crate::core::error::DomainError;
use crate::core::model::ModelId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Role of a persisted turn.
///
/// `Model` is the store's synonym for `Assistant`; providers that use the
/// assistant vocabulary see it translated at the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
    System,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Model => "model",
            Role::System => "system",
            Role::Assistant => "assistant",
        }
    }

    /// Whether this turn was produced by the language model.
    pub fn is_model_output(&self) -> bool {
        matches!(self, Role::Model | Role::Assistant)
    }
}

/// A single text part of a turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Part {
    pub text: String,
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// One persisted entry of a conversation's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    #[serde(default)]
    pub parts: Vec<Part>,
    /// Stored asset path of an image attached to this turn.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub img: Option<String>,
}

impl ConversationTurn {
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            parts: vec![Part::text(text)],
            img: None,
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, text)
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self::new(Role::Model, text)
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::new(Role::System, text)
    }

    pub fn with_img(mut self, img: impl Into<String>) -> Self {
        self.img = Some(img.into());
        self
    }

    /// Text of the first part, which is the only part sent to providers.
    pub fn first_text(&self) -> Option<&str> {
        self.parts.first().map(|p| p.text.as_str())
    }
}

/// Identifier of a persisted conversation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(String);

impl ConversationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ConversationId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// A persisted chat session (Entity)
///
/// Owned by exactly one user; tenant isolation is enforced by the chat API.
/// `model` keeps the raw stored identifier so a conversation with a retired
/// model can still be loaded and displayed; [`Conversation::model_id`]
/// resolves it when a turn is about to be sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    #[serde(rename = "_id")]
    pub id: ConversationId,
    pub user_id: String,
    #[serde(default)]
    pub history: Vec<ConversationTurn>,
    pub model: String,
    #[serde(default)]
    pub is_custom_chatbot: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Conversation {
    pub fn new(id: impl Into<ConversationId>, user_id: impl Into<String>, model: ModelId) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            user_id: user_id.into(),
            history: Vec::new(),
            model: model.as_str().to_string(),
            is_custom_chatbot: false,
            created_at: Some(now),
            updated_at: Some(now),
        }
    }

    pub fn with_history(mut self, history: Vec<ConversationTurn>) -> Self {
        self.history = history;
        self
    }

    pub fn with_raw_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Resolve the stored model identifier.
    pub fn model_id(&self) -> Result<ModelId, DomainError> {
        self.model.parse()
    }

    /// A freshly created session holds only the message typed at creation.
    pub fn is_fresh(&self) -> bool {
        self.history.len() == 1
    }

    /// Append the turns the chat API stores for one completed exchange.
    pub fn record_exchange(&mut self, question: Option<&str>, answer: &str, img: Option<&str>) {
        if let Some(q) = question {
            let mut turn = ConversationTurn::user(q);
            turn.img = img.map(str::to_string);
            self.history.push(turn);
        }
        self.history.push(ConversationTurn::model(answer));
        self.updated_at = Some(Utc::now());
    }
}

impl From<String> for ConversationId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_store_document() {
        let json = r#"{
            "_id": "65f0c0ffee",
            "userId": "user_123",
            "history": [
                {"role": "user", "parts": [{"text": "hi"}], "img": "/uploads/cat.png"},
                {"role": "model", "parts": [{"text": "hello"}]}
            ],
            "model": "gemini-flash-1.5",
            "isCustomChatbot": true,
            "createdAt": "2024-05-01T10:00:00Z",
            "updatedAt": "2024-05-01T10:00:05Z"
        }"#;
        let conv: Conversation = serde_json::from_str(json).unwrap();
        assert_eq!(conv.id.as_str(), "65f0c0ffee");
        assert_eq!(conv.history.len(), 2);
        assert_eq!(conv.history[0].img.as_deref(), Some("/uploads/cat.png"));
        assert_eq!(conv.history[1].role, Role::Model);
        assert!(conv.is_custom_chatbot);
        assert_eq!(conv.model_id().unwrap(), ModelId::GeminiFlash15);
    }

    #[test]
    fn test_unknown_model_loads_but_does_not_resolve() {
        let conv = Conversation::new("c1", "u1", ModelId::Gpt4o).with_raw_model("unknown-id");
        assert!(matches!(
            conv.model_id(),
            Err(DomainError::UnsupportedModel(_))
        ));
    }

    #[test]
    fn test_record_exchange_appends_user_then_model() {
        let mut conv = Conversation::new("c1", "u1", ModelId::Gpt4o)
            .with_history(vec![ConversationTurn::user("first")]);
        conv.record_exchange(Some("second"), "answer", Some("/img.png"));
        assert_eq!(conv.history.len(), 3);
        assert_eq!(conv.history[1].role, Role::User);
        assert_eq!(conv.history[1].img.as_deref(), Some("/img.png"));
        assert_eq!(conv.history[2].first_text(), Some("answer"));

        conv.record_exchange(None, "replayed", None);
        assert_eq!(conv.history.len(), 4);
        assert_eq!(conv.history[3].role, Role::Model);
    }

    #[test]
    fn test_turn_serialization_skips_missing_img() {
        let json = serde_json::to_value(ConversationTurn::user("hi")).unwrap();
        assert_eq!(json, serde_json::json!({"role": "user", "parts": [{"text": "hi"}]}));
    }
}
