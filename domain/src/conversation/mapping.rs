//! History mapping
//!
//! Converts the persisted, provider-agnostic history into the request shape of
//! a provider family. Only the first text part of each turn is sent; further
//! parts are a known limitation of the stored shape, not silently merged.

use super::entities::{ConversationTurn, Part, Role};
use crate::core::error::MappingError;
use crate::core::model::{ModelId, ProviderKind};
use serde::{Deserialize, Serialize};

/// System prompt used when the history does not open with a system turn.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant.";

/// Role in the assistant/user/system vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

impl From<Role> for ChatRole {
    fn from(role: Role) -> Self {
        match role {
            Role::System => ChatRole::System,
            Role::User => ChatRole::User,
            Role::Model | Role::Assistant => ChatRole::Assistant,
        }
    }
}

/// A flat `{role, content}` message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// A `{role, parts}` entry of a native-vocabulary session seed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeContent {
    pub role: Role,
    pub parts: Vec<Part>,
}

/// Request for assistant-vocabulary providers: the whole conversation as one list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatCompletionRequest {
    pub messages: Vec<ChatMessage>,
}

/// Request for native-vocabulary providers: a seeded session plus one send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeChatRequest {
    pub system_instruction: String,
    pub history: Vec<NativeContent>,
    pub message: String,
}

/// Provider-shaped request produced by [`to_provider_request`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderRequest {
    Chat(ChatCompletionRequest),
    Native(NativeChatRequest),
}

impl ProviderRequest {
    pub fn kind(&self) -> ProviderKind {
        match self {
            ProviderRequest::Chat(_) => ProviderKind::AssistantVocabulary,
            ProviderRequest::Native(_) => ProviderKind::NativeVocabulary,
        }
    }
}

/// Map `history` (plus an optional new user message) into the request shape
/// of `model`'s provider family.
///
/// With `new_user_text = None` only the existing history is sent, which is how
/// a freshly created conversation replays its first message.
pub fn to_provider_request(
    history: &[ConversationTurn],
    new_user_text: Option<&str>,
    model: ModelId,
) -> Result<ProviderRequest, MappingError> {
    let texts = first_texts(history)?;

    let (system_prompt, body) = match history.first() {
        Some(first) if first.role == Role::System => (texts[0], &history[1..]),
        _ => (DEFAULT_SYSTEM_PROMPT, history),
    };
    let body_texts = &texts[texts.len() - body.len()..];

    let request = match model.provider_kind() {
        ProviderKind::AssistantVocabulary => {
            let mut messages = Vec::with_capacity(body.len() + 2);
            messages.push(ChatMessage::new(ChatRole::System, system_prompt));
            messages.extend(
                body.iter()
                    .zip(body_texts)
                    .map(|(turn, text)| ChatMessage::new(turn.role.into(), *text)),
            );
            if let Some(text) = new_user_text {
                messages.push(ChatMessage::new(ChatRole::User, text));
            }
            ProviderRequest::Chat(ChatCompletionRequest { messages })
        }
        ProviderKind::NativeVocabulary => {
            let mut seed: Vec<NativeContent> = body
                .iter()
                .zip(body_texts)
                .map(|(turn, text)| NativeContent {
                    role: turn.role,
                    parts: vec![Part::text(*text)],
                })
                .collect();
            let message = match new_user_text {
                Some(text) => text.to_string(),
                None => {
                    let last = seed.pop().ok_or(MappingError::NothingToSend)?;
                    last.parts.into_iter().next().map(|p| p.text).unwrap_or_default()
                }
            };
            ProviderRequest::Native(NativeChatRequest {
                system_instruction: system_prompt.to_string(),
                history: seed,
                message,
            })
        }
    };

    Ok(request)
}

fn first_texts(history: &[ConversationTurn]) -> Result<Vec<&str>, MappingError> {
    history
        .iter()
        .enumerate()
        .map(|(index, turn)| turn.first_text().ok_or(MappingError::EmptyParts { index }))
        .collect()
}
