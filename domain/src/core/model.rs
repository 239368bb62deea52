//! Model identifier value object

use super::error::DomainError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Models a conversation can be bound to (Value Object)
///
/// The set is closed: conversations are persisted with one of these
/// identifiers and anything else is rejected at the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelId {
    /// OpenAI GPT-4o (served through an OpenAI-compatible endpoint)
    Gpt4o,
    /// Google Gemini 1.5 Flash
    GeminiFlash15,
}

/// Conversation vocabulary spoken by a provider family.
///
/// Adding a provider means adding a variant here and a matching adapter,
/// never comparing model strings deep in business logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    /// `system` / `user` / `assistant` roles with flat string content
    AssistantVocabulary,
    /// `user` / `model` roles with a list of parts per turn
    NativeVocabulary,
}

impl ProviderKind {
    /// Whether requests of this family can carry an inline image.
    pub fn supports_attachments(&self) -> bool {
        match self {
            ProviderKind::AssistantVocabulary => false,
            ProviderKind::NativeVocabulary => true,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::AssistantVocabulary => "assistant-vocabulary",
            ProviderKind::NativeVocabulary => "native-vocabulary",
        }
    }
}

impl ModelId {
    /// All supported identifiers, in display order.
    pub const ALL: [ModelId; 2] = [ModelId::Gpt4o, ModelId::GeminiFlash15];

    /// Get the persisted string identifier for this model
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelId::Gpt4o => "gpt-4o",
            ModelId::GeminiFlash15 => "gemini-flash-1.5",
        }
    }

    /// Provider family that serves this model
    pub fn provider_kind(&self) -> ProviderKind {
        match self {
            ModelId::Gpt4o => ProviderKind::AssistantVocabulary,
            ModelId::GeminiFlash15 => ProviderKind::NativeVocabulary,
        }
    }
}

impl Default for ModelId {
    fn default() -> Self {
        ModelId::Gpt4o
    }
}

impl std::fmt::Display for ModelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ModelId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "gpt-4o" => Ok(ModelId::Gpt4o),
            "gemini-flash-1.5" => Ok(ModelId::GeminiFlash15),
            other => Err(DomainError::UnsupportedModel(other.to_string())),
        }
    }
}

impl Serialize for ModelId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ModelId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
