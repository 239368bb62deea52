//! Provider configuration from TOML (`[providers]` section)

use crate::providers::{AzureDeployment, GeminiSettings, OpenAiSettings};
use serde::{Deserialize, Serialize};

/// OpenAI-compatible provider configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileOpenAiConfig {
    /// Environment variable name for the API key (default: "OPENAI_API_KEY").
    pub api_key_env: String,
    /// Direct API key (not recommended — use env var instead).
    pub api_key: Option<String>,
    /// Base URL; the resource endpoint when using Azure OpenAI.
    pub base_url: String,
    /// Azure OpenAI deployment name. Enables Azure addressing when set.
    pub azure_deployment: Option<String>,
    /// Azure OpenAI `api-version` query parameter.
    pub azure_api_version: String,
    pub max_tokens: Option<u32>,
}

impl Default for FileOpenAiConfig {
    fn default() -> Self {
        Self {
            api_key_env: "OPENAI_API_KEY".to_string(),
            api_key: None,
            base_url: "https://api.openai.com/v1".to_string(),
            azure_deployment: None,
            azure_api_version: "2024-08-01-preview".to_string(),
            max_tokens: None,
        }
    }
}

impl FileOpenAiConfig {
    /// Inline key if set, otherwise the value of `api_key_env`.
    pub fn resolve_api_key(&self) -> Option<String> {
        resolve_key(self.api_key.as_ref(), &self.api_key_env)
    }

    pub fn to_settings(&self) -> OpenAiSettings {
        OpenAiSettings {
            base_url: self.base_url.clone(),
            api_key: self.resolve_api_key(),
            azure: self.azure_deployment.as_ref().map(|deployment| AzureDeployment {
                deployment: deployment.clone(),
                api_version: self.azure_api_version.clone(),
            }),
            max_tokens: self.max_tokens,
        }
    }
}

/// Gemini provider configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileGeminiConfig {
    /// Environment variable name for the API key (default: "GEMINI_API_KEY").
    pub api_key_env: String,
    pub api_key: Option<String>,
    pub base_url: String,
    /// API model name override (default derived from the model identifier).
    pub model: Option<String>,
    pub max_output_tokens: Option<u32>,
}

impl Default for FileGeminiConfig {
    fn default() -> Self {
        Self {
            api_key_env: "GEMINI_API_KEY".to_string(),
            api_key: None,
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            model: None,
            max_output_tokens: None,
        }
    }
}

impl FileGeminiConfig {
    pub fn resolve_api_key(&self) -> Option<String> {
        resolve_key(self.api_key.as_ref(), &self.api_key_env)
    }

    pub fn to_settings(&self) -> GeminiSettings {
        GeminiSettings {
            base_url: self.base_url.clone(),
            api_key: self.resolve_api_key(),
            model: self.model.clone(),
            max_output_tokens: self.max_output_tokens,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileProvidersConfig {
    pub openai: FileOpenAiConfig,
    pub gemini: FileGeminiConfig,
}

fn resolve_key(inline: Option<&String>, env: &str) -> Option<String> {
    inline
        .filter(|k| !k.is_empty())
        .cloned()
        .or_else(|| std::env::var(env).ok().filter(|k| !k.is_empty()))
}
