//! OpenAI-compatible chat completions adapter
//!
//! Speaks the assistant vocabulary: the whole conversation goes out as one
//! `{role, content}` list with `stream: true`, and each SSE chunk carries
//! `choices[0].delta.content`. Azure OpenAI deployments are addressed by
//! deployment name and `api-version` instead of by model.

use super::sse::{Frame, spawn_pump};
use async_trait::async_trait;
use chatline_application::{DeltaStream, ProviderAdapter, ProviderError};
use chatline_domain::{ChatMessage, InlineImage, ModelId, ProviderKind, ProviderRequest};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Azure OpenAI deployment addressing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AzureDeployment {
    pub deployment: String,
    pub api_version: String,
}

#[derive(Debug, Clone)]
pub struct OpenAiSettings {
    /// `https://api.openai.com/v1`, or the resource endpoint for Azure.
    pub base_url: String,
    pub api_key: Option<String>,
    pub azure: Option<AzureDeployment>,
    pub max_tokens: Option<u32>,
}

impl Default for OpenAiSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: None,
            azure: None,
            max_tokens: None,
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
    messages: &'a [ChatMessage],
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ChunkResponse {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
    error: Option<ApiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: ChunkDelta,
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ChunkDelta {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

pub struct OpenAiAdapter {
    client: reqwest::Client,
    settings: OpenAiSettings,
}

impl OpenAiAdapter {
    pub fn new(client: reqwest::Client, settings: OpenAiSettings) -> Self {
        if let Some(azure) = &settings.azure {
            info!(deployment = %azure.deployment, "OpenAI adapter using Azure deployment");
        }
        Self { client, settings }
    }

    fn endpoint(&self) -> String {
        let base = self.settings.base_url.trim_end_matches('/');
        match &self.settings.azure {
            Some(azure) => format!(
                "{}/openai/deployments/{}/chat/completions?api-version={}",
                base, azure.deployment, azure.api_version
            ),
            None => format!("{}/chat/completions", base),
        }
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match (&self.settings.api_key, &self.settings.azure) {
            (Some(key), Some(_)) => request.header("api-key", key),
            (Some(key), None) => request.bearer_auth(key),
            (None, _) => request,
        }
    }
}

/// Interpret one SSE payload of a chat completions stream.
pub(crate) fn parse_chunk(payload: &str) -> Frame {
    let payload = payload.trim();
    if payload.is_empty() {
        return Frame::Skip;
    }
    if payload == "[DONE]" {
        return Frame::Done;
    }

    let chunk: ChunkResponse = match serde_json::from_str(payload) {
        Ok(chunk) => chunk,
        Err(e) => return Frame::Failed(format!("malformed stream chunk: {}", e)),
    };
    if let Some(error) = chunk.error {
        return Frame::Failed(error.message);
    }

    // Azure sends content-filter results with no choices first
    let Some(choice) = chunk.choices.into_iter().next() else {
        return Frame::Skip;
    };
    match (choice.delta.content, choice.finish_reason) {
        (Some(text), _) => Frame::Text(text),
        (None, Some(_)) => Frame::Done,
        (None, None) => Frame::Skip,
    }
}

#[async_trait]
impl ProviderAdapter for OpenAiAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::AssistantVocabulary
    }

    async fn stream(
        &self,
        model: ModelId,
        request: &ProviderRequest,
        attachment: Option<&InlineImage>,
    ) -> Result<DeltaStream, ProviderError> {
        let ProviderRequest::Chat(chat) = request else {
            return Err(ProviderError::RequestMismatch {
                expected: ProviderKind::AssistantVocabulary.as_str(),
                actual: request.kind().as_str(),
            });
        };
        if attachment.is_some() {
            debug!("Ignoring attachment for {}", model);
        }

        let body = ChatCompletionBody {
            model: self.settings.azure.is_none().then(|| model.as_str()),
            messages: &chat.messages,
            stream: true,
            max_tokens: self.settings.max_tokens,
        };

        debug!(
            "POST chat completions for {} ({} messages)",
            model,
            chat.messages.len()
        );
        let response = self
            .authorize(self.client.post(self.endpoint()))
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::ConnectionError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(spawn_pump(response.bytes_stream(), parse_chunk, "openai"))
    }
}
