//! Gemini adapter
//!
//! Speaks the native vocabulary: prior turns seed the session as `contents`,
//! and the new message goes last with any inline image placed before its
//! text. Responses arrive from `:streamGenerateContent?alt=sse`.

use super::sse::{Frame, spawn_pump};
use async_trait::async_trait;
use chatline_application::{DeltaStream, ProviderAdapter, ProviderError};
use chatline_domain::{InlineImage, ModelId, ProviderKind, ProviderRequest, Role};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct GeminiSettings {
    pub base_url: String,
    pub api_key: Option<String>,
    /// Overrides the API model name derived from the model identifier.
    pub model: Option<String>,
    pub max_output_tokens: Option<u32>,
}

impl Default for GeminiSettings {
    fn default() -> Self {
        Self {
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            api_key: None,
            model: None,
            max_output_tokens: None,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentBody {
    system_instruction: GeminiContent,
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
enum GeminiPart {
    Text(String),
    InlineData(InlineData),
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChunkResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
    error: Option<ApiErrorDetail>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// API model name for `model`, `None` for models served elsewhere.
pub fn api_model_name(model: ModelId) -> Option<&'static str> {
    match model {
        ModelId::GeminiFlash15 => Some("gemini-1.5-flash"),
        ModelId::Gpt4o => None,
    }
}

fn wire_role(role: Role) -> &'static str {
    match role {
        Role::Model | Role::Assistant => "model",
        Role::User | Role::System => "user",
    }
}

fn text_part(text: impl Into<String>) -> GeminiContent {
    GeminiContent {
        role: None,
        parts: vec![GeminiPart::Text(text.into())],
    }
}

pub struct GeminiAdapter {
    client: reqwest::Client,
    settings: GeminiSettings,
}

impl GeminiAdapter {
    pub fn new(client: reqwest::Client, settings: GeminiSettings) -> Self {
        Self { client, settings }
    }

    fn endpoint(&self, model: ModelId) -> Result<String, ProviderError> {
        let Some(default_name) = api_model_name(model) else {
            return Err(ProviderError::RequestMismatch {
                expected: ProviderKind::NativeVocabulary.as_str(),
                actual: model.provider_kind().as_str(),
            });
        };
        let name = self.settings.model.as_deref().unwrap_or(default_name);
        Ok(format!(
            "{}/models/{}:streamGenerateContent?alt=sse",
            self.settings.base_url.trim_end_matches('/'),
            name
        ))
    }

    fn body(
        &self,
        request: &chatline_domain::NativeChatRequest,
        attachment: Option<&InlineImage>,
    ) -> GenerateContentBody {
        let mut contents: Vec<GeminiContent> = request
            .history
            .iter()
            .map(|turn| GeminiContent {
                role: Some(wire_role(turn.role)),
                parts: turn
                    .parts
                    .iter()
                    .map(|p| GeminiPart::Text(p.text.clone()))
                    .collect(),
            })
            .collect();

        let mut parts = Vec::with_capacity(2);
        if let Some(image) = attachment {
            parts.push(GeminiPart::InlineData(InlineData {
                mime_type: image.mime_type.clone(),
                data: image.data.clone(),
            }));
        }
        parts.push(GeminiPart::Text(request.message.clone()));
        contents.push(GeminiContent {
            role: Some("user"),
            parts,
        });

        GenerateContentBody {
            system_instruction: text_part(request.system_instruction.clone()),
            contents,
            generation_config: self
                .settings
                .max_output_tokens
                .map(|max_output_tokens| GenerationConfig { max_output_tokens }),
        }
    }
}

/// Interpret one SSE payload of a `streamGenerateContent` response.
pub(crate) fn parse_chunk(payload: &str) -> Frame {
    let payload = payload.trim();
    if payload.is_empty() {
        return Frame::Skip;
    }

    let chunk: ChunkResponse = match serde_json::from_str(payload) {
        Ok(chunk) => chunk,
        Err(e) => return Frame::Failed(format!("malformed stream chunk: {}", e)),
    };
    if let Some(error) = chunk.error {
        return Frame::Failed(error.message);
    }
    if let Some(reason) = chunk.prompt_feedback.and_then(|f| f.block_reason) {
        return Frame::Failed(format!("prompt blocked: {}", reason));
    }

    let Some(candidate) = chunk.candidates.into_iter().next() else {
        return Frame::Skip;
    };
    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if !text.is_empty() {
        return Frame::Text(text);
    }
    match candidate.finish_reason.as_deref() {
        Some(reason @ ("SAFETY" | "RECITATION" | "BLOCKLIST" | "PROHIBITED_CONTENT")) => {
            Frame::Failed(format!("response stopped: {}", reason))
        }
        _ => Frame::Skip,
    }
}

#[async_trait]
impl ProviderAdapter for GeminiAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::NativeVocabulary
    }

    async fn stream(
        &self,
        model: ModelId,
        request: &ProviderRequest,
        attachment: Option<&InlineImage>,
    ) -> Result<DeltaStream, ProviderError> {
        let ProviderRequest::Native(native) = request else {
            return Err(ProviderError::RequestMismatch {
                expected: ProviderKind::NativeVocabulary.as_str(),
                actual: request.kind().as_str(),
            });
        };
        let endpoint = self.endpoint(model)?;
        let Some(api_key) = self.settings.api_key.as_deref() else {
            return Err(ProviderError::NotConfigured(
                "Gemini API key is not set".to_string(),
            ));
        };

        let body = self.body(native, attachment);
        debug!(
            "POST streamGenerateContent for {} ({} seeded turns, image: {})",
            model,
            native.history.len(),
            attachment.is_some()
        );

        let response = self
            .client
            .post(endpoint)
            .query(&[("key", api_key)])
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

        Ok(spawn_pump(response.bytes_stream(), parse_chunk, "gemini"))
    }
}
