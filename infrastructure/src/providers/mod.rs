//! Streaming provider adapters.
//!
//! One adapter per [`ProviderKind`](chatline_domain::ProviderKind):
//! [`OpenAiAdapter`] for the assistant vocabulary and [`GeminiAdapter`] for
//! the native one. Both decode server-sent events on a background task that
//! stops as soon as the consumer cancels its [`DeltaStream`](chatline_application::DeltaStream).

mod gemini;
mod openai;
mod sse;

pub use gemini::{GeminiAdapter, GeminiSettings, api_model_name};
pub use openai::{AzureDeployment, OpenAiAdapter, OpenAiSettings};
pub use sse::{Frame, SseDecoder, spawn_pump};
