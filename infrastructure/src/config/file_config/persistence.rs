//! Persistence configuration from TOML (`[persistence]` section)

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PersistenceBackend {
    /// The chat API over HTTP.
    #[default]
    Http,
    /// Process memory only; nothing survives the session.
    Memory,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilePersistenceConfig {
    pub backend: PersistenceBackend,
    /// Base URL of the chat API.
    pub api_url: String,
    /// Signed-in user id.
    pub user_id: Option<String>,
    /// Environment variable holding the session token (default: "CHATLINE_TOKEN").
    pub token_env: String,
    pub token: Option<String>,
}

impl Default for FilePersistenceConfig {
    fn default() -> Self {
        Self {
            backend: PersistenceBackend::Http,
            api_url: "http://localhost:3000".to_string(),
            user_id: None,
            token_env: "CHATLINE_TOKEN".to_string(),
            token: None,
        }
    }
}

impl FilePersistenceConfig {
    pub fn resolve_token(&self) -> Option<String> {
        self.token
            .clone()
            .filter(|t| !t.is_empty())
            .or_else(|| std::env::var(&self.token_env).ok().filter(|t| !t.is_empty()))
    }
}
