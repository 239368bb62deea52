//! Chat API repository over HTTP
//!
//! `GET {api_url}/api/chats/{id}` loads a conversation and
//! `PUT {api_url}/api/chats/{id}` appends a finished turn. Every request
//! carries the signed-in user's token; commits also carry an
//! `Idempotency-Key` header so the API can drop retried duplicates.

use async_trait::async_trait;
use chatline_application::{
    ChatRepository, IdentityProvider, PersistenceError, TurnCommit,
};
use chatline_domain::{Conversation, ConversationId};
use reqwest::StatusCode;
use std::sync::Arc;
use tracing::debug;

pub const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";

pub struct HttpChatRepository {
    client: reqwest::Client,
    api_url: String,
    identity: Arc<dyn IdentityProvider>,
}

impl HttpChatRepository {
    pub fn new(
        client: reqwest::Client,
        api_url: impl Into<String>,
        identity: Arc<dyn IdentityProvider>,
    ) -> Self {
        Self {
            client,
            api_url: api_url.into(),
            identity,
        }
    }

    fn chat_url(&self, id: &ConversationId) -> String {
        format!("{}/api/chats/{}", self.api_url.trim_end_matches('/'), id)
    }

    fn authorized(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::RequestBuilder, PersistenceError> {
        let user = self
            .identity
            .current_user()
            .ok_or(PersistenceError::Unauthenticated)?;
        Ok(match user.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        })
    }
}

/// Map a non-success response to a persistence error, keeping the body verbatim.
fn status_error(status: StatusCode, body: String, id: &ConversationId) -> PersistenceError {
    match status {
        StatusCode::NOT_FOUND => PersistenceError::NotFound(id.clone()),
        StatusCode::UNAUTHORIZED => PersistenceError::Unauthenticated,
        _ => PersistenceError::Rejected {
            status: status.as_u16(),
            body,
        },
    }
}

/// Conversation id in a commit response.
///
/// The API answers with the id as a JSON string or with the updated document;
/// anything else is taken as an acknowledgement of `requested`.
fn committed_id(body: &str, requested: &ConversationId) -> ConversationId {
    match serde_json::from_str::<serde_json::Value>(body) {
        Ok(serde_json::Value::String(id)) if !id.is_empty() => ConversationId::new(id),
        Ok(serde_json::Value::Object(map)) => match map.get("_id") {
            Some(serde_json::Value::String(id)) => ConversationId::new(id.clone()),
            _ => requested.clone(),
        },
        _ => requested.clone(),
    }
}

#[async_trait]
impl ChatRepository for HttpChatRepository {
    async fn load(&self, id: &ConversationId) -> Result<Conversation, PersistenceError> {
        let response = self
            .authorized(self.client.get(self.chat_url(id)))?
            .send()
            .await
            .map_err(|e| PersistenceError::ConnectionError(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| PersistenceError::ConnectionError(e.to_string()))?;
        if !status.is_success() {
            return Err(status_error(status, body, id));
        }

        serde_json::from_str(&body).map_err(|e| PersistenceError::InvalidResponse(e.to_string()))
    }

    async fn append_turn(
        &self,
        id: &ConversationId,
        commit: &TurnCommit,
    ) -> Result<ConversationId, PersistenceError> {
        debug!("PUT {} ({})", self.chat_url(id), commit.idempotency_key);
        let response = self
            .authorized(self.client.put(self.chat_url(id)))?
            .header(IDEMPOTENCY_HEADER, commit.idempotency_key.as_header_value())
            .json(commit)
            .send()
            .await
            .map_err(|e| PersistenceError::ConnectionError(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| PersistenceError::ConnectionError(e.to_string()))?;
        if !status.is_success() {
            return Err(status_error(status, body, id));
        }

        Ok(committed_id(&body, id))
    }
}
