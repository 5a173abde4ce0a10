//! Messaging API Client
//!
//! Async access to the messaging endpoints. Every response is validated into
//! domain types here; nothing past this module sees a `Wire*` struct.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::client::config::Config;
use crate::client::error::ClientError;
use crate::shared::messaging::message::parse_timestamp;
use crate::shared::messaging::{
    ChatMessage, ConversationDetail, ProfileSummary, SearchProfilesResponse, SendMessageRequest,
    WireConversation, WireMessage,
};

/// Backend operations the messaging client depends on
#[async_trait]
pub trait MessagingApi: Send + Sync {
    /// Persist a message; returns the stored copy with its permanent id
    async fn send_message(&self, request: &SendMessageRequest) -> Result<ChatMessage, ClientError>;

    /// Mark the conversation read for the caller; returns the new last-read mark
    async fn mark_read(&self, conversation_id: Uuid) -> Result<DateTime<Utc>, ClientError>;

    async fn load_conversation(&self, conversation_id: Uuid) -> Result<ConversationDetail, ClientError>;

    /// Soft-delete messages in bulk
    async fn delete_messages(&self, conversation_id: Uuid, message_ids: &[Uuid]) -> Result<(), ClientError>;

    async fn edit_message(
        &self,
        conversation_id: Uuid,
        message_id: Uuid,
        content: &str,
    ) -> Result<ChatMessage, ClientError>;

    async fn search_profiles(&self, query: &str) -> Result<Vec<ProfileSummary>, ClientError>;
}

#[derive(Debug, Deserialize)]
struct MessageEnvelope {
    message: WireMessage,
}

#[derive(Debug, Deserialize)]
struct MarkReadResponse {
    last_read_at: Option<String>,
}

#[derive(Debug, Serialize)]
struct DeleteMessagesRequest<'a> {
    message_ids: &'a [Uuid],
}

#[derive(Debug, Serialize)]
struct EditMessageRequest<'a> {
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: Option<String>,
    message: Option<String>,
}

/// Map a non-2xx status to the error class the UI acts on
pub fn classify_status(status: StatusCode, message: String, conversation_id: Option<Uuid>) -> ClientError {
    match status.as_u16() {
        408 | 429 | 502 | 503 | 504 => ClientError::network(format!("{} ({})", message, status)),
        403 | 404 => match conversation_id {
            Some(conversation_id) => ClientError::Access { conversation_id },
            None => ClientError::server(status.as_u16(), message),
        },
        code => ClientError::server(code, message),
    }
}

/// [`MessagingApi`] over HTTP
#[derive(Debug, Clone)]
pub struct HttpMessagingApi {
    config: Config,
    client: Client,
}

impl HttpMessagingApi {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            client: Client::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match self.config.get_token() {
            Some(token) => request.header("Authorization", format!("Bearer {}", token)),
            None => request,
        }
    }

    /// Send the request and turn non-2xx answers into [`ClientError`]
    async fn execute(
        &self,
        request: RequestBuilder,
        conversation_id: Option<Uuid>,
    ) -> Result<Response, ClientError> {
        let response = self.authorize(request).send().await?;
        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&text)
            .ok()
            .and_then(|body| body.error.or(body.message))
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| {
                if text.is_empty() {
                    status.to_string()
                } else {
                    text.clone()
                }
            });
        tracing::warn!("[API] Request failed with {}: {}", status, message);
        Err(classify_status(status, message, conversation_id))
    }
}

#[async_trait]
impl MessagingApi for HttpMessagingApi {
    async fn send_message(&self, request: &SendMessageRequest) -> Result<ChatMessage, ClientError> {
        let url = self.config.api_url("/api/messages");
        tracing::debug!(
            "[API] POST {} (conversation {}, temp:{})",
            url,
            request.conversation_id,
            request.client_temp_id
        );

        let response = self
            .execute(self.client.post(&url).json(request), Some(request.conversation_id))
            .await?;
        let envelope: MessageEnvelope = response.json().await?;
        let mut message = ChatMessage::try_from(envelope.message)?;
        // Older servers do not echo the marker
        if message.client_temp_id.is_none() {
            message.client_temp_id = Some(request.client_temp_id);
        }
        Ok(message)
    }

    async fn mark_read(&self, conversation_id: Uuid) -> Result<DateTime<Utc>, ClientError> {
        let url = self
            .config
            .api_url(&format!("/api/conversations/{}/read", conversation_id));
        let response = self
            .execute(self.client.post(&url), Some(conversation_id))
            .await?;
        let body: MarkReadResponse = response.json().await?;
        Ok(parse_timestamp("last_read_at", body.last_read_at.as_deref())?)
    }

    async fn load_conversation(&self, conversation_id: Uuid) -> Result<ConversationDetail, ClientError> {
        let url = self
            .config
            .api_url(&format!("/api/conversations/{}", conversation_id));
        let response = self
            .execute(self.client.get(&url), Some(conversation_id))
            .await?;
        let wire: WireConversation = response.json().await?;
        Ok(ConversationDetail::try_from(wire)?)
    }

    async fn delete_messages(&self, conversation_id: Uuid, message_ids: &[Uuid]) -> Result<(), ClientError> {
        let url = self
            .config
            .api_url(&format!("/api/conversations/{}/messages/delete", conversation_id));
        self.execute(
            self.client
                .post(&url)
                .json(&DeleteMessagesRequest { message_ids }),
            Some(conversation_id),
        )
        .await?;
        Ok(())
    }

    async fn edit_message(
        &self,
        conversation_id: Uuid,
        message_id: Uuid,
        content: &str,
    ) -> Result<ChatMessage, ClientError> {
        let url = self.config.api_url(&format!(
            "/api/conversations/{}/messages/{}",
            conversation_id, message_id
        ));
        let response = self
            .execute(
                self.client.patch(&url).json(&EditMessageRequest { content }),
                Some(conversation_id),
            )
            .await?;
        let envelope: MessageEnvelope = response.json().await?;
        Ok(ChatMessage::try_from(envelope.message)?)
    }

    async fn search_profiles(&self, query: &str) -> Result<Vec<ProfileSummary>, ClientError> {
        let url = self.config.api_url("/api/profiles/search");
        let response = self
            .execute(self.client.get(&url).query(&[("q", query)]), None)
            .await?;
        let body: SearchProfilesResponse = response.json().await?;
        Ok(body.profiles)
    }
}
