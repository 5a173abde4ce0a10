//! # Optimistic Messages
//!
//! Builds the locally-visible message that is shown before the server has
//! acknowledged a send. The caller appends it to the message list straight
//! away, so the sender sees their message with zero perceived latency.
//!
//! ## Usage
//!
//! ```rust
//! use orangecat_chat::client::offline::OptimisticFactory;
//! use uuid::Uuid;
//!
//! let factory = OptimisticFactory::new(4000);
//! let message = factory.create(Uuid::new_v4(), Uuid::new_v4(), "  Hello  ").unwrap();
//! assert_eq!(message.content, "Hello");
//! assert!(message.id.is_temporary());
//! ```

use uuid::Uuid;

use crate::client::error::ClientError;
use crate::client::offline::queue::PendingSend;
use crate::shared::messaging::{ChatMessage, MessageId, MessageType};
use crate::shared::AppConfig;

/// Produces optimistic messages and validates composer input
#[derive(Debug, Clone)]
pub struct OptimisticFactory {
    max_length: usize,
}

impl OptimisticFactory {
    pub fn new(max_length: usize) -> Self {
        Self { max_length }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.max_message_length)
    }

    /// Trim and check message content
    pub fn validate(&self, text: &str) -> Result<String, ClientError> {
        let content = text.trim();
        if content.is_empty() {
            return Err(ClientError::validation("content", "Message cannot be empty"));
        }
        let length = content.chars().count();
        if length > self.max_length {
            return Err(ClientError::validation(
                "content",
                format!(
                    "Message is {} characters long; the limit is {}",
                    length, self.max_length
                ),
            ));
        }
        Ok(content.to_string())
    }

    /// Build a pending message with a fresh temporary id
    pub fn create(
        &self,
        conversation_id: Uuid,
        sender_id: Uuid,
        text: &str,
    ) -> Result<ChatMessage, ClientError> {
        let content = self.validate(text)?;
        Ok(ChatMessage::new_optimistic(conversation_id, sender_id, content))
    }

    /// Rebuild the optimistic message for a send that survived a restart
    pub fn restore(&self, pending: &PendingSend, sender_id: Uuid) -> ChatMessage {
        ChatMessage {
            id: MessageId::Temporary(pending.temp_id),
            client_temp_id: Some(pending.temp_id),
            conversation_id: pending.conversation_id,
            sender_id,
            content: pending.content.clone(),
            message_type: MessageType::Text,
            created_at: pending.enqueued_at,
            is_deleted: false,
            edited_at: None,
        }
    }
}

impl Default for OptimisticFactory {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}
