//! Chat Message Data Structure
//!
//! Represents a message in a conversation, both before the server has stored
//! it (temporary id) and after (permanent id).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::shared::error::SharedError;

/// Identity of a message in the visible list
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum MessageId {
    /// Client-generated placeholder, valid until the server confirms the write
    Temporary(Uuid),
    /// Server-assigned identifier
    Permanent(Uuid),
}

impl MessageId {
    pub fn is_temporary(&self) -> bool {
        matches!(self, MessageId::Temporary(_))
    }

    pub fn temporary(&self) -> Option<Uuid> {
        match self {
            MessageId::Temporary(id) => Some(*id),
            MessageId::Permanent(_) => None,
        }
    }

    pub fn permanent(&self) -> Option<Uuid> {
        match self {
            MessageId::Permanent(id) => Some(*id),
            MessageId::Temporary(_) => None,
        }
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageId::Temporary(id) => write!(f, "temp:{}", id),
            MessageId::Permanent(id) => write!(f, "{}", id),
        }
    }
}

/// Type of message content
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    /// Plain text message
    #[default]
    Text,
    /// System message (e.g., "Alice joined the circle")
    System,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Text => "text",
            MessageType::System => "system",
        }
    }

    /// Parse from the wire representation
    pub fn parse(s: &str) -> Result<Self, SharedError> {
        match s {
            "text" => Ok(MessageType::Text),
            "system" => Ok(MessageType::System),
            other => Err(SharedError::invalid(
                "message_type",
                format!("unsupported message type '{}'", other),
            )),
        }
    }
}

/// Represents a chat message
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    /// Temporary or permanent message id
    pub id: MessageId,
    /// Temporary id the client attached when sending; echoed back by the server
    pub client_temp_id: Option<Uuid>,
    /// Conversation this message belongs to
    pub conversation_id: Uuid,
    /// User who sent the message
    pub sender_id: Uuid,
    /// Message content
    pub content: String,
    /// Type of message
    #[serde(default)]
    pub message_type: MessageType,
    /// When the message was created
    pub created_at: DateTime<Utc>,
    /// Soft-delete flag
    #[serde(default)]
    pub is_deleted: bool,
    /// When the message was last edited
    pub edited_at: Option<DateTime<Utc>>,
}

impl ChatMessage {
    /// Create a locally-originated text message with a fresh temporary id
    pub fn new_optimistic(conversation_id: Uuid, sender_id: Uuid, content: String) -> Self {
        let temp_id = Uuid::new_v4();
        Self {
            id: MessageId::Temporary(temp_id),
            client_temp_id: Some(temp_id),
            conversation_id,
            sender_id,
            content,
            message_type: MessageType::Text,
            created_at: Utc::now(),
            is_deleted: false,
            edited_at: None,
        }
    }

    /// Whether the server has stored this message
    pub fn is_persisted(&self) -> bool {
        !self.id.is_temporary()
    }

    /// Temporary id used to match this message against its optimistic entry
    pub fn temp_marker(&self) -> Option<Uuid> {
        self.client_temp_id.or_else(|| self.id.temporary())
    }

    /// Get a preview of the message (first N characters)
    pub fn preview(&self, max_len: usize) -> String {
        if self.is_deleted {
            return "Message deleted".to_string();
        }
        if self.content.chars().count() <= max_len {
            self.content.clone()
        } else {
            let mut preview: String = self.content.chars().take(max_len.saturating_sub(3)).collect();
            preview.push_str("...");
            preview
        }
    }
}

/// Request to send a message
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SendMessageRequest {
    pub conversation_id: Uuid,
    pub content: String,
    #[serde(default)]
    pub message_type: MessageType,
    /// Temporary id, echoed back by the server for reconciliation
    pub client_temp_id: Uuid,
}

/// Message row as the backend sends it, before validation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WireMessage {
    pub id: Option<String>,
    pub conversation_id: Option<String>,
    pub sender_id: Option<String>,
    pub content: Option<String>,
    pub message_type: Option<String>,
    pub created_at: Option<String>,
    pub is_deleted: Option<bool>,
    pub edited_at: Option<String>,
    pub client_temp_id: Option<String>,
}

impl TryFrom<WireMessage> for ChatMessage {
    type Error = SharedError;

    fn try_from(wire: WireMessage) -> Result<Self, Self::Error> {
        let id = parse_uuid("id", wire.id.as_deref())?;
        let conversation_id = parse_uuid("conversation_id", wire.conversation_id.as_deref())?;
        let sender_id = parse_uuid("sender_id", wire.sender_id.as_deref())?;
        let content = wire
            .content
            .ok_or_else(|| SharedError::missing("content"))?;
        let message_type = match wire.message_type.as_deref() {
            Some(raw) => MessageType::parse(raw)?,
            None => MessageType::Text,
        };
        let created_at = parse_timestamp("created_at", wire.created_at.as_deref())?;
        let edited_at = match wire.edited_at.as_deref() {
            Some(raw) => Some(parse_timestamp("edited_at", Some(raw))?),
            None => None,
        };
        let client_temp_id = match wire.client_temp_id.as_deref() {
            Some(raw) => Some(parse_uuid("client_temp_id", Some(raw))?),
            None => None,
        };

        Ok(ChatMessage {
            id: MessageId::Permanent(id),
            client_temp_id,
            conversation_id,
            sender_id,
            content,
            message_type,
            created_at,
            is_deleted: wire.is_deleted.unwrap_or(false),
            edited_at,
        })
    }
}

pub(crate) fn parse_uuid(field: &str, raw: Option<&str>) -> Result<Uuid, SharedError> {
    let raw = raw.ok_or_else(|| SharedError::missing(field))?;
    Uuid::parse_str(raw).map_err(|e| SharedError::invalid(field, e.to_string()))
}

pub(crate) fn parse_timestamp(field: &str, raw: Option<&str>) -> Result<DateTime<Utc>, SharedError> {
    let raw = raw.ok_or_else(|| SharedError::missing(field))?;
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| SharedError::invalid(field, e.to_string()))
}
