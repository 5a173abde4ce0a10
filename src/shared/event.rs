//! Real-time Event System
//!
//! Events pushed by the backend's real-time channel. Each line on the stream
//! is a [`WireEvent`] envelope; [`RealtimeEvent::decode`] validates the
//! envelope and its payload into a typed event before anything is merged
//! into the local message list.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::shared::error::SharedError;
use crate::shared::messaging::message::{parse_timestamp, parse_uuid};
use crate::shared::messaging::{ChatMessage, WireMessage};

/// Envelope as it arrives on the wire
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireEvent {
    /// Event discriminator (`new_message`, `read_receipt_update`, ...)
    pub event_type: String,
    /// Event payload
    #[serde(default)]
    pub payload: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ConfirmedPayload {
    temp_id: Option<String>,
    message: WireMessage,
}

#[derive(Debug, Deserialize)]
struct ReadReceiptPayload {
    conversation_id: Option<String>,
    user_id: Option<String>,
    last_read_at: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TypingPayload {
    conversation_id: Option<String>,
    user_id: Option<String>,
    #[serde(default)]
    is_typing: bool,
}

/// Typed real-time event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RealtimeEvent {
    /// A message row was inserted
    NewMessage { message: ChatMessage },
    /// The backend acknowledged one of our own sends
    MessageConfirmed { temp_id: Uuid, message: ChatMessage },
    /// A message row was updated (edit or soft delete)
    MessageUpdated { message: ChatMessage },
    /// A participant's last-read timestamp moved
    ReadReceiptUpdate {
        conversation_id: Uuid,
        user_id: Uuid,
        last_read_at: DateTime<Utc>,
    },
    /// Someone started or stopped typing
    Typing {
        conversation_id: Uuid,
        user_id: Uuid,
        is_typing: bool,
    },
}

impl RealtimeEvent {
    /// Decode one line of the real-time stream
    pub fn decode(line: &str) -> Result<Self, SharedError> {
        let wire: WireEvent = serde_json::from_str(line)?;
        Self::try_from(wire)
    }

    /// Conversation the event belongs to
    pub fn conversation_id(&self) -> Uuid {
        match self {
            RealtimeEvent::NewMessage { message }
            | RealtimeEvent::MessageConfirmed { message, .. }
            | RealtimeEvent::MessageUpdated { message } => message.conversation_id,
            RealtimeEvent::ReadReceiptUpdate { conversation_id, .. }
            | RealtimeEvent::Typing { conversation_id, .. } => *conversation_id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            RealtimeEvent::NewMessage { .. } => "new_message",
            RealtimeEvent::MessageConfirmed { .. } => "message_confirmed",
            RealtimeEvent::MessageUpdated { .. } => "message_updated",
            RealtimeEvent::ReadReceiptUpdate { .. } => "read_receipt_update",
            RealtimeEvent::Typing { .. } => "typing",
        }
    }
}

impl TryFrom<WireEvent> for RealtimeEvent {
    type Error = SharedError;

    fn try_from(wire: WireEvent) -> Result<Self, Self::Error> {
        match wire.event_type.as_str() {
            "new_message" => {
                let raw: WireMessage = serde_json::from_value(wire.payload)?;
                Ok(RealtimeEvent::NewMessage {
                    message: ChatMessage::try_from(raw)?,
                })
            }
            "message_updated" => {
                let raw: WireMessage = serde_json::from_value(wire.payload)?;
                Ok(RealtimeEvent::MessageUpdated {
                    message: ChatMessage::try_from(raw)?,
                })
            }
            "message_confirmed" => {
                let raw: ConfirmedPayload = serde_json::from_value(wire.payload)?;
                let message = ChatMessage::try_from(raw.message)?;
                let temp_id = match raw.temp_id.as_deref() {
                    Some(id) => parse_uuid("temp_id", Some(id))?,
                    None => message
                        .client_temp_id
                        .ok_or_else(|| SharedError::missing("temp_id"))?,
                };
                Ok(RealtimeEvent::MessageConfirmed { temp_id, message })
            }
            "read_receipt_update" => {
                let raw: ReadReceiptPayload = serde_json::from_value(wire.payload)?;
                Ok(RealtimeEvent::ReadReceiptUpdate {
                    conversation_id: parse_uuid("conversation_id", raw.conversation_id.as_deref())?,
                    user_id: parse_uuid("user_id", raw.user_id.as_deref())?,
                    last_read_at: parse_timestamp("last_read_at", raw.last_read_at.as_deref())?,
                })
            }
            "typing" => {
                let raw: TypingPayload = serde_json::from_value(wire.payload)?;
                Ok(RealtimeEvent::Typing {
                    conversation_id: parse_uuid("conversation_id", raw.conversation_id.as_deref())?,
                    user_id: parse_uuid("user_id", raw.user_id.as_deref())?,
                    is_typing: raw.is_typing,
                })
            }
            other => Err(SharedError::UnknownEvent(other.to_string())),
        }
    }
}
