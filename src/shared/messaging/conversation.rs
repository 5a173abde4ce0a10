//! Conversation Data Structure
//!
//! Represents a direct or group conversation. Read state is never stored on
//! messages; it is derived from the participants' last-read timestamps.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::message::{parse_timestamp, parse_uuid, ChatMessage, WireMessage};
use crate::shared::error::SharedError;

/// A member of a conversation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Participant {
    pub user_id: Uuid,
    /// Last time this participant viewed the conversation
    pub last_read_at: Option<DateTime<Utc>>,
    /// Participants who left stay listed but no longer count for read state
    pub is_active: bool,
}

impl Participant {
    pub fn new(user_id: Uuid) -> Self {
        Self {
            user_id,
            last_read_at: None,
            is_active: true,
        }
    }

    /// Whether this participant has seen everything up to `at`
    pub fn has_read(&self, at: DateTime<Utc>) -> bool {
        self.last_read_at.map(|ts| ts >= at).unwrap_or(false)
    }
}

/// Represents a conversation between users
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Conversation {
    /// Unique conversation ID
    pub id: Uuid,
    /// Display title (group name, or the other user's name)
    pub title: Option<String>,
    /// Group conversation, as opposed to a direct one
    pub is_group: bool,
    /// Participants with their read receipts
    pub participants: Vec<Participant>,
    /// Preview text of last message
    pub last_message_preview: String,
    /// Timestamp of last message
    pub last_message_at: Option<DateTime<Utc>>,
    /// When the conversation was created
    pub created_at: DateTime<Utc>,
}

impl Conversation {
    /// Create a new conversation
    pub fn new(participants: Vec<Uuid>) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: None,
            is_group: participants.len() > 2,
            participants: participants.into_iter().map(Participant::new).collect(),
            last_message_preview: String::new(),
            last_message_at: None,
            created_at: Utc::now(),
        }
    }

    /// Create a new conversation between two users
    pub fn new_direct(user1: Uuid, user2: Uuid) -> Self {
        Self::new(vec![user1, user2])
    }

    /// Update the last message preview
    pub fn update_last_message(&mut self, message: &ChatMessage, preview_len: usize) {
        if self
            .last_message_at
            .map(|ts| ts > message.created_at)
            .unwrap_or(false)
        {
            return;
        }
        self.last_message_preview = message.preview(preview_len);
        self.last_message_at = Some(message.created_at);
    }

    pub fn participant(&self, user_id: Uuid) -> Option<&Participant> {
        self.participants.iter().find(|p| p.user_id == user_id)
    }

    /// Active participants other than `user_id`
    pub fn other_active_participants(&self, user_id: Uuid) -> impl Iterator<Item = &Participant> {
        self.participants
            .iter()
            .filter(move |p| p.is_active && p.user_id != user_id)
    }

    /// Record a read receipt. Returns false when the timestamp does not move
    /// the participant forward (stale or duplicate receipt, unknown user).
    pub fn record_read(&mut self, user_id: Uuid, at: DateTime<Utc>) -> bool {
        match self.participants.iter_mut().find(|p| p.user_id == user_id) {
            Some(p) if p.last_read_at.map(|ts| at > ts).unwrap_or(true) => {
                p.last_read_at = Some(at);
                true
            }
            _ => false,
        }
    }

    /// Messages from others newer than `user_id`'s last read
    pub fn unread_count<'a>(
        &self,
        user_id: Uuid,
        messages: impl IntoIterator<Item = &'a ChatMessage>,
    ) -> usize {
        let last_read = self.participant(user_id).and_then(|p| p.last_read_at);
        messages
            .into_iter()
            .filter(|m| m.sender_id != user_id && !m.is_deleted)
            .filter(|m| last_read.map(|ts| m.created_at > ts).unwrap_or(true))
            .count()
    }
}

/// Conversation with its message history, as loaded from the backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationDetail {
    pub conversation: Conversation,
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WireParticipant {
    pub user_id: Option<String>,
    pub last_read_at: Option<String>,
    pub is_active: Option<bool>,
}

/// Conversation payload as the backend sends it, before validation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WireConversation {
    pub id: Option<String>,
    pub title: Option<String>,
    pub is_group: Option<bool>,
    #[serde(default)]
    pub participants: Vec<WireParticipant>,
    pub created_at: Option<String>,
    #[serde(default)]
    pub messages: Vec<WireMessage>,
}

impl TryFrom<WireParticipant> for Participant {
    type Error = SharedError;

    fn try_from(wire: WireParticipant) -> Result<Self, Self::Error> {
        let last_read_at = match wire.last_read_at.as_deref() {
            Some(raw) => Some(parse_timestamp("last_read_at", Some(raw))?),
            None => None,
        };
        Ok(Participant {
            user_id: parse_uuid("user_id", wire.user_id.as_deref())?,
            last_read_at,
            is_active: wire.is_active.unwrap_or(true),
        })
    }
}

impl TryFrom<WireConversation> for ConversationDetail {
    type Error = SharedError;

    fn try_from(wire: WireConversation) -> Result<Self, Self::Error> {
        let participants = wire
            .participants
            .into_iter()
            .map(Participant::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        let mut messages = wire
            .messages
            .into_iter()
            .map(ChatMessage::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        messages.sort_by_key(|m| m.created_at);

        let is_group = wire.is_group.unwrap_or(participants.len() > 2);
        let mut conversation = Conversation {
            id: parse_uuid("id", wire.id.as_deref())?,
            title: wire.title,
            is_group,
            participants,
            last_message_preview: String::new(),
            last_message_at: None,
            created_at: parse_timestamp("created_at", wire.created_at.as_deref())?,
        };
        if let Some(last) = messages.last() {
            conversation.update_last_message(last, crate::shared::config::DEFAULT_PREVIEW_LENGTH);
        }

        Ok(ConversationDetail {
            conversation,
            messages,
        })
    }
}
