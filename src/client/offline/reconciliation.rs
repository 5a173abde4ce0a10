//! # Real-Time Merge
//!
//! Reconciles server-pushed events with the locally-held message list.
//! Every merge is idempotent: replaying an event leaves the list unchanged.
//!
//! ## Rules
//!
//! - **new_message** from someone else: appended unless its permanent id is
//!   already in the list.
//! - **message_confirmed** for our own send: the optimistic entry carrying the
//!   same temporary id is replaced in place, so it keeps its list position.
//!   When no such entry exists (the list was reset) the message is appended.
//!   A confirmation whose temporary id already has a stored copy is a
//!   duplicate, whatever permanent id it carries.
//! - **message_updated**: edits and soft deletes are applied to the entry with
//!   that permanent id.
//! - **read_receipt_update**: only moves the participant's last-read mark.
//!   Read/delivered status is derived when the list is rendered.
//!
//! Existing entries are never reordered; the in-place replacement above is
//! the only positional change the merge makes.

use uuid::Uuid;

use crate::client::offline::delivery::MessageEntry;
use crate::shared::messaging::{ChatMessage, Conversation, MessageId};
use crate::shared::RealtimeEvent;

/// What a merge did to the list
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    /// Message added at the end of the list
    Appended { id: MessageId },
    /// Optimistic entry replaced in place by its confirmed version
    Replaced { temp_id: Uuid, index: usize },
    /// A stray optimistic entry was dropped because its confirmed copy was
    /// already present
    Collapsed { temp_id: Uuid },
    /// Existing entry edited or soft-deleted
    Updated { id: MessageId },
    /// A participant's last-read mark moved forward
    ReadStateChanged { user_id: Uuid },
    /// Event already applied
    Duplicate,
    /// Event had nothing to apply to
    Ignored { reason: &'static str },
}

impl MergeOutcome {
    /// Whether the visible list or its derived statuses changed
    pub fn is_change(&self) -> bool {
        !matches!(self, MergeOutcome::Duplicate | MergeOutcome::Ignored { .. })
    }

    /// Temporary id retired by this merge, if any
    pub fn retired_temp_id(&self) -> Option<Uuid> {
        match self {
            MergeOutcome::Replaced { temp_id, .. } | MergeOutcome::Collapsed { temp_id } => {
                Some(*temp_id)
            }
            _ => None,
        }
    }
}

/// Applies real-time events to one conversation's message list
#[derive(Debug, Clone, Copy)]
pub struct MessageMerger {
    current_user: Uuid,
}

impl MessageMerger {
    pub fn new(current_user: Uuid) -> Self {
        Self { current_user }
    }

    /// Merge a single event. `entries` and `conversation` must belong to the
    /// event's conversation.
    pub fn merge(
        &self,
        entries: &mut Vec<MessageEntry>,
        conversation: Option<&mut Conversation>,
        event: &RealtimeEvent,
    ) -> MergeOutcome {
        match event {
            RealtimeEvent::NewMessage { message } => {
                let own_echo = message.sender_id == self.current_user;
                match message.client_temp_id {
                    Some(temp_id) if own_echo => self.confirm(entries, temp_id, message.clone()),
                    _ => self.append_remote(entries, message.clone()),
                }
            }
            RealtimeEvent::MessageConfirmed { temp_id, message } => {
                self.confirm(entries, *temp_id, message.clone())
            }
            RealtimeEvent::MessageUpdated { message } => self.apply_update(entries, message),
            RealtimeEvent::ReadReceiptUpdate {
                user_id,
                last_read_at,
                ..
            } => match conversation {
                Some(conversation) => {
                    if conversation.record_read(*user_id, *last_read_at) {
                        MergeOutcome::ReadStateChanged { user_id: *user_id }
                    } else {
                        MergeOutcome::Duplicate
                    }
                }
                None => MergeOutcome::Ignored {
                    reason: "conversation not loaded",
                },
            },
            RealtimeEvent::Typing { .. } => MergeOutcome::Ignored {
                reason: "typing events do not touch the message list",
            },
        }
    }

    /// Append a message pushed by the server, deduplicating by permanent id
    pub fn append_remote(&self, entries: &mut Vec<MessageEntry>, message: ChatMessage) -> MergeOutcome {
        if position_of(entries, &message.id).is_some() {
            return MergeOutcome::Duplicate;
        }
        let id = message.id;
        entries.push(MessageEntry::confirmed(message));
        MergeOutcome::Appended { id }
    }

    /// Swap an optimistic entry for its confirmed message
    pub fn confirm(
        &self,
        entries: &mut Vec<MessageEntry>,
        temp_id: Uuid,
        mut message: ChatMessage,
    ) -> MergeOutcome {
        message.client_temp_id = Some(temp_id);
        let temp_key = MessageId::Temporary(temp_id);

        // A second send of the same temp id comes back under a new permanent
        // id, so the stored copy is matched by temp id as well.
        let already_confirmed = entries.iter().any(|e| {
            e.message.id == message.id
                || (e.message.is_persisted() && e.message.client_temp_id == Some(temp_id))
        });
        if already_confirmed {
            // Make sure no optimistic twin lingers
            return match position_of(entries, &temp_key) {
                Some(index) => {
                    entries.remove(index);
                    MergeOutcome::Collapsed { temp_id }
                }
                None => MergeOutcome::Duplicate,
            };
        }

        // Oldest pending entry first; a failed one still counts because the
        // server has now proven it stored the message.
        let target = entries
            .iter()
            .position(|e| e.message.id == temp_key && e.delivery.is_pending())
            .or_else(|| {
                entries
                    .iter()
                    .position(|e| e.message.id == temp_key && e.delivery.is_failed())
            });

        match target {
            Some(index) => {
                let entry = &mut entries[index];
                entry.message = message;
                if let Err(e) = entry.delivery.confirm() {
                    tracing::warn!("[MERGE] temp:{} confirmed from a refused state: {}", temp_id, e);
                }
                MergeOutcome::Replaced { temp_id, index }
            }
            None => {
                let id = message.id;
                entries.push(MessageEntry::confirmed(message));
                MergeOutcome::Appended { id }
            }
        }
    }

    /// Apply an edit or soft delete to a stored message
    pub fn apply_update(&self, entries: &mut [MessageEntry], message: &ChatMessage) -> MergeOutcome {
        let Some(index) = position_of(entries, &message.id) else {
            return MergeOutcome::Ignored {
                reason: "updated message is not in the list",
            };
        };
        let current = &mut entries[index].message;
        if current.content == message.content
            && current.is_deleted == message.is_deleted
            && current.edited_at == message.edited_at
        {
            return MergeOutcome::Duplicate;
        }
        current.content = message.content.clone();
        current.is_deleted = message.is_deleted;
        current.edited_at = message.edited_at;
        MergeOutcome::Updated { id: message.id }
    }
}

fn position_of(entries: &[MessageEntry], id: &MessageId) -> Option<usize> {
    entries.iter().position(|e| &e.message.id == id)
}
