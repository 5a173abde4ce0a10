//! Messaging State
//!
//! Single-writer store for conversations and their message lists. The
//! composer, the real-time merge and read-receipt refreshes all mutate state
//! through [`MessagingStore::dispatch`], which applies one [`Action`] at a
//! time under the write lock. Each action is computed against the current
//! state, so two concurrent appends cannot clobber each other.
//!
//! Subscribers receive a [`StoreEvent`] for every change.

use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use tokio::sync::{broadcast, RwLock};
use uuid::Uuid;

use crate::client::error::ClientError;
use crate::client::offline::{DeliveryStatus, MergeOutcome, MessageEntry, MessageMerger};
use crate::shared::messaging::{ChatMessage, Conversation, ConversationDetail, MessageId};
use crate::shared::RealtimeEvent;

const EVENT_CAPACITY: usize = 256;

/// What the conversation pane is showing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaneState {
    /// Conversation list
    List,
    Loading { conversation_id: Uuid },
    Open { conversation_id: Uuid },
    /// Full-pane error with a retry action
    Error { conversation_id: Uuid, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Warning,
    Error,
}

/// Transient notification (toast)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub text: String,
    pub conversation_id: Option<Uuid>,
}

impl Notice {
    pub fn error(text: impl Into<String>, conversation_id: Option<Uuid>) -> Self {
        Self {
            level: NoticeLevel::Error,
            text: text.into(),
            conversation_id,
        }
    }

    pub fn warning(text: impl Into<String>, conversation_id: Option<Uuid>) -> Self {
        Self {
            level: NoticeLevel::Warning,
            text: text.into(),
            conversation_id,
        }
    }
}

/// Change notification sent to subscribers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    MessagesChanged { conversation_id: Uuid },
    ReadStateChanged { conversation_id: Uuid },
    PaneChanged(PaneState),
    Notice(Notice),
}

/// State transitions accepted by the store
#[derive(Debug, Clone)]
pub enum Action {
    /// Optimistic message from the composer
    AddOptimistic(ChatMessage),
    /// Send attempt failed
    MarkFailed {
        conversation_id: Uuid,
        temp_id: Uuid,
        reason: String,
    },
    /// User retried a failed send
    Retry { conversation_id: Uuid, temp_id: Uuid },
    /// Send endpoint returned the stored message
    Confirm { temp_id: Uuid, message: ChatMessage },
    /// Event from the real-time channel
    Remote(RealtimeEvent),
    OpenRequested(Uuid),
    ConversationLoaded(ConversationDetail),
    /// Caller is not a participant; go back to the list
    ConversationForbidden(Uuid),
    ConversationLoadFailed { conversation_id: Uuid, message: String },
    CloseConversation,
    /// Our own read receipt was accepted by the server
    ReadMarked { conversation_id: Uuid, at: DateTime<Utc> },
    /// Bulk soft delete succeeded
    MessagesDeleted { conversation_id: Uuid, ids: Vec<Uuid> },
    /// Edit endpoint returned the updated message
    MessageEdited(ChatMessage),
}

/// Result of applying an action
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Applied {
    /// Merge result, for actions that go through the merge layer
    pub outcome: Option<MergeOutcome>,
    /// Notifications emitted
    pub events: Vec<StoreEvent>,
}

impl Applied {
    fn messages(conversation_id: Uuid) -> Self {
        Self {
            outcome: None,
            events: vec![StoreEvent::MessagesChanged { conversation_id }],
        }
    }

    fn merged(conversation_id: Uuid, outcome: MergeOutcome) -> Self {
        let events = match &outcome {
            MergeOutcome::ReadStateChanged { .. } => {
                vec![StoreEvent::ReadStateChanged { conversation_id }]
            }
            o if o.is_change() => vec![StoreEvent::MessagesChanged { conversation_id }],
            _ => Vec::new(),
        };
        Self {
            outcome: Some(outcome),
            events,
        }
    }
}

/// Render-ready message with its derived status
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageView {
    pub message: ChatMessage,
    pub status: DeliveryStatus,
    pub is_own: bool,
    pub failure_reason: Option<String>,
}

impl MessageView {
    /// Whether the bubble shows "Failed to send - Retry"
    pub fn can_retry(&self) -> bool {
        self.is_own && self.status == DeliveryStatus::Failed
    }
}

/// Row in the conversation list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationSummary {
    pub id: Uuid,
    pub title: Option<String>,
    pub is_group: bool,
    pub preview: String,
    pub last_message_at: Option<DateTime<Utc>>,
    pub unread_count: usize,
}

/// The messaging state itself
#[derive(Debug, Clone)]
pub struct MessagingState {
    current_user_id: Uuid,
    preview_length: usize,
    conversations: HashMap<Uuid, Conversation>,
    messages: HashMap<Uuid, Vec<MessageEntry>>,
    pane: PaneState,
}

impl MessagingState {
    pub fn new(current_user_id: Uuid, preview_length: usize) -> Self {
        Self {
            current_user_id,
            preview_length,
            conversations: HashMap::new(),
            messages: HashMap::new(),
            pane: PaneState::List,
        }
    }

    pub fn current_user_id(&self) -> Uuid {
        self.current_user_id
    }

    pub fn pane(&self) -> &PaneState {
        &self.pane
    }

    pub fn conversation(&self, id: Uuid) -> Option<&Conversation> {
        self.conversations.get(&id)
    }

    pub fn entries(&self, conversation_id: Uuid) -> &[MessageEntry] {
        self.messages
            .get(&conversation_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn entry(&self, conversation_id: Uuid, temp_id: Uuid) -> Option<&MessageEntry> {
        self.entries(conversation_id)
            .iter()
            .find(|e| e.message.id == MessageId::Temporary(temp_id))
    }

    /// Messages of a conversation with derived delivery status
    pub fn message_views(&self, conversation_id: Uuid) -> Vec<MessageView> {
        let conversation = self.conversations.get(&conversation_id);
        self.entries(conversation_id)
            .iter()
            .map(|entry| MessageView {
                status: entry.status(conversation),
                is_own: entry.message.sender_id == self.current_user_id,
                failure_reason: entry.delivery.failure_reason().map(str::to_string),
                message: entry.message.clone(),
            })
            .collect()
    }

    /// Conversation list, most recent activity first
    pub fn summaries(&self) -> Vec<ConversationSummary> {
        let mut rows: Vec<_> = self
            .conversations
            .values()
            .map(|c| ConversationSummary {
                id: c.id,
                title: c.title.clone(),
                is_group: c.is_group,
                preview: c.last_message_preview.clone(),
                last_message_at: c.last_message_at,
                unread_count: c.unread_count(
                    self.current_user_id,
                    self.entries(c.id).iter().map(|e| &e.message),
                ),
            })
            .collect();
        rows.sort_by(|a, b| {
            b.last_message_at
                .cmp(&a.last_message_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        rows
    }

    /// Apply one action
    pub fn reduce(&mut self, action: Action) -> Result<Applied, ClientError> {
        let merger = MessageMerger::new(self.current_user_id);

        match action {
            Action::AddOptimistic(message) => {
                let conversation_id = message.conversation_id;
                if self
                    .entries(conversation_id)
                    .iter()
                    .any(|e| e.message.id == message.id)
                {
                    return Ok(Applied::default());
                }
                self.touch_preview(&message);
                self.messages
                    .entry(conversation_id)
                    .or_default()
                    .push(MessageEntry::optimistic(message));
                Ok(Applied::messages(conversation_id))
            }

            Action::MarkFailed {
                conversation_id,
                temp_id,
                reason,
            } => {
                self.entry_mut(conversation_id, temp_id)?.delivery.fail(reason)?;
                Ok(Applied::messages(conversation_id))
            }

            Action::Retry {
                conversation_id,
                temp_id,
            } => {
                self.entry_mut(conversation_id, temp_id)?.delivery.retry()?;
                Ok(Applied::messages(conversation_id))
            }

            Action::Confirm { temp_id, message } => {
                let conversation_id = message.conversation_id;
                self.touch_preview(&message);
                let list = self.messages.entry(conversation_id).or_default();
                let outcome = merger.confirm(list, temp_id, message);
                Ok(Applied::merged(conversation_id, outcome))
            }

            Action::Remote(event) => {
                let conversation_id = event.conversation_id();
                if let RealtimeEvent::NewMessage { message } = &event {
                    self.touch_preview(message);
                }
                // Only message-bearing events may start a list
                if matches!(
                    event,
                    RealtimeEvent::NewMessage { .. } | RealtimeEvent::MessageConfirmed { .. }
                ) {
                    self.messages.entry(conversation_id).or_default();
                }
                let mut detached = Vec::new();
                let list = self
                    .messages
                    .get_mut(&conversation_id)
                    .unwrap_or(&mut detached);
                let conversation = self.conversations.get_mut(&conversation_id);
                let outcome = merger.merge(list, conversation, &event);
                Ok(Applied::merged(conversation_id, outcome))
            }

            Action::OpenRequested(conversation_id) => {
                Ok(self.set_pane(PaneState::Loading { conversation_id }))
            }

            Action::ConversationLoaded(detail) => {
                let conversation_id = detail.conversation.id;
                self.install_history(detail);
                let mut applied = Applied::messages(conversation_id);
                if self.pane == (PaneState::Loading { conversation_id }) {
                    applied
                        .events
                        .extend(self.set_pane(PaneState::Open { conversation_id }).events);
                }
                Ok(applied)
            }

            Action::ConversationForbidden(conversation_id) => {
                self.conversations.remove(&conversation_id);
                Ok(self.set_pane(PaneState::List))
            }

            Action::ConversationLoadFailed {
                conversation_id,
                message,
            } => Ok(self.set_pane(PaneState::Error {
                conversation_id,
                message,
            })),

            Action::CloseConversation => Ok(self.set_pane(PaneState::List)),

            Action::ReadMarked { conversation_id, at } => {
                let user = self.current_user_id;
                let changed = self
                    .conversations
                    .get_mut(&conversation_id)
                    .map(|c| c.record_read(user, at))
                    .unwrap_or(false);
                Ok(if changed {
                    Applied {
                        outcome: Some(MergeOutcome::ReadStateChanged { user_id: user }),
                        events: vec![StoreEvent::ReadStateChanged { conversation_id }],
                    }
                } else {
                    Applied::default()
                })
            }

            Action::MessagesDeleted {
                conversation_id,
                ids,
            } => {
                let ids: HashSet<Uuid> = ids.into_iter().collect();
                let mut touched = 0;
                if let Some(list) = self.messages.get_mut(&conversation_id) {
                    for entry in list.iter_mut() {
                        let hit = entry.message.id.permanent().map(|id| ids.contains(&id));
                        if hit == Some(true) && !entry.message.is_deleted {
                            entry.message.is_deleted = true;
                            touched += 1;
                        }
                    }
                }
                Ok(if touched > 0 {
                    Applied::messages(conversation_id)
                } else {
                    Applied::default()
                })
            }

            Action::MessageEdited(message) => {
                let conversation_id = message.conversation_id;
                let outcome = match self.messages.get_mut(&conversation_id) {
                    Some(list) => merger.apply_update(list, &message),
                    None => merger.apply_update(&mut [], &message),
                };
                Ok(Applied::merged(conversation_id, outcome))
            }
        }
    }

    fn entry_mut(&mut self, conversation_id: Uuid, temp_id: Uuid) -> Result<&mut MessageEntry, ClientError> {
        self.messages
            .get_mut(&conversation_id)
            .and_then(|list| {
                list.iter_mut()
                    .find(|e| e.message.id == MessageId::Temporary(temp_id))
            })
            .ok_or_else(|| ClientError::NotFound(format!("message temp:{}", temp_id)))
    }

    fn set_pane(&mut self, pane: PaneState) -> Applied {
        if self.pane == pane {
            return Applied::default();
        }
        self.pane = pane.clone();
        Applied {
            outcome: None,
            events: vec![StoreEvent::PaneChanged(pane)],
        }
    }

    fn touch_preview(&mut self, message: &ChatMessage) {
        if let Some(conversation) = self.conversations.get_mut(&message.conversation_id) {
            conversation.update_last_message(message, self.preview_length);
        }
    }

    /// Replace a conversation's history with the server's copy, keeping
    /// local entries the server does not know about yet.
    fn install_history(&mut self, detail: ConversationDetail) {
        let ConversationDetail {
            conversation,
            messages,
        } = detail;
        let conversation_id = conversation.id;

        let server_ids: HashSet<MessageId> = messages.iter().map(|m| m.id).collect();
        let confirmed_temps: HashSet<Uuid> =
            messages.iter().filter_map(|m| m.client_temp_id).collect();

        let mut list: Vec<MessageEntry> = messages.into_iter().map(MessageEntry::confirmed).collect();
        if let Some(previous) = self.messages.remove(&conversation_id) {
            for entry in previous {
                let known = server_ids.contains(&entry.message.id);
                let confirmed_by_history = entry
                    .message
                    .id
                    .temporary()
                    .map(|t| confirmed_temps.contains(&t))
                    .unwrap_or(false);
                if !known && !confirmed_by_history {
                    list.push(entry);
                }
            }
        }

        self.conversations.insert(conversation_id, conversation);
        self.messages.insert(conversation_id, list);
    }
}

/// Shared, subscribable wrapper around [`MessagingState`]
#[derive(Debug)]
pub struct MessagingStore {
    state: RwLock<MessagingState>,
    events: broadcast::Sender<StoreEvent>,
}

impl MessagingStore {
    pub fn new(current_user_id: Uuid, preview_length: usize) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            state: RwLock::new(MessagingState::new(current_user_id, preview_length)),
            events,
        }
    }

    /// Apply an action and notify subscribers
    pub async fn dispatch(&self, action: Action) -> Result<Applied, ClientError> {
        let mut state = self.state.write().await;
        let applied = state.reduce(action)?;
        for event in &applied.events {
            // No subscribers is fine
            let _ = self.events.send(event.clone());
        }
        Ok(applied)
    }

    /// Emit a transient notice
    pub fn notify(&self, notice: Notice) {
        let _ = self.events.send(StoreEvent::Notice(notice));
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    /// Run a read-only query against the current state
    pub async fn read<R>(&self, f: impl FnOnce(&MessagingState) -> R) -> R {
        let state = self.state.read().await;
        f(&state)
    }

    pub async fn messages(&self, conversation_id: Uuid) -> Vec<MessageView> {
        self.read(|s| s.message_views(conversation_id)).await
    }

    pub async fn pane(&self) -> PaneState {
        self.read(|s| s.pane().clone()).await
    }

    pub async fn summaries(&self) -> Vec<ConversationSummary> {
        self.read(|s| s.summaries()).await
    }

    pub async fn entry(&self, conversation_id: Uuid, temp_id: Uuid) -> Option<MessageEntry> {
        self.read(|s| s.entry(conversation_id, temp_id).cloned()).await
    }
}
