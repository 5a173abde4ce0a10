//! Messaging Module
//!
//! [`MessagingClient`] wires the offline core to the backend:
//!
//! - `state.rs`: single-writer store with the message lists and pane state
//! - `api.rs`: HTTP endpoints behind the [`MessagingApi`] trait
//! - `realtime.rs`: newline-delimited JSON event stream
//! - `typing.rs`: typing indicators with expiry
//! - `search.rs`: last-request-wins profile search
//!
//! ## Send flow
//!
//! ```text
//! composer ──▶ validate ──▶ AddOptimistic (pending) ──▶ offline? ──▶ queue
//!                                   │
//!                                   ▼
//!                         POST /api/messages (timeout)
//!                          │            │
//!                        ok│            │err
//!                          ▼            ▼
//!                       Confirm     MarkFailed ──▶ network error? ──▶ queue
//! ```
//!
//! At most one POST per temporary id is in flight. A retry or flush that
//! finds the message already being sent backs off with [`Delivery::InFlight`].
//! Queued sends are replayed when the network monitor reports a status that
//! can send, and on a fixed interval while the queue is non-empty.

pub mod api;
pub mod realtime;
pub mod search;
pub mod state;
pub mod typing;

#[cfg(test)]
pub(crate) mod mock;

pub use api::{HttpMessagingApi, MessagingApi};
pub use realtime::{RealtimeSubscription, StreamStatus};
pub use search::{SearchCoordinator, SearchOutcome};
pub use state::{
    Action, Applied, ConversationSummary, MessageView, MessagingStore, Notice, NoticeLevel,
    PaneState, StoreEvent,
};
pub use typing::TypingTracker;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use uuid::Uuid;

use crate::client::error::ClientError;
use crate::client::offline::{
    FlushDecision, FlushReport, OfflineQueue, OptimisticFactory, PendingSend, QueueSender,
    QueueStore,
};
use crate::client::sync::{NetworkMonitor, NetworkStatus};
use crate::shared::messaging::{ChatMessage, MessageType, SendMessageRequest};
use crate::shared::{AppConfig, RealtimeEvent};

/// Result of one delivery attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// Server stored the message
    Confirmed(ChatMessage),
    /// Offline; the send waits in the queue and the message stays pending
    Queued,
    /// Attempt failed; the message is marked failed
    Failed(ClientError),
    /// Another attempt for the same message is still waiting on the server
    InFlight,
}

/// Returned by [`MessagingClient::send_message`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendOutcome {
    /// Temporary id of the optimistic entry
    pub temp_id: Uuid,
    pub delivery: Delivery,
}

/// Messaging client for one signed-in user
pub struct MessagingClient {
    user_id: Uuid,
    send_timeout: Duration,
    queue_retry_interval: Duration,
    api: Arc<dyn MessagingApi>,
    store: Arc<MessagingStore>,
    queue: OfflineQueue,
    factory: OptimisticFactory,
    network: NetworkMonitor,
    typing: Mutex<TypingTracker>,
    search: SearchCoordinator,
    /// Temporary ids with a POST outstanding
    in_flight: StdMutex<HashSet<Uuid>>,
}

/// Exclusive right to send one temporary id; released on drop
struct SendClaim<'a> {
    in_flight: &'a StdMutex<HashSet<Uuid>>,
    temp_id: Uuid,
}

impl<'a> SendClaim<'a> {
    fn acquire(in_flight: &'a StdMutex<HashSet<Uuid>>, temp_id: Uuid) -> Option<Self> {
        let mut ids = in_flight.lock().unwrap_or_else(|e| e.into_inner());
        ids.insert(temp_id).then(|| Self { in_flight, temp_id })
    }
}

impl Drop for SendClaim<'_> {
    fn drop(&mut self) {
        self.in_flight
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&self.temp_id);
    }
}

impl std::fmt::Debug for MessagingClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessagingClient")
            .field("user_id", &self.user_id)
            .field("send_timeout", &self.send_timeout)
            .field("network", &self.network.get_status())
            .finish_non_exhaustive()
    }
}

impl MessagingClient {
    pub fn new(
        user_id: Uuid,
        config: &AppConfig,
        api: Arc<dyn MessagingApi>,
        queue_store: Arc<dyn QueueStore>,
        network: NetworkMonitor,
    ) -> Self {
        Self {
            user_id,
            send_timeout: config.send_timeout,
            queue_retry_interval: config.queue_retry_interval,
            store: Arc::new(MessagingStore::new(user_id, config.preview_length)),
            queue: OfflineQueue::new(queue_store),
            factory: OptimisticFactory::from_config(config),
            typing: Mutex::new(TypingTracker::new(user_id, config.typing_expiry)),
            search: SearchCoordinator::new(Arc::clone(&api)),
            api,
            network,
            in_flight: StdMutex::new(HashSet::new()),
        }
    }

    pub fn user_id(&self) -> Uuid {
        self.user_id
    }

    pub fn store(&self) -> &Arc<MessagingStore> {
        &self.store
    }

    pub fn queue(&self) -> &OfflineQueue {
        &self.queue
    }

    pub fn network(&self) -> &NetworkMonitor {
        &self.network
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.store.subscribe()
    }

    pub async fn messages(&self, conversation_id: Uuid) -> Vec<MessageView> {
        self.store.messages(conversation_id).await
    }

    pub async fn summaries(&self) -> Vec<ConversationSummary> {
        self.store.summaries().await
    }

    pub async fn pane(&self) -> PaneState {
        self.store.pane().await
    }

    /// Put sends that survived a restart back into the visible list
    pub async fn restore_pending(&self) -> usize {
        let pending = self.queue.pending().await;
        let mut restored = 0;
        for entry in &pending {
            let message = self.factory.restore(entry, self.user_id);
            match self.store.dispatch(Action::AddOptimistic(message)).await {
                Ok(applied) if !applied.events.is_empty() => restored += 1,
                Ok(_) => {}
                Err(e) => tracing::warn!("[QUEUE] Could not restore temp:{}: {}", entry.temp_id, e),
            }
        }
        if restored > 0 {
            tracing::info!("[QUEUE] Restored {} pending message(s) from the offline queue", restored);
        }
        restored
    }

    /// Send a message typed into the composer.
    ///
    /// The optimistic entry is in the list before this awaits the network.
    /// Only validation errors are returned as `Err`; delivery failures are
    /// reported through the outcome and the message's status.
    pub async fn send_message(&self, conversation_id: Uuid, text: &str) -> Result<SendOutcome, ClientError> {
        let message = self.factory.create(conversation_id, self.user_id, text)?;
        let temp_id = message.temp_marker().ok_or_else(|| {
            ClientError::NotFound(format!("temporary id for message {}", message.id))
        })?;
        let content = message.content.clone();

        self.store.dispatch(Action::AddOptimistic(message)).await?;
        tracing::info!("[SEND] Optimistic message temp:{} in conversation {}", temp_id, conversation_id);

        let delivery = if self.network.is_online() {
            self.deliver(conversation_id, temp_id, content).await
        } else {
            self.queue
                .enqueue(PendingSend::new(temp_id, conversation_id, content))
                .await;
            tracing::info!("[SEND] Offline, temp:{} queued", temp_id);
            Delivery::Queued
        };
        Ok(SendOutcome { temp_id, delivery })
    }

    /// Retry a failed message in place
    pub async fn retry_message(&self, conversation_id: Uuid, temp_id: Uuid) -> Result<Delivery, ClientError> {
        if self.is_in_flight(temp_id) {
            tracing::debug!("[SEND] temp:{} already in flight, not retrying", temp_id);
            return Ok(Delivery::InFlight);
        }
        self.store
            .dispatch(Action::Retry {
                conversation_id,
                temp_id,
            })
            .await?;
        let content = self
            .store
            .entry(conversation_id, temp_id)
            .await
            .map(|entry| entry.message.content)
            .ok_or_else(|| ClientError::NotFound(format!("message temp:{}", temp_id)))?;
        tracing::info!("[SEND] Retrying temp:{}", temp_id);

        if !self.network.is_online() {
            self.queue
                .enqueue(PendingSend::new(temp_id, conversation_id, content))
                .await;
            return Ok(Delivery::Queued);
        }
        Ok(self.deliver(conversation_id, temp_id, content).await)
    }

    /// One POST for a pending entry, with the outcome applied to the store
    /// and the queue
    async fn deliver(&self, conversation_id: Uuid, temp_id: Uuid, content: String) -> Delivery {
        let Some(_claim) = SendClaim::acquire(&self.in_flight, temp_id) else {
            tracing::debug!("[SEND] temp:{} already in flight", temp_id);
            return Delivery::InFlight;
        };
        if let Some(stored) = self.stored_copy(conversation_id, temp_id).await {
            tracing::debug!("[SEND] temp:{} already confirmed as {}", temp_id, stored.id);
            self.queue.remove(temp_id).await;
            return Delivery::Confirmed(stored);
        }

        let request = SendMessageRequest {
            conversation_id,
            content: content.clone(),
            message_type: MessageType::Text,
            client_temp_id: temp_id,
        };

        let result = match tokio::time::timeout(self.send_timeout, self.api.send_message(&request)).await {
            Ok(result) => result,
            Err(_) => Err(ClientError::network(format!(
                "Request timed out after {:?}",
                self.send_timeout
            ))),
        };

        match result {
            Ok(message) => {
                tracing::info!("[SEND] temp:{} confirmed as {}", temp_id, message.id);
                if let Err(e) = self
                    .store
                    .dispatch(Action::Confirm {
                        temp_id,
                        message: message.clone(),
                    })
                    .await
                {
                    tracing::error!("[SEND] Could not apply confirmation for temp:{}: {}", temp_id, e);
                }
                self.queue.remove(temp_id).await;
                Delivery::Confirmed(message)
            }
            Err(error) => {
                tracing::warn!("[SEND] temp:{} failed: {}", temp_id, error);
                if let Err(e) = self
                    .store
                    .dispatch(Action::MarkFailed {
                        conversation_id,
                        temp_id,
                        reason: error.to_string(),
                    })
                    .await
                {
                    // A real-time confirmation got there first
                    tracing::debug!("[SEND] Not marking temp:{} failed: {}", temp_id, e);
                }

                if error.is_retryable() {
                    self.queue
                        .enqueue(PendingSend::new(temp_id, conversation_id, content))
                        .await;
                } else {
                    self.queue.remove(temp_id).await;
                }
                self.store
                    .notify(Notice::error(error.user_message(), Some(conversation_id)));
                Delivery::Failed(error)
            }
        }
    }

    fn is_in_flight(&self, temp_id: Uuid) -> bool {
        self.in_flight
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(&temp_id)
    }

    /// Confirmed entry for a temporary id, if the server already stored it
    async fn stored_copy(&self, conversation_id: Uuid, temp_id: Uuid) -> Option<ChatMessage> {
        self.store
            .read(|s| {
                s.entries(conversation_id)
                    .iter()
                    .find(|e| e.message.is_persisted() && e.message.client_temp_id == Some(temp_id))
                    .map(|e| e.message.clone())
            })
            .await
    }

    /// Replay the offline queue in enqueue order
    pub async fn flush_offline_queue(&self) -> FlushReport {
        self.queue.flush(self).await
    }

    /// Record a connectivity change; flushes the queue when it comes back
    pub async fn set_network_status(&self, status: NetworkStatus) -> Option<FlushReport> {
        let previous = self.network.get_status();
        self.network.set_status(status);
        if !previous.can_send() && status.can_send() {
            tracing::info!("[NET] Back online, flushing offline queue");
            Some(self.flush_offline_queue().await)
        } else {
            None
        }
    }

    /// Flush the queue at start, whenever the monitor changes to a status
    /// that can send, and every `queue_retry_interval` so sends that failed
    /// while the stream stayed up are picked up too.
    ///
    /// The watch channel may coalesce an offline/online pair into a single
    /// wake-up, so any change counts as a reconnect.
    pub fn spawn_reconnect_flush(self: &Arc<Self>) -> JoinHandle<()> {
        let client = Arc::clone(self);
        let mut status = client.network.subscribe();
        // Seen before spawning: a change made before the task's first poll
        // must still wake it
        status.borrow_and_update();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(client.queue_retry_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    changed = status.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        status.borrow_and_update();
                    }
                    _ = ticker.tick() => {}
                }
                client.flush_if_sendable().await;
            }
        })
    }

    async fn flush_if_sendable(&self) {
        if self.network.get_status().can_send() && !self.queue.is_empty().await {
            let report = self.flush_offline_queue().await;
            tracing::debug!("[NET] Queue flush: {:?}", report);
        }
    }

    /// Apply events from the real-time stream until it closes
    pub fn spawn_event_pump(self: &Arc<Self>, mut events: mpsc::Receiver<RealtimeEvent>) -> JoinHandle<()> {
        let client = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                if let Err(e) = client.handle_event(event).await {
                    tracing::warn!("[STREAM] Event not applied: {}", e);
                }
            }
        })
    }

    /// Merge one real-time event
    pub async fn handle_event(&self, event: RealtimeEvent) -> Result<Applied, ClientError> {
        if let RealtimeEvent::Typing {
            conversation_id,
            user_id,
            is_typing,
        } = event
        {
            let changed = self
                .typing
                .lock()
                .await
                .apply(conversation_id, user_id, is_typing, Instant::now());
            return Ok(if changed {
                Applied {
                    outcome: None,
                    events: vec![StoreEvent::MessagesChanged { conversation_id }],
                }
            } else {
                Applied::default()
            });
        }

        if let RealtimeEvent::NewMessage { message } = &event {
            self.typing
                .lock()
                .await
                .clear_user(message.conversation_id, message.sender_id);
        }

        let applied = self.store.dispatch(Action::Remote(event)).await?;
        if let Some(temp_id) = applied.outcome.as_ref().and_then(|o| o.retired_temp_id()) {
            // Confirmation beat the flush
            self.queue.remove(temp_id).await;
        }
        Ok(applied)
    }

    /// Decode and merge one line of the real-time stream
    pub async fn handle_stream_line(&self, line: &str) -> Option<Applied> {
        let event = realtime::decode_line(line)?;
        match self.handle_event(event).await {
            Ok(applied) => Some(applied),
            Err(e) => {
                tracing::warn!("[STREAM] Event not applied: {}", e);
                None
            }
        }
    }

    /// Load a conversation into the pane and mark it read
    pub async fn open_conversation(&self, conversation_id: Uuid) -> Result<(), ClientError> {
        self.store.dispatch(Action::OpenRequested(conversation_id)).await?;

        match self.api.load_conversation(conversation_id).await {
            Ok(detail) => {
                tracing::info!(
                    "[LOAD] Conversation {} loaded with {} message(s)",
                    conversation_id,
                    detail.messages.len()
                );
                self.store.dispatch(Action::ConversationLoaded(detail)).await?;
                if let Err(e) = self.mark_conversation_read(conversation_id).await {
                    tracing::warn!("[LOAD] Could not mark {} read: {}", conversation_id, e);
                }
                Ok(())
            }
            Err(error @ ClientError::Access { .. }) => {
                tracing::warn!("[LOAD] Access denied to conversation {}", conversation_id);
                self.store
                    .dispatch(Action::ConversationForbidden(conversation_id))
                    .await?;
                self.store
                    .notify(Notice::warning(error.user_message(), Some(conversation_id)));
                Err(error)
            }
            Err(error) => {
                tracing::error!("[LOAD] Conversation {} failed to load: {}", conversation_id, error);
                self.store
                    .dispatch(Action::ConversationLoadFailed {
                        conversation_id,
                        message: error.to_string(),
                    })
                    .await?;
                Err(error)
            }
        }
    }

    pub async fn close_conversation(&self) -> Result<(), ClientError> {
        self.store.dispatch(Action::CloseConversation).await.map(|_| ())
    }

    pub async fn mark_conversation_read(&self, conversation_id: Uuid) -> Result<DateTime<Utc>, ClientError> {
        let at = self.api.mark_read(conversation_id).await?;
        self.store
            .dispatch(Action::ReadMarked { conversation_id, at })
            .await?;
        Ok(at)
    }

    /// Soft-delete stored messages
    pub async fn delete_messages(&self, conversation_id: Uuid, message_ids: &[Uuid]) -> Result<(), ClientError> {
        if message_ids.is_empty() {
            return Ok(());
        }
        if let Err(error) = self.api.delete_messages(conversation_id, message_ids).await {
            self.store
                .notify(Notice::error(error.user_message(), Some(conversation_id)));
            return Err(error);
        }
        self.store
            .dispatch(Action::MessagesDeleted {
                conversation_id,
                ids: message_ids.to_vec(),
            })
            .await?;
        Ok(())
    }

    /// Replace a stored message's content
    pub async fn edit_message(
        &self,
        conversation_id: Uuid,
        message_id: Uuid,
        text: &str,
    ) -> Result<ChatMessage, ClientError> {
        let content = self.factory.validate(text)?;
        let message = match self.api.edit_message(conversation_id, message_id, &content).await {
            Ok(message) => message,
            Err(error) => {
                self.store
                    .notify(Notice::error(error.user_message(), Some(conversation_id)));
                return Err(error);
            }
        };
        self.store
            .dispatch(Action::MessageEdited(message.clone()))
            .await?;
        Ok(message)
    }

    pub async fn search_profiles(&self, query: &str) -> Result<SearchOutcome, ClientError> {
        self.search.search(query).await
    }

    /// Other users typing in a conversation right now
    pub async fn typing_users(&self, conversation_id: Uuid) -> Vec<Uuid> {
        let mut typing = self.typing.lock().await;
        let now = Instant::now();
        typing.prune(now);
        typing.typing_users(conversation_id, now)
    }
}

#[async_trait]
impl QueueSender for MessagingClient {
    async fn resend(&self, entry: &PendingSend) -> FlushDecision {
        if !self.network.is_online() {
            return FlushDecision::Keep;
        }

        if self.is_in_flight(entry.temp_id) {
            return FlushDecision::Keep;
        }
        if self.stored_copy(entry.conversation_id, entry.temp_id).await.is_some() {
            tracing::debug!("[QUEUE] temp:{} already confirmed, skipping", entry.temp_id);
            return FlushDecision::Sent;
        }

        // Show the entry as pending again while it is in flight
        match self.store.entry(entry.conversation_id, entry.temp_id).await {
            Some(visible) if visible.delivery.is_failed() => {
                let retried = self
                    .store
                    .dispatch(Action::Retry {
                        conversation_id: entry.conversation_id,
                        temp_id: entry.temp_id,
                    })
                    .await;
                if let Err(e) = retried {
                    tracing::debug!("[QUEUE] temp:{} not reset to pending: {}", entry.temp_id, e);
                }
            }
            Some(_) => {}
            None => {
                let message = self.factory.restore(entry, self.user_id);
                if let Err(e) = self.store.dispatch(Action::AddOptimistic(message)).await {
                    tracing::debug!("[QUEUE] temp:{} not restored: {}", entry.temp_id, e);
                }
            }
        }

        match self
            .deliver(entry.conversation_id, entry.temp_id, entry.content.clone())
            .await
        {
            Delivery::Confirmed(_) => FlushDecision::Sent,
            Delivery::Failed(error) if error.is_retryable() => FlushDecision::Keep,
            Delivery::Failed(_) => FlushDecision::Drop,
            Delivery::Queued | Delivery::InFlight => FlushDecision::Keep,
        }
    }
}
