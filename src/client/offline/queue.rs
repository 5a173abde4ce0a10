//! # Offline Queue
//!
//! Durable buffer of sends that could not reach the server. Entries are keyed
//! by the message's temporary id and replayed in enqueue order when
//! connectivity returns.
//!
//! ## Features
//!
//! - **Persistent Queue**: entries survive restarts through a [`QueueStore`]
//! - **Ordered Flush**: entries are attempted in original enqueue order
//! - **Remove on Success**: an entry leaves the queue only once it is sent
//!   (or the server rejected it outright)
//! - **Silent Failures**: storage and send errors are logged, never raised;
//!   callers observe them through the message's `failed` status
//!
//! ## Usage
//!
//! ```rust,no_run
//! use orangecat_chat::client::offline::queue::{MemoryQueueStore, OfflineQueue, PendingSend};
//! use std::sync::Arc;
//! use uuid::Uuid;
//!
//! # async fn example(sender: impl orangecat_chat::client::offline::queue::QueueSender) {
//! let queue = OfflineQueue::new(Arc::new(MemoryQueueStore::new()));
//! queue.enqueue(PendingSend::new(Uuid::new_v4(), Uuid::new_v4(), "Hello offline!".into())).await;
//!
//! // Later, on reconnect
//! let report = queue.flush(&sender).await;
//! println!("sent {} of {}", report.sent, report.attempted);
//! # }
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::client::error::ClientError;

/// A send waiting for connectivity
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PendingSend {
    /// Temporary id of the optimistic message; also the queue key
    pub temp_id: Uuid,
    /// Conversation ID
    pub conversation_id: Uuid,
    /// Message content
    pub content: String,
    /// When the send was first queued
    pub enqueued_at: DateTime<Utc>,
}

impl PendingSend {
    pub fn new(temp_id: Uuid, conversation_id: Uuid, content: String) -> Self {
        Self {
            temp_id,
            conversation_id,
            content,
            enqueued_at: Utc::now(),
        }
    }
}

/// Persistence backend for the offline queue
#[async_trait]
pub trait QueueStore: Send + Sync {
    /// All entries, oldest enqueue first
    async fn load(&self) -> Result<Vec<PendingSend>, ClientError>;

    /// Insert an entry. Returns false if the temporary id is already queued,
    /// in which case the existing entry keeps its position.
    async fn insert(&self, entry: &PendingSend) -> Result<bool, ClientError>;

    /// Remove the entry with this temporary id, if present
    async fn remove(&self, temp_id: Uuid) -> Result<(), ClientError>;
}

/// Volatile store for tests and for clients without a local database
#[derive(Debug, Default)]
pub struct MemoryQueueStore {
    entries: RwLock<Vec<PendingSend>>,
}

impl MemoryQueueStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl QueueStore for MemoryQueueStore {
    async fn load(&self) -> Result<Vec<PendingSend>, ClientError> {
        Ok(self.entries.read().await.clone())
    }

    async fn insert(&self, entry: &PendingSend) -> Result<bool, ClientError> {
        let mut entries = self.entries.write().await;
        if entries.iter().any(|e| e.temp_id == entry.temp_id) {
            return Ok(false);
        }
        entries.push(entry.clone());
        Ok(true)
    }

    async fn remove(&self, temp_id: Uuid) -> Result<(), ClientError> {
        self.entries.write().await.retain(|e| e.temp_id != temp_id);
        Ok(())
    }
}

/// What to do with an entry after a flush attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushDecision {
    /// Server stored the message
    Sent,
    /// Attempt failed transiently; keep it for the next flush
    Keep,
    /// Server rejected it; stop replaying it
    Drop,
}

/// Replays one queued entry against the backend
#[async_trait]
pub trait QueueSender: Send + Sync {
    async fn resend(&self, entry: &PendingSend) -> FlushDecision;
}

/// Outcome of a flush
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlushReport {
    /// Entries attempted
    pub attempted: usize,
    /// Entries sent and removed
    pub sent: usize,
    /// Entries rejected by the server and removed
    pub dropped: usize,
    /// Entries left in the queue
    pub kept: usize,
}

/// Offline send queue
pub struct OfflineQueue {
    store: Arc<dyn QueueStore>,
    /// Serializes flushes so a burst of reconnect signals replays each entry once
    flush_lock: Mutex<()>,
}

impl std::fmt::Debug for OfflineQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OfflineQueue").finish_non_exhaustive()
    }
}

impl OfflineQueue {
    pub fn new(store: Arc<dyn QueueStore>) -> Self {
        Self {
            store,
            flush_lock: Mutex::new(()),
        }
    }

    /// Persist an entry. Returns whether it is now queued.
    pub async fn enqueue(&self, entry: PendingSend) -> bool {
        match self.store.insert(&entry).await {
            Ok(inserted) => {
                if inserted {
                    tracing::info!(
                        "[QUEUE] Queued message temp:{} for conversation {}",
                        entry.temp_id,
                        entry.conversation_id
                    );
                } else {
                    tracing::debug!("[QUEUE] temp:{} already queued", entry.temp_id);
                }
                true
            }
            Err(e) => {
                tracing::error!("[QUEUE] Failed to persist temp:{}: {}", entry.temp_id, e);
                false
            }
        }
    }

    /// Drop an entry, e.g. because a realtime confirmation beat the flush
    pub async fn remove(&self, temp_id: Uuid) {
        if let Err(e) = self.store.remove(temp_id).await {
            tracing::error!("[QUEUE] Failed to remove temp:{}: {}", temp_id, e);
        }
    }

    /// Queued entries in enqueue order
    pub async fn pending(&self) -> Vec<PendingSend> {
        match self.store.load().await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::error!("[QUEUE] Failed to load offline queue: {}", e);
                Vec::new()
            }
        }
    }

    pub async fn contains(&self, temp_id: Uuid) -> bool {
        self.pending().await.iter().any(|e| e.temp_id == temp_id)
    }

    pub async fn len(&self) -> usize {
        self.pending().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Attempt every queued entry in order
    pub async fn flush<S: QueueSender + ?Sized>(&self, sender: &S) -> FlushReport {
        let _guard = self.flush_lock.lock().await;
        let entries = self.pending().await;
        let mut report = FlushReport::default();

        if entries.is_empty() {
            return report;
        }
        tracing::info!("[QUEUE] Flushing {} queued message(s)", entries.len());

        for entry in entries {
            report.attempted += 1;
            match sender.resend(&entry).await {
                FlushDecision::Sent => {
                    self.remove(entry.temp_id).await;
                    report.sent += 1;
                }
                FlushDecision::Drop => {
                    self.remove(entry.temp_id).await;
                    report.dropped += 1;
                }
                FlushDecision::Keep => {
                    report.kept += 1;
                }
            }
        }

        tracing::info!(
            "[QUEUE] Flush finished: sent={} dropped={} kept={}",
            report.sent,
            report.dropped,
            report.kept
        );
        report
    }
}
