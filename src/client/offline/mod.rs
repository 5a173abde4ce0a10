//! # Offline Messaging System
//!
//! The optimistic delivery core: messages appear the moment the user hits
//! send, move through an explicit delivery state machine, are reconciled with
//! what the server pushes back, and wait in a durable queue while offline.
//!
//! ## Key Components
//!
//! - `optimistic.rs`: builds the locally-visible message before any network call
//! - `delivery.rs`: pending/confirmed/failed lifecycle and derived read status
//! - `reconciliation.rs`: merges real-time events into the message list
//! - `queue.rs`: persisted queue of sends awaiting connectivity
//!
//! None of these types perform network I/O themselves; the messaging client
//! drives them.

pub mod delivery;
pub mod optimistic;
pub mod queue;
pub mod reconciliation;

pub use delivery::{DeliveryStatus, DeliveryTracker, Lifecycle, MessageEntry};
pub use optimistic::OptimisticFactory;
pub use queue::{
    FlushDecision, FlushReport, MemoryQueueStore, OfflineQueue, PendingSend, QueueSender,
    QueueStore,
};
pub use reconciliation::{MergeOutcome, MessageMerger};
