//! Orangecat Chat - Messaging Client Library
//!
//! Direct messaging with optimistic delivery: a message appears the moment
//! it is sent, is tracked through pending, sent, delivered, read or failed,
//! survives losing the connection in a durable queue, and is reconciled with
//! what the server pushes over the real-time stream.
//!
//! # Module Structure
//!
//! - **`shared`** - Message, conversation and event types plus configuration.
//!   Backend payloads are validated into these types at the boundary.
//!
//! - **`client`** - Everything that runs on the user's side
//!   - Offline core (optimistic messages, delivery tracking, merge, queue)
//!   - Single-writer message store
//!   - HTTP API client and real-time stream subscription
//!   - SQLite persistence for queued sends
//!
//! # Usage
//!
//! ```rust,no_run
//! use orangecat_chat::client::messaging::{HttpMessagingApi, MessagingClient};
//! use orangecat_chat::client::local_db::LocalDatabase;
//! use orangecat_chat::client::sync::NetworkMonitor;
//! use orangecat_chat::client::Config;
//! use std::sync::Arc;
//! use uuid::Uuid;
//!
//! # async fn example() -> Result<(), orangecat_chat::client::ClientError> {
//! let config = Config::new();
//! let db = LocalDatabase::open(config.queue_db_path()).await?;
//! let client = Arc::new(MessagingClient::new(
//!     Uuid::new_v4(),
//!     config.app(),
//!     Arc::new(HttpMessagingApi::new(config.clone())),
//!     Arc::new(db),
//!     NetworkMonitor::default(),
//! ));
//! client.restore_pending().await;
//! client.spawn_reconnect_flush();
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod shared;
