//! Messaging Client Module
//!
//! Client side of direct messaging: optimistic sends, delivery and read
//! receipts, the offline queue and the real-time stream.
//!
//! # Architecture
//!
//! - **`config`** - Server URL, limits and bearer token
//! - **`error`** - `ClientError` and its failure classes
//! - **`logging`** - `tracing` subscriber setup for binaries
//! - **`offline`** - Optimistic messages, delivery state machine, merge, queue
//! - **`local_db`** - SQLite storage backing the offline queue
//! - **`sync`** - Connectivity monitor
//! - **`messaging`** - Store, HTTP API, real-time stream and `MessagingClient`
//!
//! # Example
//!
//! ```rust,no_run
//! use orangecat_chat::client::messaging::{HttpMessagingApi, MessagingClient};
//! use orangecat_chat::client::offline::MemoryQueueStore;
//! use orangecat_chat::client::sync::NetworkMonitor;
//! use orangecat_chat::client::Config;
//! use std::sync::Arc;
//! use uuid::Uuid;
//!
//! # async fn example() -> Result<(), orangecat_chat::client::ClientError> {
//! let config = Config::new();
//! let client = MessagingClient::new(
//!     Uuid::new_v4(),
//!     config.app(),
//!     Arc::new(HttpMessagingApi::new(config.clone())),
//!     Arc::new(MemoryQueueStore::new()),
//!     NetworkMonitor::default(),
//! );
//! let outcome = client.send_message(Uuid::new_v4(), "Hello!").await?;
//! println!("{:?}", outcome.delivery);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod local_db;
pub mod logging;
pub mod messaging;
pub mod offline;
pub mod sync;

pub use config::Config;
pub use error::ClientError;
pub use messaging::MessagingClient;
