//! # Connectivity
//!
//! Connectivity tracking used to decide between sending immediately and
//! queueing, and to trigger an offline-queue flush on reconnect.

pub mod network_monitor;

pub use network_monitor::{NetworkMonitor, NetworkStatus};
