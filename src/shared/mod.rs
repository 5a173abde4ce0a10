//! Shared Module
//!
//! Types shared by every part of the client: the message and conversation
//! model, the real-time event envelope, configuration and the errors raised
//! while decoding backend payloads.
//!
//! # Overview
//!
//! Nothing in here performs I/O. Backend payloads arrive as `Wire*` structs
//! and are validated into domain types at this boundary.

/// Real-time event system
pub mod event;

/// Shared error types
pub mod error;

/// Application configuration
pub mod config;

/// Messaging types: messages, conversations, profiles
pub mod messaging;

pub use config::{AppConfig, AppConfigBuilder, ConfigError};
pub use error::SharedError;
pub use event::{RealtimeEvent, WireEvent};
