//! Common test utilities and helpers
//!
//! - Scripted `MessagingApi` for driving `MessagingClient` without a server
//! - JSON fixtures in the backend's wire format
//! - Client construction helpers


pub use fixtures::*;
pub use scripted_api::*;
