//! Client Error Types
//!
//! Every fallible client operation returns [`ClientError`]. The variants follow
//! the failure classes the messaging UI distinguishes:
//!
//! - `Validation` - rejected before any network call, never leaves the composer
//! - `Network` - no connectivity, transport failure or timeout; eligible for the offline queue
//! - `Server` - non-2xx response; the message is marked failed and not auto-retried
//! - `Access` - caller is not a participant; the UI returns to the conversation list
//!
//! The remaining variants cover local failures (storage, decoding, illegal
//! state transitions).

use thiserror::Error;
use uuid::Uuid;

use crate::shared::SharedError;

/// Client-side error type
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// Input rejected locally
    #[error("Validation error in field '{field}': {message}")]
    Validation {
        /// The field that failed validation
        field: String,
        /// Human-readable error message
        message: String,
    },

    /// Transport failure, lost connectivity or timeout
    #[error("Network error: {0}")]
    Network(String),

    /// Backend answered with a non-2xx status
    #[error("Server error ({status}): {message}")]
    Server {
        /// HTTP status code
        status: u16,
        /// Message extracted from the response body
        message: String,
    },

    /// Caller is not a participant of the conversation
    #[error("Access denied to conversation {conversation_id}")]
    Access {
        /// Conversation the caller tried to reach
        conversation_id: Uuid,
    },

    /// Backend payload failed validation at the boundary
    #[error("Invalid payload: {0}")]
    Decode(#[from] SharedError),

    /// Local persistence failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// Delivery state machine refused a transition
    #[error("Cannot {action} a message that is {from}")]
    InvalidTransition {
        /// Lifecycle state the message was in
        from: &'static str,
        /// Transition that was attempted
        action: &'static str,
    },

    /// Referenced entity is not in local state
    #[error("Not found: {0}")]
    NotFound(String),
}

impl ClientError {
    /// Create a new validation error
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a new network error
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network(message.into())
    }

    /// Create a new server error
    pub fn server(status: u16, message: impl Into<String>) -> Self {
        Self::Server {
            status,
            message: message.into(),
        }
    }

    /// Whether the failed operation may be replayed from the offline queue
    pub fn is_retryable(&self) -> bool {
        matches!(self, ClientError::Network(_))
    }

    /// Short text for transient notices
    pub fn user_message(&self) -> String {
        match self {
            ClientError::Validation { message, .. } => message.clone(),
            ClientError::Network(_) => "You appear to be offline. The message will be sent when the connection returns.".to_string(),
            ClientError::Server { message, .. } => format!("Failed to send: {}", message),
            ClientError::Access { .. } => "You don't have access to this conversation.".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        ClientError::Decode(SharedError::from(err))
    }
}

impl From<sqlx::Error> for ClientError {
    fn from(err: sqlx::Error) -> Self {
        ClientError::Storage(err.to_string())
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ClientError::Decode(SharedError::Json(err.to_string()))
        } else {
            ClientError::Network(err.to_string())
        }
    }
}
