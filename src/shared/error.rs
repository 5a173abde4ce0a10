//! Decode Errors
//!
//! Everything the backend sends (HTTP bodies and stream lines) is decoded
//! into domain values before it reaches the message store. A payload that
//! fails that step is rejected with a [`SharedError`] naming the offending
//! field, so the caller can log it and drop it.
//!
//! # Usage
//!
//! ```rust
//! use orangecat_chat::shared::error::SharedError;
//!
//! let error = SharedError::missing("sender_id");
//! assert_eq!(error.field(), Some("sender_id"));
//! ```
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SharedError {
    /// Body is not JSON, or not the expected JSON shape
    #[error("Malformed JSON: {0}")]
    Json(String),

    #[error("Missing field '{field}'")]
    MissingField { field: String },

    /// Field present but unparseable or out of range
    #[error("Invalid field '{field}': {reason}")]
    InvalidField { field: String, reason: String },

    /// Stream event with a discriminator this client does not handle
    #[error("Unknown event type '{0}'")]
    UnknownEvent(String),
}

impl SharedError {
    pub fn missing(field: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
        }
    }

    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Field the error refers to, if any
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::MissingField { field } | Self::InvalidField { field, .. } => Some(field),
            Self::Json(_) | Self::UnknownEvent(_) => None,
        }
    }
}

impl From<serde_json::Error> for SharedError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}
