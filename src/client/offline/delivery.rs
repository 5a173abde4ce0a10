//! # Delivery State Tracking
//!
//! Tracks each message through its delivery lifecycle and derives the status
//! shown next to the bubble.
//!
//! ## Lifecycle
//!
//! The stored part of the state is small:
//!
//! ```text
//!            confirm
//!   Pending ─────────▶ Confirmed
//!     │  ▲                ▲
//!  fail  │ retry          │ confirm (server proved it stored the message)
//!     ▼  │                │
//!   Failed ───────────────┘
//! ```
//!
//! `sent`, `delivered` and `read` are not stored. They are derived from the
//! conversation's read receipts every time the status is asked for, so a read
//! receipt never mutates a message.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::client::error::ClientError;
use crate::shared::messaging::{ChatMessage, Conversation};

/// Status shown to the user
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    /// Created locally, request in flight or queued
    Pending,
    /// Stored by the server, no other active participant to deliver to
    Sent,
    /// Stored by the server, at least one recipient has not read it yet
    Delivered,
    /// Every other active participant has read it
    Read,
    /// The send failed; the user can retry
    Failed,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Pending => "pending",
            DeliveryStatus::Sent => "sent",
            DeliveryStatus::Delivered => "delivered",
            DeliveryStatus::Read => "read",
            DeliveryStatus::Failed => "failed",
        }
    }

    /// Sent and delivered both mean the row exists server-side
    pub fn is_stored(&self) -> bool {
        matches!(
            self,
            DeliveryStatus::Sent | DeliveryStatus::Delivered | DeliveryStatus::Read
        )
    }
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stored lifecycle of a message entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum Lifecycle {
    Pending,
    Confirmed,
    Failed { reason: String },
}

impl Lifecycle {
    pub fn name(&self) -> &'static str {
        match self {
            Lifecycle::Pending => "pending",
            Lifecycle::Confirmed => "confirmed",
            Lifecycle::Failed { .. } => "failed",
        }
    }
}

/// Per-message delivery state machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryTracker {
    lifecycle: Lifecycle,
    attempts: u32,
}

impl DeliveryTracker {
    /// Tracker for a freshly created optimistic message
    pub fn pending() -> Self {
        Self {
            lifecycle: Lifecycle::Pending,
            attempts: 1,
        }
    }

    /// Tracker for a message that came from the server
    pub fn confirmed() -> Self {
        Self {
            lifecycle: Lifecycle::Confirmed,
            attempts: 0,
        }
    }

    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    /// Number of send attempts made for this entry
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn is_pending(&self) -> bool {
        self.lifecycle == Lifecycle::Pending
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.lifecycle, Lifecycle::Failed { .. })
    }

    pub fn failure_reason(&self) -> Option<&str> {
        match &self.lifecycle {
            Lifecycle::Failed { reason } => Some(reason),
            _ => None,
        }
    }

    /// Server accepted the write
    pub fn confirm(&mut self) -> Result<(), ClientError> {
        match self.lifecycle {
            Lifecycle::Pending | Lifecycle::Failed { .. } => {
                self.lifecycle = Lifecycle::Confirmed;
                Ok(())
            }
            Lifecycle::Confirmed => Err(self.refuse("confirm")),
        }
    }

    /// Send failed; only a pending message can fail
    pub fn fail(&mut self, reason: impl Into<String>) -> Result<(), ClientError> {
        match self.lifecycle {
            Lifecycle::Pending => {
                self.lifecycle = Lifecycle::Failed {
                    reason: reason.into(),
                };
                Ok(())
            }
            _ => Err(self.refuse("fail")),
        }
    }

    /// User asked to retry; only a failed message can go back to pending
    pub fn retry(&mut self) -> Result<(), ClientError> {
        match self.lifecycle {
            Lifecycle::Failed { .. } => {
                self.lifecycle = Lifecycle::Pending;
                self.attempts += 1;
                Ok(())
            }
            _ => Err(self.refuse("retry")),
        }
    }

    fn refuse(&self, action: &'static str) -> ClientError {
        ClientError::InvalidTransition {
            from: self.lifecycle.name(),
            action,
        }
    }

    /// Status to display for `message`, given the conversation's read receipts
    pub fn status(&self, message: &ChatMessage, conversation: Option<&Conversation>) -> DeliveryStatus {
        match self.lifecycle {
            Lifecycle::Pending => DeliveryStatus::Pending,
            // A failure flag wins over any read receipt
            Lifecycle::Failed { .. } => DeliveryStatus::Failed,
            Lifecycle::Confirmed => receipt_status(message, conversation),
        }
    }
}

/// Derive sent/delivered/read for a stored message
pub fn receipt_status(message: &ChatMessage, conversation: Option<&Conversation>) -> DeliveryStatus {
    let Some(conversation) = conversation else {
        return DeliveryStatus::Sent;
    };

    let mut recipients = conversation
        .other_active_participants(message.sender_id)
        .peekable();
    if recipients.peek().is_none() {
        return DeliveryStatus::Sent;
    }
    if recipients.all(|p| p.has_read(message.created_at)) {
        DeliveryStatus::Read
    } else {
        DeliveryStatus::Delivered
    }
}

/// A message in the visible list together with its delivery state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageEntry {
    pub message: ChatMessage,
    pub delivery: DeliveryTracker,
}

impl MessageEntry {
    pub fn optimistic(message: ChatMessage) -> Self {
        Self {
            message,
            delivery: DeliveryTracker::pending(),
        }
    }

    pub fn confirmed(message: ChatMessage) -> Self {
        Self {
            message,
            delivery: DeliveryTracker::confirmed(),
        }
    }

    pub fn status(&self, conversation: Option<&Conversation>) -> DeliveryStatus {
        self.delivery.status(&self.message, conversation)
    }
}
