//! Messaging Module
//!
//! Data structures for direct messaging:
//!
//! - `ChatMessage` / `MessageId` - a message, temporary or persisted
//! - `Conversation` / `Participant` - a conversation and its read receipts
//! - `ProfileSummary` - a user found through profile search
//!
//! Every `Wire*` type is the raw backend shape; convert it with `TryFrom`
//! before it reaches the client store.

pub mod conversation;
pub mod message;
pub mod profile;

pub use conversation::{
    Conversation, ConversationDetail, Participant, WireConversation, WireParticipant,
};
pub use message::{ChatMessage, MessageId, MessageType, SendMessageRequest, WireMessage};
pub use profile::{ProfileSummary, SearchProfilesResponse};
