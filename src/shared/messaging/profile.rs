//! Profile Summary
//!
//! A user profile as returned by the profile search endpoint, used when
//! starting a new conversation.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Represents a searchable user profile
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProfileSummary {
    /// Profile owner's user ID
    pub id: Uuid,
    /// Unique handle
    pub username: String,
    /// Optional display name
    pub display_name: Option<String>,
    /// Optional avatar URL
    pub avatar_url: Option<String>,
}

impl ProfileSummary {
    /// Get display name or fallback to username
    pub fn display_name_or_username(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.username)
    }

    /// Get avatar initial (first letter of username)
    pub fn avatar_initial(&self) -> char {
        self.username.chars().next().unwrap_or('?').to_ascii_uppercase()
    }
}

/// Response type for profile search
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchProfilesResponse {
    pub profiles: Vec<ProfileSummary>,
}
