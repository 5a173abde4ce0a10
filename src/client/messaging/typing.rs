//! Typing indicators. A `typing` event marks a user as typing until they
//! send `is_typing: false` or the expiry elapses without a refresh.

use std::collections::HashMap;
use std::time::{Duration, Instant};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct TypingTracker {
    current_user: Uuid,
    expiry: Duration,
    /// conversation -> user -> last "typing" signal
    active: HashMap<Uuid, HashMap<Uuid, Instant>>,
}

impl TypingTracker {
    pub fn new(current_user: Uuid, expiry: Duration) -> Self {
        Self {
            current_user,
            expiry,
            active: HashMap::new(),
        }
    }

    /// Record a typing event. Returns true when the visible set changed.
    pub fn apply(&mut self, conversation_id: Uuid, user_id: Uuid, is_typing: bool, now: Instant) -> bool {
        if user_id == self.current_user {
            return false;
        }
        if is_typing {
            let users = self.active.entry(conversation_id).or_default();
            users.insert(user_id, now).is_none()
        } else {
            let removed = self
                .active
                .get_mut(&conversation_id)
                .map(|users| users.remove(&user_id).is_some())
                .unwrap_or(false);
            self.active.retain(|_, users| !users.is_empty());
            removed
        }
    }

    /// Users currently typing in a conversation, ordered by id
    pub fn typing_users(&self, conversation_id: Uuid, now: Instant) -> Vec<Uuid> {
        let mut users: Vec<Uuid> = self
            .active
            .get(&conversation_id)
            .map(|users| {
                users
                    .iter()
                    .filter(|(_, seen)| now.saturating_duration_since(**seen) < self.expiry)
                    .map(|(user, _)| *user)
                    .collect()
            })
            .unwrap_or_default();
        users.sort();
        users
    }

    /// A message from the user ends their typing indicator
    pub fn clear_user(&mut self, conversation_id: Uuid, user_id: Uuid) {
        if let Some(users) = self.active.get_mut(&conversation_id) {
            users.remove(&user_id);
        }
    }

    /// Forget expired entries
    pub fn prune(&mut self, now: Instant) {
        let expiry = self.expiry;
        for users in self.active.values_mut() {
            users.retain(|_, seen| now.saturating_duration_since(*seen) < expiry);
        }
        self.active.retain(|_, users| !users.is_empty());
    }
}
