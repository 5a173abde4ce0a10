//! Scripted [`MessagingApi`] for unit tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;
use uuid::Uuid;

use crate::client::error::ClientError;
use crate::client::messaging::api::MessagingApi;
use crate::shared::messaging::{
    ChatMessage, ConversationDetail, MessageId, ProfileSummary, SendMessageRequest,
};

#[derive(Default)]
pub struct MockApi {
    pub sender_id: Uuid,
    /// Consumed front to back; an empty script means success
    pub send_script: Mutex<VecDeque<Result<(), ClientError>>>,
    pub send_delay: Mutex<Option<Duration>>,
    pub sent: Mutex<Vec<SendMessageRequest>>,
    pub conversations: Mutex<HashMap<Uuid, Result<ConversationDetail, ClientError>>>,
    pub read_at: Mutex<Option<DateTime<Utc>>>,
    pub deleted: Mutex<Vec<Uuid>>,
    /// query -> (delay, results)
    pub profiles: Mutex<HashMap<String, (Duration, Vec<ProfileSummary>)>>,
}

impl MockApi {
    pub fn new(sender_id: Uuid) -> Self {
        Self {
            sender_id,
            ..Self::default()
        }
    }

    pub fn script_send(&self, result: Result<(), ClientError>) {
        self.send_script.lock().unwrap().push_back(result);
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl MessagingApi for MockApi {
    async fn send_message(&self, request: &SendMessageRequest) -> Result<ChatMessage, ClientError> {
        let delay = *self.send_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.sent.lock().unwrap().push(request.clone());
        let scripted = self.send_script.lock().unwrap().pop_front();
        scripted.unwrap_or(Ok(()))?;

        let mut message =
            ChatMessage::new_optimistic(request.conversation_id, self.sender_id, request.content.clone());
        message.id = MessageId::Permanent(Uuid::new_v4());
        message.client_temp_id = Some(request.client_temp_id);
        Ok(message)
    }

    async fn mark_read(&self, _conversation_id: Uuid) -> Result<DateTime<Utc>, ClientError> {
        let at = Utc::now();
        *self.read_at.lock().unwrap() = Some(at);
        Ok(at)
    }

    async fn load_conversation(&self, conversation_id: Uuid) -> Result<ConversationDetail, ClientError> {
        self.conversations
            .lock()
            .unwrap()
            .get(&conversation_id)
            .cloned()
            .unwrap_or(Err(ClientError::Access { conversation_id }))
    }

    async fn delete_messages(&self, _conversation_id: Uuid, message_ids: &[Uuid]) -> Result<(), ClientError> {
        self.deleted.lock().unwrap().extend_from_slice(message_ids);
        Ok(())
    }

    async fn edit_message(
        &self,
        conversation_id: Uuid,
        message_id: Uuid,
        content: &str,
    ) -> Result<ChatMessage, ClientError> {
        let mut message = ChatMessage::new_optimistic(conversation_id, self.sender_id, content.to_string());
        message.id = MessageId::Permanent(message_id);
        message.client_temp_id = None;
        message.edited_at = Some(Utc::now());
        Ok(message)
    }

    async fn search_profiles(&self, query: &str) -> Result<Vec<ProfileSummary>, ClientError> {
        let entry = self.profiles.lock().unwrap().get(query).cloned();
        let (delay, profiles) = entry.unwrap_or_default();
        tokio::time::sleep(delay).await;
        Ok(profiles)
    }
}

pub fn profile(username: &str) -> ProfileSummary {
    ProfileSummary {
        id: Uuid::new_v4(),
        username: username.to_string(),
        display_name: None,
        avatar_url: None,
    }
}
