//! End-to-end delivery scenarios through `MessagingClient`

use assert_matches::assert_matches;
use chrono::Duration;
use pretty_assertions::assert_eq;
use std::sync::Arc;
use uuid::Uuid;

use orangecat_chat::client::messaging::{Delivery, PaneState};
use orangecat_chat::client::offline::DeliveryStatus;
use orangecat_chat::client::sync::NetworkStatus;
use orangecat_chat::client::ClientError;
use orangecat_chat::shared::messaging::{ChatMessage, Conversation, MessageId};
use orangecat_chat::shared::RealtimeEvent;

use crate::common::{client_with, eventually, ScriptedApi, SendScript};

fn direct(me: Uuid) -> (Conversation, Uuid) {
    let them = Uuid::new_v4();
    (Conversation::new_direct(me, them), them)
}

#[tokio::test]
async fn test_offline_send_flushes_on_reconnect() {
    let me = Uuid::new_v4();
    let (conversation, _) = direct(me);
    let api = Arc::new(ScriptedApi::new(me).with_conversation(conversation.clone()));
    let client = client_with(api.clone(), me);
    client.open_conversation(conversation.id).await.unwrap();
    client.spawn_reconnect_flush();

    client.network().set_status(NetworkStatus::Offline);
    let outcome = client.send_message(conversation.id, "sent from the tunnel").await.unwrap();
    assert_eq!(outcome.delivery, Delivery::Queued);

    let views = client.messages(conversation.id).await;
    assert_eq!(views.len(), 1);
    assert_eq!(views[0].status, DeliveryStatus::Pending);
    assert!(client.queue().contains(outcome.temp_id).await);

    client.network().set_status(NetworkStatus::Online);
    assert!(
        eventually(|| {
            let client = Arc::clone(&client);
            async move { client.queue().is_empty().await }
        })
        .await
    );

    let views = client.messages(conversation.id).await;
    assert_eq!(views.len(), 1);
    assert!(views[0].status.is_stored());
    assert!(views[0].message.id.permanent().is_some());
    assert_eq!(api.requests().len(), 1);
}

#[tokio::test]
async fn test_read_receipt_before_and_after_send() {
    let me = Uuid::new_v4();
    let (conversation, them) = direct(me);
    let api = Arc::new(ScriptedApi::new(me).with_conversation(conversation.clone()));
    let client = client_with(api, me);
    client.open_conversation(conversation.id).await.unwrap();

    let confirmed = match client
        .send_message(conversation.id, "did you see this?")
        .await
        .unwrap()
        .delivery
    {
        Delivery::Confirmed(message) => message,
        other => panic!("expected confirmation, got {:?}", other),
    };

    let receipt = |offset: Duration| RealtimeEvent::ReadReceiptUpdate {
        conversation_id: conversation.id,
        user_id: them,
        last_read_at: confirmed.created_at + offset,
    };

    client.handle_event(receipt(Duration::seconds(-30))).await.unwrap();
    assert_eq!(client.messages(conversation.id).await[0].status, DeliveryStatus::Delivered);

    client.handle_event(receipt(Duration::seconds(2))).await.unwrap();
    assert_eq!(client.messages(conversation.id).await[0].status, DeliveryStatus::Read);

    // A stale receipt arriving late does not move the mark back
    client.handle_event(receipt(Duration::seconds(-30))).await.unwrap();
    assert_eq!(client.messages(conversation.id).await[0].status, DeliveryStatus::Read);
}

#[tokio::test]
async fn test_failure_retry_success() {
    let me = Uuid::new_v4();
    let conversation_id = Uuid::new_v4();
    let api = Arc::new(ScriptedApi::new(me));
    api.script(SendScript::Fail(ClientError::network("connection reset")));
    api.script(SendScript::Delay(std::time::Duration::from_millis(300)));
    let client = client_with(api.clone(), me);

    let outcome = client.send_message(conversation_id, "second time lucky").await.unwrap();
    assert_matches!(outcome.delivery, Delivery::Failed(ClientError::Network(_)));
    let views = client.messages(conversation_id).await;
    assert_eq!(views[0].status, DeliveryStatus::Failed);
    assert!(views[0].can_retry());

    let retry = {
        let client = Arc::clone(&client);
        tokio::spawn(async move { client.retry_message(conversation_id, outcome.temp_id).await })
    };
    assert!(
        eventually(|| {
            let client = Arc::clone(&client);
            async move { client.messages(conversation_id).await[0].status == DeliveryStatus::Pending }
        })
        .await
    );

    assert_matches!(retry.await.unwrap().unwrap(), Delivery::Confirmed(_));
    let views = client.messages(conversation_id).await;
    assert_eq!(views.len(), 1);
    // Conversation never loaded, so no recipients are known
    assert_eq!(views[0].status, DeliveryStatus::Sent);

    let requests = api.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].client_temp_id, requests[1].client_temp_id);
}

#[tokio::test]
async fn test_submission_order_survives_out_of_order_confirmations() {
    let me = Uuid::new_v4();
    let (conversation, _) = direct(me);
    let api = Arc::new(ScriptedApi::new(me).with_conversation(conversation.clone()));
    let client = client_with(api, me);
    client.open_conversation(conversation.id).await.unwrap();
    client.network().set_status(NetworkStatus::Offline);

    let mut temp_ids = Vec::new();
    for text in ["a", "b", "c"] {
        temp_ids.push(client.send_message(conversation.id, text).await.unwrap().temp_id);
    }

    // Confirm the last one first over the real-time channel
    let mut stored = ChatMessage::new_optimistic(conversation.id, me, "c".into());
    stored.id = MessageId::Permanent(Uuid::new_v4());
    client
        .handle_event(RealtimeEvent::MessageConfirmed {
            temp_id: temp_ids[2],
            message: stored,
        })
        .await
        .unwrap();

    let contents: Vec<_> = client
        .messages(conversation.id)
        .await
        .into_iter()
        .map(|v| (v.message.content, v.status))
        .collect();
    assert_eq!(
        contents,
        vec![
            ("a".to_string(), DeliveryStatus::Pending),
            ("b".to_string(), DeliveryStatus::Pending),
            ("c".to_string(), DeliveryStatus::Delivered),
        ]
    );
    assert!(!client.queue().contains(temp_ids[2]).await);
}

#[tokio::test]
async fn test_duplicate_new_message_is_merged_once() {
    let me = Uuid::new_v4();
    let (conversation, them) = direct(me);
    let api = Arc::new(ScriptedApi::new(me).with_conversation(conversation.clone()));
    let client = client_with(api, me);
    client.open_conversation(conversation.id).await.unwrap();

    let mut incoming = ChatMessage::new_optimistic(conversation.id, them, "hi".into());
    incoming.id = MessageId::Permanent(Uuid::new_v4());
    incoming.client_temp_id = None;
    for _ in 0..3 {
        client
            .handle_event(RealtimeEvent::NewMessage { message: incoming.clone() })
            .await
            .unwrap();
    }

    let views = client.messages(conversation.id).await;
    assert_eq!(views.len(), 1);
    assert!(!views[0].is_own);
    assert_eq!(client.summaries().await[0].unread_count, 1);
}

#[tokio::test]
async fn test_access_denied_returns_to_list_and_keeps_other_views() {
    let me = Uuid::new_v4();
    let (conversation, _) = direct(me);
    let api = Arc::new(ScriptedApi::new(me).with_conversation(conversation.clone()));
    let client = client_with(api, me);
    client.open_conversation(conversation.id).await.unwrap();
    client.send_message(conversation.id, "kept").await.unwrap();

    let err = client.open_conversation(Uuid::new_v4()).await.unwrap_err();
    assert_matches!(err, ClientError::Access { .. });
    assert_eq!(client.pane().await, PaneState::List);
    assert_eq!(client.messages(conversation.id).await.len(), 1);
}

#[tokio::test]
async fn test_retry_and_flush_of_same_message_post_once() {
    let me = Uuid::new_v4();
    let (conversation, _) = direct(me);
    let api = Arc::new(ScriptedApi::new(me).with_conversation(conversation.clone()));
    api.script(SendScript::Fail(ClientError::network("connection reset")));
    api.script(SendScript::Delay(std::time::Duration::from_millis(100)));
    let client = client_with(api.clone(), me);
    client.open_conversation(conversation.id).await.unwrap();

    let outcome = client.send_message(conversation.id, "hello").await.unwrap();
    assert!(client.queue().contains(outcome.temp_id).await);

    let (retried, report) = tokio::join!(
        client.retry_message(conversation.id, outcome.temp_id),
        client.flush_offline_queue(),
    );
    assert_matches!(retried, Ok(Delivery::Confirmed(_)));
    assert_eq!(report.sent, 0);

    let views = client.messages(conversation.id).await;
    assert_eq!(views.len(), 1);
    assert!(views[0].message.id.permanent().is_some());
    assert_eq!(api.requests().len(), 2);
    assert!(client.queue().is_empty().await);
}

#[tokio::test]
async fn test_second_confirmation_under_new_id_is_ignored() {
    let me = Uuid::new_v4();
    let (conversation, _) = direct(me);
    let api = Arc::new(ScriptedApi::new(me).with_conversation(conversation.clone()));
    let client = client_with(api, me);
    client.open_conversation(conversation.id).await.unwrap();

    let outcome = client.send_message(conversation.id, "only once").await.unwrap();
    let confirmed = match outcome.delivery {
        Delivery::Confirmed(message) => message,
        other => panic!("expected confirmation, got {:?}", other),
    };

    // The server stored a second copy and announces it for the same temp id
    let mut twin = confirmed.clone();
    twin.id = MessageId::Permanent(Uuid::new_v4());
    let applied = client
        .handle_event(RealtimeEvent::MessageConfirmed {
            temp_id: outcome.temp_id,
            message: twin,
        })
        .await
        .unwrap();
    assert!(applied.events.is_empty());

    let views = client.messages(conversation.id).await;
    assert_eq!(views.len(), 1);
    assert_eq!(views[0].message.id, confirmed.id);
}
