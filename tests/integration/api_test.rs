//! `HttpMessagingApi` against a wiremock server

use assert_matches::assert_matches;
use chrono::{Duration, Utc};
use pretty_assertions::assert_eq;
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use orangecat_chat::client::messaging::{HttpMessagingApi, MessagingApi};
use orangecat_chat::client::ClientError;
use orangecat_chat::shared::messaging::{MessageId, MessageType, SendMessageRequest};

use crate::common::{config_for, wire_conversation, wire_message};

fn request(conversation_id: Uuid) -> SendMessageRequest {
    SendMessageRequest {
        conversation_id,
        content: "Hello".to_string(),
        message_type: MessageType::Text,
        client_temp_id: Uuid::new_v4(),
    }
}

#[tokio::test]
async fn test_send_message_returns_confirmed_copy() {
    let server = MockServer::start().await;
    let (conversation_id, sender, stored_id) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
    let request = request(conversation_id);

    Mock::given(method("POST"))
        .and(path("/api/messages"))
        .and(header("Authorization", "Bearer test-token"))
        .and(body_partial_json(json!({
            "conversation_id": conversation_id.to_string(),
            "client_temp_id": request.client_temp_id.to_string(),
            "content": "Hello"
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "message": wire_message(stored_id, conversation_id, sender, "Hello", Utc::now())
        })))
        .expect(1)
        .mount(&server)
        .await;

    let api = HttpMessagingApi::new(config_for(&server.uri()));
    let message = api.send_message(&request).await.unwrap();

    assert_eq!(message.id, MessageId::Permanent(stored_id));
    // Marker filled in even though the server did not echo it
    assert_eq!(message.client_temp_id, Some(request.client_temp_id));
}

#[tokio::test]
async fn test_status_classification() {
    let server = MockServer::start().await;
    let api = HttpMessagingApi::new(config_for(&server.uri()));
    let conversation_id = Uuid::new_v4();

    Mock::given(method("POST"))
        .and(path("/api/messages"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    assert_matches!(
        api.send_message(&request(conversation_id)).await,
        Err(ClientError::Network(_))
    );

    Mock::given(method("POST"))
        .and(path("/api/messages"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({ "error": "db down" })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    assert_eq!(
        api.send_message(&request(conversation_id)).await.unwrap_err(),
        ClientError::server(500, "db down")
    );

    Mock::given(method("POST"))
        .and(path("/api/messages"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;
    assert_eq!(
        api.send_message(&request(conversation_id)).await.unwrap_err(),
        ClientError::Access { conversation_id }
    );
}

#[tokio::test]
async fn test_unreachable_server_is_network_error() {
    let api = HttpMessagingApi::new(config_for("http://127.0.0.1:1"));
    let err = api.send_message(&request(Uuid::new_v4())).await.unwrap_err();
    assert!(err.is_retryable(), "expected a network error, got {:?}", err);
}

#[tokio::test]
async fn test_load_conversation_sorts_history() {
    let server = MockServer::start().await;
    let (conversation_id, me, them) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
    let now = Utc::now();
    let (older, newer) = (Uuid::new_v4(), Uuid::new_v4());

    Mock::given(method("GET"))
        .and(path(format!("/api/conversations/{}", conversation_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(wire_conversation(
            conversation_id,
            &[me, them],
            vec![
                wire_message(newer, conversation_id, them, "second", now),
                wire_message(older, conversation_id, me, "first", now - Duration::minutes(1)),
            ],
        )))
        .mount(&server)
        .await;

    let api = HttpMessagingApi::new(config_for(&server.uri()));
    let detail = api.load_conversation(conversation_id).await.unwrap();

    let ids: Vec<_> = detail.messages.iter().map(|m| m.id).collect();
    assert_eq!(ids, vec![MessageId::Permanent(older), MessageId::Permanent(newer)]);
    assert_eq!(detail.conversation.participants.len(), 2);
    assert!(!detail.conversation.is_group);
    assert_eq!(detail.conversation.last_message_preview, "second");
}

#[tokio::test]
async fn test_malformed_payload_is_rejected_at_boundary() {
    let server = MockServer::start().await;
    let conversation_id = Uuid::new_v4();
    Mock::given(method("GET"))
        .and(path(format!("/api/conversations/{}", conversation_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "not-a-uuid",
            "created_at": Utc::now().to_rfc3339()
        })))
        .mount(&server)
        .await;

    let api = HttpMessagingApi::new(config_for(&server.uri()));
    assert_matches!(
        api.load_conversation(conversation_id).await,
        Err(ClientError::Decode(_))
    );
}

#[tokio::test]
async fn test_mark_read_returns_timestamp() {
    let server = MockServer::start().await;
    let conversation_id = Uuid::new_v4();
    let at = Utc::now();
    Mock::given(method("POST"))
        .and(path(format!("/api/conversations/{}/read", conversation_id)))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "last_read_at": at.to_rfc3339() })),
        )
        .mount(&server)
        .await;

    let api = HttpMessagingApi::new(config_for(&server.uri()));
    let returned = api.mark_read(conversation_id).await.unwrap();
    assert_eq!(returned.timestamp_micros(), at.timestamp_micros());
}

#[tokio::test]
async fn test_edit_and_bulk_delete() {
    let server = MockServer::start().await;
    let (conversation_id, message_id, me) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

    let mut edited = wire_message(message_id, conversation_id, me, "fixed typo", Utc::now());
    edited["edited_at"] = json!(Utc::now().to_rfc3339());
    Mock::given(method("PATCH"))
        .and(path(format!("/api/conversations/{}/messages/{}", conversation_id, message_id)))
        .and(body_partial_json(json!({ "content": "fixed typo" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "message": edited })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("/api/conversations/{}/messages/delete", conversation_id)))
        .and(body_partial_json(json!({ "message_ids": [message_id.to_string()] })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let api = HttpMessagingApi::new(config_for(&server.uri()));
    let message = api
        .edit_message(conversation_id, message_id, "fixed typo")
        .await
        .unwrap();
    assert_eq!(message.content, "fixed typo");
    assert!(message.edited_at.is_some());

    api.delete_messages(conversation_id, &[message_id]).await.unwrap();
}

#[tokio::test]
async fn test_search_profiles_sends_query() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/profiles/search"))
        .and(query_param("q", "ali"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "profiles": [{
                "id": Uuid::new_v4().to_string(),
                "username": "alice",
                "display_name": "Alice",
                "avatar_url": null
            }]
        })))
        .mount(&server)
        .await;

    let api = HttpMessagingApi::new(config_for(&server.uri()));
    let profiles = api.search_profiles("ali").await.unwrap();
    assert_eq!(profiles.len(), 1);
    assert_eq!(profiles[0].display_name_or_username(), "Alice");
}
