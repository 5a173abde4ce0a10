//! Real-time stream subscription against a wiremock server

use chrono::Utc;
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use uuid::Uuid;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use orangecat_chat::client::messaging::realtime::Backoff;
use orangecat_chat::client::messaging::{RealtimeSubscription, StreamStatus};
use orangecat_chat::client::offline::DeliveryStatus;
use orangecat_chat::client::sync::{NetworkMonitor, NetworkStatus};
use orangecat_chat::shared::RealtimeEvent;

use crate::common::{client_with, config_for, event_line, eventually, wire_message, ScriptedApi};

#[tokio::test]
async fn test_stream_events_are_decoded_in_order() {
    let server = MockServer::start().await;
    let (conversation_id, sender) = (Uuid::new_v4(), Uuid::new_v4());
    let body = [
        event_line(
            "new_message",
            wire_message(Uuid::new_v4(), conversation_id, sender, "one", Utc::now()),
        ),
        ": keep-alive".to_string(),
        "{broken".to_string(),
        event_line(
            "typing",
            serde_json::json!({
                "conversation_id": conversation_id.to_string(),
                "user_id": sender.to_string(),
                "is_typing": true
            }),
        ),
    ]
    .join("\n")
        + "\n";

    Mock::given(method("GET"))
        .and(path("/api/messages/stream"))
        .and(query_param("conversation_id", conversation_id.to_string()))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(&server)
        .await;

    let network = NetworkMonitor::new(NetworkStatus::Offline);
    let (tx, mut rx) = mpsc::channel(16);
    let (handle, mut status) = RealtimeSubscription::new(config_for(&server.uri()), network.clone())
        .spawn(Some(conversation_id), tx);

    let mut kinds = Vec::new();
    while let Some(event) = rx.recv().await {
        kinds.push(event.kind());
    }
    handle.await.unwrap();

    assert_eq!(kinds, vec!["new_message", "typing"]);
    assert_eq!(network.get_status(), NetworkStatus::Online);
    assert_eq!(*status.borrow_and_update(), StreamStatus::Disconnected);
}

#[tokio::test]
async fn test_rejected_subscription_marks_limited_and_retries() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/messages/stream"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let network = NetworkMonitor::new(NetworkStatus::Online);
    let (tx, _rx) = mpsc::channel::<RealtimeEvent>(4);
    let (handle, _status) = RealtimeSubscription::new(config_for(&server.uri()), network.clone())
        .with_backoff(Backoff::new(Duration::from_millis(10), Duration::from_millis(40)))
        .spawn(None, tx);

    let server_ref = &server;
    let reached = eventually(move || async move {
        server_ref
            .received_requests()
            .await
            .map(|requests| requests.len() >= 3)
            .unwrap_or(false)
    })
    .await;
    handle.abort();

    assert!(reached, "subscription did not retry");
    assert_eq!(network.get_status(), NetworkStatus::Limited);
}

#[tokio::test]
async fn test_stream_feeds_client_store() {
    let server = MockServer::start().await;
    let me = Uuid::new_v4();
    let (conversation_id, sender) = (Uuid::new_v4(), Uuid::new_v4());
    let line = event_line(
        "new_message",
        wire_message(Uuid::new_v4(), conversation_id, sender, "pushed", Utc::now()),
    );
    Mock::given(method("GET"))
        .and(path("/api/messages/stream"))
        .respond_with(ResponseTemplate::new(200).set_body_string(format!("{}\n{}\n", line, line)))
        .mount(&server)
        .await;

    let client = client_with(Arc::new(ScriptedApi::new(me)), me);
    let (tx, rx) = mpsc::channel(16);
    let (stream, _status) =
        RealtimeSubscription::new(config_for(&server.uri()), client.network().clone()).spawn(None, tx);
    let pump = client.spawn_event_pump(rx);
    stream.await.unwrap();
    pump.await.unwrap();

    let views = client.messages(conversation_id).await;
    assert_eq!(views.len(), 1);
    assert_eq!(views[0].message.content, "pushed");
    assert_eq!(views[0].status, DeliveryStatus::Sent);
}
