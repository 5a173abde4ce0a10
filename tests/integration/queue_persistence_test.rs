//! Offline queue stored in SQLite across restarts

use pretty_assertions::assert_eq;
use std::sync::Arc;
use uuid::Uuid;

use orangecat_chat::client::local_db::LocalDatabase;
use orangecat_chat::client::offline::{DeliveryStatus, PendingSend, QueueStore};
use orangecat_chat::client::sync::NetworkStatus;
use orangecat_chat::shared::messaging::MessageId;

use crate::common::{client_with_store, ScriptedApi};

#[tokio::test]
async fn test_queued_sends_survive_restart() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("queue.db");
    let me = Uuid::new_v4();
    let conversation_id = Uuid::new_v4();

    let temp_ids = {
        let db = LocalDatabase::open(&db_path).await.unwrap();
        let client = client_with_store(Arc::new(ScriptedApi::new(me)), me, Arc::new(db.clone()));
        client.network().set_status(NetworkStatus::Offline);
        let first = client.send_message(conversation_id, "first").await.unwrap();
        let second = client.send_message(conversation_id, "second").await.unwrap();
        assert_eq!(db.count_queued().await.unwrap(), 2);
        db.pool().close().await;
        vec![first.temp_id, second.temp_id]
    };

    let db = LocalDatabase::open(&db_path).await.unwrap();
    let api = Arc::new(ScriptedApi::new(me));
    let client = client_with_store(api.clone(), me, Arc::new(db.clone()));

    assert_eq!(client.restore_pending().await, 2);
    let views = client.messages(conversation_id).await;
    let restored: Vec<_> = views.iter().map(|v| v.message.id).collect();
    assert_eq!(
        restored,
        temp_ids.iter().map(|id| MessageId::Temporary(*id)).collect::<Vec<_>>()
    );
    assert!(views.iter().all(|v| v.status == DeliveryStatus::Pending));

    let report = client.flush_offline_queue().await;
    assert_eq!(report.sent, 2);
    assert_eq!(db.count_queued().await.unwrap(), 0);

    let sent: Vec<_> = api.requests().into_iter().map(|r| r.client_temp_id).collect();
    assert_eq!(sent, temp_ids);
    assert!(client
        .messages(conversation_id)
        .await
        .iter()
        .all(|v| v.status == DeliveryStatus::Sent));
}

#[tokio::test]
async fn test_reenqueue_keeps_original_position() {
    let db = LocalDatabase::open_in_memory().await.unwrap();
    let conversation_id = Uuid::new_v4();
    let first = PendingSend::new(Uuid::new_v4(), conversation_id, "1".into());
    let second = PendingSend::new(Uuid::new_v4(), conversation_id, "2".into());

    assert!(db.insert(&first).await.unwrap());
    assert!(db.insert(&second).await.unwrap());
    assert!(!db.insert(&first).await.unwrap());

    let order: Vec<_> = db.load().await.unwrap().into_iter().map(|e| e.content).collect();
    assert_eq!(order, vec!["1", "2"]);
}
