/**
 * Orangecat Chat terminal client
 *
 * Opens one conversation, prints its messages as they change and sends
 * every line typed on stdin.
 *
 * Usage: orangecat-chat <conversation-id>
 *   ORANGECAT_USER_ID   signed-in user's id (required)
 *   ORANGECAT_TOKEN     bearer token
 *   ORANGECAT_CONFIG    optional TOML config file
 *   CLIENT_API_URL      server URL override
 */
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{broadcast, mpsc};
use uuid::Uuid;

use orangecat_chat::client::local_db::LocalDatabase;
use orangecat_chat::client::logging::init_logging;
use orangecat_chat::client::messaging::{
    HttpMessagingApi, MessagingClient, RealtimeSubscription, StoreEvent,
};
use orangecat_chat::client::offline::DeliveryStatus;
use orangecat_chat::client::sync::NetworkMonitor;
use orangecat_chat::client::Config;

const STREAM_BUFFER: usize = 64;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();

    let conversation_id: Uuid = std::env::args()
        .nth(1)
        .ok_or("usage: orangecat-chat <conversation-id>")?
        .parse()?;
    let user_id: Uuid = std::env::var("ORANGECAT_USER_ID")
        .map_err(|_| "ORANGECAT_USER_ID is not set")?
        .parse()?;

    let config = match std::env::var("ORANGECAT_CONFIG") {
        Ok(path) => Config::load(path)?,
        Err(_) => Config::new(),
    };
    tracing::info!("[STARTUP] Server {}", config.server_url());

    let db = LocalDatabase::open(config.queue_db_path()).await?;
    let network = NetworkMonitor::default();
    let client = Arc::new(MessagingClient::new(
        user_id,
        config.app(),
        Arc::new(HttpMessagingApi::new(config.clone())),
        Arc::new(db),
        network.clone(),
    ));

    let restored = client.restore_pending().await;
    if restored > 0 {
        println!("{} unsent message(s) from last session", restored);
    }
    client.spawn_reconnect_flush();

    let (events_tx, events_rx) = mpsc::channel(STREAM_BUFFER);
    let (_stream, _status) =
        RealtimeSubscription::new(config.clone(), network).spawn(Some(conversation_id), events_tx);
    client.spawn_event_pump(events_rx);

    spawn_printer(Arc::clone(&client), conversation_id);

    if let Err(e) = client.open_conversation(conversation_id).await {
        eprintln!("Could not open conversation: {}", e.user_message());
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match line.trim() {
            "/quit" => break,
            "/retry" => retry_failed(&client, conversation_id).await,
            "/flush" => {
                let report = client.flush_offline_queue().await;
                println!("flushed: {} sent, {} kept", report.sent, report.kept);
            }
            text => {
                if let Err(e) = client.send_message(conversation_id, text).await {
                    eprintln!("{}", e.user_message());
                }
            }
        }
    }

    Ok(())
}

async fn retry_failed(client: &MessagingClient, conversation_id: Uuid) {
    for view in client.messages(conversation_id).await {
        if !view.can_retry() {
            continue;
        }
        if let Some(temp_id) = view.message.id.temporary() {
            if let Err(e) = client.retry_message(conversation_id, temp_id).await {
                eprintln!("retry failed: {}", e);
            }
        }
    }
}

fn spawn_printer(client: Arc<MessagingClient>, conversation_id: Uuid) {
    let mut events = client.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(StoreEvent::MessagesChanged { conversation_id: id })
                | Ok(StoreEvent::ReadStateChanged { conversation_id: id })
                    if id == conversation_id =>
                {
                    render(&client, conversation_id).await;
                }
                Ok(StoreEvent::Notice(notice)) => eprintln!("! {}", notice.text),
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!("[UI] Skipped {} store events", skipped);
                    render(&client, conversation_id).await;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });
}

async fn render(client: &MessagingClient, conversation_id: Uuid) {
    println!("----");
    for view in client.messages(conversation_id).await {
        let who = if view.is_own { "me" } else { "them" };
        let mark = match view.status {
            DeliveryStatus::Pending => "…",
            DeliveryStatus::Sent => "✓",
            DeliveryStatus::Delivered => "✓✓",
            DeliveryStatus::Read => "read",
            DeliveryStatus::Failed => "failed - /retry",
        };
        let body = if view.message.is_deleted {
            "Message deleted"
        } else {
            view.message.content.as_str()
        };
        println!("[{}] {} ({})", who, body, mark);
    }
    let typing = client.typing_users(conversation_id).await;
    if !typing.is_empty() {
        println!("{} typing...", typing.len());
    }
}
