//! Real-time Stream Subscription
//!
//! Long-lived `GET /api/messages/stream` request whose body is a sequence of
//! newline-delimited JSON events. Lines are decoded at this boundary and
//! forwarded as [`RealtimeEvent`]s; malformed lines are logged and dropped.
//!
//! Connection transitions are reported to the [`NetworkMonitor`], which is
//! what triggers the offline queue flush on reconnect. Lost connections are
//! retried with exponential backoff.

use futures_util::StreamExt;
use reqwest::Client;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::client::config::Config;
use crate::client::sync::{NetworkMonitor, NetworkStatus};
use crate::shared::RealtimeEvent;

const INITIAL_RECONNECT_DELAY: Duration = Duration::from_millis(1000);
const MAX_RECONNECT_DELAY: Duration = Duration::from_secs(30);

/// Subscription status reported by the stream task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamStatus {
    Connecting,
    Connected,
    Retrying { delay: Duration },
    Error(String),
    /// Server closed the stream or nobody is listening any more
    Disconnected,
}

/// Exponential reconnect delay, doubling up to a cap
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    current: Duration,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max,
            current: initial,
        }
    }

    /// Delay to wait now; the following call returns twice as much
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = std::cmp::min(self.current * 2, self.max);
        delay
    }

    pub fn reset(&mut self) {
        self.current = self.initial;
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(INITIAL_RECONNECT_DELAY, MAX_RECONNECT_DELAY)
    }
}

/// Splits a chunked byte stream into complete lines
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk; returns every line it completed. Chunks may split a line
    /// or a multi-byte character anywhere.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);
        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.pending.drain(..=pos).collect();
            match std::str::from_utf8(&raw[..raw.len() - 1]) {
                Ok(line) => lines.push(line.trim_end_matches('\r').to_string()),
                Err(e) => tracing::warn!("[STREAM] Dropping line with invalid UTF-8: {}", e),
            }
        }
        lines
    }

    /// Bytes received after the last newline
    pub fn remainder(&self) -> usize {
        self.pending.len()
    }
}

/// Decode one stream line. Blank lines, `:` keep-alive comments and
/// malformed events yield `None`.
pub fn decode_line(line: &str) -> Option<RealtimeEvent> {
    let line = line.trim();
    if line.is_empty() || line.starts_with(':') {
        return None;
    }
    // Tolerate SSE framing from proxies
    let data = line.strip_prefix("data:").map(str::trim_start).unwrap_or(line);

    match RealtimeEvent::decode(data) {
        Ok(event) => {
            tracing::debug!(
                "[STREAM] Received {} for conversation {}",
                event.kind(),
                event.conversation_id()
            );
            Some(event)
        }
        Err(e) => {
            tracing::warn!("[STREAM] Dropping malformed event: {} | line: {}", e, data);
            None
        }
    }
}

/// How a single connection ended
enum ConnectionEnd {
    /// Server closed the body cleanly
    Closed,
    /// Event receiver dropped
    ReceiverGone,
    Lost(String),
}

/// Streams real-time events into a channel
#[derive(Debug, Clone)]
pub struct RealtimeSubscription {
    config: Config,
    client: Client,
    network: NetworkMonitor,
    backoff: Backoff,
}

impl RealtimeSubscription {
    pub fn new(config: Config, network: NetworkMonitor) -> Self {
        Self {
            config,
            client: Client::new(),
            network,
            backoff: Backoff::default(),
        }
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// URL of the stream, optionally scoped to one conversation
    pub fn stream_url(&self, conversation_id: Option<Uuid>) -> String {
        match conversation_id {
            Some(id) => self
                .config
                .api_url(&format!("/api/messages/stream?conversation_id={}", id)),
            None => self.config.api_url("/api/messages/stream"),
        }
    }

    /// Start the stream task. Returns the task handle and a status receiver.
    pub fn spawn(
        self,
        conversation_id: Option<Uuid>,
        events: mpsc::Sender<RealtimeEvent>,
    ) -> (JoinHandle<()>, watch::Receiver<StreamStatus>) {
        let (status_tx, status_rx) = watch::channel(StreamStatus::Connecting);
        let handle = tokio::spawn(async move {
            self.run(conversation_id, events, status_tx).await;
        });
        (handle, status_rx)
    }

    async fn run(
        mut self,
        conversation_id: Option<Uuid>,
        events: mpsc::Sender<RealtimeEvent>,
        status: watch::Sender<StreamStatus>,
    ) {
        let url = self.stream_url(conversation_id);

        loop {
            tracing::info!("[STREAM] Subscribing to {}", url);
            let _ = status.send(StreamStatus::Connecting);

            match self.connect_once(&url, &events, &status).await {
                ConnectionEnd::Closed => {
                    tracing::info!("[STREAM] Stream closed by server");
                    let _ = status.send(StreamStatus::Disconnected);
                    return;
                }
                ConnectionEnd::ReceiverGone => {
                    tracing::debug!("[STREAM] Event receiver dropped, stopping");
                    let _ = status.send(StreamStatus::Disconnected);
                    return;
                }
                ConnectionEnd::Lost(reason) => {
                    let delay = self.backoff.next_delay();
                    tracing::warn!("[STREAM] {} (retrying in {:?})", reason, delay);
                    let _ = status.send(StreamStatus::Error(reason));
                    let _ = status.send(StreamStatus::Retrying { delay });
                    if events.is_closed() {
                        return;
                    }
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    async fn connect_once(
        &mut self,
        url: &str,
        events: &mpsc::Sender<RealtimeEvent>,
        status: &watch::Sender<StreamStatus>,
    ) -> ConnectionEnd {
        let mut request = self.client.get(url).header("Accept", "application/x-ndjson");
        if let Some(token) = self.config.get_token() {
            request = request.header("Authorization", format!("Bearer {}", token));
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                self.network.set_status(NetworkStatus::Offline);
                return ConnectionEnd::Lost(format!("network: {}", e));
            }
        };

        if !response.status().is_success() {
            // Reachable, but no real-time updates
            self.network.set_status(NetworkStatus::Limited);
            return ConnectionEnd::Lost(format!("http: {}", response.status()));
        }

        tracing::info!("[STREAM] Subscription established");
        self.network.set_status(NetworkStatus::Online);
        self.backoff.reset();
        let _ = status.send(StreamStatus::Connected);

        let mut body = response.bytes_stream();
        let mut lines = LineBuffer::new();
        while let Some(chunk) = body.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    self.network.set_status(NetworkStatus::Offline);
                    return ConnectionEnd::Lost(format!("stream: {}", e));
                }
            };
            for line in lines.push(&chunk) {
                if let Some(event) = decode_line(&line) {
                    if events.send(event).await.is_err() {
                        return ConnectionEnd::ReceiverGone;
                    }
                }
            }
        }

        if lines.remainder() > 0 {
            tracing::debug!("[STREAM] Discarding {} bytes of partial line", lines.remainder());
        }
        ConnectionEnd::Closed
    }
}
