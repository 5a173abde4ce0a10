//! # Network Monitor
//!
//! Tracks connectivity as reported by the real-time stream (or set directly
//! by the host application), and lets other components wait for the
//! transition back online.
//!
//! ## Features
//!
//! - **Connectivity Detection**: Online/limited/offline status
//! - **Change Notification**: `watch` channel subscribers see every transition

use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkStatus {
    Online,
    /// Requests go through but the real-time stream is down
    Limited,
    Offline,
}

impl NetworkStatus {
    /// Whether sends should be attempted
    pub fn can_send(&self) -> bool {
        !matches!(self, NetworkStatus::Offline)
    }
}

#[derive(Debug, Clone)]
pub struct NetworkMonitor {
    status: watch::Sender<NetworkStatus>,
}

impl NetworkMonitor {
    pub fn new(initial: NetworkStatus) -> Self {
        let (status, _) = watch::channel(initial);
        Self { status }
    }

    pub fn get_status(&self) -> NetworkStatus {
        *self.status.borrow()
    }

    pub fn is_online(&self) -> bool {
        self.get_status().can_send()
    }

    /// Record a new status. Returns true when the status changed.
    pub fn set_status(&self, status: NetworkStatus) -> bool {
        let changed = self.status.send_if_modified(|current| {
            if *current == status {
                false
            } else {
                *current = status;
                true
            }
        });
        if changed {
            tracing::info!("[NET] Connectivity changed to {:?}", status);
        }
        changed
    }

    pub fn subscribe(&self) -> watch::Receiver<NetworkStatus> {
        self.status.subscribe()
    }
}

impl Default for NetworkMonitor {
    fn default() -> Self {
        Self::new(NetworkStatus::Online)
    }
}
