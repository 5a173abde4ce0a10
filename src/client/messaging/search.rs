//! Profile search with last-request-wins semantics.
//!
//! Each query gets a generation number. Starting a new query aborts the
//! request still in flight, and a result is only handed back if its
//! generation is still the newest one when it arrives.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::AbortHandle;

use crate::client::error::ClientError;
use crate::client::messaging::api::MessagingApi;
use crate::shared::messaging::ProfileSummary;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchOutcome {
    Results(Vec<ProfileSummary>),
    /// A newer query started before this one finished
    Superseded,
}

pub struct SearchCoordinator {
    api: Arc<dyn MessagingApi>,
    generation: AtomicU64,
    inflight: Mutex<Option<AbortHandle>>,
}

impl std::fmt::Debug for SearchCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchCoordinator")
            .field("generation", &self.generation.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl SearchCoordinator {
    pub fn new(api: Arc<dyn MessagingApi>) -> Self {
        Self {
            api,
            generation: AtomicU64::new(0),
            inflight: Mutex::new(None),
        }
    }

    pub async fn search(&self, query: &str) -> Result<SearchOutcome, ClientError> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let query = query.trim().to_string();

        let mut inflight = self.inflight.lock().await;
        if let Some(previous) = inflight.take() {
            previous.abort();
        }
        if query.is_empty() {
            return Ok(SearchOutcome::Results(Vec::new()));
        }

        let api = Arc::clone(&self.api);
        let task = tokio::spawn(async move { api.search_profiles(&query).await });
        *inflight = Some(task.abort_handle());
        drop(inflight);

        let result = match task.await {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => {
                tracing::debug!("[SEARCH] Query #{} aborted", generation);
                return Ok(SearchOutcome::Superseded);
            }
            Err(e) => return Err(ClientError::network(e.to_string())),
        };

        if self.generation.load(Ordering::SeqCst) != generation {
            tracing::debug!("[SEARCH] Discarding stale results for query #{}", generation);
            return Ok(SearchOutcome::Superseded);
        }
        result.map(SearchOutcome::Results)
    }
}
