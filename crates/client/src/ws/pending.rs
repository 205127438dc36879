//! In-flight correlated requests awaiting a response over the socket.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use apexkit_shared::SearchResponse;
use serde_json::Value;
use tokio::sync::oneshot;

use crate::error::RealtimeError;

pub(crate) type SearchResult = Result<Vec<Value>, RealtimeError>;

/// Map of `request_id` → waiting caller.
///
/// Every entry leaves the map exactly once: through [`complete`], [`fail`],
/// [`cancel`] or [`reject_all`]. Whoever removes it owns the outcome.
///
/// [`complete`]: PendingRequests::complete
/// [`fail`]: PendingRequests::fail
/// [`cancel`]: PendingRequests::cancel
/// [`reject_all`]: PendingRequests::reject_all
#[derive(Default)]
pub(crate) struct PendingRequests {
    waiting: Mutex<HashMap<String, oneshot::Sender<SearchResult>>>,
}

impl PendingRequests {
    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, oneshot::Sender<SearchResult>>> {
        self.waiting.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn register(&self, request_id: String) -> oneshot::Receiver<SearchResult> {
        let (tx, rx) = oneshot::channel();
        self.lock().insert(request_id, tx);
        rx
    }

    /// Route a response to its caller. Returns `false` when nobody is waiting
    /// for that id (already timed out, swept, or never issued).
    pub(crate) fn complete(&self, response: SearchResponse) -> bool {
        let Some(tx) = self.lock().remove(&response.request_id) else {
            return false;
        };
        let result = response.into_result().map_err(RealtimeError::Server);
        // The caller may have stopped waiting; the entry is gone either way.
        let _ = tx.send(result);
        true
    }

    /// Reject one caller with `error`. Returns `false` when nobody is waiting.
    pub(crate) fn fail(&self, request_id: &str, error: RealtimeError) -> bool {
        let Some(tx) = self.lock().remove(request_id) else {
            return false;
        };
        let _ = tx.send(Err(error));
        true
    }

    /// Drop an entry without resolving it. Returns `false` if it was already gone.
    pub(crate) fn cancel(&self, request_id: &str) -> bool {
        self.lock().remove(request_id).is_some()
    }

    /// Reject and remove every entry. Returns how many were rejected.
    pub(crate) fn reject_all(&self, error: RealtimeError) -> usize {
        let drained: Vec<_> = self.lock().drain().collect();
        let count = drained.len();
        for (_, tx) in drained {
            let _ = tx.send(Err(error.clone()));
        }
        count
    }

    pub(crate) fn len(&self) -> usize {
        self.lock().len()
    }

    pub(crate) fn contains(&self, request_id: &str) -> bool {
        self.lock().contains_key(request_id)
    }
}
