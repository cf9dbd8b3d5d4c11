//! Requester-local table of in-flight scatter-gather requests

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

use crate::messages::MetricsResponse;
use crate::types::RequestId;

/// `request_id -> response sink`, shared between the bus handler that feeds
/// responses and the requests awaiting them
#[derive(Clone, Default)]
pub struct PendingRequests {
    inner: Arc<Mutex<HashMap<RequestId, mpsc::UnboundedSender<MetricsResponse>>>>,
}

impl PendingRequests {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open an entry for `request_id`. The entry lives until the returned
    /// guard is dropped.
    pub fn register(&self, request_id: RequestId) -> (PendingGuard, mpsc::UnboundedReceiver<MetricsResponse>) {
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock().insert(request_id, tx);

        let guard = PendingGuard {
            request_id,
            requests: self.clone(),
        };
        (guard, rx)
    }

    /// Hand a response to its request. Returns false when no request with
    /// that id is waiting.
    pub fn dispatch(&self, response: MetricsResponse) -> bool {
        let sink = self.lock().get(&response.request_id).cloned();
        match sink {
            Some(sink) => sink.send(response).is_ok(),
            None => false,
        }
    }

    /// Remove an entry; removing twice is a no-op
    pub fn remove(&self, request_id: &RequestId) -> bool {
        self.lock().remove(request_id).is_some()
    }

    pub fn contains(&self, request_id: &RequestId) -> bool {
        self.lock().contains_key(request_id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<RequestId, mpsc::UnboundedSender<MetricsResponse>>> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Removes its pending entry when dropped, whichever path finishes the request
pub struct PendingGuard {
    request_id: RequestId,
    requests: PendingRequests,
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.requests.remove(&self.request_id);
    }
}
