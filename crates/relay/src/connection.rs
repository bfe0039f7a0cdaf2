//! Ownership of the single downstream channel.
//!
//! Exactly one connection is "current" at any instant. A new extension
//! connection supersedes the previous one without waiting for it to close;
//! a superseded connection closing later must not clear its replacement,
//! so clearing is keyed by connection id.

use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{mpsc, Mutex};
use tracing::info;

/// Send-half of the active extension connection. Payloads are serialized
/// envelopes; the WebSocket task on the other end writes them to the wire.
#[derive(Debug, Clone)]
pub struct ChannelHandle {
    pub id: u64,
    tx: mpsc::Sender<String>,
}

impl ChannelHandle {
    pub async fn send(&self, frame: String) -> Result<(), mpsc::error::SendError<String>> {
        self.tx.send(frame).await
    }
}

pub struct ConnectionManager {
    current: Mutex<Option<ChannelHandle>>,
    next_id: AtomicU64,
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self {
            current: Mutex::new(None),
            next_id: AtomicU64::new(1),
        }
    }

    /// Make a freshly accepted connection the current one, superseding any
    /// previous connection. Returns the id the caller must pass to `clear`.
    pub async fn register(&self, tx: mpsc::Sender<String>) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let mut current = self.current.lock().await;
        if let Some(old) = current.as_ref() {
            info!(old_id = old.id, new_id = id, "New extension connection supersedes the old one");
        }
        *current = Some(ChannelHandle { id, tx });
        id
    }

    /// Clear the singleton, but only if `id` is still the current
    /// connection.
    pub async fn clear(&self, id: u64) {
        let mut current = self.current.lock().await;
        if current.as_ref().map(|c| c.id) == Some(id) {
            *current = None;
        }
    }

    pub async fn current(&self) -> Option<ChannelHandle> {
        self.current.lock().await.clone()
    }

    pub async fn is_connected(&self) -> bool {
        self.current.lock().await.is_some()
    }
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}
