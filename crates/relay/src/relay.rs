//! Correlation between caller requests and extension replies.
//!
//! Every submitted request gets a fresh UUID correlation id and a pending
//! record holding the caller's reply channel. A record is removed exactly
//! once, by whichever of {matching reply, timeout} comes first: both paths
//! take the record out of the table under the same lock, and only the
//! winner acts. The timeout runs as a detached task armed when the record
//! is inserted, so the entry is reclaimed even when the caller's future is
//! dropped mid-wait (HTTP client disconnect). A late reply finds no record
//! and is silently discarded.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use teleport_core::chat::{ChatCompletion, ChatCompletionRequest};
use teleport_core::config::{Config, WS_EXTENSION_PATH};
use teleport_core::{Envelope, Error, Result};
use tokio::sync::{oneshot, Mutex};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::connection::ConnectionManager;

type ReplySender = oneshot::Sender<Result<ChatCompletion>>;

pub struct Relay {
    connections: Arc<ConnectionManager>,
    pending: Arc<Mutex<HashMap<String, ReplySender>>>,
    request_timeout: Duration,
    /// Advertised extension endpoint, used in the not-connected error text.
    ws_url: String,
}

impl Relay {
    pub fn new(connections: Arc<ConnectionManager>, config: &Config) -> Self {
        Self {
            connections,
            pending: Arc::new(Mutex::new(HashMap::new())),
            request_timeout: Duration::from_millis(config.relay.request_timeout_ms),
            ws_url: format!(
                "ws://{}:{}{}",
                config.gateway.host, config.gateway.port, WS_EXTENSION_PATH
            ),
        }
    }

    /// Number of requests currently waiting for an extension reply.
    pub async fn inflight(&self) -> usize {
        self.pending.lock().await.len()
    }

    /// Send a request envelope to the extension and wait for the matching
    /// reply. Fails immediately when no extension is connected; otherwise
    /// resolves with the reply or rejects after the configured timeout.
    pub async fn submit(&self, request: ChatCompletionRequest) -> Result<ChatCompletion> {
        let channel = self
            .connections
            .current()
            .await
            .ok_or_else(|| Error::NoDownstreamConnection(self.ws_url.clone()))?;

        let correlation_id = Uuid::new_v4().to_string();
        let (reply_tx, reply_rx) = oneshot::channel();
        self.pending
            .lock()
            .await
            .insert(correlation_id.clone(), reply_tx);
        self.arm_timeout(correlation_id.clone());

        let envelope = Envelope::Request {
            correlation_id: correlation_id.clone(),
            request,
        };
        let frame = serde_json::to_string(&envelope)?;
        if channel.send(frame).await.is_err() {
            // The connection task went away between lookup and send.
            self.take_pending(&correlation_id).await;
            return Err(Error::NoDownstreamConnection(self.ws_url.clone()));
        }

        match reply_rx.await {
            Ok(result) => result,
            Err(_) => Err(Error::Channel("pending request dropped".to_string())),
        }
    }

    /// Detached timeout for one pending record. Runs independently of the
    /// caller, so the table entry is reclaimed on deadline even when the
    /// submitting future has been dropped.
    fn arm_timeout(&self, correlation_id: String) {
        let pending = self.pending.clone();
        let timeout = self.request_timeout;
        let timeout_ms = timeout.as_millis() as u64;
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            if let Some(reply_tx) = pending.lock().await.remove(&correlation_id) {
                debug!(correlation_id = %correlation_id, "Pending request timed out");
                let _ = reply_tx.send(Err(Error::ResponseTimeout { timeout_ms }));
            }
        });
    }

    /// Process one inbound frame from the extension. Unparseable data and
    /// replies without a live pending record are dropped without surfacing
    /// anything to callers, since they cannot be correlated.
    pub async fn handle_envelope(&self, raw: &str) {
        let envelope: Envelope = match serde_json::from_str(raw) {
            Ok(envelope) => envelope,
            Err(e) => {
                debug!(error = %e, "Discarding unparseable frame from extension");
                return;
            }
        };

        match envelope {
            Envelope::Response {
                correlation_id,
                response,
            } => self.settle(&correlation_id, Ok(response)).await,
            Envelope::Error {
                correlation_id,
                error,
            } => self.settle(&correlation_id, Err(Error::Other(error))).await,
            Envelope::Request { correlation_id, .. } => {
                warn!(correlation_id = %correlation_id, "Ignoring request envelope from extension");
            }
        }
    }

    async fn settle(&self, correlation_id: &str, result: Result<ChatCompletion>) {
        match self.take_pending(correlation_id).await {
            Some(reply_tx) => {
                // The caller may have gone away; nothing to do then.
                let _ = reply_tx.send(result);
            }
            None => {
                debug!(correlation_id = %correlation_id, "Discarding reply with no pending request");
            }
        }
    }

    async fn take_pending(&self, correlation_id: &str) -> Option<ReplySender> {
        self.pending.lock().await.remove(correlation_id)
    }
}
