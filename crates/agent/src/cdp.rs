//! Chrome DevTools Protocol driver for the web UI tab.
//!
//! Talks to a Chrome instance launched with `--remote-debugging-port`.
//! Target discovery goes through the HTTP endpoint (`/json/list`); page
//! interaction is all `Runtime.evaluate` against the matched tab.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use teleport_core::config::ChromeConfig;
use teleport_core::{Error, Result};
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use crate::driver::UiDriver;

const COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// Low-level CDP connection: correlates command responses by `id`.
pub struct CdpClient {
    ws_tx: mpsc::Sender<String>,
    pending: Arc<Mutex<HashMap<u64, oneshot::Sender<Value>>>>,
    next_id: AtomicU64,
    reader_handle: tokio::task::JoinHandle<()>,
    writer_handle: tokio::task::JoinHandle<()>,
}

impl CdpClient {
    pub async fn connect(ws_url: &str) -> Result<Self> {
        let (ws_stream, _) = connect_async(ws_url)
            .await
            .map_err(|e| Error::Channel(format!("CDP connect to {} failed: {}", ws_url, e)))?;
        let (mut ws_sink, mut ws_read) = ws_stream.split();

        let (ws_tx, mut ws_rx) = mpsc::channel::<String>(64);
        let pending: Arc<Mutex<HashMap<u64, oneshot::Sender<Value>>>> =
            Arc::new(Mutex::new(HashMap::new()));
        let pending_reader = pending.clone();

        let writer_handle = tokio::spawn(async move {
            while let Some(msg) = ws_rx.recv().await {
                if let Err(e) = ws_sink.send(Message::Text(msg)).await {
                    warn!(error = %e, "CDP write error");
                    break;
                }
            }
        });

        // Events carry no `id` and are ignored; only command responses are
        // routed back to their waiters.
        let reader_handle = tokio::spawn(async move {
            while let Some(msg) = ws_read.next().await {
                match msg {
                    Ok(Message::Text(text)) => {
                        let Ok(val) = serde_json::from_str::<Value>(&text) else {
                            continue;
                        };
                        if let Some(id) = val.get("id").and_then(|v| v.as_u64()) {
                            if let Some(tx) = pending_reader.lock().await.remove(&id) {
                                let _ = tx.send(val);
                            }
                        }
                    }
                    Ok(Message::Close(_)) => {
                        debug!("CDP WebSocket closed by browser");
                        break;
                    }
                    Err(e) => {
                        warn!(error = %e, "CDP read error");
                        break;
                    }
                    _ => {}
                }
            }
        });

        Ok(Self {
            ws_tx,
            pending,
            next_id: AtomicU64::new(1),
            reader_handle,
            writer_handle,
        })
    }

    pub async fn send_command(&self, method: &str, params: Value) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let msg = json!({ "id": id, "method": method, "params": params });

        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id, tx);

        self.ws_tx
            .send(msg.to_string())
            .await
            .map_err(|e| Error::Channel(format!("CDP send failed: {}", e)))?;

        match timeout(COMMAND_TIMEOUT, rx).await {
            Ok(Ok(response)) => {
                if let Some(error) = response.get("error") {
                    return Err(Error::Other(format!("CDP error from {}: {}", method, error)));
                }
                Ok(response.get("result").cloned().unwrap_or(Value::Null))
            }
            Ok(Err(_)) => Err(Error::Channel("CDP connection closed".to_string())),
            Err(_) => {
                self.pending.lock().await.remove(&id);
                Err(Error::Channel(format!(
                    "CDP command {} timed out after {}s",
                    method,
                    COMMAND_TIMEOUT.as_secs()
                )))
            }
        }
    }

    /// Evaluate JavaScript in the page and return its value.
    pub async fn evaluate(&self, expression: &str) -> Result<Value> {
        let result = self
            .send_command(
                "Runtime.evaluate",
                json!({
                    "expression": expression,
                    "returnByValue": true,
                    "awaitPromise": true,
                }),
            )
            .await?;
        if let Some(exception) = result.get("exceptionDetails") {
            return Err(Error::Other(format!("Page script threw: {}", exception)));
        }
        Ok(result
            .get("result")
            .and_then(|r| r.get("value"))
            .cloned()
            .unwrap_or(Value::Null))
    }
}

impl Drop for CdpClient {
    fn drop(&mut self) {
        self.reader_handle.abort();
        self.writer_handle.abort();
    }
}

/// Pick the debugger URL of the first open page whose URL contains
/// `url_match`.
fn pick_debugger_url(targets: &[Value], url_match: &str) -> Option<String> {
    targets
        .iter()
        .find(|t| {
            t.get("type").and_then(|v| v.as_str()) == Some("page")
                && t.get("url")
                    .and_then(|v| v.as_str())
                    .is_some_and(|url| url.contains(url_match))
        })
        .and_then(|t| t.get("webSocketDebuggerUrl").and_then(|v| v.as_str()))
        .map(|s| s.to_string())
}

/// Quote a string as a JavaScript literal.
fn js_string(s: &str) -> String {
    Value::String(s.to_string()).to_string()
}

/// Drives the conversational web UI over CDP.
pub struct CdpDriver {
    client: CdpClient,
    chrome: ChromeConfig,
}

impl CdpDriver {
    /// Find the web UI tab on the local debugging port and attach to it.
    pub async fn connect(chrome: &ChromeConfig) -> Result<Self> {
        let list_url = format!("http://127.0.0.1:{}/json/list", chrome.debug_port);
        let targets: Vec<Value> = reqwest::get(&list_url)
            .await
            .map_err(|e| {
                Error::Other(format!(
                    "Chrome debugging endpoint {} unreachable: {}",
                    list_url, e
                ))
            })?
            .json()
            .await
            .map_err(|e| Error::Other(format!("Bad target list from Chrome: {}", e)))?;

        let ws_url = pick_debugger_url(&targets, &chrome.page_url_match).ok_or_else(|| {
            Error::Other(format!(
                "No open tab matching '{}'; open the web UI first",
                chrome.page_url_match
            ))
        })?;

        info!(ws_url = %ws_url, "Attaching to web UI tab");
        let client = CdpClient::connect(&ws_url).await?;
        Ok(Self {
            client,
            chrome: chrome.clone(),
        })
    }
}

#[async_trait]
impl UiDriver for CdpDriver {
    async fn submit_prompt(&self, prompt: &str) -> Result<()> {
        let script = format!(
            r#"(() => {{
  const input = document.querySelector({input});
  if (!input) return {{ ok: false, stage: 'input' }};
  input.focus();
  input.value = {prompt};
  input.dispatchEvent(new Event('input', {{ bubbles: true }}));
  const button = document.querySelector({send});
  if (!button) return {{ ok: false, stage: 'send' }};
  button.click();
  return {{ ok: true }};
}})()"#,
            input = js_string(&self.chrome.input_selector),
            prompt = js_string(prompt),
            send = js_string(&self.chrome.send_button_selector),
        );

        let result = self.client.evaluate(&script).await?;
        if result.get("ok").and_then(|v| v.as_bool()) == Some(true) {
            return Ok(());
        }
        let selector = match result.get("stage").and_then(|v| v.as_str()) {
            Some("send") => &self.chrome.send_button_selector,
            _ => &self.chrome.input_selector,
        };
        Err(Error::ElementNotFound(selector.clone()))
    }

    async fn read_response_text(&self) -> Result<String> {
        let script = format!(
            r#"(() => {{
  const blocks = document.querySelectorAll({selector});
  if (blocks.length === 0) return '';
  const latest = blocks[blocks.length - 1];
  return (latest.textContent || '').trim();
}})()"#,
            selector = js_string(&self.chrome.response_selector),
        );

        let result = self.client.evaluate(&script).await?;
        Ok(result.as_str().unwrap_or_default().to_string())
    }
}
