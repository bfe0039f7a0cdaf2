//! The downstream agent: dials the relay and answers request envelopes.
//!
//! One agent holds one WebSocket to the relay. Every request envelope is
//! flattened into a prompt, typed into the web UI, and answered once the
//! rendered reply stabilizes. Failures for a single request travel back as
//! error envelopes; connection failures trigger a fixed-delay reconnect.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use teleport_core::chat::{ChatCompletion, ChatCompletionRequest};
use teleport_core::config::AgentConfig;
use teleport_core::{Envelope, Error, Result};
use tokio_tungstenite::{connect_async, tungstenite::Message as WsMessage};
use tracing::{debug, error, info, warn};

use crate::adapter::build_prompt;
use crate::driver::UiDriver;
use crate::stabilize::{Stabilizer, TextSource};

/// Adapts the UI driver's response reader to the stabilization poller.
struct DriverText<'a>(&'a dyn UiDriver);

#[async_trait]
impl TextSource for DriverText<'_> {
    async fn current_text(&self) -> Result<String> {
        self.0.read_response_text().await
    }
}

pub struct AgentClient {
    config: AgentConfig,
    driver: Arc<dyn UiDriver>,
    stabilizer: Stabilizer,
}

impl AgentClient {
    pub fn new(config: AgentConfig, driver: Arc<dyn UiDriver>) -> Self {
        let stabilizer = Stabilizer::new(&config.stabilize);
        Self {
            config,
            driver,
            stabilizer,
        }
    }

    /// Connect, serve, reconnect forever. Returns only on shutdown.
    pub async fn run_loop(self: Arc<Self>, mut shutdown: tokio::sync::broadcast::Receiver<()>) {
        let delay = Duration::from_millis(self.config.reconnect_delay_ms);
        info!(bridge_url = %self.config.bridge_url, "Agent starting");

        loop {
            tokio::select! {
                result = self.connect_and_run() => {
                    match result {
                        Ok(_) => info!("Relay connection closed, reconnecting"),
                        Err(e) => error!(error = %e, "Relay connection error, reconnecting"),
                    }
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = shutdown.recv() => {
                            info!("Agent shutting down");
                            break;
                        }
                    }
                }
                _ = shutdown.recv() => {
                    info!("Agent shutting down");
                    break;
                }
            }
        }
    }

    async fn connect_and_run(&self) -> Result<()> {
        let url = url::Url::parse(&self.config.bridge_url)
            .map_err(|e| Error::Channel(format!("Invalid bridge URL: {}", e)))?;

        let (ws_stream, _) = connect_async(url.as_str())
            .await
            .map_err(|e| Error::Channel(format!("WebSocket connection failed: {}", e)))?;

        info!("Connected to relay");
        let (mut write, mut read) = ws_stream.split();

        loop {
            match read.next().await {
                Some(Ok(WsMessage::Text(text))) => {
                    if let Some(reply) = self.handle_frame(&text).await {
                        let frame = serde_json::to_string(&reply)?;
                        write
                            .send(WsMessage::Text(frame))
                            .await
                            .map_err(|e| Error::Channel(format!("Failed to send reply: {}", e)))?;
                    }
                }
                Some(Ok(WsMessage::Ping(data))) => {
                    if let Err(e) = write.send(WsMessage::Pong(data)).await {
                        warn!(error = %e, "Failed to send pong");
                    }
                }
                Some(Ok(WsMessage::Close(_))) => {
                    info!("Relay closed connection");
                    break;
                }
                Some(Err(e)) => {
                    return Err(Error::Channel(format!("WebSocket error: {}", e)));
                }
                None => break,
                _ => {}
            }
        }

        Ok(())
    }

    /// Turn one inbound frame into its reply envelope, if any. Frames that
    /// are not request envelopes are dropped.
    async fn handle_frame(&self, text: &str) -> Option<Envelope> {
        let envelope = match serde_json::from_str::<Envelope>(text) {
            Ok(envelope) => envelope,
            Err(e) => {
                debug!(error = %e, "Dropping malformed frame");
                return None;
            }
        };

        let Envelope::Request {
            correlation_id,
            request,
        } = envelope
        else {
            debug!("Dropping non-request envelope");
            return None;
        };

        debug!(correlation_id = %correlation_id, "Handling request");
        match self.complete(&request).await {
            Ok(response) => Some(Envelope::Response {
                correlation_id,
                response,
            }),
            Err(e) => {
                warn!(correlation_id = %correlation_id, error = %e, "Request failed");
                Some(Envelope::Error {
                    correlation_id,
                    error: e.to_string(),
                })
            }
        }
    }

    async fn complete(&self, request: &ChatCompletionRequest) -> Result<ChatCompletion> {
        let prompt = build_prompt(request);
        self.driver.submit_prompt(&prompt).await?;
        let text = self
            .stabilizer
            .wait_for_stable_text(&DriverText(self.driver.as_ref()))
            .await?;
        Ok(ChatCompletion::from_text(request.model_name(), &text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::sync::Mutex;

    /// Records submitted prompts and renders a fixed reply right away.
    struct FixedReplyDriver {
        reply: String,
        prompts: Mutex<Vec<String>>,
    }

    impl FixedReplyDriver {
        fn new(reply: &str) -> Self {
            Self {
                reply: reply.to_string(),
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl UiDriver for FixedReplyDriver {
        async fn submit_prompt(&self, prompt: &str) -> Result<()> {
            self.prompts.lock().await.push(prompt.to_string());
            Ok(())
        }

        async fn read_response_text(&self) -> Result<String> {
            Ok(self.reply.clone())
        }
    }

    struct BrokenPageDriver;

    #[async_trait]
    impl UiDriver for BrokenPageDriver {
        async fn submit_prompt(&self, _prompt: &str) -> Result<()> {
            Err(Error::ElementNotFound("textarea".to_string()))
        }

        async fn read_response_text(&self) -> Result<String> {
            Ok(String::new())
        }
    }

    fn client(driver: Arc<dyn UiDriver>) -> AgentClient {
        AgentClient::new(AgentConfig::default(), driver)
    }

    fn request_frame(correlation_id: &str) -> String {
        json!({
            "type": "request",
            "correlationId": correlation_id,
            "request": { "messages": [{ "role": "user", "content": "Hello" }] },
        })
        .to_string()
    }

    #[tokio::test(start_paused = true)]
    async fn request_frame_yields_response_envelope() {
        let driver = Arc::new(FixedReplyDriver::new("Hi there"));
        let client = client(driver.clone());

        let reply = client.handle_frame(&request_frame("abc-123")).await;
        match reply {
            Some(Envelope::Response {
                correlation_id,
                response,
            }) => {
                assert_eq!(correlation_id, "abc-123");
                assert_eq!(response.model, "gemini-web-ui");
                assert_eq!(response.choices[0].message.content, "Hi there");
            }
            other => panic!("unexpected reply: {:?}", other),
        }

        let prompts = driver.prompts.lock().await;
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("USER: Hello"));
    }

    #[tokio::test(start_paused = true)]
    async fn caller_model_carries_into_response() {
        let client = client(Arc::new(FixedReplyDriver::new("ok")));
        let frame = json!({
            "type": "request",
            "correlationId": "m1",
            "request": { "model": "custom", "messages": [{ "role": "user", "content": "hi" }] },
        })
        .to_string();

        match client.handle_frame(&frame).await {
            Some(Envelope::Response { response, .. }) => assert_eq!(response.model, "custom"),
            other => panic!("unexpected reply: {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn driver_failure_yields_error_envelope() {
        let client = client(Arc::new(BrokenPageDriver));

        match client.handle_frame(&request_frame("err-1")).await {
            Some(Envelope::Error {
                correlation_id,
                error,
            }) => {
                assert_eq!(correlation_id, "err-1");
                assert_eq!(error, "Element not found: textarea");
            }
            other => panic!("unexpected reply: {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn malformed_and_non_request_frames_are_dropped() {
        let client = client(Arc::new(FixedReplyDriver::new("x")));

        assert!(client.handle_frame("not json").await.is_none());
        assert!(client
            .handle_frame(r#"{ "type": "ping", "correlationId": "z" }"#)
            .await
            .is_none());

        let response_frame = json!({
            "type": "response",
            "correlationId": "r1",
            "response": ChatCompletion::from_text("gemini-web-ui", "hi"),
        })
        .to_string();
        assert!(client.handle_frame(&response_frame).await.is_none());
    }
}
