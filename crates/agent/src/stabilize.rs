//! Completion detection over progressively rendered text.
//!
//! The web UI renders its answer incrementally and exposes no "done"
//! event, so the only completion signal available is the text going quiet:
//! the same non-empty text observed for a configured number of consecutive
//! samples. Empty samples mean nothing has rendered yet and advance
//! neither the counter nor the remembered text.

use std::time::Duration;

use async_trait::async_trait;
use teleport_core::config::StabilizeConfig;
use teleport_core::{Error, Result};
use tracing::debug;

/// Where the poller reads the rendered text from. Separated from the UI
/// driver so tests can script a text sequence without a browser.
#[async_trait]
pub trait TextSource: Send + Sync {
    async fn current_text(&self) -> Result<String>;
}

/// Sampling state: {Sampling → Settled | TimedOut}.
#[derive(Debug, Default)]
struct Sample {
    last_text: String,
    stable_count: u32,
}

impl Sample {
    /// Feed one observation; returns the settled text once the same
    /// non-empty text has been seen `required` consecutive times.
    fn observe(&mut self, text: &str, required: u32) -> Option<String> {
        if text.is_empty() {
            return None;
        }
        if text == self.last_text {
            self.stable_count += 1;
        } else {
            self.last_text = text.to_string();
            self.stable_count = 1;
        }
        if self.stable_count >= required {
            Some(self.last_text.clone())
        } else {
            None
        }
    }
}

pub struct Stabilizer {
    interval: Duration,
    required: u32,
    timeout: Duration,
}

impl Stabilizer {
    pub fn new(config: &StabilizeConfig) -> Self {
        Self {
            interval: Duration::from_millis(config.poll_interval_ms),
            required: config.stable_samples.max(1),
            timeout: Duration::from_millis(config.timeout_ms),
        }
    }

    /// Poll `source` until the rendered text settles, or fail with
    /// `StabilizationTimeout` once the window elapses.
    pub async fn wait_for_stable_text<S: TextSource + ?Sized>(
        &self,
        source: &S,
    ) -> Result<String> {
        let started = tokio::time::Instant::now();
        let mut sample = Sample::default();

        while started.elapsed() < self.timeout {
            let text = source.current_text().await?;
            if let Some(settled) = sample.observe(&text, self.required) {
                debug!(chars = settled.len(), "Rendered text settled");
                return Ok(settled);
            }
            tokio::time::sleep(self.interval).await;
        }

        Err(Error::StabilizationTimeout {
            timeout_ms: self.timeout.as_millis() as u64,
        })
    }
}
