//! Interface to whatever actually drives the web UI.
//!
//! Locating elements on the target page is an external concern; the agent
//! only needs these two capabilities. `read_response_text` must return the
//! newest assistant block's plain text, or an empty string when nothing has
//! rendered yet.

use async_trait::async_trait;
use teleport_core::Result;

#[async_trait]
pub trait UiDriver: Send + Sync {
    /// Put the prompt into the page's input and trigger submission.
    async fn submit_prompt(&self, prompt: &str) -> Result<()>;

    /// Read the current text of the latest response block.
    async fn read_response_text(&self) -> Result<String>;
}
