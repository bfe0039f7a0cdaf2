use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Chrome extension is not connected to {0}")]
    NoDownstreamConnection(String),

    #[error("Timed out waiting for extension response ({timeout_ms} ms)")]
    ResponseTimeout { timeout_ms: u64 },

    #[error("Timed out waiting for the page response to stabilize ({timeout_ms} ms)")]
    StabilizationTimeout { timeout_ms: u64 },

    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Channel error: {0}")]
    Channel(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
