pub mod chat;
pub mod config;
pub mod error;
pub mod paths;
pub mod protocol;

pub use chat::{ChatCompletion, ChatCompletionRequest, ChatMessage, DEFAULT_MODEL};
pub use config::Config;
pub use error::{Error, Result};
pub use paths::Paths;
pub use protocol::Envelope;
