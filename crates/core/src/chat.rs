//! OpenAI-compatible chat types and the caller-facing completion shape.
//!
//! These are pure data transforms: the relay and the agent both speak this
//! shape, and the conversion from stabilized page text to a completion
//! object has no side effects.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Model name reported when the caller does not supply one. The "model" is
/// the browser web UI being driven, not an API model.
pub const DEFAULT_MODEL: &str = "gemini-web-ui";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    /// String, array of content parts, or any other JSON the caller sent.
    pub content: Value,
}

impl ChatMessage {
    pub fn user(content: &str) -> Self {
        Self {
            role: "user".to_string(),
            content: Value::String(content.to_string()),
        }
    }

    /// Flatten structured content into plain text. Array-of-parts content
    /// contributes each part's `text` field; anything else is serialized
    /// as JSON so no caller input is silently lost.
    pub fn text_content(&self) -> String {
        normalize_content(&self.content)
    }
}

pub fn normalize_content(content: &Value) -> String {
    match content {
        Value::String(s) => s.clone(),
        Value::Array(parts) => parts
            .iter()
            .map(|part| match part.get("text").and_then(|t| t.as_str()) {
                Some(text) => text.to_string(),
                None => part.to_string(),
            })
            .collect::<Vec<_>>()
            .join("\n"),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<Value>,
}

impl ChatCompletionRequest {
    /// Wrap a bare `/message` body as a single-turn conversation.
    pub fn from_message(message: &str, model: Option<String>, tools: Vec<Value>) -> Self {
        Self {
            model,
            messages: vec![ChatMessage::user(message)],
            tools,
        }
    }

    pub fn model_name(&self) -> &str {
        self.model.as_deref().unwrap_or(DEFAULT_MODEL)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatChoice {
    pub index: u32,
    pub message: AssistantMessage,
    pub finish_reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// The converted completion object callers ultimately receive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletion {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub model: String,
    pub choices: Vec<ChatChoice>,
    /// Token accounting is not tracked; always zeroed.
    pub usage: Usage,
}

impl ChatCompletion {
    pub fn from_text(model: &str, text: &str) -> Self {
        Self {
            id: format!("chatcmpl_{}", uuid::Uuid::new_v4().simple()),
            object: "chat.completion".to_string(),
            created: chrono::Utc::now().timestamp(),
            model: model.to_string(),
            choices: vec![ChatChoice {
                index: 0,
                message: AssistantMessage {
                    role: "assistant".to_string(),
                    content: text.to_string(),
                },
                finish_reason: "stop".to_string(),
            }],
            usage: Usage::default(),
        }
    }
}
