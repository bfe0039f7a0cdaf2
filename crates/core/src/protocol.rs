//! The envelope exchanged over the downstream channel.
//!
//! This is the only wire object. Envelopes are immutable once sent and the
//! relay never retransmits one; correlation ids bind exactly one outbound
//! request to its eventual reply.

use serde::{Deserialize, Serialize};

use crate::chat::{ChatCompletion, ChatCompletionRequest};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Envelope {
    #[serde(rename = "request")]
    Request {
        #[serde(rename = "correlationId")]
        correlation_id: String,
        request: ChatCompletionRequest,
    },
    #[serde(rename = "response")]
    Response {
        #[serde(rename = "correlationId")]
        correlation_id: String,
        response: ChatCompletion,
    },
    #[serde(rename = "error")]
    Error {
        #[serde(rename = "correlationId")]
        correlation_id: String,
        error: String,
    },
}

impl Envelope {
    pub fn correlation_id(&self) -> &str {
        match self {
            Envelope::Request { correlation_id, .. }
            | Envelope::Response { correlation_id, .. }
            | Envelope::Error { correlation_id, .. } => correlation_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::ChatMessage;

    #[test]
    fn request_envelope_wire_shape() {
        let envelope = Envelope::Request {
            correlation_id: "abc-123".to_string(),
            request: ChatCompletionRequest {
                model: None,
                messages: vec![ChatMessage::user("hi")],
                tools: vec![],
            },
        };
        let raw = serde_json::to_value(&envelope).unwrap();
        assert_eq!(raw["type"], "request");
        assert_eq!(raw["correlationId"], "abc-123");
        assert_eq!(raw["request"]["messages"][0]["content"], "hi");
    }

    #[test]
    fn response_envelope_round_trip() {
        let raw = r#"{
            "type": "response",
            "correlationId": "x",
            "response": {
                "id": "chatcmpl_1", "object": "chat.completion", "created": 0,
                "model": "gemini-web-ui",
                "choices": [{ "index": 0, "finish_reason": "stop",
                              "message": { "role": "assistant", "content": "Hi there" } }],
                "usage": { "prompt_tokens": 0, "completion_tokens": 0, "total_tokens": 0 }
            }
        }"#;
        let envelope: Envelope = serde_json::from_str(raw).unwrap();
        match envelope {
            Envelope::Response { correlation_id, response } => {
                assert_eq!(correlation_id, "x");
                assert_eq!(response.choices[0].message.content, "Hi there");
            }
            other => panic!("unexpected envelope: {:?}", other),
        }
    }

    #[test]
    fn error_envelope_round_trip() {
        let envelope = Envelope::Error {
            correlation_id: "y".to_string(),
            error: "Element not found: textarea".to_string(),
        };
        let raw = serde_json::to_string(&envelope).unwrap();
        let back: Envelope = serde_json::from_str(&raw).unwrap();
        assert_eq!(back.correlation_id(), "y");
    }

    #[test]
    fn unknown_type_fails_to_parse() {
        let raw = r#"{ "type": "ping", "correlationId": "z" }"#;
        assert!(serde_json::from_str::<Envelope>(raw).is_err());
    }
}
