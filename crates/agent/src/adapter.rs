//! Flattens an OpenAI-style conversation into one prompt for the web UI.
//!
//! The UI accepts a single text box, so the whole conversation is rendered
//! as `ROLE: content` lines under a fixed instruction block. Tool
//! definitions, when present, are appended as pretty-printed JSON so the
//! model can echo machine-readable calls back.

use teleport_core::chat::ChatCompletionRequest;

const SYSTEM_RULES: &str = "\
SYSTEM RULES:
- Your response must be short and concise, with no prose and colourful responses.
- You can control local resources via tool calls when needed.
- If using tools, include them only after a literal heading: \"tools section\".
- Keep tool calls machine-readable JSON.

CONVERSATION:";

pub fn build_prompt(request: &ChatCompletionRequest) -> String {
    let conversation = request
        .messages
        .iter()
        .map(|m| format!("{}: {}", m.role.to_uppercase(), m.text_content()))
        .collect::<Vec<_>>()
        .join("\n");

    let mut prompt = format!("{}\n{}", SYSTEM_RULES, conversation);

    if !request.tools.is_empty() {
        let tools = serde_json::to_string_pretty(&request.tools).unwrap_or_default();
        prompt.push_str("\n\nAVAILABLE TOOLS:\n");
        prompt.push_str(&tools);
    }

    prompt
}
