//! Groq OpenAI-compatible chat completions.

use serde_json::{Value as JsonValue, json};

use super::{ChatMessage, MAX_TOKENS, ProviderId, TEMPERATURE, UpstreamProvider};

pub struct GroqProvider {
    base_url: String,
}

impl GroqProvider {
    pub fn new(base_url: String) -> Self {
        Self { base_url }
    }
}

impl UpstreamProvider for GroqProvider {
    fn id(&self) -> ProviderId {
        ProviderId::Groq
    }

    fn endpoint(&self) -> String {
        format!("{}/openai/v1/chat/completions", self.base_url)
    }

    fn request_body(&self, model: &str, messages: &[ChatMessage]) -> JsonValue {
        json!({
            "model": model,
            "messages": messages,
            "max_tokens": MAX_TOKENS,
            "temperature": TEMPERATURE,
        })
    }

    fn extract_text(&self, response: &JsonValue) -> String {
        response
            .pointer("/choices/0/message/content")
            .and_then(JsonValue::as_str)
            .unwrap_or_default()
            .to_string()
    }
}
