//! Cohere v1 chat: the last message is the prompt, earlier ones are history.

use serde_json::{Value as JsonValue, json};

use super::{ChatMessage, MAX_TOKENS, ProviderId, TEMPERATURE, UpstreamProvider};

pub struct CohereProvider {
    base_url: String,
}

impl CohereProvider {
    pub fn new(base_url: String) -> Self {
        Self { base_url }
    }
}

fn history_role(role: &str) -> &'static str {
    if role == "user" { "USER" } else { "CHATBOT" }
}

impl UpstreamProvider for CohereProvider {
    fn id(&self) -> ProviderId {
        ProviderId::Cohere
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/chat", self.base_url)
    }

    fn request_body(&self, model: &str, messages: &[ChatMessage]) -> JsonValue {
        let (message, history) = match messages.split_last() {
            Some((last, rest)) => (last.content.as_str(), rest),
            None => ("", messages),
        };
        let chat_history: Vec<JsonValue> = history
            .iter()
            .map(|m| json!({ "role": history_role(&m.role), "message": m.content }))
            .collect();
        json!({
            "model": model,
            "message": message,
            "max_tokens": MAX_TOKENS,
            "temperature": TEMPERATURE,
            "chat_history": chat_history,
        })
    }

    fn extract_text(&self, response: &JsonValue) -> String {
        ["text", "message"]
            .iter()
            .filter_map(|k| response.get(*k).and_then(JsonValue::as_str))
            .find(|s| !s.is_empty())
            .unwrap_or_default()
            .to_string()
    }
}
