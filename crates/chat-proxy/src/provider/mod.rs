//! Upstream LLM providers: request construction and reply extraction.
//!
//! Each provider only knows its own wire format. Sending, status handling and
//! JSON decoding are shared by the default `complete` implementation so the
//! HTTP layer can treat every provider the same way.

pub mod cohere;
pub mod groq;
pub mod types;

pub use cohere::CohereProvider;
pub use groq::GroqProvider;
pub use types::*;

use async_trait::async_trait;
use serde_json::Value as JsonValue;

use crate::error::UpstreamError;

pub(crate) const MAX_TOKENS: u32 = 1000;
pub(crate) const TEMPERATURE: f64 = 0.7;

#[async_trait]
pub trait UpstreamProvider: Send + Sync {
    fn id(&self) -> ProviderId;

    /// Full URL of the chat endpoint.
    fn endpoint(&self) -> String;

    /// Provider-specific request body for an already-resolved model.
    fn request_body(&self, model: &str, messages: &[ChatMessage]) -> JsonValue;

    /// Reply text from a successful response, or empty when absent.
    fn extract_text(&self, response: &JsonValue) -> String;

    /// Send one chat request and return the raw reply text.
    ///
    /// Non-success statuses come back as `UpstreamError::Status` carrying the
    /// upstream body so callers can relay it.
    async fn complete(
        &self,
        client: &reqwest::Client,
        api_key: &str,
        model: &str,
        messages: &[ChatMessage],
    ) -> Result<String, UpstreamError> {
        let body = self.request_body(model, messages);
        let response = client
            .post(self.endpoint())
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(UpstreamError::Transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(UpstreamError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let data: JsonValue = response.json().await.map_err(UpstreamError::Decode)?;
        Ok(self.extract_text(&data))
    }
}

/// Build the provider implementation for `id` against `base_url`.
pub fn provider_for(id: ProviderId, base_url: &str) -> Box<dyn UpstreamProvider> {
    let base_url = base_url.trim().trim_end_matches('/').to_string();
    match id {
        ProviderId::Groq => Box::new(GroqProvider::new(base_url)),
        ProviderId::Cohere => Box::new(CohereProvider::new(base_url)),
    }
}
