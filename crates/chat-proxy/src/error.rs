//! Errors surfaced by the HTTP layer and the upstream clients.

use axum::Json;
use axum::http::StatusCode;
use axum::http::header::ALLOW;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// Failure talking to an upstream provider.
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("upstream returned status {status}")]
    Status { status: u16, body: String },
    #[error("upstream request failed: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("upstream response was not valid JSON: {0}")]
    Decode(#[source] reqwest::Error),
}

/// Client-visible proxy errors. Each renders as `{ "error": message }`.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("Method Not Allowed")]
    MethodNotAllowed,
    #[error("Missing {0} environment variable")]
    MissingApiKey(&'static str),
    #[error("Invalid JSON payload")]
    InvalidJson,
    #[error("Payload must include messages array")]
    MissingMessages,
    #[error("Invalid messages entry at index {0}")]
    InvalidMessage(usize),
    #[error("{}", upstream_message(.body))]
    UpstreamStatus { status: StatusCode, body: String },
    #[error("{0} proxy error")]
    Upstream(&'static str),
}

/// Upstream body verbatim; only an empty body gets the placeholder.
fn upstream_message(body: &str) -> &str {
    if body.is_empty() {
        "Upstream error"
    } else {
        body
    }
}

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ProxyError::MissingApiKey(_) | ProxyError::Upstream(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ProxyError::InvalidJson
            | ProxyError::MissingMessages
            | ProxyError::InvalidMessage(_) => StatusCode::BAD_REQUEST,
            ProxyError::UpstreamStatus { status, .. } => *status,
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(json!({ "error": self.to_string() }));
        if matches!(self, ProxyError::MethodNotAllowed) {
            return (status, [(ALLOW, "POST")], body).into_response();
        }
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_status_uses_body_or_placeholder() {
        let e = ProxyError::UpstreamStatus {
            status: StatusCode::TOO_MANY_REQUESTS,
            body: "rate limited".into(),
        };
        assert_eq!(e.to_string(), "rate limited");
        assert_eq!(e.status(), StatusCode::TOO_MANY_REQUESTS);

        let e = ProxyError::UpstreamStatus {
            status: StatusCode::BAD_GATEWAY,
            body: String::new(),
        };
        assert_eq!(e.to_string(), "Upstream error");
    }

    #[test]
    fn whitespace_upstream_body_is_relayed_verbatim() {
        let e = ProxyError::UpstreamStatus {
            status: StatusCode::BAD_GATEWAY,
            body: "  ".into(),
        };
        assert_eq!(e.to_string(), "  ");
        assert_eq!(e.status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn messages_match_client_contract() {
        assert_eq!(
            ProxyError::MissingApiKey("GROQ_API_KEY").to_string(),
            "Missing GROQ_API_KEY environment variable"
        );
        assert_eq!(ProxyError::Upstream("Groq").to_string(), "Groq proxy error");
        assert_eq!(
            ProxyError::MethodNotAllowed.into_response().headers()[ALLOW],
            "POST"
        );
    }
}
