//! HTTP routes that resolve the requested model and forward chats upstream.
//!
//! Every provider route follows the same steps: check the provider key, parse
//! the JSON body, resolve `model` against that provider's model map, validate
//! `messages`, call the provider and reply with the normalized payload. Errors
//! are rendered by `ProxyError`.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{MethodRouter, get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{Value as JsonValue, json};
use tokio::net::TcpListener;
use tracing::Instrument as _;

use crate::config::{ProviderSettings, ProxySettings};
use crate::error::{ProxyError, UpstreamError};
use crate::markdown;
use crate::modelmap::{ModelMap, ModelResolver, Resolution};
use crate::provider::{ChatMessage, ProviderId, UpstreamProvider, provider_for};

const HEALTH_ENDPOINT: &str = "/api/health";

/// Successful chat reply as consumed by the browser client.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatReply {
    pub text: String,
    pub model: String,
    /// Raw `model` value from the request, `null` when absent.
    pub requested_model: JsonValue,
    pub normalized_from: Option<String>,
    pub model_resolution: Resolution,
}

/// Everything one provider route needs to serve a request.
pub struct ProviderRoute {
    provider: Box<dyn UpstreamProvider>,
    resolver: ModelResolver,
    api_key: Option<String>,
    strip_markdown: bool,
}

impl ProviderRoute {
    fn new(settings: &ProviderSettings, resolver: ModelResolver) -> Self {
        Self {
            provider: provider_for(settings.id, &settings.base_url),
            resolver,
            api_key: settings.api_key.clone(),
            strip_markdown: settings.strip_markdown,
        }
    }
}

pub struct AppState {
    client: reqwest::Client,
    groq: ProviderRoute,
    cohere: ProviderRoute,
}

impl AppState {
    pub fn new(settings: &ProxySettings, models: ModelMap) -> anyhow::Result<Self> {
        let timeout = Duration::from_millis(settings.upstream_timeout_ms.max(1_000));
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to construct upstream http client")?;

        let provider_settings = |id: ProviderId| {
            settings
                .providers
                .iter()
                .find(|p| p.id == id)
                .cloned()
                .unwrap_or_else(|| ProviderSettings::defaults(id))
        };
        let ModelMap { groq, cohere } = models;
        Ok(Self {
            client,
            groq: ProviderRoute::new(&provider_settings(ProviderId::Groq), groq),
            cohere: ProviderRoute::new(&provider_settings(ProviderId::Cohere), cohere),
        })
    }

    fn route(&self, provider: ProviderId) -> &ProviderRoute {
        match provider {
            ProviderId::Groq => &self.groq,
            ProviderId::Cohere => &self.cohere,
        }
    }
}

/// Bind and serve until ctrl-c.
pub async fn run_server(settings: ProxySettings, models: ModelMap) -> anyhow::Result<()> {
    let state = Arc::new(AppState::new(&settings, models)?);

    let listener = TcpListener::bind((settings.host.as_str(), settings.port))
        .await
        .with_context(|| {
            format!(
                "failed to bind chat proxy on {}:{}",
                settings.host, settings.port
            )
        })?;
    let local_addr = listener
        .local_addr()
        .context("failed to resolve chat proxy listen address")?;
    for p in ProviderId::ALL {
        let route = state.route(p);
        tracing::info!(
            "provider {}: routes={:?}, default_model={}, key_configured={}, strip_markdown={}",
            p,
            p.routes(),
            route.resolver.default_model(),
            route.api_key.is_some(),
            route.strip_markdown
        );
    }
    tracing::info!("chat proxy listening on {}", local_addr);

    let app = build_router(state);
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .context("chat proxy server exited unexpectedly")?;
    tracing::info!("server stopped");
    Ok(())
}

pub fn build_router(state: Arc<AppState>) -> Router {
    let mut router = Router::new().route(HEALTH_ENDPOINT, get(handle_health));
    for p in ProviderId::ALL {
        for path in p.routes() {
            router = router.route(path, chat_route(p, p.route_label(path)));
        }
    }
    router.with_state(state)
}

fn chat_route(provider: ProviderId, label: &'static str) -> MethodRouter<Arc<AppState>> {
    post(move |State(state): State<Arc<AppState>>, body: Bytes| async move {
        handle_chat(&state, provider, label, &body).await
    })
    .fallback(handle_method_not_allowed)
}

async fn handle_method_not_allowed() -> Response {
    ProxyError::MethodNotAllowed.into_response()
}

async fn handle_health(State(state): State<Arc<AppState>>) -> Json<JsonValue> {
    let providers: Vec<JsonValue> = ProviderId::ALL
        .into_iter()
        .map(|p| {
            let route = state.route(p);
            json!({
                "name": p.as_str(),
                "routes": p.routes(),
                "default_model": route.resolver.default_model(),
                "models": route.resolver.catalog(),
                "configured": route.api_key.is_some(),
            })
        })
        .collect();
    Json(json!({ "status": "ready", "providers": providers }))
}

async fn handle_chat(
    state: &AppState,
    provider: ProviderId,
    label: &'static str,
    body: &[u8],
) -> Response {
    let request_id = uuid::Uuid::new_v4();
    let span = tracing::info_span!("chat", request_id = %request_id, provider = %provider);
    match forward_chat(state, provider, label, body).instrument(span).await {
        Ok(reply) => (StatusCode::OK, Json(reply)).into_response(),
        Err(err) => err.into_response(),
    }
}

async fn forward_chat(
    state: &AppState,
    provider: ProviderId,
    label: &'static str,
    body: &[u8],
) -> Result<ChatReply, ProxyError> {
    let route = state.route(provider);
    let Some(api_key) = route.api_key.as_deref() else {
        tracing::error!("{} is not set; rejecting request", provider.api_key_env());
        return Err(ProxyError::MissingApiKey(provider.api_key_env()));
    };

    let payload = parse_body(body)?;
    let requested_model = payload.get("model").cloned().unwrap_or(JsonValue::Null);
    let resolved = route.resolver.resolve(requested_model.as_str());
    let messages = parse_messages(&payload)?;

    if resolved.resolution == Resolution::Fallback {
        tracing::warn!(
            "model fallback applied: requested={:?} -> using={:?}",
            resolved.original.as_deref().unwrap_or_default(),
            resolved.model
        );
    } else {
        tracing::debug!(
            "model resolved: {:?} -> {} ({})",
            resolved.original,
            resolved.model,
            resolved.resolution
        );
    }

    let raw = route
        .provider
        .complete(&state.client, api_key, &resolved.model, &messages)
        .await
        .map_err(|err| match err {
            UpstreamError::Status { status, body } => {
                tracing::warn!("{} upstream returned status {}", route.provider.id(), status);
                ProxyError::UpstreamStatus {
                    status: StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY),
                    body,
                }
            }
            other => {
                tracing::error!("{} proxy error: {}", label, other);
                ProxyError::Upstream(label)
            }
        })?;

    let text = if route.strip_markdown {
        markdown::strip(&raw)
    } else {
        raw.trim().to_string()
    };
    tracing::info!(
        model = %resolved.model,
        resolution = %resolved.resolution,
        messages = messages.len(),
        chars = text.chars().count(),
        "chat completed"
    );

    Ok(ChatReply {
        text,
        model: resolved.model,
        requested_model,
        normalized_from: resolved.original,
        model_resolution: resolved.resolution,
    })
}

/// Empty bodies count as `{}`; anything else must be valid JSON.
fn parse_body(body: &[u8]) -> Result<JsonValue, ProxyError> {
    if body.is_empty() {
        return Ok(json!({}));
    }
    serde_json::from_slice(body).map_err(|e| {
        tracing::debug!("rejecting request body: {}", e);
        ProxyError::InvalidJson
    })
}

fn parse_messages(payload: &JsonValue) -> Result<Vec<ChatMessage>, ProxyError> {
    let items = payload
        .get("messages")
        .and_then(JsonValue::as_array)
        .filter(|items| !items.is_empty())
        .ok_or(ProxyError::MissingMessages)?;
    items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            ChatMessage::deserialize(item).map_err(|e| {
                tracing::debug!("messages[{}] rejected: {}", i, e);
                ProxyError::InvalidMessage(i)
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modelmap::load_default;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use axum::http::header::ALLOW;
    use httpmock::Method::POST;
    use httpmock::MockServer;
    use tower::ServiceExt;

    fn settings(base_url: &str, groq_key: Option<&str>) -> ProxySettings {
        let provider = |id: ProviderId, key: Option<&str>| ProviderSettings {
            base_url: base_url.to_string(),
            api_key: key.map(str::to_string),
            ..ProviderSettings::defaults(id)
        };
        ProxySettings {
            host: "127.0.0.1".to_string(),
            port: 0,
            upstream_timeout_ms: 5_000,
            providers: vec![
                provider(ProviderId::Groq, groq_key),
                provider(ProviderId::Cohere, Some("co-test")),
            ],
        }
    }

    fn app(base_url: &str, groq_key: Option<&str>) -> Router {
        let models = load_default().expect("built-in model map");
        let state = AppState::new(&settings(base_url, groq_key), models).expect("state");
        build_router(Arc::new(state))
    }

    async fn send(app: Router, method: &str, path: &str, body: &str) -> (StatusCode, JsonValue) {
        let request = Request::builder()
            .method(method)
            .uri(path)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .expect("request");
        let response = app.oneshot(request).await.expect("response");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");
        let parsed = if bytes.is_empty() {
            JsonValue::Null
        } else {
            serde_json::from_slice(&bytes).expect("json body")
        };
        (status, parsed)
    }

    #[tokio::test]
    async fn groq_route_resolves_alias_and_strips_markdown() {
        let upstream = MockServer::start_async().await;
        let mock = upstream.mock(|when, then| {
            when.method(POST)
                .path("/openai/v1/chat/completions")
                .header("authorization", "Bearer gsk-test")
                .body_includes("\"model\":\"llama-3.1-70b-versatile\"");
            then.status(200).json_body(json!({
                "choices": [{"message": {"content": "## Raptors\n\n\n**Fast** and `smart`."}}]
            }));
        });

        let (status, body) = send(
            app(&upstream.base_url(), Some("gsk-test")),
            "POST",
            "/api/groq",
            r#"{"model":" gemini-1.5-pro ","messages":[{"role":"user","content":"hi"}]}"#,
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["text"], "Raptors\nFast and smart.");
        assert_eq!(body["model"], "llama-3.1-70b-versatile");
        assert_eq!(body["requestedModel"], " gemini-1.5-pro ");
        assert_eq!(body["normalizedFrom"], "gemini-1.5-pro");
        assert_eq!(body["modelResolution"], "alias");
        mock.assert();
    }

    #[tokio::test]
    async fn gemini_route_is_served_by_cohere_without_stripping() {
        let upstream = MockServer::start_async().await;
        let mock = upstream.mock(|when, then| {
            when.method(POST)
                .path("/v1/chat")
                .header("authorization", "Bearer co-test")
                .body_includes("\"message\":\"and now?\"")
                .body_includes("\"role\":\"CHATBOT\"");
            then.status(200)
                .json_body(json!({ "text": "  **still bold**  " }));
        });

        let (status, body) = send(
            app(&upstream.base_url(), Some("gsk-test")),
            "POST",
            "/api/gemini",
            r#"{"messages":[{"role":"assistant","content":"Hello"},{"role":"user","content":"and now?"}]}"#,
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["text"], "**still bold**");
        assert_eq!(body["model"], "command-light");
        assert_eq!(body["requestedModel"], JsonValue::Null);
        assert_eq!(body["normalizedFrom"], JsonValue::Null);
        assert_eq!(body["modelResolution"], "default");
        mock.assert();
    }

    #[tokio::test]
    async fn unknown_and_non_string_models_fall_back_to_default() {
        let upstream = MockServer::start_async().await;
        upstream.mock(|when, then| {
            when.method(POST).path("/v1/chat");
            then.status(200).json_body(json!({ "text": "ok" }));
        });

        let (status, body) = send(
            app(&upstream.base_url(), Some("gsk-test")),
            "POST",
            "/api/cohere",
            r#"{"model":"gpt-4o","messages":[{"role":"user","content":"hi"}]}"#,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["model"], "command-light");
        assert_eq!(body["modelResolution"], "fallback");
        assert_eq!(body["normalizedFrom"], "gpt-4o");

        let (_, body) = send(
            app(&upstream.base_url(), Some("gsk-test")),
            "POST",
            "/api/cohere",
            r#"{"model":42,"messages":[{"role":"user","content":"hi"}]}"#,
        )
        .await;
        assert_eq!(body["modelResolution"], "default");
        assert_eq!(body["requestedModel"], 42);
        assert_eq!(body["normalizedFrom"], JsonValue::Null);
    }

    #[tokio::test]
    async fn missing_api_key_is_a_server_error() {
        let upstream = MockServer::start_async().await;
        let (status, body) = send(
            app(&upstream.base_url(), None),
            "POST",
            "/api/groq",
            "not json",
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Missing GROQ_API_KEY environment variable");
    }

    #[tokio::test]
    async fn malformed_requests_are_rejected() {
        let upstream = MockServer::start_async().await;
        let base = upstream.base_url();
        let cases = [
            ("{not json", "Invalid JSON payload"),
            ("", "Payload must include messages array"),
            (r#"{"model":"command"}"#, "Payload must include messages array"),
            (r#"{"messages":[]}"#, "Payload must include messages array"),
            (r#"{"messages":"hi"}"#, "Payload must include messages array"),
            (r#"[1,2]"#, "Payload must include messages array"),
            (
                r#"{"messages":[{"role":"user","content":"a"},{"role":"user"}]}"#,
                "Invalid messages entry at index 1",
            ),
        ];
        for (input, expected) in cases {
            let (status, body) =
                send(app(&base, Some("gsk-test")), "POST", "/api/cohere", input).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "input {input:?}");
            assert_eq!(body["error"], expected, "input {input:?}");
        }
    }

    #[tokio::test]
    async fn upstream_failure_status_is_relayed() {
        let upstream = MockServer::start_async().await;
        upstream.mock(|when, then| {
            when.method(POST).path("/openai/v1/chat/completions");
            then.status(503).body("model overloaded");
        });
        upstream.mock(|when, then| {
            when.method(POST).path("/v1/chat");
            then.status(401);
        });
        let base = upstream.base_url();
        let msg = r#"{"messages":[{"role":"user","content":"hi"}]}"#;

        let (status, body) = send(app(&base, Some("gsk-test")), "POST", "/api/groq", msg).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"], "model overloaded");

        let (status, body) = send(app(&base, Some("gsk-test")), "POST", "/api/cohere", msg).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Upstream error");
    }

    #[tokio::test]
    async fn unreachable_upstream_is_a_proxy_error() {
        // Port 9 (discard) is not listening on test hosts.
        let (status, body) = send(
            app("http://127.0.0.1:9", Some("gsk-test")),
            "POST",
            "/api/groq",
            r#"{"messages":[{"role":"user","content":"hi"}]}"#,
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Groq proxy error");

        let msg = r#"{"messages":[{"role":"user","content":"hi"}]}"#;
        for (path, expected) in [
            ("/api/cohere", "Cohere proxy error"),
            ("/api/gemini", "Gemini proxy error"),
        ] {
            let router = app("http://127.0.0.1:9", Some("gsk-test"));
            let (status, body) = send(router, "POST", path, msg).await;
            assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR, "{path}");
            assert_eq!(body["error"], expected, "{path}");
        }
    }

    #[tokio::test]
    async fn non_post_is_method_not_allowed() {
        let request = Request::builder()
            .method("GET")
            .uri("/api/groq")
            .body(Body::empty())
            .expect("request");
        let response = app("http://127.0.0.1:9", Some("gsk-test"))
            .oneshot(request)
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.headers()[ALLOW], "POST");
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: JsonValue = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"], "Method Not Allowed");
    }

    #[tokio::test]
    async fn health_lists_providers() {
        let (status, body) = send(app("http://127.0.0.1:9", None), "GET", "/api/health", "").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ready");
        let providers = body["providers"].as_array().expect("providers");
        assert_eq!(providers.len(), 2);
        assert_eq!(providers[0]["name"], "groq");
        assert_eq!(providers[0]["default_model"], "llama-3.1-8b-instant");
        assert_eq!(providers[0]["configured"], false);
        assert_eq!(providers[1]["routes"], json!(["/api/cohere", "/api/gemini"]));
    }
}
