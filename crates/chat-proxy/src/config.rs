use anyhow::Context as _;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::provider::ProviderId;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_UPSTREAM_TIMEOUT_MS: u64 = 30_000;
/// Looked up under the proxy home when no model map path is configured.
pub const MODEL_MAP_FILE_NAME: &str = "model-map.toml";

/// Optional `<PROXY_HOME>/config.toml`. Environment flags take precedence.
#[derive(Debug, Default, Deserialize)]
pub struct UserConfig {
    pub logging: Option<LoggingCfg>,
    pub server: Option<ServerCfg>,
}

/// `[logging]`: fallbacks for the tracing env flags of the same names.
#[derive(Debug, Default, Deserialize)]
pub struct LoggingCfg {
    pub to_file: Option<bool>,
    pub dir: Option<String>,
    pub json: Option<bool>,
    pub compact: Option<bool>,
    pub pretty: Option<bool>,
    /// Filter directive, used when neither TRACING_FILTER nor RUST_LOG is set.
    pub level: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ServerCfg {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub upstream_timeout_ms: Option<u64>,
    pub model_map_file: Option<String>,
}

/// Server values read from the environment. `None` means the variable is unset.
#[derive(Debug, Default, Clone)]
pub struct ServerEnv {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub upstream_timeout_ms: Option<u64>,
    pub model_map_file: Option<String>,
}

/// Fully resolved runtime settings for the proxy server.
#[derive(Debug, Clone)]
pub struct ProxySettings {
    pub host: String,
    pub port: u16,
    pub upstream_timeout_ms: u64,
    pub providers: Vec<ProviderSettings>,
}

#[derive(Debug, Clone)]
pub struct ProviderSettings {
    pub id: ProviderId,
    /// `None` when the key env var is unset or empty; requests then fail with 500.
    pub api_key: Option<String>,
    pub base_url: String,
    pub strip_markdown: bool,
}

impl ProviderSettings {
    /// Defaults for `id`: no key, public base URL, markdown stripping for Groq only.
    pub fn defaults(id: ProviderId) -> Self {
        Self {
            id,
            api_key: None,
            base_url: id.default_base_url().to_string(),
            strip_markdown: matches!(id, ProviderId::Groq),
        }
    }
}

pub fn load_user_config(home: &Path) -> anyhow::Result<Option<UserConfig>> {
    let path = home.join("config.toml");
    if !path.exists() {
        return Ok(None);
    }
    let raw = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let cfg = toml::from_str(&raw).with_context(|| format!("invalid {}", path.display()))?;
    Ok(Some(cfg))
}

/// `explicit` if non-empty, else `<user_home>/.chat-proxy`, else `./.chat-proxy`.
pub fn proxy_home(explicit: Option<&str>, user_home: Option<&str>) -> PathBuf {
    if let Some(dir) = explicit.and_then(non_empty) {
        return PathBuf::from(dir);
    }
    let base = match user_home.and_then(non_empty) {
        Some(home) => PathBuf::from(home),
        None => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    };
    base.join(".chat-proxy")
}

/// Environment, then `[server]` in config.toml, then built-in defaults.
pub fn resolve_settings(
    env: &ServerEnv,
    user_cfg: Option<&UserConfig>,
    providers: Vec<ProviderSettings>,
) -> ProxySettings {
    let server = user_cfg.and_then(|c| c.server.as_ref());
    let host = env
        .host
        .as_deref()
        .and_then(non_empty)
        .or_else(|| server.and_then(|s| s.host.as_deref()).and_then(non_empty))
        .unwrap_or_else(|| DEFAULT_HOST.to_string());
    let port = env
        .port
        .or_else(|| server.and_then(|s| s.port))
        .unwrap_or(DEFAULT_PORT);
    let upstream_timeout_ms = env
        .upstream_timeout_ms
        .or_else(|| server.and_then(|s| s.upstream_timeout_ms))
        .unwrap_or(DEFAULT_UPSTREAM_TIMEOUT_MS);

    ProxySettings {
        host,
        port,
        upstream_timeout_ms,
        providers,
    }
}

/// Model map to load: env path, then `server.model_map_file`, then
/// `<home>/model-map.toml` if that file exists. `None` means built-in tables.
pub fn model_map_path(
    home: &Path,
    env: &ServerEnv,
    user_cfg: Option<&UserConfig>,
) -> Option<PathBuf> {
    let configured = env.model_map_file.as_deref().and_then(non_empty).or_else(|| {
        user_cfg
            .and_then(|c| c.server.as_ref())
            .and_then(|s| s.model_map_file.as_deref())
            .and_then(non_empty)
    });
    if let Some(path) = configured {
        return Some(expand_home(&path));
    }
    let fallback = home.join(MODEL_MAP_FILE_NAME);
    fallback.exists().then_some(fallback)
}

pub fn expand_home(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/")
        && let Ok(home) = std::env::var("HOME")
    {
        return PathBuf::from(home).join(stripped);
    }
    PathBuf::from(path)
}

/// Non-empty, trimmed value or `None`.
pub fn non_empty(value: &str) -> Option<String> {
    let v = value.trim();
    if v.is_empty() { None } else { Some(v.to_string()) }
}
