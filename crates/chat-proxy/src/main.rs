use std::path::{Path, PathBuf};

use anyhow::Context as _;
use env_flags::env_flags;
use once_cell::sync::OnceCell;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::{EnvFilter, Layer, Registry, prelude::*};

use chat_proxy::config::{
    self, ProviderSettings, ServerEnv, UserConfig, expand_home, load_user_config, non_empty,
};
use chat_proxy::handler::run_server;
use chat_proxy::modelmap::{self, ModelMap};
use chat_proxy::provider::ProviderId;

#[derive(Debug, Clone, Copy)]
enum LogStyle {
    Json,
    Compact,
    Pretty,
    Full,
}

fn env_set(key: &str) -> bool {
    std::env::var_os(key).is_some()
}

fn fmt_layer<W>(writer: W, ansi: bool, style: LogStyle) -> Box<dyn Layer<Registry> + Send + Sync>
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let base = tracing_subscriber::fmt::layer()
        .with_file(false)
        .with_line_number(false)
        .with_target(true)
        .with_ansi(ansi)
        .with_writer(writer);
    match style {
        LogStyle::Json => base.json().boxed(),
        LogStyle::Compact => base.compact().boxed(),
        LogStyle::Pretty => base.pretty().boxed(),
        LogStyle::Full => base.boxed(),
    }
}

fn init_tracing(home: &Path, user_cfg: Option<&UserConfig>) {
    env_flags! {
        /// EnvFilter directive; defaults to "info".
        RUST_LOG: &str = "info";
        /// Takes priority over RUST_LOG when non-empty.
        TRACING_FILTER: &str = "";
        /// Multi-line human output.
        TRACING_PRETTY: bool = false;
        /// One line per event. Checked before TRACING_PRETTY.
        TRACING_COMPACT: bool = true;
        /// Structured output; beats both text styles.
        TRACING_JSON: bool = false;
        /// Add a daily rolling log file next to stderr output.
        LOG_TO_FILE: bool = false;
        /// Directory for the log file; <PROXY_HOME>/logs when empty.
        LOG_DIR: &str = "";
    }

    // TRACING_FILTER wins over RUST_LOG; config only applies when neither is set.
    let mut rust_log = if !(*TRACING_FILTER).is_empty() {
        (*TRACING_FILTER).to_string()
    } else {
        (*RUST_LOG).to_string()
    };
    let mut tracing_json = *TRACING_JSON;
    let mut tracing_compact = *TRACING_COMPACT;
    let mut tracing_pretty = *TRACING_PRETTY;
    let mut log_to_file = *LOG_TO_FILE;
    let mut log_dir = non_empty(*LOG_DIR).map(PathBuf::from);

    if let Some(cfg) = user_cfg.and_then(|c| c.logging.as_ref()) {
        if !(env_set("TRACING_FILTER") || env_set("RUST_LOG"))
            && let Some(level) = cfg.level.as_ref()
        {
            rust_log = level.clone();
        }
        if !env_set("TRACING_JSON")
            && let Some(v) = cfg.json
        {
            tracing_json = v;
        }
        if !env_set("TRACING_COMPACT")
            && let Some(v) = cfg.compact
        {
            tracing_compact = v;
        }
        if !env_set("TRACING_PRETTY")
            && let Some(v) = cfg.pretty
        {
            tracing_pretty = v;
        }
        if !env_set("LOG_TO_FILE")
            && let Some(v) = cfg.to_file
        {
            log_to_file = v;
        }
        if !env_set("LOG_DIR")
            && let Some(dir) = cfg.dir.as_ref()
        {
            log_dir = Some(expand_home(dir));
        }
    }

    let style = if tracing_json {
        LogStyle::Json
    } else if tracing_compact {
        LogStyle::Compact
    } else if tracing_pretty {
        LogStyle::Pretty
    } else {
        LogStyle::Full
    };
    let filter = EnvFilter::try_new(rust_log).unwrap_or_else(|_| EnvFilter::new("info"));

    static FILE_GUARD: OnceCell<tracing_appender::non_blocking::WorkerGuard> = OnceCell::new();
    let mut layers = vec![fmt_layer(std::io::stderr, true, style)];
    let mut dir_error = None;
    if log_to_file {
        let dir = log_dir.unwrap_or_else(|| home.join("logs"));
        match std::fs::create_dir_all(&dir) {
            Ok(()) => {
                let appender = tracing_appender::rolling::daily(dir, "chat-proxy.log");
                let (nb, guard) = tracing_appender::non_blocking(appender);
                let _ = FILE_GUARD.set(guard);
                layers.push(fmt_layer(nb, false, style));
            }
            Err(e) => dir_error = Some((dir, e)),
        }
    }

    if let Err(e) = tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .try_init()
    {
        tracing::debug!("tracing already set: {:?}", e);
    }
    if let Some((dir, e)) = dir_error {
        tracing::warn!("failed to create log dir {}: {}", dir.display(), e);
    }
}

fn server_env() -> ServerEnv {
    env_flags! {
        /// Listen host; overrides `[server] host`.
        HOST: Option<&str> = None;
        /// Listen port; overrides `[server] port`.
        PORT: Option<u16> = None;
        /// Upstream request timeout in milliseconds, raised to 1000 if lower.
        UPSTREAM_TIMEOUT_MS: Option<u64> = None;
        /// Model map TOML; overrides `[server] model_map_file`.
        MODEL_MAP_FILE: Option<&str> = None;
    }

    ServerEnv {
        host: (*HOST).map(str::to_string),
        port: *PORT,
        upstream_timeout_ms: *UPSTREAM_TIMEOUT_MS,
        model_map_file: (*MODEL_MAP_FILE).map(str::to_string),
    }
}

fn provider_env() -> Vec<ProviderSettings> {
    env_flags! {
        /// Provider credentials. Unset or empty keys make that provider answer 500.
        GROQ_API_KEY: &str = "";
        COHERE_API_KEY: &str = "";
        GROQ_BASE_URL: &str = "https://api.groq.com";
        COHERE_BASE_URL: &str = "https://api.cohere.ai";
        /// Run replies through the markdown stripper.
        GROQ_STRIP_MARKDOWN: bool = true;
        COHERE_STRIP_MARKDOWN: bool = false;
    }

    vec![
        ProviderSettings {
            id: ProviderId::Groq,
            api_key: non_empty(*GROQ_API_KEY),
            base_url: (*GROQ_BASE_URL).to_string(),
            strip_markdown: *GROQ_STRIP_MARKDOWN,
        },
        ProviderSettings {
            id: ProviderId::Cohere,
            api_key: non_empty(*COHERE_API_KEY),
            base_url: (*COHERE_BASE_URL).to_string(),
            strip_markdown: *COHERE_STRIP_MARKDOWN,
        },
    ]
}

fn load_model_map(path: Option<&Path>) -> anyhow::Result<ModelMap> {
    match path {
        Some(p) => {
            tracing::info!("loading model map from {}", p.display());
            modelmap::load_from_file(p)
        }
        None => {
            tracing::debug!("no model map file; using built-in tables");
            modelmap::load_default().context("built-in model map is invalid")
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let home = config::proxy_home(
        std::env::var("PROXY_HOME").ok().as_deref(),
        std::env::var("HOME").ok().as_deref(),
    );
    // A broken config file should not stop the proxy; report it once logging is up.
    let (user_cfg, cfg_error) = match load_user_config(&home) {
        Ok(cfg) => (cfg, None),
        Err(e) => (None, Some(e)),
    };
    init_tracing(&home, user_cfg.as_ref());
    if let Some(e) = cfg_error {
        tracing::warn!("ignoring {}/config.toml: {:#}", home.display(), e);
    }

    tracing::info!("starting chat-proxy {}", env!("CARGO_PKG_VERSION"));
    tracing::info!("proxy_home={}", home.display());

    let env = server_env();
    let map_path = config::model_map_path(&home, &env, user_cfg.as_ref());
    let models = load_model_map(map_path.as_deref())?;
    let settings = config::resolve_settings(&env, user_cfg.as_ref(), provider_env());
    for p in &settings.providers {
        if p.api_key.is_none() {
            tracing::warn!(
                "{} is not set; {:?} will answer 500",
                p.id.api_key_env(),
                p.id.routes()
            );
        }
    }

    run_server(settings, models).await
}
