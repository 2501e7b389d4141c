//! Configuration loading with env-var overrides.
//!
//! Reads `config/default.toml` (or the path given with `-f`), then applies
//! `RAGBOT_LOG_LEVEL`, `RAGBOT_API_URL` and `RAGBOT_API_PORT` env overrides.
//! Secrets (`LLM_API_KEY`, `TELEGRAM_BOT_TOKEN`) are only ever read from the
//! environment.

use std::{
    env,
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::Deserialize;

use crate::error::AppError;
use crate::mediator::RagRoute;

const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Remote API (API mode) configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Whether a remote session should be offered to the mediator.
    pub enabled: bool,
    /// Scheme + host, e.g. `http://127.0.0.1`.
    pub url: String,
    /// Appended to `url` as `:{port}` when set.
    pub port: Option<u16>,
    /// Per-request HTTP timeout in seconds.
    pub timeout_seconds: u64,
    pub rag_route: RagRoute,
}

impl ApiConfig {
    /// The base URL every API path is joined onto.
    pub fn base_url(&self) -> String {
        let url = self.url.trim_end_matches('/');
        match self.port {
            Some(port) => format!("{url}:{port}"),
            None => url.to_string(),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

/// In-process (LOCAL mode) backend configuration.
#[derive(Debug, Clone)]
pub struct LocalConfig {
    /// Whether the in-process generation + retrieval backend is built.
    pub enabled: bool,
    /// Maximum history entries kept per user (FIFO).
    pub history_cap: Option<usize>,
    /// Directory of `.md` / `.txt` reference documents for RAG.
    /// Without it, LOCAL mode runs with no vector store.
    pub docs_dir: Option<PathBuf>,
    /// Maximum characters per indexed chunk.
    pub chunk_size: usize,
    /// Passages retrieved per RAG question.
    pub top_k: usize,
    /// Optional system prompt prepended to every generation request.
    pub system_prompt: Option<String>,
}

/// OpenAI / OpenAI-compatible provider configuration.
/// Populated from `[llm.openai]` in the TOML.
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    /// Full chat completions endpoint URL.
    pub api_base_url: String,
    /// Model name passed in the request body.
    pub model: String,
    /// Sampling temperature (ignored for models that forbid it).
    pub temperature: f32,
    /// Per-request HTTP timeout in seconds.
    pub timeout_seconds: u64,
}

/// LLM configuration for the local backend.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Which provider is active (`"dummy"`, `"openai"`).
    /// Maps to `default` in `[llm]` TOML.
    pub provider: String,
    pub openai: OpenAiConfig,
}

#[derive(Debug, Clone)]
pub struct PtyConfig {
    pub enabled: bool,
}

#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub enabled: bool,
}

#[derive(Debug, Clone)]
pub struct CommsConfig {
    pub pty: PtyConfig,
    pub telegram: TelegramConfig,
}

/// Fully-resolved configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub bot_name: String,
    pub log_level: String,
    pub api: ApiConfig,
    pub local: LocalConfig,
    pub llm: LlmConfig,
    pub comms: CommsConfig,
    /// API key from `LLM_API_KEY`, `None` for keyless local models.
    pub llm_api_key: Option<String>,
}

impl Config {
    pub fn comms_pty_should_load(&self) -> bool {
        self.comms.pty.enabled
    }

    pub fn comms_telegram_should_load(&self) -> bool {
        self.comms.telegram.enabled
    }
}

/// Env-sourced overrides. Tests build this directly instead of mutating
/// the process environment.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub log_level: Option<String>,
    pub api_url: Option<String>,
    pub api_port: Option<String>,
    pub llm_api_key: Option<String>,
}

impl Overrides {
    pub fn from_env() -> Self {
        Self {
            log_level: env::var("RAGBOT_LOG_LEVEL").ok(),
            api_url: env::var("RAGBOT_API_URL").ok(),
            api_port: env::var("RAGBOT_API_PORT").ok(),
            llm_api_key: env::var("LLM_API_KEY").ok(),
        }
    }
}

// ── Raw TOML shape ────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct RawConfig {
    #[serde(default)]
    bot: RawBot,
    #[serde(default)]
    api: RawApi,
    #[serde(default)]
    local: RawLocal,
    #[serde(default)]
    llm: RawLlm,
    #[serde(default)]
    comms: RawComms,
}

#[derive(Deserialize)]
struct RawBot {
    #[serde(default = "default_bot_name")]
    name: String,
    #[serde(default = "default_log_level")]
    log_level: String,
}

impl Default for RawBot {
    fn default() -> Self {
        Self { name: default_bot_name(), log_level: default_log_level() }
    }
}

#[derive(Deserialize)]
struct RawApi {
    /// Defaults to `true`: the remote API is the fallback backend.
    #[serde(default = "default_true")]
    enabled: bool,
    #[serde(default = "default_api_url")]
    url: String,
    #[serde(default)]
    port: Option<u16>,
    #[serde(default = "default_api_timeout_seconds")]
    timeout_seconds: u64,
    #[serde(default)]
    rag_route: RagRoute,
}

impl Default for RawApi {
    fn default() -> Self {
        Self {
            enabled: true,
            url: default_api_url(),
            port: None,
            timeout_seconds: default_api_timeout_seconds(),
            rag_route: RagRoute::default(),
        }
    }
}

#[derive(Deserialize)]
struct RawLocal {
    /// Defaults to `false`: the local backend must be explicitly enabled.
    #[serde(default = "default_false")]
    enabled: bool,
    #[serde(default)]
    history_cap: Option<usize>,
    #[serde(default)]
    docs_dir: Option<String>,
    #[serde(default = "default_chunk_size")]
    chunk_size: usize,
    #[serde(default = "default_top_k")]
    top_k: usize,
    #[serde(default)]
    system_prompt: Option<String>,
}

impl Default for RawLocal {
    fn default() -> Self {
        Self {
            enabled: false,
            history_cap: None,
            docs_dir: None,
            chunk_size: default_chunk_size(),
            top_k: default_top_k(),
            system_prompt: None,
        }
    }
}

#[derive(Deserialize)]
struct RawLlm {
    /// Maps to `default = "..."` in `[llm]`.
    #[serde(rename = "default", default = "default_llm_provider")]
    provider: String,
    #[serde(default)]
    openai: RawOpenAiConfig,
}

impl Default for RawLlm {
    fn default() -> Self {
        Self { provider: default_llm_provider(), openai: RawOpenAiConfig::default() }
    }
}

#[derive(Deserialize)]
struct RawOpenAiConfig {
    #[serde(default = "default_openai_api_base_url")]
    api_base_url: String,
    #[serde(default = "default_openai_model")]
    model: String,
    #[serde(default = "default_openai_temperature")]
    temperature: f32,
    #[serde(default = "default_openai_timeout_seconds")]
    timeout_seconds: u64,
}

impl Default for RawOpenAiConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_openai_api_base_url(),
            model: default_openai_model(),
            temperature: default_openai_temperature(),
            timeout_seconds: default_openai_timeout_seconds(),
        }
    }
}

#[derive(Deserialize, Default)]
struct RawComms {
    #[serde(default)]
    pty: RawPty,
    #[serde(default)]
    telegram: RawTelegram,
}

#[derive(Deserialize)]
struct RawPty {
    #[serde(default = "default_true")]
    enabled: bool,
}

impl Default for RawPty {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Deserialize, Default)]
struct RawTelegram {
    #[serde(default = "default_false")]
    enabled: bool,
}

fn default_bot_name() -> String { "ragbot".to_string() }
fn default_log_level() -> String { "info".to_string() }
fn default_api_url() -> String { "http://127.0.0.1".to_string() }
fn default_api_timeout_seconds() -> u64 { 15 }
fn default_chunk_size() -> usize { 1000 }
fn default_top_k() -> usize { 5 }
fn default_llm_provider() -> String { "dummy".to_string() }
fn default_openai_api_base_url() -> String { "https://api.openai.com/v1/chat/completions".to_string() }
fn default_openai_model() -> String { "gpt-4o-mini".to_string() }
fn default_openai_temperature() -> f32 { 0.2 }
fn default_openai_timeout_seconds() -> u64 { 60 }

fn default_true() -> bool {
    true
}

fn default_false() -> bool {
    false
}

// ── Loading ───────────────────────────────────────────────────────────────────

/// Load config from `path` (default `config/default.toml`), then apply
/// env-var overrides.
pub fn load(path: Option<&str>) -> Result<Config, AppError> {
    let path = Path::new(path.unwrap_or(DEFAULT_CONFIG_PATH));
    load_from(path, &Overrides::from_env())
}

/// Internal loader — accepts an explicit path and overrides.
pub fn load_from(path: &Path, overrides: &Overrides) -> Result<Config, AppError> {
    let raw = fs::read_to_string(path)
        .map_err(|e| AppError::Config(format!("cannot read {}: {e}", path.display())))?;
    parse(&raw, overrides)
        .map_err(|e| match e {
            AppError::Config(msg) => AppError::Config(format!("{msg} in {}", path.display())),
            other => other,
        })
}

fn parse(raw: &str, overrides: &Overrides) -> Result<Config, AppError> {
    let parsed: RawConfig = toml::from_str(raw)
        .map_err(|e| AppError::Config(format!("parse error: {e}")))?;

    let port = match overrides.api_port.as_deref() {
        Some(p) => Some(
            p.trim()
                .parse::<u16>()
                .map_err(|e| AppError::Config(format!("invalid RAGBOT_API_PORT '{p}': {e}")))?,
        ),
        None => parsed.api.port,
    };

    if parsed.api.timeout_seconds == 0 {
        return Err(AppError::Config("api.timeout_seconds must be > 0".into()));
    }
    if parsed.local.chunk_size == 0 {
        return Err(AppError::Config("local.chunk_size must be > 0".into()));
    }

    Ok(Config {
        bot_name: parsed.bot.name,
        log_level: overrides.log_level.clone().unwrap_or(parsed.bot.log_level),
        api: ApiConfig {
            enabled: parsed.api.enabled,
            url: overrides.api_url.clone().unwrap_or(parsed.api.url),
            port,
            timeout_seconds: parsed.api.timeout_seconds,
            rag_route: parsed.api.rag_route,
        },
        local: LocalConfig {
            enabled: parsed.local.enabled,
            history_cap: parsed.local.history_cap,
            docs_dir: parsed.local.docs_dir.as_deref().map(expand_home),
            chunk_size: parsed.local.chunk_size,
            top_k: parsed.local.top_k,
            system_prompt: parsed.local.system_prompt,
        },
        llm: LlmConfig {
            provider: parsed.llm.provider,
            openai: OpenAiConfig {
                api_base_url: parsed.llm.openai.api_base_url,
                model: parsed.llm.openai.model,
                temperature: parsed.llm.openai.temperature,
                timeout_seconds: parsed.llm.openai.timeout_seconds,
            },
        },
        comms: CommsConfig {
            pty: PtyConfig { enabled: parsed.comms.pty.enabled },
            telegram: TelegramConfig { enabled: parsed.comms.telegram.enabled },
        },
        llm_api_key: overrides.llm_api_key.clone(),
    })
}

/// Expand a leading `~` to the user's home directory.
/// Absolute or relative paths without `~` are returned unchanged.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    PathBuf::from(path)
}
