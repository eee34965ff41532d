//! Configuration management for Sidekick
//!
//! Configuration is loaded from `~/.sidekick/config.json` (or an explicit path),
//! then overridden from the environment. `.env` files are read by the CLI through
//! `dotenvy` before loading, so both override styles work:
//!
//! - `SIDEKICK_SECTION_KEY` (e.g. `SIDEKICK_AGENT_MODEL`)
//! - the short names used by earlier deployments: `TG_BOT_TOKEN`,
//!   `TG_ALLOW_FROM_ID`, `OPENAI_API_KEY`, `SOCKS`, `YANDEX_SEARCH_TOKEN`

mod types;
pub mod validate;

pub use types::*;

use crate::error::Result;
use std::path::{Path, PathBuf};

/// Request timeout of teloxide's default client; a long poll must end before it.
const TELEGRAM_CLIENT_TIMEOUT_SECS: u32 = 17;

impl Config {
    /// Returns the Sidekick configuration directory path (~/.sidekick)
    pub fn dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".sidekick")
    }

    /// Returns the path to the config file (~/.sidekick/config.json)
    pub fn path() -> PathBuf {
        Self::dir().join("config.json")
    }

    /// Load configuration from the default path with environment overrides.
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::path())
    }

    /// Load configuration from a specific path with environment overrides.
    ///
    /// A missing file yields the default configuration.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            serde_json::from_str(&content)?
        } else {
            Config::default()
        };

        config.apply_env_overrides();

        Ok(config)
    }

    /// Apply process environment overrides.
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary variable lookup.
    ///
    /// Short legacy names are applied first so the namespaced form wins when
    /// both are present.
    fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        // Legacy names
        if let Some(val) = lookup("TG_BOT_TOKEN") {
            self.telegram.token = val;
        }
        if let Some(v) = lookup("TG_ALLOW_FROM_ID").and_then(|s| s.trim().parse().ok()) {
            self.telegram.allow_from = Some(v);
        }
        if let Some(val) = lookup("OPENAI_API_KEY") {
            self.providers.openai.api_key = Some(val);
        }
        if let Some(val) = lookup("SOCKS").filter(|s| !s.trim().is_empty()) {
            self.telegram.proxy = Some(normalize_proxy_url(&val));
        }
        if let Some(val) = lookup("YANDEX_SEARCH_TOKEN") {
            self.search.api_key = Some(val);
        }

        // Agent
        if let Some(val) = lookup("SIDEKICK_AGENT_MODEL") {
            self.agent.model = val;
        }
        if let Some(val) = lookup("SIDEKICK_AGENT_THINK_MODEL") {
            self.agent.think_model = val;
        }
        if let Some(val) = lookup("SIDEKICK_AGENT_SCHEDULE_MODEL") {
            self.agent.schedule_model = val;
        }
        if let Some(v) = lookup("SIDEKICK_AGENT_MAX_TOKENS").and_then(|s| s.parse().ok()) {
            self.agent.max_tokens = Some(v);
        }
        if let Some(v) = lookup("SIDEKICK_AGENT_TEMPERATURE").and_then(|s| s.parse().ok()) {
            self.agent.temperature = Some(v);
        }
        if let Some(v) = lookup("SIDEKICK_AGENT_HISTORY_WINDOW").and_then(|s| s.parse().ok()) {
            self.agent.history_window = v;
        }
        if let Some(v) = lookup("SIDEKICK_AGENT_MAX_TOOL_ROUNDS").and_then(|s| s.parse().ok()) {
            self.agent.max_tool_rounds = v;
        }

        // Telegram
        if let Some(val) = lookup("SIDEKICK_TELEGRAM_TOKEN") {
            self.telegram.token = val;
        }
        if let Some(v) = lookup("SIDEKICK_TELEGRAM_ALLOW_FROM").and_then(|s| s.trim().parse().ok())
        {
            self.telegram.allow_from = Some(v);
        }
        if let Some(v) = lookup("SIDEKICK_TELEGRAM_POLL_TIMEOUT_SECS").and_then(|s| s.parse().ok())
        {
            self.telegram.poll_timeout_secs = v;
        }
        if let Some(val) = lookup("SIDEKICK_TELEGRAM_PROXY").filter(|s| !s.trim().is_empty()) {
            self.telegram.proxy = Some(normalize_proxy_url(&val));
        }

        // Providers
        if let Some(val) = lookup("SIDEKICK_PROVIDERS_OPENAI_API_KEY") {
            self.providers.openai.api_key = Some(val);
        }
        if let Some(val) = lookup("SIDEKICK_PROVIDERS_OPENAI_API_BASE") {
            self.providers.openai.api_base = Some(val);
        }

        // Search
        if let Some(val) = lookup("SIDEKICK_SEARCH_API_KEY") {
            self.search.api_key = Some(val);
        }
        if let Some(val) = lookup("SIDEKICK_SEARCH_API_URL") {
            self.search.api_url = val;
        }
        if let Some(val) = lookup("SIDEKICK_SEARCH_SEARCH_TYPE") {
            self.search.search_type = val;
        }

        // Transcription
        if let Some(v) = lookup("SIDEKICK_TRANSCRIPTION_ENABLED").and_then(|s| s.parse().ok()) {
            self.transcription.enabled = v;
        }
        if let Some(val) = lookup("SIDEKICK_TRANSCRIPTION_MODEL") {
            self.transcription.model = val;
        }

        // Schedule
        if let Some(v) = lookup("SIDEKICK_SCHEDULE_INTERVAL_SECS").and_then(|s| s.parse().ok()) {
            self.schedule.interval_secs = v;
        }
        if let Some(v) =
            lookup("SIDEKICK_SCHEDULE_SHUTDOWN_GRACE_SECS").and_then(|s| s.parse().ok())
        {
            self.schedule.shutdown_grace_secs = v;
        }

        // Storage
        if let Some(val) = lookup("SIDEKICK_STORAGE_DATA_DIR") {
            self.storage.data_dir = val;
        }

        // Logging
        if let Some(val) = lookup("SIDEKICK_LOGGING_LEVEL") {
            self.logging.level = val;
        }
        if let Some(val) = lookup("SIDEKICK_LOGGING_FILE") {
            self.logging.file = Some(val);
        }
    }

    /// Returns the expanded data directory path (resolves ~ to home directory)
    pub fn data_dir(&self) -> PathBuf {
        expand_home(&self.storage.data_dir)
    }

    /// The OpenAI API key, if one is configured and non-empty.
    pub fn openai_api_key(&self) -> Option<&str> {
        self.providers
            .openai
            .api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
    }

    /// Check the settings a running assistant needs.
    ///
    /// Returns human-readable problems; an empty list means the config is usable.
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();

        if self.telegram.token.trim().is_empty() {
            problems.push("telegram.token is empty (set TG_BOT_TOKEN)".to_string());
        }
        if self.telegram.allow_from.is_none() {
            problems.push("telegram.allow_from is not set (set TG_ALLOW_FROM_ID)".to_string());
        }
        if self.openai_api_key().is_none() {
            problems.push("providers.openai.api_key is empty (set OPENAI_API_KEY)".to_string());
        }
        if self.agent.history_window == 0 {
            problems.push("agent.history_window must be at least 1".to_string());
        }
        if self.agent.max_tool_rounds == 0 {
            problems.push("agent.max_tool_rounds must be at least 1".to_string());
        }
        if self.telegram.poll_timeout_secs >= TELEGRAM_CLIENT_TIMEOUT_SECS {
            problems.push(format!(
                "telegram.poll_timeout_secs must be below {} (the Telegram client request timeout)",
                TELEGRAM_CLIENT_TIMEOUT_SECS
            ));
        }
        if self.schedule.interval_secs == 0 {
            problems.push("schedule.interval_secs must be at least 1".to_string());
        }
        if let Some(proxy) = &self.telegram.proxy {
            if reqwest::Proxy::all(proxy.as_str()).is_err() {
                problems.push(format!("telegram.proxy is not a valid proxy URL: {}", proxy));
            }
        }

        problems
    }
}

/// Accept bare `host:port` proxies by assuming SOCKS5.
fn normalize_proxy_url(raw: &str) -> String {
    let raw = raw.trim();
    if raw.contains("://") {
        raw.to_string()
    } else {
        format!("socks5://{}", raw)
    }
}

/// Expand ~ to home directory in a path string
fn expand_home(path: &str) -> PathBuf {
    if path.starts_with('~') {
        if let Some(home) = dirs::home_dir() {
            if path.len() > 1 && path.chars().nth(1) == Some('/') {
                return home.join(&path[2..]);
            }
            return home;
        }
    }

    PathBuf::from(path)
}
