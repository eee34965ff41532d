//! Configuration type definitions for Sidekick
//!
//! Every section implements serde traits and has sensible defaults, so a
//! partial (or missing) config file always deserializes.

use serde::{Deserialize, Serialize};

/// Main configuration struct for Sidekick
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Agent configuration (models, tokens, tool rounds)
    pub agent: AgentConfig,
    /// Telegram transport configuration
    pub telegram: TelegramConfig,
    /// Model provider configurations
    pub providers: ProvidersConfig,
    /// Web search backend configuration
    pub search: SearchConfig,
    /// Voice transcription configuration
    pub transcription: TranscriptionConfig,
    /// Schedule sweep configuration
    pub schedule: ScheduleConfig,
    /// Durable state configuration
    pub storage: StorageConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

// ============================================================================
// Agent Configuration
// ============================================================================

/// Model selection and tool loop limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Model used for conversation turns
    pub model: String,
    /// Higher-capability model used by the `think` tool
    pub think_model: String,
    /// Model used by the schedule sweep
    pub schedule_model: String,
    /// Maximum tokens for responses (omitted from requests when unset)
    pub max_tokens: Option<u32>,
    /// Temperature for generation (omitted from requests when unset)
    pub temperature: Option<f32>,
    /// Number of most recent turns given to the model and kept on disk
    pub history_window: usize,
    /// Maximum tool-call rounds per inbound message
    pub max_tool_rounds: u32,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4.1".to_string(),
            think_model: "o3".to_string(),
            schedule_model: "gpt-4.1-mini".to_string(),
            max_tokens: None,
            temperature: None,
            history_window: 50,
            max_tool_rounds: 10,
        }
    }
}

// ============================================================================
// Telegram Configuration
// ============================================================================

/// Telegram bot configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    /// Bot token from @BotFather
    pub token: String,
    /// The single user id allowed to talk to the assistant
    pub allow_from: Option<i64>,
    /// Long-poll window for `getUpdates`, in seconds
    pub poll_timeout_secs: u32,
    /// Proxy URL (`socks5://...` or `http://...`) for every outbound client
    pub proxy: Option<String>,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            allow_from: None,
            poll_timeout_secs: 10,
            proxy: None,
        }
    }
}

// ============================================================================
// Provider Configuration
// ============================================================================

/// Model provider configurations
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    /// OpenAI-compatible Chat Completions endpoint
    pub openai: ProviderConfig,
}

/// Credentials and endpoint for one provider
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// API key
    pub api_key: Option<String>,
    /// Base URL override (defaults to the public API)
    pub api_base: Option<String>,
}

// ============================================================================
// Search Configuration
// ============================================================================

/// Default Yandex Search API v2 endpoint.
pub const DEFAULT_SEARCH_API_URL: &str = "https://searchapi.api.cloud.yandex.net/v2/web/search";

/// Web search backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Bearer token for the search API
    pub api_key: Option<String>,
    /// Endpoint URL
    pub api_url: String,
    /// Search index (`SEARCH_TYPE_RU`, `SEARCH_TYPE_COM`, ...)
    pub search_type: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: DEFAULT_SEARCH_API_URL.to_string(),
            search_type: "SEARCH_TYPE_RU".to_string(),
        }
    }
}

// ============================================================================
// Transcription Configuration
// ============================================================================

/// Voice transcription configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptionConfig {
    /// Whether voice messages are transcribed at all
    pub enabled: bool,
    /// Transcription model
    pub model: String,
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            model: "gpt-4o-transcribe".to_string(),
        }
    }
}

// ============================================================================
// Schedule Configuration
// ============================================================================

/// Schedule sweep configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Seconds between sweeps
    pub interval_secs: u64,
    /// How long shutdown waits for an in-flight sweep
    pub shutdown_grace_secs: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            interval_secs: 60,
            shutdown_grace_secs: 30,
        }
    }
}

// ============================================================================
// Storage Configuration
// ============================================================================

/// Where the history, memory and schedule documents live
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Data directory (relative paths resolve against the working directory)
    pub data_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: "data".to_string(),
        }
    }
}

// ============================================================================
// Logging Configuration
// ============================================================================

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable multi-line output
    Pretty,
    /// Compact single-line text with component fields
    #[default]
    Component,
    /// JSON lines
    Json,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Output format
    pub format: LogFormat,
    /// Default filter directive (overridden by `RUST_LOG`)
    pub level: String,
    /// Optional file to append JSON logs to
    pub file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Component,
            level: "info".to_string(),
            file: None,
        }
    }
}
