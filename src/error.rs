//! Error types for Sidekick
//!
//! This module defines the error types used throughout the crate.
//! Uses `thiserror` for ergonomic error handling with automatic `Display` and
//! `Error` trait implementations.

use std::fmt;
use thiserror::Error;

// ============================================================================
// Provider Error Classification
// ============================================================================

/// Structured classification of model API HTTP failures.
#[derive(Debug)]
pub enum ProviderError {
    /// 401: Invalid API key or authentication failure
    Auth(String),
    /// 429: Rate limit or quota exceeded
    RateLimit(String),
    /// 402: Payment required or billing issue
    Billing(String),
    /// 500/502/503/504: Server-side errors
    ServerError(String),
    /// 400: Bad request, invalid JSON, malformed parameters
    InvalidRequest(String),
    /// 404: Model not found or endpoint not available
    ModelNotFound(String),
    /// Connection or read timeout
    Timeout(String),
    /// Catch-all for unrecognized errors
    Unknown(String),
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderError::Auth(msg) => write!(f, "Authentication error: {}", msg),
            ProviderError::RateLimit(msg) => write!(f, "Rate limit error: {}", msg),
            ProviderError::Billing(msg) => write!(f, "Billing error: {}", msg),
            ProviderError::ServerError(msg) => write!(f, "Server error: {}", msg),
            ProviderError::InvalidRequest(msg) => write!(f, "Invalid request: {}", msg),
            ProviderError::ModelNotFound(msg) => write!(f, "Model not found: {}", msg),
            ProviderError::Timeout(msg) => write!(f, "Timeout: {}", msg),
            ProviderError::Unknown(msg) => write!(f, "Unknown provider error: {}", msg),
        }
    }
}

impl From<ProviderError> for SidekickError {
    fn from(err: ProviderError) -> Self {
        SidekickError::ProviderTyped(err)
    }
}

// ============================================================================
// Primary Error Type
// ============================================================================

/// The primary error type for Sidekick operations.
#[derive(Error, Debug)]
pub enum SidekickError {
    /// Configuration-related errors (invalid config, missing required fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Untyped provider errors (malformed responses, empty choices, etc.)
    #[error("Provider error: {0}")]
    Provider(String),

    /// Structured provider error classified from the HTTP status.
    #[error("Provider error: {0}")]
    ProviderTyped(ProviderError),

    /// Chat transport errors (polling, sending, media download)
    #[error("Channel error: {0}")]
    Channel(String),

    /// Tool execution errors (missing arguments, backend failures)
    #[error("Tool error: {0}")]
    Tool(String),

    /// Durable state errors (unreadable documents, failed writes)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Web search backend errors
    #[error("Search error: {0}")]
    Search(String),

    /// Voice transcription errors
    #[error("Transcription error: {0}")]
    Transcription(String),

    /// Standard I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Resource not found (tools, files, etc.)
    #[error("Not found: {0}")]
    NotFound(String),
}

/// A specialized `Result` type for Sidekick operations.
pub type Result<T> = std::result::Result<T, SidekickError>;
