//! Voice message transcription.
//!
//! Voice clips are uploaded to an OpenAI-compatible `/audio/transcriptions`
//! endpoint. An empty transcript is reported as `None` so the caller can
//! substitute its placeholder.

use async_trait::async_trait;
use reqwest::multipart;
use tracing::debug;

use crate::config::Config;
use crate::error::{Result, SidekickError};
use crate::providers::openai::OPENAI_API_URL;

/// Turns recorded audio into text.
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe one clip. `Ok(None)` means the clip held no intelligible speech.
    async fn transcribe(&self, audio: Vec<u8>, content_type: &str) -> Result<Option<String>>;
}

/// Transcriber backed by an OpenAI-compatible audio endpoint.
#[derive(Debug, Clone)]
pub struct TranscriberService {
    api_key: String,
    api_base: String,
    model: String,
    client: reqwest::Client,
}

impl TranscriberService {
    pub fn new(api_key: &str, api_base: &str, model: &str, client: reqwest::Client) -> Self {
        Self {
            api_key: api_key.to_string(),
            api_base: api_base.trim_end_matches('/').to_string(),
            model: model.to_string(),
            client,
        }
    }

    /// Build from config.
    ///
    /// Returns `None` if transcription is disabled or no API key is configured.
    pub fn from_config(config: &Config, client: reqwest::Client) -> Option<Self> {
        if !config.transcription.enabled {
            return None;
        }
        let api_key = config.openai_api_key()?;
        let api_base = config
            .providers
            .openai
            .api_base
            .as_deref()
            .unwrap_or(OPENAI_API_URL);
        Some(Self::new(
            api_key,
            api_base,
            &config.transcription.model,
            client,
        ))
    }
}

/// Accept either `{"text": "..."}` or a plain-text body.
fn extract_transcript(body: &str) -> Option<String> {
    let trimmed = body.trim();
    let text = match serde_json::from_str::<serde_json::Value>(trimmed) {
        Ok(json) => match json.get("text").and_then(|v| v.as_str()) {
            Some(text) => text.trim().to_string(),
            None => trimmed.to_string(),
        },
        Err(_) => trimmed.to_string(),
    };
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

#[async_trait]
impl Transcriber for TranscriberService {
    async fn transcribe(&self, audio: Vec<u8>, content_type: &str) -> Result<Option<String>> {
        let file_part = multipart::Part::bytes(audio)
            .file_name("voice.ogg")
            .mime_str(content_type)
            .map_err(|e| SidekickError::Transcription(e.to_string()))?;

        let form = multipart::Form::new()
            .part("file", file_part)
            .text("model", self.model.clone())
            .text("response_format", "text");

        let resp = self
            .client
            .post(format!("{}/audio/transcriptions", self.api_base))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(SidekickError::Transcription(format!(
                "HTTP {}: {}",
                status, body
            )));
        }

        let transcript = extract_transcript(&resp.text().await?);
        debug!(
            model = %self.model,
            chars = transcript.as_ref().map(|t| t.chars().count()).unwrap_or(0),
            "Transcription finished"
        );
        Ok(transcript)
    }
}
