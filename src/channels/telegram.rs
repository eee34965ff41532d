//! Telegram transport
//!
//! Raw Bot API calls through teloxide: `getUpdates` long polling in,
//! `sendMessage` and `sendChatAction` out, `getFile` plus an HTTP download
//! for media.
//!
//! # Example
//!
//! ```ignore
//! use sidekick::channels::TelegramTransport;
//!
//! let transport = TelegramTransport::new("BOT_TOKEN", Some("socks5://127.0.0.1:1080"))?;
//! let batch = transport.poll(None, 10).await?;
//! ```

use async_trait::async_trait;
use std::time::Duration;
use teloxide::prelude::*;
use teloxide::types::{ChatId, FileId, MessageId, ThreadId, UpdateKind};
use tracing::{debug, info};

use crate::error::{Result, SidekickError};

use super::types::{mime_for_path, normalize_text};
use super::{ChatAction, InboundMessage, MediaBlob, MediaRef, PollBatch, ReplyTarget, Transport};

/// Base delay for poll retry backoff (seconds).
const BASE_RETRY_DELAY_SECS: u64 = 2;
/// Maximum poll retry backoff delay (seconds).
const MAX_RETRY_DELAY_SECS: u64 = 120;

const FILE_API_URL: &str = "https://api.telegram.org/file";

/// Exponential backoff delay for the `attempt`-th consecutive poll failure.
pub fn poll_backoff_delay(attempt: u32) -> Duration {
    let delay_secs = BASE_RETRY_DELAY_SECS
        .saturating_mul(2u64.saturating_pow(attempt))
        .min(MAX_RETRY_DELAY_SECS);
    Duration::from_secs(delay_secs)
}

/// Telegram Bot API transport.
pub struct TelegramTransport {
    bot: Bot,
    token: String,
    /// Client for file downloads; shares the bot's proxy settings.
    client: reqwest::Client,
}

impl TelegramTransport {
    /// Build the transport. `proxy` applies to every Bot API request and
    /// to file downloads.
    pub fn new(token: &str, proxy: Option<&str>) -> Result<Self> {
        let client = Self::build_client(proxy)?;
        Ok(Self {
            bot: Bot::with_client(token.to_string(), client.clone()),
            token: token.to_string(),
            client,
        })
    }

    /// Build a Telegram HTTP client with explicit proxy behavior.
    ///
    /// Automatic system proxy detection is disabled; only the configured
    /// proxy is used.
    fn build_client(proxy: Option<&str>) -> Result<reqwest::Client> {
        let mut builder = teloxide::net::default_reqwest_settings().no_proxy();
        if let Some(url) = proxy {
            let proxy = reqwest::Proxy::all(url).map_err(|e| {
                SidekickError::Config(format!("Invalid Telegram proxy '{}': {}", url, e))
            })?;
            builder = builder.proxy(proxy);
        }
        builder.build().map_err(|e| {
            SidekickError::Channel(format!("Failed to build Telegram HTTP client: {}", e))
        })
    }

    /// Confirm the token works. Returns the bot's username.
    pub async fn check(&self) -> Result<String> {
        let me = self
            .bot
            .get_me()
            .await
            .map_err(|e| SidekickError::Channel(format!("Telegram startup check failed: {}", e)))?;
        Ok(me.username().to_string())
    }
}

/// Reduce a Bot API message to what the assistant uses.
fn to_inbound(update_id: u32, msg: &Message) -> InboundMessage {
    let mut media = Vec::new();
    if let Some(voice) = msg.voice() {
        media.push(MediaRef::Voice {
            file_id: voice.file.id.0.clone(),
        });
    }
    if let Some(photo) = msg.photo().and_then(|sizes| sizes.last()) {
        media.push(MediaRef::Photo {
            file_id: photo.file.id.0.clone(),
        });
    }
    if let Some(thumb) = msg.sticker().and_then(|s| s.thumbnail.as_ref()) {
        media.push(MediaRef::StickerThumbnail {
            file_id: thumb.file.id.0.clone(),
        });
    }
    if let Some(thumb) = msg.animation().and_then(|a| a.thumbnail.as_ref()) {
        media.push(MediaRef::AnimationThumbnail {
            file_id: thumb.file.id.0.clone(),
        });
    }

    let mut target = ReplyTarget::chat(msg.chat.id.0);
    if let Some(thread) = msg.thread_id {
        target = target.with_thread(thread.0 .0);
    }

    InboundMessage {
        update_id,
        sender_id: msg.from.as_ref().map(|u| u.id.0 as i64),
        target,
        text: normalize_text(msg.caption().or_else(|| msg.text())),
        media,
    }
}

fn channel_error(action: &str, e: impl std::fmt::Display) -> SidekickError {
    SidekickError::Channel(format!("Failed to {}: {}", action, e))
}

#[async_trait]
impl Transport for TelegramTransport {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn poll(&self, offset: Option<u32>, timeout_secs: u32) -> Result<PollBatch> {
        let mut request = self.bot.get_updates().timeout(timeout_secs);
        if let Some(offset) = offset {
            request = request.offset(offset as i32);
        }
        let updates = request
            .await
            .map_err(|e| channel_error("poll Telegram updates", e))?;

        let mut batch = PollBatch::default();
        for update in updates {
            let update_id = update.id.0;
            batch.last_update_id = Some(batch.last_update_id.map_or(update_id, |id| id.max(update_id)));
            match &update.kind {
                UpdateKind::Message(msg) => batch.messages.push(to_inbound(update_id, msg)),
                _ => debug!(update_id, "Ignoring non-message update"),
            }
        }
        Ok(batch)
    }

    async fn send_text(&self, target: ReplyTarget, text: &str) -> Result<()> {
        let mut request = self.bot.send_message(ChatId(target.chat_id), text);
        if let Some(thread) = target.thread_id {
            request = request.message_thread_id(ThreadId(MessageId(thread)));
        }
        request
            .await
            .map_err(|e| channel_error("send Telegram message", e))?;
        debug!(chat_id = target.chat_id, "Telegram message sent");
        Ok(())
    }

    async fn send_action(&self, target: ReplyTarget, action: ChatAction) -> Result<()> {
        let action = match action {
            ChatAction::Typing => teloxide::types::ChatAction::Typing,
        };
        let mut request = self.bot.send_chat_action(ChatId(target.chat_id), action);
        if let Some(thread) = target.thread_id {
            request = request.message_thread_id(ThreadId(MessageId(thread)));
        }
        request
            .await
            .map_err(|e| channel_error("send Telegram chat action", e))?;
        Ok(())
    }

    async fn download(&self, file_id: &str) -> Result<MediaBlob> {
        let file = self
            .bot
            .get_file(FileId(file_id.to_string()))
            .await
            .map_err(|e| channel_error("resolve Telegram file", e))?;

        let mime = mime_for_path(&file.path).ok_or_else(|| {
            SidekickError::Channel(format!("Unsupported Telegram file type: {}", file.path))
        })?;

        let url = format!("{}/bot{}/{}", FILE_API_URL, self.token, file.path);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| channel_error("download Telegram file", e))?;
        if !response.status().is_success() {
            return Err(SidekickError::Channel(format!(
                "Failed to download Telegram file: HTTP {}",
                response.status()
            )));
        }
        let bytes = response.bytes().await?.to_vec();

        info!(mime, size = bytes.len(), "Downloaded Telegram file");
        Ok(MediaBlob {
            bytes,
            mime: mime.to_string(),
        })
    }
}
