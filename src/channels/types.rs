//! Transport trait and types for Sidekick
//!
//! This module defines the `Transport` trait the update loop and the schedule
//! sweep talk to, along with the inbound message shape and media helpers.

use async_trait::async_trait;
use base64::Engine;

use crate::error::Result;

/// Where a reply goes: a chat, optionally a forum thread inside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplyTarget {
    pub chat_id: i64,
    pub thread_id: Option<i32>,
}

impl ReplyTarget {
    /// Target a whole chat.
    pub fn chat(chat_id: i64) -> Self {
        Self {
            chat_id,
            thread_id: None,
        }
    }

    /// Target a thread inside the chat.
    pub fn with_thread(mut self, thread_id: i32) -> Self {
        self.thread_id = Some(thread_id);
        self
    }
}

/// Transient status shown in the chat header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatAction {
    Typing,
}

/// Media attached to an inbound message, by transport file id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaRef {
    /// Voice clip to transcribe.
    Voice { file_id: String },
    /// Largest size of a photo.
    Photo { file_id: String },
    /// Thumbnail of a sticker.
    StickerThumbnail { file_id: String },
    /// Thumbnail of an animation.
    AnimationThumbnail { file_id: String },
}

impl MediaRef {
    pub fn file_id(&self) -> &str {
        match self {
            MediaRef::Voice { file_id }
            | MediaRef::Photo { file_id }
            | MediaRef::StickerThumbnail { file_id }
            | MediaRef::AnimationThumbnail { file_id } => file_id,
        }
    }

    /// True for media that reaches the model as an image.
    pub fn is_image(&self) -> bool {
        !matches!(self, MediaRef::Voice { .. })
    }
}

/// One inbound message, already reduced to what the assistant can use.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    /// Transport update id; the next poll starts after it.
    pub update_id: u32,
    /// Sender identity, `None` for channel posts and similar.
    pub sender_id: Option<i64>,
    /// Where replies go.
    pub target: ReplyTarget,
    /// Text or caption, trimmed, `None` when blank.
    pub text: Option<String>,
    /// Attached media in the order it is offered to the model.
    pub media: Vec<MediaRef>,
}

impl InboundMessage {
    /// Text-only message.
    pub fn text(update_id: u32, sender_id: i64, chat_id: i64, text: &str) -> Self {
        Self {
            update_id,
            sender_id: Some(sender_id),
            target: ReplyTarget::chat(chat_id),
            text: normalize_text(Some(text)),
            media: Vec::new(),
        }
    }

    /// Attach media.
    pub fn with_media(mut self, media: MediaRef) -> Self {
        self.media.push(media);
        self
    }

    /// Whether the text starts with `command` (e.g. `/clear`).
    pub fn is_command(&self, command: &str) -> bool {
        self.text
            .as_deref()
            .is_some_and(|t| t.starts_with(command))
    }

    /// Whether there is anything for the model to look at.
    pub fn has_content(&self) -> bool {
        self.text.is_some() || !self.media.is_empty()
    }

    /// Sender id for logs and the refusal message.
    pub fn sender_label(&self) -> String {
        self.sender_id
            .map(|id| id.to_string())
            .unwrap_or_else(|| "unknown".to_string())
    }
}

/// Trim text; blank becomes `None`.
pub fn normalize_text(text: Option<&str>) -> Option<String> {
    text.map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

/// Downloaded file content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaBlob {
    pub bytes: Vec<u8>,
    pub mime: String,
}

impl MediaBlob {
    /// Inline `data:` URL for image references.
    ///
    /// ```
    /// use sidekick::channels::MediaBlob;
    ///
    /// let blob = MediaBlob { bytes: b"hi".to_vec(), mime: "image/png".to_string() };
    /// assert_eq!(blob.to_data_url(), "data:image/png;base64,aGk=");
    /// ```
    pub fn to_data_url(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.mime,
            base64::engine::general_purpose::STANDARD.encode(&self.bytes)
        )
    }
}

/// MIME type for a downloaded file, by extension. Other types are refused.
pub fn mime_for_path(path: &str) -> Option<&'static str> {
    let ext = path.rsplit_once('.')?.1.to_ascii_lowercase();
    match ext.as_str() {
        "webp" => Some("image/webp"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "gif" => Some("image/gif"),
        "ogg" | "oga" => Some("audio/ogg"),
        _ => None,
    }
}

/// Chat transport: long polling in, text and status actions out.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Returns the transport name (e.g., "telegram").
    fn name(&self) -> &str;

    /// Wait up to `timeout_secs` for updates after `offset`.
    ///
    /// Updates the transport cannot use are skipped but still count toward
    /// the cursor, so the returned batch may be empty.
    async fn poll(&self, offset: Option<u32>, timeout_secs: u32) -> Result<PollBatch>;

    /// Send a text message.
    async fn send_text(&self, target: ReplyTarget, text: &str) -> Result<()>;

    /// Show a transient status action.
    async fn send_action(&self, target: ReplyTarget, action: ChatAction) -> Result<()>;

    /// Download a file by transport id.
    async fn download(&self, file_id: &str) -> Result<MediaBlob>;
}

/// Result of one poll.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PollBatch {
    /// Usable messages, oldest first.
    pub messages: Vec<InboundMessage>,
    /// Highest update id seen, usable or not.
    pub last_update_id: Option<u32>,
}

impl PollBatch {
    /// Offset for the next poll, or `current` when nothing arrived.
    pub fn next_offset(&self, current: Option<u32>) -> Option<u32> {
        match self.last_update_id {
            Some(id) => Some(id.saturating_add(1)),
            None => current,
        }
    }
}
