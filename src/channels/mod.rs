//! Channels module - the chat transport and the update loop.
//!
//! ```text
//!   Telegram ──poll──▶ UpdateLoop ──process──▶ Orchestrator
//!      ▲                   │
//!      └──send_text────────┘
//! ```
//!
//! The [`Transport`] trait is the seam between the assistant and the chat
//! network; [`TelegramTransport`] is the production implementation and tests
//! use hand-written fakes.

pub mod telegram;
mod types;
pub mod update_loop;

pub use telegram::TelegramTransport;
pub use types::{
    mime_for_path, ChatAction, InboundMessage, MediaBlob, MediaRef, PollBatch, ReplyTarget,
    Transport,
};
pub use update_loop::{refusal, UpdateLoop, FAILURE_NOTICE, HISTORY_CLEARED, UNINTELLIGIBLE_SPEECH};
