//! Sidekick - personal Telegram assistant
//!
//! One owner talks to the assistant over Telegram. Each message runs through
//! a tool-calling loop against a chat-completion model, with a persistent
//! memory of the user and a minute-resolution task schedule that a timer
//! sweeps and performs.

pub mod agent;
pub mod channels;
pub mod config;
pub mod error;
pub mod providers;
pub mod schedule;
pub mod search;
pub mod session;
pub mod state;
pub mod tools;
pub mod transcription;
pub mod utils;

pub use agent::{ContextBuilder, Orchestrator};
pub use channels::{InboundMessage, TelegramTransport, Transport, UpdateLoop};
pub use config::Config;
pub use error::{Result, SidekickError};
pub use providers::{ChatOptions, LLMProvider, LLMResponse, LLMToolCall, ToolDefinition};
pub use schedule::{ScheduleEngine, ScheduleKey};
pub use session::{ContentPart, Turn};
pub use state::AgentState;
