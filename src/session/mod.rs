//! Session module - conversation turns and history
//!
//! # Example
//!
//! ```
//! use sidekick::session::{ConversationHistory, Turn};
//!
//! let mut history = ConversationHistory::new();
//! history.extend([Turn::user_text("Hello!")]);
//! history.extend([Turn::assistant("Hi there!")]);
//! assert_eq!(history.window(50).len(), 2);
//! ```

pub mod history;
pub mod types;

pub use history::ConversationHistory;
pub use types::{ContentPart, ImageDetail, ImageRef, Role, ToolCall, Turn};
