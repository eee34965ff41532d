//! Agent module - prompt building and the tool-calling loop
//!
//! ```text
//! ┌─────────────┐     ┌──────────────┐     ┌─────────────┐
//! │ Update Loop │────>│ Orchestrator │────>│ LLMProvider │
//! └─────────────┘     └──────────────┘     └─────────────┘
//!                            │
//!                            ▼
//!                     ┌──────────────┐     ┌─────────────┐
//!                     │ ToolRegistry │────>│ AgentState  │
//!                     └──────────────┘     └─────────────┘
//! ```

mod context;
mod r#loop;

pub use context::{ContextBuilder, PERSONA};
pub use r#loop::{
    NoStatus, Orchestrator, StatusSink, STATUS_PREPARING_ANSWER, STATUS_RUNNING_TOOLS,
    TOO_MANY_STEPS,
};
