//! `clearMessageHistory` tool.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::Result;
use crate::state::AgentState;

use super::{Tool, ToolOutput};

/// Truncates the conversation to its most recent turn.
///
/// The surviving turn is the assistant turn that requested this call, so the
/// `tool` turns appended right after it still have their invocation.
pub struct ClearHistoryTool {
    state: Arc<AgentState>,
}

impl ClearHistoryTool {
    pub fn new(state: Arc<AgentState>) -> Self {
        Self { state }
    }
}

#[async_trait]
impl Tool for ClearHistoryTool {
    fn name(&self) -> &str {
        "clearMessageHistory"
    }

    fn description(&self) -> &str {
        "If the user wants to clear their message history, clear it."
    }

    fn parameters(&self) -> Value {
        json!({"type": "object", "properties": {}})
    }

    async fn execute(&self, _args: Value) -> Result<ToolOutput> {
        self.state.keep_last_turns(1).await;
        Ok(ToolOutput::text("Success"))
    }
}
