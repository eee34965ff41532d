//! `think` tool: escalate a hard request to a stronger model.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use crate::agent::ContextBuilder;
use crate::error::Result;
use crate::providers::{ChatOptions, LLMProvider};
use crate::state::AgentState;

use super::types::required_str;
use super::{Tool, ToolOutput};

/// Asks the configured reasoning model, with persona and memory but no
/// conversation history, and returns its literal answer.
pub struct ThinkTool {
    provider: Arc<dyn LLMProvider>,
    state: Arc<AgentState>,
    context: ContextBuilder,
    model: String,
}

impl ThinkTool {
    pub fn new(
        provider: Arc<dyn LLMProvider>,
        state: Arc<AgentState>,
        context: ContextBuilder,
        model: &str,
    ) -> Self {
        Self {
            provider,
            state,
            context,
            model: model.to_string(),
        }
    }
}

#[async_trait]
impl Tool for ThinkTool {
    fn name(&self) -> &str {
        "think"
    }

    fn description(&self) -> &str {
        "If the user's request is too complex, or the user asks you to think, \
         you can make a request to a smarter model!"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "request": {"type": "string"}
            },
            "required": ["request"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, args: Value) -> Result<ToolOutput> {
        let request = required_str(&args, "request")?;
        let memory = self.state.memory().await;
        let messages = self.context.think_messages(&memory, request);

        debug!(model = %self.model, "Escalating request");
        let response = self
            .provider
            .chat(messages, vec![], Some(&self.model), ChatOptions::new())
            .await?;

        Ok(match response.content_opt() {
            Some(answer) => ToolOutput::text(answer),
            None => ToolOutput::empty(),
        })
    }
}
