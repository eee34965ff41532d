//! Orchestrator: the tool-calling loop behind every inbound message.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use futures::future::join_all;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::providers::{ChatOptions, LLMProvider, LLMToolCall};
use crate::session::Turn;
use crate::state::AgentState;
use crate::tools::ToolRegistry;

use super::ContextBuilder;

/// Sent before a round of tool calls runs.
pub const STATUS_RUNNING_TOOLS: &str = "Running tools...";
/// Sent after a round of tool calls finished.
pub const STATUS_PREPARING_ANSWER: &str = "Preparing the answer...";
/// Final answer when the model keeps asking for tools past the round limit.
pub const TOO_MANY_STEPS: &str = "I had to stop: too many steps were needed to answer.";

/// Receives transient progress notices while a turn is processed.
#[async_trait]
pub trait StatusSink: Send + Sync {
    /// Deliver one notice. Failures are the sink's business; the turn goes on.
    async fn status(&self, text: &str);
}

/// Sink that drops every notice.
pub struct NoStatus;

#[async_trait]
impl StatusSink for NoStatus {
    async fn status(&self, _text: &str) {}
}

/// Drives one user turn to a final answer.
///
/// Each iteration builds the prompt from [`AgentState`], calls the model and
/// either finishes with its text or runs the requested tools and goes again.
/// The number of tool rounds is bounded by `max_tool_rounds`.
pub struct Orchestrator {
    provider: Arc<dyn LLMProvider>,
    tools: Arc<ToolRegistry>,
    state: Arc<AgentState>,
    context: ContextBuilder,
    model: String,
    options: ChatOptions,
    max_tool_rounds: u32,
}

impl Orchestrator {
    pub fn new(
        provider: Arc<dyn LLMProvider>,
        tools: Arc<ToolRegistry>,
        state: Arc<AgentState>,
        model: &str,
    ) -> Self {
        Self {
            provider,
            tools,
            state,
            context: ContextBuilder::new(),
            model: model.to_string(),
            options: ChatOptions::new(),
            max_tool_rounds: 10,
        }
    }

    /// Use a custom context builder.
    pub fn with_context(mut self, context: ContextBuilder) -> Self {
        self.context = context;
        self
    }

    /// Set chat options for every model call.
    pub fn with_options(mut self, options: ChatOptions) -> Self {
        self.options = options;
        self
    }

    /// Set the maximum number of tool rounds per turn.
    pub fn with_max_tool_rounds(mut self, rounds: u32) -> Self {
        self.max_tool_rounds = rounds;
        self
    }

    /// Shared state this orchestrator works on.
    pub fn state(&self) -> &Arc<AgentState> {
        &self.state
    }

    /// Process one user turn and return the text to reply with.
    ///
    /// Turns are appended to history as they happen. On success the history
    /// is persisted; on error the appended turns stay in memory and the
    /// caller reports the failure.
    pub async fn process(&self, user_turn: Turn, status: &dyn StatusSink) -> Result<String> {
        self.state.append_turns([user_turn]).await;

        let tool_definitions = self.tools.definitions();
        let mut rounds = 0u32;

        loop {
            let ctx = self.state.prompt_context().await;
            let messages = self.context.build_messages(ctx);

            let started = Instant::now();
            let response = self
                .provider
                .chat(
                    messages,
                    tool_definitions.clone(),
                    Some(&self.model),
                    self.options.clone(),
                )
                .await?;
            debug!(
                provider = self.provider.name(),
                round = rounds,
                tool_calls = response.tool_calls.len(),
                finish_reason = ?response.finish_reason,
                latency_ms = started.elapsed().as_millis() as u64,
                "Model responded"
            );

            if !response.has_tool_calls() {
                let answer = response.content;
                self.state
                    .append_turns([Turn::assistant(answer.clone())])
                    .await;
                self.state.save_history().await;
                return Ok(answer);
            }

            if rounds >= self.max_tool_rounds {
                warn!(
                    rounds = rounds,
                    "Tool loop reached maximum rounds, stopping"
                );
                self.state
                    .append_turns([Turn::assistant(TOO_MANY_STEPS)])
                    .await;
                self.state.save_history().await;
                return Ok(TOO_MANY_STEPS.to_string());
            }
            rounds += 1;

            self.state.append_turns([response.to_turn()]).await;

            status.status(STATUS_RUNNING_TOOLS).await;
            let results = self.run_tools(&response.tool_calls).await;
            self.state.append_turns(results).await;
            status.status(STATUS_PREPARING_ANSWER).await;
        }
    }

    /// Run one round of tool calls concurrently.
    ///
    /// Returns exactly one `tool` turn per call, in the order the model
    /// requested them.
    async fn run_tools(&self, calls: &[LLMToolCall]) -> Vec<Turn> {
        join_all(calls.iter().map(|call| async move {
            info!(tool = %call.name, id = %call.id, "Executing tool");
            let text = match parse_arguments(&call.arguments) {
                Ok(args) => match self.tools.execute(&call.name, args).await {
                    Ok(output) => {
                        if output.is_error {
                            warn!(tool = %call.name, "Tool reported an error result");
                        }
                        output.into_result_text()
                    }
                    Err(e) => format!("Error: {}", e),
                },
                Err(e) => {
                    warn!(tool = %call.name, error = %e, "Invalid JSON in tool arguments");
                    format!("Error: invalid arguments for {}: {}", call.name, e)
                }
            };
            Turn::tool_result(call.id.clone(), text)
        }))
        .await
    }
}

/// Parse tool arguments; an empty string means no arguments.
fn parse_arguments(raw: &str) -> serde_json::Result<Value> {
    if raw.trim().is_empty() {
        Ok(Value::Object(Default::default()))
    } else {
        serde_json::from_str(raw)
    }
}
