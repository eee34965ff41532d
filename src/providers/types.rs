//! Provider types for Sidekick
//!
//! This module defines the `LLMProvider` trait, chat options and response types.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::session::{ToolCall, Turn};

/// Definition of a tool that can be called by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// The name of the tool (must be unique)
    pub name: String,
    /// Human-readable description of what the tool does
    pub description: String,
    /// JSON Schema describing the tool's parameters
    pub parameters: serde_json::Value,
}

impl ToolDefinition {
    /// Create a new tool definition.
    ///
    /// ```
    /// use sidekick::providers::ToolDefinition;
    /// use serde_json::json;
    ///
    /// let tool = ToolDefinition::new(
    ///     "search",
    ///     "Search the web",
    ///     json!({"type": "object", "properties": {"request": {"type": "string"}}}),
    /// );
    /// assert_eq!(tool.name, "search");
    /// ```
    pub fn new(name: &str, description: &str, parameters: serde_json::Value) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            parameters,
        }
    }
}

/// Trait for chat-completion backends.
///
/// The provider translates [`Turn`]s and [`ToolDefinition`]s into its wire
/// format and reports why the model stopped.
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Send a chat completion request.
    ///
    /// `model` overrides [`LLMProvider::default_model`] when set.
    async fn chat(
        &self,
        messages: Vec<Turn>,
        tools: Vec<ToolDefinition>,
        model: Option<&str>,
        options: ChatOptions,
    ) -> Result<LLMResponse>;

    /// Get the default model for this provider.
    fn default_model(&self) -> &str;

    /// Get the provider name.
    fn name(&self) -> &str;
}

/// Options for chat completion requests.
#[derive(Debug, Clone, Default)]
pub struct ChatOptions {
    /// Maximum number of tokens to generate
    pub max_tokens: Option<u32>,
    /// Temperature for sampling
    pub temperature: Option<f32>,
}

impl ChatOptions {
    /// Create new default chat options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of tokens to generate.
    ///
    /// ```
    /// use sidekick::providers::ChatOptions;
    ///
    /// let options = ChatOptions::new().with_max_tokens(1000);
    /// assert_eq!(options.max_tokens, Some(1000));
    /// ```
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Set the temperature for sampling.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// Why the model stopped generating.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// Natural end of a final answer
    Stop,
    /// The model wants tools executed
    ToolCalls,
    /// Output hit the token limit
    Length,
    /// Anything else the backend reported
    Other(String),
}

impl FinishReason {
    /// Map the Chat Completions `finish_reason` string.
    pub fn from_api(raw: Option<&str>) -> Self {
        match raw {
            None | Some("stop") => FinishReason::Stop,
            Some("tool_calls") | Some("function_call") => FinishReason::ToolCalls,
            Some("length") => FinishReason::Length,
            Some(other) => FinishReason::Other(other.to_string()),
        }
    }
}

/// Response from a chat completion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMResponse {
    /// Text content (empty when the model only requested tools)
    pub content: String,
    /// Tool calls requested by the model
    pub tool_calls: Vec<LLMToolCall>,
    /// Stop reason
    pub finish_reason: FinishReason,
    /// Token usage information (if available)
    pub usage: Option<Usage>,
}

impl LLMResponse {
    /// Create a final text response.
    ///
    /// ```
    /// use sidekick::providers::{FinishReason, LLMResponse};
    ///
    /// let response = LLMResponse::text("Hello, world!");
    /// assert_eq!(response.finish_reason, FinishReason::Stop);
    /// assert!(!response.has_tool_calls());
    /// ```
    pub fn text(content: &str) -> Self {
        Self {
            content: content.to_string(),
            tool_calls: vec![],
            finish_reason: FinishReason::Stop,
            usage: None,
        }
    }

    /// Create a response requesting tool calls.
    pub fn with_tools(content: &str, tool_calls: Vec<LLMToolCall>) -> Self {
        Self {
            content: content.to_string(),
            tool_calls,
            finish_reason: FinishReason::ToolCalls,
            usage: None,
        }
    }

    /// Override the stop reason.
    pub fn with_finish_reason(mut self, finish_reason: FinishReason) -> Self {
        self.finish_reason = finish_reason;
        self
    }

    /// Attach usage information.
    pub fn with_usage(mut self, usage: Usage) -> Self {
        self.usage = Some(usage);
        self
    }

    /// True when the model asked for tools and supplied at least one call.
    ///
    /// Some backends report `tool_calls` with an empty list, and some attach
    /// calls to other stop reasons; the calls themselves decide.
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }

    /// Text content, `None` when empty.
    pub fn content_opt(&self) -> Option<String> {
        if self.content.is_empty() {
            None
        } else {
            Some(self.content.clone())
        }
    }

    /// The assistant turn this response represents.
    pub fn to_turn(&self) -> Turn {
        if self.has_tool_calls() {
            Turn::assistant_with_tools(
                self.content_opt(),
                self.tool_calls.iter().map(LLMToolCall::to_tool_call).collect(),
            )
        } else {
            Turn::assistant(self.content.clone())
        }
    }
}

/// A tool call requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LLMToolCall {
    /// Unique identifier for this call
    pub id: String,
    /// Name of the tool
    pub name: String,
    /// JSON-encoded arguments
    pub arguments: String,
}

impl LLMToolCall {
    /// Create a new tool call.
    pub fn new(id: &str, name: &str, arguments: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            arguments: arguments.to_string(),
        }
    }

    /// Convert into the history representation.
    pub fn to_tool_call(&self) -> ToolCall {
        ToolCall::new(&self.id, &self.name, &self.arguments)
    }
}

/// Token usage reported by the provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

impl Usage {
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
        }
    }

    /// Prompt plus completion tokens.
    pub fn total(&self) -> u32 {
        self.prompt_tokens + self.completion_tokens
    }
}
