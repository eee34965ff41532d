//! OpenAI Provider Implementation
//!
//! Implements the `LLMProvider` trait for OpenAI's Chat Completions API,
//! handling turn conversion (including multi-part user content with inline
//! images), tool calls, stop reasons and error classification.
//!
//! # Example
//!
//! ```rust,ignore
//! use sidekick::providers::{openai::OpenAIProvider, ChatOptions, LLMProvider};
//! use sidekick::session::Turn;
//!
//! async fn example() {
//!     let provider = OpenAIProvider::new("your-api-key");
//!     let turns = vec![Turn::system("Be brief."), Turn::user_text("Hello!")];
//!     let response = provider
//!         .chat(turns, vec![], None, ChatOptions::default())
//!         .await
//!         .unwrap();
//!     println!("OpenAI: {}", response.content);
//! }
//! ```

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, SidekickError};
use crate::session::{ContentPart, Turn};

use super::{
    parse_provider_error, ChatOptions, FinishReason, LLMProvider, LLMResponse, LLMToolCall,
    ToolDefinition, Usage,
};

/// The OpenAI API endpoint URL.
pub const OPENAI_API_URL: &str = "https://api.openai.com/v1";

/// The default OpenAI model to use.
const DEFAULT_MODEL: &str = "gpt-4.1";

// ============================================================================
// OpenAI API Request Types
// ============================================================================

/// OpenAI API request body.
#[derive(Debug, Serialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<OpenAITool>>,
    /// `max_tokens` is rejected by reasoning models; this name works everywhere.
    #[serde(skip_serializing_if = "Option::is_none")]
    max_completion_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

/// A message in OpenAI's format.
#[derive(Debug, Serialize)]
struct OpenAIMessage {
    /// Role: "system", "user", "assistant", or "tool"
    role: &'static str,
    /// Message content (null for assistant turns that only call tools)
    content: Option<OpenAIContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<OpenAIToolCallRequest>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

/// Plain string or list of typed parts.
#[derive(Debug, Serialize)]
#[serde(untagged)]
enum OpenAIContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

/// A tool call in a request (assistant requesting tool execution).
#[derive(Debug, Serialize)]
struct OpenAIToolCallRequest {
    id: String,
    r#type: &'static str,
    function: OpenAIFunctionCall,
}

/// Function call details.
#[derive(Debug, Serialize, Deserialize)]
struct OpenAIFunctionCall {
    name: String,
    /// JSON-encoded arguments
    #[serde(default)]
    arguments: String,
}

/// OpenAI tool definition.
#[derive(Debug, Serialize)]
struct OpenAITool {
    r#type: &'static str,
    function: OpenAIFunctionDef,
}

#[derive(Debug, Serialize)]
struct OpenAIFunctionDef {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

// ============================================================================
// OpenAI API Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
    usage: Option<OpenAIUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponseMessage {
    content: Option<String>,
    tool_calls: Option<Vec<OpenAIToolCallResponse>>,
}

#[derive(Debug, Deserialize)]
struct OpenAIToolCallResponse {
    id: String,
    function: OpenAIFunctionCall,
}

#[derive(Debug, Deserialize)]
struct OpenAIUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct OpenAIErrorResponse {
    error: OpenAIError,
}

#[derive(Debug, Deserialize)]
struct OpenAIError {
    message: String,
}

// ============================================================================
// OpenAI Provider
// ============================================================================

/// OpenAI chat-completion provider.
pub struct OpenAIProvider {
    api_key: String,
    api_base: String,
    client: Client,
}

impl OpenAIProvider {
    /// Create a provider for the public OpenAI endpoint.
    ///
    /// ```
    /// use sidekick::providers::openai::OpenAIProvider;
    /// use sidekick::providers::LLMProvider;
    ///
    /// let provider = OpenAIProvider::new("sk-xxx");
    /// assert_eq!(provider.name(), "openai");
    /// ```
    pub fn new(api_key: &str) -> Self {
        Self::with_client(api_key, OPENAI_API_URL, Client::new())
    }

    /// Create a provider with a preconfigured HTTP client (proxy, timeouts).
    pub fn with_client(api_key: &str, api_base: &str, client: Client) -> Self {
        Self {
            api_key: api_key.to_string(),
            api_base: api_base.trim_end_matches('/').to_string(),
            client,
        }
    }
}

// ============================================================================
// Conversion Functions
// ============================================================================

/// Convert turns to OpenAI API messages.
fn convert_turns(turns: Vec<Turn>) -> Vec<OpenAIMessage> {
    turns
        .into_iter()
        .map(|turn| match turn {
            Turn::System { content } => OpenAIMessage {
                role: "system",
                content: Some(OpenAIContent::Text(content)),
                tool_calls: None,
                tool_call_id: None,
            },
            Turn::User { content } => OpenAIMessage {
                role: "user",
                content: Some(OpenAIContent::Parts(content)),
                tool_calls: None,
                tool_call_id: None,
            },
            Turn::Assistant {
                content,
                tool_calls,
            } => {
                let tool_calls = if tool_calls.is_empty() {
                    None
                } else {
                    Some(
                        tool_calls
                            .into_iter()
                            .map(|tc| OpenAIToolCallRequest {
                                id: tc.id,
                                r#type: "function",
                                function: OpenAIFunctionCall {
                                    name: tc.name,
                                    arguments: tc.arguments,
                                },
                            })
                            .collect(),
                    )
                };
                OpenAIMessage {
                    role: "assistant",
                    content: content
                        .filter(|c| !c.is_empty() || tool_calls.is_none())
                        .map(OpenAIContent::Text),
                    tool_calls,
                    tool_call_id: None,
                }
            }
            Turn::Tool {
                tool_call_id,
                content,
            } => OpenAIMessage {
                role: "tool",
                content: Some(OpenAIContent::Text(content)),
                tool_calls: None,
                tool_call_id: Some(tool_call_id),
            },
        })
        .collect()
}

/// Convert tool definitions to OpenAI API format.
fn convert_tools(tools: Vec<ToolDefinition>) -> Vec<OpenAITool> {
    tools
        .into_iter()
        .map(|t| OpenAITool {
            r#type: "function",
            function: OpenAIFunctionDef {
                name: t.name,
                description: t.description,
                parameters: t.parameters,
            },
        })
        .collect()
}

/// Convert an OpenAI API response to an `LLMResponse`.
fn convert_response(response: OpenAIResponse) -> Result<LLMResponse> {
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| SidekickError::Provider("OpenAI response has no choices".to_string()))?;

    let content = choice.message.content.unwrap_or_default();
    let tool_calls: Vec<LLMToolCall> = choice
        .message
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .map(|tc| LLMToolCall::new(&tc.id, &tc.function.name, &tc.function.arguments))
        .collect();

    let mut llm_response = LLMResponse {
        content,
        tool_calls,
        finish_reason: FinishReason::from_api(choice.finish_reason.as_deref()),
        usage: None,
    };

    if let Some(usage) = response.usage {
        llm_response =
            llm_response.with_usage(Usage::new(usage.prompt_tokens, usage.completion_tokens));
    }

    Ok(llm_response)
}

// ============================================================================
// LLMProvider Implementation
// ============================================================================

#[async_trait]
impl LLMProvider for OpenAIProvider {
    async fn chat(
        &self,
        messages: Vec<Turn>,
        tools: Vec<ToolDefinition>,
        model: Option<&str>,
        options: ChatOptions,
    ) -> Result<LLMResponse> {
        let model = model.unwrap_or(DEFAULT_MODEL);
        let request = OpenAIRequest {
            model: model.to_string(),
            messages: convert_turns(messages),
            tools: if tools.is_empty() {
                None
            } else {
                Some(convert_tools(tools))
            },
            max_completion_tokens: options.max_tokens,
            temperature: options.temperature,
        };

        debug!(model = model, messages = request.messages.len(), "OpenAI request");

        let response = self
            .client
            .post(format!("{}/chat/completions", self.api_base))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| SidekickError::Provider(format!("OpenAI request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<OpenAIErrorResponse>(&error_text)
                .map(|e| e.error.message)
                .unwrap_or(error_text);
            return Err(parse_provider_error(status.as_u16(), &detail).into());
        }

        let openai_response: OpenAIResponse = response.json().await.map_err(|e| {
            SidekickError::Provider(format!("Failed to parse OpenAI response: {}", e))
        })?;

        let llm_response = convert_response(openai_response)?;
        debug!(
            model = model,
            finish_reason = ?llm_response.finish_reason,
            tool_calls = llm_response.tool_calls.len(),
            tokens = llm_response.usage.as_ref().map(Usage::total).unwrap_or(0),
            "OpenAI response received"
        );
        Ok(llm_response)
    }

    fn default_model(&self) -> &str {
        DEFAULT_MODEL
    }

    fn name(&self) -> &str {
        "openai"
    }
}

// ============================================================================
// Tests
// ============================================================================
