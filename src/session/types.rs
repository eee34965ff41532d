//! Conversation types for Sidekick
//!
//! A [`Turn`] is one entry of the conversation history. Its variants are tagged
//! by `role` on the wire, and user content is a list of explicitly tagged
//! [`ContentPart`]s (text or image reference).

use serde::{Deserialize, Serialize};

/// One entry in the conversation.
///
/// `System` only ever appears in prompts built for the model; it is never
/// stored in history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Turn {
    /// System preamble
    System { content: String },
    /// Inbound user message
    User { content: Vec<ContentPart> },
    /// Model output: final text and/or requested tool invocations
    Assistant {
        #[serde(default)]
        content: Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolCall>,
    },
    /// Result of one tool invocation
    Tool {
        tool_call_id: String,
        content: String,
    },
}

impl Turn {
    /// Create a system preamble.
    pub fn system(content: impl Into<String>) -> Self {
        Turn::System {
            content: content.into(),
        }
    }

    /// Create a user turn from content parts.
    pub fn user(content: Vec<ContentPart>) -> Self {
        Turn::User { content }
    }

    /// Create a text-only user turn.
    ///
    /// ```
    /// use sidekick::session::{Role, Turn};
    ///
    /// let turn = Turn::user_text("hello");
    /// assert_eq!(turn.role(), Role::User);
    /// ```
    pub fn user_text(text: impl Into<String>) -> Self {
        Turn::User {
            content: vec![ContentPart::text(text)],
        }
    }

    /// Create a final assistant answer.
    pub fn assistant(content: impl Into<String>) -> Self {
        Turn::Assistant {
            content: Some(content.into()),
            tool_calls: Vec::new(),
        }
    }

    /// Create an assistant turn that requests tool invocations.
    pub fn assistant_with_tools(content: Option<String>, tool_calls: Vec<ToolCall>) -> Self {
        Turn::Assistant {
            content,
            tool_calls,
        }
    }

    /// Create a tool result turn.
    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Turn::Tool {
            tool_call_id: tool_call_id.into(),
            content: content.into(),
        }
    }

    /// The role this turn is attributed to.
    pub fn role(&self) -> Role {
        match self {
            Turn::System { .. } => Role::System,
            Turn::User { .. } => Role::User,
            Turn::Assistant { .. } => Role::Assistant,
            Turn::Tool { .. } => Role::Tool,
        }
    }

    /// Tool invocations requested by this turn (empty for non-assistant turns).
    pub fn tool_calls(&self) -> &[ToolCall] {
        match self {
            Turn::Assistant { tool_calls, .. } => tool_calls,
            _ => &[],
        }
    }

    /// Check if this turn requests tool invocations.
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls().is_empty()
    }

    /// Concatenated text of this turn, ignoring images.
    pub fn text(&self) -> String {
        match self {
            Turn::System { content } | Turn::Tool { content, .. } => content.clone(),
            Turn::Assistant { content, .. } => content.clone().unwrap_or_default(),
            Turn::User { content } => content
                .iter()
                .filter_map(|part| match part {
                    ContentPart::Text { text } => Some(text.as_str()),
                    ContentPart::ImageUrl { .. } => None,
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

/// One part of a user turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    /// Plain text
    Text { text: String },
    /// Inline image reference (usually a `data:` URL)
    ImageUrl { image_url: ImageRef },
}

impl ContentPart {
    /// Create a text part.
    pub fn text(text: impl Into<String>) -> Self {
        ContentPart::Text { text: text.into() }
    }

    /// Create a high-detail image part.
    pub fn image(url: impl Into<String>) -> Self {
        ContentPart::ImageUrl {
            image_url: ImageRef {
                url: url.into(),
                detail: ImageDetail::High,
            },
        }
    }
}

/// An image the model should look at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRef {
    pub url: String,
    #[serde(default)]
    pub detail: ImageDetail,
}

/// Requested vision fidelity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageDetail {
    Low,
    High,
    #[default]
    Auto,
}

/// The role of a turn in a conversation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
            Role::Tool => write!(f, "tool"),
        }
    }
}

/// A tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Opaque identifier echoed back in the matching tool turn
    pub id: String,
    /// Name of the tool to call
    pub name: String,
    /// JSON-encoded arguments
    pub arguments: String,
}

impl ToolCall {
    /// Create a new tool call.
    ///
    /// ```
    /// use sidekick::session::ToolCall;
    ///
    /// let call = ToolCall::new("call_123", "search", r#"{"request": "weather"}"#);
    /// assert_eq!(call.name, "search");
    /// ```
    pub fn new(id: &str, name: &str, arguments: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            arguments: arguments.to_string(),
        }
    }

    /// Parse the arguments as a specific type.
    pub fn parse_arguments<T: serde::de::DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_str(&self.arguments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_user_turn_wire_shape() {
        let turn = Turn::user(vec![
            ContentPart::text("what is this?"),
            ContentPart::image("data:image/png;base64,AAAA"),
        ]);
        let value = serde_json::to_value(&turn).unwrap();
        assert_eq!(
            value,
            json!({
                "role": "user",
                "content": [
                    {"type": "text", "text": "what is this?"},
                    {"type": "image_url", "image_url": {"url": "data:image/png;base64,AAAA", "detail": "high"}}
                ]
            })
        );
    }

    #[test]
    fn test_assistant_without_tool_calls_omits_field() {
        let value = serde_json::to_value(Turn::assistant("hi")).unwrap();
        assert_eq!(value, json!({"role": "assistant", "content": "hi"}));
    }

    #[test]
    fn test_assistant_with_null_content_deserializes() {
        let turn: Turn = serde_json::from_value(json!({
            "role": "assistant",
            "content": null,
            "tool_calls": [{"id": "c1", "name": "time", "arguments": "{}"}]
        }))
        .unwrap();
        assert!(turn.has_tool_calls());
        assert_eq!(turn.tool_calls()[0].id, "c1");
        assert_eq!(turn.text(), "");
    }

    #[test]
    fn test_tool_result_turn() {
        let turn = Turn::tool_result("call_1", "Success");
        assert_eq!(turn.role(), Role::Tool);
        assert_eq!(turn.text(), "Success");
        assert!(!turn.has_tool_calls());
    }

    #[test]
    fn test_user_text_skips_images() {
        let turn = Turn::user(vec![
            ContentPart::text("one"),
            ContentPart::image("data:x"),
            ContentPart::text("two"),
        ]);
        assert_eq!(turn.text(), "one\ntwo");
    }

    #[test]
    fn test_image_detail_defaults_to_auto() {
        let part: ContentPart = serde_json::from_value(json!({
            "type": "image_url",
            "image_url": {"url": "https://example.com/a.png"}
        }))
        .unwrap();
        match part {
            ContentPart::ImageUrl { image_url } => assert_eq!(image_url.detail, ImageDetail::Auto),
            other => panic!("unexpected part: {:?}", other),
        }
    }

    #[test]
    fn test_role_display() {
        assert_eq!(Role::User.to_string(), "user");
        assert_eq!(Role::Tool.to_string(), "tool");
    }

    #[test]
    fn test_tool_call_parse_arguments() {
        #[derive(Deserialize)]
        struct Args {
            request: String,
        }
        let call = ToolCall::new("c", "think", r#"{"request":"why"}"#);
        let args: Args = call.parse_arguments().unwrap();
        assert_eq!(args.request, "why");
    }
}
