//! Tool types for Sidekick
//!
//! This module defines the `Tool` trait that every model-callable operation
//! implements, and the `ToolOutput` it produces.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;

/// Result text sent back to the model when a handler produced nothing.
pub const NO_RESPONSE: &str = "No response";

/// Result of one tool execution.
///
/// Logical failures such as "task not found" are ordinary output text so the
/// model can react to them conversationally; only broken collaborators
/// surface as `Err` from [`Tool::execute`].
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutput {
    /// Text for the model. `None` when the handler had nothing to say.
    pub content: Option<String>,
    /// Whether this result represents an error condition.
    pub is_error: bool,
}

impl ToolOutput {
    /// Plain result text.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            is_error: false,
        }
    }

    /// Handler returned nothing.
    pub fn empty() -> Self {
        Self {
            content: None,
            is_error: false,
        }
    }

    /// Error result the model should see.
    pub fn error(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            is_error: true,
        }
    }

    /// Text for the `tool` turn, with the placeholder for empty results.
    ///
    /// ```
    /// use sidekick::tools::ToolOutput;
    ///
    /// assert_eq!(ToolOutput::text("Success").into_result_text(), "Success");
    /// assert_eq!(ToolOutput::empty().into_result_text(), "No response");
    /// ```
    pub fn into_result_text(self) -> String {
        self.content.unwrap_or_else(|| NO_RESPONSE.to_string())
    }
}

/// Trait that all tools must implement.
///
/// # Example
///
/// ```rust
/// use async_trait::async_trait;
/// use serde_json::Value;
/// use sidekick::tools::{Tool, ToolOutput};
/// use sidekick::error::Result;
///
/// struct Ping;
///
/// #[async_trait]
/// impl Tool for Ping {
///     fn name(&self) -> &str { "ping" }
///     fn description(&self) -> &str { "Answers pong" }
///     fn parameters(&self) -> Value {
///         serde_json::json!({"type": "object", "properties": {}})
///     }
///     async fn execute(&self, _args: Value) -> Result<ToolOutput> {
///         Ok(ToolOutput::text("pong"))
///     }
/// }
/// ```
#[async_trait]
pub trait Tool: Send + Sync {
    /// Name the model uses to call the tool. Unique within a registry.
    fn name(&self) -> &str;

    /// Description sent to the model.
    fn description(&self) -> &str;

    /// JSON schema of the arguments. Offered to the model only; handlers
    /// check what they need themselves.
    fn parameters(&self) -> Value;

    /// Execute the tool with the parsed arguments.
    async fn execute(&self, args: Value) -> Result<ToolOutput>;
}

/// Read a required string argument.
pub(crate) fn required_str<'a>(args: &'a Value, key: &str) -> Result<&'a str> {
    args.get(key).and_then(Value::as_str).ok_or_else(|| {
        crate::error::SidekickError::Tool(format!("Missing '{}' parameter", key))
    })
}

/// Read the confirmation flag; anything but `true` counts as unconfirmed.
pub(crate) fn is_confirmed(args: &Value) -> bool {
    args.get("confirmed")
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tool_output_constructors() {
        assert!(!ToolOutput::text("x").is_error);
        assert!(ToolOutput::error("boom").is_error);
        assert_eq!(ToolOutput::empty().content, None);
    }

    #[test]
    fn test_required_str() {
        let args = json!({"request": "weather", "n": 1});
        assert_eq!(required_str(&args, "request").unwrap(), "weather");
        let err = required_str(&args, "n").unwrap_err();
        assert!(err.to_string().contains("Missing 'n' parameter"));
        assert!(required_str(&args, "absent").is_err());
    }

    #[test]
    fn test_is_confirmed() {
        assert!(is_confirmed(&json!({"confirmed": true})));
        assert!(!is_confirmed(&json!({"confirmed": false})));
        assert!(!is_confirmed(&json!({"confirmed": "true"})));
        assert!(!is_confirmed(&json!({})));
    }
}
