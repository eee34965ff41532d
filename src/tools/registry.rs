//! Tool registry for Sidekick
//!
//! This module provides the `ToolRegistry` struct for managing and executing tools.
//! Tools are kept in registration order so the model always sees the same
//! tool list.

use std::time::Instant;

use serde_json::Value;
use tracing::{error, info};

use crate::error::Result;
use crate::providers::ToolDefinition;

use super::{Tool, ToolOutput};

/// A registry that holds and manages tools.
///
/// # Example
///
/// ```rust
/// use sidekick::tools::{ToolRegistry, time::TimeTool};
/// use serde_json::json;
///
/// # tokio_test::block_on(async {
/// let mut registry = ToolRegistry::new();
/// registry.register(Box::new(TimeTool));
///
/// assert!(registry.has("time"));
///
/// let result = registry.execute("time", json!({})).await;
/// assert!(result.is_ok());
/// # });
/// ```
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
}

impl ToolRegistry {
    /// Create a new empty tool registry.
    pub fn new() -> Self {
        Self { tools: Vec::new() }
    }

    /// Register a new tool in the registry.
    ///
    /// If a tool with the same name already exists, it is replaced in place
    /// and keeps its position.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        let name = tool.name().to_string();
        info!(tool = %name, "Registering tool");
        match self.tools.iter().position(|t| t.name() == name) {
            Some(index) => self.tools[index] = tool,
            None => self.tools.push(tool),
        }
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools
            .iter()
            .find(|t| t.name() == name)
            .map(|t| t.as_ref())
    }

    /// Execute a tool by name.
    ///
    /// Tool-not-found returns `Ok(ToolOutput::error(...))` so the model is
    /// told about the typo instead of the turn failing.
    pub async fn execute(&self, name: &str, args: Value) -> Result<ToolOutput> {
        let Some(tool) = self.get(name) else {
            return Ok(ToolOutput::error(format!("Tool not found: {}", name)));
        };

        let start = Instant::now();

        match tool.execute(args).await {
            Ok(output) => {
                info!(
                    tool = name,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Tool executed successfully"
                );
                Ok(output)
            }
            Err(e) => {
                error!(
                    tool = name,
                    error = %e,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Tool execution failed"
                );
                Err(e)
            }
        }
    }

    /// Tool definitions in registration order, for the provider.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools
            .iter()
            .map(|t| ToolDefinition::new(t.name(), t.description(), t.parameters()))
            .collect()
    }

    /// Names of all registered tools, in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    /// Check if a tool exists in the registry.
    pub fn has(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Get the number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
