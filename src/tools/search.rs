//! `search` tool: web search through the configured backend.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::Result;
use crate::search::SearchBackend;

use super::types::required_str;
use super::{Tool, ToolOutput};

/// Returns the backend's raw result text. Backend failures propagate.
pub struct SearchTool {
    backend: Arc<dyn SearchBackend>,
}

impl SearchTool {
    pub fn new(backend: Arc<dyn SearchBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl Tool for SearchTool {
    fn name(&self) -> &str {
        "search"
    }

    fn description(&self) -> &str {
        "Search information on the Internet. If you do not have up-to-date information \
         or the user wants to look something up on the Internet, do it!"
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
        let results = self.backend.search(request).await?;
        Ok(ToolOutput::text(results))
    }
}
