//! `remember` tool: wholesale replacement of the user profile.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::Result;
use crate::state::AgentState;

use super::types::required_str;
use super::{Tool, ToolOutput};

const REMEMBERED: &str =
    "User profile completely updated - outdated information removed, current details preserved";

/// Replaces the memory document with the profile the model supplies.
///
/// The model is expected to merge what it already knows; this tool never
/// appends.
pub struct RememberTool {
    state: Arc<AgentState>,
}

impl RememberTool {
    pub fn new(state: Arc<AgentState>) -> Self {
        Self { state }
    }
}

#[async_trait]
impl Tool for RememberTool {
    fn name(&self) -> &str {
        "remember"
    }

    fn description(&self) -> &str {
        "YOU MUST ALWAYS call this function when the user shares personal information or asks you \
         to remember something. This function COMPLETELY REPLACES all stored memory with new \
         comprehensive information. Analyze existing knowledge, UPDATE outdated information, \
         REMOVE irrelevant details, and ADD new information. Create a clean, current, and \
         comprehensive user profile."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "info": {
                    "type": "string",
                    "description": "COMPLETE updated user profile that will REPLACE all existing memory. \
                        Should include: 1) Current and relevant personal details (name, age, location, job), \
                        2) Active preferences and habits, 3) Recent plans and goals, 4) Important ongoing \
                        relationships/projects. EXCLUDE: outdated information (old jobs, completed projects, \
                        changed preferences), temporary details that are no longer relevant, contradictory \
                        information (keep only the most recent). Example: \"User is John Smith, 29 years old \
                        (updated from 28), software developer at New Tech Company (changed jobs), lives in \
                        Moscow. Has dog named Buddy. Prefers coffee. Currently planning wedding for next year \
                        (removed old Paris trip - completed).\""
                }
            },
            "required": ["info"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, args: Value) -> Result<ToolOutput> {
        let info = required_str(&args, "info")?;
        self.state.replace_memory(info).await;
        Ok(ToolOutput::text(REMEMBERED))
    }
}
