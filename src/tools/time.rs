//! `time` tool: the only clock the model is allowed to trust.

use async_trait::async_trait;
use chrono::{DateTime, Local, TimeZone};
use serde_json::{json, Value};

use crate::error::Result;

use super::{Tool, ToolOutput};

/// Render an instant like `Mon Oct 19 2026 14:03:00 GMT+0300`.
pub fn human_time<Tz: TimeZone>(at: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    at.format("%a %b %d %Y %H:%M:%S GMT%z").to_string()
}

/// Returns the current local date and time.
pub struct TimeTool;

#[async_trait]
impl Tool for TimeTool {
    fn name(&self) -> &str {
        "time"
    }

    fn description(&self) -> &str {
        "Find out what date and time is now."
    }

    fn parameters(&self) -> Value {
        json!({"type": "object", "properties": {}})
    }

    async fn execute(&self, _args: Value) -> Result<ToolOutput> {
        Ok(ToolOutput::text(human_time(&Local::now())))
    }
}
