//! Schedule tools: `schedule`, `getSchedule`, `removeFromSchedule`, `updateSchedule`.
//!
//! Mutating tools are confirmation-gated: with `confirmed` unset or false
//! they answer `Must be confirmed` and change nothing. Datetimes are
//! truncated to the minute before any lookup or insert.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::Result;
use crate::schedule::{RemoveError, ScheduleKey, UpdateError};
use crate::state::AgentState;

use super::types::{is_confirmed, required_str};
use super::{Tool, ToolOutput};

const SUCCESS: &str = "Success";
const MUST_BE_CONFIRMED: &str = "Must be confirmed";

const DATETIME_DESCRIPTION: &str = "Date and time in ISO 8601 format with timezone. Examples: \
\"2024-01-15T14:30:00Z\" (UTC), \"2024-01-15T14:30:00+03:00\" (Moscow), \
\"2024-01-15T14:30:00-05:00\" (New York). If the user did not specify a date, or did not \
specify whether something needs to be done today or tomorrow, then by default consider that today.";

/// Parse a datetime argument, or produce the result text the model sees.
fn parse_key(raw: &str) -> std::result::Result<ScheduleKey, ToolOutput> {
    ScheduleKey::parse(raw).ok_or_else(|| ToolOutput::text(format!("Invalid datetime: {}", raw)))
}

// ---------------------------------------------------------------------------
// schedule
// ---------------------------------------------------------------------------

/// Appends a task to the bucket of its minute.
pub struct ScheduleTool {
    state: Arc<AgentState>,
}

impl ScheduleTool {
    pub fn new(state: Arc<AgentState>) -> Self {
        Self { state }
    }
}

#[async_trait]
impl Tool for ScheduleTool {
    fn name(&self) -> &str {
        "schedule"
    }

    fn description(&self) -> &str {
        "Schedule tasks for specific times. IMPORTANT: 1) When creating tasks, always describe \
         what YOU (the AI) should do for the user at that time. Use formats like \"Remind the \
         user about [event]\" or \"Notify the user that [deadline approaching]\". 2) ALWAYS ask \
         for user confirmation before scheduling. Use this exact format for confirmation: \
         \"Подтверждаете задачу?\nЗадача: [task description]\nВремя: [date and time]\""
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "datetime": {
                    "type": "string",
                    "format": "date-time",
                    "description": DATETIME_DESCRIPTION
                },
                "task": {
                    "type": "string",
                    "description": "What YOU (the AI) need to do for the user at the scheduled time. \
                        Must be written from the AI perspective. Examples: \"Remind the user about the \
                        doctor appointment\", \"Notify the user that the project deadline is today\". \
                        Never write just \"meeting\", always write \"Remind the user about the meeting\"."
                },
                "confirmed": {
                    "type": "boolean",
                    "description": "Has the user explicitly confirmed the scheduled task? Set to false \
                        initially, then true only after the user confirms. BEFORE calling this function \
                        with confirmed=true, you MUST ask the user for confirmation using this exact \
                        format: \"Подтверждаете задачу?\\nЗадача: [task description]\\nВремя: [date and \
                        time in the user time zone in an understandable human language]\""
                }
            },
            "required": ["datetime", "task", "confirmed"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, args: Value) -> Result<ToolOutput> {
        if !is_confirmed(&args) {
            return Ok(ToolOutput::text(MUST_BE_CONFIRMED));
        }
        let key = match parse_key(required_str(&args, "datetime")?) {
            Ok(key) => key,
            Err(out) => return Ok(out),
        };
        let task = required_str(&args, "task")?;

        self.state.schedule_task(key, task).await;
        Ok(ToolOutput::text(SUCCESS))
    }
}

// ---------------------------------------------------------------------------
// getSchedule
// ---------------------------------------------------------------------------

/// Lists every bucket that still has tasks.
pub struct GetScheduleTool {
    state: Arc<AgentState>,
}

impl GetScheduleTool {
    pub fn new(state: Arc<AgentState>) -> Self {
        Self { state }
    }
}

#[async_trait]
impl Tool for GetScheduleTool {
    fn name(&self) -> &str {
        "getSchedule"
    }

    fn description(&self) -> &str {
        "CRITICAL: Get current schedule information. This function returns the ONLY accurate and \
         up-to-date schedule data. YOU MUST ALWAYS call this function when the user asks about \
         scheduled tasks, appointments, or reminders. NEVER rely on previous conversation history \
         about the schedule, it may be outdated. IGNORE any schedule information from earlier \
         messages. This function is the SINGLE SOURCE OF TRUTH for all scheduled tasks."
    }

    fn parameters(&self) -> Value {
        json!({"type": "object", "properties": {}})
    }

    async fn execute(&self, _args: Value) -> Result<ToolOutput> {
        let listing = self.state.schedule_listing().await;
        Ok(ToolOutput::text(serde_json::to_string(&listing)?))
    }
}

// ---------------------------------------------------------------------------
// removeFromSchedule
// ---------------------------------------------------------------------------

/// Deletes the first exact match of a task from its bucket.
pub struct RemoveFromScheduleTool {
    state: Arc<AgentState>,
}

impl RemoveFromScheduleTool {
    pub fn new(state: Arc<AgentState>) -> Self {
        Self { state }
    }
}

#[async_trait]
impl Tool for RemoveFromScheduleTool {
    fn name(&self) -> &str {
        "removeFromSchedule"
    }

    fn description(&self) -> &str {
        "Remove a task from the schedule"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "datetime": {
                    "type": "string",
                    "format": "date-time",
                    "description": DATETIME_DESCRIPTION
                },
                "task": {
                    "type": "string",
                    "description": "Exact task text. You can fetch it with the getSchedule tool."
                },
                "confirmed": {
                    "type": "boolean",
                    "description": "Has the user explicitly confirmed removing the scheduled task? Set \
                        to false initially, then true only after the user confirms. BEFORE calling this \
                        function with confirmed=true, you MUST ask the user for confirmation using this \
                        exact format: \"Вы точно хотите удалить задачу?\\nЗадача: [task description]\\n\
                        Время: [date and time in the user time zone in an understandable human language]\""
                }
            },
            "required": [],
            "additionalProperties": false
        })
    }

    async fn execute(&self, args: Value) -> Result<ToolOutput> {
        if !is_confirmed(&args) {
            return Ok(ToolOutput::text(MUST_BE_CONFIRMED));
        }
        let key = match parse_key(required_str(&args, "datetime")?) {
            Ok(key) => key,
            Err(out) => return Ok(out),
        };
        let task = required_str(&args, "task")?;

        Ok(ToolOutput::text(
            match self.state.unschedule_task(&key, task).await {
                Ok(()) => SUCCESS,
                Err(RemoveError::BucketNotFound) => "Tasks not found at this date and time",
                Err(RemoveError::TaskNotFound) => "This task not found",
            },
        ))
    }
}

// ---------------------------------------------------------------------------
// updateSchedule
// ---------------------------------------------------------------------------

/// Moves a task to a new time and/or rewrites its text.
pub struct UpdateScheduleTool {
    state: Arc<AgentState>,
}

impl UpdateScheduleTool {
    pub fn new(state: Arc<AgentState>) -> Self {
        Self { state }
    }
}

#[async_trait]
impl Tool for UpdateScheduleTool {
    fn name(&self) -> &str {
        "updateSchedule"
    }

    fn description(&self) -> &str {
        "CRITICAL: Update existing scheduled tasks. Use this function to modify task descriptions \
         or change the datetime of existing tasks. ALWAYS call getSchedule first to see current \
         tasks before updating. Use the EXACT task text and datetime from the getSchedule function."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "old_datetime": {
                    "type": "string",
                    "format": "date-time",
                    "description": "Current date and time in ISO 8601 format. Use the EXACT datetime \
                        from the getSchedule function. Examples: \"2024-01-15T14:30:00Z\", \
                        \"2024-01-15T14:30:00+03:00\""
                },
                "old_task": {
                    "type": "string",
                    "description": "Current task text that needs to be updated. Use the EXACT text \
                        from the getSchedule function."
                },
                "new_datetime": {
                    "type": "string",
                    "format": "date-time",
                    "description": "New date and time in ISO 8601 format. If not changing the time, \
                        use the same value as old_datetime."
                },
                "new_task": {
                    "type": "string",
                    "description": "New task text. Must be written from the AI perspective like \
                        \"Remind the user about...\", \"Notify the user that...\"."
                },
                "confirmed": {
                    "type": "boolean",
                    "description": "Has the user explicitly confirmed the update? Set to false \
                        initially, then true only after the user confirms. BEFORE calling this \
                        function with confirmed=true, you MUST ask the user for confirmation using \
                        this exact format: \"Подтверждаете изменение задачи?\\nСтарая задача: \
                        [old_task]\\nВремя: [old_datetime]\\nНовая задача: [new_task]\\nВремя: \
                        [new_datetime]\""
                }
            },
            "required": ["old_datetime", "old_task", "new_datetime", "new_task", "confirmed"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, args: Value) -> Result<ToolOutput> {
        if !is_confirmed(&args) {
            return Ok(ToolOutput::text(MUST_BE_CONFIRMED));
        }
        let old_raw = required_str(&args, "old_datetime")?;
        let new_raw = required_str(&args, "new_datetime")?;
        let old_key = match parse_key(old_raw) {
            Ok(key) => key,
            Err(out) => return Ok(out),
        };
        let new_key = match parse_key(new_raw) {
            Ok(key) => key,
            Err(out) => return Ok(out),
        };
        let old_task = required_str(&args, "old_task")?;
        let new_task = required_str(&args, "new_task")?;

        Ok(ToolOutput::text(
            match self
                .state
                .reschedule_task(&old_key, old_task, new_key, new_task)
                .await
            {
                Ok(()) => format!(
                    "Task updated successfully. Moved from {} to {}",
                    old_raw, new_raw
                ),
                Err(UpdateError::OldBucketNotFound) => {
                    "Original datetime not found in schedule".to_string()
                }
                Err(UpdateError::OldTaskNotFound) => "Original task not found".to_string(),
            },
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::InMemoryStore;
    use std::collections::BTreeMap;

    fn state() -> Arc<AgentState> {
        Arc::new(AgentState::new(Arc::new(InMemoryStore::new()), 50))
    }

    async fn run(tool: &dyn Tool, args: Value) -> String {
        tool.execute(args).await.unwrap().into_result_text()
    }

    async fn listing(state: &Arc<AgentState>) -> BTreeMap<String, Vec<String>> {
        let out = run(&GetScheduleTool::new(state.clone()), json!({})).await;
        serde_json::from_str(&out).unwrap()
    }

    #[tokio::test]
    async fn test_schedule_requires_confirmation() {
        let state = state();
        let tool = ScheduleTool::new(state.clone());
        for args in [
            json!({"datetime": "2026-10-20T10:00:00Z", "task": "t", "confirmed": false}),
            json!({"datetime": "2026-10-20T10:00:00Z", "task": "t"}),
        ] {
            assert_eq!(run(&tool, args).await, "Must be confirmed");
        }
        assert!(listing(&state).await.is_empty());
    }

    #[tokio::test]
    async fn test_schedule_truncates_to_minute() {
        let state = state();
        let tool = ScheduleTool::new(state.clone());
        let out = run(
            &tool,
            json!({"datetime": "2026-10-20T10:00:42.917+03:00", "task": "Remind the user to stretch", "confirmed": true}),
        )
        .await;
        assert_eq!(out, "Success");

        let listing = listing(&state).await;
        assert_eq!(
            listing.get("2026-10-20T07:00:00.000Z"),
            Some(&vec!["Remind the user to stretch".to_string()])
        );
    }

    #[tokio::test]
    async fn test_schedule_appends_to_existing_bucket() {
        let state = state();
        let tool = ScheduleTool::new(state.clone());
        for task in ["a", "b"] {
            run(
                &tool,
                json!({"datetime": "2026-10-20T10:00:05Z", "task": task, "confirmed": true}),
            )
            .await;
        }
        let listing = listing(&state).await;
        assert_eq!(listing["2026-10-20T10:00:00.000Z"], ["a", "b"]);
    }

    #[tokio::test]
    async fn test_schedule_invalid_datetime() {
        let state = state();
        let out = run(
            &ScheduleTool::new(state.clone()),
            json!({"datetime": "next tuesday", "task": "t", "confirmed": true}),
        )
        .await;
        assert_eq!(out, "Invalid datetime: next tuesday");
        assert!(listing(&state).await.is_empty());
    }

    #[tokio::test]
    async fn test_remove_outcomes() {
        let state = state();
        run(
            &ScheduleTool::new(state.clone()),
            json!({"datetime": "2026-10-20T10:00:00Z", "task": "keep", "confirmed": true}),
        )
        .await;
        let remove = RemoveFromScheduleTool::new(state.clone());

        let out = run(
            &remove,
            json!({"datetime": "2026-10-21T10:00:00Z", "task": "keep", "confirmed": true}),
        )
        .await;
        assert_eq!(out, "Tasks not found at this date and time");

        let out = run(
            &remove,
            json!({"datetime": "2026-10-20T10:00:00Z", "task": "other", "confirmed": true}),
        )
        .await;
        assert_eq!(out, "This task not found");
        assert_eq!(listing(&state).await["2026-10-20T10:00:00.000Z"], ["keep"]);

        let out = run(
            &remove,
            json!({"datetime": "2026-10-20T10:00:30Z", "task": "keep"}),
        )
        .await;
        assert_eq!(out, "Must be confirmed");

        let out = run(
            &remove,
            json!({"datetime": "2026-10-20T10:00:30Z", "task": "keep", "confirmed": true}),
        )
        .await;
        assert_eq!(out, "Success");
        assert!(listing(&state).await.is_empty());
    }

    #[tokio::test]
    async fn test_update_moves_task_between_buckets() {
        let state = state();
        run(
            &ScheduleTool::new(state.clone()),
            json!({"datetime": "2026-10-20T10:00:00Z", "task": "call", "confirmed": true}),
        )
        .await;

        let out = run(
            &UpdateScheduleTool::new(state.clone()),
            json!({
                "old_datetime": "2026-10-20T10:00:00Z",
                "old_task": "call",
                "new_datetime": "2026-10-20T12:30:00Z",
                "new_task": "Remind the user to call",
                "confirmed": true
            }),
        )
        .await;
        assert_eq!(
            out,
            "Task updated successfully. Moved from 2026-10-20T10:00:00Z to 2026-10-20T12:30:00Z"
        );

        let listing = listing(&state).await;
        assert_eq!(listing.len(), 1);
        assert_eq!(
            listing["2026-10-20T12:30:00.000Z"],
            ["Remind the user to call"]
        );
    }

    #[tokio::test]
    async fn test_update_same_bucket_leaves_single_copy() {
        let state = state();
        run(
            &ScheduleTool::new(state.clone()),
            json!({"datetime": "2026-10-20T10:00:00Z", "task": "call", "confirmed": true}),
        )
        .await;

        run(
            &UpdateScheduleTool::new(state.clone()),
            json!({
                "old_datetime": "2026-10-20T10:00:00Z",
                "old_task": "call",
                "new_datetime": "2026-10-20T10:00:59Z",
                "new_task": "call",
                "confirmed": true
            }),
        )
        .await;

        assert_eq!(listing(&state).await["2026-10-20T10:00:00.000Z"], ["call"]);
    }

    #[tokio::test]
    async fn test_update_failures_are_result_text() {
        let state = state();
        run(
            &ScheduleTool::new(state.clone()),
            json!({"datetime": "2026-10-20T10:00:00Z", "task": "call", "confirmed": true}),
        )
        .await;
        let update = UpdateScheduleTool::new(state.clone());

        let mut args = json!({
            "old_datetime": "2026-10-21T10:00:00Z",
            "old_task": "call",
            "new_datetime": "2026-10-22T10:00:00Z",
            "new_task": "call",
            "confirmed": true
        });
        assert_eq!(
            run(&update, args.clone()).await,
            "Original datetime not found in schedule"
        );

        args["old_datetime"] = json!("2026-10-20T10:00:00Z");
        args["old_task"] = json!("write");
        assert_eq!(run(&update, args.clone()).await, "Original task not found");

        args["confirmed"] = json!(false);
        assert_eq!(run(&update, args).await, "Must be confirmed");

        assert_eq!(listing(&state).await["2026-10-20T10:00:00.000Z"], ["call"]);
    }
}
