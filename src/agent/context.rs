//! Context builder for agent conversations
//!
//! This module builds the system preamble and message lists for the three
//! kinds of model calls the assistant makes: a conversation turn, a `think`
//! escalation, and a schedule sweep.

use chrono::{DateTime, Utc};

use crate::session::Turn;
use crate::state::PromptContext;

/// Persona shared by every model call.
pub const PERSONA: &str = "You are a personal assistant bot in Telegram. Be friendly. \
Do not use Markdown formatting. Reply in the language the user writes in.";

const MEMORY_ABILITY: &str = "You can remember personal information about the user \
to give more personalised answers.";

const TIME_INSTRUCTION: &str = "Whenever you need the current date and time, always call \
the time function. Whatever you think yourself, the current date and time always come \
from that function.";

/// Memory block, or `None` when nothing is known yet.
fn memory_section(memory: &str) -> Option<String> {
    if memory.trim().is_empty() {
        None
    } else {
        Some(format!("Here is what you know about the user:\n{}", memory))
    }
}

/// Builds prompts from the persona plus live state.
#[derive(Debug, Clone)]
pub struct ContextBuilder {
    persona: String,
}

impl Default for ContextBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ContextBuilder {
    /// Builder with the default persona.
    pub fn new() -> Self {
        Self {
            persona: PERSONA.to_string(),
        }
    }

    /// Replace the persona text.
    pub fn with_persona(mut self, persona: &str) -> Self {
        self.persona = persona.to_string();
        self
    }

    /// Persona plus memory, the preamble of the reduced prompts.
    fn reduced_preamble(&self, memory: &str) -> Vec<String> {
        let mut parts = vec![self.persona.clone()];
        parts.extend(memory_section(memory));
        parts
    }

    /// System preamble for a conversation turn.
    ///
    /// # Example
    /// ```rust
    /// use sidekick::agent::ContextBuilder;
    /// use sidekick::state::PromptContext;
    ///
    /// let ctx = PromptContext { memory: String::new(), pending_tasks: 2, turns: vec![] };
    /// let prompt = ContextBuilder::new().system_prompt(&ctx);
    /// assert!(prompt.contains("Tasks in the schedule: 2"));
    /// assert!(!prompt.contains("what you know about the user"));
    /// ```
    pub fn system_prompt(&self, ctx: &PromptContext) -> String {
        let mut parts = vec![self.persona.clone(), MEMORY_ABILITY.to_string()];
        parts.extend(memory_section(&ctx.memory));
        parts.push(TIME_INSTRUCTION.to_string());
        parts.push(format!("Tasks in the schedule: {}", ctx.pending_tasks));
        parts.join("\n\n")
    }

    /// System preamble followed by the history window.
    pub fn build_messages(&self, ctx: PromptContext) -> Vec<Turn> {
        let mut messages = Vec::with_capacity(ctx.turns.len() + 1);
        messages.push(Turn::system(self.system_prompt(&ctx)));
        messages.extend(ctx.turns);
        messages
    }

    /// Persona and memory only, then the escalated request. No history.
    pub fn think_messages(&self, memory: &str, request: &str) -> Vec<Turn> {
        vec![
            Turn::system(self.reduced_preamble(memory).join("\n\n")),
            Turn::user_text(request),
        ]
    }

    /// Prompt for one due schedule bucket.
    pub fn sweep_messages(&self, memory: &str, now: DateTime<Utc>, tasks: &[String]) -> Vec<Turn> {
        let mut parts = self.reduced_preamble(memory);
        parts.push(format!(
            "You checked the schedule and are now performing the tasks due at the current time ({})",
            now.to_rfc2822()
        ));
        let list = serde_json::to_string(tasks).unwrap_or_else(|_| format!("{:?}", tasks));
        vec![
            Turn::system(parts.join("\n\n")),
            Turn::user_text(format!("Perform the following tasks: {}", list)),
        ]
    }
}
