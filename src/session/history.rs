//! In-memory conversation history.
//!
//! The history is an append-only list of [`Turn`]s that can be windowed for
//! prompts, trimmed by the `clearMessageHistory` tool and wiped by `/clear`.

use serde::{Deserialize, Serialize};

use crate::session::Turn;

/// Ordered list of conversation turns.
///
/// Serializes as a plain JSON array so the durable document stays readable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationHistory {
    turns: Vec<Turn>,
}

impl ConversationHistory {
    /// Create an empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a history from already-ordered turns.
    pub fn from_turns(turns: Vec<Turn>) -> Self {
        Self { turns }
    }

    /// Append several turns, keeping their order.
    pub fn extend(&mut self, turns: impl IntoIterator<Item = Turn>) {
        self.turns.extend(turns);
    }

    /// All turns, oldest first.
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Number of turns held in memory.
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// True when no turns are held.
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// The most recent turn.
    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    /// The most recent `n` turns, suitable as model context.
    ///
    /// Leading `tool` turns whose requesting `assistant` turn fell outside the
    /// window are skipped, so every tool result in the window still follows
    /// the turn that asked for it.
    pub fn window(&self, n: usize) -> &[Turn] {
        let start = self.turns.len().saturating_sub(n);
        let mut window = &self.turns[start..];
        while let Some(Turn::Tool { .. }) = window.first() {
            window = &window[1..];
        }
        window
    }

    /// Drop everything except the most recent `n` turns.
    pub fn keep_last(&mut self, n: usize) {
        let start = self.turns.len().saturating_sub(n);
        self.turns.drain(..start);
    }

    /// Remove every turn.
    pub fn clear(&mut self) {
        self.turns.clear();
    }

    /// Serialize the most recent `n` turns for durable storage.
    pub fn to_document(&self, n: usize) -> serde_json::Result<String> {
        let start = self.turns.len().saturating_sub(n);
        serde_json::to_string(&self.turns[start..])
    }

    /// Parse a stored document.
    pub fn from_document(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw)
    }
}
