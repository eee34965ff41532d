//! Shared assistant state.
//!
//! [`AgentState`] owns the conversation history, the memory document and the
//! schedule behind a single async mutex. The orchestrator, the tools and the
//! schedule sweep all hold it through an `Arc`. Each operation locks, mutates,
//! persists the touched document and unlocks; callers never hold the lock
//! across a model or transport call.

pub mod store;

pub use store::{Document, FileStore, InMemoryStore, StateStore};

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::schedule::{RemoveError, Schedule, ScheduleKey, UpdateError};
use crate::session::{ConversationHistory, Turn};

/// Everything the orchestrator needs to build one prompt.
#[derive(Debug, Clone)]
pub struct PromptContext {
    /// Current memory document (may be empty)
    pub memory: String,
    /// Number of tasks waiting in the schedule
    pub pending_tasks: usize,
    /// Most recent history turns, oldest first
    pub turns: Vec<Turn>,
}

#[derive(Debug, Default)]
struct Documents {
    history: ConversationHistory,
    memory: String,
    schedule: Schedule,
}

/// Single owner of the three shared documents.
pub struct AgentState {
    docs: Mutex<Documents>,
    store: Arc<dyn StateStore>,
    history_window: usize,
}

impl AgentState {
    /// Empty state backed by `store`.
    pub fn new(store: Arc<dyn StateStore>, history_window: usize) -> Self {
        Self {
            docs: Mutex::new(Documents::default()),
            store,
            history_window,
        }
    }

    /// Load all three documents from `store`.
    ///
    /// Each document is loaded on its own: a missing, unreadable or corrupt
    /// document is logged and replaced by its empty default without
    /// affecting the others.
    pub async fn load(store: Arc<dyn StateStore>, history_window: usize) -> Self {
        let history = match store.load(Document::History).await {
            Ok(Some(raw)) => ConversationHistory::from_document(&raw).unwrap_or_else(|e| {
                warn!(error = %e, "Corrupt history document, starting empty");
                ConversationHistory::new()
            }),
            Ok(None) => ConversationHistory::new(),
            Err(e) => {
                warn!(error = %e, "Failed to load history, starting empty");
                ConversationHistory::new()
            }
        };

        let memory = match store.load(Document::Memory).await {
            Ok(Some(raw)) => raw,
            Ok(None) => String::new(),
            Err(e) => {
                warn!(error = %e, "Failed to load memory, starting empty");
                String::new()
            }
        };

        let schedule = match store.load(Document::Schedule).await {
            Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                warn!(error = %e, "Corrupt schedule document, starting empty");
                Schedule::new()
            }),
            Ok(None) => Schedule::new(),
            Err(e) => {
                warn!(error = %e, "Failed to load schedule, starting empty");
                Schedule::new()
            }
        };

        debug!(
            store = store.name(),
            turns = history.len(),
            memory_chars = memory.chars().count(),
            pending_tasks = schedule.pending_count(),
            "State loaded"
        );

        Self {
            docs: Mutex::new(Documents {
                history,
                memory,
                schedule,
            }),
            store,
            history_window,
        }
    }

    /// Number of turns kept on disk and offered to the model.
    pub fn history_window(&self) -> usize {
        self.history_window
    }

    /// Write one document while the caller still holds the lock.
    ///
    /// Failures are logged; the in-memory value stays authoritative.
    async fn persist(&self, docs: &Documents, doc: Document) {
        let serialized = match doc {
            Document::History => docs.history.to_document(self.history_window),
            Document::Memory => Ok(docs.memory.clone()),
            Document::Schedule => serde_json::to_string(&docs.schedule),
        };
        let result = match serialized {
            Ok(contents) => self.store.save(doc, &contents).await,
            Err(e) => Err(e.into()),
        };
        if let Err(e) = result {
            warn!(document = doc.as_str(), error = %e, "Failed to persist state");
        }
    }

    // ------------------------------------------------------------------
    // History
    // ------------------------------------------------------------------

    /// Memory, pending task count and the history window for a prompt.
    pub async fn prompt_context(&self) -> PromptContext {
        let docs = self.docs.lock().await;
        PromptContext {
            memory: docs.memory.clone(),
            pending_tasks: docs.schedule.pending_count(),
            turns: docs.history.window(self.history_window).to_vec(),
        }
    }

    /// Append turns in memory. They reach disk with the next history save.
    pub async fn append_turns(&self, turns: impl IntoIterator<Item = Turn>) {
        self.docs.lock().await.history.extend(turns);
    }

    /// Persist the last `history_window` turns.
    pub async fn save_history(&self) {
        let docs = self.docs.lock().await;
        self.persist(&docs, Document::History).await;
    }

    /// Drop every turn except the most recent `n`, then persist.
    pub async fn keep_last_turns(&self, n: usize) {
        let mut docs = self.docs.lock().await;
        docs.history.keep_last(n);
        self.persist(&docs, Document::History).await;
    }

    /// Wipe the whole history, then persist.
    pub async fn clear_history(&self) {
        let mut docs = self.docs.lock().await;
        docs.history.clear();
        self.persist(&docs, Document::History).await;
    }

    /// Copy of the in-memory history.
    pub async fn history(&self) -> ConversationHistory {
        self.docs.lock().await.history.clone()
    }

    // ------------------------------------------------------------------
    // Memory
    // ------------------------------------------------------------------

    /// Current memory document.
    pub async fn memory(&self) -> String {
        self.docs.lock().await.memory.clone()
    }

    /// Replace the memory document wholesale, then persist.
    pub async fn replace_memory(&self, info: impl Into<String>) {
        let mut docs = self.docs.lock().await;
        docs.memory = info.into();
        self.persist(&docs, Document::Memory).await;
    }

    // ------------------------------------------------------------------
    // Schedule
    // ------------------------------------------------------------------

    /// Append a task to a bucket, then persist.
    pub async fn schedule_task(&self, key: ScheduleKey, task: impl Into<String>) {
        let mut docs = self.docs.lock().await;
        docs.schedule.add(key, task);
        self.persist(&docs, Document::Schedule).await;
    }

    /// Remove a task by value; persists only when something changed.
    pub async fn unschedule_task(&self, key: &ScheduleKey, task: &str) -> Result<(), RemoveError> {
        let mut docs = self.docs.lock().await;
        docs.schedule.remove(key, task)?;
        self.persist(&docs, Document::Schedule).await;
        Ok(())
    }

    /// Move a task between buckets; persists only when something changed.
    pub async fn reschedule_task(
        &self,
        old_key: &ScheduleKey,
        old_task: &str,
        new_key: ScheduleKey,
        new_task: impl Into<String>,
    ) -> Result<(), UpdateError> {
        let mut docs = self.docs.lock().await;
        docs.schedule.update(old_key, old_task, new_key, new_task)?;
        self.persist(&docs, Document::Schedule).await;
        Ok(())
    }

    /// Non-empty buckets keyed by rendered instant.
    pub async fn schedule_listing(&self) -> BTreeMap<String, Vec<String>> {
        self.docs.lock().await.schedule.listing()
    }

    /// Snapshot of buckets due at `now`.
    pub async fn due_tasks(&self, now: DateTime<Utc>) -> Vec<(ScheduleKey, Vec<String>)> {
        self.docs.lock().await.schedule.due(now)
    }

    /// Remove performed tasks from a bucket, then persist.
    pub async fn drain_bucket(&self, key: &ScheduleKey, dispatched: &[String]) {
        let mut docs = self.docs.lock().await;
        if docs.schedule.drain(key, dispatched) {
            self.persist(&docs, Document::Schedule).await;
        }
    }

    /// Copy of the whole schedule, drained buckets included.
    pub async fn schedule(&self) -> Schedule {
        self.docs.lock().await.schedule.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Result, SidekickError};
    use async_trait::async_trait;

    fn key(raw: &str) -> ScheduleKey {
        ScheduleKey::parse(raw).unwrap()
    }

    /// Store whose reads and writes always fail.
    struct BrokenStore;

    #[async_trait]
    impl StateStore for BrokenStore {
        fn name(&self) -> &str {
            "broken"
        }
        async fn load(&self, _doc: Document) -> Result<Option<String>> {
            Err(SidekickError::Storage("disk on fire".into()))
        }
        async fn save(&self, _doc: Document, _contents: &str) -> Result<()> {
            Err(SidekickError::Storage("disk on fire".into()))
        }
    }

    #[tokio::test]
    async fn test_load_isolates_corrupt_documents() {
        let store = Arc::new(InMemoryStore::with_documents([
            (Document::History, "{ not json".to_string()),
            (Document::Memory, "likes tea".to_string()),
            (
                Document::Schedule,
                r#"{"2024-01-15T10:00:00.000Z":["Remind the user to stretch"]}"#.to_string(),
            ),
        ]));
        let state = AgentState::load(store, 50).await;

        assert!(state.history().await.is_empty());
        assert_eq!(state.memory().await, "likes tea");
        assert_eq!(state.schedule().await.pending_count(), 1);
    }

    #[tokio::test]
    async fn test_load_failure_falls_back_to_empty() {
        let state = AgentState::load(Arc::new(BrokenStore), 50).await;
        assert!(state.history().await.is_empty());
        assert!(state.memory().await.is_empty());
        assert_eq!(state.schedule().await.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_persist_failure_keeps_memory_value() {
        let state = AgentState::new(Arc::new(BrokenStore), 50);
        state.replace_memory("profile A").await;
        assert_eq!(state.memory().await, "profile A");
    }

    #[tokio::test]
    async fn test_replace_memory_persists() {
        let store = Arc::new(InMemoryStore::new());
        let state = AgentState::new(store.clone(), 50);
        state.replace_memory("profile A").await;
        state.replace_memory("profile B").await;
        assert_eq!(state.memory().await, "profile B");
        assert_eq!(store.get(Document::Memory).await.as_deref(), Some("profile B"));
    }

    #[tokio::test]
    async fn test_history_save_truncates_to_window() {
        let store = Arc::new(InMemoryStore::new());
        let state = AgentState::new(store.clone(), 3);
        state
            .append_turns((0..5).map(|i| Turn::user_text(format!("m{}", i))))
            .await;
        assert!(store.get(Document::History).await.is_none());

        state.save_history().await;

        let saved = ConversationHistory::from_document(
            &store.get(Document::History).await.unwrap(),
        )
        .unwrap();
        assert_eq!(saved.len(), 3);
        assert_eq!(saved.turns()[0].text(), "m2");
        assert_eq!(state.history().await.len(), 5);
    }

    #[tokio::test]
    async fn test_prompt_context() {
        let state = AgentState::new(Arc::new(InMemoryStore::new()), 2);
        state.replace_memory("name: Alex").await;
        state.schedule_task(key("2030-01-01T09:00:00Z"), "a").await;
        state.schedule_task(key("2030-01-02T09:00:00Z"), "b").await;
        state
            .append_turns(vec![
                Turn::user_text("1"),
                Turn::assistant("2"),
                Turn::user_text("3"),
            ])
            .await;

        let ctx = state.prompt_context().await;
        assert_eq!(ctx.memory, "name: Alex");
        assert_eq!(ctx.pending_tasks, 2);
        assert_eq!(ctx.turns.len(), 2);
        assert_eq!(ctx.turns[1].text(), "3");
    }

    #[tokio::test]
    async fn test_schedule_round_trip_through_store() {
        let store = Arc::new(InMemoryStore::new());
        let state = AgentState::new(store.clone(), 50);
        let k = key("2030-05-01T10:00:17Z");
        state.schedule_task(k, "Remind the user to call their friend").await;

        let reloaded = AgentState::load(store, 50).await;
        let listing = reloaded.schedule_listing().await;
        assert_eq!(
            listing["2030-05-01T10:00:00.000Z"],
            ["Remind the user to call their friend"]
        );
    }

    #[tokio::test]
    async fn test_rejected_removal_does_not_persist() {
        let store = Arc::new(InMemoryStore::new());
        let state = AgentState::new(store.clone(), 50);
        let result = state
            .unschedule_task(&key("2030-01-01T00:00:00Z"), "nothing")
            .await;
        assert_eq!(result, Err(RemoveError::BucketNotFound));
        assert!(store.get(Document::Schedule).await.is_none());
    }

    #[tokio::test]
    async fn test_clear_and_keep_last() {
        let store = Arc::new(InMemoryStore::new());
        let state = AgentState::new(store.clone(), 50);
        state
            .append_turns((0..4).map(|i| Turn::user_text(i.to_string())))
            .await;

        state.keep_last_turns(1).await;
        assert_eq!(state.history().await.len(), 1);

        state.clear_history().await;
        assert!(state.history().await.is_empty());
        assert_eq!(store.get(Document::History).await.as_deref(), Some("[]"));
    }
}
