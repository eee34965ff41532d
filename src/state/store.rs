//! Durable storage for the three state documents.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

use crate::error::{Result, SidekickError};

/// The documents the assistant persists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Document {
    History,
    Memory,
    Schedule,
}

impl Document {
    /// File name used by [`FileStore`].
    pub fn file_name(&self) -> &'static str {
        match self {
            Document::History => "history.json",
            Document::Memory => "memory.txt",
            Document::Schedule => "schedule.json",
        }
    }

    /// Short name for logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Document::History => "history",
            Document::Memory => "memory",
            Document::Schedule => "schedule",
        }
    }
}

/// Key-value durable store, one value per [`Document`].
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Backend name (e.g., "file", "memory").
    fn name(&self) -> &str;

    /// Read a document. `Ok(None)` means it was never written.
    async fn load(&self, doc: Document) -> Result<Option<String>>;

    /// Replace a document.
    async fn save(&self, doc: Document, contents: &str) -> Result<()>;
}

// ============================================================================
// File store
// ============================================================================

/// Stores each document as a file inside one data directory.
///
/// Writes go to a temporary sibling first and are renamed into place, so a
/// crash mid-write leaves the previous version intact.
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The data directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, doc: Document) -> PathBuf {
        self.dir.join(doc.file_name())
    }
}

#[async_trait]
impl StateStore for FileStore {
    fn name(&self) -> &str {
        "file"
    }

    async fn load(&self, doc: Document) -> Result<Option<String>> {
        match tokio::fs::read_to_string(self.path(doc)).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(SidekickError::Storage(format!(
                "failed to read {}: {}",
                doc.file_name(),
                e
            ))),
        }
    }

    async fn save(&self, doc: Document, contents: &str) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let target = self.path(doc);
        let tmp = self.dir.join(format!(".{}.tmp", doc.file_name()));
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(contents.as_bytes()).await?;
        // Data must be on disk before the rename publishes it.
        file.sync_all().await?;
        drop(file);
        tokio::fs::rename(&tmp, &target).await.map_err(|e| {
            SidekickError::Storage(format!("failed to replace {}: {}", doc.file_name(), e))
        })?;
        Ok(())
    }
}

// ============================================================================
// In-memory store
// ============================================================================

/// Volatile store for tests and dry runs.
#[derive(Default)]
pub struct InMemoryStore {
    docs: RwLock<HashMap<Document, String>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a store with existing documents.
    pub fn with_documents(docs: impl IntoIterator<Item = (Document, String)>) -> Self {
        Self {
            docs: RwLock::new(docs.into_iter().collect()),
        }
    }

    /// Current raw contents of a document.
    pub async fn get(&self, doc: Document) -> Option<String> {
        self.docs.read().await.get(&doc).cloned()
    }
}

#[async_trait]
impl StateStore for InMemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn load(&self, doc: Document) -> Result<Option<String>> {
        Ok(self.get(doc).await)
    }

    async fn save(&self, doc: Document, contents: &str) -> Result<()> {
        self.docs.write().await.insert(doc, contents.to_string());
        Ok(())
    }
}
