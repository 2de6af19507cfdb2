//! Host document collaborators.
//!
//! The core never touches an editor directly. It reads and writes whole
//! documents through [`DocumentStore`] and edits per-document metadata
//! through [`MetadataStore`].

use crate::{Result, TablesmithError};
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

/// Whole-document text access.
pub trait DocumentStore {
    /// Returns the full text of the document at `path`.
    fn read(&self, path: &str) -> Result<String>;

    /// Replaces the full text of the document at `path`.
    fn write(&self, path: &str, text: &str) -> Result<()>;

    /// The document the user is currently editing, if any.
    fn active_document_path(&self) -> Option<String>;
}

/// Key/value metadata attached to a document.
///
/// Each call is a complete read-modify-write of one key.
pub trait MetadataStore {
    fn read_key(&self, path: &str, key: &str) -> Result<Option<String>>;

    /// Creates or replaces `key`.
    fn set_key(&self, path: &str, key: &str, value: &str) -> Result<()>;

    /// Moves the value of `old_key` to `new_key`. Missing keys are a no-op.
    fn rename_key(&self, path: &str, old_key: &str, new_key: &str) -> Result<()>;

    /// Removes `key`. Missing keys are a no-op.
    fn delete_key(&self, path: &str, key: &str) -> Result<()>;
}

// ── Filesystem ──────────────────────────────────────────────────────

/// Documents stored as files below a root directory.
#[derive(Debug, Clone)]
pub struct FsDocumentStore {
    root: PathBuf,
    active: Option<String>,
}

impl FsDocumentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            active: None,
        }
    }

    /// Marks `path` (relative to the root) as the active document.
    pub fn set_active(&mut self, path: Option<&str>) {
        self.active = path.map(str::to_string);
    }

    fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(path)
    }
}

impl DocumentStore for FsDocumentStore {
    fn read(&self, path: &str) -> Result<String> {
        fs::read_to_string(self.resolve(path)).map_err(|e| match e.kind() {
            ErrorKind::NotFound => TablesmithError::DocumentNotFound(path.to_string()),
            _ => TablesmithError::Io(e),
        })
    }

    fn write(&self, path: &str, text: &str) -> Result<()> {
        let full = self.resolve(path);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(full, text)?;
        Ok(())
    }

    fn active_document_path(&self) -> Option<String> {
        self.active.clone()
    }
}

// ── In-memory ───────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct MemoryDocuments {
    documents: HashMap<String, String>,
    active: Option<String>,
}

/// Documents held in memory. Clones share the same documents.
#[derive(Debug, Clone, Default)]
pub struct MemoryDocumentStore {
    inner: Arc<Mutex<MemoryDocuments>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a document.
    pub fn insert(&self, path: &str, text: &str) {
        self.inner
            .lock()
            .expect("Mutex poisoned")
            .documents
            .insert(path.to_string(), text.to_string());
    }

    /// Marks `path` as the active document.
    pub fn set_active(&self, path: Option<&str>) {
        self.inner.lock().expect("Mutex poisoned").active = path.map(str::to_string);
    }
}

impl DocumentStore for MemoryDocumentStore {
    fn read(&self, path: &str) -> Result<String> {
        self.inner
            .lock()
            .expect("Mutex poisoned")
            .documents
            .get(path)
            .cloned()
            .ok_or_else(|| TablesmithError::DocumentNotFound(path.to_string()))
    }

    fn write(&self, path: &str, text: &str) -> Result<()> {
        self.insert(path, text);
        Ok(())
    }

    fn active_document_path(&self) -> Option<String> {
        self.inner.lock().expect("Mutex poisoned").active.clone()
    }
}
