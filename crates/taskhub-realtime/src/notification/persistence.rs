//! Durable storage for the notification history document.
//!
//! The history is always written in full. File writes go through a
//! temporary sibling and a rename so a crash never leaves a half-written
//! document behind.

use std::collections::HashMap;
use std::fmt::Debug;
use std::path::PathBuf;
use std::sync::Mutex;

use crate::error::{NotifyError, NotifyResult};

/// Key/value backend holding serialized history documents.
pub trait HistoryStorage: Send + Sync + Debug {
    /// Read the document stored under `key`.
    fn read(&self, key: &str) -> NotifyResult<Option<String>>;

    /// Replace the document stored under `key`.
    fn write(&self, key: &str, document: &str) -> NotifyResult<()>;

    /// Delete the document stored under `key`. Missing keys are not an error.
    fn remove(&self, key: &str) -> NotifyResult<()>;
}

/// One JSON file per key inside a directory.
#[derive(Debug, Clone)]
pub struct JsonFileStorage {
    /// Directory holding the documents.
    root: PathBuf,
}

impl JsonFileStorage {
    /// Storage rooted at `root`; the directory is created on first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Path of the document for `key`.
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(format!("{key}.json"))
    }

    fn ensure_root(&self) -> NotifyResult<()> {
        std::fs::create_dir_all(&self.root).map_err(|e| {
            NotifyError::Storage(format!(
                "failed to create '{}': {e}",
                self.root.display()
            ))
        })
    }
}

impl HistoryStorage for JsonFileStorage {
    fn read(&self, key: &str) -> NotifyResult<Option<String>> {
        let path = self.path_for(key);
        match std::fs::read_to_string(&path) {
            Ok(document) => Ok(Some(document)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(NotifyError::Storage(format!(
                "failed to read '{}': {e}",
                path.display()
            ))),
        }
    }

    fn write(&self, key: &str, document: &str) -> NotifyResult<()> {
        self.ensure_root()?;
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, document)
            .and_then(|_| std::fs::rename(&tmp, &path))
            .map_err(|e| {
                NotifyError::Storage(format!("failed to write '{}': {e}", path.display()))
            })
    }

    fn remove(&self, key: &str) -> NotifyResult<()> {
        let path = self.path_for(key);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(NotifyError::Storage(format!(
                "failed to remove '{}': {e}",
                path.display()
            ))),
        }
    }
}

/// In-process storage, used by tests and ephemeral contexts.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    documents: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    /// Empty storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage pre-seeded with one document.
    pub fn with_document(key: &str, document: &str) -> Self {
        let storage = Self::new();
        storage
            .documents
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.to_string(), document.to_string());
        storage
    }

    /// Raw document under `key`.
    pub fn document(&self, key: &str) -> Option<String> {
        self.documents
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .cloned()
    }
}

impl HistoryStorage for MemoryStorage {
    fn read(&self, key: &str) -> NotifyResult<Option<String>> {
        Ok(self.document(key))
    }

    fn write(&self, key: &str, document: &str) -> NotifyResult<()> {
        self.documents
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.to_string(), document.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> NotifyResult<()> {
        self.documents
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_storage_write_read_remove() {
        let dir = tempfile::tempdir().expect("tempdir");
        let storage = JsonFileStorage::new(dir.path().join("nested"));

        assert_eq!(storage.read("history").expect("read"), None);

        storage.write("history", "[]").expect("write");
        assert_eq!(storage.read("history").expect("read").as_deref(), Some("[]"));
        assert!(!storage.path_for("history").with_extension("json.tmp").exists());

        storage.remove("history").expect("remove");
        storage.remove("history").expect("second remove is a no-op");
        assert!(!storage.path_for("history").exists());
    }

    #[test]
    fn test_memory_storage_is_keyed() {
        let storage = MemoryStorage::with_document("a", "1");
        storage.write("b", "2").expect("write");
        assert_eq!(storage.document("a").as_deref(), Some("1"));
        assert_eq!(storage.document("b").as_deref(), Some("2"));
    }
}
