//! File-backed tree store
//!
//! Keeps the committed tree in memory and rewrites a JSON document after each
//! successful commit. The document is written to a sibling temporary file and
//! renamed into place, so a crash never leaves a truncated store behind.

use super::memory::MemoryTreeStore;
use super::tree::{Change, NodeTree};
use super::{StoreError, TreeStore};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Tree store persisted as a JSON document
#[derive(Debug)]
pub struct FileTreeStore {
    path: PathBuf,
    inner: MemoryTreeStore,
}

impl FileTreeStore {
    /// Open the store at `path`, loading the existing document if there is one
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let tree = if path.exists() {
            let bytes = std::fs::read(&path).map_err(|e| {
                StoreError::IoError(format!("Failed to read store {}: {}", path.display(), e))
            })?;
            let tree: NodeTree = serde_json::from_slice(&bytes).map_err(|e| {
                StoreError::SerializationError(format!(
                    "Failed to parse store {}: {}",
                    path.display(),
                    e
                ))
            })?;
            info!(path = %path.display(), nodes = tree.len(), "Loaded tree store");
            tree
        } else {
            NodeTree::new()
        };

        Ok(Self {
            path,
            inner: MemoryTreeStore::with_tree(tree),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, tree: &NodeTree) -> Result<(), StoreError> {
        let json = serde_json::to_vec_pretty(tree)
            .map_err(|e| StoreError::SerializationError(e.to_string()))?;

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::IoError(format!(
                    "Failed to create directory for {}: {}",
                    self.path.display(),
                    e
                ))
            })?;
        }

        let temp = self.path.with_extension("json.tmp");
        std::fs::write(&temp, json).map_err(|e| {
            StoreError::IoError(format!("Failed to write {}: {}", temp.display(), e))
        })?;
        std::fs::rename(&temp, &self.path).map_err(|e| {
            StoreError::IoError(format!(
                "Failed to move {} into place: {}",
                temp.display(),
                e
            ))
        })?;
        debug!(path = %self.path.display(), nodes = tree.len(), "Persisted tree store");
        Ok(())
    }
}

impl TreeStore for FileTreeStore {
    fn snapshot(&self) -> Result<(u64, NodeTree), StoreError> {
        self.inner.snapshot()
    }

    fn apply(
        &self,
        base_version: u64,
        changes: Vec<Change>,
        tree: NodeTree,
    ) -> Result<u64, StoreError> {
        // The store lock is held while persisting, so the file always holds
        // the newest tree and a failed write installs nothing
        self.inner
            .apply_then(base_version, changes, tree, |merged| self.persist(merged))
    }
}
