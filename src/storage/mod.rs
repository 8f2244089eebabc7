//! Tree store abstraction
//!
//! Defines the TreeStore trait consumed by the import, export and
//! transformation pipelines, and its implementations:
//! - MemoryTreeStore: in-process store (default)
//! - FileTreeStore: in-process store persisted to a JSON file on every commit
//!
//! All reads and writes happen through a [`Session`], which snapshots the
//! committed tree, journals every change and either commits or rolls back.
//! Artifact bytes are read through an [`ArtifactSource`].

pub mod artifact;
pub mod file;
pub mod memory;
pub mod session;
pub mod tree;

pub use artifact::{ArtifactSource, FileSystemArtifactSource, InMemoryArtifactSource};
pub use file::FileTreeStore;
pub use memory::MemoryTreeStore;
pub use session::Session;
pub use tree::{Change, NodeData, NodeId, NodeTree};

/// Error type for store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Node not found: {0}")]
    NodeNotFound(String),
    #[error("Path not found: {0}")]
    PathNotFound(String),
    #[error("Invalid path: {0}")]
    InvalidPath(String),
    #[error("Already exists: {0}")]
    AlreadyExists(String),
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
    #[error("Commit conflict: {0}")]
    Conflict(String),
    #[error("Artifact not found: {0}")]
    ArtifactNotFound(String),
    #[error("Permission denied: {0}")]
    PermissionDenied(String),
    #[error("IO error: {0}")]
    IoError(String),
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<crate::models::path::PathError> for StoreError {
    fn from(err: crate::models::path::PathError) -> Self {
        StoreError::InvalidPath(err.to_string())
    }
}

/// Trait for tree store backends
///
/// Backends only provide committed snapshots and journal application.
/// Sessions are built on top of these two operations.
pub trait TreeStore: Send + Sync {
    /// Current committed version and a copy of the committed tree
    fn snapshot(&self) -> Result<(u64, NodeTree), StoreError>;

    /// Commit a session.
    ///
    /// `tree` is the session's working copy, built on `base_version`. When no
    /// other commit happened since, the backend may install it directly;
    /// otherwise it must replay `changes` onto its current tree and fail with
    /// [`StoreError::Conflict`] if any change no longer applies.
    fn apply(&self, base_version: u64, changes: Vec<Change>, tree: NodeTree)
    -> Result<u64, StoreError>;

    /// Open a session on this store
    fn open_session(&self) -> Result<Session<'_>, StoreError>
    where
        Self: Sized,
    {
        Session::open(self)
    }
}
