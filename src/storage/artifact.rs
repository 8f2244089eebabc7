//! Artifact sources
//!
//! Artifact bytes are materialized through an [`ArtifactSource`] before they
//! enter the import pipeline. Dependency resolution uses the same source to
//! fetch referenced artifacts by path.
//!
//! Artifact paths are `/`-separated. [`normalize_artifact_path`] and
//! [`resolve_reference`] fold `.` and `..` segments so that the same artifact
//! always maps to the same key.
//!
//! ## Security
//!
//! The file-system source rejects paths that escape its base directory.

use super::StoreError;
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::RwLock;
use tracing::debug;

/// Source of artifact bytes
pub trait ArtifactSource: Send + Sync {
    /// Read the full content of an artifact
    fn read(&self, path: &str) -> Result<Vec<u8>, StoreError>;

    /// Check whether an artifact exists
    fn exists(&self, path: &str) -> bool;
}

/// Fold `.` and `..` segments and strip duplicate separators.
///
/// Leading `..` segments of relative paths are kept; absolute paths stop at `/`.
pub fn normalize_artifact_path(path: &str) -> String {
    let absolute = path.starts_with('/');
    let mut parts: Vec<&str> = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => match parts.last() {
                Some(last) if *last != ".." => {
                    parts.pop();
                }
                _ if absolute => {}
                _ => parts.push(".."),
            },
            other => parts.push(other),
        }
    }
    let joined = parts.join("/");
    if absolute {
        format!("/{}", joined)
    } else {
        joined
    }
}

/// Directory part of an artifact path (empty for bare file names)
pub fn artifact_directory(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) => "/",
        Some(pos) => &path[..pos],
        None => "",
    }
}

/// File name part of an artifact path
pub fn artifact_file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Resolve `reference` as written inside the artifact at `importing_path`
pub fn resolve_reference(importing_path: &str, reference: &str) -> String {
    if reference.starts_with('/') {
        return normalize_artifact_path(reference);
    }
    let directory = artifact_directory(importing_path);
    if directory.is_empty() {
        normalize_artifact_path(reference)
    } else {
        normalize_artifact_path(&format!("{}/{}", directory, reference))
    }
}

/// File system artifact source rooted at a base directory
pub struct FileSystemArtifactSource {
    base_path: PathBuf,
}

impl FileSystemArtifactSource {
    /// Create a new file system source
    ///
    /// # Arguments
    ///
    /// * `base_path` - Base directory all artifact paths are resolved against
    pub fn new(base_path: impl AsRef<Path>) -> Self {
        Self {
            base_path: base_path.as_ref().to_path_buf(),
        }
    }

    /// Resolve an artifact path relative to the base path with security checks.
    ///
    /// # Security
    ///
    /// - Rejects paths that still contain ".." after normalization
    /// - Verifies existing paths stay within base_path once canonicalized
    fn resolve_path(&self, path: &str) -> Result<PathBuf, StoreError> {
        let normalized = normalize_artifact_path(path);
        let relative = normalized.trim_start_matches('/');

        let full = self.base_path.join(relative);
        for component in Path::new(relative).components() {
            if matches!(component, Component::ParentDir) {
                return Err(StoreError::PermissionDenied(format!(
                    "Path traversal not allowed: {}",
                    path
                )));
            }
        }

        if full.exists() {
            let canonical = full
                .canonicalize()
                .map_err(|e| StoreError::IoError(format!("Failed to resolve path: {}", e)))?;
            let base_canonical = self
                .base_path
                .canonicalize()
                .unwrap_or_else(|_| self.base_path.clone());
            if !canonical.starts_with(&base_canonical) {
                return Err(StoreError::PermissionDenied(format!(
                    "Path escapes base directory: {}",
                    path
                )));
            }
            return Ok(canonical);
        }

        Ok(full)
    }
}

impl ArtifactSource for FileSystemArtifactSource {
    fn read(&self, path: &str) -> Result<Vec<u8>, StoreError> {
        let full_path = self.resolve_path(path)?;
        debug!(path, resolved = %full_path.display(), "Reading artifact");
        std::fs::read(&full_path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StoreError::ArtifactNotFound(path.to_string())
            } else {
                StoreError::IoError(format!("Failed to read artifact {}: {}", path, e))
            }
        })
    }

    fn exists(&self, path: &str) -> bool {
        self.resolve_path(path).is_ok_and(|p| p.is_file())
    }
}

/// Artifact source holding artifacts in memory, keyed by normalized path
#[derive(Debug, Default)]
pub struct InMemoryArtifactSource {
    artifacts: RwLock<HashMap<String, Vec<u8>>>,
}

impl InMemoryArtifactSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace an artifact
    pub fn insert(&self, path: &str, content: impl Into<Vec<u8>>) {
        if let Ok(mut artifacts) = self.artifacts.write() {
            artifacts.insert(normalize_artifact_path(path), content.into());
        }
    }

    /// Builder-style variant of [`insert`](Self::insert)
    pub fn with_artifact(self, path: &str, content: impl Into<Vec<u8>>) -> Self {
        self.insert(path, content);
        self
    }
}

impl ArtifactSource for InMemoryArtifactSource {
    fn read(&self, path: &str) -> Result<Vec<u8>, StoreError> {
        let artifacts = self
            .artifacts
            .read()
            .map_err(|_| StoreError::IoError("artifact lock poisoned".to_string()))?;
        artifacts
            .get(&normalize_artifact_path(path))
            .cloned()
            .ok_or_else(|| StoreError::ArtifactNotFound(path.to_string()))
    }

    fn exists(&self, path: &str) -> bool {
        self.artifacts
            .read()
            .is_ok_and(|a| a.contains_key(&normalize_artifact_path(path)))
    }
}
