//! Import functionality
//!
//! Converts artifact bytes into node trees:
//! - [`Importer`]: per-metamodel plugin writing a tree below a model node
//! - [`ImportPipeline`]: picks the metamodel, creates the model, runs
//!   dependency resolution and commits, all in one session
//!
//! Built-in importers:
//! - XML (`quick-xml`)
//! - DDL (`sqlparser`, CREATE TABLE statements)

pub mod ddl;
pub mod pipeline;
pub mod xml;

pub use ddl::DdlImporter;
pub use pipeline::{ImportPipeline, ModelLocation};
pub use xml::XmlImporter;

use crate::config::ConfigError;
use crate::registry::{ArtifactProbe, RegistryError};
use crate::storage::{NodeId, Session, StoreError};

/// Error during import
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    /// Raised by importers; the pipeline adds path and metamodel context
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Cannot import {path}: malformed under metamodel {metamodel}: {message}")]
    Malformed {
        path: String,
        metamodel: String,
        message: String,
    },
    #[error("Cannot import {path}: {what} not found")]
    NotFound { path: String, what: String },
    #[error("Cannot import {path}: several metamodels apply ({})", candidates.join(", "))]
    AmbiguousType {
        path: String,
        candidates: Vec<String>,
    },
    #[error("Cyclic dependency: {}", chain.join(" -> "))]
    CyclicDependency { path: String, chain: Vec<String> },
    #[error("Cannot resolve dependency {path}: {source}")]
    DependencyResolution {
        path: String,
        #[source]
        source: Box<ImportError>,
    },
    #[error("Dependency {path} nested deeper than {max} levels")]
    DependencyDepth { path: String, max: usize },
    #[error("Model already exists: {0}")]
    AlreadyExists(String),
    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl ImportError {
    /// Artifact path the error refers to, when known
    pub fn path(&self) -> Option<&str> {
        match self {
            ImportError::Malformed { path, .. }
            | ImportError::NotFound { path, .. }
            | ImportError::AmbiguousType { path, .. }
            | ImportError::CyclicDependency { path, .. }
            | ImportError::DependencyResolution { path, .. }
            | ImportError::DependencyDepth { path, .. } => Some(path),
            ImportError::AlreadyExists(path) => Some(path),
            _ => None,
        }
    }

    /// Innermost error of a dependency chain
    pub fn root_cause(&self) -> &ImportError {
        match self {
            ImportError::DependencyResolution { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

/// Importer plugin contract
pub trait Importer: Send + Sync {
    /// Name under which manifests refer to this importer
    fn name(&self) -> &str;

    /// Whether the probed artifact looks like something this importer reads
    fn applicable(&self, probe: &ArtifactProbe) -> bool;

    /// Build the artifact's tree below `target`.
    ///
    /// Malformed content must fail with [`ImportError::Parse`]; partial trees
    /// are discarded with the session.
    fn import_into(
        &self,
        content: &[u8],
        session: &mut Session<'_>,
        target: NodeId,
    ) -> Result<(), ImportError>;
}

/// Decode artifact bytes as UTF-8, skipping a byte order mark
pub(crate) fn decode_utf8(content: &[u8]) -> Result<&str, ImportError> {
    let text = std::str::from_utf8(content)
        .map_err(|e| ImportError::Parse(format!("content is not valid UTF-8: {}", e)))?;
    Ok(text.strip_prefix('\u{feff}').unwrap_or(text))
}
