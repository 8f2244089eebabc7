//! Artifact Modelling SDK - import, transform and export heterogeneous artifacts
//!
//! Provides unified interfaces for:
//! - Metamodel registration and discovery (via category manifests)
//! - Artifact import into tree models, with recursive dependency resolution
//! - Transformations built from typed, validated operations
//! - Export of models back to artifact bytes
//! - Transactional tree storage (in-memory and JSON file backends)
//!
//! ```no_run
//! use std::sync::Arc;
//! use artifact_modelling_sdk::{
//!     ImportPipeline, InMemoryArtifactSource, MemoryTreeStore, MetamodelRegistry, SdkConfig,
//! };
//!
//! # fn main() -> Result<(), artifact_modelling_sdk::SdkError> {
//! let registry = Arc::new(MetamodelRegistry::with_builtins());
//! registry.install("xml")?;
//! let pipeline = ImportPipeline::new(
//!     registry,
//!     Arc::new(MemoryTreeStore::new()),
//!     Arc::new(InMemoryArtifactSource::new()),
//!     SdkConfig::default(),
//! )?;
//! let model = pipeline.import(b"<book><title>Rust</title></book>", "book.xml", None, true)?;
//! println!("{}", model.path);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod dependency;
pub mod error;
pub mod export;
pub mod import;
pub mod models;
pub mod registry;
pub mod storage;
pub mod transform;
pub mod validation;

// Re-export commonly used types
pub use config::{ConfigError, SdkConfig};
pub use error::{ErrorKind, SdkError};

pub use storage::{
    ArtifactSource, FileSystemArtifactSource, FileTreeStore, InMemoryArtifactSource,
    MemoryTreeStore, NodeId, Session, StoreError, TreeStore,
};

pub use registry::{ArtifactProbe, Capabilities, Metamodel, MetamodelRegistry, PluginCatalog, RegistryError};

pub use import::{DdlImporter, ImportError, ImportPipeline, Importer, XmlImporter};
pub use export::{DdlExporter, ExportError, ExportPipeline, Exporter, XmlExporter};
pub use dependency::{DependencyProcessor, DependencyResolver, XmlIncludeProcessor};

pub use transform::{
    ModelRole, Operation, OperationError, OperationState, Term, Transformation,
    TransformationFactory,
};

pub use validation::{Severity, ValidationProblem, ValidationProblems};

// Re-export models
pub use models::{DependencyLink, Model, ModelObject, NodePath, Property, PropertyType, PropertyValue};
