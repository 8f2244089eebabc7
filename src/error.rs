//! Crate-wide error type
//!
//! Each module keeps its own error enum. [`SdkError`] wraps them so callers
//! can use `?` across modules, and [`ErrorKind`] gives a stable
//! classification independent of the module that raised the error.

use crate::config::ConfigError;
use crate::export::ExportError;
use crate::import::ImportError;
use crate::registry::RegistryError;
use crate::storage::StoreError;
use crate::transform::OperationError;
use serde::Serialize;
use std::fmt;

/// Stable error classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    NotFound,
    AmbiguousType,
    /// Artifact content is malformed for its metamodel
    Import,
    CyclicDependency,
    DependencyResolution,
    Arity,
    TypeMismatch,
    UnauthorizedWrite,
    Export,
    Storage,
    Conflict,
    AlreadyExists,
    Invalid,
    Config,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SdkError {
    #[error(transparent)]
    Import(#[from] ImportError),
    #[error(transparent)]
    Export(#[from] ExportError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Operation(#[from] OperationError),
    #[error(transparent)]
    Storage(#[from] StoreError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl SdkError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SdkError::Import(e) => import_kind(e),
            SdkError::Export(_) => ErrorKind::Export,
            SdkError::Registry(e) => registry_kind(e),
            SdkError::Operation(e) => operation_kind(e),
            SdkError::Storage(e) => store_kind(e),
            SdkError::Config(_) => ErrorKind::Config,
        }
    }

    /// Artifact, model or node path the error refers to, when known
    pub fn path(&self) -> Option<String> {
        match self {
            SdkError::Import(e) => e.path().map(str::to_string),
            SdkError::Export(ExportError::Failed { model, .. }) => Some(model.clone()),
            SdkError::Operation(OperationError::UnauthorizedWrite { path }) => Some(path.clone()),
            SdkError::Storage(e) => store_path(e).map(str::to_string),
            _ => None,
        }
    }
}

fn import_kind(error: &ImportError) -> ErrorKind {
    match error {
        ImportError::Parse(_) | ImportError::Malformed { .. } => ErrorKind::Import,
        ImportError::NotFound { .. } => ErrorKind::NotFound,
        ImportError::AmbiguousType { .. } => ErrorKind::AmbiguousType,
        ImportError::CyclicDependency { .. } => ErrorKind::CyclicDependency,
        ImportError::DependencyResolution { .. } | ImportError::DependencyDepth { .. } => {
            ErrorKind::DependencyResolution
        }
        ImportError::AlreadyExists(_) => ErrorKind::AlreadyExists,
        ImportError::Storage(e) => store_kind(e),
        ImportError::Registry(e) => registry_kind(e),
        ImportError::Config(_) => ErrorKind::Config,
    }
}

fn registry_kind(error: &RegistryError) -> ErrorKind {
    match error {
        RegistryError::CategoryNotFound(_)
        | RegistryError::MetamodelNotFound(_)
        | RegistryError::PluginNotFound { .. } => ErrorKind::NotFound,
        RegistryError::DuplicateMetamodel { .. } => ErrorKind::AlreadyExists,
        RegistryError::InvalidManifest { .. } | RegistryError::UnsupportedRepository(_) => {
            ErrorKind::Config
        }
        RegistryError::LockPoisoned => ErrorKind::Storage,
    }
}

fn operation_kind(error: &OperationError) -> ErrorKind {
    match error {
        OperationError::NotFound(_) | OperationError::UnknownSlot { .. } => ErrorKind::NotFound,
        OperationError::Arity { .. } => ErrorKind::Arity,
        OperationError::TypeMismatch { .. } => ErrorKind::TypeMismatch,
        OperationError::Invalid { .. } | OperationError::Evaluation { .. } => ErrorKind::Invalid,
        OperationError::UnauthorizedWrite { .. } => ErrorKind::UnauthorizedWrite,
        OperationError::Storage(e) => store_kind(e),
    }
}

fn store_kind(error: &StoreError) -> ErrorKind {
    match error {
        StoreError::NodeNotFound(_) | StoreError::PathNotFound(_) | StoreError::ArtifactNotFound(_) => {
            ErrorKind::NotFound
        }
        StoreError::AlreadyExists(_) => ErrorKind::AlreadyExists,
        StoreError::Conflict(_) => ErrorKind::Conflict,
        StoreError::InvalidPath(_) | StoreError::InvalidOperation(_) => ErrorKind::Invalid,
        StoreError::PermissionDenied(_) | StoreError::IoError(_) | StoreError::SerializationError(_) => {
            ErrorKind::Storage
        }
    }
}

fn store_path(error: &StoreError) -> Option<&str> {
    match error {
        StoreError::NodeNotFound(p)
        | StoreError::PathNotFound(p)
        | StoreError::InvalidPath(p)
        | StoreError::AlreadyExists(p)
        | StoreError::ArtifactNotFound(p) => Some(p),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nested_dependency_failure_keeps_path() {
        let error: SdkError = ImportError::DependencyResolution {
            path: "schemas/b.xsd".to_string(),
            source: Box::new(ImportError::CyclicDependency {
                path: "schemas/a.xsd".to_string(),
                chain: vec!["schemas/a.xsd".to_string(), "schemas/b.xsd".to_string()],
            }),
        }
        .into();
        assert_eq!(error.kind(), ErrorKind::DependencyResolution);
        assert_eq!(error.path().as_deref(), Some("schemas/b.xsd"));
    }

    #[test]
    fn test_store_conflict_kind() {
        let error: SdkError = StoreError::Conflict("node removed".to_string()).into();
        assert_eq!(error.kind(), ErrorKind::Conflict);
        assert_eq!(error.path(), None);
    }

    #[test]
    fn test_operation_kinds() {
        let error: SdkError = OperationError::UnauthorizedWrite { path: "/models/a@x".to_string() }.into();
        assert_eq!(error.kind(), ErrorKind::UnauthorizedWrite);
        assert_eq!(error.path().as_deref(), Some("/models/a@x"));
    }
}
