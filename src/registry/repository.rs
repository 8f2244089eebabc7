//! Metamodel repositories
//!
//! A repository is a location holding category manifests. Two URL schemes
//! are understood:
//! - `builtin:` - manifests compiled into the crate (`xml`, `ddl`)
//! - `file://<dir>` - every `*.yaml` / `*.yml` file in a directory

use super::RegistryError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, warn};

/// URL of the built-in repository
pub const BUILTIN_URL: &str = "builtin:";

const BUILTIN_MANIFESTS: &[(&str, &str)] = &[
    ("xml.yaml", include_str!("../../manifests/xml.yaml")),
    ("ddl.yaml", include_str!("../../manifests/ddl.yaml")),
];

/// An installable category as described on disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryManifest {
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub metamodels: Vec<MetamodelManifest>,
}

/// One metamodel entry of a category manifest.
///
/// Plugin fields name implementations registered in the plugin catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetamodelManifest {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub importer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exporter: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dependency_processor: Option<String>,
    #[serde(default)]
    pub extensions: Vec<String>,
    #[serde(default)]
    pub mime_types: Vec<String>,
}

impl CategoryManifest {
    /// Parse a YAML manifest; `location` only feeds error messages
    pub fn from_yaml(content: &str, location: &str) -> Result<Self, RegistryError> {
        let manifest: CategoryManifest =
            serde_yaml::from_str(content).map_err(|e| RegistryError::InvalidManifest {
                location: location.to_string(),
                message: e.to_string(),
            })?;
        if manifest.category.trim().is_empty() {
            return Err(RegistryError::InvalidManifest {
                location: location.to_string(),
                message: "category name is empty".to_string(),
            });
        }
        if let Some(entry) = manifest.metamodels.iter().find(|m| m.id.trim().is_empty()) {
            return Err(RegistryError::InvalidManifest {
                location: location.to_string(),
                message: format!("metamodel with importer '{}' has no id", entry.importer),
            });
        }
        Ok(manifest)
    }
}

/// A location searched for category manifests
pub trait MetamodelRepository: Send + Sync {
    fn url(&self) -> &str;

    /// All manifests this repository offers, in a stable order
    fn manifests(&self) -> Result<Vec<CategoryManifest>, RegistryError>;
}

/// Manifests shipped with the crate
#[derive(Debug, Default, Clone, Copy)]
pub struct BuiltinRepository;

impl MetamodelRepository for BuiltinRepository {
    fn url(&self) -> &str {
        BUILTIN_URL
    }

    fn manifests(&self) -> Result<Vec<CategoryManifest>, RegistryError> {
        BUILTIN_MANIFESTS
            .iter()
            .map(|(name, content)| CategoryManifest::from_yaml(content, &format!("{}{}", BUILTIN_URL, name)))
            .collect()
    }
}

/// A directory of YAML manifests
#[derive(Debug, Clone)]
pub struct DirectoryRepository {
    url: String,
    directory: PathBuf,
}

impl DirectoryRepository {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        let directory = directory.into();
        Self {
            url: format!("file://{}", directory.display()),
            directory,
        }
    }

    pub fn directory(&self) -> &PathBuf {
        &self.directory
    }
}

impl MetamodelRepository for DirectoryRepository {
    fn url(&self) -> &str {
        &self.url
    }

    fn manifests(&self) -> Result<Vec<CategoryManifest>, RegistryError> {
        let entries = match std::fs::read_dir(&self.directory) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(url = %self.url, error = %e, "Repository directory is not readable");
                return Ok(Vec::new());
            }
        };

        let mut files: Vec<PathBuf> = entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| {
                path.is_file()
                    && path
                        .extension()
                        .and_then(|e| e.to_str())
                        .is_some_and(|e| e == "yaml" || e == "yml")
            })
            .collect();
        files.sort();

        let mut manifests = Vec::with_capacity(files.len());
        for file in files {
            let location = file.display().to_string();
            let content = std::fs::read_to_string(&file).map_err(|e| RegistryError::InvalidManifest {
                location: location.clone(),
                message: e.to_string(),
            })?;
            manifests.push(CategoryManifest::from_yaml(&content, &location)?);
        }
        debug!(url = %self.url, count = manifests.len(), "Scanned repository");
        Ok(manifests)
    }
}

/// Build the repository a URL points at
pub fn repository_for_url(url: &str) -> Result<Box<dyn MetamodelRepository>, RegistryError> {
    if url == BUILTIN_URL {
        Ok(Box::new(BuiltinRepository))
    } else if let Some(directory) = url.strip_prefix("file://") {
        if directory.is_empty() {
            return Err(RegistryError::UnsupportedRepository(url.to_string()));
        }
        Ok(Box::new(DirectoryRepository::new(directory)))
    } else {
        Err(RegistryError::UnsupportedRepository(url.to_string()))
    }
}
