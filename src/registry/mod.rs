//! Metamodel registry
//!
//! Tracks installable metamodel categories and the metamodels installed from
//! them. Categories are discovered by scanning an ordered list of
//! repositories; when two repositories offer the same category the earlier
//! one wins.
//!
//! Install and uninstall take the registry's write lock, lookups share the
//! read lock.

pub mod catalog;
pub mod metamodel;
pub mod repository;
pub mod sniff;

pub use catalog::PluginCatalog;
pub use metamodel::{Capabilities, Metamodel};
pub use repository::{
    BUILTIN_URL, BuiltinRepository, CategoryManifest, DirectoryRepository, MetamodelManifest,
    MetamodelRepository, repository_for_url,
};
pub use sniff::ArtifactProbe;

use crate::config::SdkConfig;
use crate::dependency::DependencyProcessor;
use crate::export::Exporter;
use crate::import::Importer;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info};

/// Error type for registry operations
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Category not found: {0}")]
    CategoryNotFound(String),
    #[error("Metamodel not found: {0}")]
    MetamodelNotFound(String),
    #[error("Plugin not found: {kind} '{name}' required by metamodel {metamodel}")]
    PluginNotFound {
        kind: &'static str,
        name: String,
        metamodel: String,
    },
    #[error("Metamodel {id} is already installed by category {category}")]
    DuplicateMetamodel { id: String, category: String },
    #[error("Invalid manifest {location}: {message}")]
    InvalidManifest { location: String, message: String },
    #[error("Unsupported repository URL: {0}")]
    UnsupportedRepository(String),
    #[error("Registry lock poisoned")]
    LockPoisoned,
}

struct RegistryState {
    repositories: Vec<Arc<dyn MetamodelRepository>>,
    catalog: PluginCatalog,
    /// category -> ids of its installed metamodels
    installed: BTreeMap<String, Vec<String>>,
    metamodels: BTreeMap<String, Arc<Metamodel>>,
}

/// Registry of installed metamodels
pub struct MetamodelRegistry {
    state: RwLock<RegistryState>,
}

impl MetamodelRegistry {
    /// Registry with the given plugins and no repositories
    pub fn new(catalog: PluginCatalog) -> Self {
        Self {
            state: RwLock::new(RegistryState {
                repositories: Vec::new(),
                catalog,
                installed: BTreeMap::new(),
                metamodels: BTreeMap::new(),
            }),
        }
    }

    /// Registry with the built-in plugins and the built-in repository
    pub fn with_builtins() -> Self {
        let registry = Self::new(PluginCatalog::with_builtins());
        if let Ok(mut state) = registry.state.write() {
            state.repositories.push(Arc::new(BuiltinRepository));
        }
        registry
    }

    /// Registry with the built-in plugins and the configured repositories,
    /// with the configured categories installed
    pub fn from_config(config: &SdkConfig) -> Result<Self, RegistryError> {
        let registry = Self::new(PluginCatalog::with_builtins());
        for url in &config.repositories {
            registry.register_repository(url)?;
        }
        for category in &config.install {
            registry.install(category)?;
        }
        Ok(registry)
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, RegistryState>, RegistryError> {
        self.state.read().map_err(|_| RegistryError::LockPoisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, RegistryState>, RegistryError> {
        self.state.write().map_err(|_| RegistryError::LockPoisoned)
    }

    /// Append a repository URL to the search order.
    ///
    /// Registering a URL twice keeps its original position.
    pub fn register_repository(&self, url: &str) -> Result<(), RegistryError> {
        let repository = repository_for_url(url)?;
        self.register_repository_source(Arc::from(repository))
    }

    /// Append a repository implementation to the search order
    pub fn register_repository_source(
        &self,
        repository: Arc<dyn MetamodelRepository>,
    ) -> Result<(), RegistryError> {
        let mut state = self.write()?;
        if state.repositories.iter().any(|r| r.url() == repository.url()) {
            debug!(url = repository.url(), "Repository already registered");
            return Ok(());
        }
        debug!(url = repository.url(), "Registered repository");
        state.repositories.push(repository);
        Ok(())
    }

    /// Remove a repository URL; unknown URLs are ignored.
    ///
    /// Categories already installed from it stay installed.
    pub fn unregister_repository(&self, url: &str) -> Result<bool, RegistryError> {
        let mut state = self.write()?;
        let before = state.repositories.len();
        state.repositories.retain(|r| r.url() != url);
        Ok(state.repositories.len() != before)
    }

    /// Repository URLs in search order
    pub fn repositories(&self) -> Result<Vec<String>, RegistryError> {
        Ok(self.read()?.repositories.iter().map(|r| r.url().to_string()).collect())
    }

    pub fn register_importer(&self, importer: Arc<dyn Importer>) -> Result<(), RegistryError> {
        self.write()?.catalog.register_importer(importer);
        Ok(())
    }

    pub fn register_exporter(&self, exporter: Arc<dyn Exporter>) -> Result<(), RegistryError> {
        self.write()?.catalog.register_exporter(exporter);
        Ok(())
    }

    pub fn register_processor(&self, processor: Arc<dyn DependencyProcessor>) -> Result<(), RegistryError> {
        self.write()?.catalog.register_processor(processor);
        Ok(())
    }

    /// Categories offered by any registered repository
    pub fn installable_categories(&self) -> Result<BTreeSet<String>, RegistryError> {
        let state = self.read()?;
        let mut categories = BTreeSet::new();
        for repository in &state.repositories {
            for manifest in repository.manifests()? {
                categories.insert(manifest.category);
            }
        }
        Ok(categories)
    }

    /// Categories currently installed
    pub fn installed_categories(&self) -> Result<Vec<String>, RegistryError> {
        Ok(self.read()?.installed.keys().cloned().collect())
    }

    pub fn is_installed(&self, category: &str) -> Result<bool, RegistryError> {
        Ok(self.read()?.installed.contains_key(category))
    }

    /// Install a category from the first repository offering it.
    ///
    /// Installing an installed category is a no-op.
    pub fn install(&self, category: &str) -> Result<(), RegistryError> {
        let mut state = self.write()?;
        if state.installed.contains_key(category) {
            debug!(category, "Category already installed");
            return Ok(());
        }

        let mut found = None;
        for repository in &state.repositories {
            if let Some(manifest) = repository
                .manifests()?
                .into_iter()
                .find(|m| m.category == category)
            {
                found = Some((repository.url().to_string(), manifest));
                break;
            }
        }
        let Some((url, manifest)) = found else {
            return Err(RegistryError::CategoryNotFound(category.to_string()));
        };

        // Build everything first so a failing entry installs nothing
        let mut metamodels = Vec::with_capacity(manifest.metamodels.len());
        for entry in &manifest.metamodels {
            if let Some(existing) = state.metamodels.get(&entry.id) {
                return Err(RegistryError::DuplicateMetamodel {
                    id: entry.id.clone(),
                    category: existing.category().to_string(),
                });
            }
            metamodels.push(build_metamodel(&state.catalog, category, entry)?);
        }

        let ids: Vec<String> = metamodels.iter().map(|m| m.id().to_string()).collect();
        for metamodel in metamodels {
            state
                .metamodels
                .insert(metamodel.id().to_string(), Arc::new(metamodel));
        }
        info!(category, repository = %url, metamodels = ?ids, "Installed category");
        state.installed.insert(category.to_string(), ids);
        Ok(())
    }

    /// Remove a category and its metamodels; returns whether it was installed
    pub fn uninstall(&self, category: &str) -> Result<bool, RegistryError> {
        let mut state = self.write()?;
        let Some(ids) = state.installed.remove(category) else {
            return Ok(false);
        };
        for id in &ids {
            state.metamodels.remove(id);
        }
        info!(category, "Uninstalled category");
        Ok(true)
    }

    /// Installed metamodel by id
    pub fn metamodel(&self, id: &str) -> Result<Arc<Metamodel>, RegistryError> {
        self.read()?
            .metamodels
            .get(id)
            .cloned()
            .ok_or_else(|| RegistryError::MetamodelNotFound(id.to_string()))
    }

    /// Metamodels installed by a category
    pub fn metamodels_for_category(&self, category: &str) -> Result<Vec<Arc<Metamodel>>, RegistryError> {
        let state = self.read()?;
        let ids = state
            .installed
            .get(category)
            .ok_or_else(|| RegistryError::CategoryNotFound(category.to_string()))?;
        Ok(ids
            .iter()
            .filter_map(|id| state.metamodels.get(id).cloned())
            .collect())
    }

    /// Every installed metamodel, ordered by id
    pub fn metamodels(&self) -> Result<Vec<Arc<Metamodel>>, RegistryError> {
        Ok(self.read()?.metamodels.values().cloned().collect())
    }

    /// Installed metamodels whose importer claims the artifact, ordered by id.
    ///
    /// The result may be empty.
    pub fn metamodels_for_artifact(
        &self,
        path: &str,
        content: &[u8],
    ) -> Result<Vec<Arc<Metamodel>>, RegistryError> {
        let probe = ArtifactProbe::new(path, content);
        let state = self.read()?;
        let matching: Vec<Arc<Metamodel>> = state
            .metamodels
            .values()
            .filter(|m| m.is_applicable(&probe))
            .cloned()
            .collect();
        debug!(
            path,
            mime_type = ?probe.mime_type,
            candidates = matching.len(),
            "Probed installed metamodels"
        );
        Ok(matching)
    }
}

impl Default for MetamodelRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl std::fmt::Debug for MetamodelRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.state.read() {
            Ok(state) => f
                .debug_struct("MetamodelRegistry")
                .field(
                    "repositories",
                    &state.repositories.iter().map(|r| r.url()).collect::<Vec<_>>(),
                )
                .field("installed", &state.installed)
                .field("catalog", &state.catalog)
                .finish(),
            Err(_) => f.write_str("MetamodelRegistry(<poisoned>)"),
        }
    }
}

fn build_metamodel(
    catalog: &PluginCatalog,
    category: &str,
    entry: &MetamodelManifest,
) -> Result<Metamodel, RegistryError> {
    let missing = |kind: &'static str, name: &str| RegistryError::PluginNotFound {
        kind,
        name: name.to_string(),
        metamodel: entry.id.clone(),
    };

    let importer = catalog
        .importer(&entry.importer)
        .ok_or_else(|| missing("importer", &entry.importer))?;
    let mut metamodel = Metamodel::new(&entry.id, category, importer)
        .with_extensions(entry.extensions.clone())
        .with_mime_types(entry.mime_types.clone());
    if let Some(description) = &entry.description {
        metamodel = metamodel.with_description(description);
    }
    if let Some(name) = &entry.exporter {
        let exporter = catalog.exporter(name).ok_or_else(|| missing("exporter", name))?;
        metamodel = metamodel.with_exporter(exporter);
    }
    if let Some(name) = &entry.dependency_processor {
        let processor = catalog
            .processor(name)
            .ok_or_else(|| missing("dependency processor", name))?;
        metamodel = metamodel.with_dependency_processor(processor);
    }
    Ok(metamodel)
}
