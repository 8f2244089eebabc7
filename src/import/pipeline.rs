//! Import pipeline
//!
//! One call to [`ImportPipeline::import`] runs in one session: the metamodel
//! is chosen, the model node is created and filled by the importer, the
//! dependency graph is resolved depth-first and the session is committed.
//! Any failure drops the session, so nothing of the attempt stays visible.

use super::ImportError;
use crate::config::SdkConfig;
use crate::dependency::DependencyResolver;
use crate::models::path::sanitize_name;
use crate::models::{Model, NodePath, PropertyValue, names};
use crate::registry::{ArtifactProbe, Metamodel, MetamodelRegistry};
use crate::storage::artifact::{artifact_file_name, normalize_artifact_path};
use crate::storage::{ArtifactSource, Session, StoreError, TreeStore};
use std::sync::Arc;
use tracing::{debug, info, info_span};

/// Where a new model node goes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelLocation {
    /// Top-level models, named by artifact file name
    Models,
    /// Dependency models, mirroring the artifact path
    Dependencies,
}

/// Imports artifacts into the tree store
#[derive(Clone)]
pub struct ImportPipeline {
    registry: Arc<MetamodelRegistry>,
    store: Arc<dyn TreeStore>,
    source: Arc<dyn ArtifactSource>,
    config: SdkConfig,
    models_root: NodePath,
    dependencies_root: NodePath,
}

impl ImportPipeline {
    pub fn new(
        registry: Arc<MetamodelRegistry>,
        store: Arc<dyn TreeStore>,
        source: Arc<dyn ArtifactSource>,
        config: SdkConfig,
    ) -> Result<Self, ImportError> {
        config.validate()?;
        let models_root = config.models_root()?;
        let dependencies_root = config.dependencies_root()?;
        let pipeline = Self {
            registry,
            store,
            source,
            config,
            models_root,
            dependencies_root,
        };
        pipeline.ensure_models_root()?;
        Ok(pipeline)
    }

    /// Create the models folder up front so that concurrent imports never
    /// both add it
    fn ensure_models_root(&self) -> Result<(), ImportError> {
        let mut session = self.open_session()?;
        if session.find(&self.models_root).is_none() {
            session.ensure_path(&self.models_root, names::FOLDER_TYPE)?;
            session.commit()?;
            debug!(path = %self.models_root, "Created models folder");
        }
        Ok(())
    }

    pub fn registry(&self) -> &Arc<MetamodelRegistry> {
        &self.registry
    }

    pub fn store(&self) -> &Arc<dyn TreeStore> {
        &self.store
    }

    pub fn source(&self) -> &Arc<dyn ArtifactSource> {
        &self.source
    }

    pub fn config(&self) -> &SdkConfig {
        &self.config
    }

    pub fn models_root(&self) -> &NodePath {
        &self.models_root
    }

    pub fn dependencies_root(&self) -> &NodePath {
        &self.dependencies_root
    }

    /// Open a session on the pipeline's store
    pub fn open_session(&self) -> Result<Session<'_>, StoreError> {
        Session::open(self.store.as_ref())
    }

    /// Import artifact bytes as a new model.
    ///
    /// With `metamodel` omitted the installed metamodels are probed; exactly
    /// one must apply. With `persist_dependency_artifacts` false, dependency
    /// models are only kept until resolution completes.
    pub fn import(
        &self,
        content: &[u8],
        path: &str,
        metamodel: Option<&str>,
        persist_dependency_artifacts: bool,
    ) -> Result<Model, ImportError> {
        let artifact_path = normalize_artifact_path(path);
        let span = info_span!("import", path = %artifact_path);
        let _guard = span.enter();

        let mut session = self.open_session()?;
        let mut resolver = DependencyResolver::new(self, persist_dependency_artifacts);
        let model = resolver.import_artifact(
            &mut session,
            content,
            &artifact_path,
            metamodel,
            None,
            ModelLocation::Models,
        )?;
        let removed = resolver.discard_transient(&mut session)?;
        session.commit()?;

        info!(
            model = %model.path,
            metamodel = %model.metamodel_id,
            dependencies = resolver.imported_count(),
            removed,
            "Imported artifact"
        );
        Ok(model)
    }

    /// Read an artifact through the artifact source and import it
    pub fn import_path(
        &self,
        path: &str,
        metamodel: Option<&str>,
        persist_dependency_artifacts: bool,
    ) -> Result<Model, ImportError> {
        let content = self.read_artifact(path)?;
        self.import(&content, path, metamodel, persist_dependency_artifacts)
    }

    /// Import with the configured persistence default
    pub fn import_default(&self, content: &[u8], path: &str) -> Result<Model, ImportError> {
        self.import(content, path, None, self.config.persist_dependency_artifacts)
    }

    /// Top-level model by name
    pub fn model(&self, name: &str) -> Result<Model, ImportError> {
        let session = self.open_session()?;
        let path = self.models_root.child(sanitize_name(name), 1);
        match session.find(&path) {
            Some(node) => Ok(Model::load(&session, node)?),
            None => Err(ImportError::NotFound {
                path: path.to_string(),
                what: "model".to_string(),
            }),
        }
    }

    /// All top-level models, in import order
    pub fn models(&self) -> Result<Vec<Model>, ImportError> {
        let session = self.open_session()?;
        let Some(folder) = session.find(&self.models_root) else {
            return Ok(Vec::new());
        };
        let mut models = Vec::new();
        for child in session.children(folder)? {
            if session.get(*child)?.primary_type == names::MODEL_TYPE {
                models.push(Model::load(&session, *child)?);
            }
        }
        Ok(models)
    }

    /// Destroy a top-level model by removing its node
    pub fn remove_model(&self, name: &str) -> Result<(), ImportError> {
        let model = self.model(name)?;
        let mut session = self.open_session()?;
        session.remove_node(model.node)?;
        session.commit()?;
        info!(model = %model.path, "Removed model");
        Ok(())
    }

    pub(crate) fn read_artifact(&self, path: &str) -> Result<Vec<u8>, ImportError> {
        self.source.read(path).map_err(|e| match e {
            StoreError::ArtifactNotFound(_) => ImportError::NotFound {
                path: normalize_artifact_path(path),
                what: "artifact".to_string(),
            },
            other => other.into(),
        })
    }

    /// Pick the metamodel for an artifact.
    ///
    /// An explicit `requested` id wins. Otherwise `preferred` is taken when it
    /// applies, else the single applicable metamodel.
    pub(crate) fn select_metamodel(
        &self,
        path: &str,
        content: &[u8],
        requested: Option<&str>,
        preferred: Option<&str>,
    ) -> Result<Arc<Metamodel>, ImportError> {
        if let Some(id) = requested {
            return Ok(self.registry.metamodel(id)?);
        }

        let mut candidates = self.registry.metamodels_for_artifact(path, content)?;
        if let Some(preferred) = preferred
            && let Some(position) = candidates.iter().position(|m| m.id() == preferred)
        {
            return Ok(candidates.swap_remove(position));
        }
        match candidates.len() {
            0 => Err(ImportError::NotFound {
                path: path.to_string(),
                what: "applicable metamodel".to_string(),
            }),
            1 => Ok(candidates.remove(0)),
            _ => Err(ImportError::AmbiguousType {
                path: path.to_string(),
                candidates: candidates.iter().map(|m| m.id().to_string()).collect(),
            }),
        }
    }

    /// Store path of the model imported from `artifact_path`
    pub fn model_path(&self, artifact_path: &str, location: ModelLocation) -> NodePath {
        match location {
            ModelLocation::Models => self
                .models_root
                .child(sanitize_name(artifact_file_name(artifact_path)), 1),
            ModelLocation::Dependencies => normalize_artifact_path(artifact_path)
                .split('/')
                .filter(|part| !part.is_empty())
                .fold(self.dependencies_root.clone(), |path, part| {
                    path.child(sanitize_name(part), 1)
                }),
        }
    }

    /// Create the model node and let the metamodel's importer fill it
    pub(crate) fn create_model(
        &self,
        session: &mut Session<'_>,
        content: &[u8],
        artifact_path: &str,
        metamodel: &Metamodel,
        location: ModelLocation,
    ) -> Result<Model, ImportError> {
        let path = self.model_path(artifact_path, location);
        if session.find(&path).is_some() {
            return Err(ImportError::AlreadyExists(path.to_string()));
        }
        let (Some(parent_path), Some(name)) = (path.parent(), path.name()) else {
            return Err(StoreError::InvalidPath(path.to_string()).into());
        };
        let parent = session.ensure_path(&parent_path, names::FOLDER_TYPE)?;
        let node = session.add_child(parent, name, names::MODEL_TYPE)?;

        session.set_property(node, names::METAMODEL, metamodel.id())?;
        session.set_property(node, names::ARTIFACT_PATH, artifact_path)?;
        if let Some(mime_type) = ArtifactProbe::new(artifact_path, content).mime_type {
            session.set_property(node, names::MIME_TYPE, mime_type)?;
        }
        session.set_property(
            node,
            names::IMPORTED_AT,
            PropertyValue::Date(chrono::Utc::now().fixed_offset()),
        )?;

        debug!(path = %path, metamodel = metamodel.id(), "Running importer");
        metamodel
            .importer()
            .import_into(content, session, node)
            .map_err(|e| match e {
                ImportError::Parse(message) => ImportError::Malformed {
                    path: artifact_path.to_string(),
                    metamodel: metamodel.id().to_string(),
                    message,
                },
                other => other,
            })?;

        Ok(Model::load(session, node)?)
    }
}

impl std::fmt::Debug for ImportPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImportPipeline")
            .field("registry", &self.registry)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
