//! Dependency resolution
//!
//! After a model is imported, its metamodel's [`DependencyProcessor`] (if
//! any) scans the tree for references to other artifacts and imports them
//! through a [`DependencyContext`]. Each referenced artifact is imported at
//! most once per session; the link back to it is recorded under the
//! importing model's `mm:dependencies` node.

pub mod resolver;
pub mod xml;

pub use resolver::DependencyResolver;
pub use xml::XmlIncludeProcessor;

use crate::import::ImportError;
use crate::models::{DependencyLink, Model, NodePath, names};
use crate::storage::{NodeId, Session};

/// Dependency processor plugin contract
pub trait DependencyProcessor: Send + Sync {
    /// Name under which manifests refer to this processor
    fn name(&self) -> &str;

    /// Metamodel family whose trees this processor understands
    fn metamodel_id(&self) -> &str;

    /// Discover and import the artifacts referenced by the model at
    /// `model_node`, imported from `artifact_path`.
    ///
    /// Returns the store path holding dependency models, or `None` when
    /// nothing was kept.
    fn process(
        &self,
        ctx: &mut DependencyContext<'_, '_>,
        artifact_path: &str,
        model_node: NodeId,
        persist: bool,
    ) -> Result<Option<NodePath>, ImportError>;
}

/// Capability to import a referenced artifact from inside a processor
pub trait ImportCallback {
    /// Resolve `reference` against `importing_path` and import it, or return
    /// the model already imported for it in this session
    fn import_dependency(
        &mut self,
        session: &mut Session<'_>,
        importing_metamodel: &str,
        importing_path: &str,
        reference: &str,
    ) -> Result<Model, ImportError>;
}

/// What a processor gets to work with: the session and the import callback
pub struct DependencyContext<'a, 's> {
    session: &'a mut Session<'s>,
    callback: &'a mut dyn ImportCallback,
    metamodel_id: String,
    dependencies_root: NodePath,
}

impl<'a, 's> DependencyContext<'a, 's> {
    pub fn new(
        session: &'a mut Session<'s>,
        callback: &'a mut dyn ImportCallback,
        metamodel_id: &str,
        dependencies_root: NodePath,
    ) -> Self {
        Self {
            session,
            callback,
            metamodel_id: metamodel_id.to_string(),
            dependencies_root,
        }
    }

    pub fn session(&self) -> &Session<'s> {
        &*self.session
    }

    pub fn session_mut(&mut self) -> &mut Session<'s> {
        &mut *self.session
    }

    /// Metamodel of the model being processed
    pub fn metamodel_id(&self) -> &str {
        &self.metamodel_id
    }

    /// Store folder holding dependency models
    pub fn dependencies_root(&self) -> &NodePath {
        &self.dependencies_root
    }

    /// Import the artifact `reference` points at, as written in the artifact
    /// at `importing_path`
    pub fn import(&mut self, importing_path: &str, reference: &str) -> Result<Model, ImportError> {
        self.callback
            .import_dependency(self.session, &self.metamodel_id, importing_path, reference)
    }

    /// Record a link from `model_node` to `dependency`
    pub fn link(
        &mut self,
        model_node: NodeId,
        reference: &str,
        dependency: &Model,
    ) -> Result<DependencyLink, ImportError> {
        let container = match self
            .session
            .children_of_type(model_node, names::DEPENDENCIES_TYPE)?
            .first()
        {
            Some(container) => *container,
            None => self.session.add_child(
                model_node,
                names::DEPENDENCIES_NODE,
                names::DEPENDENCIES_TYPE,
            )?,
        };
        Ok(DependencyLink::create(
            self.session,
            container,
            reference,
            &dependency.artifact_path,
            dependency.node,
        )?)
    }
}
