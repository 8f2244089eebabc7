//! Imported models

use super::dependency::DependencyLink;
use super::names;
use super::object::ModelObject;
use super::path::NodePath;
use super::value::PropertyValue;
use crate::storage::{NodeId, Session, StoreError};
use serde::Serialize;

/// Handle on one imported tree.
///
/// The tree itself lives in the store under `path`; a `Model` only records
/// where it is and how it was produced. Removing the node destroys the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Model {
    pub name: String,
    pub metamodel_id: String,
    pub artifact_path: String,
    pub node: NodeId,
    pub path: NodePath,
}

impl Model {
    /// Read the model stored at `node`
    pub fn load(session: &Session<'_>, node: NodeId) -> Result<Self, StoreError> {
        let data = session.get(node)?;
        if data.primary_type != names::MODEL_TYPE {
            return Err(StoreError::InvalidOperation(format!(
                "node {} is a {}, not a model",
                session.path_of(node)?,
                data.primary_type
            )));
        }
        let text = |name: &str| {
            data.property(name)
                .and_then(PropertyValue::as_str)
                .unwrap_or_default()
                .to_string()
        };
        Ok(Self {
            name: data.name.clone(),
            metamodel_id: text(names::METAMODEL),
            artifact_path: text(names::ARTIFACT_PATH),
            node,
            path: session.path_of(node)?,
        })
    }

    /// Read the model stored at `path`
    pub fn load_at(session: &Session<'_>, path: &NodePath) -> Result<Self, StoreError> {
        Self::load(session, session.node(path)?)
    }

    /// The model node with its whole subtree, bookkeeping included
    pub fn tree(&self, session: &Session<'_>) -> Result<ModelObject, StoreError> {
        ModelObject::load(session, self.node)
    }

    /// Top-level content objects, in document order
    pub fn content(&self, session: &Session<'_>) -> Result<Vec<ModelObject>, StoreError> {
        let tree = self.tree(session)?;
        Ok(tree.content_children().cloned().collect())
    }

    /// First top-level content object, e.g. the document element of an XML model
    pub fn root(&self, session: &Session<'_>) -> Result<ModelObject, StoreError> {
        for child in session.children(self.node)? {
            if !names::is_bookkeeping(&session.get(*child)?.primary_type) {
                return ModelObject::load(session, *child);
            }
        }
        Err(StoreError::PathNotFound(format!(
            "{} has no content",
            self.path
        )))
    }

    /// Whether `node` belongs to this model's tree
    pub fn contains(&self, session: &Session<'_>, node: NodeId) -> bool {
        session.is_descendant(node, self.node)
    }

    /// Dependency links recorded on this model
    pub fn dependencies(&self, session: &Session<'_>) -> Result<Vec<DependencyLink>, StoreError> {
        let containers = session.children_of_type(self.node, names::DEPENDENCIES_TYPE)?;
        let mut links = Vec::new();
        for container in containers {
            for link in session.children_of_type(container, names::DEPENDENCY_TYPE)? {
                links.push(DependencyLink::load(session, link)?);
            }
        }
        Ok(links)
    }
}
