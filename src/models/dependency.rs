//! Dependency links between models

use super::names;
use super::path::NodePath;
use super::value::PropertyValue;
use crate::storage::{NodeId, Session, StoreError};
use serde::Serialize;

/// A recorded reference from an importing model to a dependency model.
///
/// The link keeps the dependency location as a relative node path, so it
/// resolves wherever the two models are stored, as long as they move together.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DependencyLink {
    /// The link node itself
    pub node: NodeId,
    /// Reference as written in the importing artifact
    pub source_reference: String,
    /// Normalized artifact path the reference resolved to
    pub artifact_path: String,
    /// Relative path from the link node to the dependency model
    pub model_path: NodePath,
    /// Node id of the dependency model at link time
    pub model: Option<NodeId>,
}

impl DependencyLink {
    /// Read a link node
    pub fn load(session: &Session<'_>, node: NodeId) -> Result<Self, StoreError> {
        let data = session.get(node)?;
        let text = |name: &str| {
            data.property(name)
                .and_then(PropertyValue::as_str)
                .unwrap_or_default()
                .to_string()
        };
        let model_path = match data.property(names::MODEL_PATH).and_then(PropertyValue::as_str) {
            Some(path) => NodePath::parse(path)?,
            None => NodePath::current(),
        };
        Ok(Self {
            node,
            source_reference: text(names::SOURCE_REFERENCE),
            artifact_path: text(names::ARTIFACT_PATH),
            model_path,
            model: data
                .property(names::MODEL_REFERENCE)
                .and_then(PropertyValue::as_reference),
        })
    }

    /// Record a link under `container` pointing at `target`
    pub fn create(
        session: &mut Session<'_>,
        container: NodeId,
        source_reference: &str,
        artifact_path: &str,
        target: NodeId,
    ) -> Result<Self, StoreError> {
        let node = session.add_child(container, names::DEPENDENCY_NODE, names::DEPENDENCY_TYPE)?;
        let from = session.path_of(node)?;
        let to = session.path_of(target)?;
        let model_path = from.relativize(&to).ok_or_else(|| {
            StoreError::InvalidPath(format!("cannot relativize {} against {}", to, from))
        })?;

        session.set_property(node, names::SOURCE_REFERENCE, source_reference)?;
        session.set_property(node, names::ARTIFACT_PATH, artifact_path)?;
        session.set_property(
            node,
            names::MODEL_PATH,
            PropertyValue::Path(model_path.to_string()),
        )?;
        session.set_property(node, names::MODEL_REFERENCE, PropertyValue::WeakReference(target))?;

        Ok(Self {
            node,
            source_reference: source_reference.to_string(),
            artifact_path: artifact_path.to_string(),
            model_path,
            model: Some(target),
        })
    }

    /// Follow the relative path to the dependency model node, if it still exists
    pub fn resolve(&self, session: &Session<'_>) -> Result<Option<NodeId>, StoreError> {
        let base = session.path_of(self.node)?;
        Ok(session.find(&base.resolve(&self.model_path)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryTreeStore, TreeStore};

    #[test]
    fn test_link_resolves_through_relative_path() {
        let store = MemoryTreeStore::new();
        let mut session = store.open_session().unwrap();
        let model = session
            .ensure_path(&NodePath::parse("/models/a.xsd").unwrap(), names::FOLDER_TYPE)
            .unwrap();
        let target = session
            .ensure_path(&NodePath::parse("/dependencies/common/b.xsd").unwrap(), names::FOLDER_TYPE)
            .unwrap();
        let container = session
            .add_child(model, names::DEPENDENCIES_NODE, names::DEPENDENCIES_TYPE)
            .unwrap();

        let link = DependencyLink::create(&mut session, container, "common/b.xsd", "common/b.xsd", target)
            .unwrap();
        assert_eq!(link.model_path.to_string(), "../../../../dependencies/common/b.xsd");
        assert_eq!(link.resolve(&session).unwrap(), Some(target));

        let reloaded = DependencyLink::load(&session, link.node).unwrap();
        assert_eq!(reloaded, link);
    }
}
