//! Scoped store sessions
//!
//! A session works on a private copy of the committed tree. Every mutation is
//! applied to that copy and recorded in a journal; `commit` hands both to the
//! backend. A session dropped without `commit` is rolled back.

use super::tree::{Change, NodeData, NodeId, NodeTree};
use super::{StoreError, TreeStore};
use crate::models::path::{NodePath, sanitize_name};
use crate::models::value::PropertyValue;
use tracing::{debug, trace};
use uuid::Uuid;

/// A transactional view of a tree store
pub struct Session<'s> {
    id: Uuid,
    store: &'s dyn TreeStore,
    base_version: u64,
    tree: NodeTree,
    journal: Vec<Change>,
    finished: bool,
}

impl<'s> Session<'s> {
    /// Open a session on the given store
    pub fn open(store: &'s dyn TreeStore) -> Result<Self, StoreError> {
        let (base_version, tree) = store.snapshot()?;
        let id = Uuid::new_v4();
        debug!(session = %id, base_version, "Opened session");
        Ok(Self {
            id,
            store,
            base_version,
            tree,
            journal: Vec::new(),
            finished: false,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Whether the session holds uncommitted changes
    pub fn has_changes(&self) -> bool {
        !self.journal.is_empty()
    }

    pub fn root(&self) -> NodeId {
        self.tree.root()
    }

    /// Node at an absolute path
    pub fn node(&self, path: &NodePath) -> Result<NodeId, StoreError> {
        self.tree
            .find(path)
            .ok_or_else(|| StoreError::PathNotFound(path.to_string()))
    }

    /// Node at an absolute path given as text
    pub fn node_at(&self, path: &str) -> Result<NodeId, StoreError> {
        self.node(&NodePath::parse(path)?)
    }

    /// Node at an absolute path, if present
    pub fn find(&self, path: &NodePath) -> Option<NodeId> {
        self.tree.find(path)
    }

    pub fn exists(&self, id: NodeId) -> bool {
        self.tree.contains(id)
    }

    pub fn get(&self, id: NodeId) -> Result<&NodeData, StoreError> {
        self.tree.get(id)
    }

    pub fn children(&self, id: NodeId) -> Result<&[NodeId], StoreError> {
        Ok(&self.tree.get(id)?.children)
    }

    /// Children of `id` with the given name, in sibling order
    pub fn children_named(&self, id: NodeId, name: &str) -> Result<Vec<NodeId>, StoreError> {
        let node = self.tree.get(id)?;
        Ok(node
            .children
            .iter()
            .copied()
            .filter(|child| self.tree.get(*child).is_ok_and(|c| c.name == name))
            .collect())
    }

    /// Children of `id` with the given primary type, in sibling order
    pub fn children_of_type(&self, id: NodeId, primary_type: &str) -> Result<Vec<NodeId>, StoreError> {
        let node = self.tree.get(id)?;
        Ok(node
            .children
            .iter()
            .copied()
            .filter(|child| {
                self.tree
                    .get(*child)
                    .is_ok_and(|c| c.primary_type == primary_type)
            })
            .collect())
    }

    pub fn property(&self, id: NodeId, name: &str) -> Result<Option<&PropertyValue>, StoreError> {
        Ok(self.tree.get(id)?.property(name))
    }

    pub fn path_of(&self, id: NodeId) -> Result<NodePath, StoreError> {
        self.tree.path_of(id)
    }

    pub fn is_descendant(&self, node: NodeId, ancestor: NodeId) -> bool {
        self.tree.is_descendant(node, ancestor)
    }

    fn record(&mut self, change: Change) -> Result<(), StoreError> {
        self.tree.apply(&change)?;
        trace!(session = %self.id, ?change, "Recorded change");
        self.journal.push(change);
        Ok(())
    }

    /// Append a child node; names are sanitized so they stay addressable
    pub fn add_child(
        &mut self,
        parent: NodeId,
        name: &str,
        primary_type: &str,
    ) -> Result<NodeId, StoreError> {
        let id = Uuid::new_v4();
        self.record(Change::AddChild {
            parent,
            id,
            name: sanitize_name(name),
            primary_type: primary_type.to_string(),
        })?;
        Ok(id)
    }

    pub fn set_property(
        &mut self,
        node: NodeId,
        name: &str,
        value: impl Into<PropertyValue>,
    ) -> Result<(), StoreError> {
        self.record(Change::SetProperty {
            node,
            name: name.to_string(),
            value: value.into(),
        })
    }

    pub fn remove_property(&mut self, node: NodeId, name: &str) -> Result<(), StoreError> {
        self.record(Change::RemoveProperty {
            node,
            name: name.to_string(),
        })
    }

    /// Remove a node and its whole subtree
    pub fn remove_node(&mut self, node: NodeId) -> Result<(), StoreError> {
        self.record(Change::RemoveNode { node })
    }

    /// Return the node at `path`, creating missing nodes along the way with
    /// `primary_type`
    pub fn ensure_path(&mut self, path: &NodePath, primary_type: &str) -> Result<NodeId, StoreError> {
        if !path.is_absolute() {
            return Err(StoreError::InvalidPath(format!(
                "{} is not an absolute path",
                path
            )));
        }
        let mut current = self.root();
        let mut walked = NodePath::root();
        for segment in path.normalize().segments() {
            let crate::models::path::Segment::Child { name, index } = segment else {
                continue;
            };
            walked = walked.child(name.clone(), *index);
            current = match self.tree.find(&walked) {
                Some(id) => id,
                None => self.add_child(current, name, primary_type)?,
            };
        }
        Ok(current)
    }

    /// Commit all journaled changes
    pub fn commit(mut self) -> Result<u64, StoreError> {
        self.finished = true;
        if self.journal.is_empty() {
            debug!(session = %self.id, "Nothing to commit");
            return Ok(self.base_version);
        }
        let changes = std::mem::take(&mut self.journal);
        let count = changes.len();
        let tree = std::mem::take(&mut self.tree);
        let version = self.store.apply(self.base_version, changes, tree)?;
        debug!(session = %self.id, changes = count, version, "Committed session");
        Ok(version)
    }

    /// Discard all journaled changes
    pub fn rollback(mut self) {
        self.finished = true;
        debug!(session = %self.id, changes = self.journal.len(), "Rolled back session");
    }
}

impl Drop for Session<'_> {
    fn drop(&mut self) {
        if !self.finished && !self.journal.is_empty() {
            debug!(
                session = %self.id,
                changes = self.journal.len(),
                "Session released without commit, rolling back"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryTreeStore;

    #[test]
    fn test_uncommitted_session_leaves_no_trace() {
        let store = MemoryTreeStore::new();
        {
            let mut session = store.open_session().unwrap();
            let root = session.root();
            session.add_child(root, "transient", "nt:unstructured").unwrap();
            assert!(session.has_changes());
        }
        let session = store.open_session().unwrap();
        assert!(session.node_at("/transient").is_err());
    }

    #[test]
    fn test_commit_publishes_changes() {
        let store = MemoryTreeStore::new();
        let mut session = store.open_session().unwrap();
        let node = session
            .ensure_path(&NodePath::parse("/a/b/c").unwrap(), "mm:folder")
            .unwrap();
        session.set_property(node, "answer", 42i64).unwrap();
        session.commit().unwrap();

        let session = store.open_session().unwrap();
        let node = session.node_at("/a/b/c").unwrap();
        assert_eq!(
            session.property(node, "answer").unwrap(),
            Some(&PropertyValue::Long(42))
        );
    }

    #[test]
    fn test_add_child_sanitizes_names() {
        let store = MemoryTreeStore::new();
        let mut session = store.open_session().unwrap();
        let root = session.root();
        let id = session.add_child(root, "schemas/types.xsd", "mm:model").unwrap();
        assert_eq!(session.path_of(id).unwrap().to_string(), "/schemas_types.xsd");
    }
}
