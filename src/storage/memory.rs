//! In-memory tree store

use super::tree::{Change, NodeTree};
use super::{StoreError, TreeStore};
use crate::models::names;
use std::sync::RwLock;
use tracing::{debug, warn};

#[derive(Debug, Default)]
struct Committed {
    version: u64,
    tree: NodeTree,
}

/// Tree store keeping the committed tree in memory
#[derive(Debug, Default)]
pub struct MemoryTreeStore {
    state: RwLock<Committed>,
}

impl MemoryTreeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store whose committed state starts from `tree`
    pub fn with_tree(tree: NodeTree) -> Self {
        Self {
            state: RwLock::new(Committed { version: 0, tree }),
        }
    }

    /// Number of stored nodes, including the root
    pub fn node_count(&self) -> Result<usize, StoreError> {
        Ok(self.read()?.tree.len())
    }

    pub fn version(&self) -> Result<u64, StoreError> {
        Ok(self.read()?.version)
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, Committed>, StoreError> {
        self.state
            .read()
            .map_err(|_| StoreError::IoError("store lock poisoned".to_string()))
    }
}

impl TreeStore for MemoryTreeStore {
    fn snapshot(&self) -> Result<(u64, NodeTree), StoreError> {
        let state = self.read()?;
        Ok((state.version, state.tree.clone()))
    }

    fn apply(
        &self,
        base_version: u64,
        changes: Vec<Change>,
        tree: NodeTree,
    ) -> Result<u64, StoreError> {
        self.apply_then(base_version, changes, tree, |_| Ok(()))
    }
}

impl MemoryTreeStore {
    /// Commit like [`TreeStore::apply`], running `before_install` on the
    /// resulting tree while the store is still locked. The tree is installed
    /// only when `before_install` succeeds.
    pub(crate) fn apply_then(
        &self,
        base_version: u64,
        changes: Vec<Change>,
        tree: NodeTree,
        before_install: impl FnOnce(&NodeTree) -> Result<(), StoreError>,
    ) -> Result<u64, StoreError> {
        let mut state = self
            .state
            .write()
            .map_err(|_| StoreError::IoError("store lock poisoned".to_string()))?;

        let merged = if state.version == base_version {
            tree
        } else {
            debug!(
                base_version,
                current = state.version,
                changes = changes.len(),
                "Concurrent commit detected, replaying journal"
            );
            let mut replayed = state.tree.clone();
            for change in &changes {
                if let Err(e) = replay(&mut replayed, change) {
                    warn!(error = %e, "Journal replay failed");
                    return Err(StoreError::Conflict(format!(
                        "change no longer applies to version {}: {}",
                        state.version, e
                    )));
                }
            }
            replayed
        };
        before_install(&merged)?;
        state.tree = merged;
        state.version += 1;
        Ok(state.version)
    }
}

/// Apply a journaled change onto a tree that moved on since the session
/// opened. A model or folder that another commit created meanwhile is a
/// clash, not a same-name sibling.
fn replay(tree: &mut NodeTree, change: &Change) -> Result<(), StoreError> {
    if let Change::AddChild {
        parent,
        name,
        primary_type,
        ..
    } = change
        && names::is_uniquely_named(primary_type)
        && tree
            .get(*parent)?
            .children
            .iter()
            .any(|child| tree.get(*child).is_ok_and(|c| &c.name == name))
    {
        return Err(StoreError::AlreadyExists(
            tree.path_of(*parent)?.child(name.clone(), 1).to_string(),
        ));
    }
    tree.apply(change)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Session;

    #[test]
    fn test_concurrent_sessions_on_unrelated_nodes_both_commit() {
        let store = MemoryTreeStore::new();
        let mut first = store.open_session().unwrap();
        let mut second = store.open_session().unwrap();

        let root = first.root();
        first.add_child(root, "first", "nt:unstructured").unwrap();
        second.add_child(root, "second", "nt:unstructured").unwrap();

        first.commit().unwrap();
        second.commit().unwrap();

        let session = Session::open(&store).unwrap();
        assert!(session.node_at("/first").is_ok());
        assert!(session.node_at("/second").is_ok());
        assert_eq!(store.version().unwrap(), 2);
    }

    #[test]
    fn test_conflicting_sessions_fail_on_commit() {
        let store = MemoryTreeStore::new();
        {
            let mut setup = store.open_session().unwrap();
            let root = setup.root();
            setup.add_child(root, "shared", "nt:unstructured").unwrap();
            setup.commit().unwrap();
        }

        let mut remover = store.open_session().unwrap();
        let mut writer = store.open_session().unwrap();
        let shared = remover.node_at("/shared").unwrap();

        remover.remove_node(shared).unwrap();
        writer.set_property(shared, "late", "value").unwrap();

        remover.commit().unwrap();
        assert!(matches!(writer.commit(), Err(StoreError::Conflict(_))));
    }

    #[test]
    fn test_replay_refuses_second_model_with_same_name() {
        let store = MemoryTreeStore::new();
        let mut first = store.open_session().unwrap();
        let mut second = store.open_session().unwrap();
        let root = first.root();
        first.add_child(root, "a.xml", names::MODEL_TYPE).unwrap();
        second.add_child(root, "a.xml", names::MODEL_TYPE).unwrap();

        first.commit().unwrap();
        assert!(matches!(second.commit(), Err(StoreError::Conflict(_))));

        let session = Session::open(&store).unwrap();
        assert_eq!(session.children_named(root, "a.xml").unwrap().len(), 1);
    }

    #[test]
    fn test_replay_keeps_same_name_content_siblings() {
        let store = MemoryTreeStore::new();
        let mut first = store.open_session().unwrap();
        let mut second = store.open_session().unwrap();
        let root = first.root();
        first.add_child(root, "item", "xml:element").unwrap();
        second.add_child(root, "item", "xml:element").unwrap();

        first.commit().unwrap();
        second.commit().unwrap();

        let session = Session::open(&store).unwrap();
        assert_eq!(session.children_named(root, "item").unwrap().len(), 2);
    }
}
