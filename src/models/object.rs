//! Materialized model objects

use super::value::{Property, PropertyValue};
use crate::storage::{NodeId, Session, StoreError};
use serde::Serialize;

/// A tree node read out of a session.
///
/// Objects are snapshots: they do not change when the store does.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelObject {
    pub id: NodeId,
    pub name: String,
    /// 1-based position among siblings sharing `name`
    pub index: usize,
    pub primary_type: String,
    pub properties: Vec<Property>,
    pub children: Vec<ModelObject>,
}

impl ModelObject {
    /// Load the node `id` and its whole subtree
    pub fn load(session: &Session<'_>, id: NodeId) -> Result<Self, StoreError> {
        let index = match session.path_of(id)?.segments().last() {
            Some(crate::models::path::Segment::Child { index, .. }) => *index,
            _ => 1,
        };
        Self::load_with_index(session, id, index)
    }

    fn load_with_index(session: &Session<'_>, id: NodeId, index: usize) -> Result<Self, StoreError> {
        let node = session.get(id)?;
        let mut seen: Vec<(&str, usize)> = Vec::new();
        let mut children = Vec::with_capacity(node.children.len());
        for child_id in &node.children {
            let child = session.get(*child_id)?;
            let position = match seen.iter_mut().find(|(name, _)| *name == child.name) {
                Some((_, count)) => {
                    *count += 1;
                    *count
                }
                None => {
                    seen.push((&child.name, 1));
                    1
                }
            };
            children.push(Self::load_with_index(session, *child_id, position)?);
        }

        Ok(Self {
            id,
            name: node.name.clone(),
            index,
            primary_type: node.primary_type.clone(),
            properties: node.properties.clone(),
            children,
        })
    }

    pub fn children(&self) -> &[ModelObject] {
        &self.children
    }

    pub fn property(&self, name: &str) -> Option<&PropertyValue> {
        self.properties
            .iter()
            .find(|p| p.name == name)
            .map(|p| &p.value)
    }

    /// The `index`-th (1-based) child called `name`
    pub fn child(&self, name: &str, index: usize) -> Option<&ModelObject> {
        self.children
            .iter()
            .filter(|c| c.name == name)
            .nth(index.saturating_sub(1))
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a ModelObject> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Children that are artifact content rather than bookkeeping
    pub fn content_children(&self) -> impl Iterator<Item = &ModelObject> {
        self.children
            .iter()
            .filter(|c| !super::names::is_bookkeeping(&c.primary_type))
    }

    /// Structural equality: same names, types, property values in order and
    /// children in order. Node ids are ignored.
    pub fn same_content(&self, other: &ModelObject) -> bool {
        self.name == other.name
            && self.primary_type == other.primary_type
            && self.properties == other.properties
            && self.children.len() == other.children.len()
            && self
                .children
                .iter()
                .zip(other.children.iter())
                .all(|(a, b)| a.same_content(b))
    }

    /// Number of nodes in this subtree, including `self`
    pub fn subtree_size(&self) -> usize {
        1 + self.children.iter().map(|c| c.subtree_size()).sum::<usize>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryTreeStore, TreeStore};

    #[test]
    fn test_load_indexes_same_name_siblings() {
        let store = MemoryTreeStore::new();
        let mut session = store.open_session().unwrap();
        let root = session.root();
        let parent = session.add_child(root, "parent", "nt:unstructured").unwrap();
        session.set_property(parent, "kind", "container").unwrap();
        for name in ["item", "other", "item"] {
            session.add_child(parent, name, "nt:unstructured").unwrap();
        }

        let object = ModelObject::load(&session, parent).unwrap();
        assert_eq!(object.children().len(), 3);
        assert_eq!(object.children[2].index, 2);
        assert_eq!(object.child("item", 2).unwrap().id, object.children[2].id);
        assert_eq!(object.children_named("item").count(), 2);
        assert_eq!(object.property("kind"), Some(&PropertyValue::from("container")));
        assert_eq!(object.subtree_size(), 4);
    }

    #[test]
    fn test_same_content_ignores_ids() {
        let store = MemoryTreeStore::new();
        let mut session = store.open_session().unwrap();
        let root = session.root();
        let a = session.add_child(root, "node", "t").unwrap();
        let b = session.add_child(root, "node", "t").unwrap();
        session.add_child(a, "leaf", "t").unwrap();
        session.add_child(b, "leaf", "t").unwrap();

        let first = ModelObject::load(&session, a).unwrap();
        let second = ModelObject::load(&session, b).unwrap();
        assert_ne!(first, second);
        assert!(first.same_content(&second));
    }
}
