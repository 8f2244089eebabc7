//! Node arena backing every tree store
//!
//! Nodes live in a map keyed by a stable [`NodeId`]. Children are kept as an
//! ordered id list; the parent is only a back-reference id, never an owning
//! link. All mutations go through [`Change`] so that a session journal can be
//! replayed onto a newer tree.

use super::StoreError;
use crate::models::path::{NodePath, Segment};
use crate::models::value::{Property, PropertyValue};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Stable node identifier
pub type NodeId = Uuid;

/// Primary type of the root node
pub const ROOT_TYPE: &str = "mm:root";

/// A single stored node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeData {
    pub id: NodeId,
    pub name: String,
    pub primary_type: String,
    pub parent: Option<NodeId>,
    pub properties: Vec<Property>,
    pub children: Vec<NodeId>,
}

impl NodeData {
    pub fn property(&self, name: &str) -> Option<&PropertyValue> {
        self.properties
            .iter()
            .find(|p| p.name == name)
            .map(|p| &p.value)
    }
}

/// A journaled mutation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Change {
    AddChild {
        parent: NodeId,
        id: NodeId,
        name: String,
        primary_type: String,
    },
    SetProperty {
        node: NodeId,
        name: String,
        value: PropertyValue,
    },
    RemoveProperty {
        node: NodeId,
        name: String,
    },
    RemoveNode {
        node: NodeId,
    },
}

/// The whole node tree
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeTree {
    root: NodeId,
    nodes: HashMap<NodeId, NodeData>,
}

impl Default for NodeTree {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeTree {
    /// Create a tree holding only the root node
    pub fn new() -> Self {
        let root = Uuid::new_v4();
        let mut nodes = HashMap::new();
        nodes.insert(
            root,
            NodeData {
                id: root,
                name: String::new(),
                primary_type: ROOT_TYPE.to_string(),
                parent: None,
                properties: Vec::new(),
                children: Vec::new(),
            },
        );
        Self { root, nodes }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        // the root always exists
        self.nodes.len() <= 1
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn get(&self, id: NodeId) -> Result<&NodeData, StoreError> {
        self.nodes
            .get(&id)
            .ok_or_else(|| StoreError::NodeNotFound(id.to_string()))
    }

    fn get_mut(&mut self, id: NodeId) -> Result<&mut NodeData, StoreError> {
        self.nodes
            .get_mut(&id)
            .ok_or_else(|| StoreError::NodeNotFound(id.to_string()))
    }

    /// Look up the node at an absolute path
    pub fn find(&self, path: &NodePath) -> Option<NodeId> {
        if !path.is_absolute() {
            return None;
        }
        let mut current = self.root;
        for segment in path.normalize().segments() {
            let Segment::Child { name, index } = segment else {
                return None;
            };
            let node = self.nodes.get(&current)?;
            current = node
                .children
                .iter()
                .filter(|child| self.nodes.get(*child).is_some_and(|c| &c.name == name))
                .nth(index.checked_sub(1)?)
                .copied()?;
        }
        Some(current)
    }

    /// Absolute path of a node, with same-name-sibling indexes
    pub fn path_of(&self, id: NodeId) -> Result<NodePath, StoreError> {
        let mut segments = Vec::new();
        let mut current = self.get(id)?;
        while let Some(parent_id) = current.parent {
            let parent = self.get(parent_id)?;
            let index = parent
                .children
                .iter()
                .filter(|child| self.nodes.get(*child).is_some_and(|c| c.name == current.name))
                .position(|child| *child == current.id)
                .map(|pos| pos + 1)
                .unwrap_or(1);
            segments.push((current.name.clone(), index));
            current = parent;
        }
        let mut path = NodePath::root();
        for (name, index) in segments.into_iter().rev() {
            path = path.child(name, index);
        }
        Ok(path)
    }

    /// Whether `node` is `ancestor` or lies below it
    pub fn is_descendant(&self, node: NodeId, ancestor: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.nodes.get(&id).and_then(|n| n.parent);
        }
        false
    }

    /// Apply one change. Failing changes leave the tree untouched.
    pub fn apply(&mut self, change: &Change) -> Result<(), StoreError> {
        match change {
            Change::AddChild {
                parent,
                id,
                name,
                primary_type,
            } => {
                if self.nodes.contains_key(id) {
                    return Err(StoreError::AlreadyExists(id.to_string()));
                }
                self.get_mut(*parent)?.children.push(*id);
                self.nodes.insert(
                    *id,
                    NodeData {
                        id: *id,
                        name: name.clone(),
                        primary_type: primary_type.clone(),
                        parent: Some(*parent),
                        properties: Vec::new(),
                        children: Vec::new(),
                    },
                );
            }
            Change::SetProperty { node, name, value } => {
                let node = self.get_mut(*node)?;
                match node.properties.iter_mut().find(|p| &p.name == name) {
                    Some(existing) => existing.value = value.clone(),
                    None => node.properties.push(Property::new(name.clone(), value.clone())),
                }
            }
            Change::RemoveProperty { node, name } => {
                self.get_mut(*node)?.properties.retain(|p| &p.name != name);
            }
            Change::RemoveNode { node } => {
                if *node == self.root {
                    return Err(StoreError::InvalidOperation(
                        "the root node cannot be removed".to_string(),
                    ));
                }
                let parent = self.get(*node)?.parent;
                if let Some(parent) = parent {
                    self.get_mut(parent)?.children.retain(|c| c != node);
                }
                let mut pending = vec![*node];
                while let Some(id) = pending.pop() {
                    if let Some(removed) = self.nodes.remove(&id) {
                        pending.extend(removed.children);
                    }
                }
            }
        }
        Ok(())
    }
}
