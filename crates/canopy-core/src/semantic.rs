//! The semantic payload: business objects that diagram elements visualize.
//!
//! The payload is produced by an external importer (for example an XML
//! reader). Canopy only needs each node's id, kind, parent, and a bag of
//! notation-specific attributes. Elements point at nodes through
//! `business_object`, and the model keeps the reverse lookup node → element.

use std::collections::HashMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::{error::CanvasError, identifier::Id};

/// One business object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SemanticNode {
    id: Id,
    kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    parent: Option<Id>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    attributes: IndexMap<String, String>,
}

impl SemanticNode {
    pub fn new(id: Id, kind: impl Into<String>, parent: Option<Id>) -> Self {
        Self {
            id,
            kind: kind.into(),
            parent,
            attributes: IndexMap::new(),
        }
    }

    /// Adds an attribute (builder style).
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn id(&self) -> Id {
        self.id
    }

    /// Kind discriminator, e.g. `bpmn:Process`.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn parent(&self) -> Option<Id> {
        self.parent
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    pub fn attributes(&self) -> &IndexMap<String, String> {
        &self.attributes
    }
}

/// Serializable form of a semantic payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SemanticPayload {
    /// The definitions node; top-level constructs are its direct children.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<Id>,
    #[serde(default)]
    pub nodes: Vec<SemanticNode>,
}

/// Business-object tree plus the node → element back-references.
#[derive(Debug, Default)]
pub struct SemanticModel {
    root: Option<Id>,
    nodes: IndexMap<Id, SemanticNode>,
    elements: HashMap<Id, Id>,
}

impl SemanticModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a model from an import payload.
    ///
    /// # Errors
    ///
    /// Returns [`CanvasError::DuplicateId`] for repeated node ids and
    /// [`CanvasError::NotFound`] if the root or a parent is not among the nodes.
    pub fn from_payload(payload: SemanticPayload) -> Result<Self, CanvasError> {
        let mut model = Self::new();
        for node in payload.nodes {
            if model.nodes.contains_key(&node.id) {
                return Err(CanvasError::DuplicateId(node.id));
            }
            model.nodes.insert(node.id, node);
        }

        if let Some(root) = payload.root {
            if !model.nodes.contains_key(&root) {
                return Err(CanvasError::NotFound(root));
            }
        }
        for node in model.nodes.values() {
            if let Some(parent) = node.parent {
                if !model.nodes.contains_key(&parent) {
                    return Err(CanvasError::NotFound(parent));
                }
            }
        }

        model.root = payload.root;
        Ok(model)
    }

    pub fn root(&self) -> Option<Id> {
        self.root
    }

    pub fn node(&self, id: Id) -> Option<&SemanticNode> {
        self.nodes.get(&id)
    }

    pub fn contains(&self, id: Id) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &SemanticNode> {
        self.nodes.values()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Direct children of `parent`, in insertion order.
    pub fn children_of(&self, parent: Id) -> impl Iterator<Item = &SemanticNode> {
        self.nodes
            .values()
            .filter(move |node| node.parent == Some(parent))
    }

    /// Direct children of the root. Empty when the payload has no root.
    pub fn top_level(&self) -> Vec<&SemanticNode> {
        match self.root {
            Some(root) => self.children_of(root).collect(),
            None => Vec::new(),
        }
    }

    /// Inserts a new node.
    ///
    /// # Errors
    ///
    /// Returns [`CanvasError::DuplicateId`] if the id is taken, or
    /// [`CanvasError::NotFound`] if the parent does not exist.
    pub fn add_node(&mut self, node: SemanticNode) -> Result<(), CanvasError> {
        if self.nodes.contains_key(&node.id) {
            return Err(CanvasError::DuplicateId(node.id));
        }
        if let Some(parent) = node.parent {
            if !self.nodes.contains_key(&parent) {
                return Err(CanvasError::NotFound(parent));
            }
        }
        self.nodes.insert(node.id, node);
        Ok(())
    }

    /// Removes a node and its back-reference.
    ///
    /// # Errors
    ///
    /// Returns [`CanvasError::NotFound`] if the node does not exist, or
    /// [`CanvasError::InvalidOperation`] while other nodes still name it as
    /// their parent.
    pub fn remove_node(&mut self, id: Id) -> Result<SemanticNode, CanvasError> {
        if !self.nodes.contains_key(&id) {
            return Err(CanvasError::NotFound(id));
        }
        if self.children_of(id).next().is_some() {
            return Err(CanvasError::InvalidOperation(format!(
                "business object `{id}` still has children"
            )));
        }
        self.elements.remove(&id);
        self.nodes
            .shift_remove(&id)
            .ok_or(CanvasError::NotFound(id))
    }

    /// Re-parents a node and returns its previous parent.
    ///
    /// # Errors
    ///
    /// Returns [`CanvasError::NotFound`] if the node or the new parent does
    /// not exist.
    pub fn set_parent(&mut self, id: Id, parent: Option<Id>) -> Result<Option<Id>, CanvasError> {
        if let Some(parent) = parent {
            if !self.nodes.contains_key(&parent) {
                return Err(CanvasError::NotFound(parent));
            }
        }
        let node = self.nodes.get_mut(&id).ok_or(CanvasError::NotFound(id))?;
        Ok(std::mem::replace(&mut node.parent, parent))
    }

    /// Sets an attribute and returns its previous value. `None` removes it.
    ///
    /// # Errors
    ///
    /// Returns [`CanvasError::NotFound`] if the node does not exist.
    pub fn set_attribute(
        &mut self,
        id: Id,
        key: &str,
        value: Option<String>,
    ) -> Result<Option<String>, CanvasError> {
        let node = self.nodes.get_mut(&id).ok_or(CanvasError::NotFound(id))?;
        Ok(match value {
            Some(value) => node.attributes.insert(key.to_string(), value),
            None => node.attributes.shift_remove(key),
        })
    }

    /// Records that `element` visualizes `node`.
    pub fn link(&mut self, node: Id, element: Id) {
        self.elements.insert(node, element);
    }

    /// Drops the back-reference of `node`, returning the element it pointed to.
    pub fn unlink(&mut self, node: Id) -> Option<Id> {
        self.elements.remove(&node)
    }

    /// Reverse lookup: the element visualizing `node`.
    pub fn element_for(&self, node: Id) -> Option<Id> {
        self.elements.get(&node).copied()
    }

    /// Serializable form of the model.
    ///
    /// With a root set, only nodes under the root or visualized by an
    /// element are kept. Business objects detached by a delete are dropped.
    pub fn to_payload(&self) -> SemanticPayload {
        let nodes = self
            .nodes
            .values()
            .filter(|node| self.elements.contains_key(&node.id) || self.is_reachable(node.id))
            .cloned()
            .collect();
        SemanticPayload {
            root: self.root,
            nodes,
        }
    }

    fn is_reachable(&self, id: Id) -> bool {
        let Some(root) = self.root else {
            return true;
        };
        std::iter::successors(Some(id), |current| {
            self.nodes.get(current).and_then(|node| node.parent)
        })
        .take(self.nodes.len() + 1)
        .any(|current| current == root)
    }
}
