//! Prefab node hierarchies
//!
//! A prefab is a tree of nodes, each with a local transform and optionally a
//! mesh/material pair. Children are owned by their parent, so the hierarchy
//! is a tree by construction and cannot contain cycles.

use crate::foundation::math::Mat4;
use crate::scene::{MaterialKey, MeshKey};

/// One node of a prefab hierarchy
#[derive(Debug, Clone)]
pub struct Node {
    /// Optional name for debugging
    pub name: String,
    /// Transform relative to the parent node
    pub model: Mat4,
    /// Invisible nodes hide their whole subtree
    pub visible: bool,
    pub mesh: Option<MeshKey>,
    pub material: Option<MaterialKey>,
    /// Child nodes, transformed by this node's model
    pub children: Vec<Node>,
}

impl Node {
    /// Create an empty visible node with identity transform
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            model: Mat4::identity(),
            visible: true,
            mesh: None,
            material: None,
            children: Vec::new(),
        }
    }

    /// Attach drawable geometry
    pub fn with_mesh(mut self, mesh: MeshKey, material: MaterialKey) -> Self {
        self.mesh = Some(mesh);
        self.material = Some(material);
        self
    }

    /// Set the local transform
    pub fn with_model(mut self, model: Mat4) -> Self {
        self.model = model;
        self
    }

    /// Set visibility
    pub fn with_visible(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }

    /// Append a child node
    pub fn with_child(mut self, child: Node) -> Self {
        self.children.push(child);
        self
    }

    /// Append a child node in place
    pub fn add_child(&mut self, child: Node) {
        self.children.push(child);
    }

    /// True when the node carries both a mesh and a material
    pub fn is_drawable(&self) -> bool {
        self.mesh.is_some() && self.material.is_some()
    }

    /// Number of nodes in this subtree, including self
    pub fn subtree_len(&self) -> usize {
        1 + self.children.iter().map(Node::subtree_len).sum::<usize>()
    }
}

/// Reusable node hierarchy placed in the scene by prefab entities
#[derive(Debug, Clone)]
pub struct Prefab {
    pub name: String,
    /// Top of the node tree
    pub root: Node,
}

impl Prefab {
    /// Create a prefab from its root node
    pub fn new(name: impl Into<String>, root: Node) -> Self {
        Self {
            name: name.into(),
            root,
        }
    }

    /// Prefab made of a single drawable node
    pub fn single(name: impl Into<String>, mesh: MeshKey, material: MaterialKey) -> Self {
        let name = name.into();
        let root = Node::new(name.clone()).with_mesh(mesh, material);
        Self { name, root }
    }
}
