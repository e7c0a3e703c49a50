//! Mesh and material storage owned by a scene
//!
//! Scene nodes and render calls refer to resources through slot-map keys, so a
//! removed resource leaves a dangling key that lookups report as absent
//! instead of a dangling reference.

use slotmap::{new_key_type, SlotMap};

use crate::render::primitives::Mesh;
use crate::render::resources::materials::Material;

new_key_type! {
    /// Key of a mesh in [`SceneResources`]
    pub struct MeshKey;

    /// Key of a material in [`SceneResources`]
    pub struct MaterialKey;
}

/// Registry of the meshes and materials a scene draws with
#[derive(Debug, Default)]
pub struct SceneResources {
    meshes: SlotMap<MeshKey, Mesh>,
    materials: SlotMap<MaterialKey, Material>,
}

impl SceneResources {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a mesh
    pub fn add_mesh(&mut self, mesh: Mesh) -> MeshKey {
        self.meshes.insert(mesh)
    }

    /// Register a material
    pub fn add_material(&mut self, material: Material) -> MaterialKey {
        self.materials.insert(material)
    }

    /// Remove a mesh; nodes still referencing it are skipped when drawn
    pub fn remove_mesh(&mut self, key: MeshKey) -> Option<Mesh> {
        self.meshes.remove(key)
    }

    /// Remove a material; nodes still referencing it are skipped when drawn
    pub fn remove_material(&mut self, key: MaterialKey) -> Option<Material> {
        self.materials.remove(key)
    }

    /// Look up a mesh
    pub fn mesh(&self, key: MeshKey) -> Option<&Mesh> {
        self.meshes.get(key)
    }

    /// Look up a material
    pub fn material(&self, key: MaterialKey) -> Option<&Material> {
        self.materials.get(key)
    }

    /// Mutable material access for editing at runtime
    pub fn material_mut(&mut self, key: MaterialKey) -> Option<&mut Material> {
        self.materials.get_mut(key)
    }

    /// Number of registered meshes
    pub fn mesh_count(&self) -> usize {
        self.meshes.len()
    }

    /// Number of registered materials
    pub fn material_count(&self) -> usize {
        self.materials.len()
    }
}
