//! Scene container

use crate::foundation::math::{Mat4, Vec3};
use crate::render::primitives::Mesh;
use crate::render::resources::materials::Material;
use crate::render::systems::lighting::Light;
use crate::scene::{
    Decal, EntityKind, MaterialKey, MeshKey, Prefab, ReflectionProbeMarker, SceneEntity, SceneResources,
};

/// Material features applied when shading
///
/// Disabled features bind the white texture or a zero factor instead of the
/// material's own data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaterialFeatures {
    pub emissive: bool,
    /// Occlusion and metallic-roughness maps
    pub occlusion: bool,
    pub normal_maps: bool,
}

impl Default for MaterialFeatures {
    fn default() -> Self {
        Self {
            emissive: true,
            occlusion: true,
            normal_maps: true,
        }
    }
}

/// Everything the renderer draws, in authoring order
#[derive(Debug)]
pub struct Scene {
    /// All entities in insertion order
    pub entities: Vec<SceneEntity>,
    /// Constant light added to every surface
    pub ambient_light: Vec3,
    pub background_color: Vec3,
    pub features: MaterialFeatures,
    /// Meshes and materials referenced by nodes
    pub resources: SceneResources,
}

impl Default for Scene {
    fn default() -> Self {
        Self {
            entities: Vec::new(),
            ambient_light: Vec3::new(0.1, 0.1, 0.1),
            background_color: Vec3::zeros(),
            features: MaterialFeatures::default(),
            resources: SceneResources::new(),
        }
    }
}

impl Scene {
    /// Create an empty scene
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a mesh with the scene resources
    pub fn add_mesh(&mut self, mesh: Mesh) -> MeshKey {
        self.resources.add_mesh(mesh)
    }

    /// Register a material with the scene resources
    pub fn add_material(&mut self, material: Material) -> MaterialKey {
        self.resources.add_material(material)
    }

    /// Append an entity, returning its index
    pub fn add_entity(&mut self, entity: SceneEntity) -> usize {
        self.entities.push(entity);
        self.entities.len() - 1
    }

    /// Place a prefab
    pub fn add_prefab(&mut self, name: impl Into<String>, model: Mat4, prefab: Prefab) -> usize {
        self.add_entity(SceneEntity::new(name, model, EntityKind::Prefab(prefab)))
    }

    /// Place a light at `position` aimed at its target
    pub fn add_light(&mut self, name: impl Into<String>, position: Vec3, light: Light) -> usize {
        let target = light.target;
        self.add_entity(SceneEntity::aimed(name, position, target, EntityKind::Light(light)))
    }

    /// Place a decal whose projection box is `model` applied to the unit cube
    pub fn add_decal(&mut self, name: impl Into<String>, model: Mat4, decal: Decal) -> usize {
        self.add_entity(SceneEntity::new(name, model, EntityKind::Decal(decal)))
    }

    /// Place a reflection probe
    pub fn add_reflection_probe(&mut self, name: impl Into<String>, position: Vec3) -> usize {
        self.add_entity(SceneEntity::new(
            name,
            Mat4::new_translation(&position),
            EntityKind::ReflectionProbe(ReflectionProbeMarker),
        ))
    }

    /// Find an entity by name
    pub fn entity(&self, name: &str) -> Option<&SceneEntity> {
        self.entities.iter().find(|entity| entity.name == name)
    }

    /// Find an entity by name for editing
    pub fn entity_mut(&mut self, name: &str) -> Option<&mut SceneEntity> {
        self.entities.iter_mut().find(|entity| entity.name == name)
    }

    /// Positions of visible reflection probe entities
    pub fn reflection_probe_positions(&self) -> Vec<Vec3> {
        self.entities
            .iter()
            .filter(|entity| entity.visible && matches!(entity.kind, EntityKind::ReflectionProbe(_)))
            .map(SceneEntity::position)
            .collect()
    }
}
