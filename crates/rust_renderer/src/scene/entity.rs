//! Scene entities
//!
//! Every entity carries a name, a world transform and a visibility flag; what
//! it is lives in the [`EntityKind`] tag, matched exhaustively wherever the
//! renderer dispatches on entity type.

use crate::foundation::math::{Mat4, Mat4Ext, Vec3};
use crate::render::systems::lighting::Light;
use crate::scene::Prefab;

/// Box-volume texture projection onto the G-buffer
///
/// The entity transform maps the unit cube [-1, 1] onto the projection volume.
#[derive(Debug, Clone, PartialEq)]
pub struct Decal {
    /// Texture name resolved on the device
    pub texture: String,
}

impl Decal {
    /// Create a decal projecting `texture`
    pub fn new(texture: impl Into<String>) -> Self {
        Self { texture: texture.into() }
    }
}

/// Authored position of a reflection probe
///
/// The renderer owns the probe's cubemap; the entity only places it.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ReflectionProbeMarker;

/// What an entity is
#[derive(Debug)]
pub enum EntityKind {
    Prefab(Prefab),
    Light(Light),
    Decal(Decal),
    ReflectionProbe(ReflectionProbeMarker),
}

/// An object placed in the scene
#[derive(Debug)]
pub struct SceneEntity {
    pub name: String,
    /// Local-to-world transform
    pub model: Mat4,
    /// Invisible entities are ignored by the renderer
    pub visible: bool,
    /// Payload of the entity
    pub kind: EntityKind,
}

impl SceneEntity {
    /// Create a visible entity
    pub fn new(name: impl Into<String>, model: Mat4, kind: EntityKind) -> Self {
        Self {
            name: name.into(),
            model,
            visible: true,
            kind,
        }
    }

    /// Entity at `position` oriented so its local -Z axis faces `target`
    pub fn aimed(name: impl Into<String>, position: Vec3, target: Vec3, kind: EntityKind) -> Self {
        Self::new(name, aim_transform(position, target), kind)
    }

    /// World-space position
    pub fn position(&self) -> Vec3 {
        self.model.translation()
    }

    /// Light data when the entity is a light
    pub fn as_light(&self) -> Option<&Light> {
        match &self.kind {
            EntityKind::Light(light) => Some(light),
            _ => None,
        }
    }

    /// Mutable light data when the entity is a light
    pub fn as_light_mut(&mut self) -> Option<&mut Light> {
        match &mut self.kind {
            EntityKind::Light(light) => Some(light),
            _ => None,
        }
    }
}

/// Rigid transform placing an object at `position` looking at `target` along -Z
///
/// A target at the position itself yields a pure translation.
pub fn aim_transform(position: Vec3, target: Vec3) -> Mat4 {
    if (target - position).norm_squared() < 1e-12 {
        return Mat4::new_translation(&position);
    }
    let view = Mat4::look_at(position, target, Vec3::y());
    view.try_inverse()
        .unwrap_or_else(|| Mat4::new_translation(&position))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_aim_transform_faces_target() {
        let model = aim_transform(Vec3::new(0.0, 10.0, 0.0), Vec3::new(0.0, 0.0, 5.0));
        let forward = model.rotate_vector(Vec3::new(0.0, 0.0, -1.0));
        let expected = Vec3::new(0.0, -10.0, 5.0).normalize();

        assert_relative_eq!(model.translation(), Vec3::new(0.0, 10.0, 0.0), epsilon = 1e-5);
        assert_relative_eq!(forward, expected, epsilon = 1e-5);
    }
}
