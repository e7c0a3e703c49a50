//! # Scene Model
//!
//! The data the renderer consumes: an ordered entity list with a tagged kind
//! per entity, prefab node trees, and the mesh/material registry they refer
//! to. The renderer only reads the scene, except for the shadow resources it
//! keeps on each light.

mod entity;
mod prefab;
mod resources;
#[allow(clippy::module_inception)]
mod scene;

pub mod render_collector;

pub use entity::{aim_transform, Decal, EntityKind, ReflectionProbeMarker, SceneEntity};
pub use prefab::{Node, Prefab};
pub use render_collector::{collect_render_calls, CollectedFrame};
pub use resources::{MaterialKey, MeshKey, SceneResources};
pub use scene::{MaterialFeatures, Scene};
