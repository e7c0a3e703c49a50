//! Lighting system: light sources and their shader upload

pub mod lighting;
pub mod uniforms;

pub use lighting::{Light, LightType, SceneLight};
pub use uniforms::{MAX_SINGLE_PASS_LIGHTS, SHADOW_MAP_SLOT};
