//! Core rendering primitives

pub mod camera;
pub mod mesh;

pub use camera::{Camera, Projection};
pub use mesh::Mesh;
