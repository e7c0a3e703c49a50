//! Spatial and visibility utilities
//!
//! Bounding volumes and view-frustum tests used by render-call collection
//! and shadow-map generation.

mod bounds;
mod frustum;

pub use bounds::AABB;
pub use frustum::{Frustum, Plane};
