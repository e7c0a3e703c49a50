//! Mesh representation for rendering
//!
//! A `Mesh` is a reference to geometry already uploaded to the device plus the
//! CPU-side data the renderer needs for culling: the local bounding box and
//! the vertex count. Loading and uploading vertex data is the job of the
//! resource layer that creates the device handle.

use crate::render::api::{BuiltinMesh, GpuMeshId, GraphicsDevice};
use crate::foundation::math::Vec3;
use crate::spatial::AABB;

/// Uploaded geometry with its local-space bounds
#[derive(Debug, Clone)]
pub struct Mesh {
    /// Optional name for debugging
    pub name: String,
    /// Device geometry handle
    pub gpu_mesh: GpuMeshId,
    /// Bounding box in mesh-local space
    pub bounds: AABB,
    /// Number of vertices submitted per draw
    pub vertex_count: u32,
}

impl Mesh {
    /// Wrap an uploaded mesh
    pub fn new(name: impl Into<String>, gpu_mesh: GpuMeshId, bounds: AABB, vertex_count: u32) -> Self {
        Self {
            name: name.into(),
            gpu_mesh,
            bounds,
            vertex_count,
        }
    }

    /// Reference one of the device's built-in meshes
    ///
    /// Quad and cube span [-1, 1]; the sphere has unit radius.
    pub fn builtin(device: &dyn GraphicsDevice, kind: BuiltinMesh) -> Self {
        let (name, vertex_count, bounds) = match kind {
            BuiltinMesh::Quad => ("quad", 6, AABB::new(Vec3::new(-1.0, -1.0, 0.0), Vec3::new(1.0, 1.0, 0.0))),
            BuiltinMesh::Sphere => ("sphere", 2880, AABB::new(Vec3::repeat(-1.0), Vec3::repeat(1.0))),
            BuiltinMesh::Cube => ("cube", 36, AABB::new(Vec3::repeat(-1.0), Vec3::repeat(1.0))),
        };
        Self::new(name, device.builtin_mesh(kind), bounds, vertex_count)
    }

    /// True when the mesh has geometry to draw
    pub fn is_drawable(&self) -> bool {
        self.vertex_count > 0
    }
}
