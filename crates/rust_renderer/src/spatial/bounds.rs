//! Axis-aligned bounding boxes

use crate::foundation::math::{Mat4, Mat4Ext, Vec3};

/// Axis-Aligned Bounding Box for visibility queries
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AABB {
    /// Minimum corner of the bounding box
    pub min: Vec3,
    /// Maximum corner of the bounding box
    pub max: Vec3,
}

impl AABB {
    /// Create a new AABB from min and max points
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Create an AABB centered at a point with given half extents
    pub fn from_center_extents(center: Vec3, extents: Vec3) -> Self {
        Self {
            min: center - extents,
            max: center + extents,
        }
    }

    /// Get the center of the AABB
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Get the extents (half-size) of the AABB
    pub fn extents(&self) -> Vec3 {
        (self.max - self.min) * 0.5
    }

    /// Check if this AABB contains a point
    pub fn contains_point(&self, point: Vec3) -> bool {
        point.x >= self.min.x && point.x <= self.max.x &&
        point.y >= self.min.y && point.y <= self.max.y &&
        point.z >= self.min.z && point.z <= self.max.z
    }

    /// Check if this AABB intersects another AABB
    pub fn intersects(&self, other: &AABB) -> bool {
        self.min.x <= other.max.x && self.max.x >= other.min.x &&
        self.min.y <= other.max.y && self.max.y >= other.min.y &&
        self.min.z <= other.max.z && self.max.z >= other.min.z
    }

    /// Transform this box by an affine matrix and return the world-space AABB
    /// enclosing the result.
    ///
    /// Uses the center/half-extent form: the new half extent is the absolute
    /// value of the rotation-scale block applied to the old one.
    pub fn transformed(&self, matrix: &Mat4) -> AABB {
        let center = matrix.transform_position(self.center());
        let extents = self.extents();
        let abs = matrix.fixed_view::<3, 3>(0, 0).abs();
        let half = abs * extents;
        AABB::from_center_extents(center, half)
    }
}
