//! View frustum extraction and box tests

use crate::foundation::math::{Mat4, Vec3, Vec4};
use super::AABB;

/// Plane defined by normal and distance from origin
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    /// Normal vector (normalized, pointing into the frustum)
    pub normal: Vec3,
    /// Distance term of the plane equation
    pub distance: f32,
}

impl Plane {
    /// Create a new plane from normal and distance
    pub fn new(normal: Vec3, distance: f32) -> Self {
        let length = normal.norm();
        if length > 0.0 {
            Self { normal: normal / length, distance: distance / length }
        } else {
            Self { normal, distance }
        }
    }

    fn from_coefficients(v: Vec4) -> Self {
        Self::new(Vec3::new(v.x, v.y, v.z), v.w)
    }

    /// Calculate signed distance from plane to point
    pub fn distance_to_point(&self, point: Vec3) -> f32 {
        self.normal.dot(&point) + self.distance
    }
}

/// Frustum for visibility culling
#[derive(Debug, Clone, PartialEq)]
pub struct Frustum {
    /// Six planes defining the frustum (left, right, bottom, top, near, far)
    pub planes: [Plane; 6],
}

impl Frustum {
    /// Create a frustum from six planes
    pub fn new(planes: [Plane; 6]) -> Self {
        Self { planes }
    }

    /// Extract frustum planes from a view-projection matrix
    ///
    /// Gribb-Hartmann extraction for column-vector matrices with clip-space
    /// depth in [-1, 1]: each plane is the last row plus or minus one of the
    /// first three rows.
    pub fn from_matrix(vp_matrix: &Mat4) -> Self {
        let row = |i: usize| -> Vec4 { vp_matrix.row(i).transpose() };
        let (r0, r1, r2, r3) = (row(0), row(1), row(2), row(3));

        Self {
            planes: [
                Plane::from_coefficients(r3 + r0),
                Plane::from_coefficients(r3 - r0),
                Plane::from_coefficients(r3 + r1),
                Plane::from_coefficients(r3 - r1),
                Plane::from_coefficients(r3 + r2),
                Plane::from_coefficients(r3 - r2),
            ],
        }
    }

    /// Check if an AABB is inside or intersects the frustum
    pub fn intersects_aabb(&self, aabb: &AABB) -> bool {
        // For each plane, check if the AABB is completely outside
        for plane in &self.planes {
            // Corner of the box furthest along the plane normal
            let mut p = aabb.min;
            if plane.normal.x >= 0.0 {
                p.x = aabb.max.x;
            }
            if plane.normal.y >= 0.0 {
                p.y = aabb.max.y;
            }
            if plane.normal.z >= 0.0 {
                p.z = aabb.max.z;
            }

            // If this point is outside the plane, the entire AABB is outside
            if plane.distance_to_point(p) < 0.0 {
                return false;
            }
        }

        true
    }

    /// Check if an AABB lies entirely inside the frustum
    pub fn contains_aabb(&self, aabb: &AABB) -> bool {
        self.planes.iter().all(|plane| {
            let mut n = aabb.max;
            if plane.normal.x >= 0.0 {
                n.x = aabb.min.x;
            }
            if plane.normal.y >= 0.0 {
                n.y = aabb.min.y;
            }
            if plane.normal.z >= 0.0 {
                n.z = aabb.min.z;
            }
            plane.distance_to_point(n) >= 0.0
        })
    }

    /// Check if a point is inside the frustum
    pub fn contains_point(&self, point: Vec3) -> bool {
        self.planes.iter().all(|plane| plane.distance_to_point(point) >= 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Mat4Ext;

    fn test_frustum() -> Frustum {
        let projection = Mat4::perspective(std::f32::consts::FRAC_PI_2, 1.0, 0.1, 100.0);
        let view = Mat4::look_at(Vec3::zeros(), Vec3::new(0.0, 0.0, -1.0), Vec3::y());
        Frustum::from_matrix(&(projection * view))
    }

    #[test]
    fn test_box_in_front_is_visible() {
        let frustum = test_frustum();
        let aabb = AABB::from_center_extents(Vec3::new(0.0, 0.0, -10.0), Vec3::new(1.0, 1.0, 1.0));
        assert!(frustum.intersects_aabb(&aabb));
        assert!(frustum.contains_aabb(&aabb));
    }

    #[test]
    fn test_box_behind_is_culled() {
        let frustum = test_frustum();
        let aabb = AABB::from_center_extents(Vec3::new(0.0, 0.0, 10.0), Vec3::new(1.0, 1.0, 1.0));
        assert!(!frustum.intersects_aabb(&aabb));
    }

    #[test]
    fn test_box_beyond_far_plane_is_culled() {
        let frustum = test_frustum();
        let aabb = AABB::from_center_extents(Vec3::new(0.0, 0.0, -200.0), Vec3::new(1.0, 1.0, 1.0));
        assert!(!frustum.intersects_aabb(&aabb));
    }

    #[test]
    fn test_box_straddling_plane_intersects_but_is_not_contained() {
        let frustum = test_frustum();
        // 90 degree fov: at z = -10 the left plane sits at x = -10
        let aabb = AABB::from_center_extents(Vec3::new(-10.0, 0.0, -10.0), Vec3::new(1.0, 1.0, 1.0));
        assert!(frustum.intersects_aabb(&aabb));
        assert!(!frustum.contains_aabb(&aabb));
    }

    #[test]
    fn test_point_inside() {
        let frustum = test_frustum();
        assert!(frustum.contains_point(Vec3::new(0.0, 0.0, -5.0)));
        assert!(!frustum.contains_point(Vec3::new(0.0, 0.0, 5.0)));
    }
}
