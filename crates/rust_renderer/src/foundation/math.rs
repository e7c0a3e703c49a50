//! Math utilities and types
//!
//! Thin aliases over `nalgebra` plus the handful of matrix helpers the
//! renderer needs. Conventions follow the immediate-mode graphics API the
//! renderer drives: column vectors, right-handed view space looking down -Z,
//! and clip-space depth in [-1, 1].

pub use nalgebra::{
    Vector2, Vector3, Vector4,
    Matrix3, Matrix4,
};

/// 2D vector type
pub type Vec2 = Vector2<f32>;

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 4D vector type
pub type Vec4 = Vector4<f32>;

/// 3x3 matrix type
pub type Mat3 = Matrix3<f32>;

/// 4x4 matrix type
pub type Mat4 = Matrix4<f32>;

/// 3D point type
pub type Point3 = nalgebra::Point3<f32>;

/// Math constants
pub mod constants {
    /// Pi constant
    pub const PI: f32 = std::f32::consts::PI;

    /// Degrees to radians conversion factor
    pub const DEG_TO_RAD: f32 = PI / 180.0;

    /// Radians to degrees conversion factor
    pub const RAD_TO_DEG: f32 = 180.0 / PI;
}

/// Math utility functions
pub mod utils {
    use super::constants;

    /// Convert degrees to radians
    pub fn deg_to_rad(degrees: f32) -> f32 {
        degrees * constants::DEG_TO_RAD
    }

    /// Convert radians to degrees
    pub fn rad_to_deg(radians: f32) -> f32 {
        radians * constants::RAD_TO_DEG
    }

    /// Round `value` to the nearest multiple of `step`
    ///
    /// A non-positive or non-finite step leaves the value untouched.
    pub fn snap_to_grid(value: f32, step: f32) -> f32 {
        if step > 0.0 && step.is_finite() {
            (value / step).round() * step
        } else {
            value
        }
    }
}

/// Extension trait for Mat4 with additional convenience methods
pub trait Mat4Ext {
    /// Create a perspective projection matrix (vertical fov in radians)
    fn perspective(fov_y: f32, aspect: f32, near: f32, far: f32) -> Mat4;

    /// Create an orthographic projection matrix
    fn orthographic(left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) -> Mat4;

    /// Create a right-handed look-at view matrix
    fn look_at(eye: Vec3, target: Vec3, up: Vec3) -> Mat4;

    /// Translation part of an affine matrix
    fn translation(&self) -> Vec3;

    /// Transform a point (w = 1)
    fn transform_position(&self, point: Vec3) -> Vec3;

    /// Rotate a direction by the upper 3x3 part (w = 0)
    fn rotate_vector(&self, vector: Vec3) -> Vec3;
}

impl Mat4Ext for Mat4 {
    fn perspective(fov_y: f32, aspect: f32, near: f32, far: f32) -> Mat4 {
        Mat4::new_perspective(aspect, fov_y, near, far)
    }

    fn orthographic(left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) -> Mat4 {
        Mat4::new_orthographic(left, right, bottom, top, near, far)
    }

    fn look_at(eye: Vec3, target: Vec3, up: Vec3) -> Mat4 {
        // Degenerate up vectors (parallel to the view direction) fall back to +Z
        let forward = target - eye;
        let up = if forward.cross(&up).norm_squared() < 1e-12 {
            Vec3::new(0.0, 0.0, 1.0)
        } else {
            up
        };
        Mat4::look_at_rh(&Point3::from(eye), &Point3::from(target), &up)
    }

    fn translation(&self) -> Vec3 {
        Vec3::new(self[(0, 3)], self[(1, 3)], self[(2, 3)])
    }

    fn transform_position(&self, point: Vec3) -> Vec3 {
        self.transform_point(&Point3::from(point)).coords
    }

    fn rotate_vector(&self, vector: Vec3) -> Vec3 {
        self.transform_vector(&vector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_snap_to_grid() {
        assert_relative_eq!(utils::snap_to_grid(1.26, 0.5), 1.5);
        assert_relative_eq!(utils::snap_to_grid(-1.24, 0.5), -1.0);
        assert_relative_eq!(utils::snap_to_grid(3.3, 0.0), 3.3);
    }

    #[test]
    fn test_translation_and_rotation_helpers() {
        let m = Mat4::new_translation(&Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(m.translation(), Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(m.transform_position(Vec3::zeros()), Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(m.rotate_vector(Vec3::new(0.0, 0.0, -1.0)), Vec3::new(0.0, 0.0, -1.0));
    }

    #[test]
    fn test_look_at_moves_eye_to_origin() {
        let view = Mat4::look_at(Vec3::new(0.0, 0.0, 5.0), Vec3::zeros(), Vec3::y());
        let eye_in_view = view.transform_position(Vec3::new(0.0, 0.0, 5.0));
        assert_relative_eq!(eye_in_view, Vec3::zeros(), epsilon = 1e-5);
        let target_in_view = view.transform_position(Vec3::zeros());
        assert_relative_eq!(target_in_view.z, -5.0, epsilon = 1e-5);
    }

    #[test]
    fn test_look_at_straight_down_is_finite() {
        let view = Mat4::look_at(Vec3::new(0.0, 10.0, 0.0), Vec3::zeros(), Vec3::y());
        assert!(view.iter().all(|v| v.is_finite()));
    }
}
