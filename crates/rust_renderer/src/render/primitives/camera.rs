//! # 3D Camera System
//!
//! Cameras used by the view, by shadow-casting lights and by probe capture.
//!
//! ## Design Principles
//! - **Library-agnostic**: No device dependencies in camera math
//! - **Cached matrices**: view, projection and view-projection are recomputed
//!   whenever a parameter changes, so a caller may post-process the view
//!   matrix (shadow texel snapping) and keep the result
//! - **Mathematical correctness**: column vectors, clip depth in [-1, 1]

use crate::foundation::math::{Mat4, Mat4Ext, Vec3, utils};
use crate::spatial::{AABB, Frustum};

/// Projection model of a camera
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Projection {
    /// Perspective projection
    Perspective {
        /// Vertical field of view in radians
        fov: f32,
        /// Aspect ratio (width / height)
        aspect: f32,
        /// Distance to near clipping plane
        near: f32,
        /// Distance to far clipping plane
        far: f32,
    },
    /// Orthographic projection
    Orthographic {
        /// Left plane
        left: f32,
        /// Right plane
        right: f32,
        /// Bottom plane
        bottom: f32,
        /// Top plane
        top: f32,
        /// Distance to near clipping plane
        near: f32,
        /// Distance to far clipping plane
        far: f32,
    },
}

/// 3D Camera for perspective and orthographic projections
///
/// # Coordinate System
/// Right-handed, Y-up world; the camera looks down -Z in view space.
#[derive(Debug, Clone)]
pub struct Camera {
    /// Camera position in world space
    pub eye: Vec3,

    /// Point the camera is looking at in world space
    pub center: Vec3,

    /// Up vector for camera orientation (typically [0, 1, 0])
    pub up: Vec3,

    projection: Projection,
    view_matrix: Mat4,
    projection_matrix: Mat4,
    viewprojection_matrix: Mat4,
}

impl Camera {
    /// Create a new perspective camera looking at the origin
    ///
    /// # Arguments
    /// * `eye` - Camera position in world space
    /// * `fov_degrees` - Vertical field of view in degrees
    /// * `aspect` - Aspect ratio (width / height) of the viewport
    /// * `near` - Distance to near clipping plane (must be > 0)
    /// * `far` - Distance to far clipping plane (must be > near)
    ///
    /// # Example
    /// ```rust
    /// use rust_renderer::foundation::math::Vec3;
    /// use rust_renderer::render::primitives::Camera;
    ///
    /// let camera = Camera::perspective(Vec3::new(0.0, 2.0, 5.0), 75.0, 16.0 / 9.0, 0.1, 100.0);
    /// assert!(camera.test_point_in_frustum(Vec3::zeros()));
    /// ```
    pub fn perspective(eye: Vec3, fov_degrees: f32, aspect: f32, near: f32, far: f32) -> Self {
        let mut camera = Self::unconfigured();
        camera.eye = eye;
        camera.set_perspective(fov_degrees, aspect, near, far);
        camera
    }

    /// Create a new orthographic camera looking at the origin
    pub fn orthographic(eye: Vec3, left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) -> Self {
        let mut camera = Self::unconfigured();
        camera.eye = eye;
        camera.set_orthographic(left, right, bottom, top, near, far);
        camera
    }

    fn unconfigured() -> Self {
        Self {
            eye: Vec3::new(0.0, 0.0, 1.0),
            center: Vec3::zeros(),
            up: Vec3::y(),
            projection: Projection::Perspective {
                fov: std::f32::consts::FRAC_PI_4,
                aspect: 1.0,
                near: 0.1,
                far: 1000.0,
            },
            view_matrix: Mat4::identity(),
            projection_matrix: Mat4::identity(),
            viewprojection_matrix: Mat4::identity(),
        }
    }

    /// Switch to a perspective projection (field of view in degrees)
    pub fn set_perspective(&mut self, fov_degrees: f32, aspect: f32, near: f32, far: f32) {
        self.projection = Projection::Perspective {
            fov: utils::deg_to_rad(fov_degrees),
            aspect,
            near,
            far,
        };
        self.update_matrices();
    }

    /// Switch to an orthographic projection
    pub fn set_orthographic(&mut self, left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) {
        self.projection = Projection::Orthographic { left, right, bottom, top, near, far };
        self.update_matrices();
    }

    /// Place the camera and orient it towards `center`
    pub fn look_at(&mut self, eye: Vec3, center: Vec3, up: Vec3) {
        self.eye = eye;
        self.center = center;
        self.up = up;
        self.update_matrices();
        log::trace!("Camera look_at updated - eye: {:?}, center: {:?}", eye, center);
    }

    /// Update camera aspect ratio for viewport changes
    ///
    /// Has no effect on orthographic cameras.
    pub fn set_aspect_ratio(&mut self, new_aspect: f32) {
        if let Projection::Perspective { aspect, .. } = &mut self.projection {
            if (*aspect - new_aspect).abs() > 0.01 {
                log::debug!("Camera aspect ratio changed: {:.3} -> {:.3}", aspect, new_aspect);
            }
            *aspect = new_aspect;
            self.update_matrices();
        }
    }

    /// Override the view matrix, keeping the projection
    ///
    /// The view-projection matrix is recomputed from the new view.
    pub fn set_view_matrix(&mut self, view: Mat4) {
        self.view_matrix = view;
        self.viewprojection_matrix = self.projection_matrix * self.view_matrix;
    }

    fn update_matrices(&mut self) {
        self.view_matrix = Mat4::look_at(self.eye, self.center, self.up);
        self.projection_matrix = match self.projection {
            Projection::Perspective { fov, aspect, near, far } => Mat4::perspective(fov, aspect, near, far),
            Projection::Orthographic { left, right, bottom, top, near, far } => {
                Mat4::orthographic(left, right, bottom, top, near, far)
            }
        };
        self.viewprojection_matrix = self.projection_matrix * self.view_matrix;
    }

    /// Projection model
    pub fn projection(&self) -> Projection {
        self.projection
    }

    /// World-to-view matrix
    pub fn view_matrix(&self) -> Mat4 {
        self.view_matrix
    }

    /// View-to-clip matrix
    pub fn projection_matrix(&self) -> Mat4 {
        self.projection_matrix
    }

    /// World-to-clip matrix
    pub fn view_projection_matrix(&self) -> Mat4 {
        self.viewprojection_matrix
    }

    /// Clip-to-world matrix, used to reconstruct positions from depth
    ///
    /// A singular matrix yields identity.
    pub fn inverse_view_projection_matrix(&self) -> Mat4 {
        self.viewprojection_matrix.try_inverse().unwrap_or_else(Mat4::identity)
    }

    /// Distance to the near clipping plane
    pub fn near(&self) -> f32 {
        match self.projection {
            Projection::Perspective { near, .. } | Projection::Orthographic { near, .. } => near,
        }
    }

    /// Distance to the far clipping plane
    pub fn far(&self) -> f32 {
        match self.projection {
            Projection::Perspective { far, .. } | Projection::Orthographic { far, .. } => far,
        }
    }

    /// Horizontal extent of the view volume in world units
    ///
    /// Orthographic cameras report `right - left`; perspective cameras report
    /// the width of the frustum cross-section at the far plane.
    pub fn frustum_width(&self) -> f32 {
        match self.projection {
            Projection::Orthographic { left, right, .. } => (right - left).abs(),
            Projection::Perspective { fov, aspect, far, .. } => 2.0 * far * (fov * 0.5).tan() * aspect,
        }
    }

    /// Frustum planes of the current view-projection
    pub fn frustum(&self) -> Frustum {
        Frustum::from_matrix(&self.viewprojection_matrix)
    }

    /// True when the box is inside or intersects the view volume
    pub fn test_box_in_frustum(&self, aabb: &AABB) -> bool {
        self.frustum().intersects_aabb(aabb)
    }

    /// True when the point is inside the view volume
    pub fn test_point_in_frustum(&self, point: Vec3) -> bool {
        self.frustum().contains_point(point)
    }
}

impl Default for Camera {
    /// Perspective camera above and behind the origin, 45 degree field of view
    fn default() -> Self {
        let mut camera = Self::perspective(Vec3::new(0.0, 3.0, 3.0), 45.0, 16.0 / 9.0, 0.1, 1000.0);
        camera.look_at(Vec3::new(0.0, 3.0, 3.0), Vec3::zeros(), Vec3::y());
        camera
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_view_projection_is_product() {
        let mut camera = Camera::perspective(Vec3::new(0.0, 0.0, 5.0), 60.0, 1.5, 0.1, 50.0);
        camera.look_at(Vec3::new(0.0, 0.0, 5.0), Vec3::zeros(), Vec3::y());
        let expected = camera.projection_matrix() * camera.view_matrix();
        assert_relative_eq!(camera.view_projection_matrix(), expected);
    }

    #[test]
    fn test_set_view_matrix_updates_view_projection() {
        let mut camera = Camera::orthographic(Vec3::zeros(), -1.0, 1.0, -1.0, 1.0, 0.1, 10.0);
        let view = Mat4::new_translation(&Vec3::new(0.5, 0.0, 0.0));
        camera.set_view_matrix(view);
        assert_relative_eq!(camera.view_projection_matrix(), camera.projection_matrix() * view);
    }

    #[test]
    fn test_frustum_width() {
        let ortho = Camera::orthographic(Vec3::zeros(), -25.0, 25.0, -10.0, 10.0, 0.1, 10.0);
        assert_relative_eq!(ortho.frustum_width(), 50.0);

        let persp = Camera::perspective(Vec3::zeros(), 90.0, 2.0, 0.1, 10.0);
        assert_relative_eq!(persp.frustum_width(), 40.0, epsilon = 1e-4);
    }

    #[test]
    fn test_inverse_view_projection_round_trip() {
        let mut camera = Camera::perspective(Vec3::new(1.0, 2.0, 3.0), 70.0, 1.0, 0.1, 100.0);
        camera.look_at(Vec3::new(1.0, 2.0, 3.0), Vec3::zeros(), Vec3::y());
        let product = camera.view_projection_matrix() * camera.inverse_view_projection_matrix();
        assert_relative_eq!(product, Mat4::identity(), epsilon = 1e-4);
    }
}
