//! Screen-space ambient occlusion
//!
//! Occlusion is estimated from the G-buffer normals and depth using a fixed
//! kernel of points in the +Z hemisphere, generated once per renderer, and
//! then smoothed by a separate blur pass into its own target.

use std::f32::consts::PI;

use rand::Rng;

use crate::foundation::math::{Vec2, Vec3, Vec4};
use crate::render::api::{Framebuffer, GraphicsDevice, TextureId, UniformValue};
use crate::render::primitives::Camera;
use crate::render::pipelines::fullscreen;
use crate::render::state::{ClearFlags, RenderState, StateScope};

/// Random points inside a sphere of `radius`, biased away from the centre
///
/// Radii are drawn from `cbrt(0.1..1.0)`, so no point sits closer than
/// `cbrt(0.1) * radius`. With `hemisphere` set, points with negative Z are
/// mirrored to positive Z.
pub fn generate_sphere_points(rng: &mut impl Rng, count: usize, radius: f32, hemisphere: bool) -> Vec<Vec3> {
    (0..count)
        .map(|_| {
            let u: f32 = rng.gen();
            let v: f32 = rng.gen();
            let theta = u * 2.0 * PI;
            let phi = (2.0 * v - 1.0).clamp(-1.0, 1.0).acos();
            let r = (rng.gen::<f32>() * 0.9 + 0.1).cbrt() * radius;

            let mut point = Vec3::new(
                r * phi.sin() * theta.cos(),
                r * phi.sin() * theta.sin(),
                r * phi.cos(),
            );
            if hemisphere && point.z < 0.0 {
                point.z = -point.z;
            }
            point
        })
        .collect()
}

/// Sample kernel used by the occlusion pass
#[derive(Debug, Clone)]
pub struct SsaoKernel {
    points: Vec<Vec3>,
}

impl SsaoKernel {
    /// Generate a unit-radius hemisphere kernel
    pub fn new(rng: &mut impl Rng, count: usize) -> Self {
        Self {
            points: generate_sphere_points(rng, count, 1.0, true),
        }
    }

    /// Kernel points
    pub fn points(&self) -> &[Vec3] {
        &self.points
    }
}

/// Inputs of the occlusion pass
pub struct SsaoInputs<'a> {
    pub normal_texture: TextureId,
    pub depth_texture: TextureId,
    pub camera: &'a Camera,
    pub radius: f32,
    pub blur: bool,
}

/// Compute occlusion into `ssao`, optionally blurring into `blur_target`
///
/// Returns the texture holding the final occlusion, or `None` when the
/// occlusion program is missing.
pub fn render_ssao(
    device: &mut dyn GraphicsDevice,
    inputs: &SsaoInputs<'_>,
    kernel: &SsaoKernel,
    ssao: &Framebuffer,
    blur_target: &Framebuffer,
) -> Option<TextureId> {
    let mut scope = StateScope::new(device);
    scope.apply(RenderState::fullscreen());

    let occlusion = ssao.color_texture(0)?;
    scope.bind_framebuffer(ssao.target());
    scope.clear(ClearFlags::COLOR, Vec4::new(1.0, 1.0, 1.0, 1.0));

    if scope.bind_program("ssao").is_none() {
        log::warn!("Program 'ssao' missing, ambient occlusion disabled for this frame");
        return None;
    }

    let inverse_vp = inputs.camera.inverse_view_projection_matrix();
    let inv_res = Vec2::new(1.0 / ssao.width.max(1) as f32, 1.0 / ssao.height.max(1) as f32);
    scope.set_uniform("u_gb1_texture", UniformValue::Texture { texture: inputs.normal_texture, slot: 1 });
    scope.set_uniform("u_depth_texture", UniformValue::Texture { texture: inputs.depth_texture, slot: 3 });
    scope.set_uniform("u_viewprojection", UniformValue::Mat4(inputs.camera.view_projection_matrix()));
    scope.set_uniform("u_inverse_viewprojection", UniformValue::Mat4(inverse_vp));
    scope.set_uniform("u_iRes", UniformValue::Vec2(inv_res));
    scope.set_uniform("u_radius", UniformValue::Float(inputs.radius));
    scope.set_uniform("u_points", UniformValue::Vec3Array(kernel.points().to_vec()));
    fullscreen::draw_quad(&mut *scope);

    if !inputs.blur {
        return Some(occlusion);
    }

    let blurred = blur_target.color_texture(0)?;
    scope.bind_framebuffer(blur_target.target());
    if scope.bind_program("ssao_blur").is_none() {
        log::warn!("Program 'ssao_blur' missing, using unblurred occlusion");
        return Some(occlusion);
    }
    scope.set_uniform("u_ssao_input", UniformValue::Texture { texture: occlusion, slot: 1 });
    scope.set_uniform("u_iRes", UniformValue::Vec2(inv_res));
    fullscreen::draw_quad(&mut *scope);

    Some(blurred)
}
