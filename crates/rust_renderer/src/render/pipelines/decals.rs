//! Decal projection onto the G-buffer
//!
//! Each decal is a unit cube placed by its entity transform. The cube is
//! rasterized with front faces culled so it still covers the screen when the
//! camera is inside the volume; the shader reconstructs world positions from
//! a depth snapshot, moves them into decal space with the inverse transform
//! and blends the decal texture into the albedo target. Only RGB is written,
//! leaving the G-buffer alpha untouched.

use crate::foundation::math::{Mat4, Vec2};
use crate::render::api::{BuiltinMesh, Framebuffer, GraphicsDevice, UniformValue};
use crate::render::pipelines::FrameContext;
use crate::render::state::{BlendMode, ColorMask, CullMode, StateScope};
use crate::scene::EntityKind;

/// Texture slot of the decal image
pub const DECAL_TEXTURE_SLOT: u32 = 5;

/// Project the decal entities at `decals` into `gbuffers`
///
/// `snapshot` receives a copy of the albedo target and depth first, so the
/// shader never samples what it writes. Returns the number of decals drawn;
/// decals whose texture is missing are skipped.
pub fn render_decals(
    device: &mut dyn GraphicsDevice,
    ctx: &FrameContext<'_>,
    decals: &[usize],
    gbuffers: &Framebuffer,
    snapshot: &Framebuffer,
) -> usize {
    if decals.is_empty() {
        return 0;
    }
    let (Some(albedo), Some(albedo_copy), Some(depth_copy)) =
        (gbuffers.color_texture(0), snapshot.color_texture(0), snapshot.depth_texture)
    else {
        log::warn!("Decal targets incomplete, skipping decals");
        return 0;
    };

    let mut scope = StateScope::new(device);
    scope.copy_texture(albedo, albedo_copy);
    scope.copy_depth(gbuffers.id, snapshot.target());

    scope.bind_framebuffer(gbuffers.target());
    scope.update(|state| {
        state.depth_test = false;
        state.depth_write = false;
        state.blend = BlendMode::AlphaBlend;
        state.cull = CullMode::Front;
        state.color_mask = ColorMask::RGB;
    });

    if scope.bind_program("decal").is_none() {
        log::warn!("Program 'decal' missing, skipping decals");
        return 0;
    }

    let camera = ctx.camera;
    let inv_res = Vec2::new(1.0 / gbuffers.width.max(1) as f32, 1.0 / gbuffers.height.max(1) as f32);
    scope.set_uniform("u_viewprojection", UniformValue::Mat4(camera.view_projection_matrix()));
    scope.set_uniform("u_inverse_viewprojection", UniformValue::Mat4(camera.inverse_view_projection_matrix()));
    scope.set_uniform("u_iRes", UniformValue::Vec2(inv_res));
    scope.set_uniform("u_color_texture", UniformValue::Texture { texture: albedo_copy, slot: 0 });
    scope.set_uniform("u_depth_texture", UniformValue::Texture { texture: depth_copy, slot: 3 });

    let cube = scope.builtin_mesh(BuiltinMesh::Cube);
    let mut drawn = 0;
    for &index in decals {
        let Some(entity) = ctx.scene.entities.get(index) else {
            continue;
        };
        let EntityKind::Decal(decal) = &entity.kind else {
            continue;
        };
        let Some(texture) = scope.texture(&decal.texture) else {
            log::warn!("Decal '{}' texture '{}' missing, skipping", entity.name, decal.texture);
            continue;
        };

        let inverse_model = entity.model.try_inverse().unwrap_or_else(Mat4::identity);
        scope.set_uniform("u_model", UniformValue::Mat4(entity.model));
        scope.set_uniform("u_imodel", UniformValue::Mat4(inverse_model));
        scope.set_uniform("u_decal_texture", UniformValue::Texture { texture, slot: DECAL_TEXTURE_SLOT });
        scope.draw_mesh(cube);
        drawn += 1;
    }

    log::trace!("Projected {drawn} decals");
    drawn
}
