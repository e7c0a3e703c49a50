//! Full-screen quad helpers

use crate::render::api::{BuiltinMesh, GraphicsDevice, TextureId, UniformValue};
use crate::render::state::{RenderState, StateScope};

/// Screen rectangle (x, y, width, height)
pub type Viewport = (i32, i32, u32, u32);

/// Draw the built-in quad with the current program and state
pub fn draw_quad(device: &mut dyn GraphicsDevice) {
    let quad = device.builtin_mesh(BuiltinMesh::Quad);
    device.draw_mesh(quad);
}

/// Copy `texture` to the bound target through `program`
///
/// The texture is bound as `u_texture` on slot 0. Returns false when the
/// program is missing.
pub fn blit(device: &mut dyn GraphicsDevice, texture: TextureId, program: &str, viewport: Option<Viewport>) -> bool {
    let mut scope = StateScope::new(device);
    scope.apply(RenderState::fullscreen());
    if scope.bind_program(program).is_none() {
        log::warn!("Program '{program}' missing, blit skipped");
        return false;
    }

    if let Some((x, y, width, height)) = viewport {
        scope.set_viewport(x, y, width, height);
    }
    scope.set_uniform("u_texture", UniformValue::Texture { texture, slot: 0 });
    draw_quad(&mut *scope);

    if viewport.is_some() {
        let (width, height) = scope.viewport_size();
        scope.set_viewport(0, 0, width, height);
    }
    true
}

/// Split the screen into four quadrants: top-left, top-right, bottom-left, bottom-right
pub fn quadrants(width: u32, height: u32) -> [Viewport; 4] {
    let half_w = width / 2;
    let half_h = height / 2;
    [
        (0, half_h as i32, half_w, half_h),
        (half_w as i32, half_h as i32, half_w, half_h),
        (0, 0, half_w, half_h),
        (half_w as i32, 0, half_w, half_h),
    ]
}
