//! Forward shading
//!
//! Draws meshes with lighting computed while rasterizing. Used for the whole
//! frame in forward mode, for blended geometry on top of the deferred
//! result, and for probe captures.

use crate::foundation::math::{Mat4, Vec3, Vec4};
use crate::render::api::{GraphicsDevice, LightStrategy, RenderTarget, TextureId, UniformValue};
use crate::render::pipelines::FrameContext;
use crate::render::primitives::{Camera, Mesh};
use crate::render::render_queue::{RenderCall, RenderQueue};
use crate::render::resources::materials::Material;
use crate::render::state::{BlendMode, ClearFlags, CullMode, DepthFunc, StateScope};
use crate::render::systems::lighting::uniforms;

/// Texture slot of the reflection cubemap
pub const REFLECTION_SLOT: u32 = 9;

/// Upload camera, transform and material uniforms to the bound program
///
/// Textures sit on fixed slots: 0 colour, 1 emissive, 2 occlusion,
/// 3 metallic-roughness, 4 normal. Features disabled on the scene fall back
/// to the white texture, a zero emissive factor or `has_normal = 0`.
pub fn upload_material(device: &mut dyn GraphicsDevice, ctx: &FrameContext<'_>, camera: &Camera, material: &Material, model: &Mat4) {
    let features = ctx.scene.features;
    let white = device.white_texture();
    let lookup = |device: &dyn GraphicsDevice, name: Option<&str>, enabled: bool| -> Option<TextureId> {
        if !enabled {
            return None;
        }
        let name = name?;
        let texture = device.texture(name);
        if texture.is_none() {
            log::warn!("Texture '{name}' missing, using white");
        }
        texture
    };

    device.set_uniform("u_viewprojection", UniformValue::Mat4(camera.view_projection_matrix()));
    device.set_uniform("u_camera_position", UniformValue::Vec3(camera.eye));
    device.set_uniform("u_model", UniformValue::Mat4(*model));
    device.set_uniform("u_time", UniformValue::Float(ctx.time));
    device.set_uniform("u_color", UniformValue::Vec4(material.color));

    let color = lookup(&*device, material.textures.color.as_deref(), true).unwrap_or(white);
    device.set_uniform("u_texture", UniformValue::Texture { texture: color, slot: 0 });

    match lookup(&*device, material.textures.emissive.as_deref(), features.emissive) {
        Some(emissive) => {
            device.set_uniform("u_emissive_texture", UniformValue::Texture { texture: emissive, slot: 1 });
            device.set_uniform("u_emissive_factor", UniformValue::Vec3(material.emissive_factor));
        }
        None => device.set_uniform("u_emissive_factor", UniformValue::Vec3(Vec3::zeros())),
    }

    let occlusion = lookup(&*device, material.textures.occlusion.as_deref(), features.occlusion).unwrap_or(white);
    let metallic = lookup(&*device, material.textures.metallic_roughness.as_deref(), features.occlusion).unwrap_or(white);
    device.set_uniform("u_occlusion_texture", UniformValue::Texture { texture: occlusion, slot: 2 });
    device.set_uniform("u_metallic_texture", UniformValue::Texture { texture: metallic, slot: 3 });
    if features.occlusion {
        device.set_uniform("u_metallic_factor", UniformValue::Float(material.metallic_factor));
        device.set_uniform("u_roughness_factor", UniformValue::Float(material.roughness_factor));
    }

    match lookup(&*device, material.textures.normal.as_deref(), features.normal_maps) {
        Some(normal) => {
            device.set_uniform("has_normal", UniformValue::Int(1));
            device.set_uniform("u_normal_texture", UniformValue::Texture { texture: normal, slot: 4 });
        }
        None => device.set_uniform("has_normal", UniformValue::Int(0)),
    }

    device.set_uniform("u_alpha_cutoff", UniformValue::Float(material.alpha_mode.cutoff()));
    device.set_uniform("gamma_mode", UniformValue::Int(ctx.config.color_space.shader_code()));
    device.set_uniform("dynamic_range", UniformValue::Int(ctx.config.dynamic_range.shader_code()));
}

/// Bind the nearest reflection probe for a surface at `position`
pub(crate) fn upload_reflection(device: &mut dyn GraphicsDevice, ctx: &FrameContext<'_>, position: Vec3) {
    let cubemap = ctx
        .reflections
        .filter(|_| ctx.config.reflections.enabled)
        .and_then(|probes| probes.nearest(position))
        .and_then(|probe| probe.cubemap());

    match cubemap {
        Some(texture) => {
            device.set_uniform("u_reflections_enabled", UniformValue::Int(1));
            device.set_uniform("u_environment_texture", UniformValue::Cubemap { texture, slot: REFLECTION_SLOT });
        }
        None => device.set_uniform("u_reflections_enabled", UniformValue::Int(0)),
    }
}

/// Draw one call with lighting
///
/// Multi-pass draws once per light (once with a black light when there are
/// none): the first pass uses the material's blending, later passes add with
/// src-alpha/one under a less-or-equal depth test. Single-pass uploads the
/// light arrays and draws once. Returns the number of draws issued; missing
/// resources or programs skip the call.
pub fn draw_lit(device: &mut dyn GraphicsDevice, ctx: &FrameContext<'_>, camera: &Camera, call: &RenderCall) -> usize {
    let resources = &ctx.scene.resources;
    let (Some(mesh), Some(material)) = (resources.mesh(call.mesh), resources.material(call.material)) else {
        log::warn!("Render call references a missing mesh or material, skipping");
        return 0;
    };
    if !mesh.is_drawable() {
        return 0;
    }

    let program = match ctx.config.light_strategy {
        LightStrategy::MultiPass => "multilight",
        LightStrategy::SinglePass => "singlelight",
    };

    let mut scope = StateScope::new(device);
    let material_blend = if material.is_blended() { BlendMode::AlphaBlend } else { BlendMode::Opaque };
    scope.update(|state| {
        state.blend = material_blend;
        state.cull = if material.two_sided { CullMode::None } else { CullMode::Back };
        state.depth_func = DepthFunc::LessEqual;
    });

    if scope.bind_program(program).is_none() {
        log::warn!("Program '{program}' missing, skipping draw");
        return 0;
    }

    upload_material(&mut *scope, ctx, camera, material, &call.model);
    upload_reflection(&mut *scope, ctx, call.world_position());
    scope.set_uniform("u_ambient_light", UniformValue::Vec3(ctx.scene.ambient_light));

    if ctx.lights.is_empty() {
        uniforms::upload_no_light(&mut *scope);
        if ctx.config.light_strategy == LightStrategy::SinglePass {
            uniforms::upload_lights_single_pass(&mut *scope, &[]);
        }
        scope.draw_mesh(mesh.gpu_mesh);
        return 1;
    }

    match ctx.config.light_strategy {
        LightStrategy::MultiPass => {
            for (index, scene_light) in ctx.lights.iter().enumerate() {
                scope.set_blend(if index == 0 { material_blend } else { BlendMode::Additive });
                uniforms::upload_light(&mut *scope, scene_light);
                scope.draw_mesh(mesh.gpu_mesh);
                uniforms::zero_once_only_terms(&mut *scope);
            }
            ctx.lights.len()
        }
        LightStrategy::SinglePass => {
            uniforms::upload_lights_single_pass(&mut *scope, ctx.lights);
            scope.draw_mesh(mesh.gpu_mesh);
            uniforms::zero_once_only_terms(&mut *scope);
            1
        }
    }
}

/// Draw the calls yielded by `calls` with forward lighting
pub fn draw_calls<'q>(
    device: &mut dyn GraphicsDevice,
    ctx: &FrameContext<'_>,
    camera: &Camera,
    calls: impl Iterator<Item = &'q RenderCall>,
) -> usize {
    calls.map(|call| draw_lit(device, ctx, camera, call)).sum()
}

/// Render the whole queue into `target`, cleared to the scene background
pub fn render_forward(device: &mut dyn GraphicsDevice, ctx: &FrameContext<'_>, queue: &RenderQueue, target: RenderTarget) -> usize {
    let mut scope = StateScope::new(device);
    scope.bind_framebuffer(target);
    let background = ctx.scene.background_color;
    scope.clear(ClearFlags::COLOR | ClearFlags::DEPTH, Vec4::new(background.x, background.y, background.z, 1.0));

    draw_calls(&mut *scope, ctx, ctx.camera, queue.calls().iter())
}

/// Draw a mesh unlit with a flat program, used for probe visualisation
pub fn draw_unlit(device: &mut dyn GraphicsDevice, program: &str, mesh: &Mesh, model: &Mat4, camera: &Camera) -> bool {
    if device.bind_program(program).is_none() {
        return false;
    }
    device.set_uniform("u_viewprojection", UniformValue::Mat4(camera.view_projection_matrix()));
    device.set_uniform("u_model", UniformValue::Mat4(*model));
    device.set_uniform("u_camera_position", UniformValue::Vec3(camera.eye));
    device.draw_mesh(mesh.gpu_mesh);
    true
}
