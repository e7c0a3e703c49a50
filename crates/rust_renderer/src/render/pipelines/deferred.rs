//! Deferred shading
//!
//! Per frame:
//!
//! 1. geometry pass: opaque calls write albedo, normal and material targets
//! 2. decals blended into the albedo target
//! 3. SSAO from normals and depth, then blurred
//! 4. lighting: ambient plus the first directional light in one full-screen
//!    pass, then every other light added through a sphere volume or a quad
//! 5. irradiance probes added on top
//! 6. reflections sampled from the nearest probe cubemap
//! 7. blended calls drawn forward over the lit image, depth-tested against
//!    the copied G-buffer depth
//!
//! The lit image stays in the illumination target for post-processing.

use crate::foundation::math::{Vec2, Vec4};
use crate::render::api::{
    BuiltinMesh, Framebuffer, FramebufferDesc, GraphicsDevice, LightVolumeShape, TextureFormat, TextureId,
    UniformValue,
};
use crate::render::pipelines::ssao::{self, SsaoInputs, SsaoKernel};
use crate::render::pipelines::{decals, forward, fullscreen, FrameContext};
use crate::render::render_queue::RenderQueue;
use crate::render::state::{BlendMode, ClearFlags, CullMode, DepthFunc, RenderState, StateScope};
use crate::render::systems::lighting::{uniforms, LightType, SceneLight};
use crate::render::systems::probes::IrradianceVolume;
use crate::render::{RenderError, RenderResult};

/// Texture slot of the irradiance probe texture
pub const PROBES_TEXTURE_SLOT: u32 = 5;

/// Screen-sized targets of the deferred path
#[derive(Debug)]
pub struct DeferredTargets {
    /// Albedo+alpha, normal+extra, material parameters, shared depth
    pub gbuffers: Framebuffer,
    /// HDR lit image with a copy of the G-buffer depth
    pub illumination: Framebuffer,
    /// Raw ambient occlusion, single channel
    pub ssao: Framebuffer,
    /// Blurred occlusion
    pub ssao_blur: Framebuffer,
    /// Albedo and depth copies read by the decal pass
    pub decal_snapshot: Framebuffer,
}

impl DeferredTargets {
    /// Allocate every target at `width` x `height`
    ///
    /// Targets created before a failure are released again.
    pub fn create(device: &mut dyn GraphicsDevice, width: u32, height: u32) -> RenderResult<Self> {
        let descs = [
            FramebufferDesc::new(width, height, &[TextureFormat::Rgba8; 3], true),
            FramebufferDesc::new(width, height, &[TextureFormat::Rgba16F], true),
            FramebufferDesc::new(width, height, &[TextureFormat::Rgba8], false),
            FramebufferDesc::new(width, height, &[TextureFormat::Rgba8], false),
            FramebufferDesc::new(width, height, &[TextureFormat::Rgba8], true),
        ];

        let mut created = Vec::with_capacity(descs.len());
        for desc in &descs {
            match device.create_framebuffer(desc) {
                Ok(framebuffer) => created.push(framebuffer),
                Err(err) => {
                    for framebuffer in &created {
                        device.destroy_framebuffer(framebuffer);
                    }
                    return Err(err);
                }
            }
        }

        let [gbuffers, illumination, ssao, ssao_blur, decal_snapshot]: [Framebuffer; 5] = created
            .try_into()
            .map_err(|_| RenderError::ResourceCreationFailed("deferred target count".to_string()))?;
        Ok(Self {
            gbuffers,
            illumination,
            ssao,
            ssao_blur,
            decal_snapshot,
        })
    }

    /// Reuse the targets in `slot` or recreate them at a new size
    pub fn ensure<'s>(
        slot: &'s mut Option<Self>,
        device: &mut dyn GraphicsDevice,
        width: u32,
        height: u32,
    ) -> RenderResult<&'s Self> {
        if slot.as_ref().is_some_and(|targets| targets.size() != (width, height)) {
            if let Some(stale) = slot.take() {
                stale.release(device);
            }
        }
        if slot.is_none() {
            log::info!("Creating deferred targets at {width}x{height}");
            *slot = Some(Self::create(device, width, height)?);
        }
        slot.as_ref()
            .ok_or_else(|| RenderError::ResourceCreationFailed("deferred targets".to_string()))
    }

    /// Target size in pixels
    pub fn size(&self) -> (u32, u32) {
        (self.gbuffers.width, self.gbuffers.height)
    }

    /// Lit image, the input of post-processing
    pub fn lit_texture(&self) -> Option<TextureId> {
        self.illumination.color_texture(0)
    }

    /// Free every target
    pub fn release(self, device: &mut dyn GraphicsDevice) {
        for framebuffer in [&self.gbuffers, &self.illumination, &self.ssao, &self.ssao_blur, &self.decal_snapshot] {
            device.destroy_framebuffer(framebuffer);
        }
    }
}

/// Renderer-owned inputs of one deferred frame
pub struct DeferredResources<'a> {
    pub targets: &'a DeferredTargets,
    /// Visible decal entity indices
    pub decals: &'a [usize],
    /// Hemisphere samples and noise for SSAO
    pub kernel: &'a SsaoKernel,
    /// Probe grid for indirect light, if one is loaded
    pub irradiance: Option<&'a IrradianceVolume>,
}

/// What a deferred frame produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeferredOutput {
    /// Mesh draws in the geometry and light passes
    pub draws: usize,
    /// Decals drawn into the G-buffer
    pub decals: usize,
    /// Occlusion texture, white when SSAO is off
    pub ssao: TextureId,
}

/// Render the frame through the deferred path into `resources.targets`
pub fn render_deferred(
    device: &mut dyn GraphicsDevice,
    ctx: &FrameContext<'_>,
    queue: &RenderQueue,
    resources: &DeferredResources<'_>,
) -> DeferredOutput {
    let targets = resources.targets;
    let mut draws = render_geometry(device, ctx, queue, &targets.gbuffers);

    let decals_drawn = if ctx.config.decals {
        decals::render_decals(device, ctx, resources.decals, &targets.gbuffers, &targets.decal_snapshot)
    } else {
        0
    };
    draws += decals_drawn;

    let ssao_texture = compute_ssao(device, ctx, resources).unwrap_or_else(|| device.white_texture());

    draws += render_lighting(device, ctx, targets, ssao_texture);
    if ctx.config.irradiance.enabled {
        if let Some(volume) = resources.irradiance {
            draws += render_irradiance(device, ctx, targets, ssao_texture, volume);
        }
    }
    draws += render_reflections(device, ctx, queue, &targets.illumination);

    {
        let mut scope = StateScope::new(device);
        scope.bind_framebuffer(targets.illumination.target());
        scope.apply(RenderState::default());
        draws += forward::draw_calls(&mut *scope, ctx, ctx.camera, queue.blended());
    }

    DeferredOutput {
        draws,
        decals: decals_drawn,
        ssao: ssao_texture,
    }
}

fn render_geometry(device: &mut dyn GraphicsDevice, ctx: &FrameContext<'_>, queue: &RenderQueue, gbuffers: &Framebuffer) -> usize {
    let mut scope = StateScope::new(device);
    scope.bind_framebuffer(gbuffers.target());
    scope.apply(RenderState::default());
    scope.clear(ClearFlags::COLOR | ClearFlags::DEPTH, Vec4::zeros());

    if scope.bind_program("gbuffers").is_none() {
        log::warn!("Program 'gbuffers' missing, geometry pass skipped");
        return 0;
    }

    let resources = &ctx.scene.resources;
    let mut draws = 0;
    for call in queue.opaque() {
        let (Some(mesh), Some(material)) = (resources.mesh(call.mesh), resources.material(call.material)) else {
            log::warn!("Render call references a missing mesh or material, skipping");
            continue;
        };
        if !mesh.is_drawable() {
            continue;
        }

        scope.set_cull(if material.two_sided { CullMode::None } else { CullMode::Back });
        forward::upload_material(&mut *scope, ctx, ctx.camera, material, &call.model);
        scope.draw_mesh(mesh.gpu_mesh);
        draws += 1;
    }
    log::trace!("Geometry pass drew {draws} calls");
    draws
}

fn compute_ssao(device: &mut dyn GraphicsDevice, ctx: &FrameContext<'_>, resources: &DeferredResources<'_>) -> Option<TextureId> {
    let settings = &ctx.config.ssao;
    if !settings.enabled {
        return None;
    }
    let gbuffers = &resources.targets.gbuffers;
    let inputs = SsaoInputs {
        normal_texture: gbuffers.color_texture(1)?,
        depth_texture: gbuffers.depth_texture?,
        camera: ctx.camera,
        radius: settings.radius,
        blur: settings.blur,
    };
    ssao::render_ssao(device, &inputs, resources.kernel, &resources.targets.ssao, &resources.targets.ssao_blur)
}

/// Bind G-buffers, depth, occlusion and reconstruction uniforms
fn upload_deferred_inputs(device: &mut dyn GraphicsDevice, ctx: &FrameContext<'_>, targets: &DeferredTargets, ssao_texture: TextureId) {
    let gbuffers = &targets.gbuffers;
    let white = device.white_texture();
    for (index, name) in ["u_gb0_texture", "u_gb1_texture", "u_gb2_texture"].iter().enumerate() {
        let texture = gbuffers.color_texture(index).unwrap_or(white);
        device.set_uniform(name, UniformValue::Texture { texture, slot: index as u32 });
    }
    let depth = gbuffers.depth_texture.unwrap_or(white);
    device.set_uniform("u_depth_texture", UniformValue::Texture { texture: depth, slot: 3 });
    device.set_uniform("u_ssao_texture", UniformValue::Texture { texture: ssao_texture, slot: 4 });

    let (width, height) = targets.size();
    let camera = ctx.camera;
    device.set_uniform("u_viewprojection", UniformValue::Mat4(camera.view_projection_matrix()));
    device.set_uniform("u_inverse_viewprojection", UniformValue::Mat4(camera.inverse_view_projection_matrix()));
    device.set_uniform("u_iRes", UniformValue::Vec2(Vec2::new(1.0 / width.max(1) as f32, 1.0 / height.max(1) as f32)));
    device.set_uniform("u_camera_position", UniformValue::Vec3(camera.eye));
    device.set_uniform("gamma_mode", UniformValue::Int(ctx.config.color_space.shader_code()));
    device.set_uniform("dynamic_range", UniformValue::Int(ctx.config.dynamic_range.shader_code()));
}

fn render_lighting(device: &mut dyn GraphicsDevice, ctx: &FrameContext<'_>, targets: &DeferredTargets, ssao_texture: TextureId) -> usize {
    let illumination = &targets.illumination;
    let mut scope = StateScope::new(device);
    scope.bind_framebuffer(illumination.target());
    let background = ctx.scene.background_color;
    scope.clear(ClearFlags::COLOR, Vec4::new(background.x, background.y, background.z, 1.0));
    scope.copy_depth(targets.gbuffers.id, illumination.target());
    scope.apply(RenderState::fullscreen());

    if scope.bind_program("deferred").is_none() {
        log::warn!("Program 'deferred' missing, lighting pass skipped");
        return 0;
    }

    let first_directional = ctx
        .lights
        .iter()
        .position(|scene_light| scene_light.light.light_type == LightType::Directional);

    upload_deferred_inputs(&mut *scope, ctx, targets, ssao_texture);
    scope.set_uniform("u_ambient_light", UniformValue::Vec3(ctx.scene.ambient_light));
    match first_directional {
        Some(index) => uniforms::upload_light(&mut *scope, &ctx.lights[index]),
        None => uniforms::upload_no_light(&mut *scope),
    }
    fullscreen::draw_quad(&mut *scope);
    let mut draws = 1;

    for (index, scene_light) in ctx.lights.iter().enumerate() {
        if Some(index) == first_directional {
            continue;
        }
        if draw_light_contribution(&mut scope, ctx, targets, ssao_texture, scene_light) {
            draws += 1;
        }
    }
    draws
}

/// Add one light's contribution through a sphere volume or a full-screen quad
fn draw_light_contribution(
    scope: &mut StateScope<'_, dyn GraphicsDevice + '_>,
    ctx: &FrameContext<'_>,
    targets: &DeferredTargets,
    ssao_texture: TextureId,
    scene_light: &SceneLight<'_>,
) -> bool {
    let use_volume = ctx.config.light_volume == LightVolumeShape::Sphere
        && scene_light.light.light_type != LightType::Directional;
    let program = if use_volume { "deferred_volume" } else { "deferred" };
    if scope.bind_program(program).is_none() {
        log::warn!("Program '{program}' missing, light skipped");
        return false;
    }

    upload_deferred_inputs(&mut **scope, ctx, targets, ssao_texture);
    uniforms::zero_once_only_terms(&mut **scope);
    uniforms::upload_light(&mut **scope, scene_light);

    if use_volume {
        scope.apply(RenderState {
            depth_test: true,
            depth_write: false,
            depth_func: DepthFunc::Greater,
            blend: BlendMode::Additive,
            cull: CullMode::Front,
            ..RenderState::default()
        });
        scope.set_uniform("u_model", UniformValue::Mat4(scene_light.volume_model()));
        let sphere = scope.builtin_mesh(BuiltinMesh::Sphere);
        scope.draw_mesh(sphere);
    } else {
        scope.apply(RenderState::fullscreen().with_blend(BlendMode::Additive));
        fullscreen::draw_quad(&mut **scope);
    }
    true
}

fn render_irradiance(
    device: &mut dyn GraphicsDevice,
    ctx: &FrameContext<'_>,
    targets: &DeferredTargets,
    ssao_texture: TextureId,
    volume: &IrradianceVolume,
) -> usize {
    let mut scope = StateScope::new(device);
    scope.bind_framebuffer(targets.illumination.target());
    scope.apply(RenderState::fullscreen().with_blend(BlendMode::Additive));
    if scope.bind_program("irradiance").is_none() {
        log::warn!("Program 'irradiance' missing, probe lighting skipped");
        return 0;
    }

    upload_deferred_inputs(&mut *scope, ctx, targets, ssao_texture);
    volume.upload_uniforms(&mut *scope, PROBES_TEXTURE_SLOT);
    fullscreen::draw_quad(&mut *scope);
    1
}

fn render_reflections(device: &mut dyn GraphicsDevice, ctx: &FrameContext<'_>, queue: &RenderQueue, illumination: &Framebuffer) -> usize {
    if !ctx.config.reflections.enabled || ctx.reflections.map_or(true, |probes| probes.is_empty()) {
        return 0;
    }

    let mut scope = StateScope::new(device);
    scope.bind_framebuffer(illumination.target());
    scope.update(|state| {
        state.blend = BlendMode::Additive;
        state.depth_func = DepthFunc::LessEqual;
        state.depth_write = false;
    });
    if scope.bind_program("reflection").is_none() {
        log::warn!("Program 'reflection' missing, reflections skipped");
        return 0;
    }

    let resources = &ctx.scene.resources;
    let mut draws = 0;
    for call in queue.opaque() {
        let (Some(mesh), Some(material)) = (resources.mesh(call.mesh), resources.material(call.material)) else {
            continue;
        };
        if !mesh.is_drawable() {
            continue;
        }
        scope.set_cull(if material.two_sided { CullMode::None } else { CullMode::Back });
        forward::upload_material(&mut *scope, ctx, ctx.camera, material, &call.model);
        forward::upload_reflection(&mut *scope, ctx, call.world_position());
        scope.draw_mesh(mesh.gpu_mesh);
        draws += 1;
    }
    draws
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::{Mat4, Vec3};
    use crate::render::api::{GpuMeshId, RenderTarget, RendererConfig};
    use crate::render::backends::headless::HeadlessDevice;
    use crate::render::primitives::{Camera, Mesh};
    use crate::render::resources::materials::Material;
    use crate::render::systems::lighting::Light;
    use crate::render::systems::probes::ProbeGrid;
    use crate::scene::{collect_render_calls, Decal, Prefab, Scene};
    use crate::spatial::AABB;
    use rand::{rngs::StdRng, SeedableRng};

    struct Fixture {
        scene: Scene,
        camera: Camera,
        queue: RenderQueue,
        decals: Vec<usize>,
        lights: Vec<Light>,
    }

    fn fixture() -> Fixture {
        let mut scene = Scene::new();
        let mesh = scene.add_mesh(Mesh::new("box", GpuMeshId(7), AABB::new(Vec3::repeat(-1.0), Vec3::repeat(1.0)), 36));
        let opaque = scene.add_material(Material::default());
        let glass = scene.add_material(Material::blended(Vec4::new(0.2, 0.4, 1.0, 0.3)));
        scene.add_prefab("wall", Mat4::new_translation(&Vec3::new(0.0, 0.0, -10.0)), Prefab::single("wall", mesh, opaque));
        scene.add_prefab("glass", Mat4::new_translation(&Vec3::new(0.0, 0.0, -4.0)), Prefab::single("glass", mesh, glass));
        scene.add_decal("splat", Mat4::new_translation(&Vec3::new(0.0, 0.0, -9.0)), Decal::new("splat.png"));

        let mut camera = Camera::perspective(Vec3::zeros(), 60.0, 1.0, 0.1, 100.0);
        camera.look_at(Vec3::zeros(), Vec3::new(0.0, 0.0, -1.0), Vec3::y());

        let mut queue = RenderQueue::default();
        let frame = collect_render_calls(&scene, &camera, &mut queue);
        queue.sort();

        Fixture {
            scene,
            camera,
            queue,
            decals: frame.decals,
            lights: vec![Light::point(), Light::directional(), Light::spot(), Light::directional()],
        }
    }

    fn run(fixture: &Fixture, config: &RendererConfig, device: &mut HeadlessDevice, irradiance: Option<&IrradianceVolume>) -> (DeferredOutput, Option<DeferredTargets>) {
        let lights: Vec<SceneLight<'_>> = fixture.lights.iter().map(|l| SceneLight::new(l, Mat4::identity())).collect();
        let ctx = FrameContext {
            scene: &fixture.scene,
            camera: &fixture.camera,
            lights: &lights,
            config,
            time: 0.0,
            reflections: None,
        };
        let mut rng = StdRng::seed_from_u64(3);
        let kernel = SsaoKernel::new(&mut rng, 64);
        let mut slot = None;
        let targets = DeferredTargets::ensure(&mut slot, device, 64, 64).unwrap();
        let resources = DeferredResources {
            targets,
            decals: &fixture.decals,
            kernel: &kernel,
            irradiance,
        };
        let output = render_deferred(device, &ctx, &fixture.queue, &resources);
        (output, slot)
    }

    #[test]
    fn test_full_frame_pass_structure() {
        let fixture = fixture();
        let config = RendererConfig::default();
        let mut device = HeadlessDevice::new(64, 64);
        device.register_texture("splat.png", 4, 4);
        let before = device.render_state();

        let (output, targets) = run(&fixture, &config, &mut device, None);
        let targets = targets.unwrap();

        let geometry = device.draws_with("gbuffers");
        assert_eq!(geometry.len(), 1, "blended calls stay out of the G-buffer");
        assert_eq!(geometry[0].target, targets.gbuffers.target());
        assert_eq!(output.decals, 1);
        assert_eq!(device.draws_with("ssao").len(), 1);
        assert_eq!(device.draws_with("ssao_blur").len(), 1);
        assert_eq!(output.ssao, targets.ssao_blur.color_texture(0).unwrap());

        // ambient pass with the first directional light, then the second directional as a quad
        let quads = device.draws_with("deferred");
        assert_eq!(quads.len(), 2);
        assert_eq!(quads[0].state.blend, BlendMode::Opaque);
        assert_eq!(quads[1].state.blend, BlendMode::Additive);

        let volumes = device.draws_with("deferred_volume");
        assert_eq!(volumes.len(), 2);
        assert!(volumes.iter().all(|draw| draw.state.cull == CullMode::Front
            && draw.state.blend == BlendMode::Additive
            && draw.state.depth_func == DepthFunc::Greater));

        let blended = device.draws_with("multilight");
        assert_eq!(blended.len(), 4);
        assert!(blended.iter().all(|draw| draw.target == targets.illumination.target() && draw.state.depth_test));

        assert_eq!(device.render_state(), before);
        assert_eq!(device.bound_framebuffer(), RenderTarget::Screen);
    }

    #[test]
    fn test_quad_light_volumes_and_disabled_effects() {
        let fixture = fixture();
        let config = RendererConfig {
            light_volume: LightVolumeShape::FullscreenQuad,
            decals: false,
            ssao: crate::render::api::SsaoSettings {
                enabled: false,
                ..Default::default()
            },
            ..RendererConfig::default()
        };
        let mut device = HeadlessDevice::new(64, 64);

        let (output, _) = run(&fixture, &config, &mut device, None);

        assert!(device.draws_with("deferred_volume").is_empty());
        assert_eq!(device.draws_with("deferred").len(), 4);
        assert!(device.draws_with("decal").is_empty());
        assert!(device.draws_with("ssao").is_empty());
        assert_eq!(output.ssao, device.white_texture());
    }

    #[test]
    fn test_irradiance_overlay_binds_probe_texture() {
        let fixture = fixture();
        let config = RendererConfig::default();
        let mut device = HeadlessDevice::new(64, 64);
        let grid = ProbeGrid::new(Vec3::repeat(-1.0), Vec3::repeat(1.0), [2, 2, 2]).unwrap();
        let volume = IrradianceVolume::upload(&mut device, grid).unwrap();

        run(&fixture, &config, &mut device, Some(&volume));

        let overlay = device.draws_with("irradiance");
        assert_eq!(overlay.len(), 1);
        assert_eq!(overlay[0].state.blend, BlendMode::Additive);
        assert_eq!(
            device.uniform_of("irradiance", "u_probes_texture"),
            Some(&UniformValue::Texture { texture: volume.texture(), slot: PROBES_TEXTURE_SLOT })
        );
        assert_eq!(device.uniform_of("irradiance", "u_num_probes"), Some(&UniformValue::Int(8)));
    }

    #[test]
    fn test_missing_lighting_program_degrades() {
        let fixture = fixture();
        let config = RendererConfig::default();
        let mut device = HeadlessDevice::new(64, 64);
        device.mark_program_missing("deferred");
        device.mark_program_missing("gbuffers");

        let (output, _) = run(&fixture, &config, &mut device, None);

        assert!(device.draws_with("deferred_volume").is_empty());
        assert_eq!(device.draws_with("multilight").len(), 4);
        assert_eq!(output.draws, 4);
    }

    #[test]
    fn test_targets_recreated_on_resize() {
        let mut device = HeadlessDevice::new(64, 64);
        let mut slot = None;
        DeferredTargets::ensure(&mut slot, &mut device, 64, 64).unwrap();
        let live = device.live_framebuffers();
        assert_eq!(live, 5);

        let first = slot.as_ref().unwrap().gbuffers.id;
        DeferredTargets::ensure(&mut slot, &mut device, 64, 64).unwrap();
        assert_eq!(slot.as_ref().unwrap().gbuffers.id, first);

        DeferredTargets::ensure(&mut slot, &mut device, 128, 32).unwrap();
        assert_eq!(device.live_framebuffers(), 5);
        assert_eq!(slot.as_ref().unwrap().size(), (128, 32));
        assert_ne!(slot.as_ref().unwrap().gbuffers.id, first);
    }

    #[test]
    fn test_failed_allocation_leaks_nothing() {
        let mut device = HeadlessDevice::new(64, 64);
        device.fail_allocations(true);
        assert!(DeferredTargets::create(&mut device, 64, 64).is_err());
        assert_eq!(device.live_framebuffers(), 0);
        assert_eq!(device.live_textures(), 1);
    }
}
