//! Frame orchestration
//!
//! [`Renderer`] owns every framebuffer, the probe data and the frame queue,
//! and runs the passes of a frame in order: shadow resource sync, collection,
//! sort, shadow maps, forward or deferred shading, post-processing and debug
//! overlays. Probe captures reuse the forward path from cube-face cameras.

use rand::thread_rng;

use crate::foundation::math::{Mat4, Vec2, Vec3};
use crate::render::api::{
    BuiltinMesh, CubeFace, Framebuffer, FramebufferDesc, GraphicsDevice, PipelineMode, RenderTarget, RendererConfig,
    TextureFormat, TextureId, UniformValue,
};
use crate::render::pipelines::deferred::{render_deferred, DeferredResources, DeferredTargets};
use crate::render::pipelines::ssao::SsaoKernel;
use crate::render::pipelines::{forward, fullscreen, FrameContext};
use crate::render::primitives::{Camera, Mesh};
use crate::render::render_queue::RenderQueue;
use crate::render::state::{RenderState, StateScope};
use crate::render::systems::lighting::SceneLight;
use crate::render::systems::post_process::{PostProcessChain, PostProcessInputs};
use crate::render::systems::probes::spherical_harmonics::FaceCapture;
use crate::render::systems::probes::{
    load_probe_file, save_probe_file, IrradianceVolume, ProbeError, ProbeGrid, ReflectionProbes, SphericalHarmonics,
};
use crate::render::systems::shadows::{generate_shadow_map, sync_shadow_resources, SHADOW_NEAR_PLANE};
use crate::render::{RenderError, RenderResult};
use crate::scene::{collect_render_calls, EntityKind, Scene};

/// Near plane of probe capture cameras
const CAPTURE_NEAR: f32 = 0.1;

/// Far plane of probe capture cameras
const CAPTURE_FAR: f32 = 1000.0;

/// What one frame did
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FrameStats {
    /// Frame number, starting at 1
    pub frame: u64,
    /// Render calls that survived culling
    pub render_calls: usize,
    /// Scene nodes rejected by frustum culling
    pub nodes_culled: usize,
    /// Visible lights
    pub lights: usize,
    /// Shadow maps rendered this frame
    pub shadow_maps: usize,
    /// Decals projected onto the G-buffer
    pub decals: usize,
    /// Mesh draws issued by the shading passes
    pub draw_calls: usize,
    /// Post-processing passes run on the lit image
    pub post_passes: usize,
}

/// Scene renderer
pub struct Renderer {
    config: RendererConfig,
    queue: RenderQueue,
    /// Reused by shadow and probe passes that see the scene from another camera
    pass_queue: RenderQueue,
    ssao_kernel: SsaoKernel,
    deferred: Option<DeferredTargets>,
    /// HDR target of the forward path
    frame_target: Option<Framebuffer>,
    post: PostProcessChain,
    irradiance: Option<IrradianceVolume>,
    reflections: ReflectionProbes,
    frame_count: u64,
}

impl Renderer {
    /// Create a renderer; device resources are allocated on first use
    pub fn new(config: RendererConfig) -> Self {
        let ssao_kernel = SsaoKernel::new(&mut thread_rng(), config.ssao.sample_count);
        log::info!(
            "Renderer created: {:?} pipeline, {:?} lighting",
            config.pipeline,
            config.light_strategy
        );
        Self {
            queue: RenderQueue::new(config.sort_policy),
            pass_queue: RenderQueue::new(config.sort_policy),
            config,
            ssao_kernel,
            deferred: None,
            frame_target: None,
            post: PostProcessChain::new(),
            irradiance: None,
            reflections: ReflectionProbes::new(),
            frame_count: 0,
        }
    }

    /// Active configuration
    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    /// Mutable configuration; changes apply from the next frame
    pub fn config_mut(&mut self) -> &mut RendererConfig {
        &mut self.config
    }

    /// Sorted render calls of the last frame
    pub fn queue(&self) -> &RenderQueue {
        &self.queue
    }

    /// Loaded or baked irradiance probes
    pub fn irradiance(&self) -> Option<&IrradianceVolume> {
        self.irradiance.as_ref()
    }

    /// Reflection probes found in the scene, captured on demand
    pub fn reflections(&self) -> &ReflectionProbes {
        &self.reflections
    }

    /// Screen-sized deferred targets, once the deferred path has run
    pub fn deferred_targets(&self) -> Option<&DeferredTargets> {
        self.deferred.as_ref()
    }

    /// Render one frame of `scene` seen by `camera` to the screen
    ///
    /// `scene` is mutable only for the lights' shadow resources. Missing
    /// programs, textures or scene resources degrade the frame; only device
    /// allocation failures are returned.
    pub fn render_scene(
        &mut self,
        device: &mut dyn GraphicsDevice,
        scene: &mut Scene,
        camera: &Camera,
        time: f32,
    ) -> RenderResult<FrameStats> {
        let (width, height) = device.viewport_size();
        self.frame_count += 1;

        self.sync_light_resources(device, scene)?;
        if self.config.reflections.enabled {
            let positions = scene.reflection_probe_positions();
            self.reflections
                .sync(device, &positions, self.config.reflections.cubemap_resolution);
            if !self.reflections.is_empty() && !self.reflections.is_captured() {
                self.capture_reflection_probes(device, scene)?;
            }
        }

        let frame = collect_render_calls(scene, camera, &mut self.queue);
        self.queue.set_policy(self.config.sort_policy);
        self.queue.sort();

        let shadow_maps = self.generate_shadow_maps(device, scene, &frame.lights, camera);
        device.set_viewport(0, 0, width, height);

        let scene: &Scene = scene;
        let lights = visible_lights(scene);
        let ctx = FrameContext {
            scene,
            camera,
            lights: &lights,
            config: &self.config,
            time,
            reflections: self.config.reflections.enabled.then_some(&self.reflections),
        };

        let mut stats = FrameStats {
            frame: self.frame_count,
            render_calls: self.queue.len(),
            nodes_culled: frame.nodes_culled,
            lights: lights.len(),
            shadow_maps,
            ..FrameStats::default()
        };

        let (lit, depth, depth_source) = match self.config.pipeline {
            PipelineMode::Deferred => {
                if let Some(stale) = self.frame_target.take() {
                    device.destroy_framebuffer(&stale);
                }
                let targets = DeferredTargets::ensure(&mut self.deferred, device, width, height)?;
                let resources = DeferredResources {
                    targets,
                    decals: &frame.decals,
                    kernel: &self.ssao_kernel,
                    irradiance: self.irradiance.as_ref(),
                };
                let output = render_deferred(device, &ctx, &self.queue, &resources);
                stats.draw_calls = output.draws;
                stats.decals = output.decals;
                (targets.lit_texture(), targets.gbuffers.depth_texture, targets.illumination.id)
            }
            PipelineMode::Forward => {
                if let Some(stale) = self.deferred.take() {
                    stale.release(device);
                }
                let target = ensure_frame_target(&mut self.frame_target, device, width, height)?;
                stats.draw_calls = forward::render_forward(device, &ctx, &self.queue, target.target());
                (target.color_texture(0), target.depth_texture, target.id)
            }
        };

        match lit {
            Some(color) => {
                let inputs = PostProcessInputs {
                    color,
                    depth,
                    camera,
                    config: &self.config,
                    size: (width, height),
                };
                stats.post_passes = self.post.apply(device, &inputs, RenderTarget::Screen)?;
            }
            None => log::warn!("Frame has no lit image, post-processing skipped"),
        }

        if self.config.irradiance.visualize || self.config.reflections.visualize {
            let mut scope = StateScope::new(device);
            scope.bind_framebuffer(RenderTarget::Screen);
            scope.copy_depth(depth_source, RenderTarget::Screen);
            if self.config.irradiance.visualize {
                if let Some(volume) = &self.irradiance {
                    draw_irradiance_probes(&mut *scope, volume, camera, self.config.irradiance.probe_size);
                }
            }
            if self.config.reflections.visualize {
                draw_reflection_probes(&mut *scope, &self.reflections, camera, self.config.irradiance.probe_size);
            }
        }
        self.draw_debug_overlays(device, &lights, camera, width, height);

        log::debug!(
            "Frame {}: {} calls ({} culled), {} lights, {} shadow maps, {} draws, {} post passes",
            stats.frame,
            stats.render_calls,
            stats.nodes_culled,
            stats.lights,
            stats.shadow_maps,
            stats.draw_calls,
            stats.post_passes
        );
        Ok(stats)
    }

    /// Allocate or release every light's shadow map to match its flag
    fn sync_light_resources(&self, device: &mut dyn GraphicsDevice, scene: &mut Scene) -> RenderResult<()> {
        let resolution = self.config.shadows.resolution;
        for entity in &mut scene.entities {
            if let Some(light) = entity.as_light_mut() {
                sync_shadow_resources(device, light, resolution)?;
            }
        }
        Ok(())
    }

    fn generate_shadow_maps(&mut self, device: &mut dyn GraphicsDevice, scene: &mut Scene, lights: &[usize], camera: &Camera) -> usize {
        let mut generated = 0;
        for &index in lights {
            let usable = scene
                .entities
                .get(index)
                .and_then(|entity| entity.as_light())
                .is_some_and(|light| light.has_usable_shadow());
            if !usable {
                continue;
            }
            generate_shadow_map(device, scene, index, camera, &mut self.pass_queue);
            generated += 1;
        }
        generated
    }

    /// Render six forward views from each reflection probe into its cubemap
    ///
    /// Captures never sample reflections themselves. Returns the number of
    /// probes captured.
    pub fn capture_reflection_probes(&mut self, device: &mut dyn GraphicsDevice, scene: &Scene) -> RenderResult<usize> {
        let positions = scene.reflection_probe_positions();
        self.reflections
            .sync(device, &positions, self.config.reflections.cubemap_resolution);
        if self.reflections.is_empty() {
            return Ok(0);
        }
        self.reflections.ensure_cubemaps(device)?;

        let resolution = self.reflections.resolution();
        let target = device.create_framebuffer(&FramebufferDesc::depth_only(resolution, resolution))?;
        let (width, height) = device.viewport_size();
        device.set_viewport(0, 0, resolution, resolution);

        let lights = visible_lights(scene);
        let probes: Vec<(Vec3, TextureId)> = self
            .reflections
            .iter()
            .filter_map(|probe| probe.cubemap().map(|cubemap| (probe.position(), cubemap)))
            .collect();
        for &(position, cubemap) in &probes {
            for face in CubeFace::ALL {
                device.attach_cubemap_face(target.id, cubemap, face, 0);
                capture_face(device, scene, &lights, &self.config, &mut self.pass_queue, position, face, target.target());
            }
            device.generate_mipmaps(cubemap);
        }

        device.destroy_framebuffer(&target);
        device.set_viewport(0, 0, width, height);
        self.reflections.mark_captured();
        log::info!("Captured {} reflection probes", probes.len());
        Ok(probes.len())
    }

    /// Bake the configured irradiance grid and make it current
    ///
    /// Every probe renders six forward views, reads them back and projects
    /// them onto spherical harmonics. Returns the number of probes baked.
    pub fn bake_irradiance(&mut self, device: &mut dyn GraphicsDevice, scene: &Scene) -> RenderResult<usize> {
        let settings = &self.config.irradiance;
        let mut grid = ProbeGrid::new(Vec3::from(settings.start), Vec3::from(settings.end), settings.dims)
            .map_err(|err| RenderError::RenderingFailed(format!("irradiance bake: {err}")))?;

        let resolution = settings.capture_resolution;
        let target = device.create_framebuffer(&FramebufferDesc::new(
            resolution,
            resolution,
            &[TextureFormat::Rgb32F],
            true,
        ))?;
        let (width, height) = device.viewport_size();
        device.set_viewport(0, 0, resolution, resolution);

        log::info!("Baking {} irradiance probes", grid.len());
        let baked = self.capture_irradiance(device, scene, &mut grid, &target);

        device.destroy_framebuffer(&target);
        device.set_viewport(0, 0, width, height);
        baked?;

        let count = grid.len();
        if let Some(previous) = self.irradiance.take() {
            previous.release(device);
        }
        self.irradiance = Some(IrradianceVolume::upload(device, grid)?);
        Ok(count)
    }

    fn capture_irradiance(
        &mut self,
        device: &mut dyn GraphicsDevice,
        scene: &Scene,
        grid: &mut ProbeGrid,
        target: &Framebuffer,
    ) -> RenderResult<()> {
        let lights = visible_lights(scene);
        for probe in grid.probes_mut() {
            let mut images = Vec::with_capacity(CubeFace::ALL.len());
            for face in CubeFace::ALL {
                capture_face(device, scene, &lights, &self.config, &mut self.pass_queue, probe.position, face, target.target());
                images.push((face, device.read_pixels(target.id)?));
            }

            let faces: Vec<FaceCapture<'_>> = images
                .iter()
                .map(|(face, image)| FaceCapture {
                    image,
                    forward: face.direction(),
                    up: face.up(),
                })
                .collect();
            probe.sh = SphericalHarmonics::from_cube_faces(&faces);
            log::trace!("Baked probe {} at {:?}", probe.index, probe.position);
        }
        Ok(())
    }

    /// Replace the irradiance grid with the configured probe file
    ///
    /// Returns true when probes were loaded. A missing file leaves the
    /// renderer without probes; an unreadable one is logged and also disables
    /// probe lighting.
    pub fn load_irradiance(&mut self, device: &mut dyn GraphicsDevice) -> RenderResult<bool> {
        if let Some(previous) = self.irradiance.take() {
            previous.release(device);
        }

        let path = &self.config.irradiance.file;
        match load_probe_file(path) {
            Ok(Some(grid)) => {
                self.irradiance = Some(IrradianceVolume::upload(device, grid)?);
                Ok(true)
            }
            Ok(None) => Ok(false),
            Err(err) => {
                log::error!("Irradiance file {} rejected, probe lighting disabled: {err}", path.display());
                Ok(false)
            }
        }
    }

    /// Write the current irradiance grid to the configured probe file
    ///
    /// Returns false when there is nothing to save.
    pub fn save_irradiance(&self) -> Result<bool, ProbeError> {
        match &self.irradiance {
            Some(volume) => {
                save_probe_file(&self.config.irradiance.file, volume.grid())?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn draw_debug_overlays(&self, device: &mut dyn GraphicsDevice, lights: &[SceneLight<'_>], camera: &Camera, width: u32, height: u32) {
        let debug = &self.config.debug;
        let mut scope = StateScope::new(device);
        scope.bind_framebuffer(RenderTarget::Screen);

        if let Some(targets) = self.deferred.as_ref().filter(|_| self.config.pipeline == PipelineMode::Deferred) {
            if debug.show_gbuffers {
                let [albedo, normal, material, depth_view] = fullscreen::quadrants(width, height);
                let gbuffers = &targets.gbuffers;
                for (index, viewport) in [albedo, normal, material].into_iter().enumerate() {
                    if let Some(texture) = gbuffers.color_texture(index) {
                        fullscreen::blit(&mut *scope, texture, "screen", Some(viewport));
                    }
                }
                if let Some(depth) = gbuffers.depth_texture {
                    blit_depth(&mut *scope, depth, camera.near(), camera.far(), depth_view);
                }
            }
            if debug.show_ssao {
                if let Some(ssao) = targets.ssao_blur.color_texture(0) {
                    fullscreen::blit(&mut *scope, ssao, "screen", Some(corner(width, height, false)));
                }
            }
        }

        if let Some(index) = debug.show_shadowmap {
            let shadow = lights
                .get(index)
                .and_then(|scene_light| scene_light.light.shadow_map().map(|map| (scene_light.light, map)));
            match shadow.and_then(|(light, map)| map.depth_texture().map(|depth| (light, depth))) {
                Some((light, depth)) => {
                    blit_depth(&mut *scope, depth, SHADOW_NEAR_PLANE, light.max_distance, corner(width, height, true));
                }
                None => log::debug!("Light {index} has no shadow map to show"),
            }
        }
    }

    /// Free every device resource the renderer owns
    pub fn release(&mut self, device: &mut dyn GraphicsDevice) {
        if let Some(targets) = self.deferred.take() {
            targets.release(device);
        }
        if let Some(target) = self.frame_target.take() {
            device.destroy_framebuffer(&target);
        }
        if let Some(volume) = self.irradiance.take() {
            volume.release(device);
        }
        self.post.release(device);
        self.reflections.release(device);
    }
}

/// Visible lights paired with their transforms, in scene order
fn visible_lights(scene: &Scene) -> Vec<SceneLight<'_>> {
    scene
        .entities
        .iter()
        .filter(|entity| entity.visible)
        .filter_map(|entity| match &entity.kind {
            EntityKind::Light(light) => Some(SceneLight::new(light, entity.model)),
            _ => None,
        })
        .collect()
}

fn ensure_frame_target<'s>(
    slot: &'s mut Option<Framebuffer>,
    device: &mut dyn GraphicsDevice,
    width: u32,
    height: u32,
) -> RenderResult<&'s Framebuffer> {
    if slot.as_ref().is_some_and(|target| (target.width, target.height) != (width, height)) {
        if let Some(stale) = slot.take() {
            device.destroy_framebuffer(&stale);
        }
    }
    if slot.is_none() {
        log::info!("Creating forward target at {width}x{height}");
        *slot = Some(device.create_framebuffer(&FramebufferDesc::new(width, height, &[TextureFormat::Rgba16F], true))?);
    }
    slot.as_ref()
        .ok_or_else(|| RenderError::ResourceCreationFailed("forward target".to_string()))
}

/// Forward-render the view through one cube face at `position` into `target`
fn capture_face(
    device: &mut dyn GraphicsDevice,
    scene: &Scene,
    lights: &[SceneLight<'_>],
    config: &RendererConfig,
    queue: &mut RenderQueue,
    position: Vec3,
    face: CubeFace,
    target: RenderTarget,
) -> usize {
    let mut camera = Camera::perspective(position, 90.0, 1.0, CAPTURE_NEAR, CAPTURE_FAR);
    camera.look_at(position, position + face.direction(), face.up());

    collect_render_calls(scene, &camera, queue);
    queue.set_policy(config.sort_policy);
    queue.sort();

    let ctx = FrameContext {
        scene,
        camera: &camera,
        lights,
        config,
        time: 0.0,
        reflections: None,
    };
    forward::render_forward(device, &ctx, queue, target)
}

/// Quarter-size viewport in the bottom-right or top-right corner
fn corner(width: u32, height: u32, top: bool) -> fullscreen::Viewport {
    let (w, h) = (width / 4, height / 4);
    let y = if top { (height - h) as i32 } else { 0 };
    ((width - w) as i32, y, w, h)
}

fn blit_depth(device: &mut dyn GraphicsDevice, depth: TextureId, near: f32, far: f32, viewport: fullscreen::Viewport) {
    if device.bind_program("depth").is_none() {
        log::warn!("Program 'depth' missing, depth view skipped");
        return;
    }
    device.set_uniform("u_camera_nearfar", UniformValue::Vec2(Vec2::new(near, far)));
    fullscreen::blit(device, depth, "depth", Some(viewport));
}

fn draw_irradiance_probes(device: &mut dyn GraphicsDevice, volume: &IrradianceVolume, camera: &Camera, size: f32) {
    let sphere = Mesh::builtin(&*device, BuiltinMesh::Sphere);
    let mut scope = StateScope::new(device);
    scope.apply(RenderState::default());
    for probe in volume.grid().probes() {
        if scope.bind_program("probe").is_none() {
            log::warn!("Program 'probe' missing, probe view skipped");
            return;
        }
        scope.set_uniform("u_coeffs", UniformValue::Vec3Array(probe.sh.coeffs.to_vec()));
        let model = Mat4::new_translation(&probe.position) * Mat4::new_scaling(size);
        forward::draw_unlit(&mut *scope, "probe", &sphere, &model, camera);
    }
}

fn draw_reflection_probes(device: &mut dyn GraphicsDevice, probes: &ReflectionProbes, camera: &Camera, size: f32) {
    let sphere = Mesh::builtin(&*device, BuiltinMesh::Sphere);
    let mut scope = StateScope::new(device);
    scope.apply(RenderState::default());
    for probe in probes.iter() {
        let Some(cubemap) = probe.cubemap() else {
            continue;
        };
        if scope.bind_program("reflection_probe").is_none() {
            log::warn!("Program 'reflection_probe' missing, probe view skipped");
            return;
        }
        scope.set_uniform(
            "u_environment_texture",
            UniformValue::Cubemap {
                texture: cubemap,
                slot: forward::REFLECTION_SLOT,
            },
        );
        let model = Mat4::new_translation(&probe.position()) * Mat4::new_scaling(size);
        forward::draw_unlit(&mut *scope, "reflection_probe", &sphere, &model, camera);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::api::DebugSettings;
    use crate::render::backends::headless::{DeviceCommand, HeadlessDevice};
    use crate::render::resources::materials::Material;
    use crate::render::systems::lighting::Light;
    use crate::scene::Prefab;
    use approx::assert_relative_eq;

    fn scene_with_box(device: &HeadlessDevice) -> Scene {
        let mut scene = Scene::new();
        let mesh = scene.add_mesh(Mesh::builtin(device, BuiltinMesh::Cube));
        let material = scene.add_material(Material::default());
        scene.add_prefab("box", Mat4::identity(), Prefab::single("box", mesh, material));
        scene
    }

    fn camera() -> Camera {
        let mut camera = Camera::perspective(Vec3::new(0.0, 0.0, 8.0), 60.0, 1.0, 0.1, 100.0);
        camera.look_at(Vec3::new(0.0, 0.0, 8.0), Vec3::zeros(), Vec3::y());
        camera
    }

    #[test]
    fn test_forward_frame_without_lights() {
        let mut device = HeadlessDevice::new(32, 32);
        let mut scene = scene_with_box(&device);
        let config = RendererConfig::default().with_pipeline(PipelineMode::Forward);
        let mut renderer = Renderer::new(config);

        let stats = renderer.render_scene(&mut device, &mut scene, &camera(), 0.0).unwrap();

        assert_eq!(stats.frame, 1);
        assert_eq!(stats.render_calls, 1);
        assert_eq!(stats.lights, 0);
        assert_eq!(stats.draw_calls, 1);
        assert_eq!(stats.post_passes, 1);
        assert_eq!(device.render_state(), RenderState::default());
        assert_eq!(device.bound_framebuffer(), RenderTarget::Screen);
    }

    #[test]
    fn test_switching_pipelines_releases_unused_targets() {
        let mut device = HeadlessDevice::new(32, 32);
        let mut scene = scene_with_box(&device);
        let mut renderer = Renderer::new(RendererConfig::default());

        renderer.render_scene(&mut device, &mut scene, &camera(), 0.0).unwrap();
        assert_eq!(device.live_framebuffers(), 5);

        renderer.config_mut().pipeline = PipelineMode::Forward;
        renderer.render_scene(&mut device, &mut scene, &camera(), 0.1).unwrap();
        assert_eq!(device.live_framebuffers(), 1);
        assert!(renderer.deferred_targets().is_none());

        renderer.release(&mut device);
        assert_eq!(device.live_framebuffers(), 0);
        assert_eq!(device.live_textures(), 1);
    }

    #[test]
    fn test_shadow_maps_follow_light_flags() {
        let mut device = HeadlessDevice::new(32, 32);
        let mut scene = scene_with_box(&device);
        scene.add_light("sun", Vec3::new(0.0, 10.0, 0.0), Light::directional().with_shadows(true, 0.01));
        scene.add_light("bulb", Vec3::new(0.0, 2.0, 0.0), Light::point().with_shadows(true, 0.01));
        let mut renderer = Renderer::new(RendererConfig::default().with_pipeline(PipelineMode::Forward));

        let stats = renderer.render_scene(&mut device, &mut scene, &camera(), 0.0).unwrap();
        assert_eq!(stats.lights, 2);
        assert_eq!(stats.shadow_maps, 1);
        assert_eq!(device.draws_with("flat").len(), 1);

        if let Some(light) = scene.entity_mut("sun").and_then(|e| e.as_light_mut()) {
            light.cast_shadows = false;
        }
        let stats = renderer.render_scene(&mut device, &mut scene, &camera(), 0.0).unwrap();
        assert_eq!(stats.shadow_maps, 0);
        assert!(scene.entity("sun").and_then(|e| e.as_light()).unwrap().shadow_map().is_none());
    }

    #[test]
    fn test_reflection_probes_captured_once_without_recursion() {
        let mut device = HeadlessDevice::new(32, 32);
        let mut scene = scene_with_box(&device);
        scene.add_reflection_probe("probe", Vec3::new(0.0, 3.0, 0.0));
        let mut renderer = Renderer::new(RendererConfig::default().with_pipeline(PipelineMode::Forward));

        renderer.render_scene(&mut device, &mut scene, &camera(), 0.0).unwrap();
        assert!(renderer.reflections().is_captured());
        let attaches = device
            .commands()
            .iter()
            .filter(|c| matches!(c, DeviceCommand::AttachCubemapFace { .. }))
            .count();
        assert_eq!(attaches, 6);

        device.clear_commands();
        renderer.render_scene(&mut device, &mut scene, &camera(), 0.0).unwrap();
        assert!(device
            .commands()
            .iter()
            .all(|c| !matches!(c, DeviceCommand::AttachCubemapFace { .. })));
        assert_eq!(device.uniform_of("multilight", "u_reflections_enabled"), Some(&UniformValue::Int(1)));
    }

    #[test]
    fn test_debug_overlays_blit_gbuffer_quadrants() {
        let mut device = HeadlessDevice::new(64, 64);
        let mut scene = scene_with_box(&device);
        let config = RendererConfig::default().with_debug(DebugSettings {
            show_gbuffers: true,
            show_ssao: true,
            show_shadowmap: None,
        });
        let mut renderer = Renderer::new(config);

        renderer.render_scene(&mut device, &mut scene, &camera(), 0.0).unwrap();

        assert_eq!(device.draws_with("screen").len(), 4);
        assert_eq!(device.draws_with("depth").len(), 1);
        assert!(device.draws_with("screen").iter().all(|d| d.target == RenderTarget::Screen));
    }

    #[test]
    fn test_shadowmap_overlay_uses_light_depth_range() {
        let mut device = HeadlessDevice::new(64, 64);
        let mut scene = scene_with_box(&device);
        scene.add_light(
            "sun",
            Vec3::new(0.0, 10.0, 0.0),
            Light::directional().with_max_distance(40.0).with_shadows(true, 0.01),
        );
        let config = RendererConfig::default()
            .with_pipeline(PipelineMode::Forward)
            .with_debug(DebugSettings {
                show_gbuffers: false,
                show_ssao: false,
                show_shadowmap: Some(0),
            });
        let mut renderer = Renderer::new(config);

        renderer.render_scene(&mut device, &mut scene, &camera(), 0.0).unwrap();

        assert_eq!(device.draws_with("depth").len(), 1);
        assert_eq!(
            device.uniform_of("depth", "u_camera_nearfar"),
            Some(&UniformValue::Vec2(Vec2::new(SHADOW_NEAR_PLANE, 40.0)))
        );
    }

    #[test]
    fn test_load_irradiance_missing_file_disables_probes() {
        let mut device = HeadlessDevice::new(8, 8);
        let config = RendererConfig::default()
            .with_irradiance_file(std::env::temp_dir().join("rust_renderer_no_such_probe_file.bin"));
        let mut renderer = Renderer::new(config);

        assert!(!renderer.load_irradiance(&mut device).unwrap());
        assert!(renderer.irradiance().is_none());
        assert!(!renderer.save_irradiance().unwrap());
    }

    #[test]
    fn test_bake_uniform_background_gives_dc_only_probes() {
        let mut device = HeadlessDevice::new(16, 16);
        let mut scene = Scene::new();
        scene.background_color = Vec3::new(0.5, 0.5, 0.5);
        let config = RendererConfig::default().with_irradiance_grid([-1.0; 3], [1.0; 3], [2, 1, 1]);
        let mut renderer = Renderer::new(config);
        renderer.config_mut().irradiance.capture_resolution = 4;

        assert_eq!(renderer.bake_irradiance(&mut device, &scene).unwrap(), 2);

        let volume = renderer.irradiance().unwrap();
        for probe in volume.grid().probes() {
            let expected = 0.5 * 0.282_095 * 4.0 * std::f32::consts::PI;
            assert_relative_eq!(probe.sh.coeffs[0].x, expected, epsilon = 1e-3);
        }
        assert_eq!(device.viewport_size(), (16, 16));
        assert_eq!(device.live_framebuffers(), 0);
    }
}
