//! Per-light shadow maps
//!
//! A light moves between two states as its `cast_shadows` flag toggles:
//! without resources, or with exactly one depth-only framebuffer and one
//! light camera. [`sync_shadow_resources`] performs the transitions;
//! [`generate_shadow_map`] renders depth for lights in the second state.

use crate::foundation::math::{utils, Mat4, Vec3, Vec4};
use crate::render::api::{Framebuffer, FramebufferDesc, GraphicsDevice, TextureId, UniformValue};
use crate::render::primitives::Camera;
use crate::render::render_queue::RenderQueue;
use crate::render::state::{BlendMode, ClearFlags, CullMode, DepthFunc, StateScope};
use crate::render::systems::lighting::{Light, LightType, SceneLight};
use crate::render::RenderResult;
use crate::scene::{collect_render_calls, Scene, SceneEntity, SceneResources};

/// Near plane of every light camera
pub const SHADOW_NEAR_PLANE: f32 = 0.1;

/// Depth target and camera owned by a shadow-casting light
#[derive(Debug)]
pub struct ShadowMap {
    framebuffer: Framebuffer,
    camera: Camera,
}

impl ShadowMap {
    /// Depth texture sampled by lighting shaders
    pub fn depth_texture(&self) -> Option<TextureId> {
        self.framebuffer.depth_texture
    }

    /// Framebuffer rendered into
    pub fn framebuffer(&self) -> &Framebuffer {
        &self.framebuffer
    }

    /// Camera the map was last rendered from
    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    /// World-to-shadow-clip matrix
    pub fn view_projection(&self) -> Mat4 {
        self.camera.view_projection_matrix()
    }

    /// Width (and height) of the depth target
    pub fn resolution(&self) -> u32 {
        self.framebuffer.width
    }
}

/// Allocate or release shadow resources to match `light.cast_shadows`
///
/// Resources are reallocated when the requested resolution changes. Returns
/// true when anything was allocated or released.
pub fn sync_shadow_resources(
    device: &mut dyn GraphicsDevice,
    light: &mut Light,
    resolution: u32,
) -> RenderResult<bool> {
    let stale = light
        .shadow
        .as_ref()
        .is_some_and(|shadow| !light.cast_shadows || shadow.resolution() != resolution);

    let mut changed = false;
    if stale {
        if let Some(shadow) = light.shadow.take() {
            device.destroy_framebuffer(&shadow.framebuffer);
            log::debug!("Released {}x{} shadow map", shadow.resolution(), shadow.resolution());
            changed = true;
        }
    }

    if light.cast_shadows && light.shadow.is_none() {
        let framebuffer = device.create_framebuffer(&FramebufferDesc::depth_only(resolution, resolution))?;
        log::debug!("Allocated {resolution}x{resolution} shadow map");
        light.shadow = Some(ShadowMap {
            framebuffer,
            camera: Camera::default(),
        });
        changed = true;
    }

    Ok(changed)
}

/// World size of one shadow texel used to quantize directional shadow cameras
///
/// Derived from the view camera's frustum width spread over the map width.
pub fn shadow_grid_step(view_frustum_width: f32, resolution: u32) -> f32 {
    view_frustum_width / resolution.max(1) as f32
}

/// Point the light camera along the light and fit its projection
///
/// Spot lights get a perspective covering twice the cone angle; directional
/// lights get an orthographic box of `area_size` whose view translation is
/// snapped to the texel grid so the map does not shimmer as the view moves.
/// Point lights have no shadow projection and are left untouched.
pub fn configure_shadow_camera(camera: &mut Camera, scene_light: &SceneLight<'_>, view_camera: &Camera, resolution: u32) {
    let light = scene_light.light;
    let position = scene_light.position();
    let direction = scene_light.direction();

    match light.light_type {
        LightType::Spot => {
            camera.set_perspective(light.cone_angle * 2.0, 1.0, SHADOW_NEAR_PLANE, light.max_distance);
            let up = up_for(direction);
            camera.look_at(position, position + direction, up);
        }
        LightType::Directional => {
            let half_area = light.area_size * 0.5;
            camera.set_orthographic(-half_area, half_area, -half_area, half_area, SHADOW_NEAR_PLANE, light.max_distance);
            camera.look_at(position, position + direction, Vec3::y());

            let step = shadow_grid_step(view_camera.frustum_width(), resolution);
            let mut view = camera.view_matrix();
            view[(0, 3)] = utils::snap_to_grid(view[(0, 3)], step);
            view[(1, 3)] = utils::snap_to_grid(view[(1, 3)], step);
            camera.set_view_matrix(view);
        }
        LightType::Point => {}
    }
}

fn up_for(direction: Vec3) -> Vec3 {
    if direction.cross(&Vec3::y()).norm_squared() < 1e-6 {
        Vec3::z()
    } else {
        Vec3::y()
    }
}

/// Render depth from the light at `scene.entities[index]` into its shadow map
///
/// Casters are collected into `casters` against the light camera's own
/// frustum, so objects outside the view still cast. Only non-blended calls
/// are drawn, with the `flat` program. Returns the number of draws issued;
/// zero when the entity is not a light with a usable map or the program is
/// missing.
pub fn generate_shadow_map(
    device: &mut dyn GraphicsDevice,
    scene: &mut Scene,
    index: usize,
    view_camera: &Camera,
    casters: &mut RenderQueue,
) -> usize {
    let Some(entity) = scene.entities.get_mut(index) else {
        return 0;
    };
    let model = entity.model;
    let Some(light) = entity.as_light_mut() else {
        return 0;
    };
    if light.light_type == LightType::Point {
        return 0;
    }
    let Some(mut shadow) = light.shadow.take() else {
        return 0;
    };

    let resolution = shadow.resolution();
    configure_shadow_camera(&mut shadow.camera, &SceneLight::new(light, model), view_camera, resolution);

    collect_render_calls(scene, &shadow.camera, casters);
    casters.sort();
    let draws = render_depth(device, &shadow, casters, &scene.resources);

    if let Some(light) = scene.entities.get_mut(index).and_then(SceneEntity::as_light_mut) {
        light.shadow = Some(shadow);
    }
    draws
}

fn render_depth(device: &mut dyn GraphicsDevice, shadow: &ShadowMap, queue: &RenderQueue, resources: &SceneResources) -> usize {
    let mut scope = StateScope::new(device);
    scope.bind_framebuffer(shadow.framebuffer.target());
    scope.set_viewport(0, 0, shadow.framebuffer.width, shadow.framebuffer.height);
    scope.clear(ClearFlags::DEPTH, Vec4::zeros());

    if scope.bind_program("flat").is_none() {
        log::warn!("Program 'flat' missing, shadow map left empty");
        return 0;
    }

    let light_camera = &shadow.camera;
    let frustum = light_camera.frustum();
    scope.set_uniform("u_viewprojection", UniformValue::Mat4(light_camera.view_projection_matrix()));

    let mut draws = 0;
    for call in queue.opaque() {
        if !frustum.intersects_aabb(&call.world_bounds) {
            continue;
        }
        let (Some(mesh), Some(material)) = (resources.mesh(call.mesh), resources.material(call.material)) else {
            continue;
        };
        if !mesh.is_drawable() {
            continue;
        }

        scope.update(|state| {
            state.blend = BlendMode::Opaque;
            state.depth_func = DepthFunc::Less;
            state.cull = if material.two_sided { CullMode::None } else { CullMode::Back };
        });
        scope.set_uniform("u_model", UniformValue::Mat4(call.model));
        scope.set_uniform("u_alpha_cutoff", UniformValue::Float(material.alpha_mode.cutoff()));
        scope.draw_mesh(mesh.gpu_mesh);
        draws += 1;
    }

    let (width, height) = scope.viewport_size();
    scope.set_viewport(0, 0, width, height);
    draws
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Mat4Ext;
    use crate::render::api::BuiltinMesh;
    use crate::render::backends::headless::HeadlessDevice;
    use crate::render::primitives::Mesh;
    use crate::render::resources::materials::Material;
    use crate::scene::Prefab;
    use approx::assert_relative_eq;

    fn scene_with_caster(device: &HeadlessDevice, light: Light) -> (Scene, usize) {
        let mut scene = Scene::new();
        let cube = scene.add_mesh(Mesh::builtin(device, BuiltinMesh::Cube));
        let material = scene.add_material(Material::default());
        scene.add_prefab("crate", Mat4::new_translation(&Vec3::new(0.0, 5.0, 0.0)), Prefab::single("crate", cube, material));
        let index = scene.add_light("spot", Vec3::new(0.0, 10.0, 0.0), light);
        (scene, index)
    }

    #[test]
    fn test_lifecycle_allocates_and_releases() {
        let mut device = HeadlessDevice::new(64, 64);
        let mut light = Light::spot();

        assert!(!sync_shadow_resources(&mut device, &mut light, 1024).unwrap());
        assert_eq!(device.live_framebuffers(), 0);

        light.cast_shadows = true;
        assert!(sync_shadow_resources(&mut device, &mut light, 1024).unwrap());
        assert_eq!(device.live_framebuffers(), 1);
        let first = light.shadow_map().unwrap().framebuffer().id;

        // Steady state allocates nothing new
        assert!(!sync_shadow_resources(&mut device, &mut light, 1024).unwrap());
        assert_eq!(device.live_framebuffers(), 1);

        light.cast_shadows = false;
        assert!(sync_shadow_resources(&mut device, &mut light, 1024).unwrap());
        assert!(light.shadow_map().is_none());
        assert_eq!(device.live_framebuffers(), 0);
        assert_eq!(device.live_textures(), 1); // white texture only

        light.cast_shadows = true;
        sync_shadow_resources(&mut device, &mut light, 1024).unwrap();
        let second = light.shadow_map().unwrap().framebuffer().id;
        assert_ne!(first, second);
        assert_eq!(device.live_framebuffers(), 1);
    }

    #[test]
    fn test_resolution_change_reallocates() {
        let mut device = HeadlessDevice::new(64, 64);
        let mut light = Light::directional().with_shadows(true, 0.005);

        sync_shadow_resources(&mut device, &mut light, 1024).unwrap();
        sync_shadow_resources(&mut device, &mut light, 2048).unwrap();

        assert_eq!(light.shadow_map().unwrap().resolution(), 2048);
        assert_eq!(device.live_framebuffers(), 1);
    }

    #[test]
    fn test_directional_snapping() {
        let light = Light::directional().with_area_size(100.0).with_max_distance(500.0);
        let model = crate::scene::aim_transform(Vec3::new(13.37, 80.0, 7.91), Vec3::new(0.3, 0.0, -0.2));
        let view_camera = Camera::orthographic(Vec3::zeros(), -25.0, 25.0, -25.0, 25.0, 0.1, 100.0);

        let step = shadow_grid_step(view_camera.frustum_width(), 1024);
        assert_relative_eq!(step, 50.0 / 1024.0);

        let mut camera = Camera::default();
        configure_shadow_camera(&mut camera, &SceneLight::new(&light, model), &view_camera, 1024);

        let view = camera.view_matrix();
        for value in [view[(0, 3)], view[(1, 3)]] {
            let cells = value / step;
            assert_relative_eq!(cells, cells.round(), epsilon = 1e-3);
        }
        assert_relative_eq!(camera.view_projection_matrix(), camera.projection_matrix() * view);
        assert_relative_eq!(camera.frustum_width(), 100.0);
    }

    #[test]
    fn test_spot_camera_projection() {
        let light = Light::spot().with_cone(30.0, 10.0).with_max_distance(40.0);
        let model = Mat4::new_translation(&Vec3::new(0.0, 5.0, 0.0));
        let mut camera = Camera::default();
        configure_shadow_camera(&mut camera, &SceneLight::new(&light, model), &Camera::default(), 1024);

        assert_relative_eq!(camera.far(), 40.0);
        assert_relative_eq!(camera.near(), SHADOW_NEAR_PLANE);
        assert_relative_eq!(camera.eye, Vec3::new(0.0, 5.0, 0.0));
        assert!(camera.test_point_in_frustum(Vec3::new(0.0, 5.0, -10.0)));
        assert!(!camera.test_point_in_frustum(Vec3::new(0.0, 5.0, 10.0)));
        assert_relative_eq!(model.translation(), camera.eye);
    }

    #[test]
    fn test_caster_behind_view_camera_is_drawn() {
        let mut device = HeadlessDevice::new(64, 64);
        let light = Light::spot().with_target(Vec3::new(0.0, 0.0, 1.0)).with_shadows(true, 0.01);
        let (mut scene, index) = scene_with_caster(&device, light);
        if let Some(light) = scene.entities[index].as_light_mut() {
            sync_shadow_resources(&mut device, light, 256).unwrap();
        }
        let mut view_camera = Camera::perspective(Vec3::new(0.0, 2.0, -3.0), 60.0, 1.0, 0.1, 100.0);
        view_camera.look_at(Vec3::new(0.0, 2.0, -3.0), Vec3::new(0.0, 2.0, -10.0), Vec3::y());
        assert!(!view_camera.test_point_in_frustum(Vec3::new(0.0, 5.0, 0.0)));

        let mut casters = RenderQueue::default();
        let draws = generate_shadow_map(&mut device, &mut scene, index, &view_camera, &mut casters);

        assert_eq!(draws, 1);
        assert_eq!(device.draws_with("flat").len(), 1);
        assert!(scene.entities[index].as_light().unwrap().shadow_map().is_some());
    }

    #[test]
    fn test_point_light_and_non_light_render_nothing() {
        let mut device = HeadlessDevice::new(64, 64);
        let (mut scene, index) = scene_with_caster(&device, Light::point().with_shadows(true, 0.01));
        if let Some(light) = scene.entities[index].as_light_mut() {
            sync_shadow_resources(&mut device, light, 256).unwrap();
        }
        let mut casters = RenderQueue::default();

        assert_eq!(generate_shadow_map(&mut device, &mut scene, index, &Camera::default(), &mut casters), 0);
        assert_eq!(generate_shadow_map(&mut device, &mut scene, 0, &Camera::default(), &mut casters), 0);
        assert!(device.draws_with("flat").is_empty());
    }
}
