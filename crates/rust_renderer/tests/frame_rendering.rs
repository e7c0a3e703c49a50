//! Whole frames rendered through the headless device

use rust_renderer::prelude::*;
use rust_renderer::render::api::{LightStrategy, RenderTarget, UniformValue};
use rust_renderer::render::backends::headless::HeadlessDevice;
use rust_renderer::render::state::RenderState;
use rust_renderer::render::systems::lighting::MAX_SINGLE_PASS_LIGHTS;
use rust_renderer::scene::collect_render_calls;
use rust_renderer::render::{RenderQueue, SortPolicy};

fn camera() -> Camera {
    let eye = Vec3::new(0.0, 0.0, 8.0);
    let mut camera = Camera::perspective(eye, 60.0, 1.0, 0.1, 100.0);
    camera.look_at(eye, Vec3::zeros(), Vec3::y());
    camera
}

fn lit_scene(device: &HeadlessDevice) -> Scene {
    let mut scene = Scene::new();
    let cube = scene.add_mesh(Mesh::builtin(device, BuiltinMesh::Cube));
    let stone = scene.add_material(Material::default());
    scene.add_prefab("block", Mat4::identity(), Prefab::single("block", cube, stone));
    scene.add_light("sun", Vec3::new(0.0, 20.0, 5.0), Light::directional().with_shadows(true, 0.005));
    scene.add_light("lamp", Vec3::new(2.0, 2.0, 0.0), Light::point().with_max_distance(6.0));
    scene.add_light("torch", Vec3::new(-3.0, 4.0, 2.0), Light::spot().with_cone(25.0, 8.0).with_shadows(true, 0.01));
    scene.add_decal("scorch", Mat4::new_translation(&Vec3::new(0.0, 0.0, 1.0)), Decal::new("scorch.png"));
    scene
}

#[test]
fn sphere_sorts_before_closer_translucent_quad() {
    let device = HeadlessDevice::new(64, 64);
    let mut scene = Scene::new();
    let sphere = scene.add_mesh(Mesh::builtin(&device, BuiltinMesh::Sphere));
    let quad = scene.add_mesh(Mesh::builtin(&device, BuiltinMesh::Quad));
    let opaque = scene.add_material(Material::default());
    let glass = scene.add_material(Material::blended(Vec4::new(0.6, 0.8, 1.0, 0.4)));
    scene.add_prefab("sphere", Mat4::identity(), Prefab::single("sphere", sphere, opaque));
    scene.add_prefab("quad", Mat4::new_translation(&Vec3::new(0.0, 0.0, 5.0)), Prefab::single("quad", quad, glass));

    for policy in [SortPolicy::Partitioned, SortPolicy::SingleKey] {
        let mut queue = RenderQueue::new(policy);
        collect_render_calls(&scene, &camera(), &mut queue);
        queue.sort();

        let order: Vec<_> = queue.calls().iter().map(|call| call.mesh).collect();
        assert_eq!(order, vec![sphere, quad], "{policy:?}");
        assert!(queue.calls()[1].camera_distance() < queue.calls()[0].camera_distance());
    }
}

#[test]
fn deferred_frame_runs_every_pass() {
    let mut device = HeadlessDevice::new(64, 64);
    device.register_texture("scorch.png", 16, 16);
    let mut scene = lit_scene(&device);
    let mut renderer = Renderer::new(RendererConfig::default());

    let stats = renderer.render_scene(&mut device, &mut scene, &camera(), 0.0).unwrap();

    assert_eq!(stats.render_calls, 1);
    assert_eq!(stats.lights, 3);
    assert_eq!(stats.shadow_maps, 2);
    assert_eq!(stats.decals, 1);
    assert_eq!(stats.post_passes, 1);
    assert_eq!(device.draws_with("gbuffers").len(), 1);
    assert_eq!(device.draws_with("decal").len(), 1);
    assert_eq!(device.draws_with("ssao").len(), 1);
    assert_eq!(device.draws_with("deferred").len(), 1);
    assert_eq!(device.draws_with("deferred_volume").len(), 2);
    assert_eq!(device.draws_with("tonemapper").len(), 1);
    assert_eq!(device.draws_with("tonemapper")[0].target, RenderTarget::Screen);
    assert_eq!(device.render_state(), RenderState::default());
    assert_eq!(device.viewport_size(), (64, 64));
}

#[test]
fn forward_and_deferred_agree_on_frame_contents() {
    let mut device = HeadlessDevice::new(64, 64);
    device.register_texture("scorch.png", 16, 16);
    let mut scene = lit_scene(&device);
    let mut renderer = Renderer::new(RendererConfig::default().with_pipeline(PipelineMode::Forward));

    let forward = renderer.render_scene(&mut device, &mut scene, &camera(), 0.0).unwrap();
    assert_eq!(forward.draw_calls, 3, "one additive pass per light");
    assert_eq!(device.draws_with("multilight").len(), 3);
    assert_eq!(forward.decals, 0);

    renderer.config_mut().pipeline = PipelineMode::Deferred;
    let deferred = renderer.render_scene(&mut device, &mut scene, &camera(), 0.1).unwrap();
    assert_eq!(deferred.frame, 2);
    assert_eq!(deferred.render_calls, forward.render_calls);
    assert_eq!(deferred.lights, forward.lights);
}

#[test]
fn single_pass_uploads_at_most_capacity_lights() {
    let mut device = HeadlessDevice::new(32, 32);
    let mut scene = Scene::new();
    let cube = scene.add_mesh(Mesh::builtin(&device, BuiltinMesh::Cube));
    let stone = scene.add_material(Material::default());
    scene.add_prefab("block", Mat4::identity(), Prefab::single("block", cube, stone));
    for i in 0..8 {
        let angle = i as f32 * std::f32::consts::FRAC_PI_4;
        let position = Vec3::new(angle.cos() * 3.0, 1.0, angle.sin() * 3.0);
        scene.add_light(format!("light{i}"), position, Light::point());
    }
    let config = RendererConfig::default()
        .with_pipeline(PipelineMode::Forward)
        .with_light_strategy(LightStrategy::SinglePass);
    let mut renderer = Renderer::new(config);

    let stats = renderer.render_scene(&mut device, &mut scene, &camera(), 0.0).unwrap();

    assert_eq!(stats.lights, 8);
    assert_eq!(stats.draw_calls, 1);
    assert_eq!(
        device.uniform_of("singlelight", "u_num_lights"),
        Some(&UniformValue::Int(MAX_SINGLE_PASS_LIGHTS as i32))
    );
    let positions = device.uniform_of("singlelight", "u_light_position").unwrap();
    assert_eq!(positions.len(), MAX_SINGLE_PASS_LIGHTS);
}

#[test]
fn invisible_entities_are_not_drawn() {
    let mut device = HeadlessDevice::new(32, 32);
    let mut scene = lit_scene(&device);
    if let Some(block) = scene.entity_mut("block") {
        block.visible = false;
    }
    if let Some(lamp) = scene.entity_mut("lamp") {
        lamp.visible = false;
    }
    let mut renderer = Renderer::new(RendererConfig::default().with_pipeline(PipelineMode::Forward));

    let stats = renderer.render_scene(&mut device, &mut scene, &camera(), 0.0).unwrap();

    assert_eq!(stats.render_calls, 0);
    assert_eq!(stats.lights, 2);
    assert_eq!(stats.draw_calls, 0);
}

#[test]
fn shadow_casters_outside_the_view_still_cast() {
    let mut device = HeadlessDevice::new(32, 32);
    let mut scene = Scene::new();
    let cube = scene.add_mesh(Mesh::builtin(&device, BuiltinMesh::Cube));
    let stone = scene.add_material(Material::default());
    scene.add_prefab("overhang", Mat4::new_translation(&Vec3::new(0.0, 5.0, 0.0)), Prefab::single("overhang", cube, stone));
    scene.add_light(
        "spot",
        Vec3::new(0.0, 10.0, 0.0),
        Light::spot().with_target(Vec3::new(0.0, 0.0, 1.0)).with_shadows(true, 0.01),
    );
    let eye = Vec3::new(0.0, 2.0, -3.0);
    let mut camera = Camera::perspective(eye, 60.0, 1.0, 0.1, 100.0);
    camera.look_at(eye, Vec3::new(0.0, 2.0, -10.0), Vec3::y());
    let mut renderer = Renderer::new(RendererConfig::default().with_pipeline(PipelineMode::Forward));

    let stats = renderer.render_scene(&mut device, &mut scene, &camera, 0.0).unwrap();

    assert_eq!(stats.render_calls, 0);
    assert_eq!(stats.shadow_maps, 1);
    assert_eq!(device.draws_with("flat").len(), 1);
}
