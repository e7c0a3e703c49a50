//! Scene viewer
//!
//! Builds a small demo scene and renders a fixed number of frames on the
//! headless device, logging what each frame did. Useful for checking a
//! renderer configuration without a window.
//!
//! Usage: `scene_viewer [config.ron|config.toml] [--frames N] [--bake]`

use rust_renderer::config::ConfigError;
use rust_renderer::prelude::*;
use rust_renderer::render::api::LightStrategy;
use rust_renderer::render::backends::headless::HeadlessDevice;
use rust_renderer::render::systems::probes::spherical_harmonics::SH_COEFFICIENTS;
use rust_renderer::render::systems::probes::ProbeError;
use thiserror::Error;

const WIDTH: u32 = 800;
const HEIGHT: u32 = 600;

#[derive(Error, Debug)]
enum ViewerError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    #[error("Probe file error: {0}")]
    Probes(#[from] ProbeError),

    #[error("Invalid argument: {0}")]
    Usage(String),
}

struct Options {
    config_path: Option<String>,
    frames: u32,
    bake: bool,
}

fn parse_args() -> Result<Options, ViewerError> {
    let mut options = Options {
        config_path: None,
        frames: 3,
        bake: false,
    };
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--bake" => options.bake = true,
            "--frames" => {
                let value = args.next().ok_or_else(|| ViewerError::Usage("--frames needs a value".to_string()))?;
                options.frames = value
                    .parse()
                    .map_err(|_| ViewerError::Usage(format!("'{value}' is not a frame count")))?;
            }
            other if other.starts_with("--") => return Err(ViewerError::Usage(format!("unknown flag {other}"))),
            path => options.config_path = Some(path.to_string()),
        }
    }
    Ok(options)
}

/// Floor, two boxes, a glass pane and a mix of lights
fn build_demo_scene(device: &HeadlessDevice) -> Scene {
    let mut scene = Scene::new();
    scene.ambient_light = Vec3::new(0.05, 0.05, 0.08);
    scene.background_color = Vec3::new(0.2, 0.3, 0.45);

    let cube = scene.add_mesh(Mesh::builtin(device, BuiltinMesh::Cube));
    let sphere = scene.add_mesh(Mesh::builtin(device, BuiltinMesh::Sphere));
    let quad = scene.add_mesh(Mesh::builtin(device, BuiltinMesh::Quad));

    let stone = scene.add_material(Material::opaque(Vec4::new(0.6, 0.6, 0.55, 1.0)).with_name("stone"));
    let brass = scene.add_material(
        Material::opaque(Vec4::new(0.9, 0.7, 0.3, 1.0))
            .with_name("brass")
            .with_metallic_roughness(1.0, 0.3),
    );
    let glass = scene.add_material(
        Material::blended(Vec4::new(0.5, 0.8, 1.0, 0.35))
            .with_name("glass")
            .with_two_sided(true),
    );

    let floor = Mat4::new_translation(&Vec3::new(0.0, -1.0, 0.0)) * Mat4::new_nonuniform_scaling(&Vec3::new(10.0, 0.1, 10.0));
    scene.add_prefab("floor", floor, Prefab::single("floor", cube, stone));

    let tower = Node::new("tower")
        .with_mesh(cube, stone)
        .with_child(
            Node::new("orb")
                .with_mesh(sphere, brass)
                .with_model(Mat4::new_translation(&Vec3::new(0.0, 1.6, 0.0)) * Mat4::new_scaling(0.6)),
        );
    scene.add_prefab("tower", Mat4::new_translation(&Vec3::new(-2.0, 0.0, -1.0)), Prefab::new("tower", tower));
    scene.add_prefab(
        "pane",
        Mat4::new_translation(&Vec3::new(1.5, 0.5, 1.5)) * Mat4::new_scaling(1.2),
        Prefab::single("pane", quad, glass),
    );

    scene.add_light(
        "sun",
        Vec3::new(10.0, 20.0, 8.0),
        Light::directional()
            .with_color(Vec3::new(1.0, 0.95, 0.85), 2.0)
            .with_area_size(30.0)
            .with_shadows(true, 0.002),
    );
    scene.add_light(
        "lamp",
        Vec3::new(2.0, 2.0, -2.0),
        Light::point().with_color(Vec3::new(1.0, 0.6, 0.3), 3.0).with_max_distance(8.0),
    );
    scene.add_light(
        "spot",
        Vec3::new(-4.0, 5.0, 3.0),
        Light::spot()
            .with_cone(30.0, 12.0)
            .with_target(Vec3::new(-2.0, 0.0, -1.0))
            .with_shadows(true, 0.005),
    );
    scene.add_decal(
        "scorch",
        Mat4::new_translation(&Vec3::new(0.5, -0.9, 0.5)) * Mat4::new_scaling(0.8),
        Decal::new("scorch.png"),
    );
    scene.add_reflection_probe("center", Vec3::new(0.0, 1.0, 0.0));
    scene
}

fn run(options: &Options) -> Result<(), ViewerError> {
    let config = match &options.config_path {
        Some(path) => RendererConfig::load_from_file(path)?,
        None => RendererConfig::default(),
    };
    log::info!(
        "Pipeline {:?}, lights {:?}, sort {:?}",
        config.pipeline,
        config.light_strategy,
        config.sort_policy
    );
    if config.pipeline == PipelineMode::Forward && config.light_strategy == LightStrategy::SinglePass {
        log::info!("Single-pass lighting keeps only the first lights of the scene");
    }

    let mut device = HeadlessDevice::new(WIDTH, HEIGHT);
    device.register_texture("scorch.png", 64, 64);
    let mut scene = build_demo_scene(&device);
    let mut renderer = Renderer::new(config);

    if options.bake {
        let probes = renderer.bake_irradiance(&mut device, &scene)?;
        log::info!("Baked {probes} irradiance probes ({SH_COEFFICIENTS} coefficients each)");
        if renderer.save_irradiance()? {
            log::info!("Saved probes to {}", renderer.config().irradiance.file.display());
        }
    } else if renderer.config().irradiance.enabled && renderer.load_irradiance(&mut device)? {
        log::info!("Loaded irradiance probes from {}", renderer.config().irradiance.file.display());
    }

    let eye = Vec3::new(0.0, 3.0, 9.0);
    let mut camera = Camera::perspective(eye, 60.0, WIDTH as f32 / HEIGHT as f32, 0.1, 100.0);
    for frame in 0..options.frames {
        let time = frame as f32 / 60.0;
        let angle = time * 0.5;
        let orbit = Vec3::new(eye.z * angle.sin(), eye.y, eye.z * angle.cos());
        camera.look_at(orbit, Vec3::zeros(), Vec3::y());

        let stats = renderer.render_scene(&mut device, &mut scene, &camera, time)?;
        log::info!(
            "Frame {}: {} calls, {} culled, {} lights, {} shadow maps, {} decals, {} draws, {} post passes",
            stats.frame,
            stats.render_calls,
            stats.nodes_culled,
            stats.lights,
            stats.shadow_maps,
            stats.decals,
            stats.draw_calls,
            stats.post_passes
        );
        device.clear_commands();
    }

    renderer.release(&mut device);
    log::info!(
        "Released renderer resources, {} textures and {} framebuffers still alive",
        device.live_textures(),
        device.live_framebuffers()
    );
    Ok(())
}

fn main() {
    rust_renderer::foundation::logging::init_with_default("info");
    log::info!("Starting scene viewer");

    let result = parse_args().and_then(|options| run(&options));
    if let Err(err) = result {
        log::error!("{err}");
        std::process::exit(1);
    }
}
