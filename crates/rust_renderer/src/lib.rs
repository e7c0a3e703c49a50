//! # Rust Renderer
//!
//! A multi-pass scene renderer with forward and deferred shading.
//!
//! ## Features
//!
//! - **Render queue**: per-frame collection with frustum culling, opaque
//!   front-to-back and blended back-to-front ordering
//! - **Shadow maps**: lazily allocated per light, texel-snapped for
//!   directional lights
//! - **Forward shading**: multi-pass or fixed-capacity single-pass lighting
//! - **Deferred shading**: G-buffers, decals, SSAO, light volumes
//! - **Global illumination**: baked spherical-harmonic irradiance grid and
//!   reflection cubemaps
//! - **Post-processing**: depth of field, lens effects, motion blur,
//!   antialiasing, tone mapping
//!
//! The renderer drives any [`GraphicsDevice`](render::api::GraphicsDevice);
//! a headless recording device is included for tests and offline runs.
//!
//! ## Quick Start
//!
//! ```rust
//! use rust_renderer::prelude::*;
//! use rust_renderer::render::backends::headless::HeadlessDevice;
//!
//! let mut device = HeadlessDevice::new(320, 240);
//! let mut scene = Scene::new();
//! let cube = scene.add_mesh(Mesh::builtin(&device, BuiltinMesh::Cube));
//! let material = scene.add_material(Material::default());
//! scene.add_prefab("cube", Mat4::identity(), Prefab::single("cube", cube, material));
//! scene.add_light("sun", Vec3::new(5.0, 10.0, 5.0), Light::directional().with_shadows(true, 0.01));
//!
//! let camera = Camera::perspective(Vec3::new(0.0, 2.0, 6.0), 60.0, 320.0 / 240.0, 0.1, 100.0);
//! let mut renderer = Renderer::new(RendererConfig::default());
//! let stats = renderer.render_scene(&mut device, &mut scene, &camera, 0.0)?;
//! assert_eq!(stats.render_calls, 1);
//! # Ok::<(), rust_renderer::render::RenderError>(())
//! ```

#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod config;
pub mod foundation;
pub mod render;
pub mod scene;
pub mod spatial;

/// Common imports for renderer users
pub mod prelude {
    pub use crate::{
        config::Config,
        foundation::math::{Mat4, Mat4Ext, Vec3, Vec4},
        render::{
            api::{BuiltinMesh, GraphicsDevice, PipelineMode, RendererConfig},
            AlphaMode, Camera, FrameStats, Light, LightType, Material, Mesh, RenderError, RenderResult, Renderer,
        },
        scene::{Decal, Node, Prefab, Scene},
    };
}
