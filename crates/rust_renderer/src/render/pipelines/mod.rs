//! # Shading Pipelines
//!
//! The passes that turn a sorted render queue into a lit image:
//!
//! - **forward**: per-object lighting, multi-pass or single-pass
//! - **deferred**: G-buffer geometry pass, decals, SSAO, screen-space
//!   lighting, irradiance and reflections, then a forward tail for blended
//!   geometry
//! - **fullscreen**: quad and blit helpers shared by screen-space passes
//!
//! Every pass receives the frame's read-only inputs through a
//! [`FrameContext`] and changes device state only inside a
//! [`StateScope`](crate::render::state::StateScope).

pub mod decals;
pub mod deferred;
pub mod forward;
pub mod fullscreen;
pub mod ssao;

use crate::render::api::RendererConfig;
use crate::render::primitives::Camera;
use crate::render::systems::lighting::SceneLight;
use crate::render::systems::probes::ReflectionProbes;
use crate::scene::Scene;

/// Read-only inputs shared by the passes of one frame
#[derive(Clone, Copy)]
pub struct FrameContext<'a> {
    pub scene: &'a Scene,
    pub camera: &'a Camera,
    /// Visible lights in scene order
    pub lights: &'a [SceneLight<'a>],
    pub config: &'a RendererConfig,
    /// Seconds since start, uploaded as `u_time`
    pub time: f32,
    /// Reflection probes to sample; `None` while capturing probes
    pub reflections: Option<&'a ReflectionProbes>,
}
