//! # Rendering System
//!
//! Turns a [`Scene`](crate::scene::Scene) into draw calls on a
//! [`GraphicsDevice`](api::GraphicsDevice).
//!
//! ## Architecture
//!
//! - **Renderer**: owns every framebuffer, the probe data and the per-frame
//!   queue, and sequences the passes of a frame
//! - **Render queue**: flat, sorted list of the frame's draw requests
//! - **Pipelines**: forward and deferred shading plus their screen-space passes
//! - **Systems**: lights, shadow maps, probes and post-processing
//! - **State**: render state and the scope guard that restores it
//! - **Backends**: device implementations; a headless recorder ships with the crate
//!
//! ## Frame order
//!
//! Collection, sort, shadow maps, shading (forward or deferred),
//! post-processing, debug overlays. Nothing overlaps between frames.

pub mod api;
pub mod backends;
pub mod pipelines;
pub mod primitives;
pub mod render_queue;
pub mod renderer;
pub mod resources;
pub mod state;
pub mod systems;

pub use api::{GraphicsDevice, RendererConfig};
pub use primitives::{Camera, Mesh};
pub use render_queue::{RenderCall, RenderQueue, SortPolicy};
pub use renderer::{FrameStats, Renderer};
pub use resources::materials::{AlphaMode, Material, MaterialTextures};
pub use systems::lighting::{Light, LightType};

use thiserror::Error;

/// Rendering errors
///
/// Only device-level failures are errors. Missing programs, textures or
/// scene resources degrade the frame and are logged instead.
#[derive(Error, Debug)]
pub enum RenderError {
    /// Renderer initialization failed during setup
    #[error("Renderer initialization failed: {0}")]
    InitializationFailed(String),

    /// A rendering operation failed during execution
    #[error("Rendering failed: {0}")]
    RenderingFailed(String),

    /// Framebuffer or texture allocation failed
    #[error("Resource creation failed: {0}")]
    ResourceCreationFailed(String),

    /// Device-specific error
    #[error("Backend error: {0}")]
    BackendError(String),
}

/// Result type for rendering operations
pub type RenderResult<T> = Result<T, RenderError>;
