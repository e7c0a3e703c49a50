//! Fixed-function render state and scoped restoration
//!
//! Every pass that changes depth, blend or culling state, or binds a
//! different framebuffer, does so through a [`StateScope`]. The scope
//! snapshots the device state on entry and puts it back when dropped, so each
//! stage starts from the state the previous one left behind.

use std::ops::{Deref, DerefMut};

use bitflags::bitflags;

use crate::render::api::{GraphicsDevice, RenderTarget};

bitflags! {
    /// Buffers affected by a clear
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ClearFlags: u32 {
        /// Colour attachments
        const COLOR = 1 << 0;
        /// Depth attachment
        const DEPTH = 1 << 1;
    }
}

bitflags! {
    /// Colour channels written by draws
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ColorMask: u8 {
        /// Red channel
        const RED = 1 << 0;
        /// Green channel
        const GREEN = 1 << 1;
        /// Blue channel
        const BLUE = 1 << 2;
        /// Alpha channel
        const ALPHA = 1 << 3;
        /// Colour channels without alpha
        const RGB = Self::RED.bits() | Self::GREEN.bits() | Self::BLUE.bits();
    }
}

/// Depth comparison function
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepthFunc {
    /// Pass when the incoming depth is closer
    Less,
    /// Pass when closer or equal
    LessEqual,
    /// Pass when farther
    Greater,
    /// Always pass
    Always,
}

/// Colour blending equation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendMode {
    /// No blending (fully opaque)
    Opaque,
    /// Standard alpha blending: src-alpha, one-minus-src-alpha
    AlphaBlend,
    /// Additive accumulation: src-alpha, one
    Additive,
}

/// Faces discarded by rasterization
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CullMode {
    /// No culling
    None,
    /// Cull front faces
    Front,
    /// Cull back faces
    Back,
}

/// Winding that defines a front face
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrontFace {
    /// Counter-clockwise triangles face the viewer
    CounterClockwise,
    /// Clockwise triangles face the viewer
    Clockwise,
}

/// Complete fixed-function state of the device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderState {
    pub depth_test: bool,
    /// Write to the depth buffer on pass
    pub depth_write: bool,
    /// Comparison used when `depth_test` is set
    pub depth_func: DepthFunc,
    pub blend: BlendMode,
    /// Faces discarded before rasterisation
    pub cull: CullMode,
    /// Winding that counts as front facing
    pub front_face: FrontFace,
    /// Channels written to colour attachments
    pub color_mask: ColorMask,
}

impl Default for RenderState {
    /// Depth-tested opaque geometry with back-face culling
    fn default() -> Self {
        Self {
            depth_test: true,
            depth_write: true,
            depth_func: DepthFunc::Less,
            blend: BlendMode::Opaque,
            cull: CullMode::Back,
            front_face: FrontFace::CounterClockwise,
            color_mask: ColorMask::all(),
        }
    }
}

impl RenderState {
    /// State for full-screen passes: no depth test, no culling, no blending
    pub fn fullscreen() -> Self {
        Self {
            depth_test: false,
            depth_write: false,
            cull: CullMode::None,
            ..Self::default()
        }
    }

    /// Same state with a different blend mode
    pub fn with_blend(mut self, blend: BlendMode) -> Self {
        self.blend = blend;
        self
    }

    /// Same state with a different depth function
    pub fn with_depth_func(mut self, depth_func: DepthFunc) -> Self {
        self.depth_func = depth_func;
        self
    }

    /// Same state with a different cull mode
    pub fn with_cull(mut self, cull: CullMode) -> Self {
        self.cull = cull;
        self
    }
}

/// Scoped device access that restores render state and framebuffer binding on drop
///
/// # Example
/// ```rust
/// use rust_renderer::render::api::GraphicsDevice;
/// use rust_renderer::render::backends::headless::HeadlessDevice;
/// use rust_renderer::render::state::{BlendMode, StateScope};
///
/// let mut device = HeadlessDevice::new(64, 64);
/// let before = device.render_state();
/// {
///     let mut scope = StateScope::new(&mut device);
///     scope.set_blend(BlendMode::Additive);
/// }
/// assert_eq!(device.render_state(), before);
/// ```
pub struct StateScope<'a, D: GraphicsDevice + ?Sized> {
    device: &'a mut D,
    saved_state: RenderState,
    saved_target: RenderTarget,
}

impl<'a, D: GraphicsDevice + ?Sized> StateScope<'a, D> {
    /// Snapshot the current state of `device`
    pub fn new(device: &'a mut D) -> Self {
        let saved_state = device.render_state();
        let saved_target = device.bound_framebuffer();
        Self {
            device,
            saved_state,
            saved_target,
        }
    }

    /// Current state as seen through the scope
    pub fn state(&self) -> RenderState {
        self.device.render_state()
    }

    /// Replace the whole state
    pub fn apply(&mut self, state: RenderState) {
        self.device.set_render_state(&state);
    }

    /// Modify part of the state in place
    pub fn update(&mut self, f: impl FnOnce(&mut RenderState)) {
        let mut state = self.device.render_state();
        f(&mut state);
        self.device.set_render_state(&state);
    }

    /// Change only the blend mode
    pub fn set_blend(&mut self, blend: BlendMode) {
        self.update(|state| state.blend = blend);
    }

    /// Change only the depth function
    pub fn set_depth_func(&mut self, depth_func: DepthFunc) {
        self.update(|state| state.depth_func = depth_func);
    }

    /// Change only the cull mode
    pub fn set_cull(&mut self, cull: CullMode) {
        self.update(|state| state.cull = cull);
    }
}

impl<D: GraphicsDevice + ?Sized> Deref for StateScope<'_, D> {
    type Target = D;

    fn deref(&self) -> &D {
        self.device
    }
}

impl<D: GraphicsDevice + ?Sized> DerefMut for StateScope<'_, D> {
    fn deref_mut(&mut self) -> &mut D {
        self.device
    }
}

impl<D: GraphicsDevice + ?Sized> Drop for StateScope<'_, D> {
    fn drop(&mut self) {
        self.device.set_render_state(&self.saved_state);
        if self.device.bound_framebuffer() != self.saved_target {
            self.device.bind_framebuffer(self.saved_target);
        }
    }
}
