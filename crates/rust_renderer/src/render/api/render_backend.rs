//! Device abstraction for the rendering system
//!
//! This module defines the trait a graphics device must implement so the
//! high-level renderer can drive it. The model is a single immediate-mode API
//! with bindable framebuffers, textures and named shader programs; all state
//! lives on the device and is changed through explicit calls.

use image::Rgb32FImage;

use crate::foundation::math::{Mat4, Vec2, Vec3, Vec4};
use crate::render::RenderError;
use crate::render::state::{ClearFlags, RenderState};

/// Result type for device operations
pub type BackendResult<T> = Result<T, RenderError>;

/// Handle to a texture (2D or cubemap) owned by the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureId(pub u64);

/// Handle to a framebuffer object owned by the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FramebufferId(pub u64);

/// Handle to uploaded mesh geometry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GpuMeshId(pub u64);

/// Handle to a compiled shader program
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgramId(pub u64);

/// Pixel storage of a texture or attachment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureFormat {
    /// 8-bit normalized RGBA
    Rgba8,
    /// Half-float RGBA (HDR colour targets)
    Rgba16F,
    /// Single-precision RGB (probe coefficients, captures)
    Rgb32F,
    /// Single-precision RGBA
    Rgba32F,
    /// 24-bit depth
    Depth24,
}

/// Sampling filter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureFilter {
    Nearest,
    Linear,
}

/// Texture dimensionality
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureKind {
    Texture2D,
    Cubemap,
}

/// Description of a texture to allocate
#[derive(Debug, Clone, PartialEq)]
pub struct TextureDesc {
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
    pub filter: TextureFilter,
    pub kind: TextureKind,
    pub mipmaps: bool,
}

impl TextureDesc {
    /// 2D texture with linear filtering and no mipmaps
    pub fn texture_2d(width: u32, height: u32, format: TextureFormat) -> Self {
        Self {
            width,
            height,
            format,
            filter: TextureFilter::Linear,
            kind: TextureKind::Texture2D,
            mipmaps: false,
        }
    }

    /// Square cubemap
    pub fn cubemap(size: u32, format: TextureFormat) -> Self {
        Self {
            kind: TextureKind::Cubemap,
            ..Self::texture_2d(size, size, format)
        }
    }

    /// Set the sampling filter
    pub fn with_filter(mut self, filter: TextureFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Allocate a full mip chain
    pub fn with_mipmaps(mut self, mipmaps: bool) -> Self {
        self.mipmaps = mipmaps;
        self
    }

    /// Number of float components per texel, used to validate initial data
    pub fn components(&self) -> usize {
        match self.format {
            TextureFormat::Rgb32F => 3,
            TextureFormat::Depth24 => 1,
            _ => 4,
        }
    }
}

/// Description of a framebuffer to allocate
#[derive(Debug, Clone, PartialEq)]
pub struct FramebufferDesc {
    pub width: u32,
    pub height: u32,
    /// One colour attachment per entry; empty for depth-only targets
    pub color_formats: Vec<TextureFormat>,
    pub depth: bool,
}

impl FramebufferDesc {
    /// Framebuffer with `color_formats` attachments and optional depth
    pub fn new(width: u32, height: u32, color_formats: &[TextureFormat], depth: bool) -> Self {
        Self {
            width,
            height,
            color_formats: color_formats.to_vec(),
            depth,
        }
    }

    /// Depth-only target, as used by shadow maps
    pub fn depth_only(width: u32, height: u32) -> Self {
        Self::new(width, height, &[], true)
    }
}

/// A framebuffer and the textures it renders into
#[derive(Debug, Clone, PartialEq)]
pub struct Framebuffer {
    pub id: FramebufferId,
    pub width: u32,
    pub height: u32,
    pub color_textures: Vec<TextureId>,
    pub depth_texture: Option<TextureId>,
}

impl Framebuffer {
    /// Colour attachment `index`, if present
    pub fn color_texture(&self, index: usize) -> Option<TextureId> {
        self.color_textures.get(index).copied()
    }

    /// Render target handle for binding
    pub fn target(&self) -> RenderTarget {
        RenderTarget::Framebuffer(self.id)
    }
}

/// Destination of draw calls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RenderTarget {
    /// Default framebuffer
    #[default]
    Screen,
    /// Offscreen framebuffer
    Framebuffer(FramebufferId),
}

/// Faces of a cubemap in the conventional +X, -X, +Y, -Y, +Z, -Z order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CubeFace {
    PositiveX,
    NegativeX,
    PositiveY,
    NegativeY,
    PositiveZ,
    NegativeZ,
}

impl CubeFace {
    /// All faces in upload order
    pub const ALL: [CubeFace; 6] = [
        CubeFace::PositiveX,
        CubeFace::NegativeX,
        CubeFace::PositiveY,
        CubeFace::NegativeY,
        CubeFace::PositiveZ,
        CubeFace::NegativeZ,
    ];

    /// Viewing direction of a 90 degree capture through this face
    pub fn direction(self) -> Vec3 {
        match self {
            CubeFace::PositiveX => Vec3::new(1.0, 0.0, 0.0),
            CubeFace::NegativeX => Vec3::new(-1.0, 0.0, 0.0),
            CubeFace::PositiveY => Vec3::new(0.0, 1.0, 0.0),
            CubeFace::NegativeY => Vec3::new(0.0, -1.0, 0.0),
            CubeFace::PositiveZ => Vec3::new(0.0, 0.0, 1.0),
            CubeFace::NegativeZ => Vec3::new(0.0, 0.0, -1.0),
        }
    }

    /// Up vector matching the cubemap face orientation convention
    pub fn up(self) -> Vec3 {
        match self {
            CubeFace::PositiveY => Vec3::new(0.0, 0.0, 1.0),
            CubeFace::NegativeY => Vec3::new(0.0, 0.0, -1.0),
            _ => Vec3::new(0.0, -1.0, 0.0),
        }
    }
}

/// Geometry every device provides without loading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinMesh {
    /// Full-screen quad in clip space
    Quad,
    /// Unit-radius sphere
    Sphere,
    /// Unit cube spanning [-1, 1]
    Cube,
}

/// Value uploaded to a named uniform of the bound program
#[derive(Debug, Clone, PartialEq)]
pub enum UniformValue {
    Int(i32),
    Float(f32),
    Vec2(Vec2),
    Vec3(Vec3),
    Vec4(Vec4),
    Mat4(Mat4),
    IntArray(Vec<i32>),
    FloatArray(Vec<f32>),
    Vec3Array(Vec<Vec3>),
    Mat4Array(Vec<Mat4>),
    /// 2D texture bound to a texture unit
    Texture { texture: TextureId, slot: u32 },
    /// Cubemap bound to a texture unit
    Cubemap { texture: TextureId, slot: u32 },
}

impl UniformValue {
    /// Number of array elements carried by the value (1 for scalars)
    pub fn len(&self) -> usize {
        match self {
            UniformValue::IntArray(values) => values.len(),
            UniformValue::FloatArray(values) => values.len(),
            UniformValue::Vec3Array(values) => values.len(),
            UniformValue::Mat4Array(values) => values.len(),
            _ => 1,
        }
    }

    /// True for an empty array value
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Immediate-mode graphics device
///
/// The renderer owns no GPU state of its own; everything is created and bound
/// through this trait. Lookups by name (`bind_program`, `texture`) return
/// `None` for absent resources so callers can skip the affected draw.
pub trait GraphicsDevice {
    /// Current drawable size (width, height) of the screen
    fn viewport_size(&self) -> (u32, u32);

    /// Set the viewport rectangle of the bound target
    fn set_viewport(&mut self, x: i32, y: i32, width: u32, height: u32);

    /// Allocate a texture, optionally filled with float texel data
    fn create_texture(&mut self, desc: &TextureDesc, data: Option<&[f32]>) -> BackendResult<TextureId>;

    /// Release a texture
    fn destroy_texture(&mut self, texture: TextureId);

    /// Rebuild the mip chain of a texture from its base level
    fn generate_mipmaps(&mut self, texture: TextureId);

    /// Allocate a framebuffer and its attachments
    fn create_framebuffer(&mut self, desc: &FramebufferDesc) -> BackendResult<Framebuffer>;

    /// Release a framebuffer together with its attachment textures
    fn destroy_framebuffer(&mut self, framebuffer: &Framebuffer);

    /// Route colour attachment 0 of `framebuffer` to one face and mip level of a cubemap
    fn attach_cubemap_face(&mut self, framebuffer: FramebufferId, cubemap: TextureId, face: CubeFace, mip_level: u32);

    /// Direct subsequent draws to `target`
    fn bind_framebuffer(&mut self, target: RenderTarget);

    /// Currently bound target
    fn bound_framebuffer(&self) -> RenderTarget;

    /// Clear the bound target
    fn clear(&mut self, flags: ClearFlags, color: Vec4);

    /// Copy the depth attachment of `source` into `destination`
    fn copy_depth(&mut self, source: FramebufferId, destination: RenderTarget);

    /// Copy texel contents between two textures of identical size and format
    fn copy_texture(&mut self, source: TextureId, destination: TextureId);

    /// Read colour attachment 0 of a framebuffer back to host memory
    ///
    /// Rows are ordered top to bottom. Stalls until all pending work on the
    /// framebuffer completes.
    fn read_pixels(&mut self, framebuffer: FramebufferId) -> BackendResult<Rgb32FImage>;

    /// Snapshot of the fixed-function state
    fn render_state(&self) -> RenderState;

    /// Apply fixed-function state
    fn set_render_state(&mut self, state: &RenderState);

    /// Look up and bind a program by name
    fn bind_program(&mut self, name: &str) -> Option<ProgramId>;

    /// Upload a uniform to the bound program; unknown names are ignored
    fn set_uniform(&mut self, name: &str, value: UniformValue);

    /// Look up a loaded texture by name
    fn texture(&self, name: &str) -> Option<TextureId>;

    /// Reserved 1x1 white texture used as a neutral default
    fn white_texture(&self) -> TextureId;

    /// Handle of a built-in mesh
    fn builtin_mesh(&self, mesh: BuiltinMesh) -> GpuMeshId;

    /// Draw a mesh with the bound program and state
    fn draw_mesh(&mut self, mesh: GpuMeshId);
}
