//! Public device and configuration API of the renderer

pub mod render_backend;
pub mod renderer_config;

pub use render_backend::{
    BackendResult, BuiltinMesh, CubeFace, Framebuffer, FramebufferDesc, FramebufferId, GpuMeshId, GraphicsDevice,
    ProgramId, RenderTarget, TextureDesc, TextureFilter, TextureFormat, TextureId, TextureKind, UniformValue,
};
pub use renderer_config::{
    ColorSpace, DebugSettings, DepthOfFieldSettings, DynamicRange, IrradianceSettings, LensSettings,
    LightStrategy, LightVolumeShape, MotionBlurSettings, PipelineMode, PostProcessSettings, ReflectionSettings,
    RendererConfig, ShadowSettings, SsaoSettings, ToneMappingSettings,
};
