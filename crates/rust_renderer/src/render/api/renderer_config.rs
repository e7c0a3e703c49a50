//! Renderer configuration
//!
//! Every global policy and per-pass toggle of the renderer lives in
//! [`RendererConfig`]. Applications build it in code with the `with_*`
//! helpers or load it from a `.toml` / `.ron` file through [`Config`].

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::render::render_queue::SortPolicy;

/// Top-level shading pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum PipelineMode {
    /// Shade every object while rasterizing it
    Forward,
    /// Geometry pass into G-buffers, then screen-space lighting
    #[default]
    Deferred,
}

/// How lights are applied in the forward path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum LightStrategy {
    /// One additive pass per light
    #[default]
    MultiPass,
    /// All lights uploaded as arrays in one pass
    SinglePass,
}

/// Geometry used for non-directional lights in the deferred lighting pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum LightVolumeShape {
    /// Sphere scaled to the light's influence distance
    #[default]
    Sphere,
    /// Full-screen quad
    FullscreenQuad,
}

/// Colour space lighting is computed in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ColorSpace {
    /// Textures are linearized and output re-encoded
    #[default]
    Gamma,
    /// Values are used as stored
    Linear,
}

/// Range of the lit colour buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum DynamicRange {
    /// Unclamped values, resolved by tone mapping
    #[default]
    Hdr,
    /// Values clamped to [0, 1]
    Ldr,
}

impl ColorSpace {
    /// Integer code uploaded as `gamma_mode`
    pub fn shader_code(self) -> i32 {
        match self {
            ColorSpace::Linear => 0,
            ColorSpace::Gamma => 1,
        }
    }
}

impl DynamicRange {
    /// Integer code uploaded as `dynamic_range`
    pub fn shader_code(self) -> i32 {
        match self {
            DynamicRange::Ldr => 0,
            DynamicRange::Hdr => 1,
        }
    }
}

/// Shadow-map settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShadowSettings {
    /// Width and height of every shadow map
    pub resolution: u32,
}

impl Default for ShadowSettings {
    fn default() -> Self {
        Self { resolution: 1024 }
    }
}

/// Screen-space ambient occlusion settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SsaoSettings {
    pub enabled: bool,
    /// Number of kernel points, generated once at renderer construction
    pub sample_count: usize,
    /// Kernel radius in world units
    pub radius: f32,
    /// Run the separate blur pass
    pub blur: bool,
}

impl Default for SsaoSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            sample_count: 64,
            radius: 1.0,
            blur: true,
        }
    }
}

/// Irradiance volume settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IrradianceSettings {
    /// Sample the probe grid during lighting
    pub enabled: bool,
    /// Minimum corner of the grid box
    pub start: [f32; 3],
    /// Maximum corner of the grid box
    pub end: [f32; 3],
    /// Probe count along each axis
    pub dims: [u32; 3],
    /// Face size of the capture target used while baking
    pub capture_resolution: u32,
    /// Location of the persisted probe grid
    pub file: PathBuf,
    /// Draw a sphere at each probe
    pub visualize: bool,
    /// Radius of the visualisation spheres
    pub probe_size: f32,
}

impl Default for IrradianceSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            start: [-80.0, 0.0, -90.0],
            end: [80.0, 80.0, 90.0],
            dims: [8, 6, 12],
            capture_resolution: 64,
            file: PathBuf::from("irradiance.bin"),
            visualize: false,
            probe_size: 2.0,
        }
    }
}

/// Reflection probe settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReflectionSettings {
    /// Sample reflection cubemaps during shading
    pub enabled: bool,
    /// Face size of every probe cubemap
    pub cubemap_resolution: u32,
    /// Draw a mirrored sphere at each probe
    pub visualize: bool,
}

impl Default for ReflectionSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            cubemap_resolution: 128,
            visualize: false,
        }
    }
}

/// Depth-of-field stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DepthOfFieldSettings {
    pub enabled: bool,
    /// Linear depth where blur starts
    pub focus_near: f32,
    /// Linear depth of full blur
    pub focus_far: f32,
    /// Number of blur passes; the kernel halves after each
    pub blur_passes: u32,
    /// Kernel size of the first blur pass in pixels
    pub kernel_size: f32,
}

impl Default for DepthOfFieldSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            focus_near: 10.0,
            focus_far: 50.0,
            blur_passes: 4,
            kernel_size: 8.0,
        }
    }
}

/// Chromatic aberration and lens distortion stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LensSettings {
    pub enabled: bool,
    pub aberration: f32,
    pub distortion: f32,
}

impl Default for LensSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            aberration: 0.005,
            distortion: 0.1,
        }
    }
}

/// Camera motion blur stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionBlurSettings {
    pub enabled: bool,
    pub strength: f32,
}

impl Default for MotionBlurSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            strength: 1.0,
        }
    }
}

/// Tone mapping stage, always applied
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToneMappingSettings {
    pub exposure: f32,
    pub white_point: f32,
}

impl Default for ToneMappingSettings {
    fn default() -> Self {
        Self {
            exposure: 1.0,
            white_point: 1.0,
        }
    }
}

/// Post-processing chain settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PostProcessSettings {
    pub depth_of_field: DepthOfFieldSettings,
    pub lens: LensSettings,
    pub motion_blur: MotionBlurSettings,
    pub antialiasing: bool,
    pub tone_mapping: ToneMappingSettings,
}

/// Inspection views drawn over the final image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct DebugSettings {
    /// Split the screen into the G-buffer channels and linear depth
    pub show_gbuffers: bool,
    /// Show the ambient occlusion buffer in a screen corner
    pub show_ssao: bool,
    /// Show the shadow map of the n-th active light in a screen corner
    pub show_shadowmap: Option<usize>,
}

/// Configuration for the renderer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct RendererConfig {
    pub pipeline: PipelineMode,
    pub light_strategy: LightStrategy,
    pub light_volume: LightVolumeShape,
    pub color_space: ColorSpace,
    pub dynamic_range: DynamicRange,
    pub sort_policy: SortPolicy,
    pub shadows: ShadowSettings,
    pub ssao: SsaoSettings,
    /// Project decals into the G-buffer
    pub decals: bool,
    pub irradiance: IrradianceSettings,
    pub reflections: ReflectionSettings,
    pub post: PostProcessSettings,
    pub debug: DebugSettings,
}

impl Config for RendererConfig {}

impl RendererConfig {
    /// Select the shading pipeline
    pub fn with_pipeline(mut self, pipeline: PipelineMode) -> Self {
        self.pipeline = pipeline;
        self
    }

    /// Select the forward lighting strategy
    pub fn with_light_strategy(mut self, strategy: LightStrategy) -> Self {
        self.light_strategy = strategy;
        self
    }

    /// Select the deferred light volume shape
    pub fn with_light_volume(mut self, shape: LightVolumeShape) -> Self {
        self.light_volume = shape;
        self
    }

    /// Select the render-call ordering policy
    pub fn with_sort_policy(mut self, policy: SortPolicy) -> Self {
        self.sort_policy = policy;
        self
    }

    /// Set the shadow-map resolution, clamped to a sane range
    pub fn with_shadow_resolution(mut self, resolution: u32) -> Self {
        self.shadows.resolution = resolution.clamp(64, 8192);
        self
    }

    /// Enable or disable ambient occlusion
    pub fn with_ssao(mut self, enabled: bool) -> Self {
        self.ssao.enabled = enabled;
        self
    }

    /// Enable or disable decals
    pub fn with_decals(mut self, enabled: bool) -> Self {
        self.decals = enabled;
        self
    }

    /// Enable or disable the irradiance volume
    pub fn with_irradiance(mut self, enabled: bool) -> Self {
        self.irradiance.enabled = enabled;
        self
    }

    /// Configure the irradiance grid box and resolution
    pub fn with_irradiance_grid(mut self, start: [f32; 3], end: [f32; 3], dims: [u32; 3]) -> Self {
        self.irradiance.start = start;
        self.irradiance.end = end;
        self.irradiance.dims = dims;
        self
    }

    /// Set the probe grid file location
    pub fn with_irradiance_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.irradiance.file = path.into();
        self
    }

    /// Enable or disable reflection probes
    pub fn with_reflections(mut self, enabled: bool) -> Self {
        self.reflections.enabled = enabled;
        self
    }

    /// Replace the post-processing settings
    pub fn with_post_process(mut self, post: PostProcessSettings) -> Self {
        self.post = post;
        self
    }

    /// Replace the debug overlay settings
    pub fn with_debug(mut self, debug: DebugSettings) -> Self {
        self.debug = debug;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RendererConfig::default();
        assert_eq!(config.pipeline, PipelineMode::Deferred);
        assert_eq!(config.light_strategy, LightStrategy::MultiPass);
        assert_eq!(config.shadows.resolution, 1024);
        assert_eq!(config.ssao.sample_count, 64);
        assert!(!config.post.depth_of_field.enabled);
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: RendererConfig = toml::from_str(
            r#"
            pipeline = "Forward"
            light_strategy = "SinglePass"

            [shadows]
            resolution = 2048
            "#,
        )
        .unwrap();

        assert_eq!(config.pipeline, PipelineMode::Forward);
        assert_eq!(config.light_strategy, LightStrategy::SinglePass);
        assert_eq!(config.shadows.resolution, 2048);
        assert_eq!(config.ssao, SsaoSettings::default());
    }

    #[test]
    fn test_ron_file_round_trip() {
        let path = std::env::temp_dir().join(format!("rust_renderer_config_{}.ron", std::process::id()));
        let config = RendererConfig::default()
            .with_pipeline(PipelineMode::Forward)
            .with_sort_policy(SortPolicy::SingleKey)
            .with_irradiance_grid([-1.0; 3], [1.0; 3], [2, 2, 2]);

        config.save_to_file(&path).unwrap();
        let loaded = RendererConfig::load_from_file(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(loaded, config);
    }

    #[test]
    fn test_shadow_resolution_clamped() {
        let config = RendererConfig::default().with_shadow_resolution(1);
        assert_eq!(config.shadows.resolution, 64);
    }
}
