//! Material definitions
//!
//! Materials describe how a surface is shaded: base colour and PBR factors,
//! optional textures resolved by name through the device, alpha handling and
//! face culling.

use crate::foundation::math::{Vec3, Vec4};

/// Alpha handling modes
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum AlphaMode {
    /// No transparency
    #[default]
    Opaque,
    /// Alpha testing with cutoff value
    Mask(f32),
    /// Alpha blending
    Blend,
}

impl AlphaMode {
    /// Cutoff uploaded to shaders; zero unless masked
    pub fn cutoff(self) -> f32 {
        match self {
            AlphaMode::Mask(cutoff) => cutoff,
            _ => 0.0,
        }
    }
}

/// Texture names bound by a material, looked up on the device at draw time
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MaterialTextures {
    pub color: Option<String>,
    pub emissive: Option<String>,
    pub occlusion: Option<String>,
    pub metallic_roughness: Option<String>,
    pub normal: Option<String>,
}

/// Surface description
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    /// Optional name for debugging
    pub name: String,
    pub alpha_mode: AlphaMode,
    /// Disable back-face culling
    pub two_sided: bool,
    /// Base colour multiplied with the colour texture
    pub color: Vec4,
    pub emissive_factor: Vec3,
    pub metallic_factor: f32,
    pub roughness_factor: f32,
    pub textures: MaterialTextures,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            name: String::new(),
            alpha_mode: AlphaMode::Opaque,
            two_sided: false,
            color: Vec4::new(1.0, 1.0, 1.0, 1.0),
            emissive_factor: Vec3::zeros(),
            metallic_factor: 0.0,
            roughness_factor: 1.0,
            textures: MaterialTextures::default(),
        }
    }
}

impl Material {
    /// Opaque material with a flat colour
    pub fn opaque(color: Vec4) -> Self {
        Self {
            color,
            ..Self::default()
        }
    }

    /// Alpha-blended material with a flat colour
    pub fn blended(color: Vec4) -> Self {
        Self {
            color,
            alpha_mode: AlphaMode::Blend,
            ..Self::default()
        }
    }

    /// Set the material name for debugging
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the alpha mode
    pub fn with_alpha_mode(mut self, alpha_mode: AlphaMode) -> Self {
        self.alpha_mode = alpha_mode;
        self
    }

    /// Render both faces
    pub fn with_two_sided(mut self, two_sided: bool) -> Self {
        self.two_sided = two_sided;
        self
    }

    /// Set the emissive factor
    pub fn with_emissive(mut self, emissive: Vec3) -> Self {
        self.emissive_factor = emissive;
        self
    }

    /// Set metallic and roughness factors
    pub fn with_metallic_roughness(mut self, metallic: f32, roughness: f32) -> Self {
        self.metallic_factor = metallic;
        self.roughness_factor = roughness;
        self
    }

    /// Set the texture bindings
    pub fn with_textures(mut self, textures: MaterialTextures) -> Self {
        self.textures = textures;
        self
    }

    /// True for alpha-blended materials
    pub fn is_blended(&self) -> bool {
        self.alpha_mode == AlphaMode::Blend
    }
}
