//! Light sources
//!
//! Lights are scene entities: position and orientation come from the entity
//! transform, everything else lives here. A light looks down its local -Z
//! axis, which is the direction uploaded to shaders and the direction its
//! shadow camera faces.

use crate::foundation::math::{utils, Mat4, Mat4Ext, Vec3};
use crate::render::systems::shadows::ShadowMap;

/// Light types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightType {
    /// Point light (like a lightbulb)
    Point,
    /// Spot light (like a flashlight)
    Spot,
    /// Directional light (like sunlight)
    Directional,
}

impl LightType {
    /// Integer code uploaded as `u_light_type`
    pub fn shader_code(self) -> i32 {
        match self {
            LightType::Point => 0,
            LightType::Spot => 1,
            LightType::Directional => 2,
        }
    }
}

/// Light source
#[derive(Debug)]
pub struct Light {
    pub light_type: LightType,
    /// Linear RGB colour
    pub color: Vec3,
    /// Multiplier applied to `color`
    pub intensity: f32,
    /// Distance beyond which the light has no influence; also the far plane
    /// of its shadow camera and the radius of its deferred light volume
    pub max_distance: f32,
    /// Spot half-angle in degrees
    pub cone_angle: f32,
    /// Spot falloff exponent
    pub cone_exp: f32,
    /// Width of the orthographic shadow volume of a directional light
    pub area_size: f32,
    /// Point the light is aimed at when placed in a scene
    pub target: Vec3,
    /// Render a shadow map for this light
    pub cast_shadows: bool,
    /// Depth offset against shadow acne
    pub shadow_bias: f32,
    pub(crate) shadow: Option<ShadowMap>,
}

impl Default for Light {
    fn default() -> Self {
        Self {
            light_type: LightType::Point,
            color: Vec3::new(1.0, 1.0, 1.0),
            intensity: 1.0,
            max_distance: 100.0,
            cone_angle: 45.0,
            cone_exp: 30.0,
            area_size: 1000.0,
            target: Vec3::zeros(),
            cast_shadows: false,
            shadow_bias: 0.01,
            shadow: None,
        }
    }
}

impl Light {
    /// Create a point light with default parameters
    pub fn point() -> Self {
        Self::default()
    }

    /// Create a spot light with default parameters
    pub fn spot() -> Self {
        Self {
            light_type: LightType::Spot,
            ..Self::default()
        }
    }

    /// Create a directional light with default parameters
    pub fn directional() -> Self {
        Self {
            light_type: LightType::Directional,
            ..Self::default()
        }
    }

    /// Set colour and intensity
    pub fn with_color(mut self, color: Vec3, intensity: f32) -> Self {
        self.color = color;
        self.intensity = intensity;
        self
    }

    /// Set the influence distance
    pub fn with_max_distance(mut self, max_distance: f32) -> Self {
        self.max_distance = max_distance;
        self
    }

    /// Set spot cone half-angle (degrees) and falloff exponent
    pub fn with_cone(mut self, angle_degrees: f32, exponent: f32) -> Self {
        self.cone_angle = angle_degrees;
        self.cone_exp = exponent;
        self
    }

    /// Set the directional shadow area
    pub fn with_area_size(mut self, area_size: f32) -> Self {
        self.area_size = area_size;
        self
    }

    /// Set the aim point
    pub fn with_target(mut self, target: Vec3) -> Self {
        self.target = target;
        self
    }

    /// Enable shadow casting with the given depth bias
    pub fn with_shadows(mut self, cast_shadows: bool, bias: f32) -> Self {
        self.cast_shadows = cast_shadows;
        self.shadow_bias = bias;
        self
    }

    /// Colour scaled by intensity, as uploaded to shaders
    pub fn radiance(&self) -> Vec3 {
        self.color * self.intensity
    }

    /// Cosine of the cone half-angle
    pub fn cosine_cutoff(&self) -> f32 {
        utils::deg_to_rad(self.cone_angle).cos()
    }

    /// Shadow resources, present while shadow casting is enabled and allocated
    pub fn shadow_map(&self) -> Option<&ShadowMap> {
        self.shadow.as_ref()
    }

    /// True when shaders should sample this light's shadow map
    ///
    /// Point lights keep allocated resources but never render into them.
    pub fn has_usable_shadow(&self) -> bool {
        self.cast_shadows && self.light_type != LightType::Point && self.shadow.is_some()
    }
}

/// A light paired with its entity transform for one frame
#[derive(Debug, Clone, Copy)]
pub struct SceneLight<'a> {
    pub light: &'a Light,
    pub model: Mat4,
}

impl<'a> SceneLight<'a> {
    /// Pair a light with its transform
    pub fn new(light: &'a Light, model: Mat4) -> Self {
        Self { light, model }
    }

    /// World-space position
    pub fn position(&self) -> Vec3 {
        self.model.translation()
    }

    /// Unit direction the light faces
    pub fn direction(&self) -> Vec3 {
        let forward = self.model.rotate_vector(Vec3::new(0.0, 0.0, -1.0));
        forward.try_normalize(1e-12).unwrap_or_else(|| Vec3::new(0.0, 0.0, -1.0))
    }

    /// Light volume transform: translate to the light, scale by its reach
    pub fn volume_model(&self) -> Mat4 {
        Mat4::new_translation(&self.position()) * Mat4::new_scaling(self.light.max_distance)
    }
}
