//! Light parameter upload
//!
//! Two layouts: one light per draw (`*_ml` shadow uniforms, used by
//! multi-pass forward and by the deferred light passes) and fixed-capacity
//! arrays for single-pass shaders.

use crate::foundation::math::{Mat4, Vec3};
use crate::render::api::{GraphicsDevice, UniformValue};
use crate::render::systems::lighting::SceneLight;

/// Lights uploaded by single-pass shading; extra lights are dropped
pub const MAX_SINGLE_PASS_LIGHTS: usize = 5;

/// Texture unit of the shadow map in per-light passes
pub const SHADOW_MAP_SLOT: u32 = 8;

/// First texture unit of the single-pass shadow map array
pub const SINGLE_PASS_SHADOW_SLOT_BASE: u32 = 11;

/// Upload one light's full parameter set
pub fn upload_light(device: &mut dyn GraphicsDevice, scene_light: &SceneLight<'_>) {
    let light = scene_light.light;
    device.set_uniform("u_light_color", UniformValue::Vec3(light.radiance()));
    device.set_uniform("u_light_position", UniformValue::Vec3(scene_light.position()));
    device.set_uniform("u_light_max_distance", UniformValue::Float(light.max_distance));
    device.set_uniform("u_light_type", UniformValue::Int(light.light_type.shader_code()));
    device.set_uniform("u_light_direction", UniformValue::Vec3(scene_light.direction()));
    device.set_uniform("u_light_exp", UniformValue::Float(light.cone_exp));
    device.set_uniform("u_light_cosine_cutoff", UniformValue::Float(light.cosine_cutoff()));

    match light.shadow_map().filter(|_| light.has_usable_shadow()) {
        Some(shadow) => {
            device.set_uniform("u_light_cast_shadows_ml", UniformValue::Int(1));
            if let Some(depth) = shadow.depth_texture() {
                device.set_uniform("u_light_shadowmap_ml", UniformValue::Texture { texture: depth, slot: SHADOW_MAP_SLOT });
            }
            device.set_uniform("u_shadow_viewproj_ml", UniformValue::Mat4(shadow.view_projection()));
            device.set_uniform("u_light_shadowbias_ml", UniformValue::Float(light.shadow_bias));
        }
        None => device.set_uniform("u_light_cast_shadows_ml", UniformValue::Int(0)),
    }
}

/// Upload a black light, used when the scene has no lights at all
pub fn upload_no_light(device: &mut dyn GraphicsDevice) {
    device.set_uniform("u_light_color", UniformValue::Vec3(Vec3::zeros()));
    device.set_uniform("u_light_cast_shadows_ml", UniformValue::Int(0));
}

/// Clear terms that must only be accumulated once per pixel
pub fn zero_once_only_terms(device: &mut dyn GraphicsDevice) {
    device.set_uniform("u_ambient_light", UniformValue::Vec3(Vec3::zeros()));
    device.set_uniform("u_emissive_factor", UniformValue::Vec3(Vec3::zeros()));
}

/// Upload up to [`MAX_SINGLE_PASS_LIGHTS`] lights as uniform arrays
///
/// Returns the number of lights uploaded. Each light with a usable shadow map
/// binds it on its own texture unit.
pub fn upload_lights_single_pass(device: &mut dyn GraphicsDevice, lights: &[SceneLight<'_>]) -> usize {
    let uploaded = &lights[..lights.len().min(MAX_SINGLE_PASS_LIGHTS)];
    if uploaded.len() < lights.len() {
        log::trace!(
            "Single-pass lighting drops {} of {} lights",
            lights.len() - uploaded.len(),
            lights.len()
        );
    }

    let mut positions = Vec::with_capacity(uploaded.len());
    let mut colors = Vec::with_capacity(uploaded.len());
    let mut directions = Vec::with_capacity(uploaded.len());
    let mut types = Vec::with_capacity(uploaded.len());
    let mut max_distances = Vec::with_capacity(uploaded.len());
    let mut exponents = Vec::with_capacity(uploaded.len());
    let mut cutoffs = Vec::with_capacity(uploaded.len());
    let mut cast_shadows = Vec::with_capacity(uploaded.len());
    let mut shadow_viewprojs = Vec::with_capacity(uploaded.len());
    let mut shadow_biases = Vec::with_capacity(uploaded.len());

    for (index, scene_light) in uploaded.iter().enumerate() {
        let light = scene_light.light;
        positions.push(scene_light.position());
        colors.push(light.radiance());
        directions.push(scene_light.direction());
        types.push(light.light_type.shader_code());
        max_distances.push(light.max_distance);
        exponents.push(light.cone_exp);
        cutoffs.push(light.cosine_cutoff());

        match light.shadow_map().filter(|_| light.has_usable_shadow()) {
            Some(shadow) => {
                cast_shadows.push(1);
                shadow_viewprojs.push(shadow.view_projection());
                shadow_biases.push(light.shadow_bias);
                if let Some(depth) = shadow.depth_texture() {
                    device.set_uniform(
                        &format!("u_light_shadowmap[{index}]"),
                        UniformValue::Texture {
                            texture: depth,
                            slot: SINGLE_PASS_SHADOW_SLOT_BASE + index as u32,
                        },
                    );
                }
            }
            None => {
                cast_shadows.push(0);
                shadow_viewprojs.push(Mat4::identity());
                shadow_biases.push(0.0);
            }
        }
    }

    device.set_uniform("u_num_lights", UniformValue::Int(uploaded.len() as i32));
    device.set_uniform("u_light_position", UniformValue::Vec3Array(positions));
    device.set_uniform("u_light_color", UniformValue::Vec3Array(colors));
    device.set_uniform("u_light_direction", UniformValue::Vec3Array(directions));
    device.set_uniform("u_light_type", UniformValue::IntArray(types));
    device.set_uniform("u_light_max_distance", UniformValue::FloatArray(max_distances));
    device.set_uniform("u_light_exp", UniformValue::FloatArray(exponents));
    device.set_uniform("u_light_cosine_cutoff", UniformValue::FloatArray(cutoffs));
    device.set_uniform("u_light_cast_shadows", UniformValue::IntArray(cast_shadows));
    device.set_uniform("u_shadow_viewproj", UniformValue::Mat4Array(shadow_viewprojs));
    device.set_uniform("u_light_shadowbias", UniformValue::FloatArray(shadow_biases));

    uploaded.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::backends::headless::HeadlessDevice;
    use crate::render::systems::lighting::Light;

    #[test]
    fn test_single_pass_caps_at_capacity() {
        let mut device = HeadlessDevice::new(64, 64);
        device.bind_program("singlelight");

        let lights: Vec<Light> = (0..8).map(|i| Light::point().with_max_distance(i as f32)).collect();
        let scene_lights: Vec<SceneLight<'_>> = lights
            .iter()
            .map(|light| SceneLight::new(light, Mat4::identity()))
            .collect();

        let uploaded = upload_lights_single_pass(&mut device, &scene_lights);

        assert_eq!(uploaded, MAX_SINGLE_PASS_LIGHTS);
        assert_eq!(device.uniform("u_num_lights"), Some(&UniformValue::Int(5)));
        for name in [
            "u_light_position",
            "u_light_color",
            "u_light_direction",
            "u_light_type",
            "u_light_max_distance",
            "u_light_exp",
            "u_light_cosine_cutoff",
            "u_light_cast_shadows",
            "u_shadow_viewproj",
            "u_light_shadowbias",
        ] {
            assert_eq!(device.uniform(name).map(UniformValue::len), Some(5), "{name}");
        }
        assert_eq!(
            device.uniform("u_light_max_distance"),
            Some(&UniformValue::FloatArray(vec![0.0, 1.0, 2.0, 3.0, 4.0]))
        );
    }

    #[test]
    fn test_single_pass_with_no_lights() {
        let mut device = HeadlessDevice::new(64, 64);
        device.bind_program("singlelight");

        assert_eq!(upload_lights_single_pass(&mut device, &[]), 0);
        assert_eq!(device.uniform("u_num_lights"), Some(&UniformValue::Int(0)));
        assert_eq!(device.uniform("u_light_color").map(UniformValue::len), Some(0));
    }

    #[test]
    fn test_multipass_upload_without_shadow() {
        let mut device = HeadlessDevice::new(64, 64);
        device.bind_program("multilight");

        let light = Light::spot().with_color(Vec3::new(1.0, 0.5, 0.0), 2.0);
        upload_light(&mut device, &SceneLight::new(&light, Mat4::identity()));

        assert_eq!(device.uniform("u_light_color"), Some(&UniformValue::Vec3(Vec3::new(2.0, 1.0, 0.0))));
        assert_eq!(device.uniform("u_light_type"), Some(&UniformValue::Int(1)));
        assert_eq!(device.uniform("u_light_cast_shadows_ml"), Some(&UniformValue::Int(0)));
    }
}
