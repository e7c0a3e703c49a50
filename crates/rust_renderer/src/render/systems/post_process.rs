//! Post-processing chain
//!
//! Fixed order: depth of field, lens (chromatic aberration and distortion),
//! motion blur, antialiasing, tone mapping. Every stage but tone mapping can
//! be toggled; a disabled stage passes its input texture through untouched.
//! Intermediate results go to a small pool of targets, and a stage always
//! writes a target it does not sample.

use crate::foundation::math::{Mat4, Vec2};
use crate::render::api::{
    Framebuffer, FramebufferDesc, GraphicsDevice, RenderTarget, RendererConfig, TextureFormat, TextureId, UniformValue,
};
use crate::render::pipelines::fullscreen;
use crate::render::primitives::Camera;
use crate::render::state::{RenderState, StateScope};
use crate::render::RenderResult;

/// Intermediate targets; depth of field samples two textures while writing a third
const TARGET_COUNT: usize = 3;

/// Inputs of one chain run
pub struct PostProcessInputs<'a> {
    /// Lit HDR image
    pub color: TextureId,
    /// Scene depth, needed by depth of field and motion blur
    pub depth: Option<TextureId>,
    /// Camera of the frame, for depth of field and motion blur
    pub camera: &'a Camera,
    pub config: &'a RendererConfig,
    /// Output size in pixels
    pub size: (u32, u32),
}

/// Post-processing state kept across frames
#[derive(Debug, Default)]
pub struct PostProcessChain {
    targets: Vec<Framebuffer>,
    size: (u32, u32),
    previous_viewprojection: Option<Mat4>,
}

impl PostProcessChain {
    /// Empty chain; targets are allocated on first use
    pub fn new() -> Self {
        Self::default()
    }

    /// View-projection of the last frame, used by motion blur
    pub fn previous_viewprojection(&self) -> Option<Mat4> {
        self.previous_viewprojection
    }

    fn ensure_targets(&mut self, device: &mut dyn GraphicsDevice, width: u32, height: u32) -> RenderResult<()> {
        if self.targets.len() == TARGET_COUNT && self.size == (width, height) {
            return Ok(());
        }
        self.release(device);

        let desc = FramebufferDesc::new(width, height, &[TextureFormat::Rgba16F], false);
        for _ in 0..TARGET_COUNT {
            let framebuffer = device.create_framebuffer(&desc)?;
            self.targets.push(framebuffer);
        }
        self.size = (width, height);
        log::debug!("Post-processing targets created at {width}x{height}");
        Ok(())
    }

    /// Free the intermediate targets
    pub fn release(&mut self, device: &mut dyn GraphicsDevice) {
        for framebuffer in self.targets.drain(..) {
            device.destroy_framebuffer(&framebuffer);
        }
    }

    /// Run the chain and tone map into `output`
    ///
    /// Returns the number of passes drawn. Stages whose program is missing are
    /// skipped like disabled ones.
    pub fn apply(&mut self, device: &mut dyn GraphicsDevice, inputs: &PostProcessInputs<'_>, output: RenderTarget) -> RenderResult<usize> {
        let settings = &inputs.config.post;
        let any_stage = settings.depth_of_field.enabled
            || settings.lens.enabled
            || settings.motion_blur.enabled
            || settings.antialiasing;
        if any_stage {
            self.ensure_targets(device, inputs.size.0, inputs.size.1)?;
        }

        let inv_res = Vec2::new(1.0 / inputs.size.0.max(1) as f32, 1.0 / inputs.size.1.max(1) as f32);
        let viewprojection = inputs.camera.view_projection_matrix();
        let mut current = inputs.color;
        let mut passes = 0;

        if settings.depth_of_field.enabled {
            if let Some((texture, drawn)) = self.depth_of_field(device, current, inputs, inv_res) {
                current = texture;
                passes += drawn;
            }
        }

        if settings.lens.enabled {
            let lens = settings.lens.clone();
            let drawn = self.stage(device, "lens", current, move |device| {
                device.set_uniform("u_aberration", UniformValue::Float(lens.aberration));
                device.set_uniform("u_distortion", UniformValue::Float(lens.distortion));
                device.set_uniform("u_iRes", UniformValue::Vec2(inv_res));
            });
            if let Some(texture) = drawn {
                current = texture;
                passes += 1;
            }
        }

        if settings.motion_blur.enabled {
            match inputs.depth {
                Some(depth) => {
                    let previous = self.previous_viewprojection.unwrap_or(viewprojection);
                    let inverse = inputs.camera.inverse_view_projection_matrix();
                    let strength = settings.motion_blur.strength;
                    let drawn = self.stage(device, "motion_blur", current, move |device| {
                        device.set_uniform("u_depth_texture", UniformValue::Texture { texture: depth, slot: 3 });
                        device.set_uniform("u_inverse_viewprojection", UniformValue::Mat4(inverse));
                        device.set_uniform("u_previous_viewprojection", UniformValue::Mat4(previous));
                        device.set_uniform("u_strength", UniformValue::Float(strength));
                    });
                    if let Some(texture) = drawn {
                        current = texture;
                        passes += 1;
                    }
                }
                None => log::debug!("Motion blur needs scene depth, skipped"),
            }
        }
        self.previous_viewprojection = Some(viewprojection);

        if settings.antialiasing {
            let drawn = self.stage(device, "fxaa", current, move |device| {
                device.set_uniform("u_iRes", UniformValue::Vec2(inv_res));
            });
            if let Some(texture) = drawn {
                current = texture;
                passes += 1;
            }
        }

        if tonemap(device, current, inputs.config, output) {
            passes += 1;
        }
        Ok(passes)
    }

    /// Run a single-input stage reading `source` into a free target
    fn stage(
        &self,
        device: &mut dyn GraphicsDevice,
        program: &str,
        source: TextureId,
        upload: impl FnOnce(&mut dyn GraphicsDevice),
    ) -> Option<TextureId> {
        let destination = self.free_target(&[source])?;
        run_pass(device, program, destination, move |device| {
            device.set_uniform("u_texture", UniformValue::Texture { texture: source, slot: 0 });
            upload(device);
        })
    }

    fn free_target(&self, sampled: &[TextureId]) -> Option<&Framebuffer> {
        self.targets.iter().find(|framebuffer| {
            framebuffer
                .color_texture(0)
                .is_some_and(|texture| !sampled.contains(&texture))
        })
    }

    /// Blur with a halving kernel, then blend sharp and blurred by depth
    fn depth_of_field(
        &self,
        device: &mut dyn GraphicsDevice,
        sharp: TextureId,
        inputs: &PostProcessInputs<'_>,
        inv_res: Vec2,
    ) -> Option<(TextureId, usize)> {
        let settings = &inputs.config.post.depth_of_field;
        let Some(depth) = inputs.depth else {
            log::debug!("Depth of field needs scene depth, skipped");
            return None;
        };

        let mut blurred = sharp;
        let mut kernel = settings.kernel_size;
        let mut drawn = 0;
        for pass in 0..settings.blur_passes {
            let destination = self.free_target(&[sharp, blurred])?;
            let direction = if pass % 2 == 0 { Vec2::new(1.0, 0.0) } else { Vec2::new(0.0, 1.0) };
            let source = blurred;
            let offset = direction.component_mul(&inv_res) * kernel;
            blurred = run_pass(device, "blur", destination, move |device| {
                device.set_uniform("u_texture", UniformValue::Texture { texture: source, slot: 0 });
                device.set_uniform("u_offset", UniformValue::Vec2(offset));
            })?;
            kernel = (kernel * 0.5).max(1.0);
            drawn += 1;
        }

        let destination = self.free_target(&[sharp, blurred])?;
        let (near, far) = (inputs.camera.near(), inputs.camera.far());
        let (focus_near, focus_far) = (settings.focus_near, settings.focus_far);
        let result = run_pass(device, "dof", destination, move |device| {
            device.set_uniform("u_texture", UniformValue::Texture { texture: sharp, slot: 0 });
            device.set_uniform("u_blurred_texture", UniformValue::Texture { texture: blurred, slot: 1 });
            device.set_uniform("u_depth_texture", UniformValue::Texture { texture: depth, slot: 3 });
            device.set_uniform("u_focus_near", UniformValue::Float(focus_near));
            device.set_uniform("u_focus_far", UniformValue::Float(focus_far));
            device.set_uniform("u_camera_nearfar", UniformValue::Vec2(Vec2::new(near, far)));
        })?;
        Some((result, drawn + 1))
    }
}

/// Draw a full-screen pass into `destination`, returning its colour texture
fn run_pass(
    device: &mut dyn GraphicsDevice,
    program: &str,
    destination: &Framebuffer,
    upload: impl FnOnce(&mut dyn GraphicsDevice),
) -> Option<TextureId> {
    let output = destination.color_texture(0)?;
    let mut scope = StateScope::new(device);
    scope.apply(RenderState::fullscreen());
    scope.bind_framebuffer(destination.target());
    if scope.bind_program(program).is_none() {
        log::warn!("Program '{program}' missing, post stage skipped");
        return None;
    }
    upload(&mut *scope);
    fullscreen::draw_quad(&mut *scope);
    Some(output)
}

/// Map `source` to the display range into `output`
pub fn tonemap(device: &mut dyn GraphicsDevice, source: TextureId, config: &RendererConfig, output: RenderTarget) -> bool {
    let mut scope = StateScope::new(device);
    scope.apply(RenderState::fullscreen());
    scope.bind_framebuffer(output);
    if scope.bind_program("tonemapper").is_none() {
        log::warn!("Program 'tonemapper' missing, frame left unresolved");
        return false;
    }

    let tone = &config.post.tone_mapping;
    scope.set_uniform("u_texture", UniformValue::Texture { texture: source, slot: 0 });
    scope.set_uniform("u_exposure", UniformValue::Float(tone.exposure));
    scope.set_uniform("u_white_point", UniformValue::Float(tone.white_point));
    scope.set_uniform("gamma_mode", UniformValue::Int(config.color_space.shader_code()));
    scope.set_uniform("dynamic_range", UniformValue::Int(config.dynamic_range.shader_code()));
    fullscreen::draw_quad(&mut *scope);
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Vec3;
    use crate::render::api::{
        DepthOfFieldSettings, FramebufferId, LensSettings, MotionBlurSettings, PostProcessSettings,
    };
    use crate::render::backends::headless::{DeviceCommand, HeadlessDevice};

    fn all_enabled() -> RendererConfig {
        RendererConfig::default().with_post_process(PostProcessSettings {
            depth_of_field: DepthOfFieldSettings {
                enabled: true,
                ..Default::default()
            },
            lens: LensSettings {
                enabled: true,
                ..Default::default()
            },
            motion_blur: MotionBlurSettings {
                enabled: true,
                ..Default::default()
            },
            antialiasing: true,
            ..Default::default()
        })
    }

    fn inputs<'a>(device: &mut HeadlessDevice, camera: &'a Camera, config: &'a RendererConfig) -> PostProcessInputs<'a> {
        PostProcessInputs {
            color: device.register_texture("lit", 64, 64),
            depth: Some(device.register_texture("depth", 64, 64)),
            camera,
            config,
            size: (64, 64),
        }
    }

    #[test]
    fn test_disabled_stages_equal_direct_tonemap() {
        let camera = Camera::default();
        let config = RendererConfig::default();

        let mut chained = HeadlessDevice::new(64, 64);
        let chain_inputs = inputs(&mut chained, &camera, &config);
        chained.clear_commands();
        let mut chain = PostProcessChain::new();
        assert_eq!(chain.apply(&mut chained, &chain_inputs, RenderTarget::Screen).unwrap(), 1);

        let mut direct = HeadlessDevice::new(64, 64);
        let direct_inputs = inputs(&mut direct, &camera, &config);
        direct.clear_commands();
        assert!(tonemap(&mut direct, direct_inputs.color, &config, RenderTarget::Screen));

        assert_eq!(chained.commands(), direct.commands());
        assert_eq!(chained.live_framebuffers(), 0);
    }

    #[test]
    fn test_all_stages_never_sample_their_target() {
        let camera = Camera::default();
        let config = all_enabled();
        let mut device = HeadlessDevice::new(64, 64);
        let chain_inputs = inputs(&mut device, &camera, &config);
        let mut chain = PostProcessChain::new();

        let passes = chain.apply(&mut device, &chain_inputs, RenderTarget::Screen).unwrap();
        // 4 blur passes, dof blend, lens, motion blur, fxaa, tone mapping
        assert_eq!(passes, 9);

        let written: Vec<(FramebufferId, TextureId)> = chain
            .targets
            .iter()
            .map(|fb| (fb.id, fb.color_texture(0).unwrap()))
            .collect();
        let mut sampled = Vec::new();
        for command in device.commands() {
            match command {
                DeviceCommand::BindProgram(_) => sampled.clear(),
                DeviceCommand::SetUniform { value: UniformValue::Texture { texture, .. }, .. } => sampled.push(*texture),
                DeviceCommand::Draw(draw) => {
                    if let RenderTarget::Framebuffer(id) = draw.target {
                        let (_, own) = written.iter().find(|(fb, _)| *fb == id).unwrap();
                        assert!(!sampled.contains(own), "pass samples its own target");
                    }
                }
                _ => {}
            }
        }

        let last = device.draws().last().cloned().unwrap();
        assert_eq!(last.program.as_deref(), Some("tonemapper"));
        assert_eq!(last.target, RenderTarget::Screen);
    }

    #[test]
    fn test_motion_blur_uses_previous_frame_matrix() {
        let mut camera = Camera::default();
        let config = RendererConfig::default().with_post_process(PostProcessSettings {
            motion_blur: MotionBlurSettings {
                enabled: true,
                strength: 0.5,
            },
            ..Default::default()
        });
        let mut device = HeadlessDevice::new(64, 64);
        let mut chain = PostProcessChain::new();

        let first_vp = camera.view_projection_matrix();
        let frame = inputs(&mut device, &camera, &config);
        chain.apply(&mut device, &frame, RenderTarget::Screen).unwrap();
        assert_eq!(
            device.uniform_of("motion_blur", "u_previous_viewprojection"),
            Some(&UniformValue::Mat4(first_vp))
        );

        camera.look_at(Vec3::new(2.0, 3.0, 3.0), Vec3::zeros(), Vec3::y());
        let frame = inputs(&mut device, &camera, &config);
        chain.apply(&mut device, &frame, RenderTarget::Screen).unwrap();
        assert_eq!(
            device.uniform_of("motion_blur", "u_previous_viewprojection"),
            Some(&UniformValue::Mat4(first_vp))
        );
        assert_eq!(chain.previous_viewprojection(), Some(camera.view_projection_matrix()));
    }

    #[test]
    fn test_missing_stage_program_passes_through() {
        let camera = Camera::default();
        let config = all_enabled();
        let mut device = HeadlessDevice::new(64, 64);
        device.mark_program_missing("lens");
        let chain_inputs = inputs(&mut device, &camera, &config);
        let mut chain = PostProcessChain::new();

        assert_eq!(chain.apply(&mut device, &chain_inputs, RenderTarget::Screen).unwrap(), 8);
        assert!(device.draws_with("lens").is_empty());
    }
}
