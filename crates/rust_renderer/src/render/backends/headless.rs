//! Headless recording device
//!
//! Implements [`GraphicsDevice`] without a GPU. Every call is recorded as a
//! [`DeviceCommand`], live textures and framebuffers are tracked, uniforms are
//! kept per program, and read-backs return the colour a framebuffer was last
//! cleared to. Programs and textures can be marked missing to exercise the
//! renderer's skip paths.

use std::collections::{HashMap, HashSet};

use image::{Rgb, Rgb32FImage};

use crate::foundation::math::Vec4;
use crate::render::api::{
    BackendResult, BuiltinMesh, CubeFace, Framebuffer, FramebufferDesc, FramebufferId, GpuMeshId, GraphicsDevice,
    ProgramId, RenderTarget, TextureDesc, TextureFormat, TextureId, TextureKind, UniformValue,
};
use crate::render::state::{ClearFlags, RenderState};
use crate::render::RenderError;

/// A draw as seen by the device
#[derive(Debug, Clone, PartialEq)]
pub struct DrawRecord {
    /// Program bound at draw time
    pub program: Option<String>,
    pub mesh: GpuMeshId,
    pub target: RenderTarget,
    pub state: RenderState,
}

/// One recorded device call
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceCommand {
    SetViewport { x: i32, y: i32, width: u32, height: u32 },
    CreateTexture(TextureId),
    DestroyTexture(TextureId),
    GenerateMipmaps(TextureId),
    CreateFramebuffer(FramebufferId),
    DestroyFramebuffer(FramebufferId),
    AttachCubemapFace { framebuffer: FramebufferId, cubemap: TextureId, face: CubeFace, mip_level: u32 },
    BindFramebuffer(RenderTarget),
    Clear { target: RenderTarget, flags: ClearFlags, color: Vec4 },
    CopyDepth { source: FramebufferId, destination: RenderTarget },
    CopyTexture { source: TextureId, destination: TextureId },
    ReadPixels(FramebufferId),
    SetRenderState(RenderState),
    BindProgram(String),
    SetUniform { name: String, value: UniformValue },
    Draw(DrawRecord),
}

#[derive(Debug)]
struct TextureRecord {
    desc: TextureDesc,
    data: Option<Vec<f32>>,
}

/// Graphics device that records instead of rendering
#[derive(Debug)]
pub struct HeadlessDevice {
    size: (u32, u32),
    next_id: u64,
    textures: HashMap<TextureId, TextureRecord>,
    framebuffers: HashMap<FramebufferId, Framebuffer>,
    clear_colors: HashMap<RenderTarget, Vec4>,
    bound: RenderTarget,
    state: RenderState,
    program: Option<String>,
    program_ids: HashMap<String, ProgramId>,
    missing_programs: HashSet<String>,
    named_textures: HashMap<String, TextureId>,
    uniforms: HashMap<String, HashMap<String, UniformValue>>,
    white: TextureId,
    fail_allocations: bool,
    commands: Vec<DeviceCommand>,
}

impl HeadlessDevice {
    /// Create a device with a `width` x `height` screen
    pub fn new(width: u32, height: u32) -> Self {
        let mut device = Self {
            size: (width, height),
            next_id: 100,
            textures: HashMap::new(),
            framebuffers: HashMap::new(),
            clear_colors: HashMap::new(),
            bound: RenderTarget::Screen,
            state: RenderState::default(),
            program: None,
            program_ids: HashMap::new(),
            missing_programs: HashSet::new(),
            named_textures: HashMap::new(),
            uniforms: HashMap::new(),
            white: TextureId(0),
            fail_allocations: false,
            commands: Vec::new(),
        };
        let white = device.allocate_id();
        device.textures.insert(
            TextureId(white),
            TextureRecord {
                desc: TextureDesc::texture_2d(1, 1, TextureFormat::Rgba8),
                data: Some(vec![1.0; 4]),
            },
        );
        device.white = TextureId(white);
        device
    }

    fn allocate_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    /// Change the screen size, as a window resize would
    pub fn resize(&mut self, width: u32, height: u32) {
        self.size = (width, height);
    }

    /// Make `bind_program(name)` fail
    pub fn mark_program_missing(&mut self, name: &str) {
        self.missing_programs.insert(name.to_string());
    }

    /// Register a named texture, as a texture loader would
    pub fn register_texture(&mut self, name: &str, width: u32, height: u32) -> TextureId {
        let id = TextureId(self.allocate_id());
        self.textures.insert(
            id,
            TextureRecord {
                desc: TextureDesc::texture_2d(width, height, TextureFormat::Rgba8),
                data: None,
            },
        );
        self.named_textures.insert(name.to_string(), id);
        id
    }

    /// Make every subsequent texture or framebuffer allocation fail
    pub fn fail_allocations(&mut self, fail: bool) {
        self.fail_allocations = fail;
    }

    /// Everything recorded so far
    pub fn commands(&self) -> &[DeviceCommand] {
        &self.commands
    }

    /// Forget recorded commands, keeping resources and state
    pub fn clear_commands(&mut self) {
        self.commands.clear();
    }

    /// Recorded draws in submission order
    pub fn draws(&self) -> Vec<&DrawRecord> {
        self.commands
            .iter()
            .filter_map(|command| match command {
                DeviceCommand::Draw(draw) => Some(draw),
                _ => None,
            })
            .collect()
    }

    /// Recorded draws issued with `program`
    pub fn draws_with(&self, program: &str) -> Vec<&DrawRecord> {
        self.draws()
            .into_iter()
            .filter(|draw| draw.program.as_deref() == Some(program))
            .collect()
    }

    /// Last value set for `name` on the bound program
    pub fn uniform(&self, name: &str) -> Option<&UniformValue> {
        let program = self.program.as_ref()?;
        self.uniform_of(program, name)
    }

    /// Last value set for `name` on `program`
    pub fn uniform_of(&self, program: &str, name: &str) -> Option<&UniformValue> {
        self.uniforms.get(program)?.get(name)
    }

    /// Number of textures alive, including the white texture
    pub fn live_textures(&self) -> usize {
        self.textures.len()
    }

    /// Number of framebuffers alive
    pub fn live_framebuffers(&self) -> usize {
        self.framebuffers.len()
    }

    /// Description of a live texture
    pub fn texture_desc(&self, texture: TextureId) -> Option<&TextureDesc> {
        self.textures.get(&texture).map(|record| &record.desc)
    }

    /// Initial data a texture was created with
    pub fn texture_data(&self, texture: TextureId) -> Option<&[f32]> {
        self.textures.get(&texture)?.data.as_deref()
    }

    fn check_allocation(&self, what: &str) -> BackendResult<()> {
        if self.fail_allocations {
            Err(RenderError::ResourceCreationFailed(format!("{what} allocation refused")))
        } else {
            Ok(())
        }
    }
}

impl GraphicsDevice for HeadlessDevice {
    fn viewport_size(&self) -> (u32, u32) {
        self.size
    }

    fn set_viewport(&mut self, x: i32, y: i32, width: u32, height: u32) {
        self.commands.push(DeviceCommand::SetViewport { x, y, width, height });
    }

    fn create_texture(&mut self, desc: &TextureDesc, data: Option<&[f32]>) -> BackendResult<TextureId> {
        self.check_allocation("texture")?;
        if let Some(data) = data {
            let faces = if desc.kind == TextureKind::Cubemap { 6 } else { 1 };
            let expected = desc.width as usize * desc.height as usize * desc.components() * faces;
            if data.len() != expected {
                return Err(RenderError::ResourceCreationFailed(format!(
                    "texture data has {} floats, expected {expected}",
                    data.len()
                )));
            }
        }

        let id = TextureId(self.allocate_id());
        self.textures.insert(
            id,
            TextureRecord {
                desc: desc.clone(),
                data: data.map(<[f32]>::to_vec),
            },
        );
        self.commands.push(DeviceCommand::CreateTexture(id));
        Ok(id)
    }

    fn destroy_texture(&mut self, texture: TextureId) {
        self.textures.remove(&texture);
        self.commands.push(DeviceCommand::DestroyTexture(texture));
    }

    fn generate_mipmaps(&mut self, texture: TextureId) {
        self.commands.push(DeviceCommand::GenerateMipmaps(texture));
    }

    fn create_framebuffer(&mut self, desc: &FramebufferDesc) -> BackendResult<Framebuffer> {
        self.check_allocation("framebuffer")?;

        let mut color_textures = Vec::with_capacity(desc.color_formats.len());
        for format in &desc.color_formats {
            color_textures.push(self.create_texture(&TextureDesc::texture_2d(desc.width, desc.height, *format), None)?);
        }
        let depth_texture = if desc.depth {
            Some(self.create_texture(&TextureDesc::texture_2d(desc.width, desc.height, TextureFormat::Depth24), None)?)
        } else {
            None
        };

        let framebuffer = Framebuffer {
            id: FramebufferId(self.allocate_id()),
            width: desc.width,
            height: desc.height,
            color_textures,
            depth_texture,
        };
        self.framebuffers.insert(framebuffer.id, framebuffer.clone());
        self.commands.push(DeviceCommand::CreateFramebuffer(framebuffer.id));
        Ok(framebuffer)
    }

    fn destroy_framebuffer(&mut self, framebuffer: &Framebuffer) {
        for texture in framebuffer.color_textures.iter().chain(framebuffer.depth_texture.iter()) {
            self.textures.remove(texture);
        }
        self.framebuffers.remove(&framebuffer.id);
        self.clear_colors.remove(&framebuffer.target());
        self.commands.push(DeviceCommand::DestroyFramebuffer(framebuffer.id));
    }

    fn attach_cubemap_face(&mut self, framebuffer: FramebufferId, cubemap: TextureId, face: CubeFace, mip_level: u32) {
        self.commands.push(DeviceCommand::AttachCubemapFace {
            framebuffer,
            cubemap,
            face,
            mip_level,
        });
    }

    fn bind_framebuffer(&mut self, target: RenderTarget) {
        self.bound = target;
        self.commands.push(DeviceCommand::BindFramebuffer(target));
    }

    fn bound_framebuffer(&self) -> RenderTarget {
        self.bound
    }

    fn clear(&mut self, flags: ClearFlags, color: Vec4) {
        if flags.contains(ClearFlags::COLOR) {
            self.clear_colors.insert(self.bound, color);
        }
        self.commands.push(DeviceCommand::Clear {
            target: self.bound,
            flags,
            color,
        });
    }

    fn copy_depth(&mut self, source: FramebufferId, destination: RenderTarget) {
        self.commands.push(DeviceCommand::CopyDepth { source, destination });
    }

    fn copy_texture(&mut self, source: TextureId, destination: TextureId) {
        self.commands.push(DeviceCommand::CopyTexture { source, destination });
    }

    fn read_pixels(&mut self, framebuffer: FramebufferId) -> BackendResult<Rgb32FImage> {
        let fbo = self
            .framebuffers
            .get(&framebuffer)
            .ok_or_else(|| RenderError::BackendError(format!("unknown framebuffer {framebuffer:?}")))?;
        let color = self
            .clear_colors
            .get(&RenderTarget::Framebuffer(framebuffer))
            .copied()
            .unwrap_or_else(Vec4::zeros);
        let image = Rgb32FImage::from_pixel(fbo.width, fbo.height, Rgb([color.x, color.y, color.z]));
        self.commands.push(DeviceCommand::ReadPixels(framebuffer));
        Ok(image)
    }

    fn render_state(&self) -> RenderState {
        self.state
    }

    fn set_render_state(&mut self, state: &RenderState) {
        self.state = *state;
        self.commands.push(DeviceCommand::SetRenderState(*state));
    }

    fn bind_program(&mut self, name: &str) -> Option<ProgramId> {
        if self.missing_programs.contains(name) {
            return None;
        }
        let next = ProgramId(self.next_id + 1);
        let id = *self.program_ids.entry(name.to_string()).or_insert(next);
        if id == next {
            self.next_id += 1;
        }
        self.program = Some(name.to_string());
        self.commands.push(DeviceCommand::BindProgram(name.to_string()));
        Some(id)
    }

    fn set_uniform(&mut self, name: &str, value: UniformValue) {
        if let Some(program) = &self.program {
            self.uniforms
                .entry(program.clone())
                .or_default()
                .insert(name.to_string(), value.clone());
        }
        self.commands.push(DeviceCommand::SetUniform {
            name: name.to_string(),
            value,
        });
    }

    fn texture(&self, name: &str) -> Option<TextureId> {
        self.named_textures.get(name).copied()
    }

    fn white_texture(&self) -> TextureId {
        self.white
    }

    fn builtin_mesh(&self, mesh: BuiltinMesh) -> GpuMeshId {
        match mesh {
            BuiltinMesh::Quad => GpuMeshId(1),
            BuiltinMesh::Sphere => GpuMeshId(2),
            BuiltinMesh::Cube => GpuMeshId(3),
        }
    }

    fn draw_mesh(&mut self, mesh: GpuMeshId) {
        self.commands.push(DeviceCommand::Draw(DrawRecord {
            program: self.program.clone(),
            mesh,
            target: self.bound,
            state: self.state,
        }));
    }
}
