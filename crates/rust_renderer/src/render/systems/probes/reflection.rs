//! Reflection probes
//!
//! Each probe owns a mipmapped cubemap captured from its position. Surfaces
//! sample the probe nearest to them.

use crate::foundation::math::Vec3;
use crate::render::api::{GraphicsDevice, TextureDesc, TextureFormat, TextureId};
use crate::render::RenderResult;

/// Cubemap captured at a fixed world position
#[derive(Debug, Clone, PartialEq)]
pub struct ReflectionProbe {
    position: Vec3,
    cubemap: Option<TextureId>,
}

impl ReflectionProbe {
    /// Probe at `position` with no cubemap yet
    pub fn new(position: Vec3) -> Self {
        Self { position, cubemap: None }
    }

    /// Capture point in world space
    pub fn position(&self) -> Vec3 {
        self.position
    }

    /// Captured cubemap, once allocated
    pub fn cubemap(&self) -> Option<TextureId> {
        self.cubemap
    }
}

/// The renderer's reflection probes
#[derive(Debug, Default)]
pub struct ReflectionProbes {
    probes: Vec<ReflectionProbe>,
    resolution: u32,
    captured: bool,
}

impl ReflectionProbes {
    /// No probes, nothing captured
    pub fn new() -> Self {
        Self::default()
    }

    /// Match the probe set to the authored `positions` and `resolution`
    ///
    /// Any change drops every cubemap so the next capture starts clean.
    /// Returns true when the probes changed.
    pub fn sync(&mut self, device: &mut dyn GraphicsDevice, positions: &[Vec3], resolution: u32) -> bool {
        let unchanged = self.resolution == resolution
            && self.probes.len() == positions.len()
            && self.probes.iter().zip(positions).all(|(probe, position)| probe.position == *position);
        if unchanged {
            return false;
        }

        self.release(device);
        self.probes = positions.iter().copied().map(ReflectionProbe::new).collect();
        self.resolution = resolution;
        log::debug!("Reflection probes reset: {} at {resolution}px", self.probes.len());
        true
    }

    /// Allocate the cubemaps that do not exist yet
    pub fn ensure_cubemaps(&mut self, device: &mut dyn GraphicsDevice) -> RenderResult<()> {
        let desc = TextureDesc::cubemap(self.resolution, TextureFormat::Rgba16F).with_mipmaps(true);
        for probe in self.probes.iter_mut().filter(|probe| probe.cubemap.is_none()) {
            probe.cubemap = Some(device.create_texture(&desc, None)?);
        }
        Ok(())
    }

    /// Probe closest to `position`, by linear scan
    pub fn nearest(&self, position: Vec3) -> Option<&ReflectionProbe> {
        self.probes.iter().min_by(|a, b| {
            let da = (a.position - position).norm_squared();
            let db = (b.position - position).norm_squared();
            da.total_cmp(&db)
        })
    }

    /// Whether every probe has been captured since the last reset
    pub fn is_captured(&self) -> bool {
        self.captured
    }

    pub(crate) fn mark_captured(&mut self) {
        self.captured = true;
    }

    /// Cubemap face size in pixels
    pub fn resolution(&self) -> u32 {
        self.resolution
    }

    pub fn iter(&self) -> impl Iterator<Item = &ReflectionProbe> {
        self.probes.iter()
    }

    pub fn len(&self) -> usize {
        self.probes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.probes.is_empty()
    }

    /// Free every cubemap
    pub fn release(&mut self, device: &mut dyn GraphicsDevice) {
        for probe in &mut self.probes {
            if let Some(cubemap) = probe.cubemap.take() {
                device.destroy_texture(cubemap);
            }
        }
        self.captured = false;
    }
}
