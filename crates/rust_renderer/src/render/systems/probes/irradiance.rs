//! Irradiance probe grid
//!
//! Probes sit on a regular grid spanning a world-space box. The grid is
//! uploaded as a float texture with one row per probe and one texel per SH
//! coefficient, sampled with nearest filtering so the lighting pass reads
//! exact per-probe values and interpolates between neighbours itself.

use crate::foundation::math::Vec3;
use crate::render::api::{GraphicsDevice, TextureDesc, TextureFilter, TextureFormat, TextureId, UniformValue};
use crate::render::systems::probes::spherical_harmonics::{SphericalHarmonics, SH_COEFFICIENTS};
use crate::render::systems::probes::ProbeError;
use crate::render::RenderResult;

/// One sample point of the grid
#[derive(Debug, Clone, PartialEq)]
pub struct IrradianceProbe {
    /// World position
    pub position: Vec3,
    /// Grid coordinate
    pub local: [u32; 3],
    /// Linear index, `x + y * dims.x + z * dims.x * dims.y`
    pub index: usize,
    /// Baked irradiance, zero until baked
    pub sh: SphericalHarmonics,
}

/// Regular 3D grid of irradiance probes
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeGrid {
    start: Vec3,
    end: Vec3,
    dims: [u32; 3],
    delta: Vec3,
    probes: Vec<IrradianceProbe>,
}

impl ProbeGrid {
    /// Lay out an unbaked grid from `start` to `end` with `dims` probes per axis
    ///
    /// An axis with a single probe places it at `start`.
    pub fn new(start: Vec3, end: Vec3, dims: [u32; 3]) -> Result<Self, ProbeError> {
        if dims.iter().any(|&d| d == 0) {
            return Err(ProbeError::InvalidGrid(format!("zero-sized dimension in {dims:?}")));
        }
        if !(start.iter().all(|v| v.is_finite()) && end.iter().all(|v| v.is_finite())) {
            return Err(ProbeError::InvalidGrid("non-finite bounds".to_string()));
        }
        if (0..3).any(|axis| end[axis] < start[axis]) {
            return Err(ProbeError::InvalidGrid(format!("end {end:?} below start {start:?}")));
        }
        let count = grid_len(dims).ok_or_else(|| ProbeError::InvalidGrid(format!("{dims:?} grid is too large")))?;

        let delta = Vec3::from_fn(|axis, _| {
            let steps = dims[axis].saturating_sub(1);
            if steps == 0 {
                0.0
            } else {
                (end[axis] - start[axis]) / steps as f32
            }
        });

        let mut probes = Vec::with_capacity(count);
        for z in 0..dims[2] {
            for y in 0..dims[1] {
                for x in 0..dims[0] {
                    let local = [x, y, z];
                    probes.push(IrradianceProbe {
                        position: start + delta.component_mul(&Vec3::new(x as f32, y as f32, z as f32)),
                        local,
                        index: linear_index(dims, local),
                        sh: SphericalHarmonics::default(),
                    });
                }
            }
        }

        Ok(Self {
            start,
            end,
            dims,
            delta,
            probes,
        })
    }

    /// Grid with probes read back from storage
    ///
    /// The header fields must agree with the probe list.
    pub fn from_parts(start: Vec3, end: Vec3, dims: [u32; 3], delta: Vec3, probes: Vec<IrradianceProbe>) -> Result<Self, ProbeError> {
        let expected = grid_len(dims).ok_or_else(|| ProbeError::Corrupt(format!("{dims:?} grid overflows")))?;
        if probes.len() != expected {
            return Err(ProbeError::Corrupt(format!("{} probes for a {dims:?} grid", probes.len())));
        }
        if let Some(probe) = probes
            .iter()
            .enumerate()
            .find(|(i, probe)| {
                probe.index != *i || (0..3).any(|axis| probe.local[axis] >= dims[axis]) || linear_index(dims, probe.local) != *i
            })
            .map(|(_, probe)| probe)
        {
            return Err(ProbeError::Corrupt(format!(
                "probe {} has inconsistent coordinate {:?}",
                probe.index, probe.local
            )));
        }

        Ok(Self {
            start,
            end,
            dims,
            delta,
            probes,
        })
    }

    /// Corner of the first probe
    pub fn start(&self) -> Vec3 {
        self.start
    }

    /// Corner of the last probe
    pub fn end(&self) -> Vec3 {
        self.end
    }

    /// Probes per axis
    pub fn dims(&self) -> [u32; 3] {
        self.dims
    }

    /// Spacing between neighbouring probes per axis
    pub fn delta(&self) -> Vec3 {
        self.delta
    }

    /// Probes in linear index order
    pub fn probes(&self) -> &[IrradianceProbe] {
        &self.probes
    }

    pub fn probes_mut(&mut self) -> &mut [IrradianceProbe] {
        &mut self.probes
    }

    pub fn len(&self) -> usize {
        self.probes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.probes.is_empty()
    }

    /// Coefficients packed row per probe, RGB per texel
    pub fn texture_data(&self) -> Vec<f32> {
        self.probes
            .iter()
            .flat_map(|probe| probe.sh.to_floats())
            .flatten()
            .collect()
    }
}

/// Probe count for `dims`, `None` when it does not fit in `usize`
pub(crate) fn grid_len(dims: [u32; 3]) -> Option<usize> {
    dims.iter().try_fold(1usize, |acc, &d| acc.checked_mul(d as usize))
}

fn linear_index(dims: [u32; 3], local: [u32; 3]) -> usize {
    let [dx, dy, _] = dims.map(|d| d as usize);
    let [x, y, z] = local.map(|c| c as usize);
    x + y * dx + z * dx * dy
}

/// Probe grid resident on the device
#[derive(Debug)]
pub struct IrradianceVolume {
    grid: ProbeGrid,
    texture: TextureId,
}

impl IrradianceVolume {
    /// Upload `grid` as a 9 x N nearest-filtered float texture
    pub fn upload(device: &mut dyn GraphicsDevice, grid: ProbeGrid) -> RenderResult<Self> {
        let desc = TextureDesc::texture_2d(SH_COEFFICIENTS as u32, grid.len() as u32, TextureFormat::Rgb32F)
            .with_filter(TextureFilter::Nearest);
        let texture = device.create_texture(&desc, Some(&grid.texture_data()))?;
        log::info!("Uploaded irradiance volume with {} probes", grid.len());
        Ok(Self { grid, texture })
    }

    pub fn grid(&self) -> &ProbeGrid {
        &self.grid
    }

    /// Device texture holding the coefficients
    pub fn texture(&self) -> TextureId {
        self.texture
    }

    /// Bind the probe texture and grid layout to the current program
    pub fn upload_uniforms(&self, device: &mut dyn GraphicsDevice, slot: u32) {
        let dims = self.grid.dims();
        device.set_uniform("u_probes_texture", UniformValue::Texture { texture: self.texture, slot });
        device.set_uniform("u_irr_start", UniformValue::Vec3(self.grid.start()));
        device.set_uniform("u_irr_end", UniformValue::Vec3(self.grid.end()));
        device.set_uniform(
            "u_irr_dims",
            UniformValue::Vec3(Vec3::new(dims[0] as f32, dims[1] as f32, dims[2] as f32)),
        );
        device.set_uniform("u_irr_delta", UniformValue::Vec3(self.grid.delta()));
        device.set_uniform("u_num_probes", UniformValue::Int(self.grid.len() as i32));
    }

    /// Free the probe texture
    pub fn release(self, device: &mut dyn GraphicsDevice) -> ProbeGrid {
        device.destroy_texture(self.texture);
        self.grid
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::backends::headless::HeadlessDevice;
    use approx::assert_relative_eq;

    #[test]
    fn test_grid_layout() {
        let grid = ProbeGrid::new(Vec3::new(-80.0, 0.0, -90.0), Vec3::new(80.0, 80.0, 90.0), [8, 6, 12]).unwrap();

        assert_eq!(grid.len(), 8 * 6 * 12);
        assert_relative_eq!(grid.delta(), Vec3::new(160.0 / 7.0, 16.0, 180.0 / 11.0), epsilon = 1e-4);

        let probe = &grid.probes()[1 + 2 * 8 + 3 * 48];
        assert_eq!(probe.local, [1, 2, 3]);
        assert_relative_eq!(probe.position, Vec3::new(-80.0 + 160.0 / 7.0, 32.0, -90.0 + 3.0 * 180.0 / 11.0), epsilon = 1e-3);
        assert_relative_eq!(grid.probes().last().unwrap().position, grid.end(), epsilon = 1e-3);
    }

    #[test]
    fn test_invalid_grids_rejected() {
        assert!(matches!(
            ProbeGrid::new(Vec3::zeros(), Vec3::repeat(1.0), [2, 0, 2]),
            Err(ProbeError::InvalidGrid(_))
        ));
        assert!(matches!(
            ProbeGrid::new(Vec3::repeat(1.0), Vec3::zeros(), [2, 2, 2]),
            Err(ProbeError::InvalidGrid(_))
        ));
        let single = ProbeGrid::new(Vec3::repeat(3.0), Vec3::repeat(3.0), [1, 1, 1]).unwrap();
        assert_eq!(single.delta(), Vec3::zeros());
    }

    #[test]
    fn test_oversized_dims_rejected_without_overflow() {
        let dims = [u32::MAX; 3];
        assert_eq!(grid_len(dims), None);
        assert_eq!(grid_len([2, 3, 4]), Some(24));
        assert!(matches!(
            ProbeGrid::new(Vec3::zeros(), Vec3::repeat(1.0), dims),
            Err(ProbeError::InvalidGrid(_))
        ));

        let probe = IrradianceProbe {
            position: Vec3::zeros(),
            local: [0, 0, 0],
            index: 0,
            sh: SphericalHarmonics::default(),
        };
        assert!(matches!(
            ProbeGrid::from_parts(Vec3::zeros(), Vec3::zeros(), dims, Vec3::zeros(), vec![probe.clone()]),
            Err(ProbeError::Corrupt(_))
        ));

        let stray = IrradianceProbe { local: [0, u32::MAX, 0], ..probe };
        assert!(matches!(
            ProbeGrid::from_parts(Vec3::zeros(), Vec3::zeros(), [1, 1, 1], Vec3::zeros(), vec![stray]),
            Err(ProbeError::Corrupt(_))
        ));
    }

    #[test]
    fn test_volume_texture_is_nine_texels_per_probe() {
        let mut grid = ProbeGrid::new(Vec3::repeat(-1.0), Vec3::repeat(1.0), [2, 2, 2]).unwrap();
        grid.probes_mut()[3].sh.coeffs[4] = Vec3::new(1.0, 2.0, 3.0);

        let mut device = HeadlessDevice::new(8, 8);
        let volume = IrradianceVolume::upload(&mut device, grid).unwrap();
        let desc = device.texture_desc(volume.texture()).unwrap().clone();
        assert_eq!((desc.width, desc.height), (9, 8));
        assert_eq!(desc.filter, TextureFilter::Nearest);

        let data = device.texture_data(volume.texture()).unwrap();
        let offset = (3 * 9 + 4) * 3;
        assert_eq!(&data[offset..offset + 3], &[1.0, 2.0, 3.0]);

        volume.release(&mut device);
        assert_eq!(device.live_textures(), 1);
    }
}
