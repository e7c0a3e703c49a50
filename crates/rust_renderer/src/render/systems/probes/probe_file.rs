//! Irradiance probe persistence
//!
//! Binary layout, little-endian, no version field:
//!
//! | field       | type        |
//! |-------------|-------------|
//! | start       | `[f32; 3]`  |
//! | end         | `[f32; 3]`  |
//! | dims        | `[u32; 3]`  |
//! | delta       | `[f32; 3]`  |
//! | probe count | `u32`       |
//!
//! followed by `probe count` records of position `[f32; 3]`, grid coordinate
//! `[u32; 3]`, linear index `u32` and nine RGB coefficients `[[f32; 3]; 9]`.
//! Changing the layout requires a rebake.

use std::fs;
use std::io::ErrorKind;
use std::mem::size_of;
use std::path::Path;

use bytemuck::{Pod, Zeroable};

use crate::foundation::math::Vec3;
use crate::render::systems::probes::spherical_harmonics::{SphericalHarmonics, SH_COEFFICIENTS};
use crate::render::systems::probes::irradiance::grid_len;
use crate::render::systems::probes::{IrradianceProbe, ProbeError, ProbeGrid};

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct FileHeader {
    start: [f32; 3],
    end: [f32; 3],
    dims: [u32; 3],
    delta: [f32; 3],
    num_probes: u32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct ProbeRecord {
    position: [f32; 3],
    local: [u32; 3],
    index: u32,
    sh: [[f32; 3]; SH_COEFFICIENTS],
}

const HEADER_SIZE: usize = size_of::<FileHeader>();
const RECORD_SIZE: usize = size_of::<ProbeRecord>();

fn to_array(v: Vec3) -> [f32; 3] {
    [v.x, v.y, v.z]
}

/// Write `grid` to `path`, replacing any existing file
pub fn save_probe_file(path: impl AsRef<Path>, grid: &ProbeGrid) -> Result<(), ProbeError> {
    let path = path.as_ref();
    let header = FileHeader {
        start: to_array(grid.start()),
        end: to_array(grid.end()),
        dims: grid.dims(),
        delta: to_array(grid.delta()),
        num_probes: grid.len() as u32,
    };

    let mut bytes = Vec::with_capacity(HEADER_SIZE + RECORD_SIZE * grid.len());
    bytes.extend_from_slice(bytemuck::bytes_of(&header));
    for probe in grid.probes() {
        let record = ProbeRecord {
            position: to_array(probe.position),
            local: probe.local,
            index: probe.index as u32,
            sh: probe.sh.to_floats(),
        };
        bytes.extend_from_slice(bytemuck::bytes_of(&record));
    }

    fs::write(path, bytes)?;
    log::info!("Saved {} irradiance probes to {}", grid.len(), path.display());
    Ok(())
}

/// Read a grid written by [`save_probe_file`]
///
/// A missing file is `Ok(None)`. Short files are [`ProbeError::Truncated`];
/// files whose header disagrees with their contents are [`ProbeError::Corrupt`].
pub fn load_probe_file(path: impl AsRef<Path>) -> Result<Option<ProbeGrid>, ProbeError> {
    let path = path.as_ref();
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            log::debug!("No irradiance file at {}", path.display());
            return Ok(None);
        }
        Err(err) => return Err(err.into()),
    };

    if bytes.len() < HEADER_SIZE {
        return Err(ProbeError::Truncated {
            expected: HEADER_SIZE,
            found: bytes.len(),
        });
    }
    let header: FileHeader = bytemuck::pod_read_unaligned(&bytes[..HEADER_SIZE]);

    let probe_count = header.num_probes as usize;
    let grid_count = grid_len(header.dims)
        .ok_or_else(|| ProbeError::Corrupt(format!("{:?} grid overflows", header.dims)))?;
    if probe_count != grid_count {
        return Err(ProbeError::Corrupt(format!(
            "header claims {probe_count} probes for a {:?} grid",
            header.dims
        )));
    }

    let expected = probe_count
        .checked_mul(RECORD_SIZE)
        .and_then(|body| body.checked_add(HEADER_SIZE))
        .ok_or_else(|| ProbeError::Corrupt("probe count overflows".to_string()))?;
    if bytes.len() < expected {
        return Err(ProbeError::Truncated {
            expected,
            found: bytes.len(),
        });
    }
    if bytes.len() > expected {
        return Err(ProbeError::Corrupt(format!(
            "{} trailing bytes after {probe_count} probes",
            bytes.len() - expected
        )));
    }

    let probes = bytes[HEADER_SIZE..]
        .chunks_exact(RECORD_SIZE)
        .map(|chunk| {
            let record: ProbeRecord = bytemuck::pod_read_unaligned(chunk);
            IrradianceProbe {
                position: Vec3::from(record.position),
                local: record.local,
                index: record.index as usize,
                sh: SphericalHarmonics::from_floats(&record.sh),
            }
        })
        .collect();

    let grid = ProbeGrid::from_parts(
        Vec3::from(header.start),
        Vec3::from(header.end),
        header.dims,
        Vec3::from(header.delta),
        probes,
    )?;
    log::info!("Loaded {} irradiance probes from {}", grid.len(), path.display());
    Ok(Some(grid))
}
