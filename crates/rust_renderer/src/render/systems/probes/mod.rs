//! Global-illumination probes
//!
//! Irradiance probes sample diffuse lighting on a regular grid and store it
//! as second-order spherical harmonics; reflection probes hold a cubemap of
//! the scene at an authored position for specular reflections.

pub mod irradiance;
pub mod probe_file;
pub mod reflection;
pub mod spherical_harmonics;

pub use irradiance::{IrradianceProbe, IrradianceVolume, ProbeGrid};
pub use probe_file::{load_probe_file, save_probe_file};
pub use reflection::{ReflectionProbe, ReflectionProbes};
pub use spherical_harmonics::SphericalHarmonics;

use thiserror::Error;

/// Irradiance probe errors
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("Probe file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Probe file truncated: expected {expected} bytes, found {found}")]
    Truncated { expected: usize, found: usize },

    #[error("Probe file corrupt: {0}")]
    Corrupt(String),

    #[error("Invalid probe grid: {0}")]
    InvalidGrid(String),
}
