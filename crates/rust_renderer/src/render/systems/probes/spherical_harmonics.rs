//! Second-order spherical harmonics
//!
//! Nine RGB coefficients per probe, projected from six cubemap face captures.
//! Texel directions are built from the capture camera's basis, so any face
//! ordering works as long as each image comes with the forward and up vectors
//! it was rendered with.

use std::f32::consts::PI;

use image::Rgb32FImage;

use crate::foundation::math::Vec3;

/// Number of coefficients in a second-order expansion
pub const SH_COEFFICIENTS: usize = 9;

const Y00: f32 = 0.282_095;
const Y1: f32 = 0.488_603;
const Y2_CROSS: f32 = 1.092_548;
const Y20: f32 = 0.315_392;
const Y22: f32 = 0.546_274;

/// Real SH basis evaluated in `direction` (assumed normalized)
pub fn basis(direction: Vec3) -> [f32; SH_COEFFICIENTS] {
    let (x, y, z) = (direction.x, direction.y, direction.z);
    [
        Y00,
        Y1 * y,
        Y1 * z,
        Y1 * x,
        Y2_CROSS * x * y,
        Y2_CROSS * y * z,
        Y20 * (3.0 * z * z - 1.0),
        Y2_CROSS * x * z,
        Y22 * (x * x - y * y),
    ]
}

/// RGB spherical-harmonic coefficients
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SphericalHarmonics {
    pub coeffs: [Vec3; SH_COEFFICIENTS],
}

impl Default for SphericalHarmonics {
    fn default() -> Self {
        Self {
            coeffs: [Vec3::zeros(); SH_COEFFICIENTS],
        }
    }
}

/// One rendered cube face with the orientation it was captured with
pub struct FaceCapture<'a> {
    pub image: &'a Rgb32FImage,
    pub forward: Vec3,
    pub up: Vec3,
}

impl SphericalHarmonics {
    /// Project six 90 degree captures onto the SH basis
    ///
    /// Each texel is weighted by the solid angle it subtends; weights are
    /// normalized so they sum to 4π over all faces.
    pub fn from_cube_faces(faces: &[FaceCapture<'_>]) -> Self {
        let mut sh = Self::default();
        let mut total_weight = 0.0f32;

        for face in faces {
            let forward = face.forward.normalize();
            let up = face.up.normalize();
            let right = forward.cross(&up);
            let (width, height) = face.image.dimensions();
            if width == 0 || height == 0 {
                continue;
            }

            for (x, y, pixel) in face.image.enumerate_pixels() {
                let u = 2.0 * (x as f32 + 0.5) / width as f32 - 1.0;
                let v = 1.0 - 2.0 * (y as f32 + 0.5) / height as f32;
                let weight = 4.0 / ((1.0 + u * u + v * v).powf(1.5) * (width * height) as f32);
                let direction = (forward + right * u + up * v).normalize();
                let color = Vec3::new(pixel[0], pixel[1], pixel[2]);

                for (coeff, basis) in sh.coeffs.iter_mut().zip(basis(direction)) {
                    *coeff += color * (basis * weight);
                }
                total_weight += weight;
            }
        }

        if total_weight > 0.0 {
            let normalization = 4.0 * PI / total_weight;
            for coeff in &mut sh.coeffs {
                *coeff *= normalization;
            }
        }
        sh
    }

    /// Reconstructed radiance arriving from `direction`
    pub fn evaluate(&self, direction: Vec3) -> Vec3 {
        let direction = direction.normalize();
        self.coeffs
            .iter()
            .zip(basis(direction))
            .fold(Vec3::zeros(), |sum, (coeff, basis)| sum + coeff * basis)
    }

    /// Coefficients as 27 floats, RGB per coefficient
    pub fn to_floats(&self) -> [[f32; 3]; SH_COEFFICIENTS] {
        self.coeffs.map(|c| [c.x, c.y, c.z])
    }

    /// Build from 27 floats, RGB per coefficient
    pub fn from_floats(values: &[[f32; 3]; SH_COEFFICIENTS]) -> Self {
        Self {
            coeffs: values.map(|[r, g, b]| Vec3::new(r, g, b)),
        }
    }
}
