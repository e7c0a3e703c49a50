//! Material system

pub mod material;

pub use material::{AlphaMode, Material, MaterialTextures};
