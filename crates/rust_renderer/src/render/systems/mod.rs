//! Rendering systems
//!
//! Stateful subsystems the renderer drives each frame: light upload, shadow
//! maps, global-illumination probes and the post-processing chain.

pub mod lighting;
pub mod post_process;
pub mod probes;
pub mod shadows;
