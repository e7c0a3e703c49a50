//! Graphics device implementations
//!
//! The renderer drives any [`GraphicsDevice`](crate::render::api::GraphicsDevice);
//! the headless device here records commands for tests and offline tools.

pub mod headless;
