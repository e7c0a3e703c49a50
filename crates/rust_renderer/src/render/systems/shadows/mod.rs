//! Shadow mapping

pub mod shadow_map;

pub use shadow_map::{
    configure_shadow_camera, generate_shadow_map, shadow_grid_step, sync_shadow_resources, ShadowMap,
    SHADOW_NEAR_PLANE,
};
