//! # Render Queue System
//!
//! Collects the frame's draw requests and orders them for submission.
//!
//! ## Architecture
//!
//! - **RenderQueue**: flat list of every visible drawable for one frame,
//!   cleared and rebuilt by the collector each frame
//! - **RenderCall**: one mesh/material instance with its world transform,
//!   world-space bounds and camera distance
//! - **SortPolicy**: how the list is ordered
//!
//! ## Ordering contract
//!
//! After [`RenderQueue::sort`] every opaque call precedes every blended call,
//! opaque calls run front-to-back and blended calls run back-to-front. Both
//! policies honour the contract for scenes smaller than
//! [`BLEND_DISTANCE_OFFSET`].

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::foundation::math::{Mat4, Mat4Ext, Vec3};
use crate::scene::{MaterialKey, MeshKey};
use crate::spatial::AABB;

/// Added to the camera distance of blended calls so they sort after opaque ones
pub const BLEND_DISTANCE_OFFSET: f32 = 100_000.0;

/// Ordering policy for the render queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum SortPolicy {
    /// Opaque ascending by distance, then blended descending by distance
    #[default]
    Partitioned,
    /// One ascending key for all calls; blended keys are mirrored above the
    /// opaque range so they still draw far-to-near
    SingleKey,
}

/// One drawable instance for one frame
#[derive(Debug, Clone)]
pub struct RenderCall {
    /// Mesh drawn, owned by the scene
    pub mesh: MeshKey,

    /// Material applied, owned by the scene
    pub material: MaterialKey,

    /// Local-to-world transform
    pub model: Mat4,

    /// Mesh bounds in world space
    pub world_bounds: AABB,

    /// Euclidean distance to the camera eye, plus
    /// [`BLEND_DISTANCE_OFFSET`] for blended materials
    pub distance_to_camera: f32,

    /// Material uses alpha blending
    pub blended: bool,
}

impl RenderCall {
    /// Create a call, deriving the camera distance from the model translation
    pub fn new(
        mesh: MeshKey,
        material: MaterialKey,
        model: Mat4,
        world_bounds: AABB,
        camera_eye: Vec3,
        blended: bool,
    ) -> Self {
        let mut distance_to_camera = (model.translation() - camera_eye).norm();
        if blended {
            distance_to_camera += BLEND_DISTANCE_OFFSET;
        }

        Self {
            mesh,
            material,
            model,
            world_bounds,
            distance_to_camera,
            blended,
        }
    }

    /// Distance to the camera without the blending offset
    pub fn camera_distance(&self) -> f32 {
        if self.blended {
            self.distance_to_camera - BLEND_DISTANCE_OFFSET
        } else {
            self.distance_to_camera
        }
    }

    /// World-space position of the instance
    pub fn world_position(&self) -> Vec3 {
        self.model.translation()
    }

    fn single_key(&self) -> f32 {
        if self.blended {
            2.0 * BLEND_DISTANCE_OFFSET - self.camera_distance()
        } else {
            self.distance_to_camera
        }
    }
}

/// Collection of render calls for one frame
#[derive(Debug, Default)]
pub struct RenderQueue {
    calls: Vec<RenderCall>,
    policy: SortPolicy,
}

impl RenderQueue {
    /// Create a new empty render queue
    pub fn new(policy: SortPolicy) -> Self {
        Self {
            calls: Vec::new(),
            policy,
        }
    }

    /// Active ordering policy
    pub fn policy(&self) -> SortPolicy {
        self.policy
    }

    /// Change the ordering policy for subsequent sorts
    pub fn set_policy(&mut self, policy: SortPolicy) {
        self.policy = policy;
    }

    /// Append a call
    pub fn push(&mut self, call: RenderCall) {
        self.calls.push(call);
    }

    /// Order calls according to the policy
    ///
    /// The sort is stable, and `total_cmp` gives a total order even for NaN
    /// distances, so equal keys keep their traversal order.
    pub fn sort(&mut self) {
        match self.policy {
            SortPolicy::Partitioned => self.calls.sort_by(compare_partitioned),
            SortPolicy::SingleKey => self
                .calls
                .sort_by(|a, b| a.single_key().total_cmp(&b.single_key())),
        }
    }

    /// All calls in submission order
    pub fn calls(&self) -> &[RenderCall] {
        &self.calls
    }

    /// Opaque calls, front-to-back once sorted
    pub fn opaque(&self) -> impl Iterator<Item = &RenderCall> {
        self.calls.iter().filter(|call| !call.blended)
    }

    /// Blended calls, back-to-front once sorted
    pub fn blended(&self) -> impl Iterator<Item = &RenderCall> {
        self.calls.iter().filter(|call| call.blended)
    }

    /// Get total number of calls
    pub fn len(&self) -> usize {
        self.calls.len()
    }

    /// Check if queue is empty
    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    /// Clear all calls for next frame
    pub fn clear(&mut self) {
        self.calls.clear();
    }
}

fn compare_partitioned(a: &RenderCall, b: &RenderCall) -> Ordering {
    a.blended.cmp(&b.blended).then_with(|| {
        if a.blended {
            b.distance_to_camera.total_cmp(&a.distance_to_camera)
        } else {
            a.distance_to_camera.total_cmp(&b.distance_to_camera)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, Rng, SeedableRng};
    use slotmap::SlotMap;

    struct Keys {
        mesh: MeshKey,
        material: MaterialKey,
    }

    fn keys() -> Keys {
        let mut meshes: SlotMap<MeshKey, ()> = SlotMap::with_key();
        let mut materials: SlotMap<MaterialKey, ()> = SlotMap::with_key();
        Keys {
            mesh: meshes.insert(()),
            material: materials.insert(()),
        }
    }

    fn call_at(keys: &Keys, position: Vec3, blended: bool) -> RenderCall {
        RenderCall::new(
            keys.mesh,
            keys.material,
            Mat4::new_translation(&position),
            AABB::from_center_extents(position, Vec3::repeat(0.5)),
            Vec3::zeros(),
            blended,
        )
    }

    fn assert_ordering_contract(calls: &[RenderCall]) {
        let first_blended = calls.iter().position(|c| c.blended).unwrap_or(calls.len());
        assert!(calls[first_blended..].iter().all(|c| c.blended), "opaque call after a blended one");

        for pair in calls[..first_blended].windows(2) {
            assert!(pair[0].camera_distance() <= pair[1].camera_distance());
        }
        for pair in calls[first_blended..].windows(2) {
            assert!(pair[0].camera_distance() >= pair[1].camera_distance());
        }
    }

    #[test]
    fn test_render_queue_creation() {
        let queue = RenderQueue::default();
        assert!(queue.is_empty());
        assert_eq!(queue.len(), 0);
        assert_eq!(queue.policy(), SortPolicy::Partitioned);
    }

    #[test]
    fn test_blended_distance_offset() {
        let keys = keys();
        let opaque = call_at(&keys, Vec3::new(3.0, 4.0, 0.0), false);
        let blended = call_at(&keys, Vec3::new(3.0, 4.0, 0.0), true);

        assert_eq!(opaque.distance_to_camera, 5.0);
        assert_eq!(blended.distance_to_camera, 5.0 + BLEND_DISTANCE_OFFSET);
        assert_eq!(blended.camera_distance(), 5.0);
    }

    #[test]
    fn test_command_sorting() {
        let keys = keys();
        let mut queue = RenderQueue::default();
        queue.push(call_at(&keys, Vec3::new(0.0, 0.0, -10.0), false)); // Far
        queue.push(call_at(&keys, Vec3::new(0.0, 0.0, -5.0), false)); // Near
        queue.push(call_at(&keys, Vec3::new(0.0, 0.0, -3.0), true)); // Near
        queue.push(call_at(&keys, Vec3::new(0.0, 0.0, -8.0), true)); // Far

        queue.sort();

        let distances: Vec<f32> = queue.calls().iter().map(RenderCall::camera_distance).collect();
        assert_eq!(distances, vec![5.0, 10.0, 8.0, 3.0]);
        assert_eq!(queue.opaque().count(), 2);
        assert_eq!(queue.blended().count(), 2);
    }

    #[test]
    fn test_sort_empty_and_singleton() {
        let keys = keys();
        let mut queue = RenderQueue::default();
        queue.sort();
        assert!(queue.is_empty());

        queue.push(call_at(&keys, Vec3::new(1.0, 0.0, 0.0), true));
        queue.sort();
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_ordering_contract_holds_for_both_policies() {
        let keys = keys();
        let mut rng = StdRng::seed_from_u64(7);

        for policy in [SortPolicy::Partitioned, SortPolicy::SingleKey] {
            for _ in 0..50 {
                let mut queue = RenderQueue::new(policy);
                let count = rng.gen_range(0..40);
                for _ in 0..count {
                    let position = Vec3::new(
                        rng.gen_range(-500.0..500.0),
                        rng.gen_range(-500.0..500.0),
                        rng.gen_range(-500.0..500.0),
                    );
                    queue.push(call_at(&keys, position, rng.gen_bool(0.3)));
                }
                queue.sort();
                assert_ordering_contract(queue.calls());
            }
        }
    }

    #[test]
    fn test_sort_is_stable_for_equal_distances() {
        let keys = keys();
        let mut queue = RenderQueue::default();
        let mut first = call_at(&keys, Vec3::new(0.0, 0.0, -2.0), false);
        first.model[(0, 0)] = 2.0;
        let second = call_at(&keys, Vec3::new(0.0, 0.0, 2.0), false);
        queue.push(first);
        queue.push(second);

        queue.sort();
        assert_eq!(queue.calls()[0].model[(0, 0)], 2.0);
    }

    #[test]
    fn test_clear_queue() {
        let keys = keys();
        let mut queue = RenderQueue::default();
        queue.push(call_at(&keys, Vec3::zeros(), false));
        assert_eq!(queue.len(), 1);

        queue.clear();
        assert!(queue.is_empty());
    }
}
