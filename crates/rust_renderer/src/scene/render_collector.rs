//! Render-call collection
//!
//! Walks every visible entity once per frame. Prefab trees are flattened into
//! [`RenderCall`]s for the nodes whose world bounds intersect the camera
//! frustum; lights, decals and reflection probes are gathered by index so
//! later stages can reach them in the scene.

use crate::foundation::math::Mat4;
use crate::render::primitives::Camera;
use crate::render::render_queue::{RenderCall, RenderQueue};
use crate::scene::{EntityKind, Node, Scene};
use crate::spatial::Frustum;

/// Per-frame result of scene traversal
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CollectedFrame {
    /// Indices of visible light entities, in scene order
    pub lights: Vec<usize>,
    /// Indices of visible decal entities
    pub decals: Vec<usize>,
    /// Nodes that were drawable but outside the frustum
    pub nodes_culled: usize,
    /// Drawable nodes whose mesh or material key no longer resolves
    pub nodes_missing_resources: usize,
}

/// Rebuild `queue` from the scene as seen by `camera`
///
/// The queue is cleared first; it is not sorted.
pub fn collect_render_calls(scene: &Scene, camera: &Camera, queue: &mut RenderQueue) -> CollectedFrame {
    queue.clear();
    let frustum = camera.frustum();
    let mut frame = CollectedFrame::default();

    for (index, entity) in scene.entities.iter().enumerate() {
        if !entity.visible {
            continue;
        }

        match &entity.kind {
            EntityKind::Light(_) => frame.lights.push(index),
            EntityKind::Decal(_) => frame.decals.push(index),
            EntityKind::Prefab(prefab) => {
                collect_node_tree(scene, &entity.model, &prefab.root, camera, &frustum, queue, &mut frame);
            }
            EntityKind::ReflectionProbe(_) => {}
        }
    }

    log::trace!(
        "Collected {} render calls, {} lights, {} culled",
        queue.len(),
        frame.lights.len(),
        frame.nodes_culled
    );
    frame
}

fn collect_node_tree(
    scene: &Scene,
    prefab_model: &Mat4,
    root: &Node,
    camera: &Camera,
    frustum: &Frustum,
    queue: &mut RenderQueue,
    frame: &mut CollectedFrame,
) {
    // Explicit stack keeps deep hierarchies off the call stack; children are
    // pushed in reverse so emission order matches a pre-order walk
    let mut stack: Vec<(&Node, Mat4)> = vec![(root, *prefab_model)];

    while let Some((node, parent_world)) = stack.pop() {
        if !node.visible {
            continue;
        }

        let world = parent_world * node.model;

        if let (Some(mesh_key), Some(material_key)) = (node.mesh, node.material) {
            match (scene.resources.mesh(mesh_key), scene.resources.material(material_key)) {
                (Some(mesh), Some(material)) => {
                    let world_bounds = mesh.bounds.transformed(&world);
                    if frustum.intersects_aabb(&world_bounds) {
                        queue.push(RenderCall::new(
                            mesh_key,
                            material_key,
                            world,
                            world_bounds,
                            camera.eye,
                            material.is_blended(),
                        ));
                    } else {
                        frame.nodes_culled += 1;
                    }
                }
                _ => {
                    log::warn!("Node '{}' references a missing mesh or material, skipping", node.name);
                    frame.nodes_missing_resources += 1;
                }
            }
        }

        stack.extend(node.children.iter().rev().map(|child| (child, world)));
    }
}
