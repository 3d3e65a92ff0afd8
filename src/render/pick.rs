//! Pointer picking
//!
//! Turns a pixel into a world-space ray through the active camera and tests
//! it against the pickable models under a container node. Scenery and gizmo
//! handles are never candidates, so clicking them cannot change the
//! selection.
//!
//! A hit on any mesh resolves to the model root directly below the container,
//! so a multi-mesh model is selected and moved as a unit.

use super::camera::{CameraController, Viewport};
use crate::scene::{NodeId, Ray, SceneGraph};
use glam::Vec3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PickHit {
    /// Model root directly below the container.
    pub node: NodeId,
    /// Drawable that was actually hit.
    pub surface: NodeId,
    pub distance: f32,
    pub point: Vec3,
}

/// Pick the nearest pickable model under `container` at a pixel.
pub fn pick(
    scene: &SceneGraph,
    camera: &CameraController,
    viewport: Viewport,
    screen_x: f32,
    screen_y: f32,
    container: NodeId,
) -> Option<PickHit> {
    let ray = camera.screen_ray(screen_x, screen_y, viewport);
    pick_ray(scene, &ray, container)
}

pub fn pick_ray(scene: &SceneGraph, ray: &Ray, container: NodeId) -> Option<PickHit> {
    scene
        .children(container)
        .iter()
        .filter(|candidate| scene.node(**candidate).is_some_and(|node| node.pickable))
        .flat_map(|candidate| scene.intersect_ray(*candidate, ray))
        .filter(|hit| scene.node(hit.node).is_some_and(|node| node.pickable))
        .min_by(|a, b| a.distance.total_cmp(&b.distance))
        .and_then(|hit| {
            Some(PickHit {
                node: selectable_root(scene, hit.node, container)?,
                surface: hit.node,
                distance: hit.distance,
                point: hit.point,
            })
        })
}

/// The ancestor of `node` whose parent is `container`.
pub fn selectable_root(scene: &SceneGraph, node: NodeId, container: NodeId) -> Option<NodeId> {
    let mut current = node;
    loop {
        let parent = scene.node(current)?.parent()?;
        if parent == container {
            return Some(current);
        }
        current = parent;
    }
}
