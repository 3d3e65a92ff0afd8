//! Transform gizmo
//!
//! A translate/rotate/scale handle bound to at most one node. The gizmo owns
//! no scene state: the editor feeds it rays in the attached node's parent
//! space and the node's transform, and drains [`GizmoEvent`]s afterwards to
//! toggle camera orbiting and refresh the numeric fields.

use crate::scene::{NodeId, Ray, Transform};
use glam::{Quat, Vec3};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GizmoMode {
    #[default]
    Translate,
    Rotate,
    Scale,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GizmoAxis {
    X,
    Y,
    Z,
    /// Uniform scale handle at the origin.
    Center,
}

impl GizmoAxis {
    fn direction(self) -> Vec3 {
        match self {
            GizmoAxis::X => Vec3::X,
            GizmoAxis::Y => Vec3::Y,
            GizmoAxis::Z => Vec3::Z,
            GizmoAxis::Center => Vec3::ZERO,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GizmoEvent {
    /// A drag started (`true`) or ended (`false`).
    DraggingChanged(bool),
    /// The attached node's transform was changed by a drag.
    ObjectChanged(NodeId),
}

#[derive(Debug, Clone, Copy)]
pub struct GizmoConfig {
    /// Handle length per unit of camera distance.
    pub screen_scale: f32,
    /// Hit tolerance as a fraction of the handle length.
    pub pick_radius: f32,
    /// Lower bound for scale components produced by dragging.
    pub min_scale: f32,
}

impl Default for GizmoConfig {
    fn default() -> Self {
        Self {
            screen_scale: 0.15,
            pick_radius: 0.08,
            min_scale: 0.01,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct DragState {
    axis: GizmoAxis,
    plane_point: Vec3,
    plane_normal: Vec3,
    start_point: Vec3,
    start: Transform,
    size: f32,
}

pub struct TransformGizmo {
    config: GizmoConfig,
    mode: GizmoMode,
    attached: Option<NodeId>,
    drag: Option<DragState>,
    events: Vec<GizmoEvent>,
}

impl TransformGizmo {
    pub fn new(config: GizmoConfig) -> Self {
        Self {
            config,
            mode: GizmoMode::Translate,
            attached: None,
            drag: None,
            events: Vec::new(),
        }
    }

    pub fn mode(&self) -> GizmoMode {
        self.mode
    }

    /// Returns whether the mode changed. Ignored mid-drag.
    pub fn set_mode(&mut self, mode: GizmoMode) -> bool {
        if self.mode == mode || self.drag.is_some() {
            return false;
        }
        self.mode = mode;
        true
    }

    pub fn attached(&self) -> Option<NodeId> {
        self.attached
    }

    /// Returns whether the attachment changed.
    pub fn attach(&mut self, node: NodeId) -> bool {
        if self.attached == Some(node) {
            return false;
        }
        self.cancel_drag();
        self.attached = Some(node);
        true
    }

    /// Returns whether anything was attached.
    pub fn detach(&mut self) -> bool {
        if self.attached.is_none() {
            return false;
        }
        self.cancel_drag();
        self.attached = None;
        true
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    pub fn take_events(&mut self) -> Vec<GizmoEvent> {
        std::mem::take(&mut self.events)
    }

    /// Handle length for a node seen from `viewer`.
    pub fn handle_size(&self, viewer: Vec3, origin: Vec3) -> f32 {
        (viewer.distance(origin) * self.config.screen_scale).max(1e-4)
    }

    /// Handle under the ray for the current mode, if any.
    pub fn hit_test(&self, ray: &Ray, origin: Vec3) -> Option<GizmoAxis> {
        let size = self.handle_size(ray.origin, origin);
        let radius = size * self.config.pick_radius;
        let axes = [GizmoAxis::X, GizmoAxis::Y, GizmoAxis::Z];

        if self.mode == GizmoMode::Scale {
            let to_origin = origin - ray.origin;
            let along = to_origin.dot(ray.direction);
            if along > 0.0 && ray.at(along).distance(origin) < radius * 1.5 {
                return Some(GizmoAxis::Center);
            }
        }

        axes.into_iter()
            .filter_map(|axis| {
                let distance = match self.mode {
                    GizmoMode::Translate | GizmoMode::Scale => {
                        ray.distance_to_segment(origin, origin + axis.direction() * size)?
                    }
                    GizmoMode::Rotate => {
                        let point = ray.intersect_plane(origin, axis.direction())?;
                        (point.distance(origin) - size).abs()
                    }
                };
                (distance < radius).then_some((axis, distance))
            })
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(axis, _)| axis)
    }

    /// Start a drag if the ray hits a handle of the attached node.
    pub fn pointer_down(&mut self, ray: &Ray, transform: &Transform) -> bool {
        if self.attached.is_none() || self.drag.is_some() {
            return false;
        }
        let origin = transform.position;
        let Some(axis) = self.hit_test(ray, origin) else {
            return false;
        };
        let plane_normal = self.drag_plane_normal(axis, ray.direction);
        let Some(start_point) = ray.intersect_plane(origin, plane_normal) else {
            return false;
        };
        self.drag = Some(DragState {
            axis,
            plane_point: origin,
            plane_normal,
            start_point,
            start: *transform,
            size: self.handle_size(ray.origin, origin),
        });
        self.events.push(GizmoEvent::DraggingChanged(true));
        true
    }

    /// Apply the active drag to `transform`. Returns whether it changed.
    pub fn pointer_move(&mut self, ray: &Ray, transform: &mut Transform) -> bool {
        let (Some(state), Some(node)) = (self.drag, self.attached) else {
            return false;
        };
        let Some(point) = ray.intersect_plane(state.plane_point, state.plane_normal) else {
            return false;
        };
        let updated = self.dragged_transform(&state, point);
        if updated == *transform {
            return false;
        }
        *transform = updated;
        self.events.push(GizmoEvent::ObjectChanged(node));
        true
    }

    /// Returns whether a drag was active.
    pub fn pointer_up(&mut self) -> bool {
        self.cancel_drag()
    }

    fn cancel_drag(&mut self) -> bool {
        if self.drag.take().is_some() {
            self.events.push(GizmoEvent::DraggingChanged(false));
            true
        } else {
            false
        }
    }

    fn drag_plane_normal(&self, axis: GizmoAxis, view_dir: Vec3) -> Vec3 {
        if axis == GizmoAxis::Center {
            return -view_dir;
        }
        if self.mode == GizmoMode::Rotate {
            return axis.direction();
        }
        // Of the two planes containing the axis, take the one facing the viewer.
        let (a, b) = match axis {
            GizmoAxis::X => (Vec3::Y, Vec3::Z),
            GizmoAxis::Y => (Vec3::X, Vec3::Z),
            _ => (Vec3::X, Vec3::Y),
        };
        if view_dir.dot(a).abs() > view_dir.dot(b).abs() {
            a
        } else {
            b
        }
    }

    fn dragged_transform(&self, state: &DragState, point: Vec3) -> Transform {
        let mut transform = state.start;
        let origin = state.plane_point;
        let delta = point - state.start_point;
        let axis = state.axis.direction();

        match self.mode {
            GizmoMode::Translate => {
                transform.position = state.start.position + axis * delta.dot(axis);
            }
            GizmoMode::Rotate => {
                let start_dir = (state.start_point - origin).reject_from_normalized(axis);
                let current_dir = (point - origin).reject_from_normalized(axis);
                if start_dir.length() < 1e-4 || current_dir.length() < 1e-4 {
                    return transform;
                }
                let (start_dir, current_dir) = (start_dir.normalize(), current_dir.normalize());
                let mut angle = start_dir.dot(current_dir).clamp(-1.0, 1.0).acos();
                if start_dir.cross(current_dir).dot(axis) < 0.0 {
                    angle = -angle;
                }
                transform.set_quat(Quat::from_axis_angle(axis, angle) * state.start.quat());
            }
            GizmoMode::Scale => {
                let factor = if state.axis == GizmoAxis::Center {
                    let start_distance = state.start_point.distance(origin);
                    let ratio = if start_distance > 1e-3 {
                        point.distance(origin) / start_distance
                    } else {
                        1.0
                    };
                    Vec3::splat(ratio)
                } else {
                    Vec3::ONE + axis * (delta.dot(axis) / state.size)
                };
                transform.scale = (state.start.scale * factor).max(Vec3::splat(self.config.min_scale));
            }
        }
        transform
    }
}
