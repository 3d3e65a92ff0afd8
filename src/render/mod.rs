//! Viewer-side math: camera and orbit controls, pointer picking and the
//! transform gizmo. Drawing itself is left to the host renderer.

pub mod camera;
pub mod gizmo;
pub mod pick;

pub use camera::{CameraController, OrbitControls, Projection, Viewport};
pub use gizmo::{GizmoAxis, GizmoConfig, GizmoEvent, GizmoMode, TransformGizmo};
pub use pick::{pick, pick_ray, selectable_root, PickHit};
