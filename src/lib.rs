//! Interactive editing core for a 3D scene viewer: pointer picking, a
//! selection state machine, a translate/rotate/scale gizmo, two-way numeric
//! transform fields and a glTF import pipeline.

pub mod assets;
pub mod config;
pub mod editor;
pub mod render;
pub mod scene;
pub mod ui;

pub use config::EditorConfig;
pub use editor::Editor;
