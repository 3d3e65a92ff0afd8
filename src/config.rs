use crate::assets::ImportSettings;
use crate::render::camera::{CameraController, Projection};
use crate::render::gizmo::GizmoConfig;
use glam::Vec3;
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Editor tuning. Every field is optional in the JSON file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Largest dimension of a freshly imported model, in world units.
    pub target_size: f32,
    /// Horizontal offset applied to imported models (y is ignored).
    pub staging_offset: [f32; 3],
    pub min_scale: f32,
    pub model_extensions: Vec<String>,
    /// Orbit radians per pixel of pointer travel.
    pub orbit_sensitivity: f32,
    pub gizmo_screen_scale: f32,
    pub gizmo_pick_radius: f32,
    pub camera_position: [f32; 3],
    pub camera_target: [f32; 3],
    pub fov_y_deg: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            target_size: 2.0,
            staging_offset: [0.0, 0.0, -4.0],
            min_scale: 0.01,
            model_extensions: vec!["gltf".to_string(), "glb".to_string()],
            orbit_sensitivity: 0.005,
            gizmo_screen_scale: 0.15,
            gizmo_pick_radius: 0.08,
            camera_position: [6.0, 4.0, 8.0],
            camera_target: [0.0, 1.0, 0.0],
            fov_y_deg: 60.0,
            near: 0.1,
            far: 200.0,
        }
    }
}

impl EditorConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let config: EditorConfig = serde_json::from_str(&json)?;
        Ok(config)
    }

    pub fn import_settings(&self) -> ImportSettings {
        ImportSettings {
            extensions: self.model_extensions.clone(),
            target_size: self.target_size,
            staging_offset: Vec3::from_array(self.staging_offset),
        }
    }

    pub fn gizmo(&self) -> GizmoConfig {
        GizmoConfig {
            screen_scale: self.gizmo_screen_scale,
            pick_radius: self.gizmo_pick_radius,
            min_scale: self.min_scale,
        }
    }

    pub fn camera(&self) -> CameraController {
        CameraController::looking_at(self.camera_position, self.camera_target).with_projection(
            Projection {
                fov_y_deg: self.fov_y_deg,
                near: self.near,
                far: self.far,
            },
        )
    }
}
