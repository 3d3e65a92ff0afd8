use stagehand::editor::EditorKey;
use winit::keyboard::{KeyCode, PhysicalKey};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputAction {
    Editor(EditorKey),
    OpenFiles,
    None,
}

pub fn map_key(key: PhysicalKey) -> InputAction {
    match key {
        PhysicalKey::Code(KeyCode::KeyW) => InputAction::Editor(EditorKey::Translate),
        PhysicalKey::Code(KeyCode::KeyE) => InputAction::Editor(EditorKey::Rotate),
        PhysicalKey::Code(KeyCode::KeyR) => InputAction::Editor(EditorKey::Scale),
        PhysicalKey::Code(KeyCode::Escape) => InputAction::Editor(EditorKey::Cancel),
        PhysicalKey::Code(KeyCode::KeyO) => InputAction::OpenFiles,
        _ => InputAction::None,
    }
}
