//! Interaction surface
//!
//! [`Editor`] owns the scene and routes pointer, keyboard, field and file
//! input into picking, selection, the transform gizmo and model import. All
//! of it runs on the caller's thread; only model deserialization happens
//! elsewhere, and its results are picked up by [`Editor::tick`].

pub mod scenery;
pub mod selection;

pub use scenery::Scenery;
pub use selection::{Selection, SelectionChange};

use crate::assets::{AssetImporter, ImportEvent, SuppliedFile};
use crate::config::EditorConfig;
use crate::render::camera::{CameraController, OrbitControls, Viewport};
use crate::render::gizmo::{GizmoEvent, GizmoMode, TransformGizmo};
use crate::render::pick;
use crate::scene::{NodeId, NodeKind, Ray, SceneGraph};
use crate::ui::{FieldId, FieldInput, FieldSync, FieldView, InputOutcome, TextFields};
use glam::{Vec2, Vec3};

/// Name of the node imported models are placed under.
pub const USER_MODELS: &str = "UserModels";

/// Editor commands bound to keys by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditorKey {
    Translate,
    Rotate,
    Scale,
    Cancel,
}

/// What a pointer press did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerAction {
    /// Ignored because a drag is already running.
    Busy,
    DragStarted,
    Selected(NodeId),
    Cleared,
}

/// Outcome of a user-visible operation, shown in the status line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    Info(String),
    Error(String),
}

impl Status {
    pub fn message(&self) -> &str {
        match self {
            Status::Info(message) | Status::Error(message) => message,
        }
    }
}

pub struct Editor {
    config: EditorConfig,
    scene: SceneGraph,
    container: NodeId,
    scenery: Option<Scenery>,
    camera: CameraController,
    orbit: OrbitControls,
    viewport: Viewport,
    selection: Selection,
    gizmo: TransformGizmo,
    sync: FieldSync,
    fields: TextFields,
    importer: AssetImporter,
    /// Imported model waiting for the running drag to end.
    pending_selection: Option<NodeId>,
    status: Option<Status>,
    pointer: Option<Vec2>,
    button_down: bool,
    elapsed: f32,
}

impl Editor {
    pub fn new(config: EditorConfig) -> Self {
        let mut scene = SceneGraph::new();
        let scenery = Scenery::build(&mut scene);
        let root = scene.root();
        let container = scene
            .add(root, USER_MODELS, NodeKind::Group)
            .unwrap_or(root);

        let camera = config.camera();
        let orbit = OrbitControls::new(
            Vec3::from_array(config.camera_target),
            config.orbit_sensitivity,
        );
        let gizmo = TransformGizmo::new(config.gizmo());
        let sync = FieldSync::new(config.min_scale);
        let importer = AssetImporter::new(config.import_settings());

        Self {
            config,
            scene,
            container,
            scenery,
            camera,
            orbit,
            viewport: Viewport::new(1280.0, 720.0),
            selection: Selection::Idle,
            gizmo,
            sync,
            fields: TextFields::echoing(),
            importer,
            pending_selection: None,
            status: None,
            pointer: None,
            button_down: false,
            elapsed: 0.0,
        }
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn scene(&self) -> &SceneGraph {
        &self.scene
    }

    pub fn scene_mut(&mut self) -> &mut SceneGraph {
        &mut self.scene
    }

    /// Parent of every imported model.
    pub fn container(&self) -> NodeId {
        self.container
    }

    pub fn camera(&self) -> &CameraController {
        &self.camera
    }

    pub fn orbit(&self) -> &OrbitControls {
        &self.orbit
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn set_viewport(&mut self, width: f32, height: f32) {
        self.viewport = Viewport::new(width, height);
    }

    pub fn selected(&self) -> Option<NodeId> {
        self.selection.selected()
    }

    pub fn gizmo(&self) -> &TransformGizmo {
        &self.gizmo
    }

    pub fn fields(&self) -> &TextFields {
        &self.fields
    }

    pub fn status(&self) -> Option<&Status> {
        self.status.as_ref()
    }

    pub fn imports_in_flight(&self) -> usize {
        self.importer.in_flight()
    }

    /// Select `node`, attach the gizmo and show its transform.
    pub fn select(&mut self, node: NodeId) -> bool {
        if !self.scene.contains(node) {
            return false;
        }
        if let SelectionChange::Selected { previous, .. } = self.selection.select(node) {
            if previous != Some(node) {
                log::info!("selected {}", self.node_name(node));
            }
        }
        self.gizmo.attach(node);
        self.handle_gizmo_events();
        self.refresh_fields(node);
        true
    }

    /// Drop the selection, detach the gizmo and blank the fields.
    pub fn clear_selection(&mut self) {
        if let SelectionChange::Cleared { previous } = self.selection.clear() {
            log::info!("cleared selection of {}", self.node_name(previous));
        }
        self.gizmo.detach();
        self.handle_gizmo_events();
        self.sync.clear(&mut self.fields);
    }

    pub fn pointer_down(&mut self, x: f32, y: f32) -> PointerAction {
        self.pointer = Some(Vec2::new(x, y));
        self.button_down = true;
        if self.gizmo.is_dragging() {
            return PointerAction::Busy;
        }

        if let Some(node) = self.selection.selected() {
            if let (Some(ray), Some(transform)) = (self.local_ray(node, x, y), self.scene.transform(node)) {
                if self.gizmo.pointer_down(&ray, &transform) {
                    self.handle_gizmo_events();
                    return PointerAction::DragStarted;
                }
            }
        }

        match pick::pick(&self.scene, &self.camera, self.viewport, x, y, self.container) {
            Some(hit) => {
                self.select(hit.node);
                PointerAction::Selected(hit.node)
            }
            None => {
                self.clear_selection();
                PointerAction::Cleared
            }
        }
    }

    /// Returns whether the pointer moved the selection or the camera.
    pub fn pointer_move(&mut self, x: f32, y: f32) -> bool {
        let position = Vec2::new(x, y);
        let delta = self.pointer.map(|last| position - last).unwrap_or(Vec2::ZERO);
        self.pointer = Some(position);

        if self.gizmo.is_dragging() {
            let Some(node) = self.gizmo.attached() else {
                return false;
            };
            let (Some(ray), Some(mut transform)) = (self.local_ray(node, x, y), self.scene.transform(node)) else {
                return false;
            };
            let changed = self.gizmo.pointer_move(&ray, &mut transform);
            if changed {
                self.scene.set_transform(node, transform);
            }
            self.handle_gizmo_events();
            return changed;
        }

        self.button_down && self.orbit.drag(&mut self.camera, delta.x, delta.y)
    }

    pub fn pointer_up(&mut self) {
        self.button_down = false;
        self.gizmo.pointer_up();
        self.handle_gizmo_events();
        if let Some(node) = self.pending_selection.take() {
            self.select(node);
        }
    }

    pub fn key_down(&mut self, key: EditorKey) {
        let mode = match key {
            EditorKey::Translate => GizmoMode::Translate,
            EditorKey::Rotate => GizmoMode::Rotate,
            EditorKey::Scale => GizmoMode::Scale,
            EditorKey::Cancel => {
                self.clear_selection();
                return;
            }
        };
        if self.gizmo.set_mode(mode) {
            log::debug!("gizmo mode {mode:?}");
        }
    }

    /// A user edit of one numeric field.
    pub fn field_input(&mut self, field: FieldId, text: &str) -> InputOutcome {
        // The user's text stays in the field; its echo is the edit itself.
        let _ = self.fields.write(field, text);
        let Some(node) = self.selection.selected() else {
            return InputOutcome::Rejected;
        };
        let Some(mut transform) = self.scene.transform(node) else {
            return InputOutcome::Rejected;
        };
        let input = FieldInput {
            field,
            text: text.to_string(),
        };
        let outcome = self.sync.on_input(&input, &mut transform);
        match outcome {
            InputOutcome::Applied => {
                self.scene.set_transform(node, transform);
            }
            InputOutcome::Clamped => {
                self.scene.set_transform(node, transform);
                self.refresh_fields(node);
            }
            InputOutcome::Echo | InputOutcome::Rejected => {}
        }
        outcome
    }

    /// Start importing a file set from a picker or a drop.
    pub fn import_files(&mut self, files: Vec<SuppliedFile>) -> bool {
        if files.is_empty() {
            return false;
        }
        match self.importer.import(files) {
            Ok(job) => {
                self.status = Some(Status::Info(format!("Loading model (import {job})...")));
                true
            }
            Err(err) => {
                log::warn!("import rejected: {err}");
                self.status = Some(Status::Error(err.to_string()));
                false
            }
        }
    }

    /// Advance by `dt` seconds: animate the scenery and place finished imports.
    pub fn tick(&mut self, dt: f32) -> Vec<ImportEvent> {
        self.elapsed += dt.max(0.0);
        if let Some(scenery) = &self.scenery {
            scenery.animate(&mut self.scene, self.elapsed);
        }

        let events = self.importer.poll(&mut self.scene, self.container);
        for event in &events {
            match event {
                ImportEvent::Placed { node, name, file, .. } => {
                    self.status = Some(Status::Info(format!("Placed {file} as {name}")));
                    if self.gizmo.is_dragging() {
                        log::debug!("selecting {name} once the drag ends");
                        self.pending_selection = Some(*node);
                    } else {
                        self.select(*node);
                    }
                }
                ImportEvent::Failed { error, .. } => {
                    self.status = Some(Status::Error(error.to_string()));
                }
            }
        }
        events
    }

    /// Fields for display, e.g. in a window title.
    pub fn field_summary(&self) -> Option<String> {
        self.selection.selected().map(|_| self.fields.summary())
    }

    fn local_ray(&self, node: NodeId, x: f32, y: f32) -> Option<Ray> {
        let parent = self.scene.node(node)?.parent()?;
        let ray = self.camera.screen_ray(x, y, self.viewport);
        let parent_world = self.scene.world_matrix(parent);
        if parent_world.determinant().abs() < f32::EPSILON {
            return None;
        }
        let local = ray.transformed(&parent_world.inverse());
        Some(Ray::new(local.origin, local.direction))
    }

    fn handle_gizmo_events(&mut self) {
        for event in self.gizmo.take_events() {
            match event {
                GizmoEvent::DraggingChanged(dragging) => {
                    self.orbit.set_enabled(!dragging);
                    log::debug!("gizmo dragging: {dragging}");
                }
                GizmoEvent::ObjectChanged(node) => self.refresh_fields(node),
            }
        }
    }

    fn refresh_fields(&mut self, node: NodeId) {
        let Some(mut transform) = self.scene.transform(node) else {
            return;
        };
        self.sync.refresh(&mut self.fields, &mut transform);
        self.scene.set_transform(node, transform);
    }

    fn node_name(&self, node: NodeId) -> &str {
        self.scene.node(node).map(|node| node.name.as_str()).unwrap_or("?")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::gltf::tests::triangle_package;
    use crate::scene::{Mesh, Subtree, Transform};
    use std::time::{Duration, Instant};

    fn editor() -> Editor {
        let config = EditorConfig {
            camera_position: [0.0, 6.0, 8.0],
            camera_target: [0.0, 0.0, 0.0],
            ..EditorConfig::default()
        };
        let mut editor = Editor::new(config);
        editor.set_viewport(800.0, 600.0);
        editor
    }

    fn add_box(editor: &mut Editor, position: Vec3) -> NodeId {
        let container = editor.container();
        let mut model = Subtree::drawable("box", Mesh::cuboid(Vec3::ONE));
        model.transform = Transform::from_position(position);
        let node = editor.scene_mut().insert(container, model).unwrap();
        editor.scene_mut().set_pickable(node, true);
        node
    }

    fn pixel(editor: &Editor, point: Vec3) -> Vec2 {
        editor
            .camera()
            .world_to_screen(point, editor.viewport())
            .expect("point is in front of the camera")
    }

    fn number(editor: &Editor, field: FieldId) -> f32 {
        editor.fields().read(field).parse().unwrap()
    }

    fn settle(editor: &mut Editor) -> Vec<ImportEvent> {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            let events = editor.tick(0.016);
            if !events.is_empty() {
                return events;
            }
            assert!(Instant::now() < deadline, "import did not finish");
            std::thread::sleep(Duration::from_millis(2));
        }
    }

    #[test]
    fn clicking_a_model_selects_it_and_fills_fields() {
        let mut editor = editor();
        let node = add_box(&mut editor, Vec3::new(2.0, 0.5, 0.0));
        let at = pixel(&editor, Vec3::new(2.0, 0.5, 0.0));

        assert_eq!(editor.pointer_down(at.x, at.y), PointerAction::Selected(node));
        editor.pointer_up();
        assert_eq!(editor.selected(), Some(node));
        assert_eq!(editor.gizmo().attached(), Some(node));
        assert_eq!(editor.fields().read(FieldId::PositionX), "2.00");
        assert_eq!(editor.fields().read(FieldId::ScaleY), "1.00");
    }

    #[test]
    fn clicking_empty_space_clears_and_blanks_fields() {
        let mut editor = editor();
        let node = add_box(&mut editor, Vec3::new(2.0, 0.5, 0.0));
        editor.select(node);
        assert!(!editor.fields().is_blank());

        assert_eq!(editor.pointer_down(5.0, 5.0), PointerAction::Cleared);
        editor.pointer_up();
        assert_eq!(editor.selected(), None);
        assert_eq!(editor.gizmo().attached(), None);
        assert!(editor.fields().is_blank());
    }

    #[test]
    fn clicking_scenery_does_not_select_it() {
        let mut editor = editor();
        let node = add_box(&mut editor, Vec3::new(2.0, 0.5, 0.0));
        editor.select(node);
        // The pedestal sits at the origin.
        let at = pixel(&editor, Vec3::new(0.0, 0.25, 1.0));
        assert_eq!(editor.pointer_down(at.x, at.y), PointerAction::Cleared);
    }

    #[test]
    fn dragging_translate_handle_moves_model_without_orbit() {
        let mut editor = editor();
        let node = add_box(&mut editor, Vec3::ZERO);
        editor.select(node);
        let camera_before = editor.camera().position;
        let y_before = editor.fields().read(FieldId::PositionY).to_string();
        let z_before = editor.fields().read(FieldId::PositionZ).to_string();
        let x_before = number(&editor, FieldId::PositionX);

        let size = editor.gizmo().handle_size(editor.camera().eye(), Vec3::ZERO);
        let grab = Vec3::X * size * 0.5;
        let down = pixel(&editor, grab);
        assert_eq!(editor.pointer_down(down.x, down.y), PointerAction::DragStarted);
        assert!(!editor.orbit().enabled());

        let to = pixel(&editor, grab + Vec3::X);
        assert!(editor.pointer_move(to.x, to.y));
        editor.pointer_up();
        assert!(editor.orbit().enabled());

        let position = editor.scene().transform(node).unwrap().position;
        assert!((position - Vec3::X).length() < 1e-2, "{position:?}");
        assert!((number(&editor, FieldId::PositionX) - (x_before + 1.0)).abs() < 0.011);
        assert_eq!(editor.fields().read(FieldId::PositionY), y_before);
        assert_eq!(editor.fields().read(FieldId::PositionZ), z_before);
        assert_eq!(editor.camera().position, camera_before);
        assert_eq!(editor.selected(), Some(node));
    }

    #[test]
    fn press_during_drag_is_ignored() {
        let mut editor = editor();
        let node = add_box(&mut editor, Vec3::ZERO);
        editor.select(node);
        let size = editor.gizmo().handle_size(editor.camera().eye(), Vec3::ZERO);
        let down = pixel(&editor, Vec3::X * size * 0.5);
        editor.pointer_down(down.x, down.y);
        assert_eq!(editor.pointer_down(5.0, 5.0), PointerAction::Busy);
        assert_eq!(editor.selected(), Some(node));
    }

    #[test]
    fn dragging_empty_space_orbits_camera() {
        let mut editor = editor();
        let before = editor.camera().position;
        editor.pointer_down(5.0, 5.0);
        assert!(editor.pointer_move(45.0, 5.0));
        editor.pointer_up();
        assert_ne!(editor.camera().position, before);
        assert!(!editor.pointer_move(90.0, 5.0));
    }

    #[test]
    fn escape_clears_and_mode_keys_switch_gizmo() {
        let mut editor = editor();
        let node = add_box(&mut editor, Vec3::ZERO);
        editor.select(node);
        editor.key_down(EditorKey::Rotate);
        assert_eq!(editor.gizmo().mode(), GizmoMode::Rotate);
        editor.key_down(EditorKey::Scale);
        assert_eq!(editor.gizmo().mode(), GizmoMode::Scale);
        editor.key_down(EditorKey::Cancel);
        assert_eq!(editor.selected(), None);
        assert!(editor.fields().is_blank());
    }

    #[test]
    fn field_edits_update_selected_model() {
        let mut editor = editor();
        let node = add_box(&mut editor, Vec3::ZERO);
        editor.select(node);

        assert_eq!(editor.field_input(FieldId::PositionZ, "-2.5"), InputOutcome::Applied);
        assert_eq!(editor.field_input(FieldId::RotationY, "90"), InputOutcome::Applied);
        assert_eq!(editor.field_input(FieldId::PositionX, "left"), InputOutcome::Rejected);
        assert_eq!(editor.field_input(FieldId::ScaleX, "0"), InputOutcome::Clamped);

        let transform = editor.scene().transform(node).unwrap();
        assert_eq!(transform.position, Vec3::new(0.0, 0.0, -2.5));
        assert!((transform.rotation.y - std::f32::consts::FRAC_PI_2).abs() < 1e-6);
        assert_eq!(transform.scale.x, 0.01);
        assert_eq!(editor.fields().read(FieldId::ScaleX), "0.01");
    }

    #[test]
    fn field_edit_without_selection_is_rejected() {
        let mut editor = editor();
        assert_eq!(editor.field_input(FieldId::PositionX, "1"), InputOutcome::Rejected);
    }

    #[test]
    fn import_places_and_selects_model() {
        let mut editor = editor();
        let (json, bin) = triangle_package("scene.bin");
        assert!(editor.import_files(vec![
            SuppliedFile::new("scene.gltf", json.into_bytes()),
            SuppliedFile::new("scene.bin", bin),
        ]));

        let events = settle(&mut editor);
        let ImportEvent::Placed { node, .. } = events[0] else {
            panic!("expected placement, got {events:?}");
        };
        assert_eq!(editor.selected(), Some(node));
        assert_eq!(editor.scene().children(editor.container()), &[node]);
        assert!(matches!(editor.status(), Some(Status::Info(_))));

        let bounds = editor.scene().bounding_box(node);
        assert!(bounds.min.y.abs() < 1e-4);
        assert!((bounds.max_dimension() - 2.0).abs() < 1e-4);
        assert_eq!(editor.fields().read(FieldId::PositionZ), "-4.00");
    }

    #[test]
    fn import_landing_mid_drag_is_selected_on_release() {
        let mut editor = editor();
        let node = add_box(&mut editor, Vec3::ZERO);
        editor.select(node);
        let size = editor.gizmo().handle_size(editor.camera().eye(), Vec3::ZERO);
        let grab = Vec3::X * size * 0.5;
        let down = pixel(&editor, grab);
        assert_eq!(editor.pointer_down(down.x, down.y), PointerAction::DragStarted);

        let (json, bin) = triangle_package("scene.bin");
        assert!(editor.import_files(vec![
            SuppliedFile::new("scene.gltf", json.into_bytes()),
            SuppliedFile::new("scene.bin", bin),
        ]));
        let events = settle(&mut editor);
        let ImportEvent::Placed { node: placed, .. } = events[0] else {
            panic!("expected placement, got {events:?}");
        };
        assert!(editor.gizmo().is_dragging());
        assert_eq!(editor.selected(), Some(node));
        assert!(!editor.orbit().enabled());

        let camera_before = editor.camera().position;
        let to = pixel(&editor, grab + Vec3::X);
        assert!(editor.pointer_move(to.x, to.y));
        assert_eq!(editor.camera().position, camera_before);
        let position = editor.scene().transform(node).unwrap().position;
        assert!((position - Vec3::X).length() < 1e-2, "{position:?}");

        editor.pointer_up();
        assert_eq!(editor.selected(), Some(placed));
        assert_eq!(editor.gizmo().attached(), Some(placed));
        assert!(editor.orbit().enabled());
        assert_eq!(editor.fields().read(FieldId::PositionZ), "-4.00");
    }

    #[test]
    fn image_only_import_reports_and_keeps_selection() {
        let mut editor = editor();
        let node = add_box(&mut editor, Vec3::ZERO);
        editor.select(node);
        let children_before = editor.scene().children(editor.container()).len();

        assert!(!editor.import_files(vec![SuppliedFile::new("photo.jpg", vec![0xFF, 0xD8])]));
        assert!(matches!(editor.status(), Some(Status::Error(_))));
        assert_eq!(editor.selected(), Some(node));
        assert_eq!(editor.scene().children(editor.container()).len(), children_before);
        assert_eq!(editor.imports_in_flight(), 0);
    }

    #[test]
    fn failed_import_keeps_selection() {
        let mut editor = editor();
        let node = add_box(&mut editor, Vec3::ZERO);
        editor.select(node);
        assert!(editor.import_files(vec![SuppliedFile::new("bad.gltf", b"{".to_vec())]));
        let events = settle(&mut editor);
        assert!(matches!(events[0], ImportEvent::Failed { .. }));
        assert_eq!(editor.selected(), Some(node));
        assert!(matches!(editor.status(), Some(Status::Error(_))));
    }
}
