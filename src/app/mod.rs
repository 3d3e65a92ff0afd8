mod input;
mod timing;

use input::InputAction;
use stagehand::assets::SuppliedFile;
use stagehand::config::EditorConfig;
use stagehand::editor::{Editor, Status};
use timing::FrameTiming;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, MouseButton, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowAttributes, WindowId};

const TITLE: &str = "Stagehand";

pub struct AppOptions {
    pub config: EditorConfig,
    /// Model files imported together at startup.
    pub models: Vec<PathBuf>,
}

pub struct App {
    window: Option<Arc<Window>>,
    editor: Editor,
    startup_models: Vec<PathBuf>,
    dropped: Vec<PathBuf>,
    mouse_pos: Option<(f32, f32)>,
    timing: FrameTiming,
    target_frame_duration: Duration,
    next_frame_time: Instant,
}

impl App {
    fn new(options: AppOptions) -> Self {
        Self {
            window: None,
            editor: Editor::new(options.config),
            startup_models: options.models,
            dropped: Vec::new(),
            mouse_pos: None,
            timing: FrameTiming::new(TITLE.to_string()),
            target_frame_duration: Duration::from_millis(16),
            next_frame_time: Instant::now(),
        }
    }

    fn handle_resize(&mut self, new_size: PhysicalSize<u32>) {
        self.editor
            .set_viewport(new_size.width as f32, new_size.height as f32);
    }

    fn update_target_frame_duration(&mut self, window: &Window) {
        let mut target = Duration::from_millis(16);
        if let Some(monitor) = window.current_monitor() {
            if let Some(millihz) = monitor.refresh_rate_millihertz() {
                let hz = millihz as f32 / 1000.0;
                if hz > 1.0 {
                    target = Duration::from_secs_f32(1.0 / hz);
                }
            }
        }
        self.target_frame_duration = target;
        self.next_frame_time = Instant::now() + self.target_frame_duration;
    }

    fn frame(&mut self) {
        let frame_start = Instant::now();
        self.timing.update(frame_start);
        self.flush_dropped_files();
        self.editor.tick(self.timing.frame_dt);

        if let Some(window) = &self.window {
            let detail = match (self.editor.field_summary(), self.editor.status()) {
                (Some(fields), _) => fields,
                (None, Some(status)) => status.message().to_string(),
                (None, None) => "drop or open (O) a .gltf/.glb with its files".to_string(),
            };
            self.timing.apply_title(window, &detail);
        }
    }

    /// Every file dropped since the last frame forms one file set.
    fn flush_dropped_files(&mut self) {
        if self.dropped.is_empty() {
            return;
        }
        let paths = std::mem::take(&mut self.dropped);
        self.import_paths(&paths);
    }

    fn handle_open_files_action(&mut self) {
        let Some(paths) = rfd::FileDialog::new()
            .add_filter("glTF", &["gltf", "glb"])
            .add_filter("All files", &["*"])
            .pick_files()
        else {
            return;
        };
        self.import_paths(&paths);
    }

    fn import_paths(&mut self, paths: &[PathBuf]) {
        let mut files = Vec::with_capacity(paths.len());
        for path in paths {
            match SuppliedFile::read(path) {
                Ok(file) => files.push(file),
                Err(err) => log::warn!("Failed to read {}: {}", path.display(), err),
            }
        }
        log::info!("Importing {} file(s)", files.len());
        self.editor.import_files(files);
        if let Some(Status::Error(message)) = self.editor.status() {
            log::warn!("{message}");
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let window_attrs = WindowAttributes::default()
            .with_title(TITLE)
            .with_inner_size(PhysicalSize::new(1280u32, 720u32))
            .with_resizable(true);

        let window = match event_loop.create_window(window_attrs) {
            Ok(window) => Arc::new(window),
            Err(err) => {
                log::error!("Failed to create window: {err}");
                event_loop.exit();
                return;
            }
        };

        self.handle_resize(window.inner_size());
        self.update_target_frame_duration(&window);
        self.window = Some(window);

        if !self.startup_models.is_empty() {
            let paths = std::mem::take(&mut self.startup_models);
            self.import_paths(&paths);
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }
            WindowEvent::Focused(focused) => {
                if !focused {
                    self.mouse_pos = None;
                    self.editor.pointer_up();
                }
            }
            WindowEvent::KeyboardInput { event, .. } => {
                if event.state != ElementState::Pressed || event.repeat {
                    return;
                }
                match input::map_key(event.physical_key) {
                    InputAction::Editor(key) => self.editor.key_down(key),
                    InputAction::OpenFiles => self.handle_open_files_action(),
                    InputAction::None => {}
                }
            }
            WindowEvent::Resized(new_size) => {
                self.handle_resize(new_size);
                if let Some(window) = self.window.clone() {
                    self.update_target_frame_duration(&window);
                }
            }
            WindowEvent::Moved(_) => {
                if let Some(window) = self.window.clone() {
                    self.update_target_frame_duration(&window);
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                let (x, y) = (position.x as f32, position.y as f32);
                self.mouse_pos = Some((x, y));
                self.editor.pointer_move(x, y);
            }
            WindowEvent::CursorLeft { .. } => {
                self.mouse_pos = None;
            }
            WindowEvent::MouseInput {
                state,
                button: MouseButton::Left,
                ..
            } => match state {
                ElementState::Pressed => {
                    if let Some((x, y)) = self.mouse_pos {
                        let action = self.editor.pointer_down(x, y);
                        log::debug!("pointer down at ({x:.0}, {y:.0}): {action:?}");
                    }
                }
                ElementState::Released => self.editor.pointer_up(),
            },
            WindowEvent::DroppedFile(path) => {
                self.dropped.push(path);
            }
            WindowEvent::RedrawRequested => {
                self.frame();
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        let now = Instant::now();
        if now >= self.next_frame_time {
            if let Some(window) = &self.window {
                window.request_redraw();
            }
            self.next_frame_time = now + self.target_frame_duration;
        }
        event_loop.set_control_flow(ControlFlow::WaitUntil(self.next_frame_time));
    }
}

pub fn run(options: AppOptions) -> Result<(), winit::error::EventLoopError> {
    log::info!("Stagehand editor");
    log::info!("   W/E/R switch gizmo mode, Esc clears selection, O opens models");

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Wait);

    let mut app = App::new(options);
    event_loop.run_app(&mut app)?;

    log::info!("Goodbye");
    Ok(())
}
