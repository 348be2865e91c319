//! Gaussian splat viewer
//!
//! Opens a window, loads the point cloud named on the command line (or in
//! `splat_viewer.toml`) and renders it until the window is closed.
//!
//! Controls: WASD + Space/Shift to move, right mouse drag to look around,
//! scroll to zoom, `T` toggles translucency, `[`/`]` move the opaque
//! threshold, `L` reloads the last model, `R` resets the camera. Dropping a
//! `.ply` file onto the window loads it.

use splat_engine::core::{CameraConfig, ConfigError, ViewerConfig};
use splat_engine::foundation::logging;
use splat_engine::foundation::math::Vec3;
use splat_engine::input::{CameraController, UiAction, UiActionQueue};
use splat_engine::render::{FirstPersonCamera, FrameStatus, RenderPass, VulkanError, Window, WindowError};
use std::path::{Path, PathBuf};
use thiserror::Error;

const CONFIG_PATH: &str = "splat_viewer.toml";

/// Threshold change per key press
const THRESHOLD_STEP: f32 = 0.05;

/// Largest frame time fed to the camera, in seconds
const MAX_FRAME_TIME: f32 = 0.1;

#[derive(Error, Debug)]
enum ViewerError {
    #[error("configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("window: {0}")]
    Window(#[from] WindowError),

    #[error("renderer: {0}")]
    Render(#[from] VulkanError),
}

/// Renderer operations the UI actions drive
trait SceneRenderer {
    fn load_splat_file(&mut self, path: &Path) -> Result<usize, VulkanError>;
    fn translucency_enabled(&self) -> bool;
    fn set_translucency_enabled(&mut self, enabled: bool);
    fn opaque_threshold(&self) -> f32;
    fn set_opaque_threshold(&mut self, threshold: f32);
    fn camera_mut(&mut self) -> &mut FirstPersonCamera;
}

impl SceneRenderer for RenderPass {
    fn load_splat_file(&mut self, path: &Path) -> Result<usize, VulkanError> {
        RenderPass::load_splat_file(self, path)
    }

    fn translucency_enabled(&self) -> bool {
        RenderPass::translucency_enabled(self)
    }

    fn set_translucency_enabled(&mut self, enabled: bool) {
        RenderPass::set_translucency_enabled(self, enabled);
    }

    fn opaque_threshold(&self) -> f32 {
        RenderPass::opaque_threshold(self)
    }

    fn set_opaque_threshold(&mut self, threshold: f32) {
        RenderPass::set_opaque_threshold(self, threshold);
    }

    fn camera_mut(&mut self) -> &mut FirstPersonCamera {
        RenderPass::camera_mut(self)
    }
}

/// State the queued UI actions operate on
struct ViewerState<R = RenderPass> {
    renderer: R,
    camera_start: CameraConfig,
    last_model: Option<PathBuf>,
    /// Set by a handler whose failure must end the viewer
    fatal: Option<VulkanError>,
}

impl<R> ViewerState<R> {
    fn new(renderer: R, camera_start: CameraConfig) -> Self {
        Self {
            renderer,
            camera_start,
            last_model: None,
            fatal: None,
        }
    }
}

fn register_actions<R: SceneRenderer + 'static>(queue: &mut UiActionQueue<ViewerState<R>>) {
    queue.register_string_action(UiAction::LoadSplatFile, |state, path| {
        if state.fatal.is_some() {
            return;
        }
        let path = PathBuf::from(path);
        match state.renderer.load_splat_file(&path) {
            Ok(count) => log::info!("Showing {} splats from {}", count, path.display()),
            Err(e) => {
                // Splat buffers may be half replaced; nothing valid is left to draw
                log::error!("Failed to upload {}: {}", path.display(), e);
                state.fatal = Some(e);
            }
        }
        state.last_model = Some(path);
    });

    queue.register_bool_action(UiAction::ToggleTranslucency, |state, enabled| {
        state.renderer.set_translucency_enabled(enabled);
    });

    queue.register_float_action(UiAction::SetOpaqueThreshold, |state, threshold| {
        state.renderer.set_opaque_threshold(threshold);
        log::info!("Opaque threshold {:.2}", state.renderer.opaque_threshold());
    });

    queue.register_action(UiAction::ResetCamera, |state| {
        let [x, y, z] = state.camera_start.position;
        let camera = state.renderer.camera_mut();
        camera.set_position(Vec3::new(x, y, z));
        camera.reset_orientation();
    });
}

/// Run every queued action, failing if one of them hit a fatal error
fn process_actions<R>(
    actions: &mut UiActionQueue<ViewerState<R>>,
    state: &mut ViewerState<R>,
) -> Result<usize, ViewerError> {
    let processed = actions.process_queued_actions(state);
    match state.fatal.take() {
        Some(e) => Err(e.into()),
        None => Ok(processed),
    }
}

/// Fields drop in order; the renderer must go before the window
struct SplatViewer {
    state: ViewerState,
    actions: UiActionQueue<ViewerState>,
    controller: CameraController,
    window: Window,
}

impl SplatViewer {
    fn new(config: &ViewerConfig) -> Result<Self, ViewerError> {
        let window = Window::new(&config.window.title, config.window.width, config.window.height)?;
        let renderer = RenderPass::new(&window, config)?;

        let mut actions = UiActionQueue::new();
        register_actions(&mut actions);
        if let Some(path) = &config.initial_model {
            actions.queue_string_action(UiAction::LoadSplatFile, path.display().to_string());
        }

        Ok(Self {
            state: ViewerState::new(renderer, config.camera.clone()),
            actions,
            controller: CameraController::new(),
            window,
        })
    }

    fn handle_key(&mut self, key: glfw::Key) {
        let renderer = &self.state.renderer;
        match key {
            glfw::Key::T => self
                .actions
                .queue_bool_action(UiAction::ToggleTranslucency, !renderer.translucency_enabled()),
            glfw::Key::LeftBracket => self
                .actions
                .queue_float_action(UiAction::SetOpaqueThreshold, renderer.opaque_threshold() - THRESHOLD_STEP),
            glfw::Key::RightBracket => self
                .actions
                .queue_float_action(UiAction::SetOpaqueThreshold, renderer.opaque_threshold() + THRESHOLD_STEP),
            glfw::Key::R => self.actions.queue_action(UiAction::ResetCamera),
            glfw::Key::L => match &self.state.last_model {
                Some(path) => self
                    .actions
                    .queue_string_action(UiAction::LoadSplatFile, path.display().to_string()),
                None => log::warn!("No model loaded yet"),
            },
            _ => {}
        }
    }

    fn run(&mut self) -> Result<(), ViewerError> {
        let mut last_time = self.window.time();

        while !self.window.should_close() {
            let events = self.window.poll_events();
            for path in &events.dropped_files {
                self.actions
                    .queue_string_action(UiAction::LoadSplatFile, path.display().to_string());
            }
            for &key in &events.pressed_keys {
                self.handle_key(key);
            }

            // Safe point: no command buffer is being recorded
            process_actions(&mut self.actions, &mut self.state)?;

            let now = self.window.time();
            let delta_time = ((now - last_time) as f32).min(MAX_FRAME_TIME);
            last_time = now;
            let input = self.window.camera_input(events.scroll);
            self.controller
                .update(self.state.renderer.camera_mut(), &input, delta_time);

            self.window.wait_while_minimized();
            if self.window.should_close() {
                break;
            }

            let extent = self.window.framebuffer_size();
            if events.resized {
                self.state.renderer.recreate_render_resources(extent)?;
            }
            match self.state.renderer.draw_frame(extent)? {
                FrameStatus::Presented => {}
                status => log::debug!("Frame {:?}", status),
            }
        }

        self.state.renderer.wait_idle()?;
        Ok(())
    }
}

fn load_config() -> Result<ViewerConfig, ViewerError> {
    let mut config = ViewerConfig::load_or_default(CONFIG_PATH)?;
    if let Some(path) = std::env::args().nth(1) {
        config.initial_model = Some(PathBuf::from(path));
    }
    Ok(config)
}

fn main() {
    // Config loading logs too, so the logger comes up first
    logging::init_early();
    let config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            log::error!("{}", e);
            std::process::exit(1);
        }
    };
    logging::apply_configured_level(&config.log_level);
    log::info!("Starting splat viewer");

    let result = SplatViewer::new(&config).and_then(|mut viewer| viewer.run());
    if let Err(e) = result {
        log::error!("{}", e);
        std::process::exit(1);
    }
    log::info!("Viewer closed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use ash::vk;
    use splat_engine::render::backends::vulkan::{BufferBackend, BufferRegistry};
    use splat_engine::render::subpasses::buffer_names;

    /// Allocator that runs out of device memory after a fixed number of uploads
    struct LimitedAllocator {
        uploads_left: usize,
        live: usize,
    }

    impl BufferBackend for LimitedAllocator {
        type Buffer = usize;
        type Error = VulkanError;

        fn wait_idle(&mut self) -> Result<(), VulkanError> {
            Ok(())
        }

        fn upload(&mut self, bytes: &[u8], _usage: vk::BufferUsageFlags) -> Result<usize, VulkanError> {
            if self.uploads_left == 0 {
                return Err(VulkanError::Allocation(format!("no memory left for {} bytes", bytes.len())));
            }
            self.uploads_left -= 1;
            self.live += 1;
            Ok(bytes.len())
        }

        fn create_mapped(&mut self, size: vk::DeviceSize, usage: vk::BufferUsageFlags) -> Result<usize, VulkanError> {
            self.upload(&vec![0; size as usize], usage)
        }

        fn destroy(&mut self, _buffer: usize) {
            self.live -= 1;
        }
    }

    /// Uploads the splat attribute buffers one by one like the real renderer
    struct RecordingRenderer {
        allocator: LimitedAllocator,
        buffers: BufferRegistry<LimitedAllocator>,
        translucency: bool,
        threshold: f32,
        camera: FirstPersonCamera,
    }

    impl RecordingRenderer {
        fn new(uploads: usize) -> Self {
            Self {
                allocator: LimitedAllocator {
                    uploads_left: uploads,
                    live: 0,
                },
                buffers: BufferRegistry::new(),
                translucency: true,
                threshold: 0.98,
                camera: FirstPersonCamera::from_config(&CameraConfig::default(), 1.0),
            }
        }
    }

    impl SceneRenderer for RecordingRenderer {
        fn load_splat_file(&mut self, _path: &Path) -> Result<usize, VulkanError> {
            let splat = [0.5f32; 4];
            for name in buffer_names::SPLAT_ATTRIBUTES {
                self.buffers
                    .allocate_named_buffer(&mut self.allocator, name, &splat, vk::BufferUsageFlags::STORAGE_BUFFER)?;
            }
            Ok(1)
        }

        fn translucency_enabled(&self) -> bool {
            self.translucency
        }

        fn set_translucency_enabled(&mut self, enabled: bool) {
            self.translucency = enabled;
        }

        fn opaque_threshold(&self) -> f32 {
            self.threshold
        }

        fn set_opaque_threshold(&mut self, threshold: f32) {
            self.threshold = threshold;
        }

        fn camera_mut(&mut self) -> &mut FirstPersonCamera {
            &mut self.camera
        }
    }

    fn viewer(uploads: usize) -> (UiActionQueue<ViewerState<RecordingRenderer>>, ViewerState<RecordingRenderer>) {
        let mut actions = UiActionQueue::new();
        register_actions(&mut actions);
        let state = ViewerState::new(RecordingRenderer::new(uploads), CameraConfig::default());
        (actions, state)
    }

    #[test]
    fn test_successful_load_keeps_running() {
        let (mut actions, mut state) = viewer(5);
        actions.queue_string_action(UiAction::LoadSplatFile, "scene.ply");

        assert_eq!(process_actions(&mut actions, &mut state).unwrap(), 1);
        assert_eq!(state.renderer.buffers.len(), buffer_names::SPLAT_ATTRIBUTES.len());
        assert_eq!(state.last_model, Some(PathBuf::from("scene.ply")));
    }

    #[test]
    fn test_partial_upload_failure_ends_the_viewer() {
        // Enough memory for the first model plus two buffers of the second
        let (mut actions, mut state) = viewer(7);
        actions.queue_string_action(UiAction::LoadSplatFile, "first.ply");
        process_actions(&mut actions, &mut state).unwrap();

        actions.queue_string_action(UiAction::LoadSplatFile, "second.ply");
        let result = process_actions(&mut actions, &mut state);

        assert!(matches!(result, Err(ViewerError::Render(VulkanError::Allocation(_)))));
        let registry = &state.renderer.buffers;
        assert!(registry.contains(buffer_names::POSITIONS));
        assert!(!registry.contains(buffer_names::COLORS));
        assert_eq!(state.renderer.allocator.live, registry.len());
    }

    #[test]
    fn test_no_load_runs_after_a_fatal_error() {
        let (mut actions, mut state) = viewer(2);
        actions.queue_string_action(UiAction::LoadSplatFile, "a.ply");
        actions.queue_string_action(UiAction::LoadSplatFile, "b.ply");

        assert!(process_actions(&mut actions, &mut state).is_err());
        assert_eq!(state.last_model, Some(PathBuf::from("a.ply")));
        assert!(state.fatal.is_none());
    }

    #[test]
    fn test_threshold_and_translucency_actions() {
        let (mut actions, mut state) = viewer(0);
        actions.queue_bool_action(UiAction::ToggleTranslucency, false);
        actions.queue_float_action(UiAction::SetOpaqueThreshold, 0.5);

        assert_eq!(process_actions(&mut actions, &mut state).unwrap(), 2);
        assert!(!state.renderer.translucency_enabled());
        assert_eq!(state.renderer.opaque_threshold(), 0.5);
    }
}
