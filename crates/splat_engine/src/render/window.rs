//! Window management using GLFW
//!
//! Cross-platform window for Vulkan presentation. Besides the surface handles
//! the renderer needs, it turns GLFW events into the small per-frame summary
//! the viewer loop consumes.

use crate::input::CameraInput;
use raw_window_handle::{
    DisplayHandle, HandleError, HasDisplayHandle, HasWindowHandle, WindowHandle,
};
use std::path::PathBuf;
use thiserror::Error;

/// Window management errors
#[derive(Error, Debug)]
pub enum WindowError {
    #[error("GLFW initialization failed")]
    InitializationFailed,

    #[error("Window creation failed")]
    CreationFailed,

    #[error("GLFW error: {0}")]
    GlfwError(String),
}

pub type WindowResult<T> = Result<T, WindowError>;

/// Events gathered during one [`Window::poll_events`] call
#[derive(Debug, Default, Clone, PartialEq)]
pub struct WindowEvents {
    /// Framebuffer size changed
    pub resized: bool,
    /// Files dropped onto the window, in drop order
    pub dropped_files: Vec<PathBuf>,
    /// Accumulated vertical scroll
    pub scroll: f32,
    /// Keys pressed this frame (press edges only, no repeats)
    pub pressed_keys: Vec<glfw::Key>,
}

/// GLFW window wrapper with proper resource management
pub struct Window {
    glfw: glfw::Glfw,
    window: glfw::PWindow,
    events: glfw::GlfwReceiver<(f64, glfw::WindowEvent)>,
}

impl Window {
    pub fn new(title: &str, width: u32, height: u32) -> WindowResult<Self> {
        let mut glfw = glfw::init(glfw::fail_on_errors)
            .map_err(|_| WindowError::InitializationFailed)?;

        if !glfw.vulkan_supported() {
            return Err(WindowError::GlfwError("Vulkan loader not found".to_string()));
        }

        // Vulkan presents through its own surface
        glfw.window_hint(glfw::WindowHint::ClientApi(glfw::ClientApiHint::NoApi));
        glfw.window_hint(glfw::WindowHint::Resizable(true));

        let (mut window, events) = glfw
            .create_window(width, height, title, glfw::WindowMode::Windowed)
            .ok_or(WindowError::CreationFailed)?;

        window.set_key_polling(true);
        window.set_close_polling(true);
        window.set_framebuffer_size_polling(true);
        window.set_scroll_polling(true);
        window.set_drag_and_drop_polling(true);

        log::info!("Created {}x{} window '{}'", width, height, title);

        Ok(Self {
            glfw,
            window,
            events,
        })
    }

    pub fn should_close(&self) -> bool {
        self.window.should_close()
    }

    pub fn set_should_close(&mut self, should_close: bool) {
        self.window.set_should_close(should_close);
    }

    /// Pump the GLFW queue and summarize what happened
    pub fn poll_events(&mut self) -> WindowEvents {
        self.glfw.poll_events();

        let mut summary = WindowEvents::default();
        for (_, event) in glfw::flush_messages(&self.events) {
            match event {
                glfw::WindowEvent::FramebufferSize(width, height) => {
                    log::debug!("Framebuffer resized to {}x{}", width, height);
                    summary.resized = true;
                }
                glfw::WindowEvent::FileDrop(paths) => summary.dropped_files.extend(paths),
                glfw::WindowEvent::Scroll(_, y) => summary.scroll += y as f32,
                glfw::WindowEvent::Key(glfw::Key::Escape, _, glfw::Action::Press, _) => {
                    self.window.set_should_close(true);
                }
                glfw::WindowEvent::Key(key, _, glfw::Action::Press, _) => summary.pressed_keys.push(key),
                _ => {}
            }
        }
        summary
    }

    /// Block until the framebuffer has a non-zero size (minimized windows)
    pub fn wait_while_minimized(&mut self) {
        while !self.window.should_close() {
            let (width, height) = self.framebuffer_size();
            if width > 0 && height > 0 {
                break;
            }
            self.glfw.wait_events();
        }
    }

    /// Current framebuffer size in pixels
    pub fn framebuffer_size(&self) -> (u32, u32) {
        let (width, height) = self.window.get_framebuffer_size();
        (width.max(0) as u32, height.max(0) as u32)
    }

    /// Seconds since GLFW initialization
    pub fn time(&self) -> f64 {
        self.glfw.get_time()
    }

    /// Sample held keys and the cursor for camera control
    pub fn camera_input(&self, scroll: f32) -> CameraInput {
        let held = |key| self.window.get_key(key) == glfw::Action::Press;

        CameraInput {
            forward: held(glfw::Key::W),
            backward: held(glfw::Key::S),
            left: held(glfw::Key::A),
            right: held(glfw::Key::D),
            up: held(glfw::Key::Space) || held(glfw::Key::E),
            down: held(glfw::Key::LeftShift) || held(glfw::Key::Q),
            rotating: self.window.get_mouse_button(glfw::MouseButtonRight) == glfw::Action::Press,
            cursor: self.window.get_cursor_pos(),
            scroll,
        }
    }
}

impl HasWindowHandle for Window {
    fn window_handle(&self) -> Result<WindowHandle<'_>, HandleError> {
        self.window.window_handle()
    }
}

impl HasDisplayHandle for Window {
    fn display_handle(&self) -> Result<DisplayHandle<'_>, HandleError> {
        self.window.display_handle()
    }
}
