//! # Splat Engine
//!
//! Vulkan renderer for 3D Gaussian splat point clouds.
//!
//! ## Features
//!
//! - **Shader objects**: no pipeline objects, all state is dynamic
//! - **Dynamic rendering with local read**: the OIT resolve reads the
//!   accumulation targets as input attachments inside the render area
//! - **Weighted-blended OIT**: translucent splats need no sorting
//! - **Named GPU buffers**: splat data is reached through buffer device addresses
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use splat_engine::prelude::*;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ViewerConfig::default();
//!     let mut window = Window::new(&config.window.title, config.window.width, config.window.height)?;
//!     let mut renderer = RenderPass::new(&window, &config)?;
//!     renderer.load_splat_file(std::path::Path::new("scene.ply"))?;
//!
//!     while !window.should_close() {
//!         window.poll_events();
//!         renderer.draw_frame(window.framebuffer_size())?;
//!     }
//!     Ok(())
//! }
//! ```

pub mod assets;
pub mod config;
pub mod core;
pub mod foundation;
pub mod input;
pub mod render;

/// Common imports for viewer code
pub mod prelude {
    pub use crate::{
        assets::{SplatCloud, SplatLoader},
        core::{Config, ViewerConfig},
        foundation::math::{Mat4, Vec3},
        input::{CameraController, UiAction, UiActionQueue},
        render::{FirstPersonCamera, RenderPass, Window},
    };
}
