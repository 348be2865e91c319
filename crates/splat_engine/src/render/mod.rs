//! # Rendering
//!
//! The Vulkan backend, the four splat passes and the orchestrator that runs
//! them once per frame.
//!
//! ## Frame structure
//!
//! ```text
//! forward_geometry  clear color/depth, opaque splats (depth write)
//! translucency      accumulation + revealage (depth test only)
//! screenspace       local-read resolve over the opaque color
//! ui_overlay        load, overlay, transition to present
//! ```

pub mod backends;
pub mod oit;
pub mod primitives;
pub mod render_pass;
pub mod subpasses;
pub mod window;

pub use backends::vulkan::{FrameStatus, VulkanError, VulkanResult};
pub use primitives::{CameraData, CameraMovement, FirstPersonCamera};
pub use render_pass::RenderPass;
pub use subpasses::{RenderTargets, SceneInfo, Subpass, SubpassEvent, SubpassState};
pub use window::{Window, WindowError, WindowEvents, WindowResult};
