// Vulkan state management

pub mod extent_resources;
pub mod frame_scheduler;
pub mod swapchain;
pub mod sync;

pub use extent_resources::*;
pub use frame_scheduler::*;
pub use swapchain::*;
pub use sync::*;
