// Vulkan rendering components

pub mod attachments;
pub mod draw_state;
pub mod shader_object;

pub use attachments::*;
pub use draw_state::*;
pub use shader_object::*;
