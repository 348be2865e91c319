//! GPU memory: buffers, the named buffer registry, images and descriptors

pub mod buffer_registry;
pub mod descriptors;
pub mod gpu_buffer;
pub mod image;

pub use buffer_registry::{BufferBackend, BufferRegistry, PLACEHOLDER_BYTES};
pub use descriptors::{InputAttachmentSet, COMPOSITE_INPUT_COUNT};
pub use gpu_buffer::{GpuAllocator, GpuBuffer};
pub use image::{
    depth_aspect, local_read_barrier, select_depth_format, transition_image, GpuImage, LayoutTransition,
    DEPTH_FORMAT_CANDIDATES,
};
