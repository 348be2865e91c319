//! Vulkan backend implementation
//!
//! Organized into initialization, resources, rendering and state modules.

/// Instance, device and surface bootstrap
pub mod initialization;

/// GPU memory: buffers, images, descriptors
pub mod resources;

/// Shader objects, dynamic state, rendering attachments
pub mod rendering;

/// Swapchain, synchronization and frame scheduling
pub mod state;

pub use initialization::context::{
    DeviceFeatureSupport, LogicalDevice, PhysicalDeviceInfo, VulkanContext, VulkanError, VulkanInstance,
    VulkanResult,
};
pub use initialization::surface::Surface;

pub use resources::{BufferBackend, BufferRegistry, GpuAllocator, GpuBuffer, GpuImage, InputAttachmentSet};

pub use rendering::{ColorAttachmentState, DrawState, Material, MaterialSource, ShaderObjectPair, VertexInput};

pub use state::{
    AcquireOutcome, ExtentResourceFactory, ExtentResources, Fence, FrameBackend, FrameScheduler, FrameStatus,
    FrameSync, PresentOutcome, Semaphore, Swapchain, VulkanExtentFactory, VulkanExtentResources,
};
