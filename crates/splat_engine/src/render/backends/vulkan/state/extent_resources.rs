//! Resources whose lifetime follows the swapchain extent
//!
//! The command pool with one command buffer per frame slot, and the shared
//! depth-stencil image. Recreation tears everything down after an idle wait
//! and rebuilds it, so repeated resizes never accumulate resources.

use crate::render::backends::vulkan::resources::{depth_aspect, GpuAllocator, GpuImage};
use crate::render::backends::vulkan::{VulkanError, VulkanResult};
use ash::vk;

/// Creates and destroys the extent-dependent resources
pub trait ExtentResourceFactory {
    type CommandPool;
    type CommandBuffer: Copy;
    type DepthImage;
    type Error;

    fn wait_idle(&mut self) -> Result<(), Self::Error>;

    fn create_command_pool(&mut self) -> Result<Self::CommandPool, Self::Error>;

    fn allocate_command_buffers(
        &mut self,
        pool: &Self::CommandPool,
        count: usize,
    ) -> Result<Vec<Self::CommandBuffer>, Self::Error>;

    /// Destroy the pool and every command buffer allocated from it
    fn destroy_command_pool(&mut self, pool: Self::CommandPool);

    fn create_depth_image(&mut self, extent: vk::Extent2D) -> Result<Self::DepthImage, Self::Error>;

    fn destroy_depth_image(&mut self, image: Self::DepthImage);
}

/// Command pool, per-slot command buffers and depth image for one extent
pub struct ExtentResources<P, C, D> {
    command_pool: Option<P>,
    command_buffers: Vec<C>,
    depth_image: Option<D>,
    extent: vk::Extent2D,
    frames_in_flight: usize,
}

impl<P, C: Copy, D> ExtentResources<P, C, D> {
    pub fn create<F>(factory: &mut F, extent: vk::Extent2D, frames_in_flight: usize) -> Result<Self, F::Error>
    where
        F: ExtentResourceFactory<CommandPool = P, CommandBuffer = C, DepthImage = D>,
    {
        let mut resources = Self {
            command_pool: None,
            command_buffers: Vec::new(),
            depth_image: None,
            extent,
            frames_in_flight,
        };
        resources.build(factory, extent)?;
        Ok(resources)
    }

    /// Idle-wait, destroy, and rebuild at `extent`
    pub fn recreate<F>(&mut self, factory: &mut F, extent: vk::Extent2D) -> Result<(), F::Error>
    where
        F: ExtentResourceFactory<CommandPool = P, CommandBuffer = C, DepthImage = D>,
    {
        factory.wait_idle()?;
        self.destroy(factory);
        self.build(factory, extent)
    }

    fn build<F>(&mut self, factory: &mut F, extent: vk::Extent2D) -> Result<(), F::Error>
    where
        F: ExtentResourceFactory<CommandPool = P, CommandBuffer = C, DepthImage = D>,
    {
        let pool = factory.create_command_pool()?;
        let command_buffers = match factory.allocate_command_buffers(&pool, self.frames_in_flight) {
            Ok(buffers) => buffers,
            Err(e) => {
                factory.destroy_command_pool(pool);
                return Err(e);
            }
        };
        self.command_pool = Some(pool);
        self.command_buffers = command_buffers;

        self.depth_image = Some(factory.create_depth_image(extent)?);
        self.extent = extent;
        Ok(())
    }

    /// Release everything; the device must be idle
    pub fn destroy<F>(&mut self, factory: &mut F)
    where
        F: ExtentResourceFactory<CommandPool = P, CommandBuffer = C, DepthImage = D>,
    {
        self.command_buffers.clear();
        if let Some(pool) = self.command_pool.take() {
            factory.destroy_command_pool(pool);
        }
        if let Some(depth) = self.depth_image.take() {
            factory.destroy_depth_image(depth);
        }
    }

    /// Command buffer of frame slot `slot`
    pub fn command_buffer(&self, slot: usize) -> Option<C> {
        self.command_buffers.get(slot).copied()
    }

    pub fn command_buffer_count(&self) -> usize {
        self.command_buffers.len()
    }

    pub fn depth_image(&self) -> Option<&D> {
        self.depth_image.as_ref()
    }

    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }
}

/// Extent resources backed by real Vulkan objects
pub type VulkanExtentResources = ExtentResources<vk::CommandPool, vk::CommandBuffer, GpuImage>;

/// Vulkan implementation of [`ExtentResourceFactory`]
pub struct VulkanExtentFactory<'a> {
    pub device: &'a ash::Device,
    pub allocator: &'a GpuAllocator,
    pub queue_family: u32,
    pub depth_format: vk::Format,
}

impl ExtentResourceFactory for VulkanExtentFactory<'_> {
    type CommandPool = vk::CommandPool;
    type CommandBuffer = vk::CommandBuffer;
    type DepthImage = GpuImage;
    type Error = VulkanError;

    fn wait_idle(&mut self) -> VulkanResult<()> {
        unsafe { self.device.device_wait_idle() }.map_err(VulkanError::Api)
    }

    fn create_command_pool(&mut self) -> VulkanResult<vk::CommandPool> {
        let pool_info = vk::CommandPoolCreateInfo::default()
            .queue_family_index(self.queue_family)
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);
        unsafe { self.device.create_command_pool(&pool_info, None) }.map_err(VulkanError::Api)
    }

    fn allocate_command_buffers(
        &mut self,
        pool: &vk::CommandPool,
        count: usize,
    ) -> VulkanResult<Vec<vk::CommandBuffer>> {
        let alloc_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(*pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(count as u32);
        unsafe { self.device.allocate_command_buffers(&alloc_info) }.map_err(VulkanError::Api)
    }

    fn destroy_command_pool(&mut self, pool: vk::CommandPool) {
        unsafe { self.device.destroy_command_pool(pool, None) };
    }

    fn create_depth_image(&mut self, extent: vk::Extent2D) -> VulkanResult<GpuImage> {
        GpuImage::new(
            self.allocator,
            self.device,
            extent,
            self.depth_format,
            vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
            depth_aspect(self.depth_format),
        )
    }

    fn destroy_depth_image(&mut self, image: GpuImage) {
        image.destroy(self.allocator, self.device);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct CountingFactory {
        next_id: u32,
        live_pools: Vec<u32>,
        live_buffers: Vec<(u32, u32)>,
        live_depth: Vec<(u32, vk::Extent2D)>,
        idle_waits: u32,
        fail_depth: bool,
    }

    impl CountingFactory {
        fn id(&mut self) -> u32 {
            self.next_id += 1;
            self.next_id
        }
    }

    impl ExtentResourceFactory for CountingFactory {
        type CommandPool = u32;
        type CommandBuffer = (u32, u32);
        type DepthImage = (u32, vk::Extent2D);
        type Error = String;

        fn wait_idle(&mut self) -> Result<(), String> {
            self.idle_waits += 1;
            Ok(())
        }

        fn create_command_pool(&mut self) -> Result<u32, String> {
            let id = self.id();
            self.live_pools.push(id);
            Ok(id)
        }

        fn allocate_command_buffers(&mut self, pool: &u32, count: usize) -> Result<Vec<(u32, u32)>, String> {
            let buffers: Vec<(u32, u32)> = (0..count).map(|_| (*pool, self.id())).collect();
            self.live_buffers.extend(&buffers);
            Ok(buffers)
        }

        fn destroy_command_pool(&mut self, pool: u32) {
            self.live_pools.retain(|&live| live != pool);
            self.live_buffers.retain(|&(owner, _)| owner != pool);
        }

        fn create_depth_image(&mut self, extent: vk::Extent2D) -> Result<(u32, vk::Extent2D), String> {
            if self.fail_depth {
                return Err("no memory".to_string());
            }
            let image = (self.id(), extent);
            self.live_depth.push(image);
            Ok(image)
        }

        fn destroy_depth_image(&mut self, image: (u32, vk::Extent2D)) {
            self.live_depth.retain(|&(live, _)| live != image.0);
        }
    }

    const FRAMES: usize = 2;

    fn extent(width: u32, height: u32) -> vk::Extent2D {
        vk::Extent2D { width, height }
    }

    #[test]
    fn test_repeated_recreation_does_not_accumulate() {
        let mut factory = CountingFactory::default();
        let mut resources = ExtentResources::create(&mut factory, extent(800, 600), FRAMES).unwrap();

        resources.recreate(&mut factory, extent(1024, 768)).unwrap();
        resources.recreate(&mut factory, extent(1280, 720)).unwrap();

        assert_eq!(factory.live_pools.len(), 1);
        assert_eq!(factory.live_depth.len(), 1);
        assert_eq!(factory.live_buffers.len(), FRAMES);
        assert_eq!(resources.command_buffer_count(), FRAMES);
        assert_eq!(factory.idle_waits, 2);

        assert_eq!(factory.live_depth[0].1, extent(1280, 720));
        assert_eq!(resources.extent(), extent(1280, 720));
        assert_eq!(resources.depth_image().map(|image| image.1), Some(extent(1280, 720)));
    }

    #[test]
    fn test_command_buffers_belong_to_current_pool() {
        let mut factory = CountingFactory::default();
        let mut resources = ExtentResources::create(&mut factory, extent(640, 480), FRAMES).unwrap();
        resources.recreate(&mut factory, extent(640, 480)).unwrap();

        let pool = factory.live_pools[0];
        for slot in 0..FRAMES {
            assert_eq!(resources.command_buffer(slot).map(|buffer| buffer.0), Some(pool));
        }
        assert!(resources.command_buffer(FRAMES).is_none());
    }

    #[test]
    fn test_destroy_releases_everything() {
        let mut factory = CountingFactory::default();
        let mut resources = ExtentResources::create(&mut factory, extent(640, 480), FRAMES).unwrap();
        resources.destroy(&mut factory);

        assert!(factory.live_pools.is_empty());
        assert!(factory.live_buffers.is_empty());
        assert!(factory.live_depth.is_empty());
        assert!(resources.depth_image().is_none());
    }

    #[test]
    fn test_failed_recreation_leaves_no_depth_image() {
        let mut factory = CountingFactory::default();
        let mut resources = ExtentResources::create(&mut factory, extent(640, 480), FRAMES).unwrap();

        factory.fail_depth = true;
        assert!(resources.recreate(&mut factory, extent(800, 600)).is_err());
        assert!(factory.live_depth.is_empty());
        assert!(resources.depth_image().is_none());

        factory.fail_depth = false;
        resources.recreate(&mut factory, extent(800, 600)).unwrap();
        assert_eq!(factory.live_pools.len(), 1);
        assert_eq!(factory.live_depth.len(), 1);
    }
}
