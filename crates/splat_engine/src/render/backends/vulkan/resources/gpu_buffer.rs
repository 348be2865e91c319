//! GPU buffer allocation through VMA
//!
//! Two strategies cover every buffer the viewer creates:
//!
//! - staged: host data goes through a temporary staging buffer into
//!   device-local memory with a blocking one-shot copy (model loads)
//! - persistently mapped: host-visible memory mapped for the buffer's whole
//!   lifetime and written every frame (camera uniforms)
//!
//! Every buffer is created with `SHADER_DEVICE_ADDRESS` so shaders can reach it
//! through push-constant pointers instead of descriptor sets.

use crate::render::backends::vulkan::{VulkanContext, VulkanError, VulkanResult};
use ash::vk;
use bytemuck::Pod;
use vk_mem::Alloc;

/// A buffer, its allocation and its GPU address
pub struct GpuBuffer {
    buffer: vk::Buffer,
    allocation: vk_mem::Allocation,
    size: vk::DeviceSize,
    device_address: vk::DeviceAddress,
    mapped: *mut u8,
}

impl GpuBuffer {
    pub fn handle(&self) -> vk::Buffer {
        self.buffer
    }

    pub fn size(&self) -> vk::DeviceSize {
        self.size
    }

    /// Address for `buffer_reference` access in shaders
    pub fn device_address(&self) -> vk::DeviceAddress {
        self.device_address
    }

    /// True when the buffer was created with persistent mapping
    pub fn is_mapped(&self) -> bool {
        !self.mapped.is_null()
    }
}

impl std::fmt::Debug for GpuBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpuBuffer")
            .field("buffer", &self.buffer)
            .field("size", &self.size)
            .field("device_address", &self.device_address)
            .field("mapped", &self.is_mapped())
            .finish()
    }
}

/// Owns the VMA allocator and the command pool used for staged uploads
pub struct GpuAllocator {
    device: ash::Device,
    queue: vk::Queue,
    upload_pool: vk::CommandPool,
    allocator: vk_mem::Allocator,
}

impl GpuAllocator {
    pub fn new(context: &VulkanContext) -> VulkanResult<Self> {
        let device = context.raw_device().clone();

        let mut create_info =
            vk_mem::AllocatorCreateInfo::new(context.instance(), &device, context.physical_device.device);
        create_info.flags = vk_mem::AllocatorCreateFlags::BUFFER_DEVICE_ADDRESS;
        create_info.vulkan_api_version = vk::API_VERSION_1_3;

        let allocator = unsafe { vk_mem::Allocator::new(create_info) }
            .map_err(|e| VulkanError::Allocation(format!("Failed to create allocator: {:?}", e)))?;

        let pool_info = vk::CommandPoolCreateInfo::default()
            .queue_family_index(context.graphics_queue_family())
            .flags(vk::CommandPoolCreateFlags::TRANSIENT | vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);
        let upload_pool = unsafe { device.create_command_pool(&pool_info, None) }.map_err(VulkanError::Api)?;

        Ok(Self {
            queue: context.graphics_queue(),
            device,
            upload_pool,
            allocator,
        })
    }

    /// Raw VMA allocator, for image allocations
    pub fn vma(&self) -> &vk_mem::Allocator {
        &self.allocator
    }

    /// Block until the GPU has finished all submitted work
    pub fn wait_device_idle(&self) -> VulkanResult<()> {
        unsafe { self.device.device_wait_idle() }.map_err(VulkanError::Api)
    }

    /// Create a buffer; allocation failure is returned, never a null handle
    pub fn create_buffer(
        &self,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
        memory_usage: vk_mem::MemoryUsage,
        flags: vk_mem::AllocationCreateFlags,
    ) -> VulkanResult<GpuBuffer> {
        if size == 0 {
            return Err(VulkanError::InvalidOperation {
                reason: "Zero-sized buffer requested".to_string(),
            });
        }

        let usage = usage | vk::BufferUsageFlags::SHADER_DEVICE_ADDRESS;
        let buffer_info = vk::BufferCreateInfo::default()
            .size(size)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);
        let allocation_info = vk_mem::AllocationCreateInfo {
            flags,
            usage: memory_usage,
            ..Default::default()
        };

        let (buffer, allocation, device_address, mapped) = unsafe {
            let (buffer, allocation) = self
                .allocator
                .create_buffer(&buffer_info, &allocation_info)
                .map_err(|e| VulkanError::Allocation(format!("{} byte buffer ({:?}): {:?}", size, usage, e)))?;

            let device_address = self
                .device
                .get_buffer_device_address(&vk::BufferDeviceAddressInfo::default().buffer(buffer));

            let mapped = if flags.contains(vk_mem::AllocationCreateFlags::MAPPED) {
                self.allocator.get_allocation_info(&allocation).mapped_data.cast::<u8>()
            } else {
                std::ptr::null_mut()
            };

            (buffer, allocation, device_address, mapped)
        };

        log::trace!("Allocated {} byte buffer at 0x{:x}", size, device_address);

        Ok(GpuBuffer {
            buffer,
            allocation,
            size,
            device_address,
            mapped,
        })
    }

    /// Host-visible buffer mapped for its whole lifetime
    pub fn allocate_buffer_with_mapped_access(
        &self,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
    ) -> VulkanResult<GpuBuffer> {
        let buffer = self.create_buffer(
            size,
            usage,
            vk_mem::MemoryUsage::Auto,
            vk_mem::AllocationCreateFlags::HOST_ACCESS_SEQUENTIAL_WRITE | vk_mem::AllocationCreateFlags::MAPPED,
        )?;

        if !buffer.is_mapped() {
            let mut buffer = buffer;
            self.destroy_buffer(&mut buffer);
            return Err(VulkanError::Allocation("Mapped allocation returned no pointer".to_string()));
        }
        Ok(buffer)
    }

    /// Upload `data` into a new device-local buffer
    ///
    /// Blocks until the copy has finished; the staging buffer is gone on return.
    pub fn create_buffer_with_staging<T: Pod>(
        &self,
        data: &[T],
        usage: vk::BufferUsageFlags,
    ) -> VulkanResult<GpuBuffer> {
        let bytes: &[u8] = bytemuck::cast_slice(data);
        let size = bytes.len() as vk::DeviceSize;

        let mut staging = self.allocate_buffer_with_mapped_access(size, vk::BufferUsageFlags::TRANSFER_SRC)?;
        let result = self.write_mapped(&staging, bytes).and_then(|()| {
            let mut target = self.create_buffer(
                size,
                usage | vk::BufferUsageFlags::TRANSFER_DST,
                vk_mem::MemoryUsage::AutoPreferDevice,
                vk_mem::AllocationCreateFlags::empty(),
            )?;

            if let Err(e) = self.copy_buffer(staging.handle(), target.handle(), size) {
                self.destroy_buffer(&mut target);
                return Err(e);
            }
            Ok(target)
        });

        self.destroy_buffer(&mut staging);
        result
    }

    /// Write into a persistently mapped buffer and flush it
    pub fn write_mapped<T: Pod>(&self, buffer: &GpuBuffer, data: &[T]) -> VulkanResult<()> {
        let bytes: &[u8] = bytemuck::cast_slice(data);
        if !buffer.is_mapped() {
            return Err(VulkanError::InvalidOperation {
                reason: "Buffer is not host mapped".to_string(),
            });
        }
        if bytes.len() as vk::DeviceSize > buffer.size {
            return Err(VulkanError::InvalidOperation {
                reason: format!("Write of {} bytes exceeds buffer of {} bytes", bytes.len(), buffer.size),
            });
        }

        unsafe {
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), buffer.mapped, bytes.len());

            // No-op on coherent memory
            self.allocator
                .flush_allocation(&buffer.allocation, 0, vk::WHOLE_SIZE)
                .map_err(VulkanError::Api)
        }
    }

    /// Free a buffer
    ///
    /// The caller guarantees no in-flight command buffer still references it.
    pub fn destroy_buffer(&self, buffer: &mut GpuBuffer) {
        unsafe {
            self.allocator.destroy_buffer(buffer.buffer, &mut buffer.allocation);
        }
        buffer.buffer = vk::Buffer::null();
        buffer.mapped = std::ptr::null_mut();
    }

    fn copy_buffer(&self, src: vk::Buffer, dst: vk::Buffer, size: vk::DeviceSize) -> VulkanResult<()> {
        let alloc_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(self.upload_pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);

        let command_buffers = unsafe { self.device.allocate_command_buffers(&alloc_info) }.map_err(VulkanError::Api)?;

        let result = unsafe {
            let cmd = command_buffers[0];
            let begin_info =
                vk::CommandBufferBeginInfo::default().flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);

            self.device
                .begin_command_buffer(cmd, &begin_info)
                .and_then(|()| {
                    let region = vk::BufferCopy::default().size(size);
                    self.device.cmd_copy_buffer(cmd, src, dst, &[region]);
                    self.device.end_command_buffer(cmd)
                })
                .and_then(|()| {
                    let submit = vk::SubmitInfo::default().command_buffers(&command_buffers);
                    self.device.queue_submit(self.queue, &[submit], vk::Fence::null())
                })
                .and_then(|()| self.device.queue_wait_idle(self.queue))
        };

        unsafe {
            self.device.free_command_buffers(self.upload_pool, &command_buffers);
        }
        result.map_err(VulkanError::Api)
    }
}

impl Drop for GpuAllocator {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_command_pool(self.upload_pool, None);
        }
        // The VMA allocator is destroyed when its field drops.
    }
}
