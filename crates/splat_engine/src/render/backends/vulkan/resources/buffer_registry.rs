//! Named GPU buffer registry
//!
//! Maps logical names (`"positions"`, `"cube_buffer"`, `"camera_data_buffer_0"`)
//! to live buffers. Replacing a name waits for the device to go idle and frees
//! the old buffer first, so no in-flight command buffer ever reads freed
//! memory and no two live buffers share a name.

use super::gpu_buffer::{GpuAllocator, GpuBuffer};
use crate::render::backends::vulkan::{VulkanError, VulkanResult};
use ash::vk;
use bytemuck::Pod;
use std::collections::HashMap;

/// Stand-in contents for empty uploads; zero-sized buffers are not allowed
pub const PLACEHOLDER_BYTES: [u8; 16] = [0; 16];

/// Buffer operations the registry needs from the GPU
pub trait BufferBackend {
    type Buffer;
    type Error;

    /// Block until no submitted work references any buffer
    fn wait_idle(&mut self) -> Result<(), Self::Error>;

    /// Device-local buffer initialised with `bytes`
    fn upload(&mut self, bytes: &[u8], usage: vk::BufferUsageFlags) -> Result<Self::Buffer, Self::Error>;

    /// Persistently mapped host-visible buffer
    fn create_mapped(&mut self, size: vk::DeviceSize, usage: vk::BufferUsageFlags) -> Result<Self::Buffer, Self::Error>;

    fn destroy(&mut self, buffer: Self::Buffer);
}

impl BufferBackend for GpuAllocator {
    type Buffer = GpuBuffer;
    type Error = VulkanError;

    fn wait_idle(&mut self) -> VulkanResult<()> {
        self.wait_device_idle()
    }

    fn upload(&mut self, bytes: &[u8], usage: vk::BufferUsageFlags) -> VulkanResult<GpuBuffer> {
        self.create_buffer_with_staging(bytes, usage)
    }

    fn create_mapped(&mut self, size: vk::DeviceSize, usage: vk::BufferUsageFlags) -> VulkanResult<GpuBuffer> {
        self.allocate_buffer_with_mapped_access(size, usage)
    }

    fn destroy(&mut self, mut buffer: GpuBuffer) {
        self.destroy_buffer(&mut buffer);
    }
}

/// Name to buffer mapping with replace-after-idle semantics
pub struct BufferRegistry<B: BufferBackend> {
    buffers: HashMap<String, B::Buffer>,
}

impl<B: BufferBackend> BufferRegistry<B> {
    pub fn new() -> Self {
        Self {
            buffers: HashMap::new(),
        }
    }

    /// Upload `data` under `name`, replacing any previous buffer of that name
    ///
    /// An empty slice uploads [`PLACEHOLDER_BYTES`] so the name always refers
    /// to a valid buffer.
    pub fn allocate_named_buffer<T: Pod>(
        &mut self,
        backend: &mut B,
        name: &str,
        data: &[T],
        usage: vk::BufferUsageFlags,
    ) -> Result<&B::Buffer, B::Error> {
        let bytes: &[u8] = bytemuck::cast_slice(data);
        let bytes = if bytes.is_empty() { &PLACEHOLDER_BYTES[..] } else { bytes };

        self.release(backend, name)?;
        let buffer = backend.upload(bytes, usage)?;
        log::debug!("Allocated buffer '{}' ({} bytes)", name, bytes.len());

        Ok(self.buffers.entry(name.to_string()).or_insert(buffer))
    }

    /// Create a persistently mapped buffer under `name`
    pub fn allocate_mapped_buffer(
        &mut self,
        backend: &mut B,
        name: &str,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
    ) -> Result<&B::Buffer, B::Error> {
        self.release(backend, name)?;
        let buffer = backend.create_mapped(size.max(PLACEHOLDER_BYTES.len() as vk::DeviceSize), usage)?;
        log::debug!("Allocated mapped buffer '{}' ({} bytes)", name, size);

        Ok(self.buffers.entry(name.to_string()).or_insert(buffer))
    }

    /// Idle-wait and free the buffer under `name`, if any
    fn release(&mut self, backend: &mut B, name: &str) -> Result<(), B::Error> {
        if !self.buffers.contains_key(name) {
            return Ok(());
        }

        backend.wait_idle()?;
        if let Some(old) = self.buffers.remove(name) {
            log::debug!("Destroying previous buffer '{}'", name);
            backend.destroy(old);
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&B::Buffer> {
        self.buffers.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.buffers.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    /// Free every buffer; the device must be idle
    pub fn destroy_all(&mut self, backend: &mut B) {
        for (name, buffer) in self.buffers.drain() {
            log::trace!("Destroying buffer '{}'", name);
            backend.destroy(buffer);
        }
    }
}

impl BufferRegistry<GpuAllocator> {
    /// Look up a buffer, failing with `ResourceNotFound`
    pub fn require(&self, name: &str) -> VulkanResult<&GpuBuffer> {
        self.get(name).ok_or_else(|| VulkanError::ResourceNotFound {
            name: name.to_string(),
        })
    }

    /// Device address of a named buffer
    pub fn device_address(&self, name: &str) -> VulkanResult<vk::DeviceAddress> {
        self.require(name).map(GpuBuffer::device_address)
    }
}

impl<B: BufferBackend> Default for BufferRegistry<B> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[derive(Debug, PartialEq)]
    struct MockBuffer {
        id: u32,
        contents: Vec<u8>,
    }

    #[derive(Default)]
    struct MockBackend {
        next_id: u32,
        live: HashSet<u32>,
        idle: bool,
        idle_waits: u32,
        destroyed_while_busy: u32,
        fail_uploads: bool,
    }

    impl MockBackend {
        /// Pretend work was submitted that may reference live buffers
        fn submit(&mut self) {
            self.idle = false;
        }
    }

    impl BufferBackend for MockBackend {
        type Buffer = MockBuffer;
        type Error = String;

        fn wait_idle(&mut self) -> Result<(), String> {
            self.idle = true;
            self.idle_waits += 1;
            Ok(())
        }

        fn upload(&mut self, bytes: &[u8], _usage: vk::BufferUsageFlags) -> Result<MockBuffer, String> {
            if self.fail_uploads {
                return Err("out of memory".to_string());
            }
            self.next_id += 1;
            self.live.insert(self.next_id);
            Ok(MockBuffer {
                id: self.next_id,
                contents: bytes.to_vec(),
            })
        }

        fn create_mapped(&mut self, size: vk::DeviceSize, usage: vk::BufferUsageFlags) -> Result<MockBuffer, String> {
            self.upload(&vec![0; size as usize], usage)
        }

        fn destroy(&mut self, buffer: MockBuffer) {
            if !self.idle {
                self.destroyed_while_busy += 1;
            }
            assert!(self.live.remove(&buffer.id), "double free of buffer {}", buffer.id);
        }
    }

    const USAGE: vk::BufferUsageFlags = vk::BufferUsageFlags::STORAGE_BUFFER;

    #[test]
    fn test_reallocation_replaces_without_leak() {
        let mut backend = MockBackend::default();
        let mut registry = BufferRegistry::new();

        registry.allocate_named_buffer(&mut backend, "X", &[1u32, 2, 3], USAGE).unwrap();
        backend.submit();
        registry.allocate_named_buffer(&mut backend, "X", &[7u32, 8], USAGE).unwrap();

        assert_eq!(registry.len(), 1);
        assert_eq!(backend.live.len(), 1);
        assert_eq!(backend.destroyed_while_busy, 0);

        let buffer = registry.get("X").unwrap();
        assert_eq!(buffer.contents, bytemuck::cast_slice::<u32, u8>(&[7, 8]));
        assert!(backend.live.contains(&buffer.id));
    }

    #[test]
    fn test_first_allocation_does_not_wait() {
        let mut backend = MockBackend::default();
        let mut registry = BufferRegistry::new();

        registry.allocate_named_buffer(&mut backend, "positions", &[0.0f32; 4], USAGE).unwrap();
        registry.allocate_named_buffer(&mut backend, "scales", &[0.0f32; 4], USAGE).unwrap();
        assert_eq!(backend.idle_waits, 0);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_empty_data_gets_placeholder() {
        let mut backend = MockBackend::default();
        let mut registry = BufferRegistry::new();

        let buffer = registry.allocate_named_buffer::<f32>(&mut backend, "alphas", &[], USAGE).unwrap();
        assert_eq!(buffer.contents, PLACEHOLDER_BYTES.to_vec());
    }

    #[test]
    fn test_failed_replacement_leaves_name_empty() {
        let mut backend = MockBackend::default();
        let mut registry = BufferRegistry::new();

        registry.allocate_named_buffer(&mut backend, "X", &[1u8], USAGE).unwrap();
        backend.fail_uploads = true;
        assert!(registry.allocate_named_buffer(&mut backend, "X", &[2u8], USAGE).is_err());

        assert!(!registry.contains("X"));
        assert!(backend.live.is_empty());
    }

    #[test]
    fn test_destroy_all_frees_everything() {
        let mut backend = MockBackend::default();
        let mut registry = BufferRegistry::new();

        registry.allocate_named_buffer(&mut backend, "a", &[1u8], USAGE).unwrap();
        registry.allocate_mapped_buffer(&mut backend, "b", 64, USAGE).unwrap();
        registry.destroy_all(&mut backend);

        assert!(registry.is_empty());
        assert!(backend.live.is_empty());
    }
}
