//! Descriptor set for the composite pass input attachments
//!
//! Everything else reaches the shaders through buffer device addresses; only
//! the accumulation and revealage targets need descriptors.

use crate::render::backends::vulkan::{VulkanError, VulkanResult};
use ash::vk;

/// Number of input attachments read by the composite shader
pub const COMPOSITE_INPUT_COUNT: u32 = 2;

/// Layout, pool and the single set for the OIT input attachments
pub struct InputAttachmentSet {
    device: ash::Device,
    layout: vk::DescriptorSetLayout,
    pool: vk::DescriptorPool,
    set: vk::DescriptorSet,
}

impl InputAttachmentSet {
    pub fn new(device: &ash::Device) -> VulkanResult<Self> {
        let bindings: Vec<vk::DescriptorSetLayoutBinding> = (0..COMPOSITE_INPUT_COUNT)
            .map(|binding| {
                vk::DescriptorSetLayoutBinding::default()
                    .binding(binding)
                    .descriptor_type(vk::DescriptorType::INPUT_ATTACHMENT)
                    .descriptor_count(1)
                    .stage_flags(vk::ShaderStageFlags::FRAGMENT)
            })
            .collect();

        let layout_info = vk::DescriptorSetLayoutCreateInfo::default().bindings(&bindings);
        let layout = unsafe { device.create_descriptor_set_layout(&layout_info, None) }.map_err(VulkanError::Api)?;

        let pool_sizes = [vk::DescriptorPoolSize::default()
            .ty(vk::DescriptorType::INPUT_ATTACHMENT)
            .descriptor_count(COMPOSITE_INPUT_COUNT)];
        let pool_info = vk::DescriptorPoolCreateInfo::default()
            .max_sets(1)
            .pool_sizes(&pool_sizes);
        let pool = match unsafe { device.create_descriptor_pool(&pool_info, None) } {
            Ok(pool) => pool,
            Err(e) => {
                unsafe { device.destroy_descriptor_set_layout(layout, None) };
                return Err(VulkanError::Api(e));
            }
        };

        let layouts = [layout];
        let alloc_info = vk::DescriptorSetAllocateInfo::default()
            .descriptor_pool(pool)
            .set_layouts(&layouts);
        let set = match unsafe { device.allocate_descriptor_sets(&alloc_info) } {
            Ok(sets) => sets[0],
            Err(e) => {
                unsafe {
                    device.destroy_descriptor_pool(pool, None);
                    device.destroy_descriptor_set_layout(layout, None);
                }
                return Err(VulkanError::Api(e));
            }
        };

        Ok(Self {
            device: device.clone(),
            layout,
            pool,
            set,
        })
    }

    pub fn layout(&self) -> vk::DescriptorSetLayout {
        self.layout
    }

    pub fn set(&self) -> vk::DescriptorSet {
        self.set
    }

    /// Point the bindings at the current accumulation and revealage views
    ///
    /// Must run after every render target recreation; the device must be idle.
    pub fn update(&self, accumulation: vk::ImageView, revealage: vk::ImageView) {
        let image_infos = [accumulation, revealage].map(|view| {
            [vk::DescriptorImageInfo::default()
                .image_view(view)
                .image_layout(vk::ImageLayout::RENDERING_LOCAL_READ_KHR)]
        });

        let writes: Vec<vk::WriteDescriptorSet> = image_infos
            .iter()
            .enumerate()
            .map(|(binding, info)| {
                vk::WriteDescriptorSet::default()
                    .dst_set(self.set)
                    .dst_binding(binding as u32)
                    .descriptor_type(vk::DescriptorType::INPUT_ATTACHMENT)
                    .image_info(info)
            })
            .collect();

        unsafe { self.device.update_descriptor_sets(&writes, &[]) };
    }
}

impl Drop for InputAttachmentSet {
    fn drop(&mut self) {
        unsafe {
            // Frees the set with it
            self.device.destroy_descriptor_pool(self.pool, None);
            self.device.destroy_descriptor_set_layout(self.layout, None);
        }
    }
}
