//! Render target images and layout transitions
//!
//! Images are allocated through VMA in device-local memory. Transitions use
//! synchronization2 barriers recorded directly into the frame command buffer.

use super::gpu_buffer::GpuAllocator;
use crate::render::backends::vulkan::{VulkanError, VulkanResult};
use ash::vk;
use vk_mem::Alloc;

/// Depth-stencil formats in order of preference
pub const DEPTH_FORMAT_CANDIDATES: [vk::Format; 3] = [
    vk::Format::D32_SFLOAT_S8_UINT,
    vk::Format::D24_UNORM_S8_UINT,
    vk::Format::D16_UNORM_S8_UINT,
];

/// First candidate for which `supports_depth_attachment` holds
pub fn select_depth_format(supports_depth_attachment: impl Fn(vk::Format) -> bool) -> VulkanResult<vk::Format> {
    DEPTH_FORMAT_CANDIDATES
        .into_iter()
        .find(|&format| supports_depth_attachment(format))
        .ok_or_else(|| VulkanError::NoSuitableFormat("no depth-stencil attachment format supported".to_string()))
}

/// Aspect mask for a depth or depth-stencil format
pub fn depth_aspect(format: vk::Format) -> vk::ImageAspectFlags {
    match format {
        vk::Format::D32_SFLOAT | vk::Format::D16_UNORM | vk::Format::X8_D24_UNORM_PACK32 => {
            vk::ImageAspectFlags::DEPTH
        }
        _ => vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL,
    }
}

/// A 2D image with its allocation and default view
pub struct GpuImage {
    image: vk::Image,
    view: vk::ImageView,
    allocation: vk_mem::Allocation,
    format: vk::Format,
    extent: vk::Extent2D,
    aspect: vk::ImageAspectFlags,
}

impl GpuImage {
    /// Allocate a single-sample, single-mip 2D image and its view
    pub fn new(
        allocator: &GpuAllocator,
        device: &ash::Device,
        extent: vk::Extent2D,
        format: vk::Format,
        usage: vk::ImageUsageFlags,
        aspect: vk::ImageAspectFlags,
    ) -> VulkanResult<Self> {
        let image_info = vk::ImageCreateInfo::default()
            .image_type(vk::ImageType::TYPE_2D)
            .format(format)
            .extent(vk::Extent3D {
                width: extent.width.max(1),
                height: extent.height.max(1),
                depth: 1,
            })
            .mip_levels(1)
            .array_layers(1)
            .samples(vk::SampleCountFlags::TYPE_1)
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);

        let allocation_info = vk_mem::AllocationCreateInfo {
            usage: vk_mem::MemoryUsage::AutoPreferDevice,
            flags: vk_mem::AllocationCreateFlags::DEDICATED_MEMORY,
            ..Default::default()
        };

        let (image, mut allocation) = unsafe { allocator.vma().create_image(&image_info, &allocation_info) }
            .map_err(|e| VulkanError::Allocation(format!("{:?} image {}x{}: {:?}", format, extent.width, extent.height, e)))?;

        let view_info = vk::ImageViewCreateInfo::default()
            .image(image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(format)
            .subresource_range(full_range(aspect));

        let view = match unsafe { device.create_image_view(&view_info, None) } {
            Ok(view) => view,
            Err(e) => {
                unsafe { allocator.vma().destroy_image(image, &mut allocation) };
                return Err(VulkanError::Api(e));
            }
        };

        log::debug!("Created {:?} image {}x{}", format, extent.width, extent.height);

        Ok(Self {
            image,
            view,
            allocation,
            format,
            extent,
            aspect,
        })
    }

    pub fn handle(&self) -> vk::Image {
        self.image
    }

    pub fn view(&self) -> vk::ImageView {
        self.view
    }

    pub fn format(&self) -> vk::Format {
        self.format
    }

    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    pub fn aspect(&self) -> vk::ImageAspectFlags {
        self.aspect
    }

    /// Free the view, image and memory; the device must be idle
    pub fn destroy(mut self, allocator: &GpuAllocator, device: &ash::Device) {
        unsafe {
            device.destroy_image_view(self.view, None);
            allocator.vma().destroy_image(self.image, &mut self.allocation);
        }
    }
}

fn full_range(aspect: vk::ImageAspectFlags) -> vk::ImageSubresourceRange {
    vk::ImageSubresourceRange::default()
        .aspect_mask(aspect)
        .base_mip_level(0)
        .level_count(1)
        .base_array_layer(0)
        .layer_count(1)
}

/// Layout change plus the stages and accesses it orders
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutTransition {
    pub old_layout: vk::ImageLayout,
    pub new_layout: vk::ImageLayout,
    pub src_stage: vk::PipelineStageFlags2,
    pub src_access: vk::AccessFlags2,
    pub dst_stage: vk::PipelineStageFlags2,
    pub dst_access: vk::AccessFlags2,
}

impl LayoutTransition {
    /// Swapchain image about to be cleared by the opaque pass
    pub const UNDEFINED_TO_COLOR: Self = Self {
        old_layout: vk::ImageLayout::UNDEFINED,
        new_layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        src_stage: vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT,
        src_access: vk::AccessFlags2::NONE,
        dst_stage: vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT,
        dst_access: vk::AccessFlags2::COLOR_ATTACHMENT_WRITE,
    };

    /// Depth buffer about to be cleared
    pub const UNDEFINED_TO_DEPTH: Self = Self {
        old_layout: vk::ImageLayout::UNDEFINED,
        new_layout: vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
        src_stage: vk::PipelineStageFlags2::from_raw(
            vk::PipelineStageFlags2::EARLY_FRAGMENT_TESTS.as_raw() | vk::PipelineStageFlags2::LATE_FRAGMENT_TESTS.as_raw(),
        ),
        src_access: vk::AccessFlags2::NONE,
        dst_stage: vk::PipelineStageFlags2::from_raw(
            vk::PipelineStageFlags2::EARLY_FRAGMENT_TESTS.as_raw() | vk::PipelineStageFlags2::LATE_FRAGMENT_TESTS.as_raw(),
        ),
        dst_access: vk::AccessFlags2::from_raw(
            vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_READ.as_raw()
                | vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_WRITE.as_raw(),
        ),
    };

    /// Opaque depth becomes a read-only test input for the translucency pass
    pub const DEPTH_TO_READ_ONLY: Self = Self {
        old_layout: vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
        new_layout: vk::ImageLayout::DEPTH_STENCIL_READ_ONLY_OPTIMAL,
        src_stage: vk::PipelineStageFlags2::LATE_FRAGMENT_TESTS,
        src_access: vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_WRITE,
        dst_stage: vk::PipelineStageFlags2::EARLY_FRAGMENT_TESTS,
        dst_access: vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_READ,
    };

    /// OIT targets prepared for writing and same-pixel reads
    pub const UNDEFINED_TO_LOCAL_READ: Self = Self {
        old_layout: vk::ImageLayout::UNDEFINED,
        new_layout: vk::ImageLayout::RENDERING_LOCAL_READ_KHR,
        src_stage: vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT,
        src_access: vk::AccessFlags2::NONE,
        dst_stage: vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT,
        dst_access: vk::AccessFlags2::from_raw(
            vk::AccessFlags2::COLOR_ATTACHMENT_READ.as_raw() | vk::AccessFlags2::COLOR_ATTACHMENT_WRITE.as_raw(),
        ),
    };

    /// Final color handed to the presentation engine
    pub const COLOR_TO_PRESENT: Self = Self {
        old_layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        new_layout: vk::ImageLayout::PRESENT_SRC_KHR,
        src_stage: vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT,
        src_access: vk::AccessFlags2::COLOR_ATTACHMENT_WRITE,
        dst_stage: vk::PipelineStageFlags2::BOTTOM_OF_PIPE,
        dst_access: vk::AccessFlags2::NONE,
    };
}

/// Record a layout transition for the whole image
pub fn transition_image(
    device: &ash::Device,
    cmd: vk::CommandBuffer,
    image: vk::Image,
    aspect: vk::ImageAspectFlags,
    transition: LayoutTransition,
) {
    let barrier = vk::ImageMemoryBarrier2::default()
        .src_stage_mask(transition.src_stage)
        .src_access_mask(transition.src_access)
        .dst_stage_mask(transition.dst_stage)
        .dst_access_mask(transition.dst_access)
        .old_layout(transition.old_layout)
        .new_layout(transition.new_layout)
        .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .image(image)
        .subresource_range(full_range(aspect));

    let barriers = [barrier];
    let dependency = vk::DependencyInfo::default().image_memory_barriers(&barriers);
    unsafe { device.cmd_pipeline_barrier2(cmd, &dependency) };
}

/// Make color attachment writes visible to input attachment reads of the same pixel
///
/// The images stay in `RENDERING_LOCAL_READ_KHR`, so no layout change is needed.
pub fn local_read_barrier(device: &ash::Device, cmd: vk::CommandBuffer) {
    let barrier = vk::MemoryBarrier2::default()
        .src_stage_mask(vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT)
        .src_access_mask(vk::AccessFlags2::COLOR_ATTACHMENT_WRITE)
        .dst_stage_mask(vk::PipelineStageFlags2::FRAGMENT_SHADER)
        .dst_access_mask(vk::AccessFlags2::INPUT_ATTACHMENT_READ);

    let barriers = [barrier];
    let dependency = vk::DependencyInfo::default()
        .dependency_flags(vk::DependencyFlags::BY_REGION)
        .memory_barriers(&barriers);
    unsafe { device.cmd_pipeline_barrier2(cmd, &dependency) };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_depth_format_preference_order() {
        assert_eq!(select_depth_format(|_| true).unwrap(), vk::Format::D32_SFLOAT_S8_UINT);
        assert_eq!(
            select_depth_format(|format| format != vk::Format::D32_SFLOAT_S8_UINT).unwrap(),
            vk::Format::D24_UNORM_S8_UINT
        );
        assert_eq!(
            select_depth_format(|format| format == vk::Format::D16_UNORM_S8_UINT).unwrap(),
            vk::Format::D16_UNORM_S8_UINT
        );
    }

    #[test]
    fn test_no_depth_format_is_fatal() {
        assert!(matches!(select_depth_format(|_| false), Err(VulkanError::NoSuitableFormat(_))));
    }

    #[test]
    fn test_depth_aspect() {
        assert_eq!(
            depth_aspect(vk::Format::D24_UNORM_S8_UINT),
            vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
        );
        assert_eq!(depth_aspect(vk::Format::D32_SFLOAT), vk::ImageAspectFlags::DEPTH);
    }
}
