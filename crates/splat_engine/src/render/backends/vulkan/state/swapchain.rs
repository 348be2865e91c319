//! Vulkan swapchain management
//!
//! Handles swapchain creation and recreation following RAII principles.
//! Acquire and present report `OUT_OF_DATE`/`SUBOPTIMAL` as outcomes, not
//! errors, so the frame loop can route them into recreation.

use super::frame_scheduler::{AcquireOutcome, PresentOutcome};
use crate::render::backends::vulkan::{VulkanContext, VulkanError, VulkanResult};
use ash::vk;

/// Preferred surface format, falling back to whatever the surface lists first
pub fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> VulkanResult<vk::SurfaceFormatKHR> {
    formats
        .iter()
        .find(|format| {
            format.format == vk::Format::B8G8R8A8_SRGB && format.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
        })
        .or_else(|| formats.first())
        .copied()
        .ok_or_else(|| VulkanError::NoSuitableFormat("surface reports no formats".to_string()))
}

/// Mailbox when preferred and available, FIFO otherwise
pub fn choose_present_mode(modes: &[vk::PresentModeKHR], prefer_mailbox: bool) -> vk::PresentModeKHR {
    if prefer_mailbox {
        if modes.contains(&vk::PresentModeKHR::MAILBOX) {
            return vk::PresentModeKHR::MAILBOX;
        }
        log::warn!("Mailbox present mode unavailable, using FIFO");
    }
    // FIFO support is mandatory
    vk::PresentModeKHR::FIFO
}

/// Surface extent, or the window size clamped to the surface limits
pub fn choose_extent(capabilities: &vk::SurfaceCapabilitiesKHR, window_extent: vk::Extent2D) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        return capabilities.current_extent;
    }

    vk::Extent2D {
        width: window_extent.width.clamp(
            capabilities.min_image_extent.width,
            capabilities.max_image_extent.width,
        ),
        height: window_extent.height.clamp(
            capabilities.min_image_extent.height,
            capabilities.max_image_extent.height,
        ),
    }
}

/// One more than the minimum, capped by the maximum when it is set
pub fn choose_image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let desired = capabilities.min_image_count + 1;
    if capabilities.max_image_count > 0 {
        desired.min(capabilities.max_image_count)
    } else {
        desired
    }
}

/// Swapchain management wrapper with RAII cleanup
pub struct Swapchain {
    device: ash::Device,
    loader: ash::khr::swapchain::Device,
    swapchain: vk::SwapchainKHR,
    images: Vec<vk::Image>,
    image_views: Vec<vk::ImageView>,
    format: vk::SurfaceFormatKHR,
    present_mode: vk::PresentModeKHR,
    extent: vk::Extent2D,
}

impl Swapchain {
    pub fn new(context: &VulkanContext, window_extent: vk::Extent2D, prefer_mailbox: bool) -> VulkanResult<Self> {
        Self::create(context, window_extent, prefer_mailbox, vk::SwapchainKHR::null())
    }

    /// Replace this swapchain with one sized to `window_extent`
    ///
    /// The device must be idle.
    pub fn recreate(&mut self, context: &VulkanContext, window_extent: vk::Extent2D) -> VulkanResult<()> {
        let prefer_mailbox = self.present_mode == vk::PresentModeKHR::MAILBOX;
        let replacement = Self::create(context, window_extent, prefer_mailbox, self.swapchain)?;
        // Assignment drops the retired swapchain
        *self = replacement;
        Ok(())
    }

    fn create(
        context: &VulkanContext,
        window_extent: vk::Extent2D,
        prefer_mailbox: bool,
        old_swapchain: vk::SwapchainKHR,
    ) -> VulkanResult<Self> {
        let physical_device = context.physical_device.device;
        let capabilities = context.surface.capabilities(physical_device)?;
        let format = choose_surface_format(&context.surface.formats(physical_device)?)?;
        let present_mode = choose_present_mode(&context.surface.present_modes(physical_device)?, prefer_mailbox);
        let extent = choose_extent(&capabilities, window_extent);
        let image_count = choose_image_count(&capabilities);

        let queue_families = [context.graphics_queue_family(), context.present_queue_family()];
        let mut create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(context.surface.handle())
            .min_image_count(image_count)
            .image_format(format.format)
            .image_color_space(format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .pre_transform(capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .clipped(true)
            .old_swapchain(old_swapchain);

        create_info = if queue_families[0] != queue_families[1] {
            create_info
                .image_sharing_mode(vk::SharingMode::CONCURRENT)
                .queue_family_indices(&queue_families)
        } else {
            create_info.image_sharing_mode(vk::SharingMode::EXCLUSIVE)
        };

        let loader = context.device.swapchain_loader.clone();
        let device = context.raw_device().clone();

        let swapchain = unsafe { loader.create_swapchain(&create_info, None) }.map_err(VulkanError::Api)?;

        let images = match unsafe { loader.get_swapchain_images(swapchain) } {
            Ok(images) => images,
            Err(e) => {
                unsafe { loader.destroy_swapchain(swapchain, None) };
                return Err(VulkanError::Api(e));
            }
        };

        let mut image_views = Vec::with_capacity(images.len());
        for &image in &images {
            let view_info = vk::ImageViewCreateInfo::default()
                .image(image)
                .view_type(vk::ImageViewType::TYPE_2D)
                .format(format.format)
                .subresource_range(
                    vk::ImageSubresourceRange::default()
                        .aspect_mask(vk::ImageAspectFlags::COLOR)
                        .level_count(1)
                        .layer_count(1),
                );

            match unsafe { device.create_image_view(&view_info, None) } {
                Ok(view) => image_views.push(view),
                Err(e) => {
                    unsafe {
                        for view in image_views {
                            device.destroy_image_view(view, None);
                        }
                        loader.destroy_swapchain(swapchain, None);
                    }
                    return Err(VulkanError::Api(e));
                }
            }
        }

        log::info!(
            "Created swapchain {}x{} ({:?}, {:?}, {} images)",
            extent.width,
            extent.height,
            format.format,
            present_mode,
            images.len()
        );

        Ok(Self {
            device,
            loader,
            swapchain,
            images,
            image_views,
            format,
            present_mode,
            extent,
        })
    }

    /// Acquire the next image, signalling `semaphore` when it is ready
    pub fn acquire_next_image(&self, semaphore: vk::Semaphore) -> VulkanResult<AcquireOutcome> {
        let result = unsafe {
            self.loader
                .acquire_next_image(self.swapchain, u64::MAX, semaphore, vk::Fence::null())
        };

        match result {
            Ok((image_index, suboptimal)) => Ok(AcquireOutcome::Acquired { image_index, suboptimal }),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(AcquireOutcome::OutOfDate),
            Err(e) => Err(VulkanError::Api(e)),
        }
    }

    /// Present `image_index` once `wait_semaphore` signals
    pub fn present(
        &self,
        queue: vk::Queue,
        image_index: u32,
        wait_semaphore: vk::Semaphore,
    ) -> VulkanResult<PresentOutcome> {
        let wait_semaphores = [wait_semaphore];
        let swapchains = [self.swapchain];
        let image_indices = [image_index];
        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        match unsafe { self.loader.queue_present(queue, &present_info) } {
            Ok(false) => Ok(PresentOutcome::Presented),
            Ok(true) => Ok(PresentOutcome::Suboptimal),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(PresentOutcome::OutOfDate),
            Err(e) => Err(VulkanError::Api(e)),
        }
    }

    pub fn handle(&self) -> vk::SwapchainKHR {
        self.swapchain
    }

    pub fn image(&self, index: u32) -> vk::Image {
        self.images[index as usize]
    }

    pub fn image_view(&self, index: u32) -> vk::ImageView {
        self.image_views[index as usize]
    }

    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    pub fn format(&self) -> vk::Format {
        self.format.format
    }

    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        unsafe {
            for &view in &self.image_views {
                self.device.destroy_image_view(view, None);
            }
            self.loader.destroy_swapchain(self.swapchain, None);
        }
    }
}
