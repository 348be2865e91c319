//! Vulkan surface management
//!
//! Handles window surface creation and the per-device queries swapchain
//! creation needs.

use super::context::{VulkanError, VulkanResult};
use ash::{vk, Entry, Instance};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};

/// Vulkan surface wrapper for presentation
pub struct Surface {
    loader: ash::khr::surface::Instance,
    surface: vk::SurfaceKHR,
}

impl Surface {
    /// Create a new surface from a window
    pub fn new<W>(entry: &Entry, instance: &Instance, window: &W) -> VulkanResult<Self>
    where
        W: HasWindowHandle + HasDisplayHandle,
    {
        let display_handle = window
            .display_handle()
            .map_err(|e| VulkanError::InitializationFailed(format!("Failed to get display handle: {}", e)))?;
        let window_handle = window
            .window_handle()
            .map_err(|e| VulkanError::InitializationFailed(format!("Failed to get window handle: {}", e)))?;

        let surface = unsafe {
            ash_window::create_surface(entry, instance, display_handle.as_raw(), window_handle.as_raw(), None)
        }
        .map_err(|e| VulkanError::InitializationFailed(format!("Failed to create surface: {:?}", e)))?;

        Ok(Self {
            loader: ash::khr::surface::Instance::new(entry, instance),
            surface,
        })
    }

    /// Get the underlying surface handle
    pub fn handle(&self) -> vk::SurfaceKHR {
        self.surface
    }

    pub fn capabilities(&self, physical_device: vk::PhysicalDevice) -> VulkanResult<vk::SurfaceCapabilitiesKHR> {
        unsafe {
            self.loader
                .get_physical_device_surface_capabilities(physical_device, self.surface)
        }
        .map_err(VulkanError::Api)
    }

    pub fn formats(&self, physical_device: vk::PhysicalDevice) -> VulkanResult<Vec<vk::SurfaceFormatKHR>> {
        unsafe { self.loader.get_physical_device_surface_formats(physical_device, self.surface) }
            .map_err(VulkanError::Api)
    }

    pub fn present_modes(&self, physical_device: vk::PhysicalDevice) -> VulkanResult<Vec<vk::PresentModeKHR>> {
        unsafe {
            self.loader
                .get_physical_device_surface_present_modes(physical_device, self.surface)
        }
        .map_err(VulkanError::Api)
    }

    /// Check if a queue family supports presentation to this surface
    pub fn supports_present(&self, physical_device: vk::PhysicalDevice, queue_family_index: u32) -> VulkanResult<bool> {
        unsafe {
            self.loader
                .get_physical_device_surface_support(physical_device, queue_family_index, self.surface)
        }
        .map_err(VulkanError::Api)
    }
}

impl Drop for Surface {
    fn drop(&mut self) {
        unsafe {
            self.loader.destroy_surface(self.surface, None);
        }
    }
}
