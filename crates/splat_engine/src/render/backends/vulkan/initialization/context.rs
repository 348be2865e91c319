//! Vulkan context management
//!
//! Instance, debug messenger, physical device selection and the logical device
//! with every feature the splat renderer depends on: dynamic rendering with
//! local read, synchronization2, buffer device addresses and shader objects.

use super::surface::Surface;
use crate::core::RendererConfig;
use ash::{vk, Device, Entry, Instance};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use std::ffi::{c_char, CStr, CString};
use thiserror::Error;

const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";

/// Vulkan-specific error types
#[derive(Error, Debug)]
pub enum VulkanError {
    /// General Vulkan API error with result code
    #[error("Vulkan API error: {0:?}")]
    Api(vk::Result),

    /// Vulkan context initialization failed
    #[error("Initialization failed: {0}")]
    InitializationFailed(String),

    /// Shader object creation failed
    #[error("Shader creation failed: {0}")]
    ShaderCreation(String),

    /// Memory allocation failed
    #[error("Allocation failed: {0}")]
    Allocation(String),

    /// Named resource could not be found
    #[error("Resource not found: {name}")]
    ResourceNotFound {
        /// Lookup key of the resource
        name: String,
    },

    /// Invalid operation attempted
    #[error("Invalid operation: {reason}")]
    InvalidOperation {
        /// Description of why the operation is invalid
        reason: String,
    },

    /// No format satisfies the requested usage
    #[error("No suitable format: {0}")]
    NoSuitableFormat(String),
}

/// Result type for Vulkan operations
pub type VulkanResult<T> = Result<T, VulkanError>;

/// Vulkan instance wrapper with RAII cleanup
pub struct VulkanInstance {
    /// Vulkan entry point
    pub entry: Entry,
    /// Vulkan instance handle
    pub instance: Instance,
    debug_utils: Option<(ash::ext::debug_utils::Instance, vk::DebugUtilsMessengerEXT)>,
}

impl VulkanInstance {
    /// Create a Vulkan 1.3 instance with the extensions the window needs
    pub fn new(display: &impl HasDisplayHandle, app_name: &str, enable_validation: bool) -> VulkanResult<Self> {
        let entry = unsafe { Entry::load() }
            .map_err(|e| VulkanError::InitializationFailed(format!("Failed to load Vulkan: {:?}", e)))?;

        let app_name_cstr = CString::new(app_name)
            .map_err(|_| VulkanError::InitializationFailed("Application name contains NUL".to_string()))?;
        let app_info = vk::ApplicationInfo::default()
            .application_name(&app_name_cstr)
            .application_version(vk::make_api_version(0, 0, 1, 0))
            .engine_name(c"SplatEngine")
            .engine_version(vk::make_api_version(0, 0, 1, 0))
            .api_version(vk::API_VERSION_1_3);

        let display_handle = display
            .display_handle()
            .map_err(|e| VulkanError::InitializationFailed(format!("Failed to get display handle: {}", e)))?;
        let mut extensions: Vec<*const c_char> = ash_window::enumerate_required_extensions(display_handle.as_raw())
            .map_err(VulkanError::Api)?
            .to_vec();

        let enable_validation = enable_validation && Self::validation_layer_available(&entry);
        let layer_names: Vec<*const c_char> = if enable_validation {
            extensions.push(ash::ext::debug_utils::NAME.as_ptr());
            vec![VALIDATION_LAYER.as_ptr()]
        } else {
            Vec::new()
        };

        let create_info = vk::InstanceCreateInfo::default()
            .application_info(&app_info)
            .enabled_extension_names(&extensions)
            .enabled_layer_names(&layer_names);

        let instance = unsafe { entry.create_instance(&create_info, None) }.map_err(VulkanError::Api)?;

        let debug_utils = if enable_validation {
            let loader = ash::ext::debug_utils::Instance::new(&entry, &instance);
            match Self::setup_debug_messenger(&loader) {
                Ok(messenger) => Some((loader, messenger)),
                Err(e) => {
                    log::warn!("Debug messenger unavailable: {}", e);
                    None
                }
            }
        } else {
            None
        };

        log::info!("Created Vulkan 1.3 instance (validation: {})", enable_validation);

        Ok(Self {
            entry,
            instance,
            debug_utils,
        })
    }

    fn validation_layer_available(entry: &Entry) -> bool {
        let layers = unsafe { entry.enumerate_instance_layer_properties() }.unwrap_or_default();
        let available = layers
            .iter()
            .any(|layer| layer.layer_name_as_c_str().is_ok_and(|name| name == VALIDATION_LAYER));

        if !available {
            log::warn!("Validation requested but {:?} is not installed", VALIDATION_LAYER);
        }
        available
    }

    fn setup_debug_messenger(
        debug_utils: &ash::ext::debug_utils::Instance,
    ) -> VulkanResult<vk::DebugUtilsMessengerEXT> {
        let create_info = vk::DebugUtilsMessengerCreateInfoEXT::default()
            .message_severity(
                vk::DebugUtilsMessageSeverityFlagsEXT::INFO
                    | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                    | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
            )
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            )
            .pfn_user_callback(Some(debug_callback));

        unsafe { debug_utils.create_debug_utils_messenger(&create_info, None) }.map_err(VulkanError::Api)
    }
}

impl Drop for VulkanInstance {
    fn drop(&mut self) {
        unsafe {
            if let Some((loader, messenger)) = self.debug_utils.take() {
                loader.destroy_debug_utils_messenger(messenger, None);
            }
            self.instance.destroy_instance(None);
        }
    }
}

/// Routes validation layer output into `log`
unsafe extern "system" fn debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
    _user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    if callback_data.is_null() || (*callback_data).p_message.is_null() {
        return vk::FALSE;
    }
    let message = CStr::from_ptr((*callback_data).p_message).to_string_lossy();

    if message_severity >= vk::DebugUtilsMessageSeverityFlagsEXT::ERROR {
        log::error!("[Vulkan] {:?} - {}", message_type, message);
    } else if message_severity >= vk::DebugUtilsMessageSeverityFlagsEXT::WARNING {
        log::warn!("[Vulkan] {:?} - {}", message_type, message);
    } else {
        log::debug!("[Vulkan] {:?} - {}", message_type, message);
    }

    vk::FALSE
}

/// Device extensions the renderer cannot run without
pub fn required_device_extensions() -> [&'static CStr; 3] {
    [
        ash::khr::swapchain::NAME,
        ash::ext::shader_object::NAME,
        ash::khr::dynamic_rendering_local_read::NAME,
    ]
}

/// Physical device selection and capabilities
pub struct PhysicalDeviceInfo {
    /// Vulkan physical device handle
    pub device: vk::PhysicalDevice,
    /// Device properties and limits
    pub properties: vk::PhysicalDeviceProperties,
    /// Index of the graphics queue family
    pub graphics_family: u32,
    /// Index of the presentation queue family
    pub present_family: u32,
}

impl PhysicalDeviceInfo {
    /// Pick the best device that supports every required feature
    ///
    /// Discrete GPUs win over integrated ones; rejected devices are logged
    /// with the reason.
    pub fn select_suitable_device(instance: &Instance, surface: &Surface) -> VulkanResult<Self> {
        let devices = unsafe { instance.enumerate_physical_devices() }.map_err(VulkanError::Api)?;

        let mut best: Option<(u32, Self)> = None;
        for device in devices {
            let name = unsafe { instance.get_physical_device_properties(device) }
                .device_name_as_c_str()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();

            match Self::evaluate_device(instance, device, surface) {
                Ok(info) => {
                    let score = match info.properties.device_type {
                        vk::PhysicalDeviceType::DISCRETE_GPU => 3,
                        vk::PhysicalDeviceType::INTEGRATED_GPU => 2,
                        vk::PhysicalDeviceType::VIRTUAL_GPU => 1,
                        _ => 0,
                    };
                    log::debug!("GPU candidate '{}' (score {})", name, score);
                    if best.as_ref().map_or(true, |(best_score, _)| score > *best_score) {
                        best = Some((score, info));
                    }
                }
                Err(reason) => log::warn!("Rejecting GPU '{}': {}", name, reason),
            }
        }

        let (_, info) = best.ok_or_else(|| VulkanError::InitializationFailed("No suitable GPU found".to_string()))?;
        log::info!(
            "Selected GPU: {}",
            info.properties
                .device_name_as_c_str()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default()
        );
        Ok(info)
    }

    fn evaluate_device(instance: &Instance, device: vk::PhysicalDevice, surface: &Surface) -> VulkanResult<Self> {
        let properties = unsafe { instance.get_physical_device_properties(device) };
        if properties.api_version < vk::API_VERSION_1_3 {
            return Err(VulkanError::InitializationFailed("Vulkan 1.3 not supported".to_string()));
        }

        let queue_families = unsafe { instance.get_physical_device_queue_family_properties(device) };

        let mut graphics_family = None;
        let mut present_family = None;
        for (index, family) in queue_families.iter().enumerate() {
            let index = index as u32;
            let graphics = family.queue_flags.contains(vk::QueueFlags::GRAPHICS);
            let present = surface.supports_present(device, index)?;

            // A single family doing both is preferred.
            if graphics && present {
                graphics_family = Some(index);
                present_family = Some(index);
                break;
            }
            if graphics && graphics_family.is_none() {
                graphics_family = Some(index);
            }
            if present && present_family.is_none() {
                present_family = Some(index);
            }
        }

        let graphics_family = graphics_family
            .ok_or_else(|| VulkanError::InitializationFailed("No graphics queue family found".to_string()))?;
        let present_family = present_family
            .ok_or_else(|| VulkanError::InitializationFailed("No present queue family found".to_string()))?;

        let available = unsafe { instance.enumerate_device_extension_properties(device) }.map_err(VulkanError::Api)?;
        for required in required_device_extensions() {
            let supported = available
                .iter()
                .any(|ext| ext.extension_name_as_c_str().is_ok_and(|name| name == required));
            if !supported {
                return Err(VulkanError::InitializationFailed(format!("Missing extension {:?}", required)));
            }
        }

        let support = DeviceFeatureSupport::query(instance, device);
        if let Some(missing) = support.first_missing() {
            return Err(VulkanError::InitializationFailed(format!("Missing feature {}", missing)));
        }

        Ok(Self {
            device,
            properties,
            graphics_family,
            present_family,
        })
    }
}

/// Feature bits the renderer needs, as reported by a device
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceFeatureSupport {
    pub dynamic_rendering: bool,
    pub synchronization2: bool,
    pub buffer_device_address: bool,
    pub shader_object: bool,
    pub dynamic_rendering_local_read: bool,
}

impl DeviceFeatureSupport {
    fn query(instance: &Instance, device: vk::PhysicalDevice) -> Self {
        let mut vulkan12 = vk::PhysicalDeviceVulkan12Features::default();
        let mut vulkan13 = vk::PhysicalDeviceVulkan13Features::default();
        let mut shader_object = vk::PhysicalDeviceShaderObjectFeaturesEXT::default();
        let mut local_read = vk::PhysicalDeviceDynamicRenderingLocalReadFeaturesKHR::default();
        {
            let mut features = vk::PhysicalDeviceFeatures2::default()
                .push_next(&mut vulkan12)
                .push_next(&mut vulkan13)
                .push_next(&mut shader_object)
                .push_next(&mut local_read);
            unsafe { instance.get_physical_device_features2(device, &mut features) };
        }

        Self {
            dynamic_rendering: vulkan13.dynamic_rendering == vk::TRUE,
            synchronization2: vulkan13.synchronization2 == vk::TRUE,
            buffer_device_address: vulkan12.buffer_device_address == vk::TRUE,
            shader_object: shader_object.shader_object == vk::TRUE,
            dynamic_rendering_local_read: local_read.dynamic_rendering_local_read == vk::TRUE,
        }
    }

    /// Name of the first unsupported feature
    pub fn first_missing(&self) -> Option<&'static str> {
        [
            (self.dynamic_rendering, "dynamicRendering"),
            (self.synchronization2, "synchronization2"),
            (self.buffer_device_address, "bufferDeviceAddress"),
            (self.shader_object, "shaderObject"),
            (self.dynamic_rendering_local_read, "dynamicRenderingLocalRead"),
        ]
        .into_iter()
        .find(|(supported, _)| !supported)
        .map(|(_, name)| name)
    }
}

/// Logical device wrapper with RAII cleanup
pub struct LogicalDevice {
    /// Vulkan logical device handle
    pub device: Device,
    /// Graphics operations queue
    pub graphics_queue: vk::Queue,
    /// Surface presentation queue
    pub present_queue: vk::Queue,
    /// Swapchain extension loader
    pub swapchain_loader: ash::khr::swapchain::Device,
    /// Shader object extension loader
    pub shader_object_loader: ash::ext::shader_object::Device,
    /// Local read extension loader
    pub local_read_loader: ash::khr::dynamic_rendering_local_read::Device,
}

impl LogicalDevice {
    /// Create the device with one queue per distinct family
    pub fn new(instance: &Instance, physical_device: &PhysicalDeviceInfo) -> VulkanResult<Self> {
        let mut families = vec![physical_device.graphics_family];
        if physical_device.present_family != physical_device.graphics_family {
            families.push(physical_device.present_family);
        }

        let priorities = [1.0f32];
        let queue_infos: Vec<vk::DeviceQueueCreateInfo> = families
            .iter()
            .map(|&family| {
                vk::DeviceQueueCreateInfo::default()
                    .queue_family_index(family)
                    .queue_priorities(&priorities)
            })
            .collect();

        let extension_names: Vec<*const c_char> =
            required_device_extensions().iter().map(|name| name.as_ptr()).collect();

        let mut vulkan12 = vk::PhysicalDeviceVulkan12Features::default().buffer_device_address(true);
        let mut vulkan13 = vk::PhysicalDeviceVulkan13Features::default()
            .dynamic_rendering(true)
            .synchronization2(true);
        let mut shader_object = vk::PhysicalDeviceShaderObjectFeaturesEXT::default().shader_object(true);
        let mut local_read =
            vk::PhysicalDeviceDynamicRenderingLocalReadFeaturesKHR::default().dynamic_rendering_local_read(true);

        let create_info = vk::DeviceCreateInfo::default()
            .queue_create_infos(&queue_infos)
            .enabled_extension_names(&extension_names)
            .push_next(&mut vulkan12)
            .push_next(&mut vulkan13)
            .push_next(&mut shader_object)
            .push_next(&mut local_read);

        let device = unsafe { instance.create_device(physical_device.device, &create_info, None) }
            .map_err(VulkanError::Api)?;

        let graphics_queue = unsafe { device.get_device_queue(physical_device.graphics_family, 0) };
        let present_queue = unsafe { device.get_device_queue(physical_device.present_family, 0) };

        Ok(Self {
            swapchain_loader: ash::khr::swapchain::Device::new(instance, &device),
            shader_object_loader: ash::ext::shader_object::Device::new(instance, &device),
            local_read_loader: ash::khr::dynamic_rendering_local_read::Device::new(instance, &device),
            device,
            graphics_queue,
            present_queue,
        })
    }
}

impl Drop for LogicalDevice {
    fn drop(&mut self) {
        unsafe {
            let _ = self.device.device_wait_idle();
            self.device.destroy_device(None);
        }
    }
}

/// Owns the core Vulkan objects
///
/// Fields drop in declaration order: device, surface, then instance.
pub struct VulkanContext {
    /// Logical device and extension loaders
    pub device: LogicalDevice,
    /// Presentation surface
    pub surface: Surface,
    /// Selected physical device information
    pub physical_device: PhysicalDeviceInfo,
    /// Vulkan instance and debug utilities
    pub instance: VulkanInstance,
}

impl VulkanContext {
    /// Bootstrap Vulkan for a window
    pub fn new<W>(window: &W, config: &RendererConfig) -> VulkanResult<Self>
    where
        W: HasWindowHandle + HasDisplayHandle,
    {
        let instance = VulkanInstance::new(window, &config.application_name, config.validation_enabled())?;
        let surface = Surface::new(&instance.entry, &instance.instance, window)?;
        let physical_device = PhysicalDeviceInfo::select_suitable_device(&instance.instance, &surface)?;
        let device = LogicalDevice::new(&instance.instance, &physical_device)?;

        Ok(Self {
            device,
            surface,
            physical_device,
            instance,
        })
    }

    pub fn instance(&self) -> &Instance {
        &self.instance.instance
    }

    /// Get the raw Device handle
    pub fn raw_device(&self) -> &Device {
        &self.device.device
    }

    pub fn graphics_queue(&self) -> vk::Queue {
        self.device.graphics_queue
    }

    pub fn present_queue(&self) -> vk::Queue {
        self.device.present_queue
    }

    pub fn graphics_queue_family(&self) -> u32 {
        self.physical_device.graphics_family
    }

    pub fn present_queue_family(&self) -> u32 {
        self.physical_device.present_family
    }

    /// Optimal-tiling features of a format on the selected device
    pub fn optimal_tiling_features(&self, format: vk::Format) -> vk::FormatFeatureFlags {
        unsafe {
            self.instance
                .instance
                .get_physical_device_format_properties(self.physical_device.device, format)
        }
        .optimal_tiling_features
    }

    /// Block until the GPU has finished all submitted work
    pub fn wait_idle(&self) -> VulkanResult<()> {
        unsafe { self.device.device.device_wait_idle() }.map_err(VulkanError::Api)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_missing_feature() {
        let all = DeviceFeatureSupport {
            dynamic_rendering: true,
            synchronization2: true,
            buffer_device_address: true,
            shader_object: true,
            dynamic_rendering_local_read: true,
        };
        assert_eq!(all.first_missing(), None);

        let no_local_read = DeviceFeatureSupport {
            dynamic_rendering_local_read: false,
            ..all
        };
        assert_eq!(no_local_read.first_missing(), Some("dynamicRenderingLocalRead"));
        assert_eq!(DeviceFeatureSupport::default().first_missing(), Some("dynamicRendering"));
    }

    #[test]
    fn test_required_extensions() {
        let names = required_device_extensions();
        assert!(names.contains(&c"VK_KHR_swapchain"));
        assert!(names.contains(&c"VK_EXT_shader_object"));
        assert!(names.contains(&c"VK_KHR_dynamic_rendering_local_read"));
    }
}
