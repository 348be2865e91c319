//! Frame orchestrator
//!
//! [`RenderPass`] owns every GPU object of the viewer and drives the frame
//! loop: acquire, record all subpasses in order, submit, present, and rebuild
//! extent-dependent resources whenever the swapchain goes out of date.
//!
//! The frame state machine itself lives in [`FrameScheduler`]; this module
//! provides the Vulkan side of it through [`FrameBackend`].

use crate::assets::{SplatCloud, SplatLoader};
use crate::core::{ShaderConfig, ViewerConfig};
use crate::render::backends::vulkan::resources::{select_depth_format, BufferRegistry, GpuAllocator};
use crate::render::backends::vulkan::{
    AcquireOutcome, ExtentResources, FrameBackend, FrameScheduler, FrameStatus, FrameSync, PresentOutcome,
    Swapchain, VulkanContext, VulkanError, VulkanExtentFactory, VulkanExtentResources, VulkanResult,
};
use crate::render::primitives::{CameraData, FirstPersonCamera};
use crate::render::subpasses::forward_geometry::SPLAT_BUFFER_USAGE;
use crate::render::subpasses::{
    buffer_names, default_subpasses, DeviceHandles, FrameContext, InitContext, PushConstantBlock, RenderTargets,
    SceneInfo, ShaderList, SubpassEvent, SubpassSlot, SubpassState,
};
use crate::render::window::Window;
use ash::vk;
use std::path::Path;

/// Renderer for a loaded splat cloud
pub struct RenderPass {
    scheduler: FrameScheduler<vk::Fence>,
    frame: VulkanFrameBackend,
}

impl RenderPass {
    /// Bring up Vulkan for `window` and initialise every subpass
    pub fn new(window: &Window, config: &ViewerConfig) -> VulkanResult<Self> {
        let frame = VulkanFrameBackend::new(window, config)?;
        let scheduler = FrameScheduler::new(frame.frame_sync.len(), frame.swapchain.image_count());

        log::info!(
            "Render pass ready: {} subpasses, {} frames in flight, {} swapchain images",
            frame.subpasses.len(),
            scheduler.max_frames_in_flight(),
            frame.swapchain.image_count()
        );
        Ok(Self { scheduler, frame })
    }

    /// Render and present one frame
    ///
    /// `window_extent` is the current framebuffer size, used if the swapchain
    /// has to be rebuilt during this frame.
    pub fn draw_frame(&mut self, window_extent: (u32, u32)) -> VulkanResult<FrameStatus> {
        self.frame.window_extent = to_extent(window_extent);
        self.scheduler.run_frame(&mut self.frame)
    }

    /// Rebuild everything sized to the swapchain, e.g. after a window resize
    pub fn recreate_render_resources(&mut self, window_extent: (u32, u32)) -> VulkanResult<()> {
        self.frame.window_extent = to_extent(window_extent);
        self.scheduler.recreate(&mut self.frame)
    }

    /// Replace the splat buffers with `cloud`
    ///
    /// Blocks until the device is idle; the old buffers are freed first. An
    /// error leaves the attribute buffers partly replaced, so callers must
    /// treat it as fatal.
    pub fn load_model(&mut self, cloud: &SplatCloud) -> VulkanResult<()> {
        let frame = &mut self.frame;
        frame.scene.gaussian_count = 0;
        let allocator = &mut frame.allocator;
        let buffers = &mut frame.buffers;

        buffers.allocate_named_buffer(allocator, buffer_names::POSITIONS, &cloud.positions, SPLAT_BUFFER_USAGE)?;
        buffers.allocate_named_buffer(allocator, buffer_names::SCALES, &cloud.scales, SPLAT_BUFFER_USAGE)?;
        buffers.allocate_named_buffer(allocator, buffer_names::COLORS, &cloud.colors, SPLAT_BUFFER_USAGE)?;
        buffers.allocate_named_buffer(allocator, buffer_names::QUATERNIONS, &cloud.quaternions, SPLAT_BUFFER_USAGE)?;
        buffers.allocate_named_buffer(allocator, buffer_names::ALPHAS, &cloud.alphas, SPLAT_BUFFER_USAGE)?;

        frame.scene.gaussian_count = cloud.len() as u32;
        log::info!("Loaded {} splats", cloud.len());
        Ok(())
    }

    /// Load a PLY file, rendering an empty scene if it cannot be read
    ///
    /// Returns the number of splats now loaded.
    pub fn load_splat_file(&mut self, path: &Path) -> VulkanResult<usize> {
        let cloud = SplatLoader::load_splats(path).unwrap_or_else(|e| {
            log::warn!("Failed to load '{}': {}", path.display(), e);
            SplatCloud::default()
        });
        self.load_model(&cloud)?;
        Ok(cloud.len())
    }

    pub fn camera(&self) -> &FirstPersonCamera {
        &self.frame.camera
    }

    pub fn camera_mut(&mut self) -> &mut FirstPersonCamera {
        &mut self.frame.camera
    }

    /// Switch the translucency pass on or off
    ///
    /// While off, every splat is drawn by the opaque pass.
    pub fn set_translucency_enabled(&mut self, enabled: bool) {
        self.frame.scene.translucency_enabled = enabled;
        log::info!("Translucency {}", if enabled { "enabled" } else { "disabled" });
    }

    pub fn translucency_enabled(&self) -> bool {
        self.frame.scene.translucency_enabled
    }

    /// Alpha at or above which a splat counts as opaque
    pub fn set_opaque_threshold(&mut self, threshold: f32) {
        self.frame.opaque_alpha_threshold = threshold.clamp(0.0, 1.0);
    }

    pub fn opaque_threshold(&self) -> f32 {
        self.frame.opaque_alpha_threshold
    }

    pub fn gaussian_count(&self) -> u32 {
        self.frame.scene.gaussian_count
    }

    pub fn current_frame(&self) -> usize {
        self.scheduler.current_frame()
    }

    pub fn swapchain_extent(&self) -> (u32, u32) {
        let extent = self.frame.swapchain.extent();
        (extent.width, extent.height)
    }

    /// Lifecycle state of every subpass, in frame order
    pub fn subpass_states(&self) -> Vec<(&'static str, SubpassState)> {
        self.frame
            .subpasses
            .iter()
            .map(|slot| (slot.pass.name(), slot.state()))
            .collect()
    }

    pub fn wait_idle(&self) -> VulkanResult<()> {
        self.frame.context.wait_idle()
    }
}

fn to_extent((width, height): (u32, u32)) -> vk::Extent2D {
    vk::Extent2D { width, height }
}

/// Opaque threshold uploaded to the shaders
///
/// Zero sends every splat through the opaque pass.
fn effective_opaque_threshold(threshold: f32, translucency_enabled: bool) -> f32 {
    if translucency_enabled {
        threshold
    } else {
        0.0
    }
}

fn extent_factory<'a>(
    context: &'a VulkanContext,
    allocator: &'a GpuAllocator,
    depth_format: vk::Format,
) -> VulkanExtentFactory<'a> {
    VulkanExtentFactory {
        device: context.raw_device(),
        allocator,
        queue_family: context.graphics_queue_family(),
        depth_format,
    }
}

/// GPU state behind [`RenderPass`]
///
/// Fields drop in declaration order; `context` must stay last.
struct VulkanFrameBackend {
    subpasses: Vec<SubpassSlot>,
    shaders: ShaderList,
    buffers: BufferRegistry<GpuAllocator>,
    targets: RenderTargets,
    extent_resources: VulkanExtentResources,
    frame_sync: Vec<FrameSync>,
    swapchain: Swapchain,

    camera: FirstPersonCamera,
    scene: SceneInfo,
    opaque_alpha_threshold: f32,
    wait_idle_before_record: bool,
    push_constants: PushConstantBlock,
    window_extent: vk::Extent2D,
    depth_format: vk::Format,
    shader_config: ShaderConfig,

    handles: DeviceHandles,
    allocator: GpuAllocator,
    context: VulkanContext,
}

impl VulkanFrameBackend {
    fn new(window: &Window, config: &ViewerConfig) -> VulkanResult<Self> {
        let renderer = &config.renderer;
        let context = VulkanContext::new(window, renderer)?;
        let allocator = GpuAllocator::new(&context)?;

        let depth_format = select_depth_format(|format| {
            context
                .optimal_tiling_features(format)
                .contains(vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT)
        })?;
        log::debug!("Depth format {:?}", depth_format);

        let window_extent = to_extent(window.framebuffer_size());
        let swapchain = Swapchain::new(&context, window_extent, renderer.prefer_mailbox)?;
        let extent = swapchain.extent();
        let frames_in_flight = renderer.max_frames_in_flight.max(1);
        let frame_sync = FrameSync::create_slots(context.raw_device(), frames_in_flight)?;

        let handles = DeviceHandles {
            device: context.raw_device().clone(),
            shader_object: context.device.shader_object_loader.clone(),
            local_read: context.device.local_read_loader.clone(),
        };

        let aspect = extent.width as f32 / extent.height.max(1) as f32;
        let camera = FirstPersonCamera::from_config(&config.camera, aspect);

        let extent_resources =
            ExtentResources::create(&mut extent_factory(&context, &allocator, depth_format), extent, frames_in_flight)?;

        // From here on Drop releases whatever initialisation managed to create
        let mut backend = Self {
            subpasses: default_subpasses(),
            shaders: ShaderList::new(),
            buffers: BufferRegistry::new(),
            targets: RenderTargets::new(extent),
            extent_resources,
            frame_sync,
            swapchain,
            camera,
            scene: SceneInfo {
                gaussian_count: 0,
                translucency_enabled: true,
                clear_color: renderer.clear_color,
            },
            opaque_alpha_threshold: renderer.opaque_alpha_threshold,
            wait_idle_before_record: renderer.wait_idle_before_record,
            push_constants: PushConstantBlock::default(),
            window_extent,
            depth_format,
            shader_config: config.shaders.clone(),
            handles,
            allocator,
            context,
        };

        for slot in 0..frames_in_flight {
            backend.buffers.allocate_mapped_buffer(
                &mut backend.allocator,
                &buffer_names::camera(slot),
                std::mem::size_of::<CameraData>() as vk::DeviceSize,
                vk::BufferUsageFlags::UNIFORM_BUFFER | vk::BufferUsageFlags::STORAGE_BUFFER,
            )?;
        }
        backend.init_render_targets()?;
        backend.init_subpasses()?;
        Ok(backend)
    }

    fn init_render_targets(&mut self) -> VulkanResult<()> {
        for slot in &mut self.subpasses {
            slot.pass.render_target_init(&self.handles, &self.allocator, &mut self.targets)?;
            slot.advance(SubpassEvent::RenderTargetInit)?;
        }
        Ok(())
    }

    fn init_subpasses(&mut self) -> VulkanResult<()> {
        for slot in &mut self.subpasses {
            log::debug!("Initialising subpass '{}'", slot.pass.name());
            slot.pass.subpass_init(InitContext {
                handles: &self.handles,
                allocator: &mut self.allocator,
                buffers: &mut self.buffers,
                shaders: &mut self.shaders,
                targets: &self.targets,
                shader_config: &self.shader_config,
            })?;
            slot.advance(SubpassEvent::SubpassInit)?;
        }
        Ok(())
    }

    /// Write the camera of frame slot `slot`; its fence has already signalled
    fn upload_camera(&self, slot: usize) -> VulkanResult<()> {
        let threshold = effective_opaque_threshold(self.opaque_alpha_threshold, self.scene.translucency_enabled);
        let data = CameraData::new(&self.camera, threshold);
        self.allocator
            .write_mapped(self.buffers.require(&buffer_names::camera(slot))?, &[data])
    }

    /// Record every subpass into the command buffer of `slot`
    fn record_subpasses(&mut self, slot: usize, image_index: u32) -> VulkanResult<()> {
        let device = self.context.raw_device();
        if self.wait_idle_before_record {
            unsafe { device.device_wait_idle() }.map_err(VulkanError::Api)?;
        }

        for subpass in &mut self.subpasses {
            subpass.pass.frame_pre_recording();
            subpass.advance(SubpassEvent::FramePreRecording)?;
        }
        self.upload_camera(slot)?;

        let cmd = self
            .extent_resources
            .command_buffer(slot)
            .ok_or_else(|| VulkanError::ResourceNotFound {
                name: format!("command buffer for frame slot {}", slot),
            })?;
        let depth = self
            .extent_resources
            .depth_image()
            .ok_or_else(|| VulkanError::ResourceNotFound {
                name: "depth image".to_string(),
            })?;

        unsafe {
            device
                .reset_command_buffer(cmd, vk::CommandBufferResetFlags::empty())
                .map_err(VulkanError::Api)?;
            device
                .begin_command_buffer(cmd, &vk::CommandBufferBeginInfo::default())
                .map_err(VulkanError::Api)?;
        }

        let frame = FrameContext {
            cmd,
            image_index,
            frame_index: slot,
            extent: self.swapchain.extent(),
            swapchain_image: self.swapchain.image(image_index),
            swapchain_view: self.swapchain.image_view(image_index),
            depth,
            handles: &self.handles,
            shaders: &self.shaders,
            buffers: &self.buffers,
            targets: &self.targets,
            scene: self.scene,
        };

        for subpass in &mut self.subpasses {
            subpass.advance(SubpassEvent::BeginRecording)?;
            log::trace!("Recording subpass '{}'", subpass.pass.name());
            subpass.pass.record_commands(&frame, &mut self.push_constants)?;
            subpass.advance(SubpassEvent::FinishRecording)?;
        }

        unsafe { device.end_command_buffer(cmd) }.map_err(VulkanError::Api)
    }

    /// Idle-wait, then rebuild the swapchain and everything sized to it
    fn recreate_render_resources(&mut self) -> VulkanResult<()> {
        self.context.wait_idle()?;

        let window_extent = self.window_extent;
        if window_extent.width == 0 || window_extent.height == 0 {
            log::debug!("Skipping recreation for zero-sized window");
            return Ok(());
        }

        self.swapchain.recreate(&self.context, window_extent)?;
        let extent = self.swapchain.extent();

        self.extent_resources.recreate(
            &mut extent_factory(&self.context, &self.allocator, self.depth_format),
            extent,
        )?;

        self.targets.extent = extent;
        self.init_render_targets()?;
        self.camera
            .set_aspect_ratio(extent.width as f32 / extent.height.max(1) as f32);

        log::info!(
            "Recreated render resources at {}x{} ({} images)",
            extent.width,
            extent.height,
            self.swapchain.image_count()
        );
        Ok(())
    }
}

impl FrameBackend for VulkanFrameBackend {
    type Fence = vk::Fence;
    type Error = VulkanError;

    fn image_count(&self) -> usize {
        self.swapchain.image_count()
    }

    fn slot_fence(&self, slot: usize) -> vk::Fence {
        self.frame_sync[slot].in_flight.handle()
    }

    fn wait_for_fence(&mut self, fence: vk::Fence) -> VulkanResult<()> {
        unsafe { self.context.raw_device().wait_for_fences(&[fence], true, u64::MAX) }.map_err(VulkanError::Api)
    }

    fn reset_fence(&mut self, fence: vk::Fence) -> VulkanResult<()> {
        unsafe { self.context.raw_device().reset_fences(&[fence]) }.map_err(VulkanError::Api)
    }

    fn acquire_next_image(&mut self, slot: usize) -> VulkanResult<AcquireOutcome> {
        self.swapchain
            .acquire_next_image(self.frame_sync[slot].image_available.handle())
    }

    fn record(&mut self, slot: usize, image_index: u32) -> VulkanResult<()> {
        self.record_subpasses(slot, image_index)
    }

    fn submit(&mut self, slot: usize, _image_index: u32) -> VulkanResult<()> {
        let sync = &self.frame_sync[slot];
        let cmd = self
            .extent_resources
            .command_buffer(slot)
            .ok_or_else(|| VulkanError::ResourceNotFound {
                name: format!("command buffer for frame slot {}", slot),
            })?;

        let wait_semaphores = [sync.image_available.handle()];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let signal_semaphores = [sync.render_finished.handle()];
        let command_buffers = [cmd];
        let submit_info = vk::SubmitInfo::default()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        unsafe {
            self.context
                .raw_device()
                .queue_submit(self.context.graphics_queue(), &[submit_info], sync.in_flight.handle())
        }
        .map_err(VulkanError::Api)
    }

    fn present(&mut self, slot: usize, image_index: u32) -> VulkanResult<PresentOutcome> {
        self.swapchain.present(
            self.context.present_queue(),
            image_index,
            self.frame_sync[slot].render_finished.handle(),
        )
    }

    fn recreate(&mut self) -> VulkanResult<()> {
        self.recreate_render_resources()
    }
}

impl Drop for VulkanFrameBackend {
    fn drop(&mut self) {
        // Nothing may be destroyed while the GPU still uses it
        if let Err(e) = self.context.wait_idle() {
            log::error!("Device wait before teardown failed: {}", e);
        }

        for slot in &mut self.subpasses {
            slot.pass
                .cleanup(&self.handles, &self.allocator, &mut self.shaders, &mut self.targets);
            if let Err(e) = slot.advance(SubpassEvent::Cleanup) {
                log::warn!("{}", e);
            }
        }

        self.extent_resources
            .destroy(&mut extent_factory(&self.context, &self.allocator, self.depth_format));
        self.buffers.destroy_all(&mut self.allocator);
        log::debug!("Render pass resources released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_translucency_forces_opaque() {
        assert_eq!(effective_opaque_threshold(0.98, true), 0.98);
        assert_eq!(effective_opaque_threshold(0.98, false), 0.0);
    }

    #[test]
    fn test_window_extent_conversion() {
        let extent = to_extent((1280, 720));
        assert_eq!((extent.width, extent.height), (1280, 720));
    }
}
