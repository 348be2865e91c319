//! The passes that make up one frame
//!
//! Each pass implements [`Subpass`]. The orchestrator owns the passes and
//! every piece of shared state ([`ShaderList`], the buffer registry,
//! [`RenderTargets`]) and lends it to them per call. Passes never call each
//! other; whatever one pass produces for another goes through that shared
//! state.
//!
//! Frame order:
//!
//! 1. [`ForwardGeometryPass`]: clears color and depth, draws opaque splats
//! 2. [`TranslucencyPass`]: weighted accumulation and revealage
//! 3. [`ScreenspacePass`]: resolves the OIT targets over the opaque color
//! 4. [`UiOverlayPass`]: final overlay, hands the image to presentation

pub mod forward_geometry;
pub mod screenspace;
pub mod translucency;
pub mod ui_overlay;

pub use forward_geometry::ForwardGeometryPass;
pub use screenspace::ScreenspacePass;
pub use translucency::TranslucencyPass;
pub use ui_overlay::UiOverlayPass;

use crate::core::ShaderConfig;
use crate::render::backends::vulkan::resources::{BufferRegistry, GpuAllocator, GpuImage};
use crate::render::backends::vulkan::{Material, MaterialSource, VulkanError, VulkanResult};
use ash::vk;
use bytemuck::{Pod, Zeroable};
use std::collections::HashMap;

/// Registry names of the buffers the passes share
pub mod buffer_names {
    pub const POSITIONS: &str = "positions";
    pub const SCALES: &str = "scales";
    pub const COLORS: &str = "colors";
    pub const QUATERNIONS: &str = "quaternions";
    pub const ALPHAS: &str = "alphas";
    pub const CUBE: &str = "cube_buffer";

    /// Per-splat attribute buffers, replaced on every model load
    pub const SPLAT_ATTRIBUTES: [&str; 5] = [POSITIONS, SCALES, COLORS, QUATERNIONS, ALPHAS];

    /// Camera uniform written by frame slot `slot`
    ///
    /// Each slot owns one so the CPU never overwrites data a frame still in
    /// flight reads.
    pub fn camera(slot: usize) -> String {
        format!("camera_data_buffer_{slot}")
    }
}

/// Push constants of the splat materials
///
/// Six buffer device addresses; must match `PushConstants` in `splat.vert`.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct PushConstantBlock {
    pub scene_buffer_address: u64,
    pub positions_address: u64,
    pub scales_address: u64,
    pub colors_address: u64,
    pub quaternions_address: u64,
    pub alphas_address: u64,
}

impl PushConstantBlock {
    pub const SIZE: u32 = std::mem::size_of::<Self>() as u32;

    /// Range shared by both stages of the splat materials
    pub fn range() -> vk::PushConstantRange {
        vk::PushConstantRange {
            stage_flags: vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT,
            offset: 0,
            size: Self::SIZE,
        }
    }

    /// Fill every address from the registry for frame slot `slot`
    pub fn from_registry(buffers: &BufferRegistry<GpuAllocator>, slot: usize) -> VulkanResult<Self> {
        Self::from_addresses(slot, |name| buffers.device_address(name))
    }

    fn from_addresses(
        slot: usize,
        mut address: impl FnMut(&str) -> VulkanResult<vk::DeviceAddress>,
    ) -> VulkanResult<Self> {
        Ok(Self {
            scene_buffer_address: address(&buffer_names::camera(slot))?,
            positions_address: address(buffer_names::POSITIONS)?,
            scales_address: address(buffer_names::SCALES)?,
            colors_address: address(buffer_names::COLORS)?,
            quaternions_address: address(buffer_names::QUATERNIONS)?,
            alphas_address: address(buffer_names::ALPHAS)?,
        })
    }
}

/// Materials keyed by the pass that uses them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderObjectType {
    OpaquePass,
    TranslucentPass,
    CompositePass,
}

/// Materials shared across passes
#[derive(Default)]
pub struct ShaderList {
    materials: HashMap<ShaderObjectType, Material>,
}

impl ShaderList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a material, dropping any previous one of the same type
    pub fn insert(&mut self, kind: ShaderObjectType, material: Material) {
        self.materials.insert(kind, material);
    }

    pub fn get(&self, kind: ShaderObjectType) -> VulkanResult<&Material> {
        self.materials.get(&kind).ok_or_else(|| VulkanError::ResourceNotFound {
            name: format!("{:?} material", kind),
        })
    }

    pub fn remove(&mut self, kind: ShaderObjectType) -> Option<Material> {
        self.materials.remove(&kind)
    }

    pub fn contains(&self, kind: ShaderObjectType) -> bool {
        self.materials.contains_key(&kind)
    }

    pub fn len(&self) -> usize {
        self.materials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }
}

/// Images shared between passes
pub struct RenderTargets {
    pub extent: vk::Extent2D,
    /// Weighted color sum, owned by the translucency pass
    pub accumulation: Option<GpuImage>,
    /// Transmittance product, owned by the translucency pass
    pub revealage: Option<GpuImage>,
}

impl RenderTargets {
    pub const ACCUMULATION_FORMAT: vk::Format = vk::Format::R16G16B16A16_SFLOAT;
    pub const REVEALAGE_FORMAT: vk::Format = vk::Format::R16_SFLOAT;

    pub fn new(extent: vk::Extent2D) -> Self {
        Self {
            extent,
            accumulation: None,
            revealage: None,
        }
    }

    pub fn accumulation(&self) -> VulkanResult<&GpuImage> {
        self.accumulation.as_ref().ok_or_else(|| VulkanError::ResourceNotFound {
            name: "accumulation image".to_string(),
        })
    }

    pub fn revealage(&self) -> VulkanResult<&GpuImage> {
        self.revealage.as_ref().ok_or_else(|| VulkanError::ResourceNotFound {
            name: "revealage image".to_string(),
        })
    }
}

/// Device and extension function tables
#[derive(Clone)]
pub struct DeviceHandles {
    pub device: ash::Device,
    pub shader_object: ash::ext::shader_object::Device,
    pub local_read: ash::khr::dynamic_rendering_local_read::Device,
}

impl DeviceHandles {
    /// Build a material from two SPIR-V files named in the shader config
    pub fn create_material(
        &self,
        shader_config: &ShaderConfig,
        name: &str,
        vertex_file: &str,
        fragment_file: &str,
        set_layouts: &[vk::DescriptorSetLayout],
        push_constant_ranges: &[vk::PushConstantRange],
    ) -> VulkanResult<Material> {
        let vertex = shader_config.resolve(vertex_file);
        let fragment = shader_config.resolve(fragment_file);
        Material::new(
            &self.device,
            &self.shader_object,
            MaterialSource {
                name,
                vertex: &vertex,
                fragment: &fragment,
            },
            set_layouts,
            push_constant_ranges,
        )
    }
}

/// Shared state lent to [`Subpass::subpass_init`]
pub struct InitContext<'a> {
    pub handles: &'a DeviceHandles,
    pub allocator: &'a mut GpuAllocator,
    pub buffers: &'a mut BufferRegistry<GpuAllocator>,
    pub shaders: &'a mut ShaderList,
    pub targets: &'a RenderTargets,
    pub shader_config: &'a ShaderConfig,
}

/// Scene-wide values read while recording
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SceneInfo {
    pub gaussian_count: u32,
    pub translucency_enabled: bool,
    pub clear_color: [f32; 4],
}

/// Everything a pass reads while recording one frame
pub struct FrameContext<'a> {
    pub cmd: vk::CommandBuffer,
    pub image_index: u32,
    pub frame_index: usize,
    pub extent: vk::Extent2D,
    pub swapchain_image: vk::Image,
    pub swapchain_view: vk::ImageView,
    pub depth: &'a GpuImage,
    pub handles: &'a DeviceHandles,
    pub shaders: &'a ShaderList,
    pub buffers: &'a BufferRegistry<GpuAllocator>,
    pub targets: &'a RenderTargets,
    pub scene: SceneInfo,
}

/// Uniform lifecycle of a pass
pub trait Subpass {
    fn name(&self) -> &'static str;

    /// Allocate extent-sized images the pass owns; runs again after every resize
    fn render_target_init(
        &mut self,
        _handles: &DeviceHandles,
        _allocator: &GpuAllocator,
        _targets: &mut RenderTargets,
    ) -> VulkanResult<()> {
        Ok(())
    }

    /// Create materials and register placeholder buffers
    fn subpass_init(&mut self, _context: InitContext<'_>) -> VulkanResult<()> {
        Ok(())
    }

    /// Per-frame bookkeeping before any command is recorded
    fn frame_pre_recording(&mut self) {}

    /// Record the pass into `frame.cmd`
    fn record_commands(&mut self, frame: &FrameContext<'_>, push_constants: &mut PushConstantBlock)
        -> VulkanResult<()>;

    /// Destroy materials and owned images; the device must be idle
    fn cleanup(&mut self, _handles: &DeviceHandles, _allocator: &GpuAllocator, _shaders: &mut ShaderList, _targets: &mut RenderTargets) {}
}

/// Lifecycle position of a pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubpassState {
    Uninitialized,
    RenderTargetsReady,
    ShadersReady,
    PreRecording,
    Recording,
    Recorded,
    Cleaned,
}

/// Lifecycle calls made by the orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubpassEvent {
    RenderTargetInit,
    SubpassInit,
    FramePreRecording,
    BeginRecording,
    FinishRecording,
    Cleanup,
}

impl SubpassState {
    /// State after `event`, or an error when the call is out of order
    pub fn after(self, event: SubpassEvent) -> VulkanResult<Self> {
        use SubpassEvent as E;
        use SubpassState as S;

        let next = match (self, event) {
            (S::Uninitialized, E::RenderTargetInit) => S::RenderTargetsReady,
            // Re-initialisation after a resize keeps the materials
            (S::ShadersReady | S::Recorded, E::RenderTargetInit) => S::ShadersReady,
            (S::RenderTargetsReady, E::SubpassInit) => S::ShadersReady,
            (S::ShadersReady | S::Recorded, E::FramePreRecording) => S::PreRecording,
            (S::PreRecording, E::BeginRecording) => S::Recording,
            (S::Recording, E::FinishRecording) => S::Recorded,
            (S::Cleaned, E::Cleanup) => S::Cleaned,
            (_, E::Cleanup) => S::Cleaned,
            (state, event) => {
                return Err(VulkanError::InvalidOperation {
                    reason: format!("{:?} is not allowed in subpass state {:?}", event, state),
                })
            }
        };
        Ok(next)
    }

    /// True once the pass can take part in frames
    pub fn is_ready(self) -> bool {
        matches!(self, SubpassState::ShadersReady | SubpassState::Recorded)
    }
}

/// A pass and where it is in its lifecycle
pub struct SubpassSlot {
    pub pass: Box<dyn Subpass>,
    state: SubpassState,
}

impl SubpassSlot {
    pub fn new(pass: Box<dyn Subpass>) -> Self {
        Self {
            pass,
            state: SubpassState::Uninitialized,
        }
    }

    pub fn state(&self) -> SubpassState {
        self.state
    }

    /// Apply `event`, failing without side effects when it is out of order
    pub fn advance(&mut self, event: SubpassEvent) -> VulkanResult<()> {
        self.state = self.state.after(event).map_err(|e| {
            log::error!("Subpass '{}': {}", self.pass.name(), e);
            e
        })?;
        Ok(())
    }
}

/// The four passes in frame order
pub fn default_subpasses() -> Vec<SubpassSlot> {
    vec![
        SubpassSlot::new(Box::new(ForwardGeometryPass::new())),
        SubpassSlot::new(Box::new(TranslucencyPass::new())),
        SubpassSlot::new(Box::new(ScreenspacePass::new())),
        SubpassSlot::new(Box::new(UiOverlayPass::new())),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_constant_block_layout() {
        assert_eq!(PushConstantBlock::SIZE, 48);
        assert_eq!(std::mem::align_of::<PushConstantBlock>(), 8);

        let range = PushConstantBlock::range();
        assert_eq!(range.offset, 0);
        assert!(range.stage_flags.contains(vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT));
    }

    #[test]
    fn test_each_frame_slot_reads_its_own_camera() {
        let names: Vec<String> = (0..3).map(buffer_names::camera).collect();
        assert_eq!(names.iter().collect::<std::collections::HashSet<_>>().len(), 3);

        let addresses: HashMap<String, vk::DeviceAddress> = names
            .iter()
            .cloned()
            .chain(buffer_names::SPLAT_ATTRIBUTES.iter().map(|name| name.to_string()))
            .zip(0x1000..)
            .collect();
        let lookup = |name: &str| {
            addresses.get(name).copied().ok_or_else(|| VulkanError::ResourceNotFound {
                name: name.to_string(),
            })
        };

        let slot0 = PushConstantBlock::from_addresses(0, lookup).unwrap();
        let slot2 = PushConstantBlock::from_addresses(2, lookup).unwrap();
        assert_eq!(slot0.scene_buffer_address, addresses[&buffer_names::camera(0)]);
        assert_eq!(slot2.scene_buffer_address, addresses[&buffer_names::camera(2)]);
        assert_eq!(slot0.positions_address, slot2.positions_address);

        assert!(matches!(
            PushConstantBlock::from_addresses(3, lookup),
            Err(VulkanError::ResourceNotFound { .. })
        ));
    }

    #[test]
    fn test_lifecycle_happy_path() {
        let mut state = SubpassState::Uninitialized;
        for event in [
            SubpassEvent::RenderTargetInit,
            SubpassEvent::SubpassInit,
            SubpassEvent::FramePreRecording,
            SubpassEvent::BeginRecording,
            SubpassEvent::FinishRecording,
            SubpassEvent::FramePreRecording,
            SubpassEvent::BeginRecording,
            SubpassEvent::FinishRecording,
        ] {
            state = state.after(event).unwrap();
        }
        assert_eq!(state, SubpassState::Recorded);
        assert!(state.is_ready());
        assert_eq!(state.after(SubpassEvent::Cleanup).unwrap(), SubpassState::Cleaned);
    }

    #[test]
    fn test_resize_keeps_shaders() {
        let state = SubpassState::Recorded.after(SubpassEvent::RenderTargetInit).unwrap();
        assert_eq!(state, SubpassState::ShadersReady);
    }

    #[test]
    fn test_out_of_order_calls_rejected() {
        assert!(SubpassState::Uninitialized.after(SubpassEvent::SubpassInit).is_err());
        assert!(SubpassState::Uninitialized.after(SubpassEvent::FramePreRecording).is_err());
        assert!(SubpassState::ShadersReady.after(SubpassEvent::BeginRecording).is_err());
        assert!(SubpassState::Recording.after(SubpassEvent::RenderTargetInit).is_err());
        assert!(SubpassState::Cleaned.after(SubpassEvent::FramePreRecording).is_err());
    }

    #[test]
    fn test_missing_material_is_not_found() {
        let shaders = ShaderList::new();
        assert!(shaders.is_empty());
        assert!(matches!(
            shaders.get(ShaderObjectType::CompositePass),
            Err(VulkanError::ResourceNotFound { .. })
        ));
    }

    #[test]
    fn test_default_pass_order() {
        let names: Vec<&str> = default_subpasses().iter().map(|slot| slot.pass.name()).collect();
        assert_eq!(names, ["forward_geometry", "translucency", "screenspace", "ui_overlay"]);
    }
}
