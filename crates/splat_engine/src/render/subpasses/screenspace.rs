//! Full-screen OIT resolve
//!
//! Reads accumulation and revealage as input attachments through dynamic
//! rendering local read and blends the resolved color over the opaque image.

use super::{
    DeviceHandles, FrameContext, InitContext, PushConstantBlock, RenderTargets, ShaderList, ShaderObjectType, Subpass,
};
use crate::render::backends::vulkan::rendering::{
    begin_rendering, blend_equation, color_attachment, end_rendering, set_input_attachment_indices,
    ColorAttachmentState, DrawState, VertexInput,
};
use crate::render::backends::vulkan::resources::{GpuAllocator, InputAttachmentSet};
use crate::render::backends::vulkan::{VulkanError, VulkanResult};
use ash::vk;

/// Swapchain image is written, the OIT targets map to input indices 0 and 1
const INPUT_ATTACHMENT_INDICES: [Option<u32>; 3] = [None, Some(0), Some(1)];

#[derive(Default)]
pub struct ScreenspacePass {
    inputs: Option<InputAttachmentSet>,
}

impl ScreenspacePass {
    pub fn new() -> Self {
        Self::default()
    }

    fn draw_state(extent: vk::Extent2D) -> VulkanResult<DrawState> {
        let mut state = DrawState::new(extent)
            .with_depth(false, false, vk::CompareOp::ALWAYS)
            .with_color_attachments(&[
                ColorAttachmentState::BLENDED,
                ColorAttachmentState::READ_ONLY,
                ColorAttachmentState::READ_ONLY,
            ])
            .with_vertex_input(VertexInput::none());
        state.set_blend_equation(0, blend_equation(vk::BlendFactor::ONE, vk::BlendFactor::ONE_MINUS_SRC_ALPHA))?;
        Ok(state)
    }

    fn point_inputs_at(&self, targets: &RenderTargets) -> VulkanResult<()> {
        if let Some(inputs) = &self.inputs {
            inputs.update(targets.accumulation()?.view(), targets.revealage()?.view());
        }
        Ok(())
    }
}

impl Subpass for ScreenspacePass {
    fn name(&self) -> &'static str {
        "screenspace"
    }

    fn render_target_init(
        &mut self,
        _handles: &DeviceHandles,
        _allocator: &GpuAllocator,
        targets: &mut RenderTargets,
    ) -> VulkanResult<()> {
        // The set does not exist yet on first initialisation
        self.point_inputs_at(targets)
    }

    fn subpass_init(&mut self, context: InitContext<'_>) -> VulkanResult<()> {
        let inputs = InputAttachmentSet::new(&context.handles.device)?;
        let shader_config = context.shader_config;
        let material = context.handles.create_material(
            shader_config,
            "oit_composite",
            &shader_config.fullscreen_vertex,
            &shader_config.composite_fragment,
            &[inputs.layout()],
            &[],
        )?;
        context.shaders.insert(ShaderObjectType::CompositePass, material);

        self.inputs = Some(inputs);
        self.point_inputs_at(context.targets)
    }

    fn record_commands(&mut self, frame: &FrameContext<'_>, _push_constants: &mut PushConstantBlock) -> VulkanResult<()> {
        let device = &frame.handles.device;
        let cmd = frame.cmd;
        let material = frame.shaders.get(ShaderObjectType::CompositePass)?;
        let inputs = self.inputs.as_ref().ok_or_else(|| VulkanError::ResourceNotFound {
            name: "composite input attachments".to_string(),
        })?;
        let accumulation = frame.targets.accumulation()?;
        let revealage = frame.targets.revealage()?;

        let colors = [
            color_attachment(frame.swapchain_view, vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL, None),
            color_attachment(accumulation.view(), vk::ImageLayout::RENDERING_LOCAL_READ_KHR, None),
            color_attachment(revealage.view(), vk::ImageLayout::RENDERING_LOCAL_READ_KHR, None),
        ];
        begin_rendering(device, cmd, frame.extent, &colors, None);
        set_input_attachment_indices(&frame.handles.local_read, cmd, &INPUT_ATTACHMENT_INDICES);

        Self::draw_state(frame.extent)?.set_initial_state(device, &frame.handles.shader_object, cmd);
        material.bind_material_shader(cmd);
        material.bind_descriptor_set(cmd, inputs.set());

        unsafe { device.cmd_draw(cmd, 3, 1, 0, 0) };

        end_rendering(device, cmd);
        Ok(())
    }

    fn cleanup(&mut self, _handles: &DeviceHandles, _allocator: &GpuAllocator, shaders: &mut ShaderList, _targets: &mut RenderTargets) {
        shaders.remove(ShaderObjectType::CompositePass);
        self.inputs = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_composite_blends_over_opaque() {
        let state = ScreenspacePass::draw_state(vk::Extent2D { width: 800, height: 600 }).unwrap();

        assert!(!state.depth_test && !state.depth_write);
        assert!(state.vertex_input.bindings.is_empty());

        let equation = state.blend_equation(0).unwrap();
        assert_eq!(equation.src_color_blend_factor, vk::BlendFactor::ONE);
        assert_eq!(equation.dst_color_blend_factor, vk::BlendFactor::ONE_MINUS_SRC_ALPHA);
    }

    #[test]
    fn test_oit_targets_are_read_not_written() {
        let state = ScreenspacePass::draw_state(vk::Extent2D { width: 800, height: 600 }).unwrap();
        assert_eq!(state.color_attachments.len(), INPUT_ATTACHMENT_INDICES.len());

        for (attachment, index) in state.color_attachments.iter().zip(INPUT_ATTACHMENT_INDICES) {
            assert_eq!(attachment.write_mask.is_empty(), index.is_some());
        }
    }
}
