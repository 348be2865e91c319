//! Weighted-blended translucency pass
//!
//! Draws the splats below the opaque threshold into two off-screen targets:
//! a weighted premultiplied color sum and a revealage product. Depth from the
//! opaque pass is tested but not written. Both targets stay in the local read
//! layout so the screenspace pass can read them without leaving rendering.

use super::{
    buffer_names, DeviceHandles, FrameContext, InitContext, PushConstantBlock, RenderTargets, ShaderList,
    ShaderObjectType, Subpass,
};
use crate::assets::BOUNDING_CUBE_VERTEX_COUNT;
use crate::render::backends::vulkan::rendering::{
    begin_rendering, blend_equation, color_attachment, depth_attachment, end_rendering, ColorAttachmentState,
    DrawState, VertexInput,
};
use crate::render::backends::vulkan::resources::{
    local_read_barrier, transition_image, GpuAllocator, GpuImage, LayoutTransition,
};
use crate::render::backends::vulkan::VulkanResult;
use crate::render::oit::{ACCUMULATION_CLEAR, REVEALAGE_CLEAR};
use ash::vk;

const TARGET_USAGE: vk::ImageUsageFlags = vk::ImageUsageFlags::from_raw(
    vk::ImageUsageFlags::COLOR_ATTACHMENT.as_raw() | vk::ImageUsageFlags::INPUT_ATTACHMENT.as_raw(),
);

#[derive(Default)]
pub struct TranslucencyPass;

impl TranslucencyPass {
    pub fn new() -> Self {
        Self
    }

    fn draw_state(extent: vk::Extent2D) -> VulkanResult<DrawState> {
        let write_red = ColorAttachmentState {
            blend_enable: true,
            write_mask: vk::ColorComponentFlags::R,
        };
        let mut state = DrawState::new(extent)
            .with_depth(true, false, vk::CompareOp::LESS)
            .with_color_attachments(&[ColorAttachmentState::BLENDED, write_red])
            .with_vertex_input(VertexInput::vec4_stream());

        state.set_blend_equation(0, blend_equation(vk::BlendFactor::ONE, vk::BlendFactor::ONE))?;
        state.set_blend_equation(
            1,
            blend_equation(vk::BlendFactor::ZERO, vk::BlendFactor::ONE_MINUS_SRC_COLOR),
        )?;
        Ok(state)
    }

    /// Instances drawn this frame; none while translucency is switched off
    fn instance_count(gaussian_count: u32, enabled: bool) -> u32 {
        if enabled {
            gaussian_count
        } else {
            0
        }
    }

    fn destroy_targets(handles: &DeviceHandles, allocator: &GpuAllocator, targets: &mut RenderTargets) {
        if let Some(image) = targets.accumulation.take() {
            image.destroy(allocator, &handles.device);
        }
        if let Some(image) = targets.revealage.take() {
            image.destroy(allocator, &handles.device);
        }
    }
}

impl Subpass for TranslucencyPass {
    fn name(&self) -> &'static str {
        "translucency"
    }

    fn render_target_init(
        &mut self,
        handles: &DeviceHandles,
        allocator: &GpuAllocator,
        targets: &mut RenderTargets,
    ) -> VulkanResult<()> {
        Self::destroy_targets(handles, allocator, targets);

        let extent = targets.extent;
        targets.accumulation = Some(GpuImage::new(
            allocator,
            &handles.device,
            extent,
            RenderTargets::ACCUMULATION_FORMAT,
            TARGET_USAGE,
            vk::ImageAspectFlags::COLOR,
        )?);
        targets.revealage = Some(GpuImage::new(
            allocator,
            &handles.device,
            extent,
            RenderTargets::REVEALAGE_FORMAT,
            TARGET_USAGE,
            vk::ImageAspectFlags::COLOR,
        )?);
        Ok(())
    }

    fn subpass_init(&mut self, context: InitContext<'_>) -> VulkanResult<()> {
        let shader_config = context.shader_config;
        let material = context.handles.create_material(
            shader_config,
            "translucent_splats",
            &shader_config.splat_vertex,
            &shader_config.accumulate_fragment,
            &[],
            &[PushConstantBlock::range()],
        )?;
        context.shaders.insert(ShaderObjectType::TranslucentPass, material);
        Ok(())
    }

    fn record_commands(&mut self, frame: &FrameContext<'_>, push_constants: &mut PushConstantBlock) -> VulkanResult<()> {
        let device = &frame.handles.device;
        let cmd = frame.cmd;
        let material = frame.shaders.get(ShaderObjectType::TranslucentPass)?;
        let cube = frame.buffers.require(buffer_names::CUBE)?;
        let accumulation = frame.targets.accumulation()?;
        let revealage = frame.targets.revealage()?;

        for image in [accumulation, revealage] {
            transition_image(
                device,
                cmd,
                image.handle(),
                vk::ImageAspectFlags::COLOR,
                LayoutTransition::UNDEFINED_TO_LOCAL_READ,
            );
        }

        let colors = [
            color_attachment(
                accumulation.view(),
                vk::ImageLayout::RENDERING_LOCAL_READ_KHR,
                Some(ACCUMULATION_CLEAR),
            ),
            color_attachment(
                revealage.view(),
                vk::ImageLayout::RENDERING_LOCAL_READ_KHR,
                Some([REVEALAGE_CLEAR, 0.0, 0.0, 0.0]),
            ),
        ];
        let depth = depth_attachment(
            frame.depth.view(),
            vk::ImageLayout::DEPTH_STENCIL_READ_ONLY_OPTIMAL,
            None,
        );
        begin_rendering(device, cmd, frame.extent, &colors, Some(&depth));

        Self::draw_state(frame.extent)?.set_initial_state(device, &frame.handles.shader_object, cmd);
        material.bind_material_shader(cmd);
        material.push_constants(cmd, &*push_constants);

        let instances = Self::instance_count(frame.scene.gaussian_count, frame.scene.translucency_enabled);
        unsafe {
            device.cmd_bind_vertex_buffers(cmd, 0, &[cube.handle()], &[0]);
            device.cmd_draw(cmd, BOUNDING_CUBE_VERTEX_COUNT, instances, 0, 0);
        }

        end_rendering(device, cmd);
        local_read_barrier(device, cmd);
        Ok(())
    }

    fn cleanup(&mut self, handles: &DeviceHandles, allocator: &GpuAllocator, shaders: &mut ShaderList, targets: &mut RenderTargets) {
        shaders.remove(ShaderObjectType::TranslucentPass);
        Self::destroy_targets(handles, allocator, targets);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accumulation_and_revealage_blending() {
        let state = TranslucencyPass::draw_state(vk::Extent2D { width: 800, height: 600 }).unwrap();

        assert!(state.depth_test);
        assert!(!state.depth_write);

        let accumulation = state.blend_equation(0).unwrap();
        assert_eq!(accumulation.src_color_blend_factor, vk::BlendFactor::ONE);
        assert_eq!(accumulation.dst_color_blend_factor, vk::BlendFactor::ONE);

        let revealage = state.blend_equation(1).unwrap();
        assert_eq!(revealage.src_color_blend_factor, vk::BlendFactor::ZERO);
        assert_eq!(revealage.dst_color_blend_factor, vk::BlendFactor::ONE_MINUS_SRC_COLOR);

        assert_eq!(state.color_attachments[0].write_mask, vk::ColorComponentFlags::RGBA);
        assert_eq!(state.color_attachments[1].write_mask, vk::ColorComponentFlags::R);
    }

    #[test]
    fn test_disabled_translucency_draws_nothing() {
        assert_eq!(TranslucencyPass::instance_count(1000, true), 1000);
        assert_eq!(TranslucencyPass::instance_count(1000, false), 0);
    }

    #[test]
    fn test_targets_are_readable_as_input_attachments() {
        assert!(TARGET_USAGE.contains(vk::ImageUsageFlags::INPUT_ATTACHMENT));
        assert!(TARGET_USAGE.contains(vk::ImageUsageFlags::COLOR_ATTACHMENT));
    }
}
