//! Opaque splat pass
//!
//! Clears the swapchain image and depth, then draws every splat whose alpha
//! reaches the opaque threshold as an instanced bounding cube. The fragment
//! shader discards everything else, leaving it to the translucency pass.

use super::{
    buffer_names, DeviceHandles, FrameContext, InitContext, PushConstantBlock, RenderTargets, ShaderList,
    ShaderObjectType, Subpass,
};
use crate::assets::{bounding_cube, GpuVec4, BOUNDING_CUBE_VERTEX_COUNT};
use crate::render::backends::vulkan::rendering::{
    begin_rendering, color_attachment, depth_attachment, end_rendering, ColorAttachmentState, DrawState, VertexInput,
};
use crate::render::backends::vulkan::resources::{transition_image, GpuAllocator, LayoutTransition};
use crate::render::backends::vulkan::VulkanResult;
use ash::vk;

/// Usage of the per-splat attribute buffers; the allocator adds device addressing
pub const SPLAT_BUFFER_USAGE: vk::BufferUsageFlags = vk::BufferUsageFlags::STORAGE_BUFFER;

#[derive(Default)]
pub struct ForwardGeometryPass;

impl ForwardGeometryPass {
    pub fn new() -> Self {
        Self
    }

    fn draw_state(extent: vk::Extent2D) -> DrawState {
        DrawState::new(extent)
            .with_depth(true, true, vk::CompareOp::LESS)
            .with_color_attachments(&[ColorAttachmentState::OPAQUE])
            .with_vertex_input(VertexInput::vec4_stream())
    }
}

impl Subpass for ForwardGeometryPass {
    fn name(&self) -> &'static str {
        "forward_geometry"
    }

    fn subpass_init(&mut self, context: InitContext<'_>) -> VulkanResult<()> {
        let InitContext {
            handles,
            allocator,
            buffers,
            shaders,
            shader_config,
            ..
        } = context;

        let material = handles.create_material(
            shader_config,
            "opaque_splats",
            &shader_config.splat_vertex,
            &shader_config.opaque_fragment,
            &[],
            &[PushConstantBlock::range()],
        )?;
        shaders.insert(ShaderObjectType::OpaquePass, material);

        if !buffers.contains(buffer_names::CUBE) {
            buffers.allocate_named_buffer(
                allocator,
                buffer_names::CUBE,
                &bounding_cube(),
                vk::BufferUsageFlags::VERTEX_BUFFER,
            )?;
        }

        // Push constants need a valid address before any model is loaded
        for name in buffer_names::SPLAT_ATTRIBUTES {
            if !buffers.contains(name) {
                buffers.allocate_named_buffer::<GpuVec4>(allocator, name, &[], SPLAT_BUFFER_USAGE)?;
            }
        }
        Ok(())
    }

    fn record_commands(&mut self, frame: &FrameContext<'_>, push_constants: &mut PushConstantBlock) -> VulkanResult<()> {
        let device = &frame.handles.device;
        let cmd = frame.cmd;
        let material = frame.shaders.get(ShaderObjectType::OpaquePass)?;
        let cube = frame.buffers.require(buffer_names::CUBE)?;
        *push_constants = PushConstantBlock::from_registry(frame.buffers, frame.frame_index)?;

        transition_image(
            device,
            cmd,
            frame.swapchain_image,
            vk::ImageAspectFlags::COLOR,
            LayoutTransition::UNDEFINED_TO_COLOR,
        );
        transition_image(
            device,
            cmd,
            frame.depth.handle(),
            frame.depth.aspect(),
            LayoutTransition::UNDEFINED_TO_DEPTH,
        );

        let colors = [color_attachment(
            frame.swapchain_view,
            vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            Some(frame.scene.clear_color),
        )];
        let depth = depth_attachment(
            frame.depth.view(),
            vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
            Some(1.0),
        );
        begin_rendering(device, cmd, frame.extent, &colors, Some(&depth));

        Self::draw_state(frame.extent).set_initial_state(device, &frame.handles.shader_object, cmd);
        material.bind_material_shader(cmd);
        material.push_constants(cmd, &*push_constants);

        unsafe {
            device.cmd_bind_vertex_buffers(cmd, 0, &[cube.handle()], &[0]);
            device.cmd_draw(cmd, BOUNDING_CUBE_VERTEX_COUNT, frame.scene.gaussian_count, 0, 0);
        }

        end_rendering(device, cmd);
        transition_image(
            device,
            cmd,
            frame.depth.handle(),
            frame.depth.aspect(),
            LayoutTransition::DEPTH_TO_READ_ONLY,
        );
        Ok(())
    }

    fn cleanup(&mut self, _handles: &DeviceHandles, _allocator: &GpuAllocator, shaders: &mut ShaderList, _targets: &mut RenderTargets) {
        shaders.remove(ShaderObjectType::OpaquePass);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opaque_draw_state() {
        let state = ForwardGeometryPass::draw_state(vk::Extent2D { width: 640, height: 480 });
        assert!(state.depth_test && state.depth_write);
        assert_eq!(state.depth_compare, vk::CompareOp::LESS);
        assert_eq!(state.color_attachments, vec![ColorAttachmentState::OPAQUE]);
        assert_eq!(state.vertex_input.bindings.len(), 1);
        assert!(state.blend_equation(0).is_none());
    }

    #[test]
    fn test_cube_covers_one_instance() {
        assert_eq!(bounding_cube().len() as u32, BOUNDING_CUBE_VERTEX_COUNT);
    }
}
