//! Final pass before presentation
//!
//! Opens a rendering instance over the finished swapchain image so overlay
//! draws have a place to go, then moves the image to the present layout.

use super::{FrameContext, PushConstantBlock, Subpass};
use crate::render::backends::vulkan::rendering::{begin_rendering, color_attachment, end_rendering};
use crate::render::backends::vulkan::resources::{transition_image, LayoutTransition};
use crate::render::backends::vulkan::VulkanResult;
use ash::vk;

#[derive(Default)]
pub struct UiOverlayPass;

impl UiOverlayPass {
    pub fn new() -> Self {
        Self
    }
}

impl Subpass for UiOverlayPass {
    fn name(&self) -> &'static str {
        "ui_overlay"
    }

    fn record_commands(&mut self, frame: &FrameContext<'_>, _push_constants: &mut PushConstantBlock) -> VulkanResult<()> {
        let device = &frame.handles.device;
        let cmd = frame.cmd;

        let colors = [color_attachment(
            frame.swapchain_view,
            vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            None,
        )];
        begin_rendering(device, cmd, frame.extent, &colors, None);
        end_rendering(device, cmd);

        transition_image(
            device,
            cmd,
            frame.swapchain_image,
            vk::ImageAspectFlags::COLOR,
            LayoutTransition::COLOR_TO_PRESENT,
        );
        Ok(())
    }
}
