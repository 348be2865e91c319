//! Dynamic rendering helpers

use ash::vk;

/// Color attachment; `clear` selects `CLEAR` over `LOAD`
pub fn color_attachment(
    view: vk::ImageView,
    layout: vk::ImageLayout,
    clear: Option<[f32; 4]>,
) -> vk::RenderingAttachmentInfo<'static> {
    let info = vk::RenderingAttachmentInfo::default()
        .image_view(view)
        .image_layout(layout)
        .store_op(vk::AttachmentStoreOp::STORE);

    match clear {
        Some(color) => info.load_op(vk::AttachmentLoadOp::CLEAR).clear_value(vk::ClearValue {
            color: vk::ClearColorValue { float32: color },
        }),
        None => info.load_op(vk::AttachmentLoadOp::LOAD),
    }
}

/// Depth attachment; `clear` selects `CLEAR` over `LOAD`
pub fn depth_attachment(
    view: vk::ImageView,
    layout: vk::ImageLayout,
    clear: Option<f32>,
) -> vk::RenderingAttachmentInfo<'static> {
    let info = vk::RenderingAttachmentInfo::default()
        .image_view(view)
        .image_layout(layout);

    match clear {
        Some(depth) => info
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::STORE)
            .clear_value(vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue { depth, stencil: 0 },
            }),
        None => info
            .load_op(vk::AttachmentLoadOp::LOAD)
            .store_op(vk::AttachmentStoreOp::NONE),
    }
}

/// Begin a dynamic rendering instance covering the whole extent
pub fn begin_rendering(
    device: &ash::Device,
    cmd: vk::CommandBuffer,
    extent: vk::Extent2D,
    color_attachments: &[vk::RenderingAttachmentInfo<'_>],
    depth_attachment: Option<&vk::RenderingAttachmentInfo<'_>>,
) {
    let mut rendering_info = vk::RenderingInfo::default()
        .render_area(vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent,
        })
        .layer_count(1)
        .color_attachments(color_attachments);
    if let Some(depth) = depth_attachment {
        rendering_info = rendering_info.depth_attachment(depth);
    }

    unsafe { device.cmd_begin_rendering(cmd, &rendering_info) };
}

pub fn end_rendering(device: &ash::Device, cmd: vk::CommandBuffer) {
    unsafe { device.cmd_end_rendering(cmd) };
}

/// Map color attachments to `input_attachment_index` values for local read
///
/// `None` entries are not readable as input attachments.
pub fn set_input_attachment_indices(
    local_read: &ash::khr::dynamic_rendering_local_read::Device,
    cmd: vk::CommandBuffer,
    indices: &[Option<u32>],
) {
    let indices = input_attachment_index_list(indices);
    let info = vk::RenderingInputAttachmentIndexInfoKHR::default().color_attachment_input_indices(&indices);
    unsafe { local_read.cmd_set_rendering_input_attachment_indices(cmd, &info) };
}

fn input_attachment_index_list(indices: &[Option<u32>]) -> Vec<u32> {
    indices.iter().map(|index| index.unwrap_or(vk::ATTACHMENT_UNUSED)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clear_selects_load_op() {
        let cleared = color_attachment(vk::ImageView::null(), vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL, Some([0.0; 4]));
        let loaded = color_attachment(vk::ImageView::null(), vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL, None);
        assert_eq!(cleared.load_op, vk::AttachmentLoadOp::CLEAR);
        assert_eq!(loaded.load_op, vk::AttachmentLoadOp::LOAD);
        assert_eq!(loaded.store_op, vk::AttachmentStoreOp::STORE);
    }

    #[test]
    fn test_read_only_depth_is_not_stored() {
        let depth = depth_attachment(vk::ImageView::null(), vk::ImageLayout::DEPTH_STENCIL_READ_ONLY_OPTIMAL, None);
        assert_eq!(depth.load_op, vk::AttachmentLoadOp::LOAD);
        assert_eq!(depth.store_op, vk::AttachmentStoreOp::NONE);
    }

    #[test]
    fn test_unmapped_input_attachments() {
        assert_eq!(
            input_attachment_index_list(&[None, Some(0), Some(1)]),
            vec![vk::ATTACHMENT_UNUSED, 0, 1]
        );
    }
}
