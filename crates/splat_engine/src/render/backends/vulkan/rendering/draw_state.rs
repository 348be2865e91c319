//! Dynamic pipeline state for shader-object draws
//!
//! With shader objects nothing is baked, so every pass applies a complete
//! [`DrawState`] after `begin_rendering` and before its first draw. State does
//! not carry over between rendering instances.

use crate::render::backends::vulkan::{VulkanError, VulkanResult};
use ash::vk;

/// Blend equation slots; the OIT pass writes two attachments
pub const MAX_BLEND_EQUATIONS: usize = 2;

/// `src * src_factor (op) dst * dst_factor` for color and alpha alike
pub fn blend_equation(src: vk::BlendFactor, dst: vk::BlendFactor) -> vk::ColorBlendEquationEXT {
    vk::ColorBlendEquationEXT {
        src_color_blend_factor: src,
        dst_color_blend_factor: dst,
        color_blend_op: vk::BlendOp::ADD,
        src_alpha_blend_factor: src,
        dst_alpha_blend_factor: dst,
        alpha_blend_op: vk::BlendOp::ADD,
    }
}

/// Write mask and blend switch for one color attachment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorAttachmentState {
    pub blend_enable: bool,
    pub write_mask: vk::ColorComponentFlags,
}

impl ColorAttachmentState {
    pub const OPAQUE: Self = Self {
        blend_enable: false,
        write_mask: vk::ColorComponentFlags::RGBA,
    };

    pub const BLENDED: Self = Self {
        blend_enable: true,
        write_mask: vk::ColorComponentFlags::RGBA,
    };

    /// Bound for local read only, never written
    pub const READ_ONLY: Self = Self {
        blend_enable: false,
        write_mask: vk::ColorComponentFlags::empty(),
    };
}

/// Vertex layout supplied at record time instead of at pipeline creation
#[derive(Debug, Clone, Default)]
pub struct VertexInput {
    pub bindings: Vec<vk::VertexInputBindingDescription2EXT<'static>>,
    pub attributes: Vec<vk::VertexInputAttributeDescription2EXT<'static>>,
}

impl VertexInput {
    /// No vertex buffers; positions come from `gl_VertexIndex`
    pub fn none() -> Self {
        Self::default()
    }

    /// One per-vertex `vec4` stream at location 0
    pub fn vec4_stream() -> Self {
        let stride = std::mem::size_of::<[f32; 4]>() as u32;
        Self {
            bindings: vec![vk::VertexInputBindingDescription2EXT::default()
                .binding(0)
                .stride(stride)
                .input_rate(vk::VertexInputRate::VERTEX)
                .divisor(1)],
            attributes: vec![vk::VertexInputAttributeDescription2EXT::default()
                .location(0)
                .binding(0)
                .format(vk::Format::R32G32B32A32_SFLOAT)
                .offset(0)],
        }
    }
}

/// Every piece of dynamic state one draw depends on
#[derive(Debug, Clone)]
pub struct DrawState {
    pub extent: vk::Extent2D,
    pub topology: vk::PrimitiveTopology,
    pub cull_mode: vk::CullModeFlags,
    pub front_face: vk::FrontFace,
    pub depth_test: bool,
    pub depth_write: bool,
    pub depth_compare: vk::CompareOp,
    pub color_attachments: Vec<ColorAttachmentState>,
    pub vertex_input: VertexInput,
    blend_equations: [Option<vk::ColorBlendEquationEXT>; MAX_BLEND_EQUATIONS],
}

impl DrawState {
    /// Triangle list, no culling, depth off, no attachments
    pub fn new(extent: vk::Extent2D) -> Self {
        Self {
            extent,
            topology: vk::PrimitiveTopology::TRIANGLE_LIST,
            cull_mode: vk::CullModeFlags::NONE,
            front_face: vk::FrontFace::COUNTER_CLOCKWISE,
            depth_test: false,
            depth_write: false,
            depth_compare: vk::CompareOp::LESS,
            color_attachments: Vec::new(),
            vertex_input: VertexInput::none(),
            blend_equations: [None; MAX_BLEND_EQUATIONS],
        }
    }

    pub fn with_depth(mut self, test: bool, write: bool, compare: vk::CompareOp) -> Self {
        self.depth_test = test;
        self.depth_write = write;
        self.depth_compare = compare;
        self
    }

    pub fn with_color_attachments(mut self, attachments: &[ColorAttachmentState]) -> Self {
        self.color_attachments = attachments.to_vec();
        self
    }

    pub fn with_vertex_input(mut self, vertex_input: VertexInput) -> Self {
        self.vertex_input = vertex_input;
        self
    }

    /// Set the blend equation of attachment `index`
    pub fn set_blend_equation(&mut self, index: usize, equation: vk::ColorBlendEquationEXT) -> VulkanResult<()> {
        let slot = self.blend_equations.get_mut(index).ok_or_else(|| VulkanError::InvalidOperation {
            reason: format!("Blend equation slot {} out of range (max {})", index, MAX_BLEND_EQUATIONS),
        })?;
        *slot = Some(equation);
        Ok(())
    }

    pub fn blend_equation(&self, index: usize) -> Option<vk::ColorBlendEquationEXT> {
        self.blend_equations.get(index).copied().flatten()
    }

    /// Leading run of configured blend equations, as passed to the driver
    fn active_blend_equations(&self) -> Vec<vk::ColorBlendEquationEXT> {
        self.blend_equations.iter().map_while(|equation| *equation).collect()
    }

    /// Record every dynamic state command
    pub fn set_initial_state(
        &self,
        device: &ash::Device,
        shader_object: &ash::ext::shader_object::Device,
        cmd: vk::CommandBuffer,
    ) {
        let viewport = vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: self.extent.width as f32,
            height: self.extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        };
        let scissor = vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent: self.extent,
        };

        let blend_enables: Vec<vk::Bool32> = self
            .color_attachments
            .iter()
            .map(|attachment| attachment.blend_enable.into())
            .collect();
        let write_masks: Vec<vk::ColorComponentFlags> =
            self.color_attachments.iter().map(|attachment| attachment.write_mask).collect();
        let blend_equations = self.active_blend_equations();
        let sample_mask = [vk::SampleMask::MAX];

        unsafe {
            device.cmd_set_viewport_with_count(cmd, &[viewport]);
            device.cmd_set_scissor_with_count(cmd, &[scissor]);
            device.cmd_set_primitive_topology(cmd, self.topology);
            device.cmd_set_primitive_restart_enable(cmd, false);
            device.cmd_set_rasterizer_discard_enable(cmd, false);
            device.cmd_set_cull_mode(cmd, self.cull_mode);
            device.cmd_set_front_face(cmd, self.front_face);
            device.cmd_set_depth_bias_enable(cmd, false);
            device.cmd_set_depth_test_enable(cmd, self.depth_test);
            device.cmd_set_depth_write_enable(cmd, self.depth_write);
            device.cmd_set_depth_compare_op(cmd, self.depth_compare);
            device.cmd_set_depth_bounds_test_enable(cmd, false);
            device.cmd_set_stencil_test_enable(cmd, false);

            shader_object.cmd_set_polygon_mode(cmd, vk::PolygonMode::FILL);
            shader_object.cmd_set_rasterization_samples(cmd, vk::SampleCountFlags::TYPE_1);
            shader_object.cmd_set_sample_mask(cmd, vk::SampleCountFlags::TYPE_1, &sample_mask);
            shader_object.cmd_set_alpha_to_coverage_enable(cmd, false);

            if !self.color_attachments.is_empty() {
                shader_object.cmd_set_color_blend_enable(cmd, 0, &blend_enables);
                shader_object.cmd_set_color_write_mask(cmd, 0, &write_masks);
            }
            if !blend_equations.is_empty() {
                shader_object.cmd_set_color_blend_equation(cmd, 0, &blend_equations);
            }

            shader_object.cmd_set_vertex_input(cmd, &self.vertex_input.bindings, &self.vertex_input.attributes);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extent() -> vk::Extent2D {
        vk::Extent2D { width: 800, height: 600 }
    }

    #[test]
    fn test_blend_equation_slots_are_bounded() {
        let mut state = DrawState::new(extent());
        let additive = blend_equation(vk::BlendFactor::ONE, vk::BlendFactor::ONE);

        assert!(state.set_blend_equation(0, additive).is_ok());
        assert!(state.set_blend_equation(MAX_BLEND_EQUATIONS - 1, additive).is_ok());
        assert!(matches!(
            state.set_blend_equation(MAX_BLEND_EQUATIONS, additive),
            Err(VulkanError::InvalidOperation { .. })
        ));
    }

    #[test]
    fn test_blend_equations_tracked_per_attachment() {
        let mut state = DrawState::new(extent());
        let additive = blend_equation(vk::BlendFactor::ONE, vk::BlendFactor::ONE);
        let revealage = blend_equation(vk::BlendFactor::ZERO, vk::BlendFactor::ONE_MINUS_SRC_COLOR);

        state.set_blend_equation(1, revealage).unwrap();
        assert!(state.blend_equation(0).is_none());
        // A gap at slot 0 means nothing is submitted
        assert!(state.active_blend_equations().is_empty());

        state.set_blend_equation(0, additive).unwrap();
        let active = state.active_blend_equations();
        assert_eq!(active.len(), 2);
        assert_eq!(active[0].dst_color_blend_factor, vk::BlendFactor::ONE);
        assert_eq!(active[1].dst_color_blend_factor, vk::BlendFactor::ONE_MINUS_SRC_COLOR);
    }

    #[test]
    fn test_vertex_input_layouts() {
        assert!(VertexInput::none().bindings.is_empty());

        let stream = VertexInput::vec4_stream();
        assert_eq!(stream.bindings[0].stride, 16);
        assert_eq!(stream.attributes[0].format, vk::Format::R32G32B32A32_SFLOAT);
    }

    #[test]
    fn test_builder_defaults() {
        let state = DrawState::new(extent())
            .with_depth(true, false, vk::CompareOp::LESS_OR_EQUAL)
            .with_color_attachments(&[ColorAttachmentState::BLENDED, ColorAttachmentState::READ_ONLY]);

        assert_eq!(state.cull_mode, vk::CullModeFlags::NONE);
        assert!(state.depth_test && !state.depth_write);
        assert_eq!(state.color_attachments.len(), 2);
        assert!(state.color_attachments[1].write_mask.is_empty());
    }
}
