//! Linked vertex/fragment shader objects and the materials built from them
//!
//! Stages are bound individually with `vkCmdBindShadersEXT`; there is no
//! pipeline object. All fixed-function state comes from [`super::DrawState`].

use crate::render::backends::vulkan::{VulkanError, VulkanResult};
use ash::vk;
use std::fs::File;
use std::io::Cursor;
use std::path::Path;

const SHADER_ENTRY: &std::ffi::CStr = c"main";

/// Decode SPIR-V bytes into aligned words
pub fn spirv_from_bytes(bytes: &[u8]) -> VulkanResult<Vec<u32>> {
    ash::util::read_spv(&mut Cursor::new(bytes))
        .map_err(|e| VulkanError::ShaderCreation(format!("Invalid SPIR-V: {}", e)))
}

/// Read a SPIR-V file into aligned words
pub fn read_spirv(path: &Path) -> VulkanResult<Vec<u32>> {
    let mut file = File::open(path).map_err(|e| {
        log::error!("Failed to open shader {:?}: {}", path, e);
        VulkanError::ShaderCreation(format!("{}: {}", path.display(), e))
    })?;

    let words = ash::util::read_spv(&mut file)
        .map_err(|e| VulkanError::ShaderCreation(format!("{}: {}", path.display(), e)))?;
    log::debug!("Loaded {} ({} words)", path.display(), words.len());
    Ok(words)
}

/// Vertex and fragment shader objects compiled together with `LINK_STAGE`
pub struct ShaderObjectPair {
    loader: ash::ext::shader_object::Device,
    vertex: vk::ShaderEXT,
    fragment: vk::ShaderEXT,
}

impl ShaderObjectPair {
    /// Compile both stages with a shared interface
    pub fn create_shaders(
        loader: &ash::ext::shader_object::Device,
        vertex_code: &[u32],
        fragment_code: &[u32],
        set_layouts: &[vk::DescriptorSetLayout],
        push_constant_ranges: &[vk::PushConstantRange],
    ) -> VulkanResult<Self> {
        let vertex_bytes: &[u8] = bytemuck::cast_slice(vertex_code);
        let fragment_bytes: &[u8] = bytemuck::cast_slice(fragment_code);

        let create_infos = [
            vk::ShaderCreateInfoEXT::default()
                .flags(vk::ShaderCreateFlagsEXT::LINK_STAGE)
                .stage(vk::ShaderStageFlags::VERTEX)
                .next_stage(vk::ShaderStageFlags::FRAGMENT)
                .code_type(vk::ShaderCodeTypeEXT::SPIRV)
                .code(vertex_bytes)
                .name(SHADER_ENTRY)
                .set_layouts(set_layouts)
                .push_constant_ranges(push_constant_ranges),
            vk::ShaderCreateInfoEXT::default()
                .flags(vk::ShaderCreateFlagsEXT::LINK_STAGE)
                .stage(vk::ShaderStageFlags::FRAGMENT)
                .next_stage(vk::ShaderStageFlags::empty())
                .code_type(vk::ShaderCodeTypeEXT::SPIRV)
                .code(fragment_bytes)
                .name(SHADER_ENTRY)
                .set_layouts(set_layouts)
                .push_constant_ranges(push_constant_ranges),
        ];

        let shaders = unsafe { loader.create_shaders(&create_infos, None) }.map_err(|e| {
            log::error!("vkCreateShadersEXT failed: {:?}", e);
            VulkanError::ShaderCreation(format!("vkCreateShadersEXT: {:?}", e))
        })?;

        match shaders.as_slice() {
            &[vertex, fragment] => Ok(Self {
                loader: loader.clone(),
                vertex,
                fragment,
            }),
            other => {
                for &shader in other {
                    unsafe { loader.destroy_shader(shader, None) };
                }
                Err(VulkanError::ShaderCreation(format!("Expected 2 shader objects, got {}", other.len())))
            }
        }
    }

    /// Bind both stages into the command buffer
    pub fn bind(&self, cmd: vk::CommandBuffer) {
        let stages = [vk::ShaderStageFlags::VERTEX, vk::ShaderStageFlags::FRAGMENT];
        let shaders = [self.vertex, self.fragment];
        unsafe { self.loader.cmd_bind_shaders(cmd, &stages, &shaders) };
    }
}

impl Drop for ShaderObjectPair {
    fn drop(&mut self) {
        unsafe {
            self.loader.destroy_shader(self.vertex, None);
            self.loader.destroy_shader(self.fragment, None);
        }
    }
}

/// Where a material's SPIR-V comes from
#[derive(Debug, Clone, Copy)]
pub struct MaterialSource<'a> {
    pub name: &'a str,
    pub vertex: &'a Path,
    pub fragment: &'a Path,
}

/// A shader pair plus the pipeline layout matching its interface
pub struct Material {
    name: String,
    device: ash::Device,
    shaders: ShaderObjectPair,
    pipeline_layout: vk::PipelineLayout,
    push_constant_stages: vk::ShaderStageFlags,
}

impl Material {
    pub fn new(
        device: &ash::Device,
        loader: &ash::ext::shader_object::Device,
        source: MaterialSource<'_>,
        set_layouts: &[vk::DescriptorSetLayout],
        push_constant_ranges: &[vk::PushConstantRange],
    ) -> VulkanResult<Self> {
        let vertex_code = read_spirv(source.vertex)?;
        let fragment_code = read_spirv(source.fragment)?;
        let shaders =
            ShaderObjectPair::create_shaders(loader, &vertex_code, &fragment_code, set_layouts, push_constant_ranges)?;

        let layout_info = vk::PipelineLayoutCreateInfo::default()
            .set_layouts(set_layouts)
            .push_constant_ranges(push_constant_ranges);
        let pipeline_layout = unsafe { device.create_pipeline_layout(&layout_info, None) }.map_err(VulkanError::Api)?;

        let push_constant_stages = push_constant_ranges
            .iter()
            .fold(vk::ShaderStageFlags::empty(), |stages, range| stages | range.stage_flags);

        log::info!("Created material '{}'", source.name);

        Ok(Self {
            name: source.name.to_string(),
            device: device.clone(),
            shaders,
            pipeline_layout,
            push_constant_stages,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pipeline_layout(&self) -> vk::PipelineLayout {
        self.pipeline_layout
    }

    pub fn bind_material_shader(&self, cmd: vk::CommandBuffer) {
        self.shaders.bind(cmd);
    }

    /// Push `data` at offset 0 to every stage declared by the push-constant ranges
    pub fn push_constants<T: bytemuck::Pod>(&self, cmd: vk::CommandBuffer, data: &T) {
        unsafe {
            self.device.cmd_push_constants(
                cmd,
                self.pipeline_layout,
                self.push_constant_stages,
                0,
                bytemuck::bytes_of(data),
            );
        }
    }

    pub fn bind_descriptor_set(&self, cmd: vk::CommandBuffer, set: vk::DescriptorSet) {
        unsafe {
            self.device.cmd_bind_descriptor_sets(
                cmd,
                vk::PipelineBindPoint::GRAPHICS,
                self.pipeline_layout,
                0,
                &[set],
                &[],
            );
        }
    }
}

impl Drop for Material {
    fn drop(&mut self) {
        log::debug!("Destroying material '{}'", self.name);
        unsafe { self.device.destroy_pipeline_layout(self.pipeline_layout, None) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SPIRV_MAGIC: u32 = 0x0723_0203;

    #[test]
    fn test_spirv_words_are_decoded() {
        let mut bytes = SPIRV_MAGIC.to_le_bytes().to_vec();
        bytes.extend_from_slice(&0x0001_0600u32.to_le_bytes());

        let words = spirv_from_bytes(&bytes).unwrap();
        assert_eq!(words, vec![SPIRV_MAGIC, 0x0001_0600]);
    }

    #[test]
    fn test_truncated_spirv_is_rejected() {
        let mut bytes = SPIRV_MAGIC.to_le_bytes().to_vec();
        bytes.push(0);
        assert!(matches!(spirv_from_bytes(&bytes), Err(VulkanError::ShaderCreation(_))));
    }

    #[test]
    fn test_missing_shader_file_is_shader_error() {
        let result = read_spirv(Path::new("definitely/not/here.spv"));
        assert!(matches!(result, Err(VulkanError::ShaderCreation(_))));
    }
}
