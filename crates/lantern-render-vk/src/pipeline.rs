// SPDX-License-Identifier: CEPL-1.0
use std::io::Cursor;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use ash::util::read_spv;
use ash::vk;

use crate::device::DeviceContext;

/// Fixed-function state for a graphics pipeline. Viewport and scissor are
/// always dynamic; the renderer sets them per frame from the swapchain extent.
#[derive(Clone)]
pub struct PipelineConfig {
    pub binding_descriptions: Vec<vk::VertexInputBindingDescription>,
    pub attribute_descriptions: Vec<vk::VertexInputAttributeDescription>,
    pub topology: vk::PrimitiveTopology,
    pub polygon_mode: vk::PolygonMode,
    pub cull_mode: vk::CullModeFlags,
    pub front_face: vk::FrontFace,
    pub color_blend_attachment: vk::PipelineColorBlendAttachmentState,
    pub depth_test: bool,
    pub depth_write: bool,
    pub depth_compare_op: vk::CompareOp,
    pub render_pass: vk::RenderPass,
    pub subpass: u32,
    pub layout: vk::PipelineLayout,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            binding_descriptions: Vec::new(),
            attribute_descriptions: Vec::new(),
            topology: vk::PrimitiveTopology::TRIANGLE_LIST,
            polygon_mode: vk::PolygonMode::FILL,
            cull_mode: vk::CullModeFlags::NONE,
            front_face: vk::FrontFace::CLOCKWISE,
            color_blend_attachment: vk::PipelineColorBlendAttachmentState {
                blend_enable: vk::FALSE,
                color_write_mask: vk::ColorComponentFlags::RGBA,
                ..Default::default()
            },
            depth_test: true,
            depth_write: true,
            depth_compare_op: vk::CompareOp::LESS,
            render_pass: vk::RenderPass::null(),
            subpass: 0,
            layout: vk::PipelineLayout::null(),
        }
    }
}

impl PipelineConfig {
    /// Straight alpha blending over whatever is already in the target.
    pub fn enable_alpha_blending(&mut self) {
        self.color_blend_attachment = vk::PipelineColorBlendAttachmentState {
            blend_enable: vk::TRUE,
            src_color_blend_factor: vk::BlendFactor::SRC_ALPHA,
            dst_color_blend_factor: vk::BlendFactor::ONE_MINUS_SRC_ALPHA,
            color_blend_op: vk::BlendOp::ADD,
            src_alpha_blend_factor: vk::BlendFactor::ONE,
            dst_alpha_blend_factor: vk::BlendFactor::ZERO,
            alpha_blend_op: vk::BlendOp::ADD,
            color_write_mask: vk::ColorComponentFlags::RGBA,
        };
    }
}

pub struct PipelineLayout {
    ctx: Arc<DeviceContext>,
    layout: vk::PipelineLayout,
}

impl Drop for PipelineLayout {
    fn drop(&mut self) {
        unsafe { self.ctx.device().destroy_pipeline_layout(self.layout, None) };
    }
}

impl PipelineLayout {
    pub fn new(
        ctx: Arc<DeviceContext>,
        set_layouts: &[vk::DescriptorSetLayout],
        push_constants: vk::PushConstantRange,
    ) -> Result<Self> {
        let ci = vk::PipelineLayoutCreateInfo {
            s_type: vk::StructureType::PIPELINE_LAYOUT_CREATE_INFO,
            set_layout_count: set_layouts.len() as u32,
            p_set_layouts: set_layouts.as_ptr(),
            push_constant_range_count: 1,
            p_push_constant_ranges: &push_constants,
            ..Default::default()
        };
        let layout = unsafe { ctx.device().create_pipeline_layout(&ci, None) }
            .context("create_pipeline_layout")?;
        Ok(Self { ctx, layout })
    }

    pub fn raw(&self) -> vk::PipelineLayout {
        self.layout
    }
}

pub struct Pipeline {
    ctx: Arc<DeviceContext>,
    pipeline: vk::Pipeline,
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        unsafe { self.ctx.device().destroy_pipeline(self.pipeline, None) };
    }
}

unsafe fn create_shader_module(device: &ash::Device, spv: &[u8]) -> Result<vk::ShaderModule> {
    let code = read_spv(&mut Cursor::new(spv)).context("read_spv")?;
    let ci = vk::ShaderModuleCreateInfo {
        s_type: vk::StructureType::SHADER_MODULE_CREATE_INFO,
        p_code: code.as_ptr(),
        code_size: code.len() * 4,
        ..Default::default()
    };
    Ok(unsafe { device.create_shader_module(&ci, None) }.context("create_shader_module")?)
}

impl Pipeline {
    pub fn new(ctx: Arc<DeviceContext>, vert_spv: &[u8], frag_spv: &[u8], config: &PipelineConfig) -> Result<Self> {
        let pipeline = unsafe { Self::build(ctx.device(), vert_spv, frag_spv, config) }?;
        Ok(Self { ctx, pipeline })
    }

    unsafe fn build(
        device: &ash::Device,
        vert_spv: &[u8],
        frag_spv: &[u8],
        config: &PipelineConfig,
    ) -> Result<vk::Pipeline> {
        // STRICT: render_pass MUST be compatible with every swapchain this
        // pipeline is used with (same color + depth formats).
        if config.render_pass == vk::RenderPass::null() || config.layout == vk::PipelineLayout::null() {
            return Err(anyhow!("pipeline config is missing a render pass or layout"));
        }

        // Shader modules are destroyed before return.
        let vs = unsafe { create_shader_module(device, vert_spv) }?;
        let fs = match unsafe { create_shader_module(device, frag_spv) } {
            Ok(fs) => fs,
            Err(e) => {
                unsafe { device.destroy_shader_module(vs, None) };
                return Err(e);
            }
        };
        let entry = c"main";

        let stages = [
            vk::PipelineShaderStageCreateInfo {
                s_type: vk::StructureType::PIPELINE_SHADER_STAGE_CREATE_INFO,
                stage: vk::ShaderStageFlags::VERTEX,
                module: vs,
                p_name: entry.as_ptr(),
                ..Default::default()
            },
            vk::PipelineShaderStageCreateInfo {
                s_type: vk::StructureType::PIPELINE_SHADER_STAGE_CREATE_INFO,
                stage: vk::ShaderStageFlags::FRAGMENT,
                module: fs,
                p_name: entry.as_ptr(),
                ..Default::default()
            },
        ];

        let vertex_input = vk::PipelineVertexInputStateCreateInfo {
            s_type: vk::StructureType::PIPELINE_VERTEX_INPUT_STATE_CREATE_INFO,
            vertex_binding_description_count: config.binding_descriptions.len() as u32,
            p_vertex_binding_descriptions: config.binding_descriptions.as_ptr(),
            vertex_attribute_description_count: config.attribute_descriptions.len() as u32,
            p_vertex_attribute_descriptions: config.attribute_descriptions.as_ptr(),
            ..Default::default()
        };
        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo {
            s_type: vk::StructureType::PIPELINE_INPUT_ASSEMBLY_STATE_CREATE_INFO,
            topology: config.topology,
            primitive_restart_enable: vk::FALSE,
            ..Default::default()
        };
        // Counts only; the actual rects are dynamic.
        let viewport_state = vk::PipelineViewportStateCreateInfo {
            s_type: vk::StructureType::PIPELINE_VIEWPORT_STATE_CREATE_INFO,
            viewport_count: 1,
            scissor_count: 1,
            ..Default::default()
        };
        let raster = vk::PipelineRasterizationStateCreateInfo {
            s_type: vk::StructureType::PIPELINE_RASTERIZATION_STATE_CREATE_INFO,
            polygon_mode: config.polygon_mode,
            cull_mode: config.cull_mode,
            front_face: config.front_face,
            line_width: 1.0,
            ..Default::default()
        };
        let multisample = vk::PipelineMultisampleStateCreateInfo {
            s_type: vk::StructureType::PIPELINE_MULTISAMPLE_STATE_CREATE_INFO,
            rasterization_samples: vk::SampleCountFlags::TYPE_1,
            min_sample_shading: 1.0,
            ..Default::default()
        };
        let color_blend = vk::PipelineColorBlendStateCreateInfo {
            s_type: vk::StructureType::PIPELINE_COLOR_BLEND_STATE_CREATE_INFO,
            logic_op: vk::LogicOp::COPY,
            attachment_count: 1,
            p_attachments: &config.color_blend_attachment,
            ..Default::default()
        };
        let depth_stencil = vk::PipelineDepthStencilStateCreateInfo {
            s_type: vk::StructureType::PIPELINE_DEPTH_STENCIL_STATE_CREATE_INFO,
            depth_test_enable: config.depth_test as vk::Bool32,
            depth_write_enable: config.depth_write as vk::Bool32,
            depth_compare_op: config.depth_compare_op,
            min_depth_bounds: 0.0,
            max_depth_bounds: 1.0,
            ..Default::default()
        };
        let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
        let dynamic = vk::PipelineDynamicStateCreateInfo {
            s_type: vk::StructureType::PIPELINE_DYNAMIC_STATE_CREATE_INFO,
            dynamic_state_count: dynamic_states.len() as u32,
            p_dynamic_states: dynamic_states.as_ptr(),
            ..Default::default()
        };

        let pipeline_info = vk::GraphicsPipelineCreateInfo {
            s_type: vk::StructureType::GRAPHICS_PIPELINE_CREATE_INFO,
            stage_count: stages.len() as u32,
            p_stages: stages.as_ptr(),
            p_vertex_input_state: &vertex_input,
            p_input_assembly_state: &input_assembly,
            p_viewport_state: &viewport_state,
            p_rasterization_state: &raster,
            p_multisample_state: &multisample,
            p_depth_stencil_state: &depth_stencil,
            p_color_blend_state: &color_blend,
            p_dynamic_state: &dynamic,
            layout: config.layout,
            render_pass: config.render_pass,
            subpass: config.subpass,
            ..Default::default()
        };

        let created = unsafe {
            device.create_graphics_pipelines(
                vk::PipelineCache::null(),
                std::slice::from_ref(&pipeline_info),
                None,
            )
        };
        unsafe {
            device.destroy_shader_module(vs, None);
            device.destroy_shader_module(fs, None);
        }
        match created {
            Ok(mut v) => v.pop().ok_or_else(|| anyhow!("driver returned no pipeline")),
            Err((_, err)) => Err(anyhow!("create_graphics_pipelines failed: {:?}", err)),
        }
    }

    pub fn bind(&self, cmd: vk::CommandBuffer) {
        unsafe {
            self.ctx
                .device()
                .cmd_bind_pipeline(cmd, vk::PipelineBindPoint::GRAPHICS, self.pipeline)
        };
    }

    pub fn raw(&self) -> vk::Pipeline {
        self.pipeline
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alpha_blending_only_touches_the_blend_state() {
        let mut config = PipelineConfig::default();
        assert_eq!(config.color_blend_attachment.blend_enable, vk::FALSE);
        config.enable_alpha_blending();
        assert_eq!(config.color_blend_attachment.blend_enable, vk::TRUE);
        assert_eq!(
            config.color_blend_attachment.dst_color_blend_factor,
            vk::BlendFactor::ONE_MINUS_SRC_ALPHA
        );
        assert!(config.depth_test && config.depth_write);
    }
}
