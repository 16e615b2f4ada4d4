// Graphics pipeline for dynamic rendering
//
// One pipeline, one shader module with both entry points. The triangle is
// generated inside the vertex stage, so there are no vertex inputs, no
// descriptor sets and no push constants. Viewport and scissor are dynamic
// and supplied per frame; the color attachment format is baked in via
// PipelineRenderingCreateInfo instead of a render-pass object.

use std::ffi::CStr;
use std::sync::Arc;

use ash::vk;

use super::device::VulkanDevice;
use super::shader;
use crate::error::RenderError;

const VERTEX_ENTRY: &CStr = c"vertMain";
const FRAGMENT_ENTRY: &CStr = c"fragMain";

pub struct Pipeline {
    pub pipeline: vk::Pipeline,
    pub layout: vk::PipelineLayout,
    device: Arc<VulkanDevice>,
}

impl Pipeline {
    /// Build the graphics pipeline targeting a single color attachment of
    /// `color_format` (the swapchain's chosen format).
    pub fn new(
        device: Arc<VulkanDevice>,
        color_format: vk::Format,
        spirv: &[u8],
    ) -> Result<Self, RenderError> {
        let module = shader::create_shader_module(&device, spirv)?;

        // The module is only needed during pipeline creation
        let result = Self::build(&device, color_format, module);
        unsafe { device.device.destroy_shader_module(module, None) };
        let (pipeline, layout) = result?;

        Ok(Self {
            pipeline,
            layout,
            device,
        })
    }

    fn build(
        device: &VulkanDevice,
        color_format: vk::Format,
        module: vk::ShaderModule,
    ) -> Result<(vk::Pipeline, vk::PipelineLayout), RenderError> {
        let shader_stages = [
            vk::PipelineShaderStageCreateInfo::builder()
                .stage(vk::ShaderStageFlags::VERTEX)
                .module(module)
                .name(VERTEX_ENTRY)
                .build(),
            vk::PipelineShaderStageCreateInfo::builder()
                .stage(vk::ShaderStageFlags::FRAGMENT)
                .module(module)
                .name(FRAGMENT_ENTRY)
                .build(),
        ];

        // No vertex buffers; positions come from the vertex shader
        let vertex_input = vk::PipelineVertexInputStateCreateInfo::builder();

        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::builder()
            .topology(vk::PrimitiveTopology::TRIANGLE_LIST)
            .primitive_restart_enable(false);

        // Counts are fixed at 1; the actual rects are set per frame
        let viewport_state = vk::PipelineViewportStateCreateInfo::builder()
            .viewport_count(1)
            .scissor_count(1);

        let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
        let dynamic_state =
            vk::PipelineDynamicStateCreateInfo::builder().dynamic_states(&dynamic_states);

        let rasterizer = vk::PipelineRasterizationStateCreateInfo::builder()
            .depth_clamp_enable(false)
            .rasterizer_discard_enable(false)
            .polygon_mode(vk::PolygonMode::FILL)
            .line_width(1.0)
            .cull_mode(vk::CullModeFlags::BACK)
            .front_face(vk::FrontFace::CLOCKWISE)
            .depth_bias_enable(false);

        let multisampling = vk::PipelineMultisampleStateCreateInfo::builder()
            .sample_shading_enable(false)
            .rasterization_samples(vk::SampleCountFlags::TYPE_1);

        let color_blend_attachments = [vk::PipelineColorBlendAttachmentState::builder()
            .blend_enable(false)
            .color_write_mask(vk::ColorComponentFlags::RGBA)
            .build()];

        let color_blending = vk::PipelineColorBlendStateCreateInfo::builder()
            .logic_op_enable(false)
            .attachments(&color_blend_attachments);

        // The shader has no external inputs, so the layout is empty
        let layout_info = vk::PipelineLayoutCreateInfo::builder();
        let layout = unsafe { device.device.create_pipeline_layout(&layout_info, None) }?;

        let color_formats = [color_format];
        let mut rendering_info = vk::PipelineRenderingCreateInfo::builder()
            .color_attachment_formats(&color_formats);

        let pipeline_info = vk::GraphicsPipelineCreateInfo::builder()
            .push_next(&mut rendering_info)
            .stages(&shader_stages)
            .vertex_input_state(&vertex_input)
            .input_assembly_state(&input_assembly)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterizer)
            .multisample_state(&multisampling)
            .color_blend_state(&color_blending)
            .dynamic_state(&dynamic_state)
            .layout(layout)
            .build();

        let pipelines = unsafe {
            device.device.create_graphics_pipelines(
                vk::PipelineCache::null(),
                &[pipeline_info],
                None,
            )
        };

        match pipelines {
            Ok(pipelines) => Ok((pipelines[0], layout)),
            Err((_, e)) => {
                unsafe { device.device.destroy_pipeline_layout(layout, None) };
                Err(e.into())
            }
        }
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        unsafe {
            self.device.device.destroy_pipeline(self.pipeline, None);
            self.device.device.destroy_pipeline_layout(self.layout, None);
        }
    }
}
