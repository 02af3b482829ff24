//! Post-process composition pipeline of subpass 1
//!
//! A full-screen triangle with no vertex input. Reads the first subpass's
//! color and depth as input attachments and applies the post-processing
//! features (gamma correction) on the way to the swapchain image.

use ash::vk;

use crate::render::vulkan::layouts::{SetLayout, SetLayoutCatalog};
use crate::render::vulkan::pipeline::{
    build_pipeline, DepthStencilSpec, PipelineHandles, PipelineSpec, VertexInputKind,
};
use crate::render::vulkan::shaders::{PassTag, ShaderCatalog};
use crate::render::vulkan::{VulkanContext, VulkanResult};

/// The composition pipeline
pub struct CompositionPipeline {
    handles: PipelineHandles,
}

impl CompositionPipeline {
    /// Describe and create the pipeline
    pub fn new(
        ctx: &VulkanContext,
        render_pass: vk::RenderPass,
        layouts: &SetLayoutCatalog,
        shaders: &mut ShaderCatalog,
    ) -> VulkanResult<Self> {
        let stages = shaders.stages(PassTag::Second, None)?;

        let spec = PipelineSpec {
            stages,
            vertex_input: VertexInputKind::None,
            subpass: 1,
            cull_mode: vk::CullModeFlags::NONE,
            depth_stencil: DepthStencilSpec {
                depth_test: false,
                depth_write: false,
                stencil: None,
            },
            set_layouts: vec![
                layouts.get(SetLayout::PostProcessInput),
                // same 1-UBO/fragment shape as the material uniform; the
                // registry is a closed set, so the shape is reused here
                layouts.get(SetLayout::MaterialUniform),
            ],
            push_constant: None,
        };

        Ok(Self {
            handles: build_pipeline(ctx, render_pass, &spec)?,
        })
    }

    /// Bind for drawing
    pub fn cmd_bind(&self, device: &ash::Device, command_buffer: vk::CommandBuffer) {
        self.handles.cmd_bind(device, command_buffer);
    }

    /// Pipeline layout for descriptor binds
    pub fn layout(&self) -> vk::PipelineLayout {
        self.handles.layout
    }

    /// Destroy the pipeline and its layout
    pub fn cleanup(&mut self, device: &ash::Device) {
        self.handles.cleanup(device);
    }
}
