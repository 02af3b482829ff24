//! Stencil-based outline pipeline
//!
//! Draws every model a second time, slightly inflated by its shader, with a
//! stencil-not-equal test against the reference the geometry pass wrote and
//! no depth test; only the silhouette ring around the model survives.

use ash::vk;

use crate::render::vulkan::layouts::{SetLayout, SetLayoutCatalog};
use crate::render::vulkan::pipeline::{
    build_pipeline, model_push_constant_range, DepthStencilSpec, PipelineHandles, PipelineSpec,
    VertexInputKind,
};
use crate::render::vulkan::shaders::{PassTag, ShaderCatalog};
use crate::render::vulkan::{VulkanContext, VulkanResult};

/// The outline pipeline
pub struct OutlinePipeline {
    handles: PipelineHandles,
}

impl OutlinePipeline {
    /// Describe and create the pipeline
    pub fn new(
        ctx: &VulkanContext,
        render_pass: vk::RenderPass,
        layouts: &SetLayoutCatalog,
        shaders: &mut ShaderCatalog,
    ) -> VulkanResult<Self> {
        let stages = shaders.stages(PassTag::First, Some("outline"))?;

        let stencil_test = vk::StencilOpState {
            fail_op: vk::StencilOp::KEEP,
            pass_op: vk::StencilOp::KEEP,
            depth_fail_op: vk::StencilOp::KEEP,
            compare_op: vk::CompareOp::NOT_EQUAL,
            compare_mask: 0xFF,
            write_mask: 0x00,
            reference: 1,
        };

        let spec = PipelineSpec {
            stages,
            vertex_input: VertexInputKind::Standard,
            subpass: 0,
            cull_mode: vk::CullModeFlags::BACK,
            depth_stencil: DepthStencilSpec {
                depth_test: false,
                depth_write: false,
                stencil: Some(stencil_test),
            },
            set_layouts: vec![layouts.get(SetLayout::Camera)],
            push_constant: Some(model_push_constant_range()),
        };

        Ok(Self {
            handles: build_pipeline(ctx, render_pass, &spec)?,
        })
    }

    /// Bind for drawing
    pub fn cmd_bind(&self, device: &ash::Device, command_buffer: vk::CommandBuffer) {
        self.handles.cmd_bind(device, command_buffer);
    }

    /// Pipeline layout for descriptor/push-constant binds
    pub fn layout(&self) -> vk::PipelineLayout {
        self.handles.layout
    }

    /// Destroy the pipeline and its layout
    pub fn cleanup(&mut self, device: &ash::Device) {
        self.handles.cleanup(device);
    }
}
