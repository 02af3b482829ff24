//! Main geometry pipeline of subpass 0
//!
//! Opaque model drawing with depth test and write. Every fragment that
//! passes also writes stencil reference 1, which the outline pipeline later
//! tests against.

use ash::vk;

use crate::render::vulkan::layouts::{SetLayout, SetLayoutCatalog};
use crate::render::vulkan::pipeline::{
    build_pipeline, model_push_constant_range, DepthStencilSpec, PipelineHandles, PipelineSpec,
    VertexInputKind,
};
use crate::render::vulkan::shaders::{PassTag, ShaderCatalog};
use crate::render::vulkan::{VulkanContext, VulkanResult};

/// The opaque-geometry pipeline
pub struct GeometryPipeline {
    handles: PipelineHandles,
}

impl GeometryPipeline {
    /// Describe and create the pipeline
    pub fn new(
        ctx: &VulkanContext,
        render_pass: vk::RenderPass,
        layouts: &SetLayoutCatalog,
        shaders: &mut ShaderCatalog,
    ) -> VulkanResult<Self> {
        let stages = shaders.stages(PassTag::First, Some("default"))?;

        let stencil_write = vk::StencilOpState {
            fail_op: vk::StencilOp::KEEP,
            pass_op: vk::StencilOp::REPLACE,
            depth_fail_op: vk::StencilOp::KEEP,
            compare_op: vk::CompareOp::ALWAYS,
            compare_mask: 0xFF,
            write_mask: 0xFF,
            reference: 1,
        };

        let spec = PipelineSpec {
            stages,
            vertex_input: VertexInputKind::Standard,
            subpass: 0,
            cull_mode: vk::CullModeFlags::BACK,
            depth_stencil: DepthStencilSpec {
                depth_test: true,
                depth_write: true,
                stencil: Some(stencil_write),
            },
            set_layouts: vec![
                layouts.get(SetLayout::Camera),
                layouts.get(SetLayout::MaterialSampler),
                layouts.get(SetLayout::Light),
                layouts.get(SetLayout::DynamicColor),
                layouts.get(SetLayout::MaterialUniform),
            ],
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
