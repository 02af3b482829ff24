//! Skybox pipeline
//!
//! Position-only cube drawn in subpass 0 after the models. Depth test and
//! write are disabled so the sky sits behind everything, and the stencil
//! test always passes with writes masked off, so the skybox never occludes
//! the outline ring nor corrupts the reference the geometry pass wrote.

use ash::vk;

use crate::render::vulkan::layouts::{SetLayout, SetLayoutCatalog};
use crate::render::vulkan::pipeline::{
    build_pipeline, DepthStencilSpec, PipelineHandles, PipelineSpec, VertexInputKind,
};
use crate::render::vulkan::shaders::{PassTag, ShaderCatalog};
use crate::render::vulkan::{VulkanContext, VulkanResult};

/// The skybox pipeline
pub struct SkyboxPipeline {
    handles: PipelineHandles,
}

impl SkyboxPipeline {
    /// Describe and create the pipeline
    pub fn new(
        ctx: &VulkanContext,
        render_pass: vk::RenderPass,
        layouts: &SetLayoutCatalog,
        shaders: &mut ShaderCatalog,
    ) -> VulkanResult<Self> {
        let stages = shaders.stages(PassTag::First, Some("skybox"))?;

        let stencil_pass_through = vk::StencilOpState {
            fail_op: vk::StencilOp::KEEP,
            pass_op: vk::StencilOp::KEEP,
            depth_fail_op: vk::StencilOp::KEEP,
            compare_op: vk::CompareOp::ALWAYS,
            compare_mask: 0xFF,
            write_mask: 0x00,
            reference: 0,
        };

        let spec = PipelineSpec {
            stages,
            vertex_input: VertexInputKind::PositionOnly,
            subpass: 0,
            // the cube is seen from the inside
            cull_mode: vk::CullModeFlags::NONE,
            depth_stencil: DepthStencilSpec {
                depth_test: false,
                depth_write: false,
                stencil: Some(stencil_pass_through),
            },
            set_layouts: vec![
                layouts.get(SetLayout::Camera),
                layouts.get(SetLayout::CubemapSampler),
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
