//! Graphics pipelines of the two-subpass render graph
//!
//! Four pipelines share one lifecycle (describe at construction, bind into
//! a command buffer, explicit cleanup) but differ in fixed-function state.
//! Rather than a virtual base, each variant fills a [`PipelineSpec`] and a
//! single builder function turns it into the device objects.

use std::ffi::CStr;

use ash::vk;

use crate::render::vulkan::shaders::ShaderStagePair;
use crate::render::vulkan::vertex::{PositionVertex, Vertex};
use crate::render::vulkan::{device_call, VulkanContext, VulkanResult};

mod composition;
mod geometry;
mod outline;
mod skybox;

pub use composition::CompositionPipeline;
pub use geometry::GeometryPipeline;
pub use outline::OutlinePipeline;
pub use skybox::SkyboxPipeline;

/// Shader entry point shared by every stage
const ENTRY_POINT: &CStr = unsafe { CStr::from_bytes_with_nul_unchecked(b"main\0") };

/// Vertex input configuration of a pipeline
pub enum VertexInputKind {
    /// Interleaved position/color/normal/uv stream
    Standard,
    /// Position-only stream (skybox)
    PositionOnly,
    /// No vertex input at all (full-screen triangle)
    None,
}

/// Depth/stencil configuration of a pipeline
pub struct DepthStencilSpec {
    /// Enable depth testing
    pub depth_test: bool,
    /// Enable depth writes
    pub depth_write: bool,
    /// Front-face stencil state; stencil testing is off when `None`
    pub stencil: Option<vk::StencilOpState>,
}

/// Full fixed-function + layout description of one pipeline
pub struct PipelineSpec {
    /// Compiled vertex/fragment modules
    pub stages: ShaderStagePair,
    /// Vertex stream shape
    pub vertex_input: VertexInputKind,
    /// Subpass index the pipeline is bound to
    pub subpass: u32,
    /// Rasterizer cull mode
    pub cull_mode: vk::CullModeFlags,
    /// Depth/stencil state
    pub depth_stencil: DepthStencilSpec,
    /// Descriptor set layouts, in set-index order
    pub set_layouts: Vec<vk::DescriptorSetLayout>,
    /// Optional push constant range
    pub push_constant: Option<vk::PushConstantRange>,
}

/// Created device objects of one pipeline
pub struct PipelineHandles {
    /// The graphics pipeline
    pub pipeline: vk::Pipeline,
    /// Its layout
    pub layout: vk::PipelineLayout,
}

impl PipelineHandles {
    /// Bind the pipeline
    pub fn cmd_bind(&self, device: &ash::Device, command_buffer: vk::CommandBuffer) {
        unsafe {
            device.cmd_bind_pipeline(
                command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                self.pipeline,
            );
        }
    }

    /// Destroy pipeline and layout
    pub fn cleanup(&mut self, device: &ash::Device) {
        unsafe {
            device.destroy_pipeline(self.pipeline, None);
            device.destroy_pipeline_layout(self.layout, None);
        }
        self.pipeline = vk::Pipeline::null();
        self.layout = vk::PipelineLayout::null();
    }
}

/// Build the device pipeline from a spec.
///
/// Viewport and scissor are sized to the context's current extent; every
/// pipeline in this renderer is rebuilt on a resize rather than using
/// dynamic state.
pub fn build_pipeline(
    ctx: &VulkanContext,
    render_pass: vk::RenderPass,
    spec: &PipelineSpec,
) -> VulkanResult<PipelineHandles> {
    let stage_infos = [
        vk::PipelineShaderStageCreateInfo::builder()
            .stage(vk::ShaderStageFlags::VERTEX)
            .module(spec.stages.vert)
            .name(ENTRY_POINT)
            .build(),
        vk::PipelineShaderStageCreateInfo::builder()
            .stage(vk::ShaderStageFlags::FRAGMENT)
            .module(spec.stages.frag)
            .name(ENTRY_POINT)
            .build(),
    ];

    // Vertex input state: the binding/attribute arrays must outlive the
    // create-info that points at them, hence the bindings live out here.
    let standard_binding = [Vertex::binding_description()];
    let standard_attributes = Vertex::attribute_descriptions();
    let position_binding = [PositionVertex::binding_description()];
    let position_attributes = PositionVertex::attribute_descriptions();

    let vertex_input = match spec.vertex_input {
        VertexInputKind::Standard => vk::PipelineVertexInputStateCreateInfo::builder()
            .vertex_binding_descriptions(&standard_binding)
            .vertex_attribute_descriptions(&standard_attributes),
        VertexInputKind::PositionOnly => vk::PipelineVertexInputStateCreateInfo::builder()
            .vertex_binding_descriptions(&position_binding)
            .vertex_attribute_descriptions(&position_attributes),
        VertexInputKind::None => vk::PipelineVertexInputStateCreateInfo::builder(),
    };

    let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::builder()
        .topology(vk::PrimitiveTopology::TRIANGLE_LIST)
        .primitive_restart_enable(false);

    let viewport = vk::Viewport {
        x: 0.0,
        y: 0.0,
        width: ctx.extent.width as f32,
        height: ctx.extent.height as f32,
        min_depth: 0.0,
        max_depth: 1.0,
    };
    let scissor = vk::Rect2D {
        offset: vk::Offset2D { x: 0, y: 0 },
        extent: ctx.extent,
    };
    let viewport_state = vk::PipelineViewportStateCreateInfo::builder()
        .viewports(std::slice::from_ref(&viewport))
        .scissors(std::slice::from_ref(&scissor));

    let rasterization = vk::PipelineRasterizationStateCreateInfo::builder()
        .depth_clamp_enable(false)
        .rasterizer_discard_enable(false)
        .polygon_mode(vk::PolygonMode::FILL)
        .line_width(1.0)
        .cull_mode(spec.cull_mode)
        .front_face(vk::FrontFace::COUNTER_CLOCKWISE)
        .depth_bias_enable(false);

    let multisample = vk::PipelineMultisampleStateCreateInfo::builder()
        .sample_shading_enable(false)
        .rasterization_samples(vk::SampleCountFlags::TYPE_1);

    // Standard alpha blending on the single color attachment
    let blend_attachment = vk::PipelineColorBlendAttachmentState::builder()
        .color_write_mask(vk::ColorComponentFlags::RGBA)
        .blend_enable(true)
        .src_color_blend_factor(vk::BlendFactor::SRC_ALPHA)
        .dst_color_blend_factor(vk::BlendFactor::ONE_MINUS_SRC_ALPHA)
        .color_blend_op(vk::BlendOp::ADD)
        .src_alpha_blend_factor(vk::BlendFactor::ONE)
        .dst_alpha_blend_factor(vk::BlendFactor::ZERO)
        .alpha_blend_op(vk::BlendOp::ADD)
        .build();
    let color_blend = vk::PipelineColorBlendStateCreateInfo::builder()
        .logic_op_enable(false)
        .attachments(std::slice::from_ref(&blend_attachment));

    let mut depth_stencil = vk::PipelineDepthStencilStateCreateInfo::builder()
        .depth_test_enable(spec.depth_stencil.depth_test)
        .depth_write_enable(spec.depth_stencil.depth_write)
        .depth_compare_op(vk::CompareOp::LESS)
        .depth_bounds_test_enable(false)
        .stencil_test_enable(spec.depth_stencil.stencil.is_some());
    if let Some(stencil) = spec.depth_stencil.stencil {
        depth_stencil = depth_stencil.front(stencil);
    }

    let mut layout_info =
        vk::PipelineLayoutCreateInfo::builder().set_layouts(&spec.set_layouts);
    if let Some(range) = &spec.push_constant {
        layout_info = layout_info.push_constant_ranges(std::slice::from_ref(range));
    }

    let layout = unsafe {
        ctx.device
            .create_pipeline_layout(&layout_info, None)
            .map_err(device_call("vkCreatePipelineLayout"))?
    };

    let create_info = vk::GraphicsPipelineCreateInfo::builder()
        .stages(&stage_infos)
        .vertex_input_state(&vertex_input)
        .input_assembly_state(&input_assembly)
        .viewport_state(&viewport_state)
        .rasterization_state(&rasterization)
        .multisample_state(&multisample)
        .color_blend_state(&color_blend)
        .depth_stencil_state(&depth_stencil)
        .layout(layout)
        .render_pass(render_pass)
        .subpass(spec.subpass)
        .build();

    let pipeline = unsafe {
        match ctx
            .device
            .create_graphics_pipelines(vk::PipelineCache::null(), &[create_info], None)
        {
            Ok(pipelines) => pipelines[0],
            Err((_, result)) => {
                ctx.device.destroy_pipeline_layout(layout, None);
                return Err(device_call("vkCreateGraphicsPipelines")(result));
            }
        }
    };

    Ok(PipelineHandles { pipeline, layout })
}

/// Push constant range carrying the per-mesh block of the geometry pass
pub fn model_push_constant_range() -> vk::PushConstantRange {
    vk::PushConstantRange {
        stage_flags: vk::ShaderStageFlags::VERTEX,
        offset: 0,
        size: std::mem::size_of::<crate::render::vulkan::ubo::PushConstantData>() as u32,
    }
}
