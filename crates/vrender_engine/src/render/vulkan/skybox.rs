//! Skybox: unit cube + cubemap sampler set

use ash::vk;

use crate::assets::Cubemap;
use crate::render::vulkan::layouts::SetLayoutCatalog;
use crate::render::vulkan::pipeline::SkyboxPipeline;
use crate::render::vulkan::resources::{CubemapSamplerSet, GpuCubemap, SimpleMesh};
use crate::render::vulkan::{VulkanContext, VulkanResult};

/// The installed skybox.
///
/// Built from a validated six-face cubemap; drawn with its own pipeline
/// after the models of subpass 0.
pub struct Skybox {
    mesh: SimpleMesh,
    cubemap: GpuCubemap,
    sampler_set: CubemapSamplerSet,
}

impl Skybox {
    /// Upload the cubemap and build the cube + sampler set
    pub fn new(
        ctx: &VulkanContext,
        cubemap: &Cubemap,
        layouts: &SetLayoutCatalog,
        sampler: vk::Sampler,
    ) -> VulkanResult<Self> {
        let mut gpu_cubemap = GpuCubemap::new(ctx, cubemap)?;

        let mut mesh = match SimpleMesh::cube(ctx) {
            Ok(mesh) => mesh,
            Err(e) => {
                gpu_cubemap.cleanup();
                return Err(e);
            }
        };

        let sampler_set =
            match CubemapSamplerSet::new(ctx, layouts, gpu_cubemap.view(), sampler) {
                Ok(set) => set,
                Err(e) => {
                    mesh.cleanup();
                    gpu_cubemap.cleanup();
                    return Err(e);
                }
            };

        Ok(Self {
            mesh,
            cubemap: gpu_cubemap,
            sampler_set,
        })
    }

    /// Bind the cubemap sampler (set 1, after the camera set) and draw
    pub fn cmd_draw(&self, command_buffer: vk::CommandBuffer, pipeline: &SkyboxPipeline) {
        self.sampler_set.cmd_bind(1, command_buffer, pipeline.layout());
        self.mesh.cmd_draw(command_buffer);
    }

    /// Destroy sampler set, cube and cubemap image
    pub fn cleanup(&mut self) {
        self.sampler_set.cleanup();
        self.mesh.cleanup();
        self.cubemap.cleanup();
    }
}
