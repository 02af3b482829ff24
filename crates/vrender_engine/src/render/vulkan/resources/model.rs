//! GPU model: per-mesh buffers, materials and draw recording

use ash::vk;

use crate::assets::{Material, Model, VERTEX_INDEX_OFFSET};
use crate::foundation::math::{normal_matrix, Mat4, Vec3, Vec4};
use crate::render::vulkan::layouts::SetLayoutCatalog;
use crate::render::vulkan::ubo::PushConstantData;
use crate::render::vulkan::{VulkanContext, VulkanResult};

use super::material::GpuMaterial;
use super::mesh::GpuMesh;

/// Index into the material table for meshes with no material assigned.
///
/// Slot 0 always holds a default material whose four sampler slots take the
/// dummy-descriptor path, so draw-time dispatch is a plain table index with
/// no branching on "has material".
pub const NO_MATERIAL_INDEX: usize = 0;

/// One registered model: meshes and materials aggregated 1:1 from the
/// generic model, plus the cached instance transform.
pub struct GpuModel {
    /// Renderer-wide model id (the scene instance id)
    pub id: u32,
    device: ash::Device,
    transform: Mat4,
    meshes: Vec<GpuMesh>,
    materials: Vec<GpuMaterial>,
    material_indices: Vec<usize>,
}

impl GpuModel {
    /// Translate a generic model into GPU resources.
    ///
    /// Construction is not partially recoverable: on any failure everything
    /// built so far is destroyed here before the error propagates.
    pub fn new(
        ctx: &VulkanContext,
        id: u32,
        model: &Model,
        layouts: &SetLayoutCatalog,
        sampler: vk::Sampler,
    ) -> VulkanResult<Self> {
        let mut built = Self {
            id,
            device: ctx.device.clone(),
            transform: Mat4::identity(),
            meshes: Vec::with_capacity(model.mesh_count()),
            materials: Vec::new(),
            material_indices: Vec::with_capacity(model.mesh_count()),
        };

        match built.create(ctx, model, layouts, sampler) {
            Ok(()) => Ok(built),
            Err(e) => {
                built.cleanup();
                Err(e)
            }
        }
    }

    fn create(
        &mut self,
        ctx: &VulkanContext,
        model: &Model,
        layouts: &SetLayoutCatalog,
        sampler: vk::Sampler,
    ) -> VulkanResult<()> {
        // Table slot 0: the no-material fallback
        self.materials.push(GpuMaterial::new(
            ctx,
            &Material::new("default"),
            layouts,
            sampler,
        )?);

        for (mesh, material) in model.meshes().iter().zip(model.materials()) {
            self.meshes.push(GpuMesh::new(ctx, mesh)?);

            let index = match material {
                Some(material) => {
                    self.materials
                        .push(GpuMaterial::new(ctx, material, layouts, sampler)?);
                    self.materials.len() - 1
                }
                None => NO_MATERIAL_INDEX,
            };
            self.material_indices.push(index);
        }

        Ok(())
    }

    /// Replace the cached instance transform
    pub fn set_transform(&mut self, transform: Mat4) {
        self.transform = transform;
    }

    /// Number of meshes
    pub fn mesh_count(&self) -> usize {
        self.meshes.len()
    }

    /// Material table index per mesh
    pub fn material_indices(&self) -> &[usize] {
        &self.material_indices
    }

    /// Record draws for every mesh.
    ///
    /// Binds vertex/index buffers, pushes the per-mesh constant block and
    /// issues an indexed draw with a negative base-vertex offset that
    /// cancels the import-time index shift. Material sets are skipped for
    /// the outline pass (`bind_materials == false`), whose pipeline layout
    /// has no material sets.
    pub fn draw(
        &self,
        command_buffer: vk::CommandBuffer,
        pipeline_layout: vk::PipelineLayout,
        eye_position: Vec3,
        bind_materials: bool,
    ) {
        for (i, mesh) in self.meshes.iter().enumerate() {
            unsafe {
                self.device.cmd_bind_vertex_buffers(
                    command_buffer,
                    0,
                    &[mesh.vertex_buffer()],
                    &[0],
                );
                self.device.cmd_bind_index_buffer(
                    command_buffer,
                    mesh.index_buffer(),
                    0,
                    vk::IndexType::UINT32,
                );
            }

            let push = PushConstantData {
                model: self.transform,
                normal_matrix: normal_matrix(&self.transform),
                eye_position: Vec4::new(eye_position.x, eye_position.y, eye_position.z, 0.0),
            };
            unsafe {
                self.device.cmd_push_constants(
                    command_buffer,
                    pipeline_layout,
                    vk::ShaderStageFlags::VERTEX,
                    0,
                    push.as_bytes(),
                );
            }

            if bind_materials {
                self.materials[self.material_indices[i]]
                    .cmd_bind(command_buffer, pipeline_layout);
            }

            unsafe {
                self.device.cmd_draw_indexed(
                    command_buffer,
                    mesh.index_count(),
                    1,
                    0,
                    -(VERTEX_INDEX_OFFSET as i32),
                    0,
                );
            }
        }
    }

    /// Destroy materials then meshes
    pub fn cleanup(&mut self) {
        for material in &mut self.materials {
            material.cleanup();
        }
        self.materials.clear();
        for mesh in &mut self.meshes {
            mesh.cleanup();
        }
        self.meshes.clear();
        self.material_indices.clear();
    }
}
