//! GPU mesh buffers

use ash::vk;

use crate::assets::Mesh;
use crate::render::vulkan::vertex::{PositionVertex, Vertex};
use crate::render::vulkan::{memory, VulkanContext, VulkanResult};

/// Constant written into the unused vertex color channel
pub const VERTEX_FILL_COLOR: [f32; 3] = [1.0, 1.0, 1.0];

/// Device-local vertex and index buffers of one mesh.
///
/// The index buffer keeps the import-time index-origin shift; the draw call
/// compensates with an equal negative base-vertex offset.
pub struct GpuMesh {
    /// Mesh id within its model
    pub id: u32,
    device: ash::Device,
    vertex_buffer: vk::Buffer,
    vertex_memory: vk::DeviceMemory,
    vertex_count: u32,
    index_buffer: vk::Buffer,
    index_memory: vk::DeviceMemory,
    index_count: u32,
}

impl GpuMesh {
    /// Interleave the generic mesh streams and upload both buffers
    pub fn new(ctx: &VulkanContext, mesh: &Mesh) -> VulkanResult<Self> {
        let vertices: Vec<Vertex> = (0..mesh.vertex_count())
            .map(|i| Vertex {
                position: mesh.positions()[i].into(),
                color: VERTEX_FILL_COLOR,
                normal: mesh.normals()[i].into(),
                uv: mesh.tex_coords()[i].into(),
            })
            .collect();

        let (vertex_buffer, vertex_memory) = memory::upload_device_local_buffer(
            ctx,
            bytemuck::cast_slice(&vertices),
            vk::BufferUsageFlags::VERTEX_BUFFER,
        )?;

        let (index_buffer, index_memory) = match memory::upload_device_local_buffer(
            ctx,
            bytemuck::cast_slice(mesh.indices()),
            vk::BufferUsageFlags::INDEX_BUFFER,
        ) {
            Ok(pair) => pair,
            Err(e) => {
                unsafe {
                    ctx.device.destroy_buffer(vertex_buffer, None);
                    ctx.device.free_memory(vertex_memory, None);
                }
                return Err(e);
            }
        };

        Ok(Self {
            id: mesh.id,
            device: ctx.device.clone(),
            vertex_buffer,
            vertex_memory,
            vertex_count: vertices.len() as u32,
            index_buffer,
            index_memory,
            index_count: mesh.indices().len() as u32,
        })
    }

    /// Vertex buffer handle
    pub fn vertex_buffer(&self) -> vk::Buffer {
        self.vertex_buffer
    }

    /// Index buffer handle
    pub fn index_buffer(&self) -> vk::Buffer {
        self.index_buffer
    }

    /// Number of vertices
    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    /// Number of indices
    pub fn index_count(&self) -> u32 {
        self.index_count
    }

    /// Destroy both buffers
    pub fn cleanup(&mut self) {
        unsafe {
            self.device.destroy_buffer(self.index_buffer, None);
            self.device.free_memory(self.index_memory, None);
            self.device.destroy_buffer(self.vertex_buffer, None);
            self.device.free_memory(self.vertex_memory, None);
        }
        self.vertex_buffer = vk::Buffer::null();
        self.index_buffer = vk::Buffer::null();
    }
}

/// A position-only primitive mesh, used as the skybox cube.
///
/// Indices are 0-based; no index-origin shift applies here.
pub struct SimpleMesh {
    device: ash::Device,
    vertex_buffer: vk::Buffer,
    vertex_memory: vk::DeviceMemory,
    index_buffer: vk::Buffer,
    index_memory: vk::DeviceMemory,
    index_count: u32,
}

/// Unit cube corners
const CUBE_VERTICES: [PositionVertex; 8] = [
    PositionVertex { position: [-1.0, -1.0, -1.0] },
    PositionVertex { position: [1.0, -1.0, -1.0] },
    PositionVertex { position: [1.0, 1.0, -1.0] },
    PositionVertex { position: [-1.0, 1.0, -1.0] },
    PositionVertex { position: [-1.0, -1.0, 1.0] },
    PositionVertex { position: [1.0, -1.0, 1.0] },
    PositionVertex { position: [1.0, 1.0, 1.0] },
    PositionVertex { position: [-1.0, 1.0, 1.0] },
];

/// Two triangles per cube face
const CUBE_INDICES: [u32; 36] = [
    0, 1, 2, 2, 3, 0, // -Z
    4, 6, 5, 6, 4, 7, // +Z
    0, 3, 7, 7, 4, 0, // -X
    1, 5, 6, 6, 2, 1, // +X
    3, 2, 6, 6, 7, 3, // +Y
    0, 4, 5, 5, 1, 0, // -Y
];

impl SimpleMesh {
    /// Upload the unit cube
    pub fn cube(ctx: &VulkanContext) -> VulkanResult<Self> {
        let (vertex_buffer, vertex_memory) = memory::upload_device_local_buffer(
            ctx,
            bytemuck::cast_slice(&CUBE_VERTICES),
            vk::BufferUsageFlags::VERTEX_BUFFER,
        )?;

        let (index_buffer, index_memory) = match memory::upload_device_local_buffer(
            ctx,
            bytemuck::cast_slice(&CUBE_INDICES),
            vk::BufferUsageFlags::INDEX_BUFFER,
        ) {
            Ok(pair) => pair,
            Err(e) => {
                unsafe {
                    ctx.device.destroy_buffer(vertex_buffer, None);
                    ctx.device.free_memory(vertex_memory, None);
                }
                return Err(e);
            }
        };

        Ok(Self {
            device: ctx.device.clone(),
            vertex_buffer,
            vertex_memory,
            index_buffer,
            index_memory,
            index_count: CUBE_INDICES.len() as u32,
        })
    }

    /// Bind buffers and draw the whole mesh
    pub fn cmd_draw(&self, command_buffer: vk::CommandBuffer) {
        unsafe {
            self.device
                .cmd_bind_vertex_buffers(command_buffer, 0, &[self.vertex_buffer], &[0]);
            self.device.cmd_bind_index_buffer(
                command_buffer,
                self.index_buffer,
                0,
                vk::IndexType::UINT32,
            );
            self.device
                .cmd_draw_indexed(command_buffer, self.index_count, 1, 0, 0, 0);
        }
    }

    /// Destroy both buffers
    pub fn cleanup(&mut self) {
        unsafe {
            self.device.destroy_buffer(self.index_buffer, None);
            self.device.free_memory(self.index_memory, None);
            self.device.destroy_buffer(self.vertex_buffer, None);
            self.device.free_memory(self.vertex_memory, None);
        }
        self.vertex_buffer = vk::Buffer::null();
        self.index_buffer = vk::Buffer::null();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cube_indices_stay_in_vertex_range() {
        assert!(CUBE_INDICES.iter().all(|i| (*i as usize) < CUBE_VERTICES.len()));
        assert_eq!(CUBE_INDICES.len(), 36);
    }
}
