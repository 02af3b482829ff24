//! GPU material: sampler descriptors and the material uniform

use ash::vk;

use crate::assets::Material;
use crate::foundation::math::Vec4;
use crate::render::vulkan::layouts::{SetLayout, SetLayoutCatalog};
use crate::render::vulkan::ubo::UboMaterial;
use crate::render::vulkan::{device_call, memory, VulkanContext, VulkanResult};

use super::texture::GpuTexture;

/// Number of sampler slots in the material descriptor set
const TEXTURE_SLOTS: usize = 4;

/// Byte size of the placeholder allocation behind an empty sampler slot
const DUMMY_BUFFER_SIZE: vk::DeviceSize = 4;

/// GPU-side material: up to four textures, their sampler descriptor set and
/// one immutable uniform holding the scalar/color components.
///
/// The slot order (ambient, diffuse, specular, opacity) matches the binding
/// order declared in the fragment shader; creation order must not change
/// independently of it. Absent slots are written as null descriptors
/// (robustness2) with a tiny dummy buffer allocated behind them, since the
/// API requires every declared binding to be written even when conceptually
/// empty.
pub struct GpuMaterial {
    /// Material name from the asset
    pub name: String,
    device: ash::Device,
    textures: [Option<GpuTexture>; TEXTURE_SLOTS],
    pool: vk::DescriptorPool,
    sampler_set: vk::DescriptorSet,
    uniform_set: vk::DescriptorSet,
    uniform_buffer: vk::Buffer,
    uniform_memory: vk::DeviceMemory,
    dummy_buffers: Vec<(vk::Buffer, vk::DeviceMemory)>,
}

impl GpuMaterial {
    /// Build textures, descriptor sets and the uniform from a generic
    /// material. On any failure everything built so far is destroyed before
    /// the error propagates.
    pub fn new(
        ctx: &VulkanContext,
        material: &Material,
        layouts: &SetLayoutCatalog,
        sampler: vk::Sampler,
    ) -> VulkanResult<Self> {
        let mut built = Self {
            name: material.name.clone(),
            device: ctx.device.clone(),
            textures: [None, None, None, None],
            pool: vk::DescriptorPool::null(),
            sampler_set: vk::DescriptorSet::null(),
            uniform_set: vk::DescriptorSet::null(),
            uniform_buffer: vk::Buffer::null(),
            uniform_memory: vk::DeviceMemory::null(),
            dummy_buffers: Vec::new(),
        };

        match built.create(ctx, material, layouts, sampler) {
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
        material: &Material,
        layouts: &SetLayoutCatalog,
        sampler: vk::Sampler,
    ) -> VulkanResult<()> {
        // Fixed slot order, matching the shader bindings
        let sources = [
            &material.ambient_texture,
            &material.diffuse_texture,
            &material.specular_texture,
            &material.opacity_map,
        ];

        for (slot, source) in sources.iter().enumerate() {
            if let Some(data) = source {
                self.textures[slot] = Some(GpuTexture::new(ctx, data)?);
            } else {
                self.dummy_buffers.push(memory::create_buffer(
                    ctx,
                    DUMMY_BUFFER_SIZE,
                    vk::BufferUsageFlags::UNIFORM_BUFFER,
                    vk::MemoryPropertyFlags::HOST_VISIBLE
                        | vk::MemoryPropertyFlags::HOST_COHERENT,
                )?);
            }
        }

        let pool_sizes = [
            vk::DescriptorPoolSize {
                ty: vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
                descriptor_count: TEXTURE_SLOTS as u32,
            },
            vk::DescriptorPoolSize {
                ty: vk::DescriptorType::UNIFORM_BUFFER,
                descriptor_count: 1,
            },
        ];
        self.pool = memory::create_descriptor_pool(
            &ctx.device,
            &pool_sizes,
            2,
            vk::DescriptorPoolCreateFlags::empty(),
        )?;

        let set_layouts = [
            layouts.get(SetLayout::MaterialSampler),
            layouts.get(SetLayout::MaterialUniform),
        ];
        let alloc_info = vk::DescriptorSetAllocateInfo::builder()
            .descriptor_pool(self.pool)
            .set_layouts(&set_layouts);
        let sets = unsafe {
            ctx.device
                .allocate_descriptor_sets(&alloc_info)
                .map_err(device_call("vkAllocateDescriptorSets"))?
        };
        self.sampler_set = sets[0];
        self.uniform_set = sets[1];

        // One write per slot; empty slots use the null view enabled by the
        // robustness2 null-descriptor feature
        let image_infos: Vec<vk::DescriptorImageInfo> = self
            .textures
            .iter()
            .map(|texture| {
                vk::DescriptorImageInfo::builder()
                    .image_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)
                    .image_view(
                        texture
                            .as_ref()
                            .map_or(vk::ImageView::null(), GpuTexture::view),
                    )
                    .sampler(sampler)
                    .build()
            })
            .collect();

        let mut writes: Vec<vk::WriteDescriptorSet> = image_infos
            .iter()
            .enumerate()
            .map(|(slot, info)| {
                vk::WriteDescriptorSet::builder()
                    .dst_set(self.sampler_set)
                    .dst_binding(slot as u32)
                    .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                    .image_info(std::slice::from_ref(info))
                    .build()
            })
            .collect();

        // Material scalars/colors, uploaded once; materials are immutable
        // after import
        let ubo = Self::pack_uniform(material);
        let (buffer, buffer_memory) = memory::create_buffer(
            ctx,
            std::mem::size_of::<UboMaterial>() as vk::DeviceSize,
            vk::BufferUsageFlags::UNIFORM_BUFFER,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        )?;
        self.uniform_buffer = buffer;
        self.uniform_memory = buffer_memory;

        let bytes = unsafe {
            std::slice::from_raw_parts(
                (&ubo as *const UboMaterial).cast::<u8>(),
                std::mem::size_of::<UboMaterial>(),
            )
        };
        memory::write_host_visible(&ctx.device, buffer_memory, 0, bytes)?;

        let buffer_info = vk::DescriptorBufferInfo::builder()
            .buffer(buffer)
            .offset(0)
            .range(std::mem::size_of::<UboMaterial>() as vk::DeviceSize)
            .build();
        writes.push(
            vk::WriteDescriptorSet::builder()
                .dst_set(self.uniform_set)
                .dst_binding(0)
                .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
                .buffer_info(std::slice::from_ref(&buffer_info))
                .build(),
        );

        unsafe {
            ctx.device.update_descriptor_sets(&writes, &[]);
        }

        Ok(())
    }

    fn pack_uniform(material: &Material) -> UboMaterial {
        let flag = |present: bool| if present { 1.0 } else { 0.0 };
        let color = |c: crate::foundation::math::Vec3, present: bool| {
            Vec4::new(c.x, c.y, c.z, flag(present))
        };

        UboMaterial {
            ambient: color(material.ambient_color, material.ambient_texture.is_some()),
            diffuse: color(material.diffuse_color, material.diffuse_texture.is_some()),
            specular: color(material.specular_color, material.specular_texture.is_some()),
            params: Vec4::new(
                material.shininess,
                material.opacity,
                flag(material.opacity_map.is_some()),
                0.0,
            ),
        }
    }

    /// Bind the sampler and uniform sets at their geometry-pipeline indices
    pub fn cmd_bind(
        &self,
        command_buffer: vk::CommandBuffer,
        pipeline_layout: vk::PipelineLayout,
    ) {
        unsafe {
            self.device.cmd_bind_descriptor_sets(
                command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                pipeline_layout,
                SetLayout::MaterialSampler.geometry_set_index(),
                &[self.sampler_set],
                &[],
            );
            self.device.cmd_bind_descriptor_sets(
                command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                pipeline_layout,
                SetLayout::MaterialUniform.geometry_set_index(),
                &[self.uniform_set],
                &[],
            );
        }
    }

    /// Number of texture slots actually backed by an image
    pub fn texture_count(&self) -> u32 {
        self.textures.iter().filter(|t| t.is_some()).count() as u32
    }

    /// Destroy textures, dummy buffers, uniform and the descriptor pool
    pub fn cleanup(&mut self) {
        for texture in self.textures.iter_mut().filter_map(Option::as_mut) {
            texture.cleanup();
        }
        self.textures = [None, None, None, None];

        unsafe {
            for (buffer, buffer_memory) in self.dummy_buffers.drain(..) {
                self.device.destroy_buffer(buffer, None);
                self.device.free_memory(buffer_memory, None);
            }
            if self.uniform_buffer != vk::Buffer::null() {
                self.device.destroy_buffer(self.uniform_buffer, None);
                self.device.free_memory(self.uniform_memory, None);
                self.uniform_buffer = vk::Buffer::null();
            }
            if self.pool != vk::DescriptorPool::null() {
                self.device.destroy_descriptor_pool(self.pool, None);
                self.pool = vk::DescriptorPool::null();
            }
        }
    }
}
