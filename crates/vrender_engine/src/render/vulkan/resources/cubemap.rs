//! GPU cubemap and its sampler descriptor set

use ash::vk;

use crate::assets::Cubemap;
use crate::render::vulkan::layouts::{SetLayout, SetLayoutCatalog};
use crate::render::vulkan::{device_call, memory, VulkanContext, VulkanResult, COLOR_FORMAT};

/// A six-layer cube-compatible device image with a cube view.
///
/// Face validation (all six present, no duplicates, one extent) happened
/// when the generic [`Cubemap`] was constructed, before any device work.
pub struct GpuCubemap {
    device: ash::Device,
    image: vk::Image,
    memory: vk::DeviceMemory,
    view: vk::ImageView,
}

impl GpuCubemap {
    /// Upload all six faces through one staging buffer
    pub fn new(ctx: &VulkanContext, cubemap: &Cubemap) -> VulkanResult<Self> {
        let total_size = cubemap.total_byte_size() as vk::DeviceSize;
        let (width, height) = cubemap.face_extent();

        let (staging_buffer, staging_memory) = memory::create_buffer(
            ctx,
            total_size,
            vk::BufferUsageFlags::TRANSFER_SRC,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        )?;

        let destroy_staging = || unsafe {
            ctx.device.destroy_buffer(staging_buffer, None);
            ctx.device.free_memory(staging_memory, None);
        };

        // Faces are laid out back-to-back in GPU layer order
        let mut offset: vk::DeviceSize = 0;
        for face in cubemap.faces() {
            if let Err(e) =
                memory::write_host_visible(&ctx.device, staging_memory, offset, face.pixels())
            {
                destroy_staging();
                return Err(e);
            }
            offset += face.byte_size() as vk::DeviceSize;
        }

        let (image, image_memory) = match memory::create_image(
            ctx,
            width,
            height,
            COLOR_FORMAT,
            vk::ImageTiling::OPTIMAL,
            vk::ImageUsageFlags::TRANSFER_DST | vk::ImageUsageFlags::SAMPLED,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
            vk::ImageCreateFlags::CUBE_COMPATIBLE,
            6,
        ) {
            Ok(pair) => pair,
            Err(e) => {
                destroy_staging();
                return Err(e);
            }
        };

        let destroy_image = || unsafe {
            ctx.device.destroy_image(image, None);
            ctx.device.free_memory(image_memory, None);
        };

        let upload = memory::transition_image_layout(
            ctx,
            image,
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            6,
        )
        .and_then(|()| memory::copy_buffer_to_image(ctx, staging_buffer, image, width, height, 6))
        .and_then(|()| {
            memory::transition_image_layout(
                ctx,
                image,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
                6,
            )
        });

        destroy_staging();

        if let Err(e) = upload {
            destroy_image();
            return Err(e);
        }

        let view = match memory::create_image_view(
            &ctx.device,
            image,
            COLOR_FORMAT,
            vk::ImageAspectFlags::COLOR,
            vk::ImageViewType::CUBE,
            6,
        ) {
            Ok(view) => view,
            Err(e) => {
                destroy_image();
                return Err(e);
            }
        };

        Ok(Self {
            device: ctx.device.clone(),
            image,
            memory: image_memory,
            view,
        })
    }

    /// The cube image view
    pub fn view(&self) -> vk::ImageView {
        self.view
    }

    /// Destroy view, image and memory
    pub fn cleanup(&mut self) {
        unsafe {
            self.device.destroy_image_view(self.view, None);
            self.device.destroy_image(self.image, None);
            self.device.free_memory(self.memory, None);
        }
        self.view = vk::ImageView::null();
        self.image = vk::Image::null();
        self.memory = vk::DeviceMemory::null();
    }
}

/// Descriptor set exposing a cubemap to the skybox fragment shader
pub struct CubemapSamplerSet {
    device: ash::Device,
    pool: vk::DescriptorPool,
    set: vk::DescriptorSet,
}

impl CubemapSamplerSet {
    /// Allocate and write the sampler descriptor for a cubemap view
    pub fn new(
        ctx: &VulkanContext,
        layouts: &SetLayoutCatalog,
        cubemap_view: vk::ImageView,
        sampler: vk::Sampler,
    ) -> VulkanResult<Self> {
        let pool_sizes = [vk::DescriptorPoolSize {
            ty: vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
            descriptor_count: 1,
        }];
        let pool = memory::create_descriptor_pool(
            &ctx.device,
            &pool_sizes,
            1,
            vk::DescriptorPoolCreateFlags::empty(),
        )?;

        let layout = layouts.get(SetLayout::CubemapSampler);
        let alloc_info = vk::DescriptorSetAllocateInfo::builder()
            .descriptor_pool(pool)
            .set_layouts(std::slice::from_ref(&layout));

        let set = unsafe {
            match ctx.device.allocate_descriptor_sets(&alloc_info) {
                Ok(sets) => sets[0],
                Err(result) => {
                    ctx.device.destroy_descriptor_pool(pool, None);
                    return Err(device_call("vkAllocateDescriptorSets")(result));
                }
            }
        };

        let image_info = vk::DescriptorImageInfo::builder()
            .image_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)
            .image_view(cubemap_view)
            .sampler(sampler)
            .build();
        let write = vk::WriteDescriptorSet::builder()
            .dst_set(set)
            .dst_binding(0)
            .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
            .image_info(std::slice::from_ref(&image_info))
            .build();
        unsafe {
            ctx.device.update_descriptor_sets(&[write], &[]);
        }

        Ok(Self {
            device: ctx.device.clone(),
            pool,
            set,
        })
    }

    /// Bind the set at `set_index`
    pub fn cmd_bind(
        &self,
        set_index: u32,
        command_buffer: vk::CommandBuffer,
        pipeline_layout: vk::PipelineLayout,
    ) {
        unsafe {
            self.device.cmd_bind_descriptor_sets(
                command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                pipeline_layout,
                set_index,
                &[self.set],
                &[],
            );
        }
    }

    /// Destroy the pool (which returns the set)
    pub fn cleanup(&mut self) {
        unsafe {
            self.device.destroy_descriptor_pool(self.pool, None);
        }
        self.pool = vk::DescriptorPool::null();
        self.set = vk::DescriptorSet::null();
    }
}
