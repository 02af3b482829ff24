//! GPU texture built from a decoded RGBA8 payload

use ash::vk;

use crate::assets::TextureData;
use crate::render::vulkan::{memory, VulkanContext, VulkanResult, COLOR_FORMAT};

/// A sampled 2D device image with exactly one view.
///
/// Always 4-channel, always optimal tiling, always sampled usage; uploaded
/// through a staging buffer and left in shader-read-only layout.
pub struct GpuTexture {
    device: ash::Device,
    image: vk::Image,
    memory: vk::DeviceMemory,
    view: vk::ImageView,
}

impl GpuTexture {
    /// Upload a decoded payload into a new device-local image
    pub fn new(ctx: &VulkanContext, data: &TextureData) -> VulkanResult<Self> {
        let (staging_buffer, staging_memory) = memory::create_buffer(
            ctx,
            data.byte_size() as vk::DeviceSize,
            vk::BufferUsageFlags::TRANSFER_SRC,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        )?;

        let destroy_staging = || unsafe {
            ctx.device.destroy_buffer(staging_buffer, None);
            ctx.device.free_memory(staging_memory, None);
        };

        if let Err(e) = memory::write_host_visible(&ctx.device, staging_memory, 0, data.pixels()) {
            destroy_staging();
            return Err(e);
        }

        let (image, image_memory) = match memory::create_image(
            ctx,
            data.width,
            data.height,
            COLOR_FORMAT,
            vk::ImageTiling::OPTIMAL,
            vk::ImageUsageFlags::TRANSFER_DST | vk::ImageUsageFlags::SAMPLED,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
            vk::ImageCreateFlags::empty(),
            1,
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
            1,
        )
        .and_then(|()| {
            memory::copy_buffer_to_image(ctx, staging_buffer, image, data.width, data.height, 1)
        })
        .and_then(|()| {
            memory::transition_image_layout(
                ctx,
                image,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
                1,
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
            vk::ImageViewType::TYPE_2D,
            1,
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

    /// The image view bound into sampler descriptors
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
