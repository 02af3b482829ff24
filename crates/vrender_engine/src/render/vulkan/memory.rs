//! Low-level device-memory-backed object creation
//!
//! Shared routines for buffers, images, views, descriptor pools, one-shot
//! transfer command buffers, layout transitions and staging uploads. Every
//! allocation routine fails loudly with the failing operation named; a null
//! handle is never returned.

use ash::vk;

use crate::render::vulkan::{device_call, VulkanContext, VulkanError, VulkanResult};

/// Find a memory type index satisfying the filter and properties
pub fn find_memory_type(
    ctx: &VulkanContext,
    type_filter: u32,
    properties: vk::MemoryPropertyFlags,
) -> VulkanResult<u32> {
    let mem_properties = unsafe {
        ctx.instance
            .get_physical_device_memory_properties(ctx.physical_device)
    };

    for i in 0..mem_properties.memory_type_count {
        if (type_filter & (1 << i)) != 0
            && mem_properties.memory_types[i as usize]
                .property_flags
                .contains(properties)
        {
            return Ok(i);
        }
    }

    Err(VulkanError::NoSuitableMemoryType)
}

/// Create a buffer, allocate its memory and bind the two together
pub fn create_buffer(
    ctx: &VulkanContext,
    size: vk::DeviceSize,
    usage: vk::BufferUsageFlags,
    properties: vk::MemoryPropertyFlags,
) -> VulkanResult<(vk::Buffer, vk::DeviceMemory)> {
    let buffer_info = vk::BufferCreateInfo::builder()
        .size(size)
        .usage(usage)
        .sharing_mode(vk::SharingMode::EXCLUSIVE);

    let buffer = unsafe {
        ctx.device
            .create_buffer(&buffer_info, None)
            .map_err(device_call("vkCreateBuffer"))?
    };

    let requirements = unsafe { ctx.device.get_buffer_memory_requirements(buffer) };
    let memory_type_index =
        match find_memory_type(ctx, requirements.memory_type_bits, properties) {
            Ok(index) => index,
            Err(e) => {
                unsafe { ctx.device.destroy_buffer(buffer, None) };
                return Err(e);
            }
        };

    let alloc_info = vk::MemoryAllocateInfo::builder()
        .allocation_size(requirements.size)
        .memory_type_index(memory_type_index);

    let memory = unsafe {
        match ctx.device.allocate_memory(&alloc_info, None) {
            Ok(memory) => memory,
            Err(result) => {
                ctx.device.destroy_buffer(buffer, None);
                return Err(device_call("vkAllocateMemory")(result));
            }
        }
    };

    unsafe {
        if let Err(result) = ctx.device.bind_buffer_memory(buffer, memory, 0) {
            ctx.device.destroy_buffer(buffer, None);
            ctx.device.free_memory(memory, None);
            return Err(device_call("vkBindBufferMemory")(result));
        }
    }

    Ok((buffer, memory))
}

/// Create an image, allocate its memory and bind the two together.
///
/// `flags` and `layers` support cube-compatible 6-layer images; plain 2D
/// textures pass empty flags and one layer.
pub fn create_image(
    ctx: &VulkanContext,
    width: u32,
    height: u32,
    format: vk::Format,
    tiling: vk::ImageTiling,
    usage: vk::ImageUsageFlags,
    properties: vk::MemoryPropertyFlags,
    flags: vk::ImageCreateFlags,
    layers: u32,
) -> VulkanResult<(vk::Image, vk::DeviceMemory)> {
    let image_info = vk::ImageCreateInfo::builder()
        .image_type(vk::ImageType::TYPE_2D)
        .extent(vk::Extent3D {
            width,
            height,
            depth: 1,
        })
        .mip_levels(1)
        .array_layers(layers)
        .format(format)
        .tiling(tiling)
        .initial_layout(vk::ImageLayout::UNDEFINED)
        .usage(usage)
        .sharing_mode(vk::SharingMode::EXCLUSIVE)
        .samples(vk::SampleCountFlags::TYPE_1)
        .flags(flags);

    let image = unsafe {
        ctx.device
            .create_image(&image_info, None)
            .map_err(device_call("vkCreateImage"))?
    };

    let requirements = unsafe { ctx.device.get_image_memory_requirements(image) };
    let memory_type_index =
        match find_memory_type(ctx, requirements.memory_type_bits, properties) {
            Ok(index) => index,
            Err(e) => {
                unsafe { ctx.device.destroy_image(image, None) };
                return Err(e);
            }
        };

    let alloc_info = vk::MemoryAllocateInfo::builder()
        .allocation_size(requirements.size)
        .memory_type_index(memory_type_index);

    let memory = unsafe {
        match ctx.device.allocate_memory(&alloc_info, None) {
            Ok(memory) => memory,
            Err(result) => {
                ctx.device.destroy_image(image, None);
                return Err(device_call("vkAllocateMemory")(result));
            }
        }
    };

    unsafe {
        if let Err(result) = ctx.device.bind_image_memory(image, memory, 0) {
            ctx.device.destroy_image(image, None);
            ctx.device.free_memory(memory, None);
            return Err(device_call("vkBindImageMemory")(result));
        }
    }

    Ok((image, memory))
}

/// Create an image view
pub fn create_image_view(
    device: &ash::Device,
    image: vk::Image,
    format: vk::Format,
    aspect: vk::ImageAspectFlags,
    view_type: vk::ImageViewType,
    layers: u32,
) -> VulkanResult<vk::ImageView> {
    let view_info = vk::ImageViewCreateInfo::builder()
        .image(image)
        .view_type(view_type)
        .format(format)
        .subresource_range(vk::ImageSubresourceRange {
            aspect_mask: aspect,
            base_mip_level: 0,
            level_count: 1,
            base_array_layer: 0,
            layer_count: layers,
        });

    unsafe {
        device
            .create_image_view(&view_info, None)
            .map_err(device_call("vkCreateImageView"))
    }
}

/// Create a descriptor pool from explicit pool sizes
pub fn create_descriptor_pool(
    device: &ash::Device,
    pool_sizes: &[vk::DescriptorPoolSize],
    max_sets: u32,
    flags: vk::DescriptorPoolCreateFlags,
) -> VulkanResult<vk::DescriptorPool> {
    let pool_info = vk::DescriptorPoolCreateInfo::builder()
        .pool_sizes(pool_sizes)
        .max_sets(max_sets)
        .flags(flags);

    unsafe {
        device
            .create_descriptor_pool(&pool_info, None)
            .map_err(device_call("vkCreateDescriptorPool"))
    }
}

/// Record, submit and wait out a one-shot command buffer.
///
/// Used for transfer operations only; the wait is a full queue idle, which
/// is acceptable at resource-creation time.
pub fn one_shot_commands<F>(ctx: &VulkanContext, record: F) -> VulkanResult<()>
where
    F: FnOnce(vk::CommandBuffer),
{
    let alloc_info = vk::CommandBufferAllocateInfo::builder()
        .level(vk::CommandBufferLevel::PRIMARY)
        .command_pool(ctx.command_pool)
        .command_buffer_count(1);

    let command_buffer = unsafe {
        ctx.device
            .allocate_command_buffers(&alloc_info)
            .map_err(device_call("vkAllocateCommandBuffers"))?[0]
    };

    let free = || unsafe {
        ctx.device
            .free_command_buffers(ctx.command_pool, &[command_buffer]);
    };

    let begin_info =
        vk::CommandBufferBeginInfo::builder().flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);

    unsafe {
        if let Err(result) = ctx.device.begin_command_buffer(command_buffer, &begin_info) {
            free();
            return Err(device_call("vkBeginCommandBuffer")(result));
        }
    }

    record(command_buffer);

    unsafe {
        if let Err(result) = ctx.device.end_command_buffer(command_buffer) {
            free();
            return Err(device_call("vkEndCommandBuffer")(result));
        }

        let submit_info = vk::SubmitInfo::builder()
            .command_buffers(std::slice::from_ref(&command_buffer))
            .build();
        if let Err(result) =
            ctx.device
                .queue_submit(ctx.graphics_queue, &[submit_info], vk::Fence::null())
        {
            free();
            return Err(device_call("vkQueueSubmit")(result));
        }
        if let Err(result) = ctx.device.queue_wait_idle(ctx.graphics_queue) {
            free();
            return Err(device_call("vkQueueWaitIdle")(result));
        }
    }

    free();
    Ok(())
}

/// Transition an image between the two supported layout pairs.
///
/// Only undefined → transfer-dst and transfer-dst → shader-read-only are
/// meaningful in this renderer; any other pair is a programming error and
/// trips the debug assertion rather than emitting a half-correct barrier.
pub fn transition_image_layout(
    ctx: &VulkanContext,
    image: vk::Image,
    old_layout: vk::ImageLayout,
    new_layout: vk::ImageLayout,
    layers: u32,
) -> VulkanResult<()> {
    let (src_access, dst_access, src_stage, dst_stage) = match (old_layout, new_layout) {
        (vk::ImageLayout::UNDEFINED, vk::ImageLayout::TRANSFER_DST_OPTIMAL) => (
            vk::AccessFlags::empty(),
            vk::AccessFlags::TRANSFER_WRITE,
            vk::PipelineStageFlags::TOP_OF_PIPE,
            vk::PipelineStageFlags::TRANSFER,
        ),
        (vk::ImageLayout::TRANSFER_DST_OPTIMAL, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL) => (
            vk::AccessFlags::TRANSFER_WRITE,
            vk::AccessFlags::SHADER_READ,
            vk::PipelineStageFlags::TRANSFER,
            vk::PipelineStageFlags::FRAGMENT_SHADER,
        ),
        other => {
            debug_assert!(false, "unsupported image layout transition: {other:?}");
            return Err(VulkanError::InitializationFailed(format!(
                "unsupported image layout transition: {other:?}"
            )));
        }
    };

    one_shot_commands(ctx, |cmd| {
        let barrier = vk::ImageMemoryBarrier::builder()
            .old_layout(old_layout)
            .new_layout(new_layout)
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .image(image)
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count: layers,
            })
            .src_access_mask(src_access)
            .dst_access_mask(dst_access);

        unsafe {
            ctx.device.cmd_pipeline_barrier(
                cmd,
                src_stage,
                dst_stage,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                &[barrier.build()],
            );
        }
    })
}

/// Write bytes into host-visible, host-coherent memory
pub fn write_host_visible(
    device: &ash::Device,
    memory: vk::DeviceMemory,
    offset: vk::DeviceSize,
    bytes: &[u8],
) -> VulkanResult<()> {
    unsafe {
        let dst = device
            .map_memory(
                memory,
                offset,
                bytes.len() as vk::DeviceSize,
                vk::MemoryMapFlags::empty(),
            )
            .map_err(device_call("vkMapMemory"))?;
        std::ptr::copy_nonoverlapping(bytes.as_ptr(), dst.cast::<u8>(), bytes.len());
        device.unmap_memory(memory);
    }
    Ok(())
}

/// Upload bytes into a new device-local buffer through a staging buffer
pub fn upload_device_local_buffer(
    ctx: &VulkanContext,
    bytes: &[u8],
    usage: vk::BufferUsageFlags,
) -> VulkanResult<(vk::Buffer, vk::DeviceMemory)> {
    let size = bytes.len() as vk::DeviceSize;

    let (staging_buffer, staging_memory) = create_buffer(
        ctx,
        size,
        vk::BufferUsageFlags::TRANSFER_SRC,
        vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
    )?;

    let destroy_staging = || unsafe {
        ctx.device.destroy_buffer(staging_buffer, None);
        ctx.device.free_memory(staging_memory, None);
    };

    if let Err(e) = write_host_visible(&ctx.device, staging_memory, 0, bytes) {
        destroy_staging();
        return Err(e);
    }

    let (buffer, memory) = match create_buffer(
        ctx,
        size,
        vk::BufferUsageFlags::TRANSFER_DST | usage,
        vk::MemoryPropertyFlags::DEVICE_LOCAL,
    ) {
        Ok(pair) => pair,
        Err(e) => {
            destroy_staging();
            return Err(e);
        }
    };

    let copy_result = one_shot_commands(ctx, |cmd| {
        let region = vk::BufferCopy::builder().size(size).build();
        unsafe {
            ctx.device
                .cmd_copy_buffer(cmd, staging_buffer, buffer, &[region]);
        }
    });

    destroy_staging();

    if let Err(e) = copy_result {
        unsafe {
            ctx.device.destroy_buffer(buffer, None);
            ctx.device.free_memory(memory, None);
        }
        return Err(e);
    }

    Ok((buffer, memory))
}

/// Copy a staging buffer into an image; `layers` regions are laid out
/// back-to-back in the buffer (used for cubemap faces).
pub fn copy_buffer_to_image(
    ctx: &VulkanContext,
    buffer: vk::Buffer,
    image: vk::Image,
    width: u32,
    height: u32,
    layers: u32,
) -> VulkanResult<()> {
    let layer_size = vk::DeviceSize::from(width) * vk::DeviceSize::from(height) * 4;

    let regions: Vec<vk::BufferImageCopy> = (0..layers)
        .map(|layer| {
            vk::BufferImageCopy::builder()
                .buffer_offset(layer_size * vk::DeviceSize::from(layer))
                .buffer_row_length(0)
                .buffer_image_height(0)
                .image_subresource(vk::ImageSubresourceLayers {
                    aspect_mask: vk::ImageAspectFlags::COLOR,
                    mip_level: 0,
                    base_array_layer: layer,
                    layer_count: 1,
                })
                .image_offset(vk::Offset3D { x: 0, y: 0, z: 0 })
                .image_extent(vk::Extent3D {
                    width,
                    height,
                    depth: 1,
                })
                .build()
        })
        .collect();

    one_shot_commands(ctx, |cmd| unsafe {
        ctx.device.cmd_copy_buffer_to_image(
            cmd,
            buffer,
            image,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            &regions,
        );
    })
}
