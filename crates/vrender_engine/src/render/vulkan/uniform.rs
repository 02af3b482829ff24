//! Uniform buffer wrappers
//!
//! [`Uniform`] keeps one host-visible buffer and one descriptor set per
//! swapchain image; the single-threaded frame loop writes image N's buffer
//! strictly before submitting the command buffer that reads it, so no
//! explicit memory barrier is needed. [`DynamicUniform`] is the same idea
//! with one alignment-padded slot per potential instance, addressed at bind
//! time through a dynamic offset.

use std::marker::PhantomData;

use ash::vk;

use crate::render::vulkan::{device_call, memory, VulkanContext, VulkanError, VulkanResult};

/// Round `size` up to the next multiple of `alignment` (a power of two)
pub fn align_up(size: vk::DeviceSize, alignment: vk::DeviceSize) -> vk::DeviceSize {
    debug_assert!(alignment.is_power_of_two());
    (size + alignment - 1) & !(alignment - 1)
}

fn as_bytes<T: Copy>(value: &T) -> &[u8] {
    unsafe {
        std::slice::from_raw_parts((value as *const T).cast::<u8>(), std::mem::size_of::<T>())
    }
}

/// A per-image uniform buffer with its descriptor set
pub struct Uniform<T: Copy> {
    device: ash::Device,
    buffers: Vec<vk::Buffer>,
    memories: Vec<vk::DeviceMemory>,
    sets: Vec<vk::DescriptorSet>,
    _marker: PhantomData<T>,
}

impl<T: Copy> Uniform<T> {
    /// Create `ctx.image_count` buffers and allocate their descriptor sets
    /// from `pool` with `layout`.
    pub fn new(
        ctx: &VulkanContext,
        pool: vk::DescriptorPool,
        layout: vk::DescriptorSetLayout,
    ) -> VulkanResult<Self> {
        let size = std::mem::size_of::<T>() as vk::DeviceSize;
        let count = ctx.image_count as usize;

        let mut uniform = Self {
            device: ctx.device.clone(),
            buffers: Vec::with_capacity(count),
            memories: Vec::with_capacity(count),
            sets: Vec::with_capacity(count),
            _marker: PhantomData,
        };

        for _ in 0..count {
            match memory::create_buffer(
                ctx,
                size,
                vk::BufferUsageFlags::UNIFORM_BUFFER,
                vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
            ) {
                Ok((buffer, mem)) => {
                    uniform.buffers.push(buffer);
                    uniform.memories.push(mem);
                }
                Err(e) => {
                    uniform.cleanup();
                    return Err(e);
                }
            }
        }

        let layouts = vec![layout; count];
        let alloc_info = vk::DescriptorSetAllocateInfo::builder()
            .descriptor_pool(pool)
            .set_layouts(&layouts);

        let sets = unsafe {
            match ctx.device.allocate_descriptor_sets(&alloc_info) {
                Ok(sets) => sets,
                Err(result) => {
                    uniform.cleanup();
                    return Err(device_call("vkAllocateDescriptorSets")(result));
                }
            }
        };
        uniform.sets = sets;

        for (i, set) in uniform.sets.iter().enumerate() {
            let buffer_info = vk::DescriptorBufferInfo::builder()
                .buffer(uniform.buffers[i])
                .offset(0)
                .range(size)
                .build();
            let write = vk::WriteDescriptorSet::builder()
                .dst_set(*set)
                .dst_binding(0)
                .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
                .buffer_info(std::slice::from_ref(&buffer_info))
                .build();
            unsafe {
                ctx.device.update_descriptor_sets(&[write], &[]);
            }
        }

        Ok(uniform)
    }

    /// Write `data` into the buffer for one swapchain image
    pub fn update(&self, image_index: usize, data: &T) -> VulkanResult<()> {
        memory::write_host_visible(
            &self.device,
            self.memories[image_index],
            0,
            as_bytes(data),
        )
    }

    /// Bind the image's descriptor set at `set_index`
    pub fn cmd_bind(
        &self,
        set_index: u32,
        image_index: usize,
        command_buffer: vk::CommandBuffer,
        pipeline_layout: vk::PipelineLayout,
    ) {
        unsafe {
            self.device.cmd_bind_descriptor_sets(
                command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                pipeline_layout,
                set_index,
                &[self.sets[image_index]],
                &[],
            );
        }
    }

    /// Destroy the buffers. Descriptor sets are returned with their pool.
    pub fn cleanup(&mut self) {
        unsafe {
            for buffer in self.buffers.drain(..) {
                self.device.destroy_buffer(buffer, None);
            }
            for mem in self.memories.drain(..) {
                self.device.free_memory(mem, None);
            }
        }
        self.sets.clear();
    }
}

/// A dynamically-offset uniform buffer with one padded slot per instance.
///
/// Bound once per frame; each draw addresses its slot through the dynamic
/// offset passed at bind time.
pub struct DynamicUniform<T: Copy> {
    device: ash::Device,
    buffers: Vec<vk::Buffer>,
    memories: Vec<vk::DeviceMemory>,
    sets: Vec<vk::DescriptorSet>,
    alignment: vk::DeviceSize,
    capacity: usize,
    _marker: PhantomData<T>,
}

impl<T: Copy> DynamicUniform<T> {
    /// Create per-image buffers sized `capacity` alignment-padded slots
    pub fn new(
        ctx: &VulkanContext,
        pool: vk::DescriptorPool,
        layout: vk::DescriptorSetLayout,
        capacity: usize,
    ) -> VulkanResult<Self> {
        let alignment = align_up(
            std::mem::size_of::<T>() as vk::DeviceSize,
            ctx.min_uniform_offset_alignment,
        );
        let buffer_size = alignment * capacity as vk::DeviceSize;
        let count = ctx.image_count as usize;

        let mut uniform = Self {
            device: ctx.device.clone(),
            buffers: Vec::with_capacity(count),
            memories: Vec::with_capacity(count),
            sets: Vec::with_capacity(count),
            alignment,
            capacity,
            _marker: PhantomData,
        };

        for _ in 0..count {
            match memory::create_buffer(
                ctx,
                buffer_size,
                vk::BufferUsageFlags::UNIFORM_BUFFER,
                vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
            ) {
                Ok((buffer, mem)) => {
                    uniform.buffers.push(buffer);
                    uniform.memories.push(mem);
                }
                Err(e) => {
                    uniform.cleanup();
                    return Err(e);
                }
            }
        }

        let layouts = vec![layout; count];
        let alloc_info = vk::DescriptorSetAllocateInfo::builder()
            .descriptor_pool(pool)
            .set_layouts(&layouts);

        let sets = unsafe {
            match ctx.device.allocate_descriptor_sets(&alloc_info) {
                Ok(sets) => sets,
                Err(result) => {
                    uniform.cleanup();
                    return Err(device_call("vkAllocateDescriptorSets")(result));
                }
            }
        };
        uniform.sets = sets;

        for (i, set) in uniform.sets.iter().enumerate() {
            let buffer_info = vk::DescriptorBufferInfo::builder()
                .buffer(uniform.buffers[i])
                .offset(0)
                // range covers one slot; the dynamic offset selects which
                .range(std::mem::size_of::<T>() as vk::DeviceSize)
                .build();
            let write = vk::WriteDescriptorSet::builder()
                .dst_set(*set)
                .dst_binding(0)
                .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC)
                .buffer_info(std::slice::from_ref(&buffer_info))
                .build();
            unsafe {
                ctx.device.update_descriptor_sets(&[write], &[]);
            }
        }

        Ok(uniform)
    }

    /// Write one value per instance into the image's buffer
    pub fn update(&self, image_index: usize, items: &[T]) -> VulkanResult<()> {
        if items.len() > self.capacity {
            return Err(VulkanError::CapacityExceeded(format!(
                "{} dynamic uniform slots requested, capacity is {}",
                items.len(),
                self.capacity
            )));
        }
        for (i, item) in items.iter().enumerate() {
            memory::write_host_visible(
                &self.device,
                self.memories[image_index],
                self.alignment * i as vk::DeviceSize,
                as_bytes(item),
            )?;
        }
        Ok(())
    }

    /// Bind the image's set at `set_index` with the offset for one instance
    pub fn cmd_bind(
        &self,
        instance_index: usize,
        set_index: u32,
        image_index: usize,
        command_buffer: vk::CommandBuffer,
        pipeline_layout: vk::PipelineLayout,
    ) {
        let offset = (self.alignment * instance_index as vk::DeviceSize) as u32;
        unsafe {
            self.device.cmd_bind_descriptor_sets(
                command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                pipeline_layout,
                set_index,
                &[self.sets[image_index]],
                &[offset],
            );
        }
    }

    /// Number of slots per image
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Destroy the buffers. Descriptor sets are returned with their pool.
    pub fn cleanup(&mut self) {
        unsafe {
            for buffer in self.buffers.drain(..) {
                self.device.destroy_buffer(buffer, None);
            }
            for mem in self.memories.drain(..) {
                self.device.free_memory(mem, None);
            }
        }
        self.sets.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn align_up_rounds_to_the_next_multiple() {
        assert_eq!(align_up(0, 64), 0);
        assert_eq!(align_up(1, 64), 64);
        assert_eq!(align_up(64, 64), 64);
        assert_eq!(align_up(65, 64), 128);
        assert_eq!(align_up(80, 256), 256);
    }
}
