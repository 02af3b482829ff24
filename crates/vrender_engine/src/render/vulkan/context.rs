//! Shared device context handed to every GPU resource constructor

use ash::vk;

/// Value bundle referencing the device state a resource constructor needs.
///
/// Owned by the frame orchestrator and passed by value (cheap clones of the
/// ash function tables plus plain handles) to every resource constructor.
/// All resources built from the same context are compatible for submission
/// on the same queue and device.
#[derive(Clone)]
pub struct VulkanContext {
    /// Instance function table, needed for memory property queries
    pub instance: ash::Instance,
    /// The selected physical device
    pub physical_device: vk::PhysicalDevice,
    /// Logical device function table
    pub device: ash::Device,
    /// Graphics-capable queue
    pub graphics_queue: vk::Queue,
    /// Command pool for one-shot transfer command buffers
    pub command_pool: vk::CommandPool,
    /// Number of swapchain images (sizes per-image resource arrays)
    pub image_count: u32,
    /// Current target extent
    pub extent: vk::Extent2D,
    /// Device limit used to align dynamic uniform slots
    pub min_uniform_offset_alignment: vk::DeviceSize,
}
