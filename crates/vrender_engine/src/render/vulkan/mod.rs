//! Explicit Vulkan rendering backend
//!
//! Owns GPU memory, descriptor state, pipelines, per-frame synchronization
//! and the two-subpass render graph. Resource lifetimes are managed by hand:
//! every GPU object exposes an explicit `cleanup` and the renderer tears
//! everything down in reverse creation order after waiting for device idle.

use ash::vk;
use thiserror::Error;

pub mod context;
pub mod instance;
pub mod layouts;
pub mod memory;
pub mod pipeline;
pub mod renderer;
pub mod resources;
pub mod shaders;
pub mod skybox;
pub mod swapchain;
pub mod ubo;
pub mod uniform;
pub mod vertex;

pub use context::VulkanContext;
pub use layouts::{SetLayout, SetLayoutCatalog};
pub use renderer::{RendererConfig, VulkanRenderer};
pub use shaders::{PassTag, ShaderCatalog, ShaderPaths};

/// Number of swapchain images requested from the device.
///
/// Distinct from [`MAX_FRAME_DRAWS`]: per-image resources (uniform buffers,
/// command buffers, attachments) are sized by this, per-frame-in-flight
/// resources (fences, semaphores) by the other. The two counters advance
/// independently.
pub const IMAGE_COUNT: u32 = 3;

/// Number of frames the CPU may record ahead of the GPU
pub const MAX_FRAME_DRAWS: usize = 2;

/// Format used for every imported image and the intermediate color
/// attachment. sRGB-vs-linear handling of source data is an open gap
/// inherited from the source design; keep the constant in one place.
pub const COLOR_FORMAT: vk::Format = vk::Format::R8G8B8A8_UNORM;

/// Preferred swapchain surface color space
pub const SURFACE_COLOR_SPACE: vk::ColorSpaceKHR = vk::ColorSpaceKHR::SRGB_NONLINEAR;

/// Preferred presentation mode
pub const SURFACE_PRESENT_MODE: vk::PresentModeKHR = vk::PresentModeKHR::MAILBOX;

/// Vulkan-specific error type
#[derive(Error, Debug)]
pub enum VulkanError {
    /// General Vulkan API error with result code
    #[error("Vulkan API error: {0:?}")]
    Api(vk::Result),

    /// A named device call returned a non-success code
    #[error("{op} failed: {result:?}")]
    DeviceCall {
        /// The failing operation
        op: &'static str,
        /// The returned code
        result: vk::Result,
    },

    /// Initialization failed before the render loop could start
    #[error("Initialization failed: {0}")]
    InitializationFailed(String),

    /// No memory type satisfies the requested properties
    #[error("No suitable memory type found")]
    NoSuitableMemoryType,

    /// Shader discovery or compilation produced no usable module
    #[error("Shader error: {0}")]
    Shader(String),

    /// A renderer capacity limit was exceeded
    #[error("Capacity exceeded: {0}")]
    CapacityExceeded(String),
}

/// Result type for Vulkan operations
pub type VulkanResult<T> = Result<T, VulkanError>;

/// Shorthand for naming the failing device call in an error
pub(crate) fn device_call(op: &'static str) -> impl FnOnce(vk::Result) -> VulkanError {
    move |result| VulkanError::DeviceCall { op, result }
}
