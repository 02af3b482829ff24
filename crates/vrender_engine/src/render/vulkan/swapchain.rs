//! Swapchain creation and per-image views

use ash::extensions::khr::{Surface as SurfaceLoader, Swapchain as SwapchainLoader};
use ash::vk;

use crate::render::vulkan::instance::{self, QueueFamilyIndices};
use crate::render::vulkan::{
    device_call, memory, VulkanError, VulkanResult, COLOR_FORMAT, IMAGE_COUNT,
    SURFACE_COLOR_SPACE, SURFACE_PRESENT_MODE,
};

/// Pick the preferred surface format, falling back to the first offered.
///
/// A single `UNDEFINED` entry means the surface accepts any format.
pub fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> vk::SurfaceFormatKHR {
    let preferred = vk::SurfaceFormatKHR {
        format: COLOR_FORMAT,
        color_space: SURFACE_COLOR_SPACE,
    };

    if formats.len() == 1 && formats[0].format == vk::Format::UNDEFINED {
        return preferred;
    }

    formats
        .iter()
        .copied()
        .find(|f| f.format == preferred.format && f.color_space == preferred.color_space)
        .unwrap_or(formats[0])
}

/// Pick mailbox when offered; FIFO is always available per the Vulkan spec
pub fn choose_present_mode(modes: &[vk::PresentModeKHR]) -> vk::PresentModeKHR {
    modes
        .iter()
        .copied()
        .find(|m| *m == SURFACE_PRESENT_MODE)
        .unwrap_or(vk::PresentModeKHR::FIFO)
}

/// Resolve the swapchain extent from surface capabilities and the
/// framebuffer size, clamped into the surface bounds.
pub fn choose_extent(
    capabilities: &vk::SurfaceCapabilitiesKHR,
    framebuffer_size: (u32, u32),
) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        return capabilities.current_extent;
    }

    vk::Extent2D {
        width: framebuffer_size.0.clamp(
            capabilities.min_image_extent.width,
            capabilities.max_image_extent.width,
        ),
        height: framebuffer_size.1.clamp(
            capabilities.min_image_extent.height,
            capabilities.max_image_extent.height,
        ),
    }
}

/// The swapchain with its images and views
pub struct Swapchain {
    loader: SwapchainLoader,
    handle: vk::SwapchainKHR,
    /// Selected surface format
    pub format: vk::Format,
    /// Swapchain image extent
    pub extent: vk::Extent2D,
    images: Vec<vk::Image>,
    views: Vec<vk::ImageView>,
}

impl Swapchain {
    /// Create the swapchain with [`IMAGE_COUNT`] images.
    ///
    /// Fails when the fixed image count does not lie within the
    /// device-reported bounds.
    pub fn new(
        ash_instance: &ash::Instance,
        device: &ash::Device,
        surface_loader: &SurfaceLoader,
        surface: vk::SurfaceKHR,
        physical_device: vk::PhysicalDevice,
        indices: QueueFamilyIndices,
        framebuffer_size: (u32, u32),
    ) -> VulkanResult<Self> {
        let support = instance::query_swapchain_support(surface_loader, surface, physical_device)?;

        let surface_format = choose_surface_format(&support.formats);
        let present_mode = choose_present_mode(&support.present_modes);
        let extent = choose_extent(&support.capabilities, framebuffer_size);

        let max_count = if support.capabilities.max_image_count == 0 {
            u32::MAX
        } else {
            support.capabilities.max_image_count
        };
        if IMAGE_COUNT < support.capabilities.min_image_count || IMAGE_COUNT > max_count {
            return Err(VulkanError::InitializationFailed(format!(
                "swapchain image count {IMAGE_COUNT} outside device bounds {}..={}",
                support.capabilities.min_image_count, max_count
            )));
        }

        let graphics = indices.graphics.unwrap_or_default();
        let presentation = indices.presentation.unwrap_or_default();
        let family_indices = [graphics, presentation];

        let mut create_info = vk::SwapchainCreateInfoKHR::builder()
            .surface(surface)
            .min_image_count(IMAGE_COUNT)
            .image_format(surface_format.format)
            .image_color_space(surface_format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .pre_transform(support.capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .clipped(true);

        // Images must be shareable when the two families differ
        create_info = if graphics == presentation {
            create_info.image_sharing_mode(vk::SharingMode::EXCLUSIVE)
        } else {
            create_info
                .image_sharing_mode(vk::SharingMode::CONCURRENT)
                .queue_family_indices(&family_indices)
        };

        let loader = SwapchainLoader::new(ash_instance, device);
        let handle = unsafe {
            loader
                .create_swapchain(&create_info, None)
                .map_err(device_call("vkCreateSwapchainKHR"))?
        };

        let images = unsafe {
            match loader.get_swapchain_images(handle) {
                Ok(images) => images,
                Err(result) => {
                    loader.destroy_swapchain(handle, None);
                    return Err(device_call("vkGetSwapchainImagesKHR")(result));
                }
            }
        };

        let mut views = Vec::with_capacity(images.len());
        for image in &images {
            match memory::create_image_view(
                device,
                *image,
                surface_format.format,
                vk::ImageAspectFlags::COLOR,
                vk::ImageViewType::TYPE_2D,
                1,
            ) {
                Ok(view) => views.push(view),
                Err(e) => {
                    unsafe {
                        for view in views {
                            device.destroy_image_view(view, None);
                        }
                        loader.destroy_swapchain(handle, None);
                    }
                    return Err(e);
                }
            }
        }

        Ok(Self {
            loader,
            handle,
            format: surface_format.format,
            extent,
            images,
            views,
        })
    }

    /// Raw swapchain handle
    pub fn handle(&self) -> vk::SwapchainKHR {
        self.handle
    }

    /// Loader for acquire/present calls
    pub fn loader(&self) -> &SwapchainLoader {
        &self.loader
    }

    /// Number of swapchain images
    pub fn image_count(&self) -> u32 {
        self.images.len() as u32
    }

    /// Per-image color views, indexed by acquired image index
    pub fn views(&self) -> &[vk::ImageView] {
        &self.views
    }

    /// Destroy views and the swapchain
    pub fn cleanup(&mut self, device: &ash::Device) {
        unsafe {
            for view in self.views.drain(..) {
                device.destroy_image_view(view, None);
            }
            self.loader.destroy_swapchain(self.handle, None);
        }
        self.handle = vk::SwapchainKHR::null();
        self.images.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unrestricted_surface_yields_preferred_format() {
        let formats = [vk::SurfaceFormatKHR {
            format: vk::Format::UNDEFINED,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        }];
        let chosen = choose_surface_format(&formats);
        assert_eq!(chosen.format, COLOR_FORMAT);
        assert_eq!(chosen.color_space, SURFACE_COLOR_SPACE);
    }

    #[test]
    fn falls_back_to_first_offered_format() {
        let formats = [
            vk::SurfaceFormatKHR {
                format: vk::Format::B8G8R8A8_SRGB,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
            vk::SurfaceFormatKHR {
                format: vk::Format::R5G6B5_UNORM_PACK16,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
        ];
        assert_eq!(choose_surface_format(&formats).format, vk::Format::B8G8R8A8_SRGB);
    }

    #[test]
    fn fifo_is_the_present_mode_fallback() {
        let modes = [vk::PresentModeKHR::IMMEDIATE, vk::PresentModeKHR::FIFO];
        assert_eq!(choose_present_mode(&modes), vk::PresentModeKHR::FIFO);

        let with_mailbox = [vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX];
        assert_eq!(choose_present_mode(&with_mailbox), vk::PresentModeKHR::MAILBOX);
    }

    #[test]
    fn extent_is_clamped_into_surface_bounds() {
        let capabilities = vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D {
                width: u32::MAX,
                height: u32::MAX,
            },
            min_image_extent: vk::Extent2D {
                width: 200,
                height: 200,
            },
            max_image_extent: vk::Extent2D {
                width: 1000,
                height: 1000,
            },
            ..Default::default()
        };
        let extent = choose_extent(&capabilities, (4000, 50));
        assert_eq!(extent.width, 1000);
        assert_eq!(extent.height, 200);
    }
}
