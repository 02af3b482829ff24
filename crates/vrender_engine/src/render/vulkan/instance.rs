//! Instance, debug messenger and device selection/creation
//!
//! The strict first stages of renderer initialization: create the instance
//! (with validation layers in debug builds), pick one physical device that
//! satisfies every requirement, and create the logical device with the
//! features this renderer depends on.

use std::collections::HashSet;
use std::ffi::{CStr, CString};

#[cfg(debug_assertions)]
use ash::extensions::ext::DebugUtils;
use ash::extensions::khr::{Surface as SurfaceLoader, Swapchain as SwapchainLoader};
use ash::vk;

use crate::render::vulkan::{device_call, VulkanError, VulkanResult};

/// Validation layers requested in debug builds
pub const VALIDATION_LAYERS: [&str; 1] = ["VK_LAYER_KHRONOS_validation"];

/// Device extensions the renderer cannot run without.
///
/// Robustness2 provides the null-descriptor feature required by material
/// sampler sets with absent textures.
pub fn required_device_extensions() -> [&'static CStr; 2] {
    [
        SwapchainLoader::name(),
        vk::ExtRobustness2Fn::name(),
    ]
}

/// Queue family indices for the two queues the renderer uses
#[derive(Debug, Clone, Copy, Default)]
pub struct QueueFamilyIndices {
    /// Graphics-capable family
    pub graphics: Option<u32>,
    /// Presentation-capable family (often the same as graphics)
    pub presentation: Option<u32>,
}

impl QueueFamilyIndices {
    /// Both required families were found
    pub fn is_complete(&self) -> bool {
        self.graphics.is_some() && self.presentation.is_some()
    }
}

/// Swapchain capabilities of a (device, surface) pair
pub struct SwapchainSupport {
    /// Surface capabilities (image count bounds, extents, transforms)
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    /// Supported surface formats
    pub formats: Vec<vk::SurfaceFormatKHR>,
    /// Supported presentation modes
    pub present_modes: Vec<vk::PresentModeKHR>,
}

impl SwapchainSupport {
    /// A device is only usable when it offers at least one format and mode
    pub fn is_adequate(&self) -> bool {
        !self.formats.is_empty() && !self.present_modes.is_empty()
    }
}

/// Create the Vulkan instance, enabling validation layers in debug builds
pub fn create_instance(
    entry: &ash::Entry,
    required_window_extensions: &[String],
) -> VulkanResult<ash::Instance> {
    let app_name = CString::new("vrender").expect("static string");
    let engine_name = CString::new("vrender_engine").expect("static string");
    let app_info = vk::ApplicationInfo::builder()
        .application_name(&app_name)
        .application_version(vk::make_api_version(0, 1, 0, 0))
        .engine_name(&engine_name)
        .engine_version(vk::make_api_version(0, 1, 0, 0))
        .api_version(vk::API_VERSION_1_2);

    let extension_cstrings: Vec<CString> = required_window_extensions
        .iter()
        .map(|name| CString::new(name.as_str()).expect("extension name has no NUL"))
        .collect();
    #[allow(unused_mut)] // extended in debug builds
    let mut extensions: Vec<*const i8> = extension_cstrings.iter().map(|e| e.as_ptr()).collect();

    #[cfg(debug_assertions)]
    extensions.push(DebugUtils::name().as_ptr());

    let layer_cstrings: Vec<CString> = if cfg!(debug_assertions) {
        if !validation_layers_supported(entry)? {
            return Err(VulkanError::InitializationFailed(
                "requested validation layers are not supported".into(),
            ));
        }
        VALIDATION_LAYERS
            .iter()
            .map(|name| CString::new(*name).expect("static string"))
            .collect()
    } else {
        Vec::new()
    };
    let layers: Vec<*const i8> = layer_cstrings.iter().map(|l| l.as_ptr()).collect();

    let create_info = vk::InstanceCreateInfo::builder()
        .application_info(&app_info)
        .enabled_extension_names(&extensions)
        .enabled_layer_names(&layers);

    unsafe {
        entry
            .create_instance(&create_info, None)
            .map_err(|e| VulkanError::InitializationFailed(format!("vkCreateInstance: {e:?}")))
    }
}

fn validation_layers_supported(entry: &ash::Entry) -> VulkanResult<bool> {
    let available = entry
        .enumerate_instance_layer_properties()
        .map_err(device_call("vkEnumerateInstanceLayerProperties"))?;

    Ok(VALIDATION_LAYERS.iter().all(|wanted| {
        available.iter().any(|layer| {
            let name = unsafe { CStr::from_ptr(layer.layer_name.as_ptr()) };
            name.to_str().map_or(false, |n| n == *wanted)
        })
    }))
}

/// Route validation messages into the logger
#[cfg(debug_assertions)]
unsafe extern "system" fn debug_callback(
    severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    _message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    let message = if callback_data.is_null() {
        std::borrow::Cow::Borrowed("<no message>")
    } else {
        CStr::from_ptr((*callback_data).p_message).to_string_lossy()
    };

    match severity {
        vk::DebugUtilsMessageSeverityFlagsEXT::ERROR => {
            log::error!("validation layer: {message}");
        }
        vk::DebugUtilsMessageSeverityFlagsEXT::WARNING => {
            log::warn!("validation layer: {message}");
        }
        _ => log::debug!("validation layer: {message}"),
    }

    vk::FALSE
}

/// Create the debug messenger (debug builds only)
#[cfg(debug_assertions)]
pub fn setup_debug_messenger(
    entry: &ash::Entry,
    instance: &ash::Instance,
) -> VulkanResult<(DebugUtils, vk::DebugUtilsMessengerEXT)> {
    let loader = DebugUtils::new(entry, instance);
    let create_info = vk::DebugUtilsMessengerCreateInfoEXT::builder()
        .message_severity(
            vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE
                | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
        )
        .message_type(
            vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
        )
        .pfn_user_callback(Some(debug_callback));

    let messenger = unsafe {
        loader
            .create_debug_utils_messenger(&create_info, None)
            .map_err(device_call("vkCreateDebugUtilsMessengerEXT"))?
    };

    Ok((loader, messenger))
}

/// Locate graphics and presentation queue families on a device
pub fn find_queue_families(
    instance: &ash::Instance,
    surface_loader: &SurfaceLoader,
    surface: vk::SurfaceKHR,
    device: vk::PhysicalDevice,
) -> VulkanResult<QueueFamilyIndices> {
    let families = unsafe { instance.get_physical_device_queue_family_properties(device) };

    let mut indices = QueueFamilyIndices::default();
    for (i, family) in families.iter().enumerate() {
        let index = i as u32;
        if family.queue_count == 0 {
            continue;
        }

        if indices.graphics.is_none()
            && family.queue_flags.contains(vk::QueueFlags::GRAPHICS)
        {
            indices.graphics = Some(index);
        }

        let presents = unsafe {
            surface_loader
                .get_physical_device_surface_support(device, index, surface)
                .map_err(device_call("vkGetPhysicalDeviceSurfaceSupportKHR"))?
        };
        if indices.presentation.is_none() && presents {
            indices.presentation = Some(index);
        }

        if indices.is_complete() {
            break;
        }
    }

    Ok(indices)
}

/// Query swapchain support details for a (device, surface) pair
pub fn query_swapchain_support(
    surface_loader: &SurfaceLoader,
    surface: vk::SurfaceKHR,
    device: vk::PhysicalDevice,
) -> VulkanResult<SwapchainSupport> {
    unsafe {
        Ok(SwapchainSupport {
            capabilities: surface_loader
                .get_physical_device_surface_capabilities(device, surface)
                .map_err(device_call("vkGetPhysicalDeviceSurfaceCapabilitiesKHR"))?,
            formats: surface_loader
                .get_physical_device_surface_formats(device, surface)
                .map_err(device_call("vkGetPhysicalDeviceSurfaceFormatsKHR"))?,
            present_modes: surface_loader
                .get_physical_device_surface_present_modes(device, surface)
                .map_err(device_call("vkGetPhysicalDeviceSurfacePresentModesKHR"))?,
        })
    }
}

fn supports_required_extensions(
    instance: &ash::Instance,
    device: vk::PhysicalDevice,
) -> VulkanResult<bool> {
    let available = unsafe {
        instance
            .enumerate_device_extension_properties(device)
            .map_err(device_call("vkEnumerateDeviceExtensionProperties"))?
    };

    let available: HashSet<&CStr> = available
        .iter()
        .map(|ext| unsafe { CStr::from_ptr(ext.extension_name.as_ptr()) })
        .collect();

    Ok(required_device_extensions()
        .iter()
        .all(|wanted| available.contains(wanted)))
}

/// Pick the first physical device satisfying every renderer requirement:
/// required extensions, an adequate swapchain, both queue families, and
/// anisotropic sampling.
pub fn pick_physical_device(
    instance: &ash::Instance,
    surface_loader: &SurfaceLoader,
    surface: vk::SurfaceKHR,
) -> VulkanResult<(vk::PhysicalDevice, QueueFamilyIndices)> {
    let devices = unsafe {
        instance
            .enumerate_physical_devices()
            .map_err(device_call("vkEnumeratePhysicalDevices"))?
    };

    for device in devices {
        if !supports_required_extensions(instance, device)? {
            continue;
        }
        if !query_swapchain_support(surface_loader, surface, device)?.is_adequate() {
            continue;
        }
        let indices = find_queue_families(instance, surface_loader, surface, device)?;
        if !indices.is_complete() {
            continue;
        }
        let features = unsafe { instance.get_physical_device_features(device) };
        if features.sampler_anisotropy == vk::FALSE {
            continue;
        }

        log_device_info(instance, device);
        return Ok((device, indices));
    }

    Err(VulkanError::InitializationFailed(
        "no physical device satisfies the renderer requirements".into(),
    ))
}

fn log_device_info(instance: &ash::Instance, device: vk::PhysicalDevice) {
    let properties = unsafe { instance.get_physical_device_properties(device) };
    let name = unsafe { CStr::from_ptr(properties.device_name.as_ptr()) };
    log::info!(
        "selected physical device: {} (type {:?}, API {}.{}.{})",
        name.to_string_lossy(),
        properties.device_type,
        vk::api_version_major(properties.api_version),
        vk::api_version_minor(properties.api_version),
        vk::api_version_patch(properties.api_version),
    );
}

/// Create the logical device with anisotropy and the null-descriptor
/// feature enabled, and fetch its two queues.
pub fn create_logical_device(
    instance: &ash::Instance,
    physical_device: vk::PhysicalDevice,
    indices: QueueFamilyIndices,
) -> VulkanResult<(ash::Device, vk::Queue, vk::Queue)> {
    let graphics_family = indices
        .graphics
        .ok_or_else(|| VulkanError::InitializationFailed("missing graphics queue family".into()))?;
    let presentation_family = indices.presentation.ok_or_else(|| {
        VulkanError::InitializationFailed("missing presentation queue family".into())
    })?;

    // Families may coincide; create one queue info per distinct family
    let unique_families: HashSet<u32> = [graphics_family, presentation_family].into();
    let priorities = [1.0f32];
    let queue_infos: Vec<vk::DeviceQueueCreateInfo> = unique_families
        .into_iter()
        .map(|family| {
            vk::DeviceQueueCreateInfo::builder()
                .queue_family_index(family)
                .queue_priorities(&priorities)
                .build()
        })
        .collect();

    let features = vk::PhysicalDeviceFeatures::builder().sampler_anisotropy(true);

    // Absent material textures are written as null descriptors; the device
    // must be created with the feature or those writes are invalid.
    let mut robustness2 =
        vk::PhysicalDeviceRobustness2FeaturesEXT::builder().null_descriptor(true);

    let extensions: Vec<*const i8> = required_device_extensions()
        .iter()
        .map(|e| e.as_ptr())
        .collect();

    let create_info = vk::DeviceCreateInfo::builder()
        .queue_create_infos(&queue_infos)
        .enabled_extension_names(&extensions)
        .enabled_features(&features)
        .push_next(&mut robustness2);

    let device = unsafe {
        instance
            .create_device(physical_device, &create_info, None)
            .map_err(device_call("vkCreateDevice"))?
    };

    let graphics_queue = unsafe { device.get_device_queue(graphics_family, 0) };
    let presentation_queue = unsafe { device.get_device_queue(presentation_family, 0) };

    Ok((device, graphics_queue, presentation_queue))
}
