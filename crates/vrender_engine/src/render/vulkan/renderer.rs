//! The frame orchestrator
//!
//! Owns the Vulkan instance, device, swapchain, the two-subpass render pass
//! and all per-frame state, and drives the update/draw loop. Initialization
//! follows one strict order; shutdown tears everything down in reverse
//! after waiting for device idle. GPU models are never destroyed directly
//! from a mutating call: removal moves them to a retire queue consumed at
//! the start of the next frame, after the in-flight fence has signaled.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

#[cfg(debug_assertions)]
use ash::extensions::ext::DebugUtils;
use ash::extensions::khr::Surface as SurfaceLoader;
use ash::vk;

use crate::assets::Cubemap;
use crate::foundation::math::{Mat4, Vec4};
use crate::render::camera::Camera;
use crate::render::lighting::{self, Light, MAX_LIGHT_SOURCES};
use crate::render::settings::RenderSettings;
use crate::render::vulkan::instance::{self, QueueFamilyIndices};
use crate::render::vulkan::layouts::{SetLayout, SetLayoutCatalog};
use crate::render::vulkan::memory;
use crate::render::vulkan::pipeline::{
    CompositionPipeline, GeometryPipeline, OutlinePipeline, SkyboxPipeline,
};
use crate::render::vulkan::resources::GpuModel;
use crate::render::vulkan::shaders::{ShaderCatalog, ShaderPaths};
use crate::render::vulkan::skybox::Skybox;
use crate::render::vulkan::swapchain::Swapchain;
use crate::render::vulkan::ubo::{
    UboDynamicColor, UboLightArray, UboPostProcessFeatures, UboViewProjection,
};
use crate::render::vulkan::uniform::{DynamicUniform, Uniform};
use crate::render::vulkan::{
    device_call, VulkanContext, VulkanError, VulkanResult, MAX_FRAME_DRAWS,
};
use crate::render::window::WindowHandle;
use crate::render::{RenderError, Renderer};
use crate::scene::ModelInstance;

/// Per-draw GUI submission hook, invoked inside the composition subpass
pub type GuiCallback = Box<dyn FnMut(vk::CommandBuffer)>;

/// Runtime renderer configuration, validated at startup
#[derive(Debug, Clone)]
pub struct RendererConfig {
    /// Maximum number of simultaneously registered models; sizes the
    /// dynamic color uniform and its descriptor pool
    pub max_objects: usize,
    /// Shader tree and compiler locations
    pub shader_paths: ShaderPaths,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            max_objects: 64,
            shader_paths: ShaderPaths {
                root: PathBuf::from("shaders/vulkan"),
                include_dir: PathBuf::from("shaders/vulkan/include"),
                compile_script: PathBuf::from("scripts/compile_shaders.sh"),
            },
        }
    }
}

/// Retire list for GPU models whose command buffers may still be in flight.
///
/// `remove_model` transfers ownership here; the next `draw` call drains the
/// queue right after the frame fence wait, which is the earliest point the
/// resources are provably unreferenced. This is the renderer's only safe
/// teardown path for live models.
pub(crate) struct RetireQueue<T> {
    items: VecDeque<T>,
}

impl<T> RetireQueue<T> {
    pub(crate) fn new() -> Self {
        Self {
            items: VecDeque::new(),
        }
    }

    pub(crate) fn retire(&mut self, item: T) {
        self.items.push_back(item);
    }

    pub(crate) fn drain(&mut self) -> impl Iterator<Item = T> + '_ {
        self.items.drain(..)
    }

    pub(crate) fn len(&self) -> usize {
        self.items.len()
    }
}

/// Synchronization objects of one frame in flight
struct FrameSync {
    image_available: vk::Semaphore,
    render_finished: vk::Semaphore,
    in_flight: vk::Fence,
}

/// One attachment image with its memory and view
struct AttachmentImage {
    image: vk::Image,
    memory: vk::DeviceMemory,
    view: vk::ImageView,
}

impl AttachmentImage {
    fn cleanup(&mut self, device: &ash::Device) {
        unsafe {
            device.destroy_image_view(self.view, None);
            device.destroy_image(self.image, None);
            device.free_memory(self.memory, None);
        }
    }
}

/// The explicit Vulkan backend
pub struct VulkanRenderer {
    // Core handles, creation order
    _entry: ash::Entry,
    instance: ash::Instance,
    #[cfg(debug_assertions)]
    debug: Option<(DebugUtils, vk::DebugUtilsMessengerEXT)>,
    surface_loader: SurfaceLoader,
    surface: vk::SurfaceKHR,
    #[allow(dead_code)] // kept for future swapchain recreation
    queue_indices: QueueFamilyIndices,
    presentation_queue: vk::Queue,
    swapchain: Swapchain,
    ctx: VulkanContext,

    depth_images: Vec<AttachmentImage>,
    color_images: Vec<AttachmentImage>,
    render_pass: vk::RenderPass,

    layouts: SetLayoutCatalog,
    shaders: ShaderCatalog,

    sampler: vk::Sampler,
    uniform_pool: vk::DescriptorPool,
    dynamic_pool: vk::DescriptorPool,
    input_pool: vk::DescriptorPool,
    input_sets: Vec<vk::DescriptorSet>,
    gui_pool: vk::DescriptorPool,

    vp_uniform: Uniform<UboViewProjection>,
    light_uniform: Uniform<UboLightArray>,
    post_process_uniform: Uniform<UboPostProcessFeatures>,
    dynamic_color_uniform: DynamicUniform<UboDynamicColor>,

    geometry_pipeline: GeometryPipeline,
    outline_pipeline: OutlinePipeline,
    composition_pipeline: CompositionPipeline,
    skybox_pipeline: SkyboxPipeline,

    framebuffers: Vec<vk::Framebuffer>,
    command_buffers: Vec<vk::CommandBuffer>,
    frame_sync: Vec<FrameSync>,
    current_frame: usize,

    // Scene state
    models: Vec<GpuModel>,
    retired: RetireQueue<GpuModel>,
    lights: Vec<Light>,
    light_array: UboLightArray,
    skybox: Option<Skybox>,
    settings: Arc<Mutex<RenderSettings>>,
    gui_callback: Option<GuiCallback>,
    max_objects: usize,
    cleaned_up: bool,
}

impl VulkanRenderer {
    /// Initialize the whole backend against a window.
    ///
    /// Any failure inside the sequence is logged and reported; no partial
    /// teardown-and-retry is attempted, the caller abandons the renderer.
    pub fn init(
        window: &mut WindowHandle,
        config: RendererConfig,
        settings: Arc<Mutex<RenderSettings>>,
    ) -> VulkanResult<Self> {
        match Self::create(window, config, settings) {
            Ok(renderer) => Ok(renderer),
            Err(e) => {
                log::error!("renderer initialization failed: {e}");
                Err(e)
            }
        }
    }

    fn create(
        window: &mut WindowHandle,
        config: RendererConfig,
        settings: Arc<Mutex<RenderSettings>>,
    ) -> VulkanResult<Self> {
        if config.max_objects == 0 {
            return Err(VulkanError::InitializationFailed(
                "max_objects must be at least 1".into(),
            ));
        }

        let entry = unsafe {
            ash::Entry::load().map_err(|e| {
                VulkanError::InitializationFailed(format!("cannot load Vulkan library: {e}"))
            })?
        };

        let window_extensions = window.required_instance_extensions().map_err(|e| {
            VulkanError::InitializationFailed(format!("window extension query failed: {e}"))
        })?;
        let ash_instance = instance::create_instance(&entry, &window_extensions)?;

        #[cfg(debug_assertions)]
        let debug = Some(instance::setup_debug_messenger(&entry, &ash_instance)?);

        let surface = window.create_vulkan_surface(ash_instance.handle()).map_err(|e| {
            VulkanError::InitializationFailed(format!("surface creation failed: {e}"))
        })?;
        let surface_loader = SurfaceLoader::new(&entry, &ash_instance);

        let (physical_device, queue_indices) =
            instance::pick_physical_device(&ash_instance, &surface_loader, surface)?;

        let (device, graphics_queue, presentation_queue) =
            instance::create_logical_device(&ash_instance, physical_device, queue_indices)?;

        let swapchain = Swapchain::new(
            &ash_instance,
            &device,
            &surface_loader,
            surface,
            physical_device,
            queue_indices,
            window.framebuffer_size(),
        )?;

        let device_properties =
            unsafe { ash_instance.get_physical_device_properties(physical_device) };

        // The command pool is created later in the sequence; resources that
        // need one-shot uploads are only constructed after init completes.
        let mut ctx = VulkanContext {
            instance: ash_instance.clone(),
            physical_device,
            device: device.clone(),
            graphics_queue,
            command_pool: vk::CommandPool::null(),
            image_count: swapchain.image_count(),
            extent: swapchain.extent,
            min_uniform_offset_alignment: device_properties
                .limits
                .min_uniform_buffer_offset_alignment,
        };

        let depth_format = Self::find_depth_format(&ash_instance, physical_device)?;
        let depth_images = Self::create_attachment_images(
            &ctx,
            depth_format,
            vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT | vk::ImageUsageFlags::INPUT_ATTACHMENT,
            vk::ImageAspectFlags::DEPTH,
        )?;
        let color_images = Self::create_attachment_images(
            &ctx,
            crate::render::vulkan::COLOR_FORMAT,
            vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::INPUT_ATTACHMENT,
            vk::ImageAspectFlags::COLOR,
        )?;

        let render_pass = Self::create_render_pass(&device, swapchain.format, depth_format)?;

        let layouts = SetLayoutCatalog::new(&ctx)?;
        let mut shaders = ShaderCatalog::new(&ctx, &config.shader_paths)?;

        let sampler = Self::create_sampler(&device, &device_properties)?;

        // Descriptor pools sized for the fixed per-image uniforms plus the
        // runtime-validated object capacity
        let image_count = swapchain.image_count();
        let uniform_pool = memory::create_descriptor_pool(
            &device,
            &[vk::DescriptorPoolSize {
                ty: vk::DescriptorType::UNIFORM_BUFFER,
                descriptor_count: image_count * 3,
            }],
            image_count * 3,
            vk::DescriptorPoolCreateFlags::empty(),
        )?;
        let dynamic_pool = memory::create_descriptor_pool(
            &device,
            &[vk::DescriptorPoolSize {
                ty: vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC,
                descriptor_count: image_count,
            }],
            image_count,
            vk::DescriptorPoolCreateFlags::empty(),
        )?;
        let input_pool = memory::create_descriptor_pool(
            &device,
            &[vk::DescriptorPoolSize {
                ty: vk::DescriptorType::INPUT_ATTACHMENT,
                descriptor_count: image_count * 2,
            }],
            image_count,
            vk::DescriptorPoolCreateFlags::empty(),
        )?;

        let vp_uniform =
            Uniform::new(&ctx, uniform_pool, layouts.get(SetLayout::Camera))?;
        let light_uniform = Uniform::new(&ctx, uniform_pool, layouts.get(SetLayout::Light))?;
        let post_process_uniform =
            Uniform::new(&ctx, uniform_pool, layouts.get(SetLayout::MaterialUniform))?;
        let dynamic_color_uniform = DynamicUniform::new(
            &ctx,
            dynamic_pool,
            layouts.get(SetLayout::DynamicColor),
            config.max_objects,
        )?;

        let input_sets = Self::create_input_descriptor_sets(
            &device,
            input_pool,
            &layouts,
            &color_images,
            &depth_images,
        )?;

        let geometry_pipeline =
            GeometryPipeline::new(&ctx, render_pass, &layouts, &mut shaders)?;
        let outline_pipeline = OutlinePipeline::new(&ctx, render_pass, &layouts, &mut shaders)?;
        let composition_pipeline =
            CompositionPipeline::new(&ctx, render_pass, &layouts, &mut shaders)?;
        let skybox_pipeline = SkyboxPipeline::new(&ctx, render_pass, &layouts, &mut shaders)?;

        let framebuffers = Self::create_framebuffers(
            &device,
            render_pass,
            &swapchain,
            &color_images,
            &depth_images,
        )?;

        let command_pool_info = vk::CommandPoolCreateInfo::builder()
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER)
            .queue_family_index(queue_indices.graphics.unwrap_or_default());
        let command_pool = unsafe {
            device
                .create_command_pool(&command_pool_info, None)
                .map_err(device_call("vkCreateCommandPool"))?
        };
        ctx.command_pool = command_pool;

        let alloc_info = vk::CommandBufferAllocateInfo::builder()
            .command_pool(command_pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(image_count);
        let command_buffers = unsafe {
            device
                .allocate_command_buffers(&alloc_info)
                .map_err(device_call("vkAllocateCommandBuffers"))?
        };

        let mut frame_sync = Vec::with_capacity(MAX_FRAME_DRAWS);
        for _ in 0..MAX_FRAME_DRAWS {
            frame_sync.push(Self::create_frame_sync(&device)?);
        }

        // A mixed pool the GUI overlay backend allocates its font/image
        // descriptors from
        let gui_pool = memory::create_descriptor_pool(
            &device,
            &[
                vk::DescriptorPoolSize {
                    ty: vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
                    descriptor_count: 16,
                },
                vk::DescriptorPoolSize {
                    ty: vk::DescriptorType::UNIFORM_BUFFER,
                    descriptor_count: 16,
                },
            ],
            32,
            vk::DescriptorPoolCreateFlags::FREE_DESCRIPTOR_SET,
        )?;

        log::info!(
            "Vulkan renderer initialized: {}x{} swapchain, {} images, {} frames in flight",
            swapchain.extent.width,
            swapchain.extent.height,
            image_count,
            MAX_FRAME_DRAWS,
        );

        Ok(Self {
            _entry: entry,
            instance: ash_instance,
            #[cfg(debug_assertions)]
            debug,
            surface_loader,
            surface,
            queue_indices,
            presentation_queue,
            swapchain,
            ctx,
            depth_images,
            color_images,
            render_pass,
            layouts,
            shaders,
            sampler,
            uniform_pool,
            dynamic_pool,
            input_pool,
            input_sets,
            gui_pool,
            vp_uniform,
            light_uniform,
            post_process_uniform,
            dynamic_color_uniform,
            geometry_pipeline,
            outline_pipeline,
            composition_pipeline,
            skybox_pipeline,
            framebuffers,
            command_buffers,
            frame_sync,
            current_frame: 0,
            models: Vec::new(),
            retired: RetireQueue::new(),
            lights: Vec::new(),
            light_array: UboLightArray::default(),
            skybox: None,
            settings,
            gui_callback: None,
            max_objects: config.max_objects,
            cleaned_up: false,
        })
    }

    fn find_depth_format(
        ash_instance: &ash::Instance,
        physical_device: vk::PhysicalDevice,
    ) -> VulkanResult<vk::Format> {
        // The outline technique needs stencil, so only combined formats
        let candidates = [
            vk::Format::D32_SFLOAT_S8_UINT,
            vk::Format::D24_UNORM_S8_UINT,
        ];

        for format in candidates {
            let properties = unsafe {
                ash_instance.get_physical_device_format_properties(physical_device, format)
            };
            if properties
                .optimal_tiling_features
                .contains(vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT)
            {
                return Ok(format);
            }
        }

        Err(VulkanError::InitializationFailed(
            "no supported depth/stencil format".into(),
        ))
    }

    fn create_attachment_images(
        ctx: &VulkanContext,
        format: vk::Format,
        usage: vk::ImageUsageFlags,
        aspect: vk::ImageAspectFlags,
    ) -> VulkanResult<Vec<AttachmentImage>> {
        let mut images = Vec::with_capacity(ctx.image_count as usize);
        for _ in 0..ctx.image_count {
            let (image, image_memory) = memory::create_image(
                ctx,
                ctx.extent.width,
                ctx.extent.height,
                format,
                vk::ImageTiling::OPTIMAL,
                usage,
                vk::MemoryPropertyFlags::DEVICE_LOCAL,
                vk::ImageCreateFlags::empty(),
                1,
            )?;
            let view = match memory::create_image_view(
                &ctx.device,
                image,
                format,
                aspect,
                vk::ImageViewType::TYPE_2D,
                1,
            ) {
                Ok(view) => view,
                Err(e) => {
                    unsafe {
                        ctx.device.destroy_image(image, None);
                        ctx.device.free_memory(image_memory, None);
                    }
                    return Err(e);
                }
            };
            images.push(AttachmentImage {
                image,
                memory: image_memory,
                view,
            });
        }
        Ok(images)
    }

    /// The two-subpass render pass.
    ///
    /// Attachments: 0 swapchain color (presented), 1 intermediate color,
    /// 2 depth/stencil. Subpass 0 renders geometry into 1 + 2; subpass 1
    /// reads both as input attachments and composes into 0. Three
    /// dependencies order external writes, the cross-subpass read and
    /// presentation; removing or reordering them manifests as flicker or
    /// validation errors, not a crash.
    fn create_render_pass(
        device: &ash::Device,
        swapchain_format: vk::Format,
        depth_format: vk::Format,
    ) -> VulkanResult<vk::RenderPass> {
        let attachments = [
            // 0: swapchain color, composed output
            vk::AttachmentDescription::builder()
                .format(swapchain_format)
                .samples(vk::SampleCountFlags::TYPE_1)
                .load_op(vk::AttachmentLoadOp::CLEAR)
                .store_op(vk::AttachmentStoreOp::STORE)
                .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
                .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
                .initial_layout(vk::ImageLayout::UNDEFINED)
                .final_layout(vk::ImageLayout::PRESENT_SRC_KHR)
                .build(),
            // 1: intermediate color, written by subpass 0, read by subpass 1;
            // its contents do not matter once the render pass ends
            vk::AttachmentDescription::builder()
                .format(crate::render::vulkan::COLOR_FORMAT)
                .samples(vk::SampleCountFlags::TYPE_1)
                .load_op(vk::AttachmentLoadOp::CLEAR)
                .store_op(vk::AttachmentStoreOp::DONT_CARE)
                .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
                .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
                .initial_layout(vk::ImageLayout::UNDEFINED)
                .final_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
                .build(),
            // 2: depth/stencil
            vk::AttachmentDescription::builder()
                .format(depth_format)
                .samples(vk::SampleCountFlags::TYPE_1)
                .load_op(vk::AttachmentLoadOp::CLEAR)
                .store_op(vk::AttachmentStoreOp::DONT_CARE)
                .stencil_load_op(vk::AttachmentLoadOp::CLEAR)
                .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
                .initial_layout(vk::ImageLayout::UNDEFINED)
                .final_layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL)
                .build(),
        ];

        let color_ref = vk::AttachmentReference {
            attachment: 1,
            layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        };
        let depth_ref = vk::AttachmentReference {
            attachment: 2,
            layout: vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
        };
        let swapchain_ref = vk::AttachmentReference {
            attachment: 0,
            layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        };
        let input_refs = [
            vk::AttachmentReference {
                attachment: 1,
                layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            },
            vk::AttachmentReference {
                attachment: 2,
                layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            },
        ];

        let subpasses = [
            vk::SubpassDescription::builder()
                .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
                .color_attachments(std::slice::from_ref(&color_ref))
                .depth_stencil_attachment(&depth_ref)
                .build(),
            vk::SubpassDescription::builder()
                .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
                .color_attachments(std::slice::from_ref(&swapchain_ref))
                .input_attachments(&input_refs)
                .build(),
        ];

        let dependencies = [
            // external -> subpass 0: color attachment writes may start only
            // after prior reads of the image complete
            vk::SubpassDependency {
                src_subpass: vk::SUBPASS_EXTERNAL,
                dst_subpass: 0,
                src_stage_mask: vk::PipelineStageFlags::BOTTOM_OF_PIPE,
                src_access_mask: vk::AccessFlags::MEMORY_READ,
                dst_stage_mask: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
                dst_access_mask: vk::AccessFlags::COLOR_ATTACHMENT_READ
                    | vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
                dependency_flags: vk::DependencyFlags::empty(),
            },
            // subpass 0 -> subpass 1: fragment reads of the first pass's
            // outputs wait for its color writes
            vk::SubpassDependency {
                src_subpass: 0,
                dst_subpass: 1,
                src_stage_mask: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
                src_access_mask: vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
                dst_stage_mask: vk::PipelineStageFlags::FRAGMENT_SHADER,
                dst_access_mask: vk::AccessFlags::SHADER_READ,
                dependency_flags: vk::DependencyFlags::empty(),
            },
            // subpass 1 -> external: presentation reads wait for the final
            // color writes
            vk::SubpassDependency {
                src_subpass: 1,
                dst_subpass: vk::SUBPASS_EXTERNAL,
                src_stage_mask: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
                src_access_mask: vk::AccessFlags::COLOR_ATTACHMENT_READ
                    | vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
                dst_stage_mask: vk::PipelineStageFlags::BOTTOM_OF_PIPE,
                dst_access_mask: vk::AccessFlags::MEMORY_READ,
                dependency_flags: vk::DependencyFlags::empty(),
            },
        ];

        let create_info = vk::RenderPassCreateInfo::builder()
            .attachments(&attachments)
            .subpasses(&subpasses)
            .dependencies(&dependencies);

        unsafe {
            device
                .create_render_pass(&create_info, None)
                .map_err(device_call("vkCreateRenderPass"))
        }
    }

    fn create_sampler(
        device: &ash::Device,
        properties: &vk::PhysicalDeviceProperties,
    ) -> VulkanResult<vk::Sampler> {
        let create_info = vk::SamplerCreateInfo::builder()
            .mag_filter(vk::Filter::LINEAR)
            .min_filter(vk::Filter::LINEAR)
            .address_mode_u(vk::SamplerAddressMode::REPEAT)
            .address_mode_v(vk::SamplerAddressMode::REPEAT)
            .address_mode_w(vk::SamplerAddressMode::REPEAT)
            .anisotropy_enable(true)
            .max_anisotropy(properties.limits.max_sampler_anisotropy)
            .border_color(vk::BorderColor::INT_OPAQUE_BLACK)
            .unnormalized_coordinates(false)
            .compare_enable(false)
            .mipmap_mode(vk::SamplerMipmapMode::LINEAR);

        unsafe {
            device
                .create_sampler(&create_info, None)
                .map_err(device_call("vkCreateSampler"))
        }
    }

    fn create_input_descriptor_sets(
        device: &ash::Device,
        pool: vk::DescriptorPool,
        layouts: &SetLayoutCatalog,
        color_images: &[AttachmentImage],
        depth_images: &[AttachmentImage],
    ) -> VulkanResult<Vec<vk::DescriptorSet>> {
        let set_layouts = vec![layouts.get(SetLayout::PostProcessInput); color_images.len()];
        let alloc_info = vk::DescriptorSetAllocateInfo::builder()
            .descriptor_pool(pool)
            .set_layouts(&set_layouts);

        let sets = unsafe {
            device
                .allocate_descriptor_sets(&alloc_info)
                .map_err(device_call("vkAllocateDescriptorSets"))?
        };

        for (i, set) in sets.iter().enumerate() {
            let color_info = vk::DescriptorImageInfo::builder()
                .image_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)
                .image_view(color_images[i].view)
                .build();
            let depth_info = vk::DescriptorImageInfo::builder()
                .image_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)
                .image_view(depth_images[i].view)
                .build();

            let writes = [
                vk::WriteDescriptorSet::builder()
                    .dst_set(*set)
                    .dst_binding(0)
                    .descriptor_type(vk::DescriptorType::INPUT_ATTACHMENT)
                    .image_info(std::slice::from_ref(&color_info))
                    .build(),
                vk::WriteDescriptorSet::builder()
                    .dst_set(*set)
                    .dst_binding(1)
                    .descriptor_type(vk::DescriptorType::INPUT_ATTACHMENT)
                    .image_info(std::slice::from_ref(&depth_info))
                    .build(),
            ];
            unsafe {
                device.update_descriptor_sets(&writes, &[]);
            }
        }

        Ok(sets)
    }

    fn create_framebuffers(
        device: &ash::Device,
        render_pass: vk::RenderPass,
        swapchain: &Swapchain,
        color_images: &[AttachmentImage],
        depth_images: &[AttachmentImage],
    ) -> VulkanResult<Vec<vk::Framebuffer>> {
        let mut framebuffers = Vec::with_capacity(swapchain.views().len());
        for (i, swapchain_view) in swapchain.views().iter().enumerate() {
            // Order matches the render pass attachment indices
            let attachments = [*swapchain_view, color_images[i].view, depth_images[i].view];
            let create_info = vk::FramebufferCreateInfo::builder()
                .render_pass(render_pass)
                .attachments(&attachments)
                .width(swapchain.extent.width)
                .height(swapchain.extent.height)
                .layers(1);

            let framebuffer = unsafe {
                match device.create_framebuffer(&create_info, None) {
                    Ok(framebuffer) => framebuffer,
                    Err(result) => {
                        for framebuffer in framebuffers {
                            device.destroy_framebuffer(framebuffer, None);
                        }
                        return Err(device_call("vkCreateFramebuffer")(result));
                    }
                }
            };
            framebuffers.push(framebuffer);
        }
        Ok(framebuffers)
    }

    fn create_frame_sync(device: &ash::Device) -> VulkanResult<FrameSync> {
        let semaphore_info = vk::SemaphoreCreateInfo::builder();
        let fence_info = vk::FenceCreateInfo::builder().flags(vk::FenceCreateFlags::SIGNALED);

        unsafe {
            Ok(FrameSync {
                image_available: device
                    .create_semaphore(&semaphore_info, None)
                    .map_err(device_call("vkCreateSemaphore"))?,
                render_finished: device
                    .create_semaphore(&semaphore_info, None)
                    .map_err(device_call("vkCreateSemaphore"))?,
                in_flight: device
                    .create_fence(&fence_info, None)
                    .map_err(device_call("vkCreateFence"))?,
            })
        }
    }

    /// Install the GUI submission hook invoked once per frame inside the
    /// composition subpass
    pub fn set_gui_callback(&mut self, callback: GuiCallback) {
        self.gui_callback = Some(callback);
    }

    /// The descriptor pool reserved for the GUI overlay backend
    pub fn gui_descriptor_pool(&self) -> vk::DescriptorPool {
        self.gui_pool
    }

    /// Number of models awaiting deferred destruction (instrumentation)
    pub fn retired_model_count(&self) -> usize {
        self.retired.len()
    }

    fn model_position(&self, model_id: u32) -> Option<usize> {
        self.models.iter().position(|m| m.id == model_id)
    }

    fn update_uniforms(&mut self, image_index: usize, camera: &dyn Camera) -> VulkanResult<()> {
        let vp = UboViewProjection {
            view: camera.view_matrix(),
            projection: camera.projection_matrix(),
        };
        self.vp_uniform.update(image_index, &vp)?;

        self.light_array.fill_from(&self.lights);
        self.light_uniform.update(image_index, &self.light_array)?;

        let gamma = self
            .settings
            .lock()
            .map_or(2.2, |settings| settings.gamma);
        self.post_process_uniform
            .update(image_index, &UboPostProcessFeatures { gamma })?;

        if !self.models.is_empty() {
            let colors = vec![
                UboDynamicColor {
                    color: Vec4::new(0.33, 0.55, 0.77, 1.0),
                };
                self.models.len()
            ];
            self.dynamic_color_uniform.update(image_index, &colors)?;
        }

        Ok(())
    }

    fn record_commands(
        &mut self,
        image_index: usize,
        eye_position: crate::foundation::math::Vec3,
        outline_enabled: bool,
        background: [f32; 4],
    ) -> VulkanResult<()> {
        let device = self.ctx.device.clone();
        let command_buffer = self.command_buffers[image_index];

        let begin_info = vk::CommandBufferBeginInfo::builder();
        unsafe {
            device
                .begin_command_buffer(command_buffer, &begin_info)
                .map_err(device_call("vkBeginCommandBuffer"))?;
        }

        let clear_values = [
            // swapchain image is fully overwritten by the composition pass
            vk::ClearValue {
                color: vk::ClearColorValue {
                    float32: [0.0, 0.0, 0.0, 1.0],
                },
            },
            vk::ClearValue {
                color: vk::ClearColorValue {
                    float32: background,
                },
            },
            vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue {
                    depth: 1.0,
                    stencil: 0,
                },
            },
        ];

        let render_pass_info = vk::RenderPassBeginInfo::builder()
            .render_pass(self.render_pass)
            .framebuffer(self.framebuffers[image_index])
            .render_area(vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent: self.ctx.extent,
            })
            .clear_values(&clear_values);

        unsafe {
            device.cmd_begin_render_pass(
                command_buffer,
                &render_pass_info,
                vk::SubpassContents::INLINE,
            );
        }

        // ---- subpass 0: geometry ----
        self.geometry_pipeline.cmd_bind(&device, command_buffer);
        let geometry_layout = self.geometry_pipeline.layout();
        self.vp_uniform.cmd_bind(
            SetLayout::Camera.geometry_set_index(),
            image_index,
            command_buffer,
            geometry_layout,
        );
        self.light_uniform.cmd_bind(
            SetLayout::Light.geometry_set_index(),
            image_index,
            command_buffer,
            geometry_layout,
        );

        for (i, model) in self.models.iter().enumerate() {
            self.dynamic_color_uniform.cmd_bind(
                i,
                SetLayout::DynamicColor.geometry_set_index(),
                image_index,
                command_buffer,
                geometry_layout,
            );
            model.draw(command_buffer, geometry_layout, eye_position, true);
        }

        if outline_enabled {
            self.outline_pipeline.cmd_bind(&device, command_buffer);
            let outline_layout = self.outline_pipeline.layout();
            self.vp_uniform
                .cmd_bind(0, image_index, command_buffer, outline_layout);
            for model in &self.models {
                model.draw(command_buffer, outline_layout, eye_position, false);
            }
        }

        if let Some(skybox) = &self.skybox {
            self.skybox_pipeline.cmd_bind(&device, command_buffer);
            let skybox_layout = self.skybox_pipeline.layout();
            self.vp_uniform
                .cmd_bind(0, image_index, command_buffer, skybox_layout);
            skybox.cmd_draw(command_buffer, &self.skybox_pipeline);
        }

        // ---- subpass 1: composition ----
        unsafe {
            device.cmd_next_subpass(command_buffer, vk::SubpassContents::INLINE);
        }
        self.composition_pipeline.cmd_bind(&device, command_buffer);
        let composition_layout = self.composition_pipeline.layout();
        unsafe {
            device.cmd_bind_descriptor_sets(
                command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                composition_layout,
                0,
                &[self.input_sets[image_index]],
                &[],
            );
        }
        self.post_process_uniform
            .cmd_bind(1, image_index, command_buffer, composition_layout);
        unsafe {
            // full-screen triangle, no buffers
            device.cmd_draw(command_buffer, 3, 1, 0, 0);
        }

        if let Some(callback) = &mut self.gui_callback {
            callback(command_buffer);
        }

        unsafe {
            device.cmd_end_render_pass(command_buffer);
            device
                .end_command_buffer(command_buffer)
                .map_err(device_call("vkEndCommandBuffer"))?;
        }

        Ok(())
    }
}

impl Renderer for VulkanRenderer {
    fn draw(&mut self, camera: &dyn Camera) -> Result<(), RenderError> {
        let frame = self.current_frame;
        let fence = self.frame_sync[frame].in_flight;
        let image_available = self.frame_sync[frame].image_available;
        let render_finished = self.frame_sync[frame].render_finished;

        unsafe {
            self.ctx
                .device
                .wait_for_fences(&[fence], true, u64::MAX)
                .map_err(device_call("vkWaitForFences"))
                .map_err(RenderError::from)?;
            self.ctx
                .device
                .reset_fences(&[fence])
                .map_err(device_call("vkResetFences"))
                .map_err(RenderError::from)?;
        }

        // Models removed during the previous frame: their command buffer has
        // retired with the fence above, destruction is safe now
        for mut model in self.retired.drain() {
            model.cleanup();
        }

        let (image_index, _suboptimal) = unsafe {
            self.swapchain
                .loader()
                .acquire_next_image(
                    self.swapchain.handle(),
                    u64::MAX,
                    image_available,
                    vk::Fence::null(),
                )
                .map_err(device_call("vkAcquireNextImageKHR"))
                .map_err(RenderError::from)?
        };
        let image_index = image_index as usize;

        let (outline_enabled, background) = self.settings.lock().map_or(
            (false, [0.0, 0.0, 0.0, 1.0]),
            |settings| (settings.outline_enabled, settings.background_rgba()),
        );

        self.update_uniforms(image_index, camera)?;
        self.record_commands(image_index, camera.position(), outline_enabled, background)?;

        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let command_buffer = self.command_buffers[image_index];
        let submit_info = vk::SubmitInfo::builder()
            .wait_semaphores(std::slice::from_ref(&image_available))
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(std::slice::from_ref(&command_buffer))
            .signal_semaphores(std::slice::from_ref(&render_finished))
            .build();

        unsafe {
            self.ctx
                .device
                .queue_submit(self.ctx.graphics_queue, &[submit_info], fence)
                .map_err(device_call("vkQueueSubmit"))
                .map_err(RenderError::from)?;
        }

        let image_indices = [image_index as u32];
        let swapchains = [self.swapchain.handle()];
        let present_info = vk::PresentInfoKHR::builder()
            .wait_semaphores(std::slice::from_ref(&render_finished))
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        unsafe {
            self.swapchain
                .loader()
                .queue_present(self.presentation_queue, &present_info)
                .map_err(device_call("vkQueuePresentKHR"))
                .map_err(RenderError::from)?;
        }

        self.current_frame = (self.current_frame + 1) % MAX_FRAME_DRAWS;
        Ok(())
    }

    fn add_model_instance(&mut self, model_instance: &ModelInstance) -> bool {
        if self.contains_model(model_instance.id) {
            log::warn!(
                "model {} is already registered, ignoring add",
                model_instance.id
            );
            return false;
        }
        if self.models.len() >= self.max_objects {
            log::warn!(
                "model capacity {} reached, rejecting model {}",
                self.max_objects,
                model_instance.id
            );
            return false;
        }

        match GpuModel::new(
            &self.ctx,
            model_instance.id,
            model_instance.template(),
            &self.layouts,
            self.sampler,
        ) {
            Ok(mut model) => {
                model.set_transform(model_instance.transform_matrix());
                self.models.push(model);
                true
            }
            Err(e) => {
                log::error!("failed to build GPU model {}: {e}", model_instance.id);
                false
            }
        }
    }

    fn remove_model(&mut self, model_id: u32) -> bool {
        let Some(position) = self.model_position(model_id) else {
            return false;
        };
        let model = self.models.remove(position);
        // Ownership moves to the retire queue; actual destruction happens at
        // the start of the next draw, after the frame fence wait
        self.retired.retire(model);
        true
    }

    fn contains_model(&self, model_id: u32) -> bool {
        self.model_position(model_id).is_some()
    }

    fn update_model_transform(&mut self, model_id: u32, transform: Mat4) -> bool {
        match self.model_position(model_id) {
            Some(position) => {
                self.models[position].set_transform(transform);
                true
            }
            None => false,
        }
    }

    fn add_light_sources(&mut self, lights: &[Light]) -> bool {
        if !lighting::try_add_lights(&mut self.lights, lights) {
            log::warn!(
                "light capacity {MAX_LIGHT_SOURCES} would be exceeded, rejecting {} lights",
                lights.len()
            );
            return false;
        }
        true
    }

    fn remove_light_sources(&mut self, light_ids: &[u32]) -> bool {
        let mut all_found = true;
        for id in light_ids {
            match self.lights.iter().position(|l| l.id == *id) {
                Some(position) => {
                    self.lights.remove(position);
                }
                None => all_found = false,
            }
        }
        all_found
    }

    fn set_skybox(&mut self, cubemap: &Cubemap) -> bool {
        match Skybox::new(&self.ctx, cubemap, &self.layouts, self.sampler) {
            Ok(skybox) => {
                if let Some(mut old) = self.skybox.take() {
                    // Replacing mid-run: the old cubemap may be referenced by
                    // an in-flight frame
                    unsafe {
                        let _ = self.ctx.device.device_wait_idle();
                    }
                    old.cleanup();
                }
                self.skybox = Some(skybox);
                true
            }
            Err(e) => {
                log::error!("failed to build skybox: {e}");
                false
            }
        }
    }

    fn cleanup(&mut self) {
        if self.cleaned_up {
            return;
        }
        self.cleaned_up = true;

        let device = self.ctx.device.clone();

        // Nothing may be destroyed while the GPU still reads it
        unsafe {
            let _ = device.device_wait_idle();
        }

        self.gui_callback = None;
        unsafe {
            device.destroy_descriptor_pool(self.gui_pool, None);
        }

        if let Some(mut skybox) = self.skybox.take() {
            skybox.cleanup();
        }
        self.skybox_pipeline.cleanup(&device);

        for mut model in self.retired.drain() {
            model.cleanup();
        }
        for model in &mut self.models {
            model.cleanup();
        }
        self.models.clear();

        unsafe {
            device.destroy_descriptor_pool(self.input_pool, None);
            device.destroy_sampler(self.sampler, None);
        }

        for image in &mut self.color_images {
            image.cleanup(&device);
        }
        self.color_images.clear();
        for image in &mut self.depth_images {
            image.cleanup(&device);
        }
        self.depth_images.clear();

        self.vp_uniform.cleanup();
        self.light_uniform.cleanup();
        self.post_process_uniform.cleanup();
        self.dynamic_color_uniform.cleanup();

        self.layouts.cleanup();
        self.shaders.cleanup();

        unsafe {
            device.destroy_descriptor_pool(self.uniform_pool, None);
            device.destroy_descriptor_pool(self.dynamic_pool, None);

            for sync in self.frame_sync.drain(..) {
                device.destroy_semaphore(sync.render_finished, None);
                device.destroy_semaphore(sync.image_available, None);
                device.destroy_fence(sync.in_flight, None);
            }

            device.destroy_command_pool(self.ctx.command_pool, None);

            for framebuffer in self.framebuffers.drain(..) {
                device.destroy_framebuffer(framebuffer, None);
            }
        }

        self.composition_pipeline.cleanup(&device);
        self.outline_pipeline.cleanup(&device);
        self.geometry_pipeline.cleanup(&device);

        unsafe {
            device.destroy_render_pass(self.render_pass, None);
        }

        self.swapchain.cleanup(&device);

        unsafe {
            self.surface_loader.destroy_surface(self.surface, None);

            #[cfg(debug_assertions)]
            if let Some((loader, messenger)) = self.debug.take() {
                loader.destroy_debug_utils_messenger(messenger, None);
            }

            device.destroy_device(None);
            self.instance.destroy_instance(None);
        }

        log::info!("Vulkan renderer cleaned up");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retire_queue_holds_items_until_drained() {
        let mut queue: RetireQueue<u32> = RetireQueue::new();
        queue.retire(1);
        queue.retire(2);
        assert_eq!(queue.len(), 2);

        let drained: Vec<u32> = queue.drain().collect();
        assert_eq!(drained, vec![1, 2]);
        assert_eq!(queue.len(), 0);
    }

    #[test]
    fn retire_queue_preserves_fifo_order_across_frames() {
        let mut queue: RetireQueue<&str> = RetireQueue::new();
        queue.retire("frame-k");
        let first: Vec<&str> = queue.drain().collect();
        queue.retire("frame-k+1");
        let second: Vec<&str> = queue.drain().collect();
        assert_eq!(first, vec!["frame-k"]);
        assert_eq!(second, vec!["frame-k+1"]);
    }
}
