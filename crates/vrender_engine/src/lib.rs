//! # vrender engine
//!
//! A 3D model viewer engine built around an explicit Vulkan backend.
//!
//! The heart of the crate is [`render::vulkan::VulkanRenderer`]: it owns the
//! Vulkan instance, device, swapchain and a two-subpass render graph
//! (geometry + outline/skybox, then post-process composition), manages GPU
//! resource lifetimes by hand, and drives one frame per [`draw`] call.
//!
//! [`draw`]: render::Renderer::draw
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use vrender_engine::render::window::WindowHandle;
//! use vrender_engine::render::settings::RenderSettings;
//! use vrender_engine::render::vulkan::{RendererConfig, VulkanRenderer};
//! use std::sync::Arc;
//!
//! let settings = Arc::new(std::sync::Mutex::new(RenderSettings::default()));
//! let mut window = WindowHandle::new(1280, 720, "vrender").expect("window creation");
//! let mut renderer = VulkanRenderer::init(
//!     &mut window,
//!     RendererConfig::default(),
//!     settings,
//! ).expect("renderer initialization");
//! ```

pub mod assets;
pub mod config;
pub mod foundation;
pub mod render;
pub mod scene;

pub use render::Renderer;
