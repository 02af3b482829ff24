//! Rendering subsystem
//!
//! [`Renderer`] is the narrow contract every backend implements; the
//! explicit Vulkan backend in [`vulkan`] is the primary one. Settings,
//! lighting and camera types are backend-agnostic.

pub mod camera;
pub mod lighting;
pub mod settings;
pub mod vulkan;
pub mod window;

pub use camera::{Camera, OrbitCamera};
pub use lighting::{Light, LightKind, MAX_LIGHT_SOURCES};
pub use settings::{BackendApi, RenderSettings};

use crate::assets::Cubemap;
use crate::foundation::math::Mat4;
use crate::scene::ModelInstance;

/// Rendering errors surfaced through the backend-agnostic contract
#[derive(thiserror::Error, Debug)]
pub enum RenderError {
    /// The Vulkan backend failed
    #[error(transparent)]
    Vulkan(#[from] vulkan::VulkanError),
}

/// The contract between the application/editor layer and a render backend.
///
/// Mutating calls return `true` on success and `false` when the request
/// could not be applied (duplicate model id, unknown id, light capacity
/// exceeded). All methods must be called from the single render thread.
pub trait Renderer {
    /// Render one frame using the camera state polled at this call
    fn draw(&mut self, camera: &dyn Camera) -> Result<(), RenderError>;

    /// Register a model instance. Fails on a duplicate instance id.
    fn add_model_instance(&mut self, instance: &ModelInstance) -> bool;

    /// Unregister a model. The GPU resources are retired, not destroyed
    /// immediately; fails when the id is not registered.
    fn remove_model(&mut self, model_id: u32) -> bool;

    /// Whether a model id is currently registered
    fn contains_model(&self, model_id: u32) -> bool;

    /// Replace the transform of a registered model
    fn update_model_transform(&mut self, model_id: u32, transform: Mat4) -> bool;

    /// Add light sources; rejected wholesale if capacity would be exceeded
    fn add_light_sources(&mut self, lights: &[Light]) -> bool;

    /// Remove lights by id; `true` if every id was found
    fn remove_light_sources(&mut self, light_ids: &[u32]) -> bool;

    /// Install a skybox from a validated cubemap
    fn set_skybox(&mut self, cubemap: &Cubemap) -> bool;

    /// Release every GPU resource. Must be the last call on the renderer.
    fn cleanup(&mut self);
}
