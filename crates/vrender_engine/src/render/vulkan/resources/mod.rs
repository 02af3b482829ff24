//! GPU-resident resources built from generic asset data
//!
//! Each type owns its device allocations and exposes an explicit `cleanup`;
//! nothing here is freed by scope exit, because destruction must be
//! sequenced against in-flight command buffers by the frame orchestrator.

mod cubemap;
mod material;
mod mesh;
mod model;
mod texture;

pub use cubemap::{CubemapSamplerSet, GpuCubemap};
pub use material::GpuMaterial;
pub use mesh::{GpuMesh, SimpleMesh, VERTEX_FILL_COLOR};
pub use model::{GpuModel, NO_MATERIAL_INDEX};
pub use texture::GpuTexture;
