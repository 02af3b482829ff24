//! Backend-agnostic asset data
//!
//! Plain in-memory geometry, material and texture data as produced by an
//! external importer. Nothing in this module performs file I/O or touches
//! the GPU; the renderer backends translate these types into device
//! resources.

mod material;
mod mesh;
mod model;
mod texture;

pub use material::Material;
pub use mesh::{Mesh, VERTEX_INDEX_OFFSET};
pub use model::Model;
pub use texture::{Cubemap, CubemapFace, TextureData};

/// Asset-layer errors
#[derive(thiserror::Error, Debug)]
pub enum AssetError {
    /// Mesh attribute streams disagree in length
    #[error("mesh '{name}': attribute streams have mismatched lengths")]
    MismatchedAttributes {
        /// Mesh name
        name: String,
    },

    /// A cubemap face is missing
    #[error("cubemap is missing face '{0}'")]
    MissingCubemapFace(&'static str),

    /// A cubemap face was supplied more than once
    #[error("cubemap face '{0}' supplied more than once")]
    DuplicateCubemapFace(&'static str),

    /// Cubemap faces differ in extent
    #[error("cubemap faces must share one extent")]
    MismatchedCubemapExtent,

    /// A texture payload does not match its declared dimensions
    #[error("texture '{name}': payload size does not match {width}x{height} RGBA8")]
    InvalidTexturePayload {
        /// Texture name
        name: String,
        /// Declared width in pixels
        width: u32,
        /// Declared height in pixels
        height: u32,
    },
}
