//! Generic mesh geometry from an imported model

use crate::assets::AssetError;
use crate::foundation::math::{Vec2, Vec3};

/// Offset applied globally to vertex indices at import time.
///
/// Example: with an offset of 1, index 1 points at vertex 0. The GPU mesh
/// compensates at draw time with an equal negative base-vertex offset, so
/// the two always cancel out.
pub const VERTEX_INDEX_OFFSET: u32 = 1;

/// Immutable geometry of one mesh from an imported model.
///
/// Positions, normals and texture coordinates are parallel streams of equal
/// length. Indices carry [`VERTEX_INDEX_OFFSET`] applied uniformly; they are
/// never stored 0-based.
#[derive(Debug, Clone)]
pub struct Mesh {
    /// Mesh id, unique within its model
    pub id: u32,
    /// Mesh name from the source file
    pub name: String,
    positions: Vec<Vec3>,
    normals: Vec<Vec3>,
    tex_coords: Vec<Vec2>,
    indices: Vec<u32>,
}

impl Mesh {
    /// Create a mesh from importer output.
    ///
    /// `indices` are expected 0-based as read from the source file; the
    /// global index-origin offset is applied here, once.
    pub fn new(
        id: u32,
        name: impl Into<String>,
        positions: Vec<Vec3>,
        normals: Vec<Vec3>,
        tex_coords: Vec<Vec2>,
        indices: Vec<u32>,
    ) -> Result<Self, AssetError> {
        let name = name.into();
        if positions.len() != normals.len() || positions.len() != tex_coords.len() {
            return Err(AssetError::MismatchedAttributes { name });
        }

        let indices = indices
            .into_iter()
            .map(|i| i + VERTEX_INDEX_OFFSET)
            .collect();

        Ok(Self {
            id,
            name,
            positions,
            normals,
            tex_coords,
            indices,
        })
    }

    /// Vertex positions
    pub fn positions(&self) -> &[Vec3] {
        &self.positions
    }

    /// Vertex normals
    pub fn normals(&self) -> &[Vec3] {
        &self.normals
    }

    /// Vertex texture coordinates
    pub fn tex_coords(&self) -> &[Vec2] {
        &self.tex_coords
    }

    /// Triangle indices, already shifted by [`VERTEX_INDEX_OFFSET`]
    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    /// Number of vertices
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad() -> Mesh {
        Mesh::new(
            0,
            "quad",
            vec![
                Vec3::new(-1.0, -1.0, 0.0),
                Vec3::new(1.0, -1.0, 0.0),
                Vec3::new(1.0, 1.0, 0.0),
                Vec3::new(-1.0, 1.0, 0.0),
            ],
            vec![Vec3::z(); 4],
            vec![
                Vec2::new(0.0, 1.0),
                Vec2::new(1.0, 1.0),
                Vec2::new(1.0, 0.0),
                Vec2::new(0.0, 0.0),
            ],
            vec![0, 1, 2, 0, 2, 3],
        )
        .unwrap()
    }

    #[test]
    fn index_offset_is_applied_uniformly() {
        let mesh = quad();
        assert_eq!(mesh.indices(), &[1, 2, 3, 1, 3, 4]);
    }

    #[test]
    fn index_offset_cancels_with_base_vertex_compensation() {
        // The draw call compensates with base_vertex = -VERTEX_INDEX_OFFSET,
        // so every stored index must map back onto the original vertex range.
        let mesh = quad();
        for (stored, original) in mesh.indices().iter().zip([0u32, 1, 2, 0, 2, 3]) {
            let resolved = stored
                .checked_sub(VERTEX_INDEX_OFFSET)
                .expect("stored index below offset");
            assert_eq!(resolved, original);
            assert!((resolved as usize) < mesh.vertex_count());
        }
    }

    #[test]
    fn mismatched_streams_are_rejected() {
        let err = Mesh::new(
            0,
            "broken",
            vec![Vec3::zeros(); 3],
            vec![Vec3::z(); 2],
            vec![Vec2::zeros(); 3],
            vec![0, 1, 2],
        );
        assert!(matches!(err, Err(AssetError::MismatchedAttributes { .. })));
    }
}
