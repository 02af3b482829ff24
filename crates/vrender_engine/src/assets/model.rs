//! Generic imported model

use std::path::PathBuf;

use crate::assets::{AssetError, Material, Mesh};

/// An imported model: parallel meshes and optional materials.
///
/// `materials[i]` belongs to `meshes[i]`; an element may be `None` when the
/// source assigned no material. Immutable once constructed and shared
/// read-only (`Arc<Model>`) by every renderer-side wrapper built from it.
#[derive(Debug)]
pub struct Model {
    /// Template id assigned by the importer
    pub id: u32,
    /// Model name
    pub name: String,
    /// Folder the model was imported from, for resolving relative texture paths
    pub folder: PathBuf,
    meshes: Vec<Mesh>,
    materials: Vec<Option<Material>>,
}

impl Model {
    /// Assemble a model from importer output
    pub fn new(
        id: u32,
        name: impl Into<String>,
        folder: impl Into<PathBuf>,
        meshes: Vec<Mesh>,
        materials: Vec<Option<Material>>,
    ) -> Result<Self, AssetError> {
        let name = name.into();
        if meshes.len() != materials.len() {
            return Err(AssetError::MismatchedAttributes { name });
        }
        Ok(Self {
            id,
            name,
            folder: folder.into(),
            meshes,
            materials,
        })
    }

    /// Meshes of this model
    pub fn meshes(&self) -> &[Mesh] {
        &self.meshes
    }

    /// Materials, 1:1 with [`meshes`](Self::meshes)
    pub fn materials(&self) -> &[Option<Material>] {
        &self.materials
    }

    /// Number of meshes
    pub fn mesh_count(&self) -> usize {
        self.meshes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::{Vec2, Vec3};

    #[test]
    fn mesh_material_parallelism_is_enforced() {
        let mesh = Mesh::new(
            0,
            "m",
            vec![Vec3::zeros()],
            vec![Vec3::z()],
            vec![Vec2::zeros()],
            vec![],
        )
        .unwrap();
        let err = Model::new(1, "model", "assets/model", vec![mesh], vec![]);
        assert!(matches!(err, Err(AssetError::MismatchedAttributes { .. })));
    }
}
