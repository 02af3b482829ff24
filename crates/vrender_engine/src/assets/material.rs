//! Generic imported material

use std::sync::Arc;

use crate::assets::TextureData;
use crate::foundation::math::Vec3;

/// Material properties of one imported mesh.
///
/// A color fallback and its corresponding texture may both be stored; the
/// texture wins at shading time when present. Texture payloads are shared
/// (`Arc`) so a texture referenced by several materials is decoded and held
/// in memory once.
#[derive(Debug, Clone)]
pub struct Material {
    /// Material name from the source file
    pub name: String,

    /// Specular shininess exponent
    pub shininess: f32,
    /// Opacity in `[0, 1]`
    pub opacity: f32,

    /// Ambient color fallback
    pub ambient_color: Vec3,
    /// Diffuse color fallback
    pub diffuse_color: Vec3,
    /// Specular color fallback
    pub specular_color: Vec3,

    /// Ambient occlusion texture
    pub ambient_texture: Option<Arc<TextureData>>,
    /// Diffuse/albedo texture
    pub diffuse_texture: Option<Arc<TextureData>>,
    /// Specular texture
    pub specular_texture: Option<Arc<TextureData>>,
    /// Opacity map
    pub opacity_map: Option<Arc<TextureData>>,
    /// Emission map (stored, not yet used by shading)
    pub emission_map: Option<Arc<TextureData>>,
    /// Normal map (stored, not yet used by shading)
    pub normal_map: Option<Arc<TextureData>>,
}

impl Material {
    /// Create a material with neutral defaults
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            shininess: 32.0,
            opacity: 1.0,
            ambient_color: Vec3::zeros(),
            diffuse_color: Vec3::new(1.0, 1.0, 1.0),
            specular_color: Vec3::zeros(),
            ambient_texture: None,
            diffuse_texture: None,
            specular_texture: None,
            opacity_map: None,
            emission_map: None,
            normal_map: None,
        }
    }

    /// Number of textures the shading model consumes (ambient, diffuse,
    /// specular, opacity). Emission and normal maps are not counted.
    pub fn shading_texture_count(&self) -> u32 {
        [
            &self.ambient_texture,
            &self.diffuse_texture,
            &self.specular_texture,
            &self.opacity_map,
        ]
        .iter()
        .filter(|t| t.is_some())
        .count() as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shading_texture_count_ignores_emission_and_normal() {
        let tex = Arc::new(TextureData::new("t", 1, 1, vec![0; 4]).unwrap());
        let mut material = Material::new("m");
        material.diffuse_texture = Some(tex.clone());
        material.emission_map = Some(tex.clone());
        material.normal_map = Some(tex);
        assert_eq!(material.shading_texture_count(), 1);
    }
}
