//! Decoded texture and cubemap payloads

use std::collections::HashMap;

use crate::assets::AssetError;

/// An already-decoded RGBA8 image payload.
///
/// Decoding happens in an external importer; the engine only ever sees raw
/// 4-channel pixel data.
#[derive(Debug, Clone)]
pub struct TextureData {
    /// Texture name (usually the source file stem)
    pub name: String,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    pixels: Vec<u8>,
}

impl TextureData {
    /// Wrap a decoded RGBA8 payload, validating its size.
    pub fn new(
        name: impl Into<String>,
        width: u32,
        height: u32,
        pixels: Vec<u8>,
    ) -> Result<Self, AssetError> {
        let name = name.into();
        if pixels.len() != (width as usize) * (height as usize) * 4 {
            return Err(AssetError::InvalidTexturePayload {
                name,
                width,
                height,
            });
        }
        Ok(Self {
            name,
            width,
            height,
            pixels,
        })
    }

    /// Raw RGBA8 pixel bytes
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Payload size in bytes
    pub fn byte_size(&self) -> usize {
        self.pixels.len()
    }
}

/// One face of a cubemap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CubemapFace {
    /// +X
    Right,
    /// -X
    Left,
    /// +Y
    Top,
    /// -Y
    Bottom,
    /// +Z
    Front,
    /// -Z
    Back,
}

impl CubemapFace {
    /// All six faces in GPU layer-upload order.
    ///
    /// This order matches the layer order of a Vulkan cube image
    /// (+X, -X, +Y, -Y, +Z, -Z) and must not change independently of it.
    pub const UPLOAD_ORDER: [Self; 6] = [
        Self::Right,
        Self::Left,
        Self::Top,
        Self::Bottom,
        Self::Front,
        Self::Back,
    ];

    /// Face name as it appears in asset file names
    pub fn name(self) -> &'static str {
        match self {
            Self::Right => "right",
            Self::Left => "left",
            Self::Top => "top",
            Self::Bottom => "bottom",
            Self::Front => "front",
            Self::Back => "back",
        }
    }
}

/// A complete six-face cubemap.
///
/// Construction is the validation point: a face map with missing or
/// duplicate faces, or faces of differing extent, is rejected here, before
/// any GPU resource is allocated for the asset.
#[derive(Debug, Clone)]
pub struct Cubemap {
    faces: [TextureData; 6],
}

impl Cubemap {
    /// Build a cubemap from named faces.
    ///
    /// The input is a list rather than a map so duplicate names coming from
    /// the importer are detected instead of silently collapsed.
    pub fn from_faces(named: Vec<(CubemapFace, TextureData)>) -> Result<Self, AssetError> {
        let mut by_face: HashMap<CubemapFace, TextureData> = HashMap::new();
        for (face, data) in named {
            if by_face.insert(face, data).is_some() {
                return Err(AssetError::DuplicateCubemapFace(face.name()));
            }
        }

        for face in CubemapFace::UPLOAD_ORDER {
            if !by_face.contains_key(&face) {
                return Err(AssetError::MissingCubemapFace(face.name()));
            }
        }

        let faces = CubemapFace::UPLOAD_ORDER
            .map(|face| by_face.remove(&face).expect("presence checked above"));

        let (w, h) = (faces[0].width, faces[0].height);
        if faces.iter().any(|f| f.width != w || f.height != h) {
            return Err(AssetError::MismatchedCubemapExtent);
        }

        Ok(Self { faces })
    }

    /// Faces in GPU layer-upload order
    pub fn faces(&self) -> &[TextureData; 6] {
        &self.faces
    }

    /// Extent shared by every face
    pub fn face_extent(&self) -> (u32, u32) {
        (self.faces[0].width, self.faces[0].height)
    }

    /// Total byte size of all six faces
    pub fn total_byte_size(&self) -> usize {
        self.faces.iter().map(TextureData::byte_size).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn face(name: &str) -> TextureData {
        TextureData::new(name, 2, 2, vec![0u8; 16]).unwrap()
    }

    fn all_faces() -> Vec<(CubemapFace, TextureData)> {
        CubemapFace::UPLOAD_ORDER
            .into_iter()
            .map(|f| (f, face(f.name())))
            .collect()
    }

    #[test]
    fn complete_cubemap_is_accepted() {
        let cubemap = Cubemap::from_faces(all_faces()).unwrap();
        assert_eq!(cubemap.face_extent(), (2, 2));
        assert_eq!(cubemap.total_byte_size(), 6 * 16);
    }

    #[test]
    fn missing_face_is_rejected() {
        let mut faces = all_faces();
        faces.retain(|(f, _)| *f != CubemapFace::Top);
        assert!(matches!(
            Cubemap::from_faces(faces),
            Err(AssetError::MissingCubemapFace("top"))
        ));
    }

    #[test]
    fn duplicate_face_is_rejected() {
        let mut faces = all_faces();
        faces.push((CubemapFace::Left, face("left")));
        assert!(matches!(
            Cubemap::from_faces(faces),
            Err(AssetError::DuplicateCubemapFace("left"))
        ));
    }

    #[test]
    fn mismatched_extent_is_rejected() {
        let mut faces = all_faces();
        faces[3].1 = TextureData::new("bottom", 4, 4, vec![0u8; 64]).unwrap();
        assert!(matches!(
            Cubemap::from_faces(faces),
            Err(AssetError::MismatchedCubemapExtent)
        ));
    }

    #[test]
    fn texture_payload_size_is_validated() {
        assert!(matches!(
            TextureData::new("bad", 2, 2, vec![0u8; 15]),
            Err(AssetError::InvalidTexturePayload { .. })
        ));
    }

    #[test]
    fn faces_come_back_in_upload_order() {
        let cubemap = Cubemap::from_faces(all_faces()).unwrap();
        let names: Vec<&str> = cubemap.faces.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["right", "left", "top", "bottom", "front", "back"]);
    }
}
