//! GPU-visible uniform and push-constant layouts
//!
//! Every struct here mirrors a block declared in the shaders; layouts follow
//! std140, hence the explicit alignment and padding fields.

use crate::foundation::math::{Mat4, Vec4};
use crate::render::lighting::{Light, LightKind, MAX_LIGHT_SOURCES};

/// Camera matrices and eye position, bound once per frame
#[repr(C, align(16))]
#[derive(Debug, Clone, Copy)]
pub struct UboViewProjection {
    /// World-to-camera matrix
    pub view: Mat4,
    /// Camera-to-clip matrix
    pub projection: Mat4,
}

/// One light slot in the fixed GPU array.
///
/// Field order differs from the generic [`Light`] to satisfy std140 with
/// the least padding. Position and direction are world-space; cutoff angles
/// are stored as cosines so the shader compares dot products directly.
#[repr(C, align(16))]
#[derive(Debug, Clone, Copy)]
pub struct UboLight {
    /// RGB color, w unused
    pub color: Vec4,
    /// World position, w = 1
    pub position: Vec4,
    /// World direction, w = 0
    pub direction: Vec4,
    /// 0 none, 1 directional, 2 point, 3 spot
    pub kind: u32,
    /// Constant attenuation
    pub constant: f32,
    /// Linear attenuation
    pub linear: f32,
    /// Quadratic attenuation
    pub quadratic: f32,
    /// Cosine of the inner cutoff angle
    pub cutoff: f32,
    /// Cosine of the outer cutoff angle
    pub outer_cutoff: f32,
    /// std140 tail padding
    pub _padding: [f32; 2],
}

impl UboLight {
    /// The zero-typed slot the shader treats as absent
    pub fn absent() -> Self {
        Self {
            color: Vec4::zeros(),
            position: Vec4::zeros(),
            direction: Vec4::zeros(),
            kind: 0,
            constant: 0.0,
            linear: 0.0,
            quadratic: 0.0,
            cutoff: 0.0,
            outer_cutoff: 0.0,
            _padding: [0.0; 2],
        }
    }
}

impl From<&Light> for UboLight {
    fn from(light: &Light) -> Self {
        let kind = match light.kind {
            LightKind::Directional => 1,
            LightKind::Point => 2,
            LightKind::Spot => 3,
        };
        Self {
            color: Vec4::new(light.color.x, light.color.y, light.color.z, 0.0),
            position: Vec4::new(light.position.x, light.position.y, light.position.z, 1.0),
            direction: Vec4::new(light.direction.x, light.direction.y, light.direction.z, 0.0),
            kind,
            constant: light.constant,
            linear: light.linear,
            quadratic: light.quadratic,
            cutoff: light.cutoff.to_radians().cos(),
            outer_cutoff: light.outer_cutoff.to_radians().cos(),
            _padding: [0.0; 2],
        }
    }
}

/// The whole light array, copied wholesale each frame
#[repr(C, align(16))]
#[derive(Debug, Clone, Copy)]
pub struct UboLightArray {
    /// Fixed-capacity slots; unused entries are zero-typed
    pub lights: [UboLight; MAX_LIGHT_SOURCES],
}

impl Default for UboLightArray {
    fn default() -> Self {
        Self {
            lights: [UboLight::absent(); MAX_LIGHT_SOURCES],
        }
    }
}

impl UboLightArray {
    /// Fill the array from the live light list; slots past `lights.len()`
    /// are zero-typed.
    pub fn fill_from(&mut self, lights: &[Light]) {
        for (i, slot) in self.lights.iter_mut().enumerate() {
            *slot = lights.get(i).map_or_else(UboLight::absent, UboLight::from);
        }
    }
}

/// Per-instance color, addressed through a dynamic offset
#[repr(C, align(16))]
#[derive(Debug, Clone, Copy)]
pub struct UboDynamicColor {
    /// RGBA tint
    pub color: Vec4,
}

/// Material scalar/color block, uploaded once at material creation.
///
/// The `w` component of each color carries the matching texture-present
/// flag, so the shader picks texture over fallback without extra uniforms.
#[repr(C, align(16))]
#[derive(Debug, Clone, Copy)]
pub struct UboMaterial {
    /// Ambient fallback; w = ambient texture present
    pub ambient: Vec4,
    /// Diffuse fallback; w = diffuse texture present
    pub diffuse: Vec4,
    /// Specular fallback; w = specular texture present
    pub specular: Vec4,
    /// x shininess, y opacity, z = opacity map present, w unused
    pub params: Vec4,
}

/// Composition-subpass feature block
#[repr(C, align(16))]
#[derive(Debug, Clone, Copy)]
pub struct UboPostProcessFeatures {
    /// Gamma correction factor
    pub gamma: f32,
}

/// Per-mesh push constant block for the geometry and outline pipelines
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct PushConstantData {
    /// Model (world) matrix
    pub model: Mat4,
    /// Inverse-transpose of the model matrix
    pub normal_matrix: Mat4,
    /// Camera world position, w unused
    pub eye_position: Vec4,
}

impl PushConstantData {
    /// Byte view for `cmd_push_constants`
    pub fn as_bytes(&self) -> &[u8] {
        // repr(C) Copy struct with no interior padding requirements beyond f32
        unsafe {
            std::slice::from_raw_parts(
                (self as *const Self).cast::<u8>(),
                std::mem::size_of::<Self>(),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Vec3;

    #[test]
    fn light_slot_matches_std140_size() {
        // 3 vec4 + 6 scalars + 2 padding = 48 + 32 = 80, rounded to 16
        assert_eq!(std::mem::size_of::<UboLight>(), 80);
        assert_eq!(
            std::mem::size_of::<UboLightArray>(),
            80 * MAX_LIGHT_SOURCES
        );
    }

    #[test]
    fn unused_light_slots_are_zero_typed() {
        let lights = vec![Light::directional(0, Vec3::new(0.0, -1.0, 0.0))];
        let mut array = UboLightArray::default();
        array.fill_from(&lights);
        assert_eq!(array.lights[0].kind, 1);
        for slot in &array.lights[1..] {
            assert_eq!(slot.kind, 0);
        }
    }

    #[test]
    fn spot_cutoffs_are_stored_as_cosines() {
        let light = Light::spot(
            0,
            Vec3::zeros(),
            Vec3::new(0.0, -1.0, 0.0),
            12.5,
            17.5,
        );
        let slot = UboLight::from(&light);
        approx::assert_relative_eq!(slot.cutoff, 12.5f32.to_radians().cos());
        approx::assert_relative_eq!(slot.outer_cutoff, 17.5f32.to_radians().cos());
    }

    #[test]
    fn push_constant_block_is_two_matrices_and_a_vector() {
        assert_eq!(std::mem::size_of::<PushConstantData>(), 64 + 64 + 16);
    }
}
