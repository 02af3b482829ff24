//! Light sources
//!
//! The application layer owns an ordered list of lights, capped at
//! [`MAX_LIGHT_SOURCES`]. Each frame the whole list is copied into a
//! fixed-capacity GPU-visible array; unused slots are zero-typed so the
//! shader treats them as absent.

use crate::foundation::math::Vec3;

/// Maximum number of simultaneously active light sources.
///
/// Sized into the light uniform's fixed GPU array; changing it requires a
/// matching change in the fragment shader.
pub const MAX_LIGHT_SOURCES: usize = 10;

/// Light source kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightKind {
    /// Infinitely-distant light with a direction only
    Directional,
    /// Omnidirectional light with a position and attenuation
    Point,
    /// Cone light with position, direction and cutoff angles
    Spot,
}

/// One light source, owned by the application layer.
///
/// Position applies to point and spot lights, direction to directional and
/// spot lights, cutoff angles to spot lights only; the remaining fields are
/// ignored per kind.
#[derive(Debug, Clone)]
pub struct Light {
    /// Application-assigned light id
    pub id: u32,
    /// Kind of the light
    pub kind: LightKind,
    /// RGB color
    pub color: Vec3,
    /// World-space position (point/spot)
    pub position: Vec3,
    /// World-space direction (directional/spot)
    pub direction: Vec3,
    /// Constant attenuation term
    pub constant: f32,
    /// Linear attenuation term
    pub linear: f32,
    /// Quadratic attenuation term
    pub quadratic: f32,
    /// Inner cutoff angle in degrees (spot)
    pub cutoff: f32,
    /// Outer cutoff angle in degrees (spot)
    pub outer_cutoff: f32,
}

impl Light {
    /// A white directional light
    pub fn directional(id: u32, direction: Vec3) -> Self {
        Self {
            id,
            kind: LightKind::Directional,
            color: Vec3::new(1.0, 1.0, 1.0),
            position: Vec3::zeros(),
            direction,
            constant: 1.0,
            linear: 0.0,
            quadratic: 0.0,
            cutoff: 0.0,
            outer_cutoff: 0.0,
        }
    }

    /// A point light with default attenuation
    pub fn point(id: u32, position: Vec3, color: Vec3) -> Self {
        Self {
            id,
            kind: LightKind::Point,
            color,
            position,
            direction: Vec3::zeros(),
            constant: 1.0,
            linear: 0.09,
            quadratic: 0.032,
            cutoff: 0.0,
            outer_cutoff: 0.0,
        }
    }

    /// A spot light with the given cutoff angles in degrees
    pub fn spot(id: u32, position: Vec3, direction: Vec3, cutoff: f32, outer_cutoff: f32) -> Self {
        Self {
            id,
            kind: LightKind::Spot,
            color: Vec3::new(1.0, 1.0, 1.0),
            position,
            direction,
            constant: 1.0,
            linear: 0.09,
            quadratic: 0.032,
            cutoff,
            outer_cutoff,
        }
    }
}

/// Append lights to the live list, all or nothing.
///
/// A partial insert would desync light ids between the caller and the
/// renderer, so the whole batch is rejected when it would exceed
/// [`MAX_LIGHT_SOURCES`]; the existing list is left untouched.
pub fn try_add_lights(lights: &mut Vec<Light>, new_lights: &[Light]) -> bool {
    if lights.len() + new_lights.len() > MAX_LIGHT_SOURCES {
        return false;
    }
    lights.extend_from_slice(new_lights);
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn directional(id: u32) -> Light {
        Light::directional(id, Vec3::new(0.0, -1.0, 0.0))
    }

    #[test]
    fn adding_past_capacity_is_rejected_without_partial_insert() {
        let mut lights: Vec<Light> = (0..MAX_LIGHT_SOURCES as u32).map(directional).collect();
        assert_eq!(lights.len(), MAX_LIGHT_SOURCES);

        let rejected = try_add_lights(&mut lights, &[directional(99)]);
        assert!(!rejected);
        assert_eq!(lights.len(), MAX_LIGHT_SOURCES);
        assert!(lights.iter().all(|l| l.id != 99));
    }

    #[test]
    fn batch_exceeding_capacity_leaves_list_unchanged() {
        let mut lights: Vec<Light> = (0..8u32).map(directional).collect();
        let batch: Vec<Light> = (10..13u32).map(directional).collect();

        assert!(!try_add_lights(&mut lights, &batch));
        assert_eq!(lights.len(), 8);

        // a batch that fits goes in whole
        assert!(try_add_lights(&mut lights, &batch[..2]));
        assert_eq!(lights.len(), 10);
    }
}
