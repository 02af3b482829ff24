//! Camera contract and controllers
//!
//! The renderer polls a [`Camera`] once per frame for view/projection
//! matrices and the world-space eye position; how those are produced (orbit
//! controller, fly camera, scripted path) is the application's business.

use crate::foundation::math::{Mat4, Vec3};

/// Per-frame camera state consumed by the renderer
pub trait Camera {
    /// World-to-camera matrix
    fn view_matrix(&self) -> Mat4;
    /// Camera-to-clip matrix, already in Vulkan clip conventions
    fn projection_matrix(&self) -> Mat4;
    /// World-space eye position
    fn position(&self) -> Vec3;
}

/// Correction from OpenGL clip conventions (Y up, depth -1..1) to Vulkan
/// ones (Y down, depth 0..1), applied on top of a standard perspective.
#[rustfmt::skip]
fn vulkan_clip_correction() -> Mat4 {
    Mat4::new(
        1.0,  0.0, 0.0, 0.0,
        0.0, -1.0, 0.0, 0.0,
        0.0,  0.0, 0.5, 0.5,
        0.0,  0.0, 0.0, 1.0,
    )
}

/// A camera orbiting a target point.
#[derive(Debug, Clone)]
pub struct OrbitCamera {
    /// Point the camera orbits and looks at
    pub target: Vec3,
    /// Distance from the target
    pub radius: f32,
    /// Azimuth in degrees
    pub yaw: f32,
    /// Elevation in degrees, clamped shy of the poles
    pub pitch: f32,
    /// Vertical field of view in degrees
    pub fov: f32,
    /// Viewport aspect ratio
    pub aspect: f32,
    /// Near clip distance
    pub z_near: f32,
    /// Far clip distance
    pub z_far: f32,
}

impl OrbitCamera {
    /// Create an orbit camera at the given distance and aspect ratio
    pub fn new(target: Vec3, radius: f32, aspect: f32) -> Self {
        Self {
            target,
            radius,
            yaw: 0.0,
            pitch: 20.0,
            fov: 75.0,
            aspect,
            z_near: 0.1,
            z_far: 200.0,
        }
    }

    /// Rotate by mouse-style deltas in degrees
    pub fn orbit(&mut self, delta_yaw: f32, delta_pitch: f32) {
        self.yaw = (self.yaw + delta_yaw) % 360.0;
        self.pitch = (self.pitch + delta_pitch).clamp(-89.0, 89.0);
    }

    /// Move toward/away from the target
    pub fn zoom(&mut self, delta: f32) {
        self.radius = (self.radius - delta).max(0.2);
    }

    fn eye(&self) -> Vec3 {
        let yaw = self.yaw.to_radians();
        let pitch = self.pitch.to_radians();
        let offset = Vec3::new(
            self.radius * pitch.cos() * yaw.sin(),
            self.radius * pitch.sin(),
            self.radius * pitch.cos() * yaw.cos(),
        );
        self.target + offset
    }
}

impl Camera for OrbitCamera {
    fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(&self.eye().into(), &self.target.into(), &Vec3::y())
    }

    fn projection_matrix(&self) -> Mat4 {
        let perspective = Mat4::new_perspective(
            self.aspect,
            self.fov.to_radians(),
            self.z_near,
            self.z_far,
        );
        vulkan_clip_correction() * perspective
    }

    fn position(&self) -> Vec3 {
        self.eye()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn orbit_camera_keeps_distance_to_target() {
        let mut camera = OrbitCamera::new(Vec3::new(1.0, 0.0, -2.0), 5.0, 16.0 / 9.0);
        camera.orbit(123.0, 31.0);
        let distance = (camera.position() - camera.target).norm();
        assert_relative_eq!(distance, 5.0, epsilon = 1e-4);
    }

    #[test]
    fn pitch_is_clamped_away_from_poles() {
        let mut camera = OrbitCamera::new(Vec3::zeros(), 3.0, 1.0);
        camera.orbit(0.0, 500.0);
        assert!(camera.pitch <= 89.0);
    }

    #[test]
    fn projection_maps_near_plane_to_zero_depth() {
        let camera = OrbitCamera::new(Vec3::zeros(), 3.0, 1.0);
        let projection = camera.projection_matrix();
        let near_point = nalgebra::Point3::new(0.0, 0.0, -camera.z_near);
        let clip = projection.transform_point(&near_point);
        assert_relative_eq!(clip.z, 0.0, epsilon = 1e-4);
    }
}
