//! Math utilities and types
//!
//! Provides fundamental math types for 3D graphics, re-exported from
//! nalgebra under short aliases.

pub use nalgebra::{Matrix3, Matrix4, Quaternion, Unit, Vector2, Vector3, Vector4};

/// 2D vector type
pub type Vec2 = Vector2<f32>;

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 4D vector type
pub type Vec4 = Vector4<f32>;

/// 3x3 matrix type
pub type Mat3 = Matrix3<f32>;

/// 4x4 matrix type
pub type Mat4 = Matrix4<f32>;

/// Quaternion type for rotations
pub type Quat = Unit<Quaternion<f32>>;

/// Compose a transform matrix from position, Euler rotation (degrees) and
/// scale.
///
/// The composition order is fixed for the whole engine: scale, then
/// rotation about X, Y, Z in that order, then translation. Scene instances
/// and the renderer both rely on this order.
pub fn compose_transform(position: Vec3, rotation_degrees: Vec3, scale: Vec3) -> Mat4 {
    let t = Mat4::new_translation(&position);
    let rx = Mat4::from_axis_angle(&Vec3::x_axis(), rotation_degrees.x.to_radians());
    let ry = Mat4::from_axis_angle(&Vec3::y_axis(), rotation_degrees.y.to_radians());
    let rz = Mat4::from_axis_angle(&Vec3::z_axis(), rotation_degrees.z.to_radians());
    let s = Mat4::new_nonuniform_scaling(&scale);
    t * rz * ry * rx * s
}

/// Normal matrix for transforming direction vectors into world space.
///
/// Falls back to the model matrix itself if it is not invertible
/// (degenerate scale), which only happens with zero-scaled instances.
pub fn normal_matrix(model: &Mat4) -> Mat4 {
    model
        .try_inverse()
        .map_or(*model, |inv| inv.transpose())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn compose_transform_applies_scale_before_rotation_and_translation() {
        // Unit X scaled by 2, rotated 90 degrees around Z, moved to (0, 0, 5):
        // scale first -> (2, 0, 0); rotate Z -> (0, 2, 0); translate -> (0, 2, 5).
        let m = compose_transform(
            Vec3::new(0.0, 0.0, 5.0),
            Vec3::new(0.0, 0.0, 90.0),
            Vec3::new(2.0, 2.0, 2.0),
        );
        let p = m.transform_point(&nalgebra::Point3::new(1.0, 0.0, 0.0));
        assert_relative_eq!(p.x, 0.0, epsilon = 1e-5);
        assert_relative_eq!(p.y, 2.0, epsilon = 1e-5);
        assert_relative_eq!(p.z, 5.0, epsilon = 1e-5);
    }

    #[test]
    fn compose_transform_rotation_order_is_x_then_y_then_z() {
        let a = compose_transform(
            Vec3::zeros(),
            Vec3::new(90.0, 90.0, 0.0),
            Vec3::new(1.0, 1.0, 1.0),
        );
        let rx = Mat4::from_axis_angle(&Vec3::x_axis(), 90f32.to_radians());
        let ry = Mat4::from_axis_angle(&Vec3::y_axis(), 90f32.to_radians());
        let expected = ry * rx;
        assert_relative_eq!(a, expected, epsilon = 1e-5);
    }

    #[test]
    fn normal_matrix_is_inverse_transpose() {
        let m = compose_transform(
            Vec3::new(1.0, 2.0, 3.0),
            Vec3::new(0.0, 45.0, 0.0),
            Vec3::new(2.0, 1.0, 1.0),
        );
        let n = normal_matrix(&m);
        assert_relative_eq!(n, m.try_inverse().unwrap().transpose(), epsilon = 1e-5);
    }
}
