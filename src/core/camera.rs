//! Camera component and view/projection math

use crate::core::types::{Mat4, Quat, Vec3};

/// Projection parameters of a camera entity
///
/// Position and orientation come from the entity's `Transform`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraComponent {
    /// Vertical field of view in radians
    pub fov_y: f32,
    /// Aspect ratio (width / height)
    pub aspect: f32,
    /// Near clip plane
    pub near: f32,
    /// Far clip plane
    pub far: f32,
}

impl CameraComponent {
    pub fn new(fov_y_degrees: f32, aspect: f32) -> Self {
        Self {
            fov_y: fov_y_degrees.to_radians(),
            aspect,
            near: 0.1,
            far: 2000.0,
        }
    }

    /// Get projection matrix (camera to clip space)
    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov_y, self.aspect, self.near, self.far)
    }

    /// Update aspect ratio (call on window resize)
    pub fn set_aspect(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.aspect = width as f32 / height as f32;
        }
    }
}

impl Default for CameraComponent {
    fn default() -> Self {
        Self::new(60.0, 16.0 / 9.0)
    }
}

/// View matrix (world to camera space) for a camera at `position` with `rotation`
pub fn view_matrix(position: Vec3, rotation: Quat) -> Mat4 {
    let rotation_matrix = Mat4::from_quat(rotation.conjugate());
    let translation_matrix = Mat4::from_translation(-position);
    rotation_matrix * translation_matrix
}

/// Rotation that makes a camera at `position` look at `target`
pub fn look_at_rotation(position: Vec3, target: Vec3, up: Vec3) -> Quat {
    let forward = (target - position).normalize();
    let right = forward.cross(up).normalize();
    let up = right.cross(forward);
    Quat::from_mat3(&glam::Mat3::from_cols(right, up, -forward))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_view_matrix_translation() {
        let view = view_matrix(Vec3::new(10.0, 0.0, 0.0), Quat::IDENTITY);
        // World origin lands at (-10, 0, 0) in camera space
        let origin_in_camera = view.transform_point3(Vec3::ZERO);
        assert!((origin_in_camera.x - (-10.0)).abs() < 0.001);
    }

    #[test]
    fn test_look_at_points_forward() {
        let rotation = look_at_rotation(Vec3::ZERO, Vec3::new(0.0, 0.0, -10.0), Vec3::Y);
        let forward = rotation * -Vec3::Z;
        assert!((forward - Vec3::new(0.0, 0.0, -1.0)).length() < 0.001);
    }

    #[test]
    fn test_set_aspect_ignores_zero() {
        let mut camera = CameraComponent::default();
        camera.set_aspect(800, 400);
        assert!((camera.aspect - 2.0).abs() < 0.001);
        camera.set_aspect(0, 400);
        assert!((camera.aspect - 2.0).abs() < 0.001);
    }

    #[test]
    fn test_projection_inverse() {
        let camera = CameraComponent::default();
        let vp = camera.projection_matrix() * view_matrix(Vec3::new(1.0, 2.0, 3.0), Quat::IDENTITY);
        let identity = vp * vp.inverse();
        assert!((identity.w_axis.w - 1.0).abs() < 0.001);
    }
}
