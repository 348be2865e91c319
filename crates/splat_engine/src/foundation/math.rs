//! Math utilities and types
//!
//! nalgebra aliases plus the handful of projection helpers the renderer needs.

pub use nalgebra::{
    Vector2, Vector3, Vector4,
    Matrix3, Matrix4,
    Quaternion,
    Unit,
};

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

/// Math constants
pub mod constants {
    /// Pi constant
    pub const PI: f32 = std::f32::consts::PI;

    /// Degrees to radians conversion factor
    pub const DEG_TO_RAD: f32 = PI / 180.0;

    /// Radians to degrees conversion factor
    pub const RAD_TO_DEG: f32 = 180.0 / PI;
}

/// Math utility functions
pub mod utils {
    use super::constants;

    /// Convert degrees to radians
    pub fn deg_to_rad(degrees: f32) -> f32 {
        degrees * constants::DEG_TO_RAD
    }

    /// Convert radians to degrees
    pub fn rad_to_deg(radians: f32) -> f32 {
        radians * constants::RAD_TO_DEG
    }

    /// Logistic function, maps a logit to (0, 1)
    pub fn sigmoid(x: f32) -> f32 {
        1.0 / (1.0 + (-x).exp())
    }
}

/// Extension trait for Mat4 with projection helpers
pub trait Mat4Ext {
    /// Create a Vulkan perspective projection matrix
    ///
    /// Expects a right-handed view space looking down -Z. Output depth is in
    /// [0, 1] and Y points down in clip space.
    fn perspective(fov_y: f32, aspect: f32, near: f32, far: f32) -> Mat4;

    /// Create a right-handed look-at view matrix
    fn look_at(eye: Vec3, target: Vec3, up: Vec3) -> Mat4;

    /// Flip Y and Z to go from right-handed Y-up view space to Vulkan clip conventions
    fn vulkan_coordinate_transform() -> Mat4;
}

impl Mat4Ext for Mat4 {
    fn perspective(fov_y: f32, aspect: f32, near: f32, far: f32) -> Mat4 {
        // P from https://johannesugb.github.io/gpu-programming/setting-up-a-proper-vulkan-projection-matrix/
        let tan_half_fovy = (fov_y * 0.5).tan();

        let mut projection = Mat4::zeros();
        projection[(0, 0)] = 1.0 / (aspect * tan_half_fovy);
        projection[(1, 1)] = 1.0 / tan_half_fovy;
        projection[(2, 2)] = far / (far - near);
        projection[(2, 3)] = -(near * far) / (far - near);
        projection[(3, 2)] = 1.0;

        projection * Self::vulkan_coordinate_transform()
    }

    fn look_at(eye: Vec3, target: Vec3, up: Vec3) -> Mat4 {
        let forward = (target - eye).normalize();
        let right = forward.cross(&up).normalize();
        let camera_up = right.cross(&forward);

        let translation = Mat4::new(
            1.0, 0.0, 0.0, -eye.x,
            0.0, 1.0, 0.0, -eye.y,
            0.0, 0.0, 1.0, -eye.z,
            0.0, 0.0, 0.0, 1.0,
        );

        let rotation = Mat4::new(
            right.x, right.y, right.z, 0.0,
            camera_up.x, camera_up.y, camera_up.z, 0.0,
            -forward.x, -forward.y, -forward.z, 0.0,
            0.0, 0.0, 0.0, 1.0,
        );

        rotation * translation
    }

    fn vulkan_coordinate_transform() -> Mat4 {
        Mat4::new(
            1.0,  0.0,  0.0, 0.0,
            0.0, -1.0,  0.0, 0.0,
            0.0,  0.0, -1.0, 0.0,
            0.0,  0.0,  0.0, 1.0,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn project(m: &Mat4, point: Vec3) -> Vec3 {
        let clip = m * Vec4::new(point.x, point.y, point.z, 1.0);
        Vec3::new(clip.x / clip.w, clip.y / clip.w, clip.z / clip.w)
    }

    #[test]
    fn test_perspective_depth_range() {
        let projection = Mat4::perspective(utils::deg_to_rad(60.0), 1.5, 0.1, 100.0);

        let near = project(&projection, Vec3::new(0.0, 0.0, -0.1));
        let far = project(&projection, Vec3::new(0.0, 0.0, -100.0));

        assert_relative_eq!(near.z, 0.0, epsilon = 1e-5);
        assert_relative_eq!(far.z, 1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_perspective_flips_y() {
        let projection = Mat4::perspective(utils::deg_to_rad(90.0), 1.0, 0.1, 10.0);
        let above = project(&projection, Vec3::new(0.0, 1.0, -2.0));
        assert!(above.y < 0.0, "points above the camera land in the top half of Vulkan clip space");
    }

    #[test]
    fn test_look_at_moves_target_onto_negative_z() {
        let eye = Vec3::new(1.0, 2.0, 3.0);
        let target = Vec3::new(1.0, 2.0, -5.0);
        let view = Mat4::look_at(eye, target, Vec3::y());

        let in_view = view * Vec4::new(target.x, target.y, target.z, 1.0);
        assert_relative_eq!(in_view.x, 0.0, epsilon = 1e-5);
        assert_relative_eq!(in_view.y, 0.0, epsilon = 1e-5);
        assert_relative_eq!(in_view.z, -8.0, epsilon = 1e-5);
    }

    #[test]
    fn test_sigmoid() {
        assert_relative_eq!(utils::sigmoid(0.0), 0.5);
        assert!(utils::sigmoid(-3.0) < utils::sigmoid(-1.0));
        assert!(utils::sigmoid(1.0) < utils::sigmoid(4.0));
        assert_relative_eq!(utils::sigmoid(2.0) + utils::sigmoid(-2.0), 1.0, epsilon = 1e-6);
    }
}
