//! # First-Person Camera
//!
//! Yaw/pitch camera with a Vulkan projection (depth 0..1, Y down) and the
//! uniform record the splat shaders read through a device address.

use crate::core::CameraConfig;
use crate::foundation::math::{utils, Mat4, Mat4Ext, Vec3};
use bytemuck::{Pod, Zeroable};

/// Pitch limit in degrees; looking straight up or down breaks `look_at`
const PITCH_LIMIT: f32 = 89.0;

/// Zoom range in degrees of vertical field of view
const FOV_RANGE: (f32, f32) = (1.0, 120.0);

/// Directions the camera can be moved in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraMovement {
    Forward,
    Backward,
    Left,
    Right,
    Up,
    Down,
}

/// Camera looking along a yaw/pitch direction from its position
///
/// Yaw is measured in degrees from +X towards +Z, so the default yaw of -90
/// looks down -Z.
#[derive(Debug, Clone)]
pub struct FirstPersonCamera {
    position: Vec3,
    front: Vec3,
    up: Vec3,
    right: Vec3,
    world_up: Vec3,
    yaw: f32,
    pitch: f32,
    /// Vertical field of view in degrees
    fov: f32,
    aspect: f32,
    near: f32,
    far: f32,
    movement_speed: f32,
    mouse_sensitivity: f32,
}

impl FirstPersonCamera {
    /// Create a camera at `position` looking down -Z
    pub fn new(position: Vec3, fov_degrees: f32, aspect: f32, near: f32, far: f32) -> Self {
        let mut camera = Self {
            position,
            front: -Vec3::z(),
            up: Vec3::y(),
            right: Vec3::x(),
            world_up: Vec3::y(),
            yaw: -90.0,
            pitch: 0.0,
            fov: fov_degrees,
            aspect,
            near,
            far,
            movement_speed: 2.5,
            mouse_sensitivity: 0.1,
        };
        camera.update_vectors();
        camera
    }

    /// Create a camera from configuration
    pub fn from_config(config: &CameraConfig, aspect: f32) -> Self {
        let [x, y, z] = config.position;
        let mut camera = Self::new(Vec3::new(x, y, z), config.fov_degrees, aspect, config.near, config.far);
        camera.movement_speed = config.movement_speed;
        camera.mouse_sensitivity = config.mouse_sensitivity;
        camera
    }

    /// World-to-view transform
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at(self.position, self.position + self.front, self.up)
    }

    /// View-to-clip transform
    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective(utils::deg_to_rad(self.fov), self.aspect, self.near, self.far)
    }

    /// Move along the camera basis, scaled by elapsed time
    pub fn process_movement(&mut self, direction: CameraMovement, delta_time: f32) {
        let velocity = self.movement_speed * delta_time;
        let offset = match direction {
            CameraMovement::Forward => self.front,
            CameraMovement::Backward => -self.front,
            CameraMovement::Left => -self.right,
            CameraMovement::Right => self.right,
            CameraMovement::Up => self.world_up,
            CameraMovement::Down => -self.world_up,
        };
        self.position += offset * velocity;
    }

    /// Rotate by a mouse delta in pixels; y grows downwards
    pub fn process_mouse_movement(&mut self, x_offset: f32, y_offset: f32) {
        self.yaw += x_offset * self.mouse_sensitivity;
        self.pitch = (self.pitch - y_offset * self.mouse_sensitivity).clamp(-PITCH_LIMIT, PITCH_LIMIT);
        self.update_vectors();
    }

    /// Zoom by narrowing or widening the field of view
    pub fn process_mouse_scroll(&mut self, y_offset: f32) {
        self.fov = (self.fov - y_offset).clamp(FOV_RANGE.0, FOV_RANGE.1);
    }

    /// Update aspect ratio after a resize
    pub fn set_aspect_ratio(&mut self, aspect: f32) {
        if (self.aspect - aspect).abs() > 0.01 {
            log::info!("Camera aspect ratio changed: {:.3} -> {:.3}", self.aspect, aspect);
        }
        self.aspect = aspect;
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
        log::trace!("Camera position updated to: {:?}", position);
    }

    /// Reset orientation to look down -Z
    pub fn reset_orientation(&mut self) {
        self.yaw = -90.0;
        self.pitch = 0.0;
        self.update_vectors();
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn front(&self) -> Vec3 {
        self.front
    }

    pub fn right(&self) -> Vec3 {
        self.right
    }

    pub fn fov(&self) -> f32 {
        self.fov
    }

    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    pub fn aspect(&self) -> f32 {
        self.aspect
    }

    fn update_vectors(&mut self) {
        let (yaw, pitch) = (utils::deg_to_rad(self.yaw), utils::deg_to_rad(self.pitch));
        let direction = Vec3::new(yaw.cos() * pitch.cos(), pitch.sin(), yaw.sin() * pitch.cos());

        self.front = direction.normalize();
        self.right = self.front.cross(&self.world_up).normalize();
        self.up = self.right.cross(&self.front).normalize();
    }
}

/// Scene uniform read by the splat vertex shader
///
/// std430 layout, must match `SceneBuffer` in `splat.vert`.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct CameraData {
    /// Column-major projection matrix
    pub projection: [[f32; 4]; 4],
    /// Column-major view matrix
    pub view: [[f32; 4]; 4],
    /// Eye position, w unused
    pub camera_position: [f32; 4],
    /// x: opaque alpha threshold, yzw unused
    pub params: [f32; 4],
}

impl CameraData {
    /// Snapshot the camera for upload
    pub fn new(camera: &FirstPersonCamera, opaque_alpha_threshold: f32) -> Self {
        let position = camera.position();
        Self {
            projection: camera.projection_matrix().into(),
            view: camera.view_matrix().into(),
            camera_position: [position.x, position.y, position.z, 1.0],
            params: [opaque_alpha_threshold, 0.0, 0.0, 0.0],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Vec4;
    use approx::assert_relative_eq;

    fn camera() -> FirstPersonCamera {
        FirstPersonCamera::new(Vec3::new(0.0, 0.0, 3.0), 45.0, 16.0 / 9.0, 0.1, 100.0)
    }

    #[test]
    fn test_default_orientation_looks_down_negative_z() {
        let camera = camera();
        assert_relative_eq!(camera.front().z, -1.0, epsilon = 1e-6);
        assert_relative_eq!(camera.right().x, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_pitch_clamped() {
        let mut camera = camera();
        camera.process_mouse_movement(0.0, -10_000.0);
        assert_relative_eq!(camera.pitch(), PITCH_LIMIT);
        camera.process_mouse_movement(0.0, 10_000.0);
        assert_relative_eq!(camera.pitch(), -PITCH_LIMIT);
    }

    #[test]
    fn test_scroll_zoom_clamped() {
        let mut camera = camera();
        camera.process_mouse_scroll(500.0);
        assert_relative_eq!(camera.fov(), 1.0);
        camera.process_mouse_scroll(-500.0);
        assert_relative_eq!(camera.fov(), 120.0);
    }

    #[test]
    fn test_movement_scales_with_time() {
        let mut camera = camera();
        camera.process_movement(CameraMovement::Forward, 2.0);
        assert_relative_eq!(camera.position().z, 3.0 - 5.0, epsilon = 1e-5);
        camera.process_movement(CameraMovement::Up, 1.0);
        assert_relative_eq!(camera.position().y, 2.5, epsilon = 1e-5);
    }

    #[test]
    fn test_origin_projects_to_screen_center() {
        let camera = camera();
        let clip = camera.projection_matrix() * camera.view_matrix() * Vec4::new(0.0, 0.0, 0.0, 1.0);
        let ndc = clip / clip.w;

        assert_relative_eq!(ndc.x, 0.0, epsilon = 1e-5);
        assert_relative_eq!(ndc.y, 0.0, epsilon = 1e-5);
        assert!(ndc.z > 0.0 && ndc.z < 1.0);
    }

    #[test]
    fn test_aspect_ratio_changes_horizontal_scale() {
        let mut camera = camera();
        let wide = camera.projection_matrix()[(0, 0)];
        camera.set_aspect_ratio(1.0);
        let square = camera.projection_matrix()[(0, 0)];
        assert_relative_eq!(square / wide, 16.0 / 9.0, epsilon = 1e-4);
    }

    #[test]
    fn test_camera_data_layout() {
        assert_eq!(std::mem::size_of::<CameraData>(), 64 + 64 + 16 + 16);

        let data = CameraData::new(&camera(), 0.98);
        assert_eq!(data.camera_position, [0.0, 0.0, 3.0, 1.0]);
        assert_relative_eq!(data.params[0], 0.98);
    }
}
