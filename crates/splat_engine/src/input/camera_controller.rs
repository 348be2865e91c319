//! Keyboard and mouse driven camera movement
//!
//! The controller only sees a per-frame [`CameraInput`] snapshot, which the
//! window layer fills from GLFW state.

use crate::render::primitives::camera::{CameraMovement, FirstPersonCamera};

/// Input state sampled once per frame
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CameraInput {
    pub forward: bool,
    pub backward: bool,
    pub left: bool,
    pub right: bool,
    pub up: bool,
    pub down: bool,
    /// Rotate only while the right mouse button is held
    pub rotating: bool,
    pub cursor: (f64, f64),
    pub scroll: f32,
}

/// Applies [`CameraInput`] to a [`FirstPersonCamera`]
#[derive(Debug, Default)]
pub struct CameraController {
    last_cursor: Option<(f64, f64)>,
}

impl CameraController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move and rotate the camera for one frame
    pub fn update(&mut self, camera: &mut FirstPersonCamera, input: &CameraInput, delta_time: f32) {
        let moves = [
            (input.forward, CameraMovement::Forward),
            (input.backward, CameraMovement::Backward),
            (input.left, CameraMovement::Left),
            (input.right, CameraMovement::Right),
            (input.up, CameraMovement::Up),
            (input.down, CameraMovement::Down),
        ];
        for (_, direction) in moves.iter().filter(|(held, _)| *held) {
            camera.process_movement(*direction, delta_time);
        }

        if input.rotating {
            // The first sample after pressing only anchors the cursor.
            if let Some((last_x, last_y)) = self.last_cursor {
                let dx = (input.cursor.0 - last_x) as f32;
                let dy = (input.cursor.1 - last_y) as f32;
                if dx != 0.0 || dy != 0.0 {
                    camera.process_mouse_movement(dx, dy);
                }
            }
            self.last_cursor = Some(input.cursor);
        } else {
            self.last_cursor = None;
        }

        if input.scroll != 0.0 {
            camera.process_mouse_scroll(input.scroll);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Vec3;
    use approx::assert_relative_eq;

    fn camera() -> FirstPersonCamera {
        FirstPersonCamera::new(Vec3::new(0.0, 0.0, 3.0), 45.0, 1.0, 0.1, 100.0)
    }

    #[test]
    fn test_opposite_keys_cancel() {
        let mut camera = camera();
        let mut controller = CameraController::new();
        let input = CameraInput {
            forward: true,
            backward: true,
            ..CameraInput::default()
        };

        controller.update(&mut camera, &input, 1.0);
        assert_relative_eq!(camera.position().z, 3.0, epsilon = 1e-5);
    }

    #[test]
    fn test_rotation_needs_anchor() {
        let mut camera = camera();
        let mut controller = CameraController::new();
        let front = camera.front();

        let mut input = CameraInput {
            rotating: true,
            cursor: (100.0, 100.0),
            ..CameraInput::default()
        };
        controller.update(&mut camera, &input, 0.016);
        assert_eq!(camera.front(), front);

        input.cursor = (150.0, 100.0);
        controller.update(&mut camera, &input, 0.016);
        assert!(camera.front().x > front.x);

        // Releasing the button drops the anchor.
        input.rotating = false;
        controller.update(&mut camera, &input, 0.016);
        let released = camera.front();
        input.rotating = true;
        input.cursor = (400.0, 400.0);
        controller.update(&mut camera, &input, 0.016);
        assert_eq!(camera.front(), released);
    }

    #[test]
    fn test_scroll_zooms() {
        let mut camera = camera();
        let mut controller = CameraController::new();
        let input = CameraInput {
            scroll: 5.0,
            ..CameraInput::default()
        };
        controller.update(&mut camera, &input, 0.016);
        assert_relative_eq!(camera.fov(), 40.0);
    }
}
