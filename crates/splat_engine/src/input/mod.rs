//! Input handling: camera control and deferred UI actions

pub mod camera_controller;
pub mod ui_actions;

pub use camera_controller::{CameraController, CameraInput};
pub use ui_actions::{UiAction, UiActionQueue, UiValue};
