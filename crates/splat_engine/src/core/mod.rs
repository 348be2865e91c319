//! # Core Module
//!
//! Shared configuration types used by every subsystem of the viewer.

pub mod config;

pub use crate::foundation;

pub use config::{
    CameraConfig,
    Config,
    ConfigError,
    RendererConfig,
    ShaderConfig,
    ViewerConfig,
    WindowConfig,
};
