//! # Viewer Configuration
//!
//! All tunables of the splat viewer in one serializable tree. Every struct
//! has sensible defaults and `#[serde(default)]`, so a config file only needs
//! to name the values it changes.
//!
//! ```toml
//! initial_model = "scenes/truck.ply"
//! log_level = "debug"
//!
//! [renderer]
//! max_frames_in_flight = 3
//! opaque_alpha_threshold = 0.95
//! ```

use serde::{Serialize, Deserialize};
use std::path::{Path, PathBuf};

pub use crate::config::{Config, ConfigError};

const SHADER_SEARCH_DIRS: &[&str] = &[
    "target/shaders",
    "shaders",
    "resources/shaders",
    "../target/shaders",
    "../../target/shaders",
];

/// # Shader Configuration
///
/// Compiled SPIR-V file names for every material. Paths are resolved against
/// `directory` first, then a list of common locations so the viewer runs from
/// the workspace root as well as from a crate directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShaderConfig {
    /// Preferred directory holding compiled shaders
    pub directory: Option<PathBuf>,
    /// Vertex stage shared by the opaque and translucency passes
    pub splat_vertex: String,
    /// Fragment stage of the opaque pass
    pub opaque_fragment: String,
    /// Fragment stage writing accumulation and revealage
    pub accumulate_fragment: String,
    /// Fullscreen triangle vertex stage
    pub fullscreen_vertex: String,
    /// Fragment stage resolving the OIT buffers
    pub composite_fragment: String,
}

impl ShaderConfig {
    /// Resolve a shader file name to an existing path
    ///
    /// Falls back to `target/shaders/<name>` so the later load error names a
    /// meaningful location.
    pub fn resolve(&self, file_name: &str) -> PathBuf {
        let preferred = self.directory.iter().map(|dir| dir.join(file_name));
        let common = SHADER_SEARCH_DIRS.iter().map(|dir| Path::new(dir).join(file_name));

        preferred
            .chain(common)
            .find(|candidate| candidate.exists())
            .unwrap_or_else(|| Path::new(SHADER_SEARCH_DIRS[0]).join(file_name))
    }

    /// Set the preferred shader directory
    pub fn with_directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.directory = Some(directory.into());
        self
    }
}

impl Default for ShaderConfig {
    fn default() -> Self {
        Self {
            directory: None,
            splat_vertex: "splat.vert.spv".to_string(),
            opaque_fragment: "opaque.frag.spv".to_string(),
            accumulate_fragment: "oit_accumulate.frag.spv".to_string(),
            fullscreen_vertex: "fullscreen_triangle.vert.spv".to_string(),
            composite_fragment: "oit_composite.frag.spv".to_string(),
        }
    }
}

/// # Window Configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Title bar text
    pub title: String,
    /// Initial client width in pixels
    pub width: u32,
    /// Initial client height in pixels
    pub height: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "Gaussian Splat Viewer".to_string(),
            width: 1600,
            height: 900,
        }
    }
}

/// # Renderer Configuration
///
/// Settings of the Vulkan backend and the OIT render graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Application name for Vulkan instance creation
    pub application_name: String,
    /// Maximum frames in flight
    pub max_frames_in_flight: usize,
    /// Whether to enable Vulkan validation layers, `None` follows the build type
    pub enable_validation: Option<bool>,
    /// Use mailbox presentation when the surface supports it
    pub prefer_mailbox: bool,
    /// Wait for device idle before recording each frame
    pub wait_idle_before_record: bool,
    /// Splats at or above this opacity are drawn by the opaque pass
    pub opaque_alpha_threshold: f32,
    /// Clear color of the opaque pass
    pub clear_color: [f32; 4],
}

impl RendererConfig {
    /// Create a new renderer configuration
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            application_name: app_name.into(),
            ..Self::default()
        }
    }

    /// Set maximum frames in flight
    pub fn with_max_frames_in_flight(mut self, frames: usize) -> Self {
        self.max_frames_in_flight = frames;
        self
    }

    /// Enable or disable validation layers
    pub fn with_validation(mut self, enabled: bool) -> Self {
        self.enable_validation = Some(enabled);
        self
    }

    /// Set the opaque/translucent split
    pub fn with_opaque_alpha_threshold(mut self, threshold: f32) -> Self {
        self.opaque_alpha_threshold = threshold;
        self
    }

    /// Whether validation layers should be requested
    pub fn validation_enabled(&self) -> bool {
        self.enable_validation.unwrap_or(cfg!(debug_assertions))
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.application_name.is_empty() {
            return Err("Application name cannot be empty".to_string());
        }

        if self.max_frames_in_flight == 0 {
            return Err("Max frames in flight must be at least 1".to_string());
        }

        if self.max_frames_in_flight > 8 {
            return Err("Max frames in flight should not exceed 8".to_string());
        }

        if !(0.0..=1.0).contains(&self.opaque_alpha_threshold) {
            return Err(format!(
                "Opaque alpha threshold must be within [0, 1], got {}",
                self.opaque_alpha_threshold
            ));
        }

        Ok(())
    }
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            application_name: "Gaussian Splat Viewer".to_string(),
            max_frames_in_flight: 2,
            enable_validation: None,
            prefer_mailbox: true,
            wait_idle_before_record: true,
            opaque_alpha_threshold: 0.98,
            clear_color: [0.0, 0.0, 0.0, 1.0],
        }
    }
}

/// # Camera Configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Initial eye position
    pub position: [f32; 3],
    /// Vertical field of view in degrees
    pub fov_degrees: f32,
    /// Near clip plane distance
    pub near: f32,
    /// Far clip plane distance
    pub far: f32,
    /// Movement speed in units per second
    pub movement_speed: f32,
    /// Degrees of rotation per pixel of mouse movement
    pub mouse_sensitivity: f32,
}

impl CameraConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.near <= 0.0 || self.far <= self.near {
            return Err(format!("Invalid clip planes: near {} far {}", self.near, self.far));
        }

        if self.fov_degrees <= 1.0 || self.fov_degrees >= 120.0 {
            return Err(format!("Field of view must be within (1, 120), got {}", self.fov_degrees));
        }

        Ok(())
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            position: [0.0, 0.0, 3.0],
            fov_degrees: 45.0,
            near: 0.1,
            far: 100.0,
            movement_speed: 2.5,
            mouse_sensitivity: 0.1,
        }
    }
}

/// # Complete Viewer Configuration
///
/// Top-level configuration loaded by the viewer binary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    /// Window settings
    pub window: WindowConfig,
    /// Rendering settings
    pub renderer: RendererConfig,
    /// Shader locations
    pub shaders: ShaderConfig,
    /// Camera settings
    pub camera: CameraConfig,
    /// Point cloud loaded at startup
    pub initial_model: Option<PathBuf>,
    /// Default log level, overridden by `RUST_LOG`
    pub log_level: String,
}

impl ViewerConfig {
    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.renderer.validate().map_err(ConfigError::Invalid)?;
        self.camera.validate().map_err(ConfigError::Invalid)?;

        if self.window.width == 0 || self.window.height == 0 {
            return Err(ConfigError::Invalid("Window dimensions must be non-zero".to_string()));
        }

        Ok(())
    }

    /// Load and validate a config file, or fall back to defaults when it does not exist
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let config = if path.exists() {
            log::info!("Loading configuration from {}", path.display());
            Self::load_from_file(path)?
        } else {
            log::debug!("No configuration at {}, using defaults", path.display());
            Self::default()
        };

        config.validate()?;
        Ok(config)
    }
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            window: WindowConfig::default(),
            renderer: RendererConfig::default(),
            shaders: ShaderConfig::default(),
            camera: CameraConfig::default(),
            initial_model: None,
            log_level: "info".to_string(),
        }
    }
}

impl Config for ViewerConfig {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigFormat;

    #[test]
    fn test_default_config_is_valid() {
        assert!(ViewerConfig::default().validate().is_ok());
    }

    #[test]
    fn test_toml_round_trip() {
        let mut config = ViewerConfig::default();
        config.renderer = config.renderer.with_max_frames_in_flight(3).with_opaque_alpha_threshold(0.9);
        config.initial_model = Some(PathBuf::from("scenes/truck.ply"));

        let text = config.to_string_with_format(ConfigFormat::Toml).unwrap();
        let parsed = ViewerConfig::from_str_with_format(&text, ConfigFormat::Toml).unwrap();

        assert_eq!(parsed, config);
    }

    #[test]
    fn test_ron_round_trip() {
        let mut config = ViewerConfig::default();
        config.camera.fov_degrees = 60.0;
        config.shaders = config.shaders.with_directory("build/spirv");

        let text = config.to_string_with_format(ConfigFormat::Ron).unwrap();
        let parsed = ViewerConfig::from_str_with_format(&text, ConfigFormat::Ron).unwrap();

        assert_eq!(parsed, config);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let text = "log_level = \"debug\"\n[renderer]\nmax_frames_in_flight = 3\n";
        let parsed = ViewerConfig::from_str_with_format(text, ConfigFormat::Toml).unwrap();

        assert_eq!(parsed.log_level, "debug");
        assert_eq!(parsed.renderer.max_frames_in_flight, 3);
        assert_eq!(parsed.renderer.opaque_alpha_threshold, RendererConfig::default().opaque_alpha_threshold);
        assert_eq!(parsed.camera, CameraConfig::default());
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = ViewerConfig::default();
        config.renderer.max_frames_in_flight = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = ViewerConfig::default();
        config.renderer.max_frames_in_flight = 9;
        assert!(config.validate().is_err());

        let mut config = ViewerConfig::default();
        config.camera.far = config.camera.near;
        assert!(config.validate().is_err());

        let mut config = ViewerConfig::default();
        config.renderer.opaque_alpha_threshold = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_default_shader_names_match_compiled_sources() {
        let sources = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../resources/shaders");
        let shaders = ShaderConfig::default();

        for name in [
            &shaders.splat_vertex,
            &shaders.opaque_fragment,
            &shaders.accumulate_fragment,
            &shaders.fullscreen_vertex,
            &shaders.composite_fragment,
        ] {
            let source = name
                .strip_suffix(".spv")
                .unwrap_or_else(|| panic!("{name} is not a SPIR-V file name"));
            assert!(sources.join(source).is_file(), "no GLSL source for {name}");
        }
    }

    #[test]
    fn test_shader_resolution_prefers_configured_directory() {
        let dir = std::env::temp_dir().join(format!("splat_shader_resolve_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("custom.frag.spv"), [0u8; 4]).unwrap();

        let shaders = ShaderConfig::default().with_directory(&dir);
        assert_eq!(shaders.resolve("custom.frag.spv"), dir.join("custom.frag.spv"));
        assert_eq!(
            shaders.resolve("missing.frag.spv"),
            Path::new("target/shaders").join("missing.frag.spv")
        );

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
