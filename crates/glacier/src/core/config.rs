//! Application and window settings
//!
//! [`ApplicationConfig`] is everything the run loop needs before the first
//! frame: the window description, the Vulkan application identity, vsync
//! preference and the number of frames in flight. It loads from TOML or RON
//! through [`Config`].

use serde::{Deserialize, Serialize};

pub use crate::config::{Config, ConfigError};

/// Largest accepted frames-in-flight count
pub const MAX_FRAMES_IN_FLIGHT: usize = 8;

/// Window creation settings
///
/// Size limits of `0` mean "no limit".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Title bar text
    pub title: String,
    /// Initial width in screen coordinates
    pub width: u32,
    /// Initial height in screen coordinates
    pub height: u32,
    /// Minimum width, 0 for none
    pub min_width: u32,
    /// Minimum height, 0 for none
    pub min_height: u32,
    /// Maximum width, 0 for none
    pub max_width: u32,
    /// Maximum height, 0 for none
    pub max_height: u32,
    /// Whether the user can resize the window
    pub resizable: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "Glacier".to_string(),
            width: 800,
            height: 600,
            min_width: 0,
            min_height: 0,
            max_width: 0,
            max_height: 0,
            resizable: true,
        }
    }
}

impl WindowConfig {
    /// Create a window description with the given title and size
    pub fn new(title: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            title: title.into(),
            width,
            height,
            ..Self::default()
        }
    }

    /// Set the minimum size
    pub const fn with_min_size(mut self, width: u32, height: u32) -> Self {
        self.min_width = width;
        self.min_height = height;
        self
    }

    /// Set the maximum size
    pub const fn with_max_size(mut self, width: u32, height: u32) -> Self {
        self.max_width = width;
        self.max_height = height;
        self
    }

    /// Set whether the window is resizable
    pub const fn with_resizable(mut self, resizable: bool) -> Self {
        self.resizable = resizable;
        self
    }

    fn validate(&self) -> Result<(), String> {
        if self.width == 0 || self.height == 0 {
            return Err(format!("window size must be nonzero, got {}x{}", self.width, self.height));
        }
        if self.max_width != 0 && self.min_width > self.max_width {
            return Err("window min_width exceeds max_width".to_string());
        }
        if self.max_height != 0 && self.min_height > self.max_height {
            return Err("window min_height exceeds max_height".to_string());
        }
        Ok(())
    }
}

/// Top-level application settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationConfig {
    /// Application name reported to the driver
    pub name: String,
    /// Application version as (major, minor, patch)
    pub version: (u32, u32, u32),
    /// Prefer tear-free presentation
    pub vsync: bool,
    /// Number of frames the CPU may record ahead of the GPU
    pub frames_in_flight: usize,
    /// Enable validation layers; `None` enables them in debug builds only
    pub enable_validation: Option<bool>,
    /// Window settings
    pub window: WindowConfig,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            name: "Glacier Application".to_string(),
            version: (0, 1, 0),
            vsync: true,
            frames_in_flight: 2,
            enable_validation: None,
            window: WindowConfig::default(),
        }
    }
}

impl Config for ApplicationConfig {}

impl ApplicationConfig {
    /// Create a configuration with the given application name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Set the application version
    pub const fn with_version(mut self, major: u32, minor: u32, patch: u32) -> Self {
        self.version = (major, minor, patch);
        self
    }

    /// Set the vsync preference
    pub const fn with_vsync(mut self, vsync: bool) -> Self {
        self.vsync = vsync;
        self
    }

    /// Set the number of frames in flight
    pub const fn with_frames_in_flight(mut self, frames: usize) -> Self {
        self.frames_in_flight = frames;
        self
    }

    /// Force validation layers on or off
    pub const fn with_validation(mut self, enabled: bool) -> Self {
        self.enable_validation = Some(enabled);
        self
    }

    /// Set the window settings
    pub fn with_window(mut self, window: WindowConfig) -> Self {
        self.window = window;
        self
    }

    /// Whether validation layers should be requested
    pub fn validation_enabled(&self) -> bool {
        self.enable_validation.unwrap_or(cfg!(debug_assertions))
    }

    /// Version packed for `VkApplicationInfo`
    pub fn packed_version(&self) -> u32 {
        let (major, minor, patch) = self.version;
        ash::vk::make_api_version(0, major, minor, patch)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.is_empty() {
            return Err(ConfigError::Invalid("application name cannot be empty".to_string()));
        }
        if self.frames_in_flight == 0 || self.frames_in_flight > MAX_FRAMES_IN_FLIGHT {
            return Err(ConfigError::Invalid(format!(
                "frames_in_flight must be between 1 and {}, got {}",
                MAX_FRAMES_IN_FLIGHT, self.frames_in_flight
            )));
        }
        self.window.validate().map_err(ConfigError::Invalid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigFormat;

    #[test]
    fn test_defaults_are_valid() {
        let config = ApplicationConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.frames_in_flight, 2);
        assert!(config.vsync);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        assert!(ApplicationConfig::new("").validate().is_err());
        assert!(ApplicationConfig::new("app").with_frames_in_flight(0).validate().is_err());
        assert!(ApplicationConfig::new("app").with_frames_in_flight(9).validate().is_err());

        let tiny = ApplicationConfig::new("app").with_window(WindowConfig::new("t", 0, 600));
        assert!(tiny.validate().is_err());

        let inverted = ApplicationConfig::new("app")
            .with_window(WindowConfig::new("t", 800, 600).with_min_size(1024, 0).with_max_size(640, 0));
        assert!(matches!(inverted.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_toml_round_trip() {
        let config = ApplicationConfig::new("SandboxApp")
            .with_version(0, 1, 0)
            .with_vsync(false)
            .with_window(WindowConfig::new("SandboxApp", 800, 600).with_min_size(640, 480));

        let text = config.to_string_with_format(ConfigFormat::Toml).unwrap();
        let parsed = ApplicationConfig::from_str_with_format(&text, ConfigFormat::Toml).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_partial_ron_uses_defaults() {
        let parsed = ApplicationConfig::from_str_with_format(
            "(name: \"ron app\", vsync: false, window: (width: 1280, height: 720))",
            ConfigFormat::Ron,
        )
        .unwrap();

        assert_eq!(parsed.name, "ron app");
        assert!(!parsed.vsync);
        assert_eq!(parsed.frames_in_flight, 2);
        assert_eq!(parsed.window.width, 1280);
        assert_eq!(parsed.window.title, "Glacier");
        assert!(parsed.window.resizable);
    }

    #[test]
    fn test_version_packing() {
        let config = ApplicationConfig::new("app").with_version(1, 2, 3);
        let packed = config.packed_version();
        assert_eq!(ash::vk::api_version_major(packed), 1);
        assert_eq!(ash::vk::api_version_minor(packed), 2);
        assert_eq!(ash::vk::api_version_patch(packed), 3);
    }
}
