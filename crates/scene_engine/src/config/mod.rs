//! Configuration system
//!
//! Scene tuning lives in plain serde structs that load from TOML or RON,
//! chosen by file extension.

pub use serde::{Deserialize, Serialize};

/// Configuration trait
pub trait Config: Serialize + for<'de> Deserialize<'de> + Default {
    /// Load configuration from file
    fn load_from_file(path: &str) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(ConfigError::Io)?;

        if path.ends_with(".toml") {
            toml::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))
        } else if path.ends_with(".ron") {
            ron::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))
        } else {
            Err(ConfigError::UnsupportedFormat(path.to_string()))
        }
    }

    /// Save configuration to file
    fn save_to_file(&self, path: &str) -> Result<(), ConfigError> {
        let contents = if path.ends_with(".toml") {
            toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?
        } else if path.ends_with(".ron") {
            ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
                .map_err(|e| ConfigError::Serialize(e.to_string()))?
        } else {
            return Err(ConfigError::UnsupportedFormat(path.to_string()));
        };

        std::fs::write(path, contents).map_err(ConfigError::Io)
    }
}

/// Configuration errors
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialize(String),

    /// Unsupported format
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// A value parsed but is outside its allowed range
    #[error("Invalid value for {field}: {value}")]
    Invalid {
        /// Offending field
        field: &'static str,
        /// Offending value
        value: f32,
    },
}

/// Per-node-kind delta-time scale factors applied by the update scheduler.
///
/// The scaled delta time is used directly as the blend factor, so a value of
/// `1.0` with a one-second tick settles every transition in a single tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmoothingConfig {
    /// Scale factor for generic scene objects
    pub object: f32,
    /// Scale factor for camera nodes
    pub camera: f32,
}

impl Default for SmoothingConfig {
    fn default() -> Self {
        Self {
            object: 1.0,
            camera: 1.0,
        }
    }
}

impl SmoothingConfig {
    /// Reject negative or non-finite factors.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [("smoothing.object", self.object), ("smoothing.camera", self.camera)] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::Invalid { field, value });
            }
        }
        Ok(())
    }
}

/// Default lens for newly created cameras
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LensConfig {
    /// Vertical field of view in degrees
    pub field_of_view_degrees: f32,
    /// Near clipping plane distance
    pub near_plane: f32,
    /// Far clipping plane distance
    pub far_plane: f32,
    /// Viewport width / height
    pub aspect_ratio: f32,
}

impl Default for LensConfig {
    fn default() -> Self {
        Self {
            field_of_view_degrees: 90.0,
            near_plane: 0.1,
            far_plane: 100.0,
            aspect_ratio: 16.0 / 9.0,
        }
    }
}

impl LensConfig {
    /// Check the lens describes a usable perspective frustum.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let fov = self.field_of_view_degrees;
        if !fov.is_finite() || fov <= 0.0 || fov >= 180.0 {
            return Err(ConfigError::Invalid { field: "lens.field_of_view_degrees", value: fov });
        }
        if !self.near_plane.is_finite() || self.near_plane <= 0.0 {
            return Err(ConfigError::Invalid { field: "lens.near_plane", value: self.near_plane });
        }
        if !self.far_plane.is_finite() || self.far_plane <= self.near_plane {
            return Err(ConfigError::Invalid { field: "lens.far_plane", value: self.far_plane });
        }
        if !self.aspect_ratio.is_finite() || self.aspect_ratio <= 0.0 {
            return Err(ConfigError::Invalid { field: "lens.aspect_ratio", value: self.aspect_ratio });
        }
        Ok(())
    }
}

/// Top-level scene configuration
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    /// Smoothing speeds per node kind
    pub smoothing: SmoothingConfig,
    /// Lens used by cameras created without explicit settings
    pub lens: LensConfig,
}

impl Config for SceneConfig {}

impl SceneConfig {
    /// Validate every section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.smoothing.validate()?;
        self.lens.validate()
    }

    /// Load from `path` and validate.
    pub fn load_validated(path: &str) -> Result<Self, ConfigError> {
        let config = Self::load_from_file(path)?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        SceneConfig::default().validate().unwrap();
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: SceneConfig = toml::from_str("[smoothing]\nobject = 5.0\n").unwrap();

        assert_eq!(config.smoothing.object, 5.0);
        assert_eq!(config.smoothing.camera, 1.0);
        assert_eq!(config.lens, LensConfig::default());
    }

    #[test]
    fn test_ron_parses() {
        let config: SceneConfig =
            ron::from_str("(lens: (field_of_view_degrees: 60.0, aspect_ratio: 1.0))").unwrap();

        assert_eq!(config.lens.field_of_view_degrees, 60.0);
        assert_eq!(config.lens.aspect_ratio, 1.0);
        assert_eq!(config.lens.near_plane, 0.1);
    }

    #[test]
    fn test_invalid_lens_rejected() {
        let mut config = SceneConfig::default();
        config.lens.far_plane = 0.05;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field: "lens.far_plane", .. })
        ));

        let mut config = SceneConfig::default();
        config.smoothing.camera = f32::NAN;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field: "smoothing.camera", .. })
        ));
    }

    #[test]
    fn test_save_and_load_roundtrip_through_file() {
        let dir = std::env::temp_dir();
        let path = dir.join(format!("scene_engine_config_{}.toml", std::process::id()));
        let path = path.to_string_lossy().to_string();

        let mut config = SceneConfig::default();
        config.smoothing.object = 5.0;
        config.save_to_file(&path).unwrap();

        let loaded = SceneConfig::load_validated(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_unsupported_extension() {
        assert!(matches!(
            SceneConfig::default().save_to_file("scene.json"),
            Err(ConfigError::UnsupportedFormat(_))
        ));
    }
}
