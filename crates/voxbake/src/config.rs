//! Bake configuration.
//!
//! ```toml
//! atlas_max_size = 4096
//! atlas_base_size = 512
//! max_quad_size = 48
//! scale = 0.1
//! front_face = "clockwise"   # or "counter_clockwise"
//! parallel = true
//! ```
//!
//! Every key is optional; missing keys take their defaults.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use voxbake_rendering::{FrontFace, PackSettings};

/// Configuration failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    /// The config file is not valid TOML for [`BakeConfig`].
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is out of range.
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Settings for one bake run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BakeConfig {
    /// Largest atlas side, a power of two.
    pub atlas_max_size: u32,
    /// First atlas side tried.
    pub atlas_base_size: u32,
    /// Longest quad edge in voxels.
    pub max_quad_size: u32,
    /// Output units per voxel.
    pub scale: f32,
    /// Front-face winding of the consumer.
    pub front_face: FrontFace,
    /// Bake models on the rayon pool.
    pub parallel: bool,
}

impl Default for BakeConfig {
    fn default() -> Self {
        Self {
            atlas_max_size: 4096,
            atlas_base_size: 512,
            max_quad_size: 48,
            scale: 0.1,
            front_face: FrontFace::Clockwise,
            parallel: true,
        }
    }
}

impl BakeConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// `Parse` for malformed TOML or unknown keys, `Invalid` for values
    /// [`Self::validate`] rejects.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    ///
    /// # Errors
    ///
    /// As [`Self::from_toml_str`], plus `Io` when the file cannot be read.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// `Invalid` naming the first offending key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.atlas_max_size.is_power_of_two() {
            return Err(ConfigError::Invalid(format!(
                "atlas_max_size must be a power of two, got {}",
                self.atlas_max_size
            )));
        }
        if self.atlas_base_size == 0 || self.atlas_base_size > self.atlas_max_size {
            return Err(ConfigError::Invalid(format!(
                "atlas_base_size must be in 1..={}, got {}",
                self.atlas_max_size, self.atlas_base_size
            )));
        }
        if self.max_quad_size == 0 || self.max_quad_size > self.atlas_max_size {
            return Err(ConfigError::Invalid(format!(
                "max_quad_size must be in 1..={}, got {}",
                self.atlas_max_size, self.max_quad_size
            )));
        }
        if !self.scale.is_finite() || self.scale <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "scale must be finite and positive, got {}",
                self.scale
            )));
        }
        Ok(())
    }

    /// Settings handed to the atlas packer.
    #[must_use]
    pub fn pack_settings(&self) -> PackSettings {
        PackSettings {
            atlas_base_size: self.atlas_base_size,
            atlas_max_size: self.atlas_max_size,
            scale: self.scale,
            front_face: self.front_face,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = BakeConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(BakeConfig::from_toml_str("").unwrap(), config);
    }

    #[test]
    fn test_partial_document() {
        let config = BakeConfig::from_toml_str(
            "max_quad_size = 16\nfront_face = \"counter_clockwise\"\nparallel = false\n",
        )
        .unwrap();
        assert_eq!(config.max_quad_size, 16);
        assert_eq!(config.front_face, FrontFace::CounterClockwise);
        assert!(!config.parallel);
        assert_eq!(config.atlas_max_size, 4096);
    }

    #[test]
    fn test_rejects_bad_values() {
        for source in [
            "atlas_max_size = 1000",
            "max_quad_size = 0",
            "max_quad_size = 9000",
            "scale = 0.0",
            "scale = -1.0",
            "scale = nan",
            "atlas_base_size = 0",
        ] {
            assert!(
                matches!(BakeConfig::from_toml_str(source), Err(ConfigError::Invalid(_))),
                "{source}"
            );
        }
    }

    #[test]
    fn test_rejects_unknown_keys_and_garbage() {
        assert!(matches!(
            BakeConfig::from_toml_str("atlas_size = 5"),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            BakeConfig::from_toml_str("front_face = \"sideways\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        assert!(matches!(
            BakeConfig::load("/definitely/not/here.toml"),
            Err(ConfigError::Io(_))
        ));
    }
}
