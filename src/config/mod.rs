//! Configuration module
//!
//! Handles loading and saving wantframe configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::protocol::MAX_FRAME_SIZE;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings
    #[serde(default)]
    pub general: GeneralConfig,

    /// Framing settings
    #[serde(default)]
    pub framing: FramingConfig,
}

/// General configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Log filter used when `RUST_LOG` is unset (e.g. "info", "wantframe=debug")
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

/// Framing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FramingConfig {
    /// Largest frame payload accepted or produced, in bytes
    #[serde(default = "default_max_frame_size")]
    pub max_frame_size: usize,
}

fn default_max_frame_size() -> usize {
    MAX_FRAME_SIZE
}

impl Default for FramingConfig {
    fn default() -> Self {
        Self {
            max_frame_size: default_max_frame_size(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from the default location
    pub fn load_default() -> ConfigResult<Self> {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("wantframe/config.toml")),
            Some(PathBuf::from("./wantframe.toml")),
            Some(PathBuf::from("./config.toml")),
        ];

        for path in config_paths.iter().flatten() {
            if path.exists() {
                return Self::load(path);
            }
        }

        Ok(Self::default())
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        let contents = toml::to_string_pretty(self)?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, contents)?;
        Ok(())
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.framing.max_frame_size == 0 {
            return Err(ConfigError::Invalid(
                "framing.max_frame_size must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Generate a sample configuration file
pub fn generate_sample_config() -> ConfigResult<String> {
    let config = Config {
        general: GeneralConfig {
            log_level: "wantframe=debug,info".to_string(),
        },
        framing: FramingConfig {
            max_frame_size: 1 << 20,
        },
    };

    Ok(toml::to_string_pretty(&config)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.framing.max_frame_size, MAX_FRAME_SIZE);
        assert_eq!(config.general.log_level, "info");
    }

    #[test]
    fn test_save_and_load() {
        let mut config = Config::default();
        config.framing.max_frame_size = 4096;
        let file = NamedTempFile::new().unwrap();

        config.save(file.path()).unwrap();

        let loaded = Config::load(file.path()).unwrap();
        assert_eq!(loaded.framing.max_frame_size, 4096);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[general]\nlog_level = \"debug\"").unwrap();

        let loaded = Config::load(file.path()).unwrap();
        assert_eq!(loaded.general.log_level, "debug");
        assert_eq!(loaded.framing.max_frame_size, MAX_FRAME_SIZE);
    }

    #[test]
    fn test_zero_frame_size_rejected() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[framing]\nmax_frame_size = 0").unwrap();

        assert!(matches!(
            Config::load(file.path()),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        let err = Config::load(Path::new("/nonexistent/wantframe.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }

    #[test]
    fn test_sample_config() {
        let sample = generate_sample_config().unwrap();
        let parsed: Config = toml::from_str(&sample).unwrap();
        assert_eq!(parsed.framing.max_frame_size, 1 << 20);
    }
}
