//! # Config Loader
//!
//! Configuration loading and parsing module.
//!
//! Responsibilities:
//! - Parse TOML/JSON configuration files
//! - Validate configuration legality
//! - Produce a [`ServerConfig`]

mod model;
mod parser;
mod validator;

pub use model::{LogConfig, LogFormat, MetricsConfig, NetworkConfig, ServerConfig};
pub use parser::ConfigFormat;

use contracts::WatchError;
use std::path::Path;

/// Configuration loader
///
/// Provides static methods to load configuration from files or strings.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from file path
    ///
    /// Automatically detects format from file extension (.toml / .json).
    ///
    /// # Errors
    /// - File read failure
    /// - Unsupported format
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_path(path: &Path) -> Result<ServerConfig, WatchError> {
        let format = Self::detect_format(path)?;
        let content = std::fs::read_to_string(path)?;
        Self::load_from_str(&content, format)
    }

    /// Load configuration from string
    ///
    /// # Errors
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_str(content: &str, format: ConfigFormat) -> Result<ServerConfig, WatchError> {
        let config = parser::parse(content, format)?;
        validator::validate(&config)?;
        Ok(config)
    }

    /// Serialize a ServerConfig to TOML string
    pub fn to_toml(config: &ServerConfig) -> Result<String, WatchError> {
        toml::to_string_pretty(config)
            .map_err(|e| WatchError::config_parse(format!("TOML serialize error: {e}")))
    }

    /// Infer configuration format from file extension
    fn detect_format(path: &Path) -> Result<ConfigFormat, WatchError> {
        let ext = path.extension().and_then(|e| e.to_str()).ok_or_else(|| {
            WatchError::config_parse("cannot determine file format from extension")
        })?;

        ConfigFormat::from_extension(ext)
            .ok_or_else(|| WatchError::config_parse(format!("unsupported config format: .{ext}")))
    }
}
