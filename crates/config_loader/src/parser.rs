//! Configuration parsing
//!
//! Supports TOML (primary) and JSON formats.

use contracts::WatchError;

use crate::model::ServerConfig;

/// Configuration file format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// TOML format (recommended)
    Toml,
    /// JSON format
    Json,
}

impl ConfigFormat {
    /// Infer the format from a file extension
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "toml" => Some(Self::Toml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Parse a TOML configuration
pub fn parse_toml(content: &str) -> Result<ServerConfig, WatchError> {
    toml::from_str(content)
        .map_err(|e| WatchError::config_parse(format!("TOML parse error: {e}")))
}

/// Parse a JSON configuration
pub fn parse_json(content: &str) -> Result<ServerConfig, WatchError> {
    serde_json::from_str(content)
        .map_err(|e| WatchError::config_parse(format!("JSON parse error: {e}")))
}

/// Parse a configuration in the given format
pub fn parse(content: &str, format: ConfigFormat) -> Result<ServerConfig, WatchError> {
    match format {
        ConfigFormat::Toml => parse_toml(content),
        ConfigFormat::Json => parse_json(content),
    }
}
