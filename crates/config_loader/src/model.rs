//! Server configuration model

use serde::{Deserialize, Serialize};

/// Top-level configuration for the watchmux server
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listener addresses and mount points
    #[serde(default)]
    pub server: NetworkConfig,

    /// Logging configuration
    #[serde(default)]
    pub log: LogConfig,

    /// Metrics exporter configuration
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Listener configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Auto-detect (HTTP + RESP) listener address
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Optional dedicated HTTP-only listener
    #[serde(default)]
    pub http_listen: Option<String>,

    /// Optional dedicated RESP-only listener
    #[serde(default)]
    pub resp_listen: Option<String>,

    /// Mount prefix for HTTP routes
    #[serde(default = "default_http_prefix")]
    pub http_prefix: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            http_listen: None,
            resp_listen: None,
            http_prefix: default_http_prefix(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Default log level when RUST_LOG is unset
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log output format
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable format
    #[default]
    Pretty,
    /// JSON structured logs
    Json,
    /// Compact single-line format
    Compact,
}

/// Metrics exporter configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Prometheus exporter port (None disables the exporter)
    #[serde(default)]
    pub port: Option<u16>,
}

fn default_listen() -> String {
    "127.0.0.1:4040".to_string()
}

fn default_http_prefix() -> String {
    "/watch".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}
