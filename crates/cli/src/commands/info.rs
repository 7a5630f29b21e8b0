//! `info` command implementation.

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use config_loader::{ConfigLoader, LogFormat, ServerConfig};

use crate::cli::InfoArgs;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    listeners: ListenerInfo,
    log: LogInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    metrics_port: Option<u16>,
    builtin_formats: Vec<&'static str>,
}

#[derive(Serialize)]
struct ListenerInfo {
    listen: String,
    http_prefix: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    http_listen: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    resp_listen: Option<String>,
}

#[derive(Serialize)]
struct LogInfo {
    level: String,
    format: String,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    let config = match args.config {
        Some(ref path) => {
            info!(config = %path.display(), "Loading configuration");
            ConfigLoader::load_from_path(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?
        }
        None => ServerConfig::default(),
    };

    let config_info = build_info(&config);

    if args.json {
        let json =
            serde_json::to_string_pretty(&config_info).context("Failed to serialize info")?;
        println!("{}", json);
    } else {
        print_info(&config_info);
    }

    Ok(())
}

fn build_info(config: &ServerConfig) -> ConfigInfo {
    ConfigInfo {
        listeners: ListenerInfo {
            listen: config.server.listen.clone(),
            http_prefix: config.server.http_prefix.clone(),
            http_listen: config.server.http_listen.clone(),
            resp_listen: config.server.resp_listen.clone(),
        },
        log: LogInfo {
            level: config.log.level.clone(),
            format: match config.log.format {
                LogFormat::Pretty => "pretty".to_string(),
                LogFormat::Json => "json".to_string(),
                LogFormat::Compact => "compact".to_string(),
            },
        },
        metrics_port: config.metrics.port,
        builtin_formats: vec!["json", "text"],
    }
}

fn print_info(config_info: &ConfigInfo) {
    println!("Listeners:");
    println!("  auto-detect: {}", config_info.listeners.listen);
    if let Some(ref addr) = config_info.listeners.http_listen {
        println!("  http only: {}", addr);
    }
    if let Some(ref addr) = config_info.listeners.resp_listen {
        println!("  resp only: {}", addr);
    }
    println!("  http prefix: {}", config_info.listeners.http_prefix);

    println!("\nLogging:");
    println!("  level: {}", config_info.log.level);
    println!("  format: {}", config_info.log.format);

    println!("\nMetrics:");
    match config_info.metrics_port {
        Some(port) => println!("  port: {}", port),
        None => println!("  disabled"),
    }

    println!("\nBuilt-in formats:");
    for format in &config_info.builtin_formats {
        println!("  - {}", format);
    }
}
