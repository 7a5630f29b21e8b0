//! Configuration validation
//!
//! Rules:
//! - every listen address parses as host:port
//! - the HTTP prefix starts with '/'
//! - the log level is a known tracing level

use std::net::SocketAddr;

use contracts::WatchError;

use crate::model::ServerConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validate a ServerConfig
///
/// Returns the first error encountered, or Ok(()).
pub fn validate(config: &ServerConfig) -> Result<(), WatchError> {
    validate_addr("server.listen", &config.server.listen)?;
    if let Some(addr) = &config.server.http_listen {
        validate_addr("server.http_listen", addr)?;
    }
    if let Some(addr) = &config.server.resp_listen {
        validate_addr("server.resp_listen", addr)?;
    }
    validate_prefix(&config.server.http_prefix)?;
    validate_log_level(&config.log.level)?;
    Ok(())
}

fn validate_addr(field: &str, addr: &str) -> Result<(), WatchError> {
    addr.parse::<SocketAddr>().map(|_| ()).map_err(|e| {
        WatchError::config_validation(field, format!("invalid socket address '{addr}': {e}"))
    })
}

fn validate_prefix(prefix: &str) -> Result<(), WatchError> {
    if !prefix.starts_with('/') {
        return Err(WatchError::config_validation(
            "server.http_prefix",
            format!("prefix must start with '/', got '{prefix}'"),
        ));
    }
    Ok(())
}

fn validate_log_level(level: &str) -> Result<(), WatchError> {
    if !LOG_LEVELS.contains(&level.to_lowercase().as_str()) {
        return Err(WatchError::config_validation(
            "log.level",
            format!("unknown level '{level}', expected one of {LOG_LEVELS:?}"),
        ));
    }
    Ok(())
}
