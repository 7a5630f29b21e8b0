//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// watchmux - watch-stream multiplexing server
#[derive(Parser, Debug)]
#[command(
    name = "watchmux",
    author,
    version,
    about = "Watch-stream multiplexing server",
    long_about = "Serves registered data sources over HTTP and RESP on a single\n\
                  auto-detecting port. Each source can be fetched as a one-shot\n\
                  snapshot or watched as a framed live stream in any registered\n\
                  format."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "WATCHMUX_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format (the serve config's [log] section applies
    /// when omitted)
    #[arg(long, value_enum, global = true, env = "WATCHMUX_LOG_FORMAT")]
    pub log_format: Option<LogFormat>,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Log level forced by the verbosity flags, `None` when neither
    /// `-q` nor `-v` was given
    pub fn log_level_override(&self) -> Option<&'static str> {
        if self.quiet {
            Some("warn")
        } else {
            match self.verbose {
                0 => None,
                1 => Some("debug"),
                _ => Some("trace"),
            }
        }
    }
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the server
    Serve(ServeArgs),

    /// Validate a configuration file without serving
    Validate(ValidateArgs),

    /// Display configuration information
    Info(InfoArgs),
}

/// Arguments for the `serve` command
#[derive(Parser, Debug, Clone)]
pub struct ServeArgs {
    /// Path to configuration file (TOML or JSON); built-in defaults
    /// apply when the file does not exist
    #[arg(short, long, default_value = "watchmux.toml", env = "WATCHMUX_CONFIG")]
    pub config: PathBuf,

    /// Override auto-detect listen address from configuration
    #[arg(long, env = "WATCHMUX_LISTEN")]
    pub listen: Option<String>,

    /// Override HTTP mount prefix from configuration
    #[arg(long, env = "WATCHMUX_HTTP_PREFIX")]
    pub http_prefix: Option<String>,

    /// Override Prometheus exporter port (0 = disabled)
    #[arg(long, env = "WATCHMUX_METRICS_PORT")]
    pub metrics_port: Option<u16>,

    /// Register the built-in demo ticker source
    #[arg(long)]
    pub demo: bool,

    /// Demo ticker emit interval in milliseconds
    #[arg(long, default_value = "1000", env = "WATCHMUX_TICK_INTERVAL_MS")]
    pub tick_interval_ms: u64,

    /// Validate configuration and exit without serving
    #[arg(long)]
    pub dry_run: bool,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "watchmux.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file; defaults apply when omitted
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => observability::LogFormat::Json,
            LogFormat::Pretty => observability::LogFormat::Pretty,
            LogFormat::Compact => observability::LogFormat::Compact,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serve_defaults() {
        let cli = Cli::parse_from(["watchmux", "serve"]);
        match cli.command {
            Commands::Serve(args) => {
                assert_eq!(args.config, PathBuf::from("watchmux.toml"));
                assert!(args.listen.is_none());
                assert!(!args.demo);
                assert_eq!(args.tick_interval_ms, 1000);
                assert!(!args.dry_run);
            }
            _ => panic!("expected serve command"),
        }
    }

    #[test]
    fn test_serve_overrides() {
        let cli = Cli::parse_from([
            "watchmux",
            "serve",
            "--listen",
            "0.0.0.0:9999",
            "--http-prefix",
            "/ops",
            "--metrics-port",
            "9100",
        ]);
        match cli.command {
            Commands::Serve(args) => {
                assert_eq!(args.listen.as_deref(), Some("0.0.0.0:9999"));
                assert_eq!(args.http_prefix.as_deref(), Some("/ops"));
                assert_eq!(args.metrics_port, Some(9100));
            }
            _ => panic!("expected serve command"),
        }
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        assert!(Cli::try_parse_from(["watchmux", "-q", "-v", "serve"]).is_err());
    }

    #[test]
    fn test_verbosity_maps_to_level_override() {
        let cli = Cli::parse_from(["watchmux", "serve"]);
        assert!(cli.log_level_override().is_none());
        assert!(cli.log_format.is_none());

        let cli = Cli::parse_from(["watchmux", "-v", "serve"]);
        assert_eq!(cli.log_level_override(), Some("debug"));

        let cli = Cli::parse_from(["watchmux", "-q", "serve"]);
        assert_eq!(cli.log_level_override(), Some("warn"));
    }
}
