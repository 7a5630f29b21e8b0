//! # watchmux CLI
//!
//! 命令行接口入口点。
//!
//! 提供：
//! - 配置加载与验证
//! - 服务器生命周期管理
//! - 优雅关闭处理

mod cli;
mod commands;
mod demo;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use cli::{Cli, Commands};
use commands::{run_info, run_serve, run_validate};
use observability::ObservabilityConfig;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // `serve` brings logging up itself once the config file has been
    // read, so its [log] section can take effect.
    let result = match &cli.command {
        Commands::Serve(args) => run_serve(&cli, args).await,
        Commands::Validate(args) => {
            init_logging(&cli)?;
            run_validate(args)
        }
        Commands::Info(args) => {
            init_logging(&cli)?;
            run_info(args)
        }
    };

    if let Err(ref e) = result {
        tracing::error!(error = %e, "Command failed");
    }

    result
}

/// Initialize logging from CLI options alone
fn init_logging(cli: &Cli) -> Result<()> {
    observability::init_with_config(ObservabilityConfig {
        log_format: cli.log_format.unwrap_or_default().into(),
        metrics_port: None,
        default_log_level: cli.log_level_override().unwrap_or("info").to_string(),
    })?;

    info!(version = env!("CARGO_PKG_VERSION"), "watchmux starting");
    Ok(())
}
