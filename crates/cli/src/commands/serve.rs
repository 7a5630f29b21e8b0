//! `serve` command implementation.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{info, warn};

use config_loader::{ConfigLoader, ServerConfig};
use multiplex::SourceRegistry;
use observability::ObservabilityConfig;
use wire::{resp_detector, HttpHandler, RespHandler, RunningServer, ServerBuilder, ServerHandle};

use crate::cli::{Cli, ServeArgs};
use crate::demo::TickerSource;

/// Execute the `serve` command
pub async fn run_serve(cli: &Cli, args: &ServeArgs) -> Result<()> {
    let from_file = args.config.exists();
    let mut config = load_config(args)?;
    apply_overrides(&mut config, args);

    // Dry run - just validate and exit
    if args.dry_run {
        println!("{}", ConfigLoader::to_toml(&config)?);
        return Ok(());
    }

    // Logging and the metrics exporter come up here rather than at
    // program start, so the file's [log] section takes effect.
    observability::init_with_config(observability_config(cli, &config))
        .context("Failed to initialize observability")?;

    info!(version = env!("CARGO_PKG_VERSION"), "watchmux starting");
    if from_file {
        info!(config = %args.config.display(), "Configuration loaded");
    } else {
        info!(config = %args.config.display(), "Configuration file not found, using defaults");
    }
    info!(
        listen = %config.server.listen,
        http_prefix = %config.server.http_prefix,
        metrics_port = ?config.metrics.port,
        "Effective configuration"
    );

    let registry = Arc::new(SourceRegistry::new());
    let mut ticker_task = None;
    if args.demo {
        let ticker = Arc::new(TickerSource::new());
        registry
            .add(Arc::clone(&ticker) as Arc<dyn contracts::DataSource>)
            .context("Failed to register demo source")?;
        observability::record_source_registered("ticker");
        ticker_task = Some(spawn_ticker(ticker, args.tick_interval_ms));
    }

    // Auto-detect server: RESP traffic is recognized by its first byte,
    // everything else falls through to HTTP.
    let handle = ServerHandle::new();
    let http = Arc::new(HttpHandler::new(
        Arc::clone(&registry),
        &config.server.http_prefix,
        handle.clone(),
    ));
    let resp = Arc::new(RespHandler::new(Arc::clone(&registry)));

    let server = ServerBuilder::new(http)
        .with_handle(handle)
        .detect(resp_detector(resp))
        .start(&config.server.listen)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.listen))?;

    let mut extra = Vec::new();
    if let Some(ref addr) = config.server.http_listen {
        extra.push(start_http_only(&registry, &config, addr).await?);
    }
    if let Some(ref addr) = config.server.resp_listen {
        let resp_only = Arc::new(RespHandler::new(Arc::clone(&registry)));
        let s = ServerBuilder::new(resp_only)
            .start(addr)
            .await
            .with_context(|| format!("Failed to bind {addr}"))?;
        info!(addr = %s.local_addr(), "RESP listener up");
        extra.push(s);
    }

    info!(addr = %server.local_addr(), "watchmux serving");

    shutdown_signal().await;
    warn!("Received shutdown signal, stopping server...");

    if let Some(task) = ticker_task {
        task.abort();
    }
    server.stop().await;
    for s in extra {
        s.stop().await;
    }

    info!("watchmux finished");
    Ok(())
}

fn load_config(args: &ServeArgs) -> Result<ServerConfig> {
    if !args.config.exists() {
        return Ok(ServerConfig::default());
    }
    ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))
}

/// Apply CLI overrides on top of the file configuration.
///
/// Runs before logging is initialized, so it stays silent; the caller
/// logs the effective configuration afterwards.
fn apply_overrides(config: &mut ServerConfig, args: &ServeArgs) {
    if let Some(ref listen) = args.listen {
        config.server.listen = listen.clone();
    }
    if let Some(ref prefix) = args.http_prefix {
        config.server.http_prefix = prefix.clone();
    }
    if let Some(port) = args.metrics_port {
        config.metrics.port = if port == 0 { None } else { Some(port) };
    }
}

/// Merge the file's [log] and [metrics] sections with explicit CLI
/// flags. Flags win where given; `RUST_LOG` still overrides the level
/// inside the subscriber itself.
fn observability_config(cli: &Cli, config: &ServerConfig) -> ObservabilityConfig {
    let log_format = match cli.log_format {
        Some(format) => format.into(),
        None => match config.log.format {
            config_loader::LogFormat::Pretty => observability::LogFormat::Pretty,
            config_loader::LogFormat::Json => observability::LogFormat::Json,
            config_loader::LogFormat::Compact => observability::LogFormat::Compact,
        },
    };
    ObservabilityConfig {
        log_format,
        metrics_port: config.metrics.port,
        default_log_level: cli
            .log_level_override()
            .map(str::to_string)
            .unwrap_or_else(|| config.log.level.clone()),
    }
}

async fn start_http_only(
    registry: &Arc<SourceRegistry>,
    config: &ServerConfig,
    addr: &str,
) -> Result<RunningServer> {
    let handle = ServerHandle::new();
    let http = Arc::new(HttpHandler::new(
        Arc::clone(registry),
        &config.server.http_prefix,
        handle.clone(),
    ));
    let server = ServerBuilder::new(http)
        .with_handle(handle)
        .start(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!(addr = %server.local_addr(), "HTTP listener up");
    Ok(server)
}

fn spawn_ticker(ticker: Arc<TickerSource>, interval_ms: u64) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_millis(interval_ms.max(1)));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // First tick fires immediately; skip it so the counter starts
        // moving one interval after startup.
        interval.tick().await;
        loop {
            interval.tick().await;
            ticker.tick();
        }
    })
}

/// Wait for Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
