//! Prometheus exporter for W&T SNMP temperature sensors.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::sync::watch;
use tracing::{Level, error, info};
use tracing_subscriber::EnvFilter;

use wut_temperature_exporter::config::LogFormat;
use wut_temperature_exporter::{ExporterConfig, HttpServer};

/// Prometheus exporter for W&T temperature sensors.
#[derive(Parser, Debug)]
#[command(name = "wut-temperature-exporter")]
#[command(about = "Export W&T SNMP temperature readings as Prometheus metrics")]
#[command(version)]
struct Args {
    /// Path to configuration file (JSON5 format). Defaults to the fixed
    /// search path.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// HTTP listen address (overrides config).
    #[arg(long)]
    listen: Option<String>,

    /// Log level (trace, debug, info, warn, error; overrides config).
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load configuration; a missing or invalid file is fatal.
    let mut config = match &args.config {
        Some(path) => ExporterConfig::load_from_file(path)
            .with_context(|| format!("Failed to load config from {:?}", path))?,
        None => ExporterConfig::load_default().context("No valid configuration found")?,
    };

    // Override listen address from CLI
    if let Some(listen) = args.listen {
        config.http.listen = listen;
        config.validate().context("Invalid CLI override")?;
    }

    // Initialize logging
    let log_level = args
        .log_level
        .unwrap_or_else(|| config.logging.level.clone());
    let log_level = log_level.parse().unwrap_or(Level::INFO);
    let filter = EnvFilter::from_default_env()
        .add_directive(format!("wut_temperature_exporter={}", log_level).parse()?);

    match config.logging.format {
        LogFormat::Json => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .json()
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
        }
    }

    info!(
        targets = config.targets.len(),
        listen = %config.http.listen,
        "Starting wut-temperature-exporter"
    );

    let listen_addr: SocketAddr = config
        .http
        .listen
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid listen address: {}", e))?;
    let grace = Duration::from_secs(config.http.shutdown_grace_secs);
    let config = Arc::new(config);

    // Create shutdown signal
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let server = HttpServer::new(config.clone(), listen_addr);
    let http_task = tokio::spawn(async move {
        if let Err(e) = server.run(shutdown_rx).await {
            error!("HTTP server error: {}", e);
        }
    });

    // Wait for shutdown signal
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down...");
        }
        _ = async {
            #[cfg(unix)]
            {
                let mut sigterm = tokio::signal::unix::signal(
                    tokio::signal::unix::SignalKind::terminate()
                ).unwrap();
                sigterm.recv().await;
            }
            #[cfg(not(unix))]
            {
                std::future::pending::<()>().await;
            }
        } => {
            info!("Received SIGTERM, shutting down...");
        }
    }

    // Stop accepting scrapes and drain in-flight ones. The grace period can
    // be shorter than a worst-case walk; overrunning it aborts the process
    // loudly rather than hanging shutdown.
    shutdown_tx.send(true)?;

    if tokio::time::timeout(grace, http_task).await.is_err() {
        error!(
            grace_secs = config.http.shutdown_grace_secs,
            "In-flight scrapes exceeded the shutdown grace period; forcing exit"
        );
        std::process::exit(1);
    }

    info!("Exporter stopped");
    Ok(())
}
