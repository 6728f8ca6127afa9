//! IPv6 Neighbor Discovery daemon
//!
//! Main entry point for ndpd. Opens a raw socket per configured interface,
//! learns neighbors from received solicitations and probes them with
//! unicast solicitations until they answer or are evicted.
//!
//! # NIST 800-53 Rev 5 Control Mappings
//! - AU-3: Content of Audit Records - Structured logging
//! - AU-12: Audit Record Generation - Log daemon lifecycle
//! - CM-6: Configuration Settings - Validated TOML configuration
//! - SI-4: System Monitoring - Neighbor reachability tracking

use anyhow::{Context, Result};
use clap::Parser;
use ndpd::api::{self, ApiState};
use ndpd::{LogSink, MetricsCollector, NdpServer, NdpdConfig, config::DEFAULT_CONFIG_PATH};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// IPv6 neighbor discovery and unreachability detection daemon
#[derive(Parser, Debug)]
#[command(name = "ndpd")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file (TOML)
    #[arg(short = 'c', long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(short = 'l', long, default_value = "info")]
    log_level: String,

    /// Do not start the HTTP API even if enabled in the config
    #[arg(long)]
    no_api: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level)?;

    info!("ndpd: Starting neighbor discovery daemon");

    match run_daemon(args).await {
        Ok(()) => {
            info!("ndpd: Daemon exiting normally");
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "ndpd: Daemon exiting with error");
            Err(e)
        }
    }
}

/// Initialize structured logging
///
/// # NIST Controls
/// - AU-3: Content of Audit Records - Target, thread, file and line per event
/// - AU-12: Audit Record Generation - Level set by CLI or RUST_LOG
fn init_logging(level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber).context("Failed to set logger")?;
    Ok(())
}

/// # NIST Controls
/// - CM-6: Configuration Settings - Reject invalid configuration at startup
/// - SI-4: System Monitoring - Per-interface NUD until ctrl-c
async fn run_daemon(args: Args) -> Result<()> {
    let config = NdpdConfig::load_or_default(&args.config)
        .with_context(|| format!("Loading {}", args.config.display()))?;
    config.validate().context("Invalid configuration")?;
    if config.interfaces.is_empty() {
        anyhow::bail!("no interfaces configured in {}", args.config.display());
    }

    let metrics = MetricsCollector::new().context("Failed to create metrics registry")?;
    let server = NdpServer::start(&config, Arc::new(LogSink), metrics.clone()).await?;

    let api_task = if config.global.api_enabled && !args.no_api {
        let state = ApiState {
            handles: server.handles(),
            metrics,
        };
        let port = config.global.api_port;
        Some(tokio::spawn(async move {
            if let Err(e) = api::serve(port, state).await {
                error!(error = %e, "ndpd: API server failed");
            }
        }))
    } else {
        None
    };

    info!(
        interfaces = config.interfaces.len(),
        "ndpd: Listening for neighbor discovery traffic"
    );
    signal::ctrl_c().await.context("Failed to wait for shutdown signal")?;
    info!("ndpd: Received SIGINT, shutting down");

    if let Some(task) = api_task {
        task.abort();
    }
    server.shutdown().await;

    info!("ndpd: Graceful shutdown complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_defaults() {
        let args = Args::parse_from(["ndpd"]);
        assert_eq!(args.config, PathBuf::from(DEFAULT_CONFIG_PATH));
        assert_eq!(args.log_level, "info");
        assert!(!args.no_api);
    }

    #[test]
    fn test_args_overrides() {
        let args = Args::parse_from(["ndpd", "-c", "/tmp/ndpd.toml", "--no-api", "-l", "debug"]);
        assert_eq!(args.config, PathBuf::from("/tmp/ndpd.toml"));
        assert_eq!(args.log_level, "debug");
        assert!(args.no_api);
    }
}
