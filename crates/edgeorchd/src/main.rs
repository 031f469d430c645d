//! edgeorchd — the EdgeOrch device daemon.
//!
//! Single binary that assembles one device's decision engine:
//! - Admission tables, fed only from the service descriptor directory
//! - Resource scorer (sysinfo + sysfs + HTTP ping)
//! - Score exchange with seed peers
//! - REST API for callers and peers
//!
//! # Usage
//!
//! ```text
//! edgeorchd run --config /etc/edgeorch/edgeorch.toml
//! edgeorchd default-config > edgeorch.toml
//! ```

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use edgeorch_core::EngineConfig;
use edgeorch_engine::{DescriptorReloader, EngineBuilder};

const DEFAULT_FILTER: &str = "info,edgeorchd=debug,edgeorch=debug";

#[derive(Parser)]
#[command(name = "edgeorchd", about = "EdgeOrch decision engine daemon")]
struct Cli {
    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the engine and serve the REST API.
    Run {
        /// Path to edgeorch.toml. Defaults apply when omitted.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Override `device.listen_port`.
        #[arg(long)]
        port: Option<u16>,
    },
    /// Print the default configuration as TOML.
    DefaultConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    match cli.command {
        Command::Run { config, port } => run(config.as_deref(), port).await,
        Command::DefaultConfig => {
            print!("{}", EngineConfig::default().to_toml_string()?);
            Ok(())
        }
    }
}

fn init_tracing(json: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_config(path: Option<&Path>, port: Option<u16>) -> anyhow::Result<EngineConfig> {
    let mut config = match path {
        Some(path) => EngineConfig::from_file(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => {
            warn!("no --config given, running with defaults");
            EngineConfig::default()
        }
    };
    if let Some(port) = port {
        config.device.listen_port = port;
    }
    Ok(config)
}

async fn run(config_path: Option<&Path>, port: Option<u16>) -> anyhow::Result<()> {
    let config = load_config(config_path, port)?;
    info!("EdgeOrch daemon starting");

    // ── Initialize engine ──────────────────────────────────────

    let engine = Arc::new(EngineBuilder::from_config(&config)?.build());
    info!(
        device_id = %engine.device_id(),
        address = %engine.address(),
        "decision engine initialized"
    );

    // ── Shutdown signal ────────────────────────────────────────

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // ── Start background tasks ─────────────────────────────────

    let exchange = engine.score_exchange(config.publish_interval(), config.liveness_window());
    let exchange_shutdown = shutdown_rx.clone();
    let exchange_handle = tokio::spawn(async move {
        exchange.run(exchange_shutdown).await;
    });

    let reload_handle = match config.services.dir.clone() {
        Some(dir) => {
            let reloader = DescriptorReloader::new(engine.clone(), dir, config.reload_interval());
            let reload_shutdown = shutdown_rx.clone();
            Some(tokio::spawn(async move {
                reloader.run(reload_shutdown).await;
            }))
        }
        None => {
            info!("no services.dir configured, services come from the API only");
            None
        }
    };

    // ── Start API server ───────────────────────────────────────

    let router = edgeorch_api::build_router(engine.clone());
    let addr = SocketAddr::from(([0, 0, 0, 0], config.device.listen_port));
    info!(%addr, "API server starting");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for ctrl-c");
        }
        info!("shutdown signal received");
        let _ = shutdown_tx.send(true);
    })
    .await?;

    // Wait for background tasks.
    let _ = exchange_handle.await;
    if let Some(handle) = reload_handle {
        let _ = handle.await;
    }

    engine.close();
    info!("EdgeOrch daemon stopped");
    Ok(())
}
