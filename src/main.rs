//! RPC connection manager service.
//!
//! Runs the manager as a standalone process: background maintenance, the
//! admin API and config hot reload. Library consumers embed `RpcManager`
//! directly instead.

use clap::Parser;
use std::path::PathBuf;
use tokio::net::TcpListener;

use rpc_manager::admin::{serve_admin, setup_admin_router};
use rpc_manager::config::loader::load_config;
use rpc_manager::config::watcher::ConfigWatcher;
use rpc_manager::config::ManagerConfig;
use rpc_manager::lifecycle::{wait_for_signal, Shutdown};
use rpc_manager::observability::{logging, metrics};
use rpc_manager::RpcManager;

#[derive(Parser)]
#[command(name = "rpc-manager")]
#[command(about = "Resilient multi-endpoint RPC connection manager", long_about = None)]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "rpc-manager.toml")]
    config: PathBuf,

    /// Reload endpoints and tunables when the config file changes.
    #[arg(long)]
    watch: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = if args.config.exists() {
        load_config(&args.config)?
    } else {
        ManagerConfig::default()
    };

    logging::init_logging(&config.observability);
    tracing::info!("rpc-manager v{} starting", env!("CARGO_PKG_VERSION"));
    if !args.config.exists() {
        tracing::warn!(path = ?args.config, "Config file not found, using defaults");
    }

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let manager = RpcManager::new(config.clone())?;
    let shutdown = Shutdown::new();
    let maintenance = manager.start_maintenance(shutdown.subscribe());

    let admin = if config.admin.enabled {
        let listener = TcpListener::bind(&config.admin.bind_address).await?;
        let router = setup_admin_router(manager.clone());
        let admin_shutdown = shutdown.subscribe();
        Some(tokio::spawn(async move {
            if let Err(e) = serve_admin(listener, router, admin_shutdown).await {
                tracing::error!(error = %e, "Admin API failed");
            }
        }))
    } else {
        None
    };

    let watcher = if args.watch && args.config.exists() {
        Some(ConfigWatcher::new(&args.config, manager.clone()).start(shutdown.subscribe())?)
    } else {
        None
    };

    wait_for_signal().await;
    shutdown.trigger();

    maintenance.await?;
    if let Some(admin) = admin {
        admin.await?;
    }
    if let Some(watcher) = watcher {
        watcher.await?;
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
