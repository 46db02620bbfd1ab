//! routemgr-daemon - management daemon for routemgr backend clients.
//!
//! Binds the backend Unix socket, accepts feature-daemon connections, and
//! keeps each connected client in sync with the configuration datastore.
//! The datastore itself is seeded from a TOML file (or starts empty); the
//! in-crate initial-sync coordinator plays the transaction manager.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use routemgr_core::SubscriptionMap;
use routemgr_daemon::datastore::MemoryDatastore;
use routemgr_daemon::txn::InitialSyncCoordinator;
use routemgr_daemon::{BackendServer, DaemonConfig, DaemonState};
use tokio::signal::unix::{signal, SignalKind};
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// routemgr management daemon
#[derive(Parser, Debug)]
#[command(name = "routemgr-daemon")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the daemon configuration file
    #[arg(short, long, default_value = "routemgr.toml")]
    config: PathBuf,

    /// Override the backend socket path from the config file
    #[arg(long)]
    socket: Option<PathBuf>,

    /// Seed datastore: a TOML file with a [nodes] table of xpath = value
    #[arg(long)]
    datastore: Option<PathBuf>,

    /// Log level when RUST_LOG is not set (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(args.log_level.clone()));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut config = if args.config.exists() {
        DaemonConfig::from_file(&args.config).context("failed to load configuration")?
    } else {
        info!("config file {:?} not found, using defaults", args.config);
        DaemonConfig::default()
    };
    if let Some(socket) = args.socket {
        config.socket_path = socket;
    }

    let datastore = match &args.datastore {
        Some(path) => load_datastore(path)
            .with_context(|| format!("failed to load datastore seed from {}", path.display()))?,
        None => MemoryDatastore::new(),
    };
    info!("datastore seeded with {} nodes", datastore.len());

    let subscriptions = Arc::new(SubscriptionMap::from_static_registry());
    let txn = Arc::new(InitialSyncCoordinator::new(
        Arc::new(datastore),
        Arc::clone(&subscriptions),
    ));
    let state = DaemonState::new(config, subscriptions, txn);

    let server = BackendServer::bind(&state.config.socket_path)?;

    let mut sigint = signal(SignalKind::interrupt()).context("failed to install SIGINT handler")?;
    let mut sigterm =
        signal(SignalKind::terminate()).context("failed to install SIGTERM handler")?;
    let shutdown = CancellationToken::new();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        tokio::select! {
            _ = sigint.recv() => info!("received SIGINT"),
            _ = sigterm.recv() => info!("received SIGTERM"),
        }
        trigger.cancel();
    });

    server.run(state, shutdown).await;
    Ok(())
}

/// Reads a `[nodes]` table of `xpath = "value"` pairs.
fn load_datastore(path: &Path) -> Result<MemoryDatastore> {
    #[derive(serde::Deserialize)]
    struct Seed {
        #[serde(default)]
        nodes: std::collections::BTreeMap<String, String>,
    }

    let text = std::fs::read_to_string(path)?;
    let seed: Seed = toml::from_str(&text)?;
    Ok(seed.nodes.into_iter().collect())
}
