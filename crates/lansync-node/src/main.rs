//! LAN sync node entry point.
//!
//! Wires together identity, the device registry, the sync server, and an
//! initial discovery scan on the Tokio runtime.
//!
//! # Architecture
//!
//! ```text
//! main()
//!  └─ load_config()          -- TOML config, defaults when absent
//!  └─ LocalIdentity          -- persisted device id + hostname
//!  └─ TomlDeviceRegistry     -- tracked devices on disk
//!  └─ start services
//!       ├─ SyncServer        (TCP accept loop)
//!       └─ DiscoveryScanner  (one initial subnet scan, logged)
//! ```

use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use lansync_node::infrastructure::identity::LocalIdentity;
use lansync_node::infrastructure::network::scanner::{DiscoveryScanner, ScannerConfig};
use lansync_node::infrastructure::network::server::{ServerConfig, SyncServer};
use lansync_node::infrastructure::storage::config;
use lansync_node::infrastructure::storage::registry::{DeviceRegistry, TomlDeviceRegistry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_dir = config::config_dir()?;
    let cfg = config::load_config(&config_dir)?;

    // Initialise structured logging.  Level is overridden by `RUST_LOG`.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(cfg.node.log_level.clone())),
        )
        .init();

    info!("LAN sync node starting");

    let data_dir = cfg.node.data_dir.clone().unwrap_or(config_dir);
    let identity = Arc::new(LocalIdentity::load_or_create(&data_dir)?);
    info!("local device id is {}", identity.device_id());

    let registry = Arc::new(TomlDeviceRegistry::open(&data_dir)?);
    info!("tracking {} devices from previous runs", registry.get().len());

    let server = SyncServer::new(
        ServerConfig {
            port: cfg.network.sync_port,
        },
        identity.clone(),
        registry.clone(),
    );

    // ── Initial discovery scan ────────────────────────────────────────────────
    let scanner = DiscoveryScanner::new(ScannerConfig {
        port: cfg.network.sync_port,
        probe_timeout: cfg.probe_timeout(),
        local_addr: None,
    });
    let mut discoveries = scanner.scan();
    tokio::spawn(async move {
        while let Some(device) = discoveries.recv().await {
            info!("discovered peer: {} ({}) at {}", device.name, device.id, device.ip);
        }
        info!("initial discovery scan finished");
    });

    // ── Sync server ───────────────────────────────────────────────────────────
    tokio::select! {
        result = server.start() => {
            if let Err(e) = result {
                error!("sync server failed: {e}");
                return Err(e.into());
            }
            info!("sync server stopped");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown requested");
        }
    }

    Ok(())
}
