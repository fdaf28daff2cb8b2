//! procwatch daemon - Main Entry Point
//! Supervisor + sampler + snapshot hub + JSON-RPC server

mod logging;
mod settings;

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

// Import workspace crates
use procwatch_api_rpc::{RpcServer, RpcServerConfig};
use procwatch_core::application::constants::{HUB_QUEUE_CAPACITY, METRICS_CAPACITY, SAMPLER_INTERVAL};
use procwatch_core::application::{
    shutdown_channel, BroadcastHub, Registry, Sampler, Supervisor, SupervisorSettings,
};
use procwatch_core::port::{ConfigStore, SystemTimeProvider};
use procwatch_infra_config::JsonConfigStore;
use procwatch_infra_system::{KindDispatcher, SysinfoProbe};
use settings::DaemonSettings;

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Settings + logging
    let settings = DaemonSettings::from_env();
    let _log_guard = logging::init(&settings)?;

    info!("procwatch daemon v{} starting...", VERSION);

    // 2. Load target configuration
    info!(config_path = %settings.config_path.display(), "Loading configuration...");
    let store = Arc::new(JsonConfigStore::new(&settings.config_path));
    let config = store
        .load()
        .await
        .map_err(|e| anyhow::anyhow!("Config load failed: {}", e))?;
    info!(targets = config.targets.len(), "Configuration loaded");

    // 3. Setup dependencies (DI wiring)
    let registry = Arc::new(Registry::from_config(&config, METRICS_CAPACITY)?);
    let supervisor = Supervisor::new(
        registry,
        Arc::new(KindDispatcher::system()),
        store,
        Arc::new(SystemTimeProvider),
        SupervisorSettings::new(&settings.log_dir),
    );
    let hub = Arc::new(BroadcastHub::new(HUB_QUEUE_CAPACITY));
    let (shutdown_tx, shutdown_rx) = shutdown_channel();

    // 4. Snapshot hub fan-out loop
    let hub_task = {
        let hub = hub.clone();
        let shutdown = shutdown_rx.clone();
        tokio::spawn(async move {
            if let Err(e) = hub.run(shutdown).await {
                error!(error = ?e, "Snapshot hub failed");
            }
        })
    };

    // 5. Sampler (telemetry, service reconciliation, snapshots)
    let sampler = Sampler::new(
        supervisor.clone(),
        Arc::new(SysinfoProbe::new()),
        hub.clone(),
        SAMPLER_INTERVAL,
    );
    let sampler_task = {
        let shutdown = shutdown_rx.clone();
        tokio::spawn(async move { sampler.run(shutdown).await })
    };

    // 6. Start JSON-RPC server
    info!("Starting JSON-RPC server...");
    let rpc_config = RpcServerConfig {
        host: settings.rpc_host.clone(),
        port: settings.rpc_port,
    };
    let rpc_handle = RpcServer::new(rpc_config, supervisor.clone(), hub.clone())
        .map_err(|e| anyhow::anyhow!("RPC server setup failed: {}", e))?
        .start()
        .await
        .map_err(|e| anyhow::anyhow!("RPC server start failed: {}", e))?;

    // 7. Optional boot-time start
    if settings.autostart {
        let report = supervisor.start_all().await;
        if report.is_partial_failure() {
            for (id, err) in &report.errors {
                warn!(target_id = %id, error = %err, "Autostart failed");
            }
        }
        info!(started = report.succeeded.len(), "Autostart complete");
    }

    info!("System ready. Press Ctrl+C to shutdown");

    // 8. Wait for shutdown signal
    tokio::signal::ctrl_c().await?;

    info!("Shutdown signal received. Exiting gracefully...");

    // 9. Graceful shutdown; supervised targets keep running
    shutdown_tx.shutdown();
    rpc_handle
        .stop()
        .map_err(|e| anyhow::anyhow!("RPC server stop failed: {}", e))?;
    let _ = tokio::time::timeout(Duration::from_secs(5), async {
        let _ = sampler_task.await;
        let _ = hub_task.await;
    })
    .await;

    info!("Shutdown complete.");

    Ok(())
}
