//! asbridge runtime - communication subsystem host process

use std::path::PathBuf;

use tracing::{error, info};

use asbridge_runtime::Runtime;
use asbridge_utils::config::ConfigLoader;
use asbridge_utils::Result;
use asbridge_wm::CallbackWorkspaceManager;

#[tokio::main]
async fn main() -> Result<()> {
    asbridge_utils::init_logging()?;
    info!("asbridge runtime starting");

    let config_path = std::env::var("ASBRIDGE_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("asbridge.toml"));
    let config = ConfigLoader::load_from_path(&config_path)?;

    // A host application would supply its own WorkspaceManager; this
    // binary only exists to prove the wiring, so it logs whatever data
    // arrives and never originates any connect/disconnect/send of its
    // own.
    let (manager, _sender) = CallbackWorkspaceManager::new(|server_id, payload| {
        info!(%server_id, bytes = payload.len(), "received data");
    });

    let runtime = Runtime::spawn_tcp(config, manager);

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("failed to listen for shutdown signal: {}", e);
    }

    info!("asbridge runtime shutting down");
    runtime.shutdown().await;
    info!("asbridge runtime stopped");
    Ok(())
}
