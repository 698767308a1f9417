use hub::app::App;
use hub::error::HubError;
use hub::logger::initialize as LoggerInitialize;

use ipc_core::config::IpcConfig;

use std::fs::create_dir_all;
use std::path::PathBuf;

use log::{info, warn};

const APP_DIR_NAME: &str = "state-sync-hub";

fn ensure_dir(dir: Option<PathBuf>, kind: &str) -> Result<PathBuf, HubError> {
    let dir = dir.ok_or_else(|| HubError::hub(format!("Failed to get {kind} directory")))?;
    create_dir_all(&dir).map_err(|e| {
        HubError::hub(format!("Failed to create {kind} directory {}: {e}", dir.display()))
    })?;
    Ok(dir)
}

#[tokio::main]
async fn main() -> Result<(), HubError> {
    // Logger first, so config problems are recorded
    let log_dir = ensure_dir(
        dirs::data_local_dir().map(|dir| dir.join(APP_DIR_NAME).join("logs")),
        "log",
    )?;
    LoggerInitialize(&log_dir)?;

    info!("Hub starting");

    let config_dir = ensure_dir(dirs::config_dir().map(|dir| dir.join(APP_DIR_NAME)), "config")?;
    let config = IpcConfig::load(&config_dir).unwrap_or_else(|e| {
        warn!("Ignoring unusable config, using defaults: {e}");
        IpcConfig::default()
    });

    let app = App::start(&config).await?;

    tokio::signal::ctrl_c()
        .await
        .map_err(|e| HubError::hub(format!("Failed to listen for Ctrl-C: {e}")))?;

    info!("Ctrl-C received, shutting down");
    app.shutdown();
    Ok(())
}
