//! CLI command implementations

use std::fs;
use std::path::PathBuf;

use anyhow::Result;

use crate::cli::{error, info, success, warn};
use crate::config;

/// Write a default courier.toml in the current directory.
pub async fn init() -> Result<()> {
    let config_path = std::path::Path::new("courier.toml");

    if config_path.exists() {
        warn("courier.toml already exists");
        return Ok(());
    }

    let content = config::default_config_content();
    fs::write(config_path, content)?;

    success("Created courier.toml");
    info("Edit the configuration file and run 'courier-broker serve' to start the broker");

    Ok(())
}

/// Start the broker's HTTP/WS server.
pub async fn serve(config_path: Option<PathBuf>, host: Option<String>, port: Option<u16>) -> Result<()> {
    let mut cfg = match config_path {
        Some(ref path) => config::load_config_from_path(path).map_err(|e| anyhow::anyhow!("{}", e))?,
        None => config::load_config().map_err(|e| anyhow::anyhow!("{}", e))?,
    };
    config::apply_env_overrides(&mut cfg);

    let host = host.unwrap_or_else(|| cfg.host.clone());
    let port = port.unwrap_or(cfg.port);

    info(&format!("Starting broker at ws://{}:{}", host, port));

    if let Err(e) = crate::api::run_server(cfg, &host, port).await {
        error(&format!("Server error: {}", e));
        return Err(e.into());
    }

    Ok(())
}
