//! RMD Server Binary
//!
//! Standalone server for the duplicate publication admin API.

use std::path::PathBuf;
use std::sync::Arc;

use rmd_core::RmdConfig;
use rmd_server::{serve, AppState};
use tracing_subscriber::EnvFilter;

fn load_config() -> Result<RmdConfig, Box<dyn std::error::Error>> {
    let mut config = match std::env::var_os("RMD_CONFIG") {
        Some(path) => RmdConfig::load(PathBuf::from(path))?,
        None => match RmdConfig::default_path().filter(|p| p.exists()) {
            Some(path) => RmdConfig::load(path)?,
            None => RmdConfig::default(),
        },
    };

    if let Ok(addr) = std::env::var("RMD_ADDR") {
        config.server.addr = addr;
    }
    if let Some(path) = std::env::var_os("RMD_DATABASE") {
        config.server.database_path = PathBuf::from(path);
    }
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = load_config()?;
    let addr = config.server.addr.clone();
    let state = Arc::new(AppState::open(config)?);

    serve(&addr, state).await
}
