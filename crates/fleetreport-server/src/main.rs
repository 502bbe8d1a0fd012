//! # fleetreport-server
//!
//! HTTP server for fleetreport.
//!
//! This binary provides:
//! - REST API for events, route and trips reports
//! - Document export through the configured templates
//! - OpenAPI documentation via Swagger UI
//!
//! ## Running
//!
//! ```bash
//! FLEETREPORT_CONFIG=./fleetreport.toml cargo run --package fleetreport-server
//! ```
//!
//! Every configuration value can be overridden with a `FLEETREPORT_*`
//! environment variable.

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use fleetreport_core::ReportsConfig;
use fleetreport_server::api::create_router;
use fleetreport_server::logging;
use fleetreport_server::state::AppState;
use tokio::net::TcpListener;
use tracing::info;

/// Environment variable naming the configuration file.
const CONFIG_ENV: &str = "FLEETREPORT_CONFIG";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::var_os(CONFIG_ENV).map(PathBuf::from);
    let config = ReportsConfig::load(config_path.as_deref())?;
    config.validate()?;

    logging::init(config.production, &config.log_level)?;

    info!(
        templates_root = %config.templates_root.display(),
        period_limit_secs = config.period_limit_secs,
        "Starting fleetreport-server"
    );

    let addr: SocketAddr = config
        .bind_address
        .parse()
        .with_context(|| format!("invalid bind address '{}'", config.bind_address))?;

    let state = Arc::new(AppState::from_config(config)?);
    let app = create_router(state);

    let listener = TcpListener::bind(addr).await?;
    info!("Listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
