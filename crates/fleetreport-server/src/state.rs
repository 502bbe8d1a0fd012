//! Application state shared across handlers.

use std::sync::Arc;

use fleetreport_core::{
    JsonWorkbookRenderer, ReportBackends, ReportService, ReportsConfig, SnapshotStore,
};
use tracing::warn;

/// State handed to every handler.
pub type SharedState = Arc<AppState>;

/// Report service plus the configuration it was built from.
#[derive(Debug)]
pub struct AppState {
    /// Report generation.
    pub service: ReportService,
    /// Loaded configuration.
    pub config: ReportsConfig,
}

impl AppState {
    /// Wrap an already built service.
    #[must_use]
    pub const fn new(config: ReportsConfig, service: ReportService) -> Self {
        Self { service, config }
    }

    /// Build the service described by `config`.
    ///
    /// Reports are served from the configured snapshot; without one every
    /// report is empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be loaded.
    pub fn from_config(config: ReportsConfig) -> anyhow::Result<Self> {
        let store = match &config.snapshot_path {
            Some(path) => SnapshotStore::load(path)?,
            None => {
                warn!("No snapshot_path configured, serving empty reports");
                SnapshotStore::default()
            }
        };

        let service = ReportService::from_config(
            &config,
            ReportBackends::from_store(Arc::new(store)),
            Arc::new(JsonWorkbookRenderer::new()),
        );
        Ok(Self::new(config, service))
    }
}
