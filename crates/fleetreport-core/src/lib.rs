//! # fleetreport-core
//!
//! Permission-scoped fleet report generation.
//!
//! This crate provides:
//! - Events, route and trips reports over the devices a user may access
//! - Visibility filtering of events by geofence and maintenance grants
//! - Spreadsheet-style document export through a pluggable templating engine
//! - An in-process snapshot store implementing every storage contract
//!
//! ## Architecture
//!
//! The crate is organized into the following modules:
//!
//! - [`access`] - Storage and permission contracts consumed by the pipeline
//! - [`config`] - Configuration loading and validation
//! - [`error`] - Unified error types for the crate
//! - [`export`] - Template binding and document output
//! - [`filter`] - Event type and visibility filtering
//! - [`model`] - Devices, groups, events, positions and trips
//! - [`preferences`] - Per-user display preferences
//! - [`query`] - Report requests and the period policy
//! - [`render`] - JSON workbook rendering backend
//! - [`scope`] - Device scope resolution
//! - [`section`] - Per-device report sections
//! - [`service`] - Report orchestration
//! - [`sheet`] - Sheet name sanitizing and de-duplication
//! - [`snapshot`] - JSON snapshot storage backend

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![warn(missing_docs)]

pub mod access;
pub mod config;
pub mod error;
pub mod export;
pub mod filter;
pub mod model;
pub mod preferences;
pub mod query;
pub mod render;
pub mod scope;
pub mod section;
pub mod service;
pub mod sheet;
pub mod snapshot;

// Re-export primary types for convenience
pub use access::{DeviceAccess, ObjectAccess, ObjectRef, RecordStore, TripDetector};
pub use config::{ConfigError, ConfigResult, ReportsConfig, ENV_PREFIX};
pub use error::{ReportError, ReportResult};
pub use export::{DocumentExporter, ExportScope, RenderContext, TemplateRenderer};
pub use filter::LookupTables;
pub use model::{
    Device, DeviceId, Event, GeofenceId, Group, GroupId, MaintenanceId, NamedObject, Position,
    PositionId, TripSegment, UserId,
};
pub use preferences::{DistanceUnit, ReportPreferences, SpeedUnit, VolumeUnit};
pub use query::{EventTypeFilter, PeriodPolicy, ReportKind, ReportQuery};
pub use render::JsonWorkbookRenderer;
pub use section::ReportSection;
pub use service::{ReportBackends, ReportService};
pub use sheet::{sanitize_sheet_name, SheetNameTable, MAX_SHEET_NAME_LEN};
pub use snapshot::{Snapshot, SnapshotStore, UserGrant};
