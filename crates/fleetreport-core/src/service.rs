//! Report orchestration.
//!
//! [`ReportService`] runs one request end to end: period check, scope
//! resolution, per-device fetch and filtering, section assembly and, for
//! exports, document rendering. Devices are processed sequentially and all
//! call-scoped state lives in an [`ExportScope`] owned by the call.

use std::sync::Arc;

use tokio::io::AsyncWrite;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::access::{DeviceAccess, ObjectAccess, RecordStore, TripDetector};
use crate::config::ReportsConfig;
use crate::error::ReportResult;
use crate::export::{DocumentExporter, ExportScope, TemplateRenderer};
use crate::filter::{cache_positions, filter_events, LookupTables};
use crate::model::{Device, Event, Position, TripSegment};
use crate::query::{EventTypeFilter, PeriodPolicy, ReportKind, ReportQuery};
use crate::scope::resolve_devices;
use crate::section::{assemble_section, ReportSection};

/// The collaborators a report is generated from.
#[derive(Clone)]
pub struct ReportBackends {
    /// Device permission lookup.
    pub devices: Arc<dyn DeviceAccess>,
    /// Geofence, maintenance, group, position and preference lookup.
    pub objects: Arc<dyn ObjectAccess>,
    /// Event and position queries.
    pub records: Arc<dyn RecordStore>,
    /// Trip detection.
    pub trips: Arc<dyn TripDetector>,
}

impl ReportBackends {
    /// Use one store for every collaborator.
    pub fn from_store<S>(store: Arc<S>) -> Self
    where
        S: DeviceAccess + ObjectAccess + RecordStore + TripDetector + 'static,
    {
        Self {
            devices: store.clone(),
            objects: store.clone(),
            records: store.clone(),
            trips: store,
        }
    }
}

impl std::fmt::Debug for ReportBackends {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReportBackends").finish_non_exhaustive()
    }
}

/// Generates events, route and trips reports.
#[derive(Debug, Clone)]
pub struct ReportService {
    backends: ReportBackends,
    exporter: DocumentExporter,
    period: PeriodPolicy,
}

impl ReportService {
    /// Create a service from its parts.
    #[must_use]
    pub const fn new(backends: ReportBackends, exporter: DocumentExporter, period: PeriodPolicy) -> Self {
        Self {
            backends,
            exporter,
            period,
        }
    }

    /// Create a service using the template root and period limit of `config`.
    #[must_use]
    pub fn from_config(
        config: &ReportsConfig,
        backends: ReportBackends,
        renderer: Arc<dyn TemplateRenderer>,
    ) -> Self {
        Self::new(
            backends,
            DocumentExporter::new(config.templates_root.clone(), renderer),
            config.period_policy(),
        )
    }

    /// The exporter used for document output.
    #[must_use]
    pub const fn exporter(&self) -> &DocumentExporter {
        &self.exporter
    }

    /// The enforced period policy.
    #[must_use]
    pub const fn period_policy(&self) -> PeriodPolicy {
        self.period
    }

    /// Validate the window and resolve the devices of `query`.
    async fn prepare(&self, query: &ReportQuery) -> ReportResult<Vec<Device>> {
        self.period.check(query)?;
        resolve_devices(self.backends.devices.as_ref(), query).await
    }

    async fn visible_events(
        &self,
        device: &Device,
        types: &EventTypeFilter,
        query: &ReportQuery,
        lookups: &mut LookupTables,
    ) -> ReportResult<Vec<Event>> {
        let events = self
            .backends
            .records
            .events(device.id, query.from(), query.to())
            .await?;
        let fetched = events.len();
        let kept = filter_events(
            events,
            types,
            query.user_id(),
            self.backends.objects.as_ref(),
            lookups,
        )
        .await?;
        debug!(device = %device.id, fetched, kept = kept.len(), "Filtered device events");
        Ok(kept)
    }

    async fn device_positions(&self, device: &Device, query: &ReportQuery) -> ReportResult<Vec<Position>> {
        let positions = self
            .backends
            .records
            .positions(device.id, query.from(), query.to())
            .await?;
        debug!(device = %device.id, count = positions.len(), "Fetched device positions");
        Ok(positions)
    }

    async fn device_trips(&self, device: &Device, query: &ReportQuery) -> ReportResult<Vec<TripSegment>> {
        let trips = self
            .backends
            .trips
            .detect(device, query.from(), query.to())
            .await?;
        debug!(device = %device.id, count = trips.len(), "Detected device trips");
        Ok(trips)
    }

    /// Events of every accessible device, filtered by type and visibility.
    ///
    /// # Errors
    ///
    /// Period errors before any storage access, then collaborator failures.
    #[instrument(skip_all, fields(request_id = %Uuid::new_v4(), user = %query.user_id()))]
    pub async fn events(&self, types: &EventTypeFilter, query: &ReportQuery) -> ReportResult<Vec<Event>> {
        let devices = self.prepare(query).await?;
        let mut lookups = LookupTables::new();
        let mut result = Vec::new();
        for device in &devices {
            result.extend(self.visible_events(device, types, query, &mut lookups).await?);
        }
        info!(devices = devices.len(), records = result.len(), "Events report generated");
        Ok(result)
    }

    /// Positions of every accessible device.
    ///
    /// # Errors
    ///
    /// Period errors before any storage access, then collaborator failures.
    #[instrument(skip_all, fields(request_id = %Uuid::new_v4(), user = %query.user_id()))]
    pub async fn route(&self, query: &ReportQuery) -> ReportResult<Vec<Position>> {
        let devices = self.prepare(query).await?;
        let mut result = Vec::new();
        for device in &devices {
            result.extend(self.device_positions(device, query).await?);
        }
        info!(devices = devices.len(), records = result.len(), "Route report generated");
        Ok(result)
    }

    /// Trips of every accessible device.
    ///
    /// # Errors
    ///
    /// Period errors before any storage access, then collaborator failures.
    #[instrument(skip_all, fields(request_id = %Uuid::new_v4(), user = %query.user_id()))]
    pub async fn trips(&self, query: &ReportQuery) -> ReportResult<Vec<TripSegment>> {
        let devices = self.prepare(query).await?;
        let mut result = Vec::new();
        for device in &devices {
            result.extend(self.device_trips(device, query).await?);
        }
        info!(devices = devices.len(), records = result.len(), "Trips report generated");
        Ok(result)
    }

    /// Render the events report into `sink`.
    ///
    /// # Errors
    ///
    /// Period errors, collaborator failures, then export errors. Nothing is
    /// written to `sink` on failure.
    #[instrument(skip_all, fields(request_id = %Uuid::new_v4(), user = %query.user_id()))]
    pub async fn export_events<W>(
        &self,
        types: &EventTypeFilter,
        query: &ReportQuery,
        sink: &mut W,
    ) -> ReportResult<()>
    where
        W: AsyncWrite + Unpin + Send,
    {
        let devices = self.prepare(query).await?;
        let objects = self.backends.objects.as_ref();
        let mut scope = ExportScope::new();
        let mut sections = Vec::with_capacity(devices.len());

        for device in &devices {
            let events = self
                .visible_events(device, types, query, scope.lookups_mut())
                .await?;
            cache_positions(&events, objects, scope.lookups_mut()).await?;
            sections.push(assemble_section(device, events, query.user_id(), objects).await?);
            scope.push_sheet(&device.name);
        }

        self.finish_export(ReportKind::Events, &sections, &scope, query, sink)
            .await
    }

    /// Render the route report into `sink`.
    ///
    /// # Errors
    ///
    /// Period errors, collaborator failures, then export errors. Nothing is
    /// written to `sink` on failure.
    #[instrument(skip_all, fields(request_id = %Uuid::new_v4(), user = %query.user_id()))]
    pub async fn export_route<W>(&self, query: &ReportQuery, sink: &mut W) -> ReportResult<()>
    where
        W: AsyncWrite + Unpin + Send,
    {
        let devices = self.prepare(query).await?;
        let objects = self.backends.objects.as_ref();
        let mut scope = ExportScope::new();
        let mut sections = Vec::with_capacity(devices.len());

        for device in &devices {
            let positions = self.device_positions(device, query).await?;
            sections.push(assemble_section(device, positions, query.user_id(), objects).await?);
            scope.push_sheet(&device.name);
        }

        self.finish_export(ReportKind::Route, &sections, &scope, query, sink)
            .await
    }

    /// Render the trips report into `sink`.
    ///
    /// # Errors
    ///
    /// Period errors, collaborator failures, then export errors. Nothing is
    /// written to `sink` on failure.
    #[instrument(skip_all, fields(request_id = %Uuid::new_v4(), user = %query.user_id()))]
    pub async fn export_trips<W>(&self, query: &ReportQuery, sink: &mut W) -> ReportResult<()>
    where
        W: AsyncWrite + Unpin + Send,
    {
        let devices = self.prepare(query).await?;
        let objects = self.backends.objects.as_ref();
        let mut scope = ExportScope::new();
        let mut sections = Vec::with_capacity(devices.len());

        for device in &devices {
            let trips = self.device_trips(device, query).await?;
            sections.push(assemble_section(device, trips, query.user_id(), objects).await?);
            scope.push_sheet(&device.name);
        }

        self.finish_export(ReportKind::Trips, &sections, &scope, query, sink)
            .await
    }

    async fn finish_export<R, W>(
        &self,
        kind: ReportKind,
        sections: &[ReportSection<R>],
        scope: &ExportScope,
        query: &ReportQuery,
        sink: &mut W,
    ) -> ReportResult<()>
    where
        R: serde::Serialize + Sync,
        W: AsyncWrite + Unpin + Send,
    {
        let preferences = self.backends.objects.preferences(query.user_id()).await?;
        self.exporter
            .export(kind, sections, scope, &preferences, query, sink)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::{
        MockDeviceAccess, MockObjectAccess, MockRecordStore, MockTripDetector, ObjectRef,
    };
    use crate::error::ReportError;
    use crate::export::MockTemplateRenderer;
    use crate::model::{DeviceId, GeofenceId, GroupId, NamedObject, UserId};
    use crate::preferences::ReportPreferences;
    use chrono::{DateTime, TimeZone, Utc};
    use std::collections::HashMap;
    use std::time::Duration;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, hour, 0, 0).unwrap()
    }

    fn device(id: i64, name: &str) -> Device {
        Device {
            id: DeviceId(id),
            name: name.to_string(),
            group_id: None,
        }
    }

    fn event(id: i64, device: i64, geofence: Option<i64>) -> Event {
        Event {
            id,
            event_type: "geofenceEnter".to_string(),
            event_time: at(10),
            device_id: DeviceId(device),
            position_id: None,
            geofence_id: geofence.map(GeofenceId),
            maintenance_id: None,
            attributes: HashMap::new(),
        }
    }

    struct Mocks {
        devices: MockDeviceAccess,
        objects: MockObjectAccess,
        records: MockRecordStore,
        trips: MockTripDetector,
        renderer: MockTemplateRenderer,
    }

    impl Mocks {
        fn new() -> Self {
            let mut renderer = MockTemplateRenderer::new();
            renderer.expect_extension().return_const("json");
            Self {
                devices: MockDeviceAccess::new(),
                objects: MockObjectAccess::new(),
                records: MockRecordStore::new(),
                trips: MockTripDetector::new(),
                renderer,
            }
        }

        fn service(self, templates: &std::path::Path, period: PeriodPolicy) -> ReportService {
            let backends = ReportBackends {
                devices: Arc::new(self.devices),
                objects: Arc::new(self.objects),
                records: Arc::new(self.records),
                trips: Arc::new(self.trips),
            };
            ReportService::new(
                backends,
                DocumentExporter::new(templates, Arc::new(self.renderer)),
                period,
            )
        }
    }

    fn query(from: DateTime<Utc>, to: DateTime<Utc>) -> ReportQuery {
        ReportQuery::new(UserId(1), [DeviceId(10), DeviceId(11)], [GroupId(3)], from, to).unwrap()
    }

    #[tokio::test]
    async fn test_period_exceeded_touches_no_storage() {
        let mut mocks = Mocks::new();
        mocks.devices.expect_accessible_devices().times(0);
        mocks.records.expect_events().times(0);
        mocks.renderer.expect_render().times(0);

        let service = mocks.service(
            std::path::Path::new("/nonexistent"),
            PeriodPolicy::limited(Duration::from_secs(3600)),
        );

        let err = service
            .events(&EventTypeFilter::all(), &query(at(0), at(5)))
            .await
            .unwrap_err();
        assert!(matches!(err, ReportError::PeriodExceeded { .. }));

        let mut sink = Vec::new();
        let err = service
            .export_route(&query(at(0), at(5)), &mut sink)
            .await
            .unwrap_err();
        assert!(err.is_period_error());
        assert!(sink.is_empty());
    }

    #[tokio::test]
    async fn test_events_are_filtered_per_device_in_resolver_order() {
        let mut mocks = Mocks::new();
        mocks
            .devices
            .expect_accessible_devices()
            .times(2)
            .returning(|_, _, _| Ok(vec![device(11, "B"), device(10, "A")]));
        mocks.records.expect_events().returning(|device_id, _, _| {
            Ok(match device_id.0 {
                10 => vec![event(1, 10, Some(5)), event(2, 10, None)],
                _ => vec![event(3, 11, Some(6))],
            })
        });
        mocks.objects.expect_try_resolve().returning(|_, reference| {
            Ok(match reference {
                ObjectRef::Geofence(GeofenceId(5)) => Some(NamedObject {
                    id: 5,
                    name: "Depot".to_string(),
                }),
                _ => None,
            })
        });

        let service = mocks.service(std::path::Path::new("/nonexistent"), PeriodPolicy::unlimited());
        let q = query(at(0), at(23));

        let first = service.events(&EventTypeFilter::all(), &q).await.unwrap();
        let ids: Vec<i64> = first.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![1, 2]);

        let second = service.events(&EventTypeFilter::all(), &q).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_unscoped_query_yields_empty_report() {
        let mut mocks = Mocks::new();
        mocks.devices.expect_accessible_devices().times(0);
        let service = mocks.service(std::path::Path::new("/nonexistent"), PeriodPolicy::unlimited());

        let q = ReportQuery::new(UserId(1), [], [], at(0), at(1)).unwrap();
        assert!(service.trips(&q).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_export_trips_names_sheets_uniquely() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("export")).unwrap();
        std::fs::write(dir.path().join("export/trips.json"), b"{}").unwrap();

        let mut mocks = Mocks::new();
        mocks
            .devices
            .expect_accessible_devices()
            .returning(|_, _, _| Ok(vec![device(10, "Car"), device(11, "Car")]));
        mocks.trips.expect_detect().times(2).returning(|_, _, _| Ok(Vec::new()));
        mocks
            .objects
            .expect_preferences()
            .times(1)
            .returning(|_| Ok(ReportPreferences::default()));
        mocks
            .renderer
            .expect_render()
            .withf(|_, context| {
                context.get("sheetNames") == Some(&serde_json::json!(["Car", "Car-2"]))
                    && context.get("geofenceNames").is_none()
            })
            .times(1)
            .returning(|_, _| Ok(b"DOC".to_vec()));

        let service = mocks.service(dir.path(), PeriodPolicy::unlimited());
        let mut sink = Vec::new();
        service
            .export_trips(&query(at(0), at(23)), &mut sink)
            .await
            .unwrap();
        assert_eq!(sink, b"DOC");
    }

    #[tokio::test]
    async fn test_storage_failure_aborts_export() {
        let mut mocks = Mocks::new();
        mocks
            .devices
            .expect_accessible_devices()
            .returning(|_, _, _| Ok(vec![device(10, "Car")]));
        mocks
            .records
            .expect_positions()
            .returning(|_, _, _| Err(ReportError::storage("connection reset")));
        mocks.renderer.expect_render().times(0);

        let service = mocks.service(std::path::Path::new("/nonexistent"), PeriodPolicy::unlimited());
        let mut sink = Vec::new();
        let err = service
            .export_route(&query(at(0), at(23)), &mut sink)
            .await
            .unwrap_err();
        assert!(matches!(err, ReportError::StorageUnavailable(_)));
        assert!(sink.is_empty());
    }
}
