//! End-to-end report generation over a snapshot store.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use fleetreport_core::{
    Device, DeviceId, DocumentExporter, Event, EventTypeFilter, GeofenceId, Group, GroupId,
    JsonWorkbookRenderer, MaintenanceId, NamedObject, PeriodPolicy, Position, PositionId, ReportBackends,
    ReportError, ReportQuery, ReportService, Snapshot, SnapshotStore, UserGrant, UserId,
};
use serde_json::Value;

fn at(hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, hour, 0, 0).unwrap()
}

fn event(id: i64, hour: u32, geofence: Option<i64>, position: Option<i64>) -> Event {
    Event {
        id,
        event_type: "geofenceEnter".to_string(),
        event_time: at(hour),
        device_id: DeviceId(10),
        position_id: position.map(PositionId),
        geofence_id: geofence.map(GeofenceId),
        maintenance_id: None,
        attributes: HashMap::new(),
    }
}

fn maintenance_event(id: i64, hour: u32, maintenance: i64) -> Event {
    Event {
        event_type: "maintenance".to_string(),
        maintenance_id: Some(MaintenanceId(maintenance)),
        ..event(id, hour, None, None)
    }
}

fn position(id: i64, hour: u32) -> Position {
    Position {
        id: PositionId(id),
        device_id: DeviceId(10),
        fix_time: at(hour),
        valid: true,
        latitude: 52.52,
        longitude: 13.40,
        altitude: 34.0,
        speed: 12.5,
        course: 90.0,
        address: None,
        attributes: HashMap::new(),
    }
}

fn snapshot() -> Snapshot {
    Snapshot {
        devices: vec![Device {
            id: DeviceId(10),
            name: "Van: North/1".to_string(),
            group_id: Some(GroupId(3)),
        }],
        groups: vec![Group {
            id: GroupId(3),
            name: "North".to_string(),
            group_id: None,
        }],
        geofences: vec![
            NamedObject {
                id: 5,
                name: "Depot".to_string(),
            },
            NamedObject {
                id: 6,
                name: "Competitor yard".to_string(),
            },
        ],
        maintenance: vec![
            NamedObject {
                id: 9,
                name: "Oil change".to_string(),
            },
            NamedObject {
                id: 8,
                name: "Tyre swap".to_string(),
            },
        ],
        positions: vec![position(100, 8), position(101, 12)],
        events: vec![
            event(1, 8, Some(5), Some(100)),
            event(2, 10, Some(6), None),
            event(3, 12, None, Some(101)),
            maintenance_event(4, 14, 9),
            maintenance_event(5, 15, 8),
        ],
        users: vec![UserGrant {
            devices: vec![DeviceId(10)],
            groups: vec![GroupId(3)],
            geofences: vec![GeofenceId(5)],
            maintenance: vec![MaintenanceId(9)],
            ..UserGrant::new(UserId(1))
        }],
        ..Snapshot::default()
    }
}

fn templates() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    let export = dir.path().join("export");
    std::fs::create_dir_all(&export).unwrap();
    std::fs::write(
        export.join("events.json"),
        r#"{
            "title": "Events",
            "columns": [
                "eventTime",
                "type",
                { "field": "geofenceId", "lookup": "geofenceNames", "header": "Geofence" },
                { "field": "maintenanceId", "lookup": "maintenanceNames", "header": "Maintenance" }
            ]
        }"#,
    )
    .unwrap();
    std::fs::write(
        export.join("route.json"),
        r#"{ "title": "Route", "columns": ["fixTime", "latitude", "longitude"] }"#,
    )
    .unwrap();
    dir
}

fn service(templates: &std::path::Path) -> ReportService {
    let store = Arc::new(SnapshotStore::from_snapshot(snapshot()));
    ReportService::new(
        ReportBackends::from_store(store),
        DocumentExporter::new(templates, Arc::new(JsonWorkbookRenderer::new())),
        PeriodPolicy::unlimited(),
    )
}

fn query(from: DateTime<Utc>, to: DateTime<Utc>) -> ReportQuery {
    ReportQuery::new(UserId(1), [DeviceId(10)], [], from, to).unwrap()
}

#[tokio::test]
async fn test_events_hide_inaccessible_references() {
    let dir = templates();
    let service = service(dir.path());

    let events = service
        .events(&EventTypeFilter::all(), &query(at(0), at(23)))
        .await
        .unwrap();

    let ids: Vec<i64> = events.iter().map(|e| e.id).collect();
    assert_eq!(ids, vec![1, 3, 4]);
}

#[tokio::test]
async fn test_window_boundaries_are_inclusive() {
    let dir = templates();
    let service = service(dir.path());

    let events = service
        .events(&EventTypeFilter::all(), &query(at(8), at(12)))
        .await
        .unwrap();
    assert_eq!(events.len(), 2);

    let route = service.route(&query(at(8), at(8))).await.unwrap();
    assert_eq!(route.len(), 1);
    assert_eq!(route[0].id, PositionId(100));
}

#[tokio::test]
async fn test_events_export_writes_one_sheet() {
    let dir = templates();
    let service = service(dir.path());

    let mut sink = Vec::new();
    service
        .export_events(&EventTypeFilter::all(), &query(at(0), at(23)), &mut sink)
        .await
        .unwrap();

    let workbook: Value = serde_json::from_slice(&sink).unwrap();
    let sheets = workbook["sheets"].as_array().unwrap();
    assert_eq!(sheets.len(), 1);
    assert_eq!(sheets[0]["name"], "Van  North 1");
    assert_eq!(sheets[0]["deviceName"], "Van: North/1");
    assert_eq!(sheets[0]["groupName"], "North");

    let rows = sheets[0]["rows"].as_array().unwrap();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0][1], "geofenceEnter");
    assert_eq!(rows[0][2], "Depot");
    assert_eq!(rows[1][2], Value::Null);
    assert_eq!(rows[2][1], "maintenance");
    assert_eq!(rows[2][3], "Oil change");
    assert_eq!(rows[0][3], Value::Null);
    assert_eq!(workbook["variables"]["timezone"], "UTC");
}

#[tokio::test]
async fn test_route_export_uses_route_template() {
    let dir = templates();
    let service = service(dir.path());

    let mut sink = Vec::new();
    service
        .export_route(&query(at(0), at(23)), &mut sink)
        .await
        .unwrap();

    let workbook: Value = serde_json::from_slice(&sink).unwrap();
    assert_eq!(workbook["title"], "Route");
    assert_eq!(workbook["sheets"][0]["rows"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_missing_trips_template_fails_without_output() {
    let dir = templates();
    let service = service(dir.path());

    let mut sink = Vec::new();
    let err = service
        .export_trips(&query(at(0), at(23)), &mut sink)
        .await
        .unwrap_err();
    assert!(matches!(err, ReportError::TemplateMissing { .. }));
    assert!(sink.is_empty());
}

#[tokio::test]
async fn test_other_users_see_nothing() {
    let dir = templates();
    let service = service(dir.path());

    let q = ReportQuery::new(UserId(2), [DeviceId(10)], [GroupId(3)], at(0), at(23)).unwrap();
    assert!(service.events(&EventTypeFilter::all(), &q).await.unwrap().is_empty());
}
