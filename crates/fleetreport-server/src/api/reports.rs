//! Report API endpoints.
//!
//! `GET /api/reports/{kind}` returns the report objects as JSON;
//! `GET /api/reports/{kind}/export` returns the rendered document as an
//! attachment. Both take the same query parameters.

use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use fleetreport_core::{
    DeviceId, Event, EventTypeFilter, GroupId, Position, ReportKind, ReportQuery, TripSegment,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::api::error::{ApiError, ApiResult};
use crate::api::user::RequestUser;
use crate::state::SharedState;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Query parameters shared by all report endpoints.
#[derive(Debug, Clone, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ReportParams {
    /// Comma-separated device ids.
    #[param(example = "10,11")]
    pub device_id: Option<String>,

    /// Comma-separated group ids. Devices of nested groups are included.
    #[param(example = "3")]
    pub group_id: Option<String>,

    /// Window start (RFC 3339, inclusive).
    #[param(example = "2024-03-01T00:00:00Z")]
    pub from: DateTime<Utc>,

    /// Window end (RFC 3339, inclusive).
    #[param(example = "2024-03-02T00:00:00Z")]
    pub to: DateTime<Utc>,

    /// Comma-separated event types for the events report; `allEvents` or
    /// absent selects every type.
    #[serde(rename = "type")]
    #[param(example = "geofenceEnter,geofenceExit")]
    pub event_type: Option<String>,
}

/// Report objects of one kind.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(untagged)]
pub enum ReportObjects {
    /// Events report.
    Events(Vec<Event>),
    /// Route report.
    Route(Vec<Position>),
    /// Trips report.
    Trips(Vec<TripSegment>),
}

fn parse_ids<T: From<i64>>(raw: Option<&str>, field: &str) -> ApiResult<Vec<T>> {
    raw.unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<i64>().map(T::from).map_err(|_| {
                ApiError::bad_request("INVALID_ID", format!("'{part}' is not a valid {field}"))
            })
        })
        .collect()
}

fn event_types(raw: Option<&str>) -> EventTypeFilter {
    EventTypeFilter::new(
        raw.unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty()),
    )
}

impl ReportParams {
    fn to_query(&self, user: RequestUser) -> ApiResult<ReportQuery> {
        let devices: Vec<DeviceId> = parse_ids(self.device_id.as_deref(), "deviceId")?;
        let groups: Vec<GroupId> = parse_ids(self.group_id.as_deref(), "groupId")?;
        Ok(ReportQuery::new(user.0, devices, groups, self.from, self.to)?)
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Get report objects.
#[utoipa::path(
    get,
    path = "/api/reports/{kind}",
    tag = "reports",
    operation_id = "getReport",
    summary = "Get report objects",
    description = "Returns the events, positions or trips of every requested device \
        the user may access, in device order. Events referencing a geofence or \
        maintenance entry the user cannot see are left out.",
    params(
        ("kind" = ReportKind, Path, description = "Report kind: events, route or trips"),
        ("X-User-Id" = i64, Header, description = "Authenticated user id"),
        ReportParams
    ),
    responses(
        (status = 200, description = "Report objects", body = ReportObjects),
        (status = 400, description = "Invalid period, kind or parameters", body = super::error::ErrorResponse),
        (status = 401, description = "Missing or invalid user header", body = super::error::ErrorResponse),
        (status = 503, description = "Storage unavailable", body = super::error::ErrorResponse)
    )
)]
pub async fn get_report(
    State(state): State<SharedState>,
    user: RequestUser,
    Path(kind): Path<String>,
    params: Result<Query<ReportParams>, QueryRejection>,
) -> ApiResult<Json<ReportObjects>> {
    let kind: ReportKind = kind.parse()?;
    let Query(params) = params?;
    let query = params.to_query(user)?;
    let service = &state.service;

    let objects = match kind {
        ReportKind::Events => {
            let types = event_types(params.event_type.as_deref());
            ReportObjects::Events(service.events(&types, &query).await?)
        }
        ReportKind::Route => ReportObjects::Route(service.route(&query).await?),
        ReportKind::Trips => ReportObjects::Trips(service.trips(&query).await?),
    };

    Ok(Json(objects))
}

/// Export a report document.
#[utoipa::path(
    get,
    path = "/api/reports/{kind}/export",
    tag = "reports",
    operation_id = "exportReport",
    summary = "Export a report document",
    description = "Renders the report with the template of its kind, one sheet per \
        device, and returns it as an attachment.",
    params(
        ("kind" = ReportKind, Path, description = "Report kind: events, route or trips"),
        ("X-User-Id" = i64, Header, description = "Authenticated user id"),
        ReportParams
    ),
    responses(
        (status = 200, description = "Rendered document attachment"),
        (status = 400, description = "Invalid period, kind or parameters", body = super::error::ErrorResponse),
        (status = 401, description = "Missing or invalid user header", body = super::error::ErrorResponse),
        (status = 500, description = "Template missing or rendering failed", body = super::error::ErrorResponse),
        (status = 503, description = "Storage unavailable", body = super::error::ErrorResponse)
    )
)]
pub async fn export_report(
    State(state): State<SharedState>,
    user: RequestUser,
    Path(kind): Path<String>,
    params: Result<Query<ReportParams>, QueryRejection>,
) -> ApiResult<Response> {
    let kind: ReportKind = kind.parse()?;
    let Query(params) = params?;
    let query = params.to_query(user)?;
    let service = &state.service;

    let mut document = Vec::new();
    match kind {
        ReportKind::Events => {
            let types = event_types(params.event_type.as_deref());
            service.export_events(&types, &query, &mut document).await?;
        }
        ReportKind::Route => service.export_route(&query, &mut document).await?,
        ReportKind::Trips => service.export_trips(&query, &mut document).await?,
    }

    let exporter = service.exporter();
    let headers = [
        (header::CONTENT_TYPE, exporter.content_type().to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{kind}.{}\"", exporter.extension()),
        ),
    ];
    Ok((headers, document).into_response())
}
