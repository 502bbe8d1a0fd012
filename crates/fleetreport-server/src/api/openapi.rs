//! OpenAPI specification for the fleetreport API.

use axum::Json;
use fleetreport_core::{Event, Position, ReportKind, TripSegment};
use utoipa::OpenApi;

use super::error::ErrorResponse;
use super::health::HealthResponse;
use super::reports::ReportObjects;

/// Serve the OpenAPI specification as JSON at `/api/openapi.json`.
pub async fn get_openapi_spec() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// The OpenAPI specification as pretty-printed JSON. Used by the
/// gen-openapi binary.
///
/// # Errors
///
/// Returns an error if the document cannot be serialized.
pub fn get_openapi_json() -> Result<String, serde_json::Error> {
    ApiDoc::openapi().to_pretty_json()
}

/// Main OpenAPI document structure for fleetreport.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "fleetreport API",
        version = "0.1.0",
        description = r"
# fleetreport API

Permission-scoped fleet reports.

## Report kinds

- **events**: device events, without those referencing a geofence or
  maintenance entry the user cannot see
- **route**: raw positions
- **trips**: detected trips

Every report covers the requested devices plus the members of the requested
groups, limited to what the user may access. The window is inclusive on both
ends and may be capped by the server's maximum period.

## Authentication

The requesting user is read from the `X-User-Id` header set by the gateway.
",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers(
        (url = "/", description = "Local fleetreport server")
    ),
    tags(
        (name = "system", description = "Health checks"),
        (name = "reports", description = "Report objects and document export")
    ),
    paths(
        super::health::health_check,
        super::reports::get_report,
        super::reports::export_report,
    ),
    components(
        schemas(
            ErrorResponse,
            HealthResponse,
            ReportKind,
            ReportObjects,
            Event,
            Position,
            TripSegment,
        )
    )
)]
pub struct ApiDoc;
