//! HTTP API routes and handlers.
//!
//! - `health` - Service health checks
//! - `reports` - Report objects and document export
//! - `user` - Requesting-user extraction
//! - `error` - API error types
//! - `openapi` - OpenAPI specification generation

use axum::routing::get;
use axum::Router;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::state::SharedState;

pub mod error;
pub mod health;
pub mod openapi;
pub mod reports;
pub mod user;

pub use error::{ApiError, ApiResult, ErrorResponse};
pub use openapi::get_openapi_json;

/// Creates the combined API router with all endpoints.
///
/// # Route Structure
///
/// ```text
/// /health                      - Health check
/// /api
/// ├── /reports/{kind}          - Report objects as JSON
/// ├── /reports/{kind}/export   - Exported report document
/// └── /openapi.json            - OpenAPI specification
/// /swagger-ui                  - Interactive API documentation
/// ```
pub fn create_router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .nest(
            "/api",
            Router::new()
                .route("/reports/{kind}", get(reports::get_report))
                .route("/reports/{kind}/export", get(reports::export_report))
                .route("/openapi.json", get(openapi::get_openapi_spec)),
        )
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", openapi::ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
