//! Requesting-user extraction.
//!
//! Authentication happens upstream; the gateway forwards the authenticated
//! user id in the `X-User-Id` header.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use fleetreport_core::UserId;

use crate::api::error::ApiError;

/// Header carrying the authenticated user id.
pub const USER_HEADER: &str = "x-user-id";

/// The user a report is generated for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestUser(pub UserId);

impl<S> FromRequestParts<S> for RequestUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(USER_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<i64>().ok())
            .filter(|id| *id > 0)
            .map(|id| Self(UserId(id)))
            .ok_or_else(|| ApiError::Unauthorized {
                error_code: "UNAUTHORIZED".to_string(),
                message: format!("missing or invalid {USER_HEADER} header"),
            })
    }
}
