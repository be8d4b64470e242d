//! HTTP API handlers for acs-server

pub mod access;
pub mod attendance;
pub mod health;
pub mod profiles;
pub mod sse;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use chrono::NaiveDate;

use crate::error::ApiError;

pub use access::access_routes;
pub use attendance::attendance_routes;
pub use health::health_routes;
pub use profiles::profile_routes;

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

/// Parse an optional `YYYY-MM-DD` query value
pub(crate) fn parse_date_param(name: &str, value: Option<&str>) -> Result<Option<NaiveDate>, ApiError> {
    match value.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(raw) => raw
            .parse::<NaiveDate>()
            .map(Some)
            .map_err(|_| ApiError::BadRequest(format!("{} must be a YYYY-MM-DD date", name))),
    }
}
