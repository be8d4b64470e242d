//! Attendance endpoints
//!
//! - POST /api/attendance/clock
//! - GET  /api/attendance/stream (SSE)
//! - GET  /api/attendance/today
//! - GET  /api/attendance
//! - GET  /api/attendance/report

use acs_common::events::AttendanceStatus;
use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};

use super::parse_date_param;
use super::sse::attendance_stream;
use crate::db::attendance::AttendanceFilter;
use crate::error::{ApiError, ApiResult};
use crate::ledger::ClockRequest;
use crate::pagination::clamp_page_size;
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClockBody {
    pub identity: Option<String>,
    pub display_name: Option<String>,
    pub action: Option<String>,
}

/// POST /api/attendance/clock
pub async fn clock(
    State(state): State<AppState>,
    payload: Result<Json<ClockBody>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(body) = payload?;
    let request = ClockRequest::from_raw(
        body.identity.as_deref(),
        body.display_name.as_deref(),
        body.action.as_deref(),
    )?;

    let outcome = state.ledger.clock(request).await?;

    Ok(Json(json!({
        "success": true,
        "message": outcome.message,
        "attendance": outcome.record,
    })))
}

#[derive(Debug, Deserialize)]
pub struct IdentityQuery {
    pub identity: Option<String>,
}

/// GET /api/attendance/today
pub async fn today(
    State(state): State<AppState>,
    query: Result<Query<IdentityQuery>, QueryRejection>,
) -> ApiResult<Json<Value>> {
    let Query(query) = query?;
    let identity = query.identity.as_deref().filter(|s| !s.is_empty());

    let summary = state.ledger.today(identity).await?;
    Ok(Json(json!({ "success": true, "data": summary })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordsQuery {
    pub identity: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub status: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

/// GET /api/attendance
pub async fn list_records(
    State(state): State<AppState>,
    query: Result<Query<RecordsQuery>, QueryRejection>,
) -> ApiResult<Json<Value>> {
    let Query(query) = query?;

    let status = match query.status.as_deref().filter(|s| !s.is_empty()) {
        None => None,
        Some(raw) => Some(AttendanceStatus::parse(raw).ok_or_else(|| {
            ApiError::BadRequest(format!("Unknown status '{}': must be ACTIVE or COMPLETED", raw))
        })?),
    };

    let filter = AttendanceFilter {
        identity: query.identity.filter(|s| !s.is_empty()),
        start_date: parse_date_param("startDate", query.start_date.as_deref())?,
        end_date: parse_date_param("endDate", query.end_date.as_deref())?,
        status,
    };
    let page_size = clamp_page_size(query.limit);

    let page = state
        .ledger
        .records(&filter, query.page.unwrap_or(1), page_size)
        .await?;

    Ok(Json(json!({
        "success": true,
        "records": page.records,
        "total": page.total,
        "page": page.pagination.page,
        "limit": page.pagination.page_size,
        "totalPages": page.pagination.total_pages,
    })))
}

#[derive(Debug, Deserialize)]
pub struct ReportQuery {
    pub month: Option<String>,
    pub year: Option<String>,
    pub identity: Option<String>,
}

/// GET /api/attendance/report
pub async fn monthly_report(
    State(state): State<AppState>,
    query: Result<Query<ReportQuery>, QueryRejection>,
) -> ApiResult<Json<Value>> {
    let Query(query) = query?;

    let (month, year) = match (
        query.month.as_deref().map(str::trim).filter(|s| !s.is_empty()),
        query.year.as_deref().map(str::trim).filter(|s| !s.is_empty()),
    ) {
        (Some(month), Some(year)) => (month, year),
        _ => return Err(ApiError::BadRequest("Month and year are required".to_string())),
    };

    let month: u32 = month
        .parse()
        .map_err(|_| ApiError::BadRequest("Month must be between 1 and 12".to_string()))?;
    let year: i32 = year
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("Invalid year '{}'", year)))?;
    let identity = query.identity.as_deref().filter(|s| !s.is_empty());

    let report = state.ledger.monthly_report(identity, month, year).await?;
    Ok(Json(json!({ "success": true, "report": report })))
}

/// Build attendance routes
pub fn attendance_routes() -> Router<AppState> {
    Router::new()
        .route("/api/attendance", get(list_records))
        .route("/api/attendance/clock", post(clock))
        .route("/api/attendance/stream", get(attendance_stream))
        .route("/api/attendance/today", get(today))
        .route("/api/attendance/report", get(monthly_report))
}
