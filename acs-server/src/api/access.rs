//! Access log endpoints

use acs_common::time::{local_day, local_time_of_day};
use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use super::parse_date_param;
use crate::db::access_logs;
use crate::error::{ApiError, ApiResult};
use crate::models::{success_rate, AccessLogEntry, AccessLogFilter, AccessStats};
use crate::pagination::{calculate_pagination, clamp_page_size};
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessLogBody {
    pub external_id: Option<String>,
    pub display_name: Option<String>,
    #[serde(default)]
    pub access_granted: bool,
    pub access_type: Option<String>,
    pub device_id: Option<String>,
}

fn non_empty_or(value: Option<String>, default: &str) -> String {
    value
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

/// POST /api/access/logs
pub async fn create_log(
    State(state): State<AppState>,
    payload: Result<Json<AccessLogBody>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let Json(body) = payload?;
    let now = state.clock.now();

    let entry = AccessLogEntry {
        id: Uuid::new_v4(),
        external_id: non_empty_or(body.external_id, "UNKNOWN"),
        display_name: non_empty_or(body.display_name, "Unknown"),
        access_granted: body.access_granted,
        access_type: non_empty_or(body.access_type, "CARD"),
        device_id: non_empty_or(body.device_id, "UNKNOWN"),
        timestamp: now,
        date: local_day(now),
        time: local_time_of_day(now),
    };

    access_logs::insert_log(&state.db, &entry).await?;

    info!(
        external_id = %entry.external_id,
        granted = entry.access_granted,
        device = %entry.device_id,
        "Access logged"
    );

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "logId": entry.id,
            "message": "Access logged successfully",
        })),
    ))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogsQuery {
    pub external_id: Option<String>,
    pub access_granted: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

fn parse_granted(value: Option<&str>) -> ApiResult<Option<bool>> {
    match value.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some("true") => Ok(Some(true)),
        Some("false") => Ok(Some(false)),
        Some(other) => Err(ApiError::BadRequest(format!(
            "accessGranted must be true or false, got '{}'",
            other
        ))),
    }
}

/// GET /api/access/logs
pub async fn list_logs(
    State(state): State<AppState>,
    query: Result<Query<LogsQuery>, QueryRejection>,
) -> ApiResult<Json<Value>> {
    let Query(query) = query?;

    let filter = AccessLogFilter {
        external_id: query.external_id.filter(|s| !s.is_empty()),
        access_granted: parse_granted(query.access_granted.as_deref())?,
        start_date: parse_date_param("startDate", query.start_date.as_deref())?,
        end_date: parse_date_param("endDate", query.end_date.as_deref())?,
    };

    let total = access_logs::count_logs(&state.db, &filter).await?;
    let pagination = calculate_pagination(total, query.page.unwrap_or(1), clamp_page_size(query.limit));
    let logs = access_logs::list_logs(&state.db, &filter, pagination.page_size, pagination.offset).await?;

    Ok(Json(json!({
        "success": true,
        "logs": logs,
        "total": total,
        "page": pagination.page,
        "limit": pagination.page_size,
        "totalPages": pagination.total_pages,
    })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsQuery {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

/// GET /api/access/stats
pub async fn access_stats(
    State(state): State<AppState>,
    query: Result<Query<StatsQuery>, QueryRejection>,
) -> ApiResult<Json<Value>> {
    let Query(query) = query?;

    let filter = AccessLogFilter {
        start_date: parse_date_param("startDate", query.start_date.as_deref())?,
        end_date: parse_date_param("endDate", query.end_date.as_deref())?,
        ..Default::default()
    };

    let (granted, denied) = access_logs::count_by_outcome(&state.db, &filter).await?;
    let top_denied_users = access_logs::top_denied(&state.db, &filter).await?;
    let total = granted + denied;

    let stats = AccessStats {
        total_attempts: total,
        granted_access: granted,
        denied_access: denied,
        success_rate: success_rate(granted, total),
        top_denied_users,
    };

    Ok(Json(json!({ "success": true, "data": stats })))
}

/// Build access log routes
pub fn access_routes() -> Router<AppState> {
    Router::new()
        .route("/api/access/logs", get(list_logs).post(create_log))
        .route("/api/access/stats", get(access_stats))
}
