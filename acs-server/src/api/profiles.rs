//! Profile endpoints
//!
//! Templates travel base64-encoded (standard alphabet, padded).

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    routing::get,
    Json, Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use crate::db::profiles;
use crate::error::{ApiError, ApiResult};
use crate::models::Profile;
use crate::pagination::{calculate_pagination, clamp_page_size};
use crate::registration::NewProfile;
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterBody {
    pub external_id: Option<String>,
    pub display_name: Option<String>,
    pub template: Option<String>,
}

/// Profile as returned by the API
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileView {
    pub id: Uuid,
    pub external_id: String,
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
    pub template_size: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProfileView {
    fn new(profile: Profile, include_template: bool) -> Self {
        Self {
            template: include_template.then(|| STANDARD.encode(&profile.template)),
            template_size: profile.template.len(),
            id: profile.id,
            external_id: profile.external_id,
            display_name: profile.display_name,
            created_at: profile.created_at,
            updated_at: profile.updated_at,
        }
    }
}

/// POST /api/profiles
pub async fn register_profile(
    State(state): State<AppState>,
    payload: Result<Json<RegisterBody>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let Json(body) = payload?;

    let (external_id, display_name, template) = match (body.external_id, body.display_name, body.template) {
        (Some(e), Some(d), Some(t)) => (e, d, t),
        _ => {
            return Err(ApiError::BadRequest(
                "externalId, displayName and template are required".to_string(),
            ))
        }
    };

    let template = STANDARD
        .decode(template.trim())
        .map_err(|e| ApiError::BadRequest(format!("template is not valid base64: {}", e)))?;

    let profile = state
        .registry
        .register(NewProfile {
            external_id,
            display_name,
            template,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "profileId": profile.id,
            "message": "Profile registered successfully",
        })),
    ))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    #[serde(default)]
    pub include_templates: bool,
}

/// GET /api/profiles
pub async fn list_profiles(
    State(state): State<AppState>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> ApiResult<Json<Value>> {
    let Query(query) = query?;

    let total = profiles::count_profiles(&state.db).await?;
    let pagination = calculate_pagination(total, query.page.unwrap_or(1), clamp_page_size(query.limit));
    let rows = profiles::list_profiles_page(&state.db, pagination.page_size, pagination.offset).await?;

    let views: Vec<ProfileView> = rows
        .into_iter()
        .map(|p| ProfileView::new(p, query.include_templates))
        .collect();

    Ok(Json(json!({
        "success": true,
        "profiles": views,
        "total": total,
        "page": pagination.page,
        "limit": pagination.page_size,
        "totalPages": pagination.total_pages,
    })))
}

fn parse_profile_id(raw: &str) -> ApiResult<Uuid> {
    Uuid::parse_str(raw).map_err(|_| ApiError::BadRequest(format!("Invalid profile id '{}'", raw)))
}

/// GET /api/profiles/:id
pub async fn get_profile(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let id = parse_profile_id(&id)?;
    let profile = profiles::get_profile(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Profile not found".to_string()))?;

    Ok(Json(json!({ "success": true, "profile": ProfileView::new(profile, true) })))
}

/// GET /api/profiles/external/:external_id
pub async fn get_profile_by_external_id(
    State(state): State<AppState>,
    Path(external_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let profile = profiles::find_by_external_id(&state.db, &external_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Profile not found".to_string()))?;

    Ok(Json(json!({ "success": true, "profile": ProfileView::new(profile, true) })))
}

/// DELETE /api/profiles/:id
pub async fn delete_profile(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let id = parse_profile_id(&id)?;
    if !profiles::delete_profile(&state.db, id).await? {
        return Err(ApiError::NotFound("Profile not found".to_string()));
    }

    info!(%id, "Profile deleted");
    Ok(Json(json!({ "success": true, "message": "Profile deleted successfully" })))
}

/// DELETE /api/profiles/external/:external_id
pub async fn delete_profile_by_external_id(
    State(state): State<AppState>,
    Path(external_id): Path<String>,
) -> ApiResult<Json<Value>> {
    if !profiles::delete_by_external_id(&state.db, &external_id).await? {
        return Err(ApiError::NotFound("Profile not found".to_string()));
    }

    info!(external_id = %external_id, "Profile deleted");
    Ok(Json(json!({ "success": true, "message": "Profile deleted successfully" })))
}

/// GET /api/profiles/stats/count
pub async fn profile_count(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let count = profiles::count_profiles(&state.db).await?;
    Ok(Json(json!({ "success": true, "count": count })))
}

/// Build profile routes
pub fn profile_routes() -> Router<AppState> {
    Router::new()
        .route("/api/profiles", get(list_profiles).post(register_profile))
        .route("/api/profiles/stats/count", get(profile_count))
        .route(
            "/api/profiles/external/:external_id",
            get(get_profile_by_external_id).delete(delete_profile_by_external_id),
        )
        .route("/api/profiles/:id", get(get_profile).delete(delete_profile))
}
