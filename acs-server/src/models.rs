//! Profile and access log models

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Registered identity
#[derive(Debug, Clone, PartialEq)]
pub struct Profile {
    pub id: Uuid,
    /// Externally assigned identifier, unique across profiles
    pub external_id: String,
    pub display_name: String,
    /// Opaque fixed-length template
    pub template: Vec<u8>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Profile without its template, as reported in duplicate rejections
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileSummary {
    pub id: Uuid,
    pub external_id: String,
    pub display_name: String,
}

impl From<&Profile> for ProfileSummary {
    fn from(profile: &Profile) -> Self {
        Self {
            id: profile.id,
            external_id: profile.external_id.clone(),
            display_name: profile.display_name.clone(),
        }
    }
}

/// Recorded access attempt
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessLogEntry {
    pub id: Uuid,
    pub external_id: String,
    pub display_name: String,
    pub access_granted: bool,
    pub access_type: String,
    pub device_id: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    pub date: NaiveDate,
    pub time: String,
}

/// Filters for access log listing and statistics
#[derive(Debug, Clone, Default)]
pub struct AccessLogFilter {
    pub external_id: Option<String>,
    pub access_granted: Option<bool>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

/// Identity with the most denied attempts
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeniedIdentity {
    pub external_id: String,
    pub display_name: String,
    pub denied_count: i64,
}

/// Aggregate access statistics
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessStats {
    pub total_attempts: i64,
    pub granted_access: i64,
    pub denied_access: i64,
    /// Granted share in percent, two decimals (`"0"` with no attempts)
    pub success_rate: String,
    pub top_denied_users: Vec<DeniedIdentity>,
}

/// Granted share of attempts formatted with two decimals
pub fn success_rate(granted: i64, total: i64) -> String {
    if total > 0 {
        format!("{:.2}", granted as f64 / total as f64 * 100.0)
    } else {
        "0".to_string()
    }
}
