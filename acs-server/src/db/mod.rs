//! Database access layer for acs-server
//!
//! One module per collection. Ids and instants are stored as TEXT
//! (uuid string, RFC 3339); calendar days as `YYYY-MM-DD` so that range
//! filters compare lexically.

use acs_common::{Error, Result};
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

pub mod access_logs;
pub mod attendance;
pub mod profiles;

pub(crate) fn parse_timestamp(column: &str, value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("Failed to parse {}: {}", column, e)))
}

pub(crate) fn parse_date(column: &str, value: &str) -> Result<NaiveDate> {
    value
        .parse::<NaiveDate>()
        .map_err(|e| Error::Internal(format!("Failed to parse {}: {}", column, e)))
}

pub(crate) fn parse_uuid(column: &str, value: &str) -> Result<Uuid> {
    Uuid::parse_str(value).map_err(|e| Error::Internal(format!("Failed to parse {}: {}", column, e)))
}
