//! Access log store

use acs_common::Result;
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};

use super::{parse_date, parse_uuid};
use crate::models::{AccessLogEntry, AccessLogFilter, DeniedIdentity};

/// Number of identities reported in the denied-access ranking
pub const TOP_DENIED_LIMIT: i64 = 10;

fn entry_from_row(row: &SqliteRow) -> Result<AccessLogEntry> {
    let id: String = row.get("id");
    let date: String = row.get("date");
    let timestamp_ms: i64 = row.get("timestamp_ms");
    let timestamp = chrono::DateTime::from_timestamp_millis(timestamp_ms).ok_or_else(|| {
        acs_common::Error::Internal(format!("Timestamp out of range: {}", timestamp_ms))
    })?;

    Ok(AccessLogEntry {
        id: parse_uuid("id", &id)?,
        external_id: row.get("external_id"),
        display_name: row.get("display_name"),
        access_granted: row.get::<i64, _>("access_granted") != 0,
        access_type: row.get("access_type"),
        device_id: row.get("device_id"),
        timestamp,
        date: parse_date("date", &date)?,
        time: row.get("time"),
    })
}

pub async fn insert_log(pool: &SqlitePool, entry: &AccessLogEntry) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO access_logs (
            id, external_id, display_name, access_granted, access_type,
            device_id, timestamp_ms, date, time, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(entry.id.to_string())
    .bind(&entry.external_id)
    .bind(&entry.display_name)
    .bind(entry.access_granted as i64)
    .bind(&entry.access_type)
    .bind(&entry.device_id)
    .bind(entry.timestamp.timestamp_millis())
    .bind(entry.date.to_string())
    .bind(&entry.time)
    .bind(entry.timestamp.to_rfc3339())
    .execute(pool)
    .await?;

    Ok(())
}

fn push_filter<'a>(builder: &mut QueryBuilder<'a, Sqlite>, filter: &'a AccessLogFilter) {
    builder.push(" WHERE 1 = 1");

    if let Some(external_id) = &filter.external_id {
        builder.push(" AND external_id = ").push_bind(external_id.as_str());
    }
    if let Some(granted) = filter.access_granted {
        builder.push(" AND access_granted = ").push_bind(granted as i64);
    }
    if let Some(start) = filter.start_date {
        builder.push(" AND date >= ").push_bind(start.to_string());
    }
    if let Some(end) = filter.end_date {
        builder.push(" AND date <= ").push_bind(end.to_string());
    }
}

pub async fn count_logs(pool: &SqlitePool, filter: &AccessLogFilter) -> Result<i64> {
    let mut builder = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM access_logs");
    push_filter(&mut builder, filter);

    let count = builder.build_query_scalar::<i64>().fetch_one(pool).await?;
    Ok(count)
}

/// One page of matching entries, newest first
pub async fn list_logs(
    pool: &SqlitePool,
    filter: &AccessLogFilter,
    limit: i64,
    offset: i64,
) -> Result<Vec<AccessLogEntry>> {
    let mut builder = QueryBuilder::<Sqlite>::new(
        "SELECT id, external_id, display_name, access_granted, access_type, \
         device_id, timestamp_ms, date, time FROM access_logs",
    );
    push_filter(&mut builder, filter);
    builder.push(" ORDER BY timestamp_ms DESC, rowid DESC");
    builder.push(" LIMIT ").push_bind(limit);
    builder.push(" OFFSET ").push_bind(offset);

    let rows = builder.build().fetch_all(pool).await?;
    rows.iter().map(entry_from_row).collect()
}

/// Granted and denied counts for the matching entries
pub async fn count_by_outcome(pool: &SqlitePool, filter: &AccessLogFilter) -> Result<(i64, i64)> {
    let mut builder = QueryBuilder::<Sqlite>::new(
        "SELECT COALESCE(SUM(access_granted != 0), 0) AS granted, \
                COALESCE(SUM(access_granted = 0), 0) AS denied FROM access_logs",
    );
    push_filter(&mut builder, filter);

    let row = builder.build().fetch_one(pool).await?;
    Ok((row.get("granted"), row.get("denied")))
}

/// Identities with the most denied attempts, most denied first
pub async fn top_denied(pool: &SqlitePool, filter: &AccessLogFilter) -> Result<Vec<DeniedIdentity>> {
    let mut builder = QueryBuilder::<Sqlite>::new(
        "SELECT external_id, MAX(display_name) AS display_name, COUNT(*) AS denied_count \
         FROM access_logs",
    );
    push_filter(&mut builder, filter);
    builder.push(" AND access_granted = 0");
    builder.push(" GROUP BY external_id ORDER BY denied_count DESC, external_id ASC LIMIT ");
    builder.push_bind(TOP_DENIED_LIMIT);

    let rows = builder.build().fetch_all(pool).await?;
    Ok(rows
        .iter()
        .map(|row| DeniedIdentity {
            external_id: row.get("external_id"),
            display_name: row.get("display_name"),
            denied_count: row.get("denied_count"),
        })
        .collect())
}
