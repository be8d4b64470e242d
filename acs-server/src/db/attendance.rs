//! Attendance record store
//!
//! Writes are single statements guarded by the row `version`, so a writer
//! that read a stale record never overwrites a newer one.

use acs_common::events::AttendanceStatus;
use acs_common::human_time::format_hours_minutes;
use acs_common::{Error, Result};
use chrono::NaiveDate;
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};

use super::{parse_date, parse_timestamp};
use crate::ledger::record::{AttendanceRecord, Session};

/// Record together with the version it was read at
#[derive(Debug, Clone)]
pub struct StoredRecord {
    pub record: AttendanceRecord,
    pub version: i64,
}

/// Filters for paged record listing
#[derive(Debug, Clone, Default)]
pub struct AttendanceFilter {
    pub identity: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub status: Option<AttendanceStatus>,
}

const RECORD_COLUMNS: &str = "identity, date, display_name, sessions, total_duration_ms, \
                              status, version, created_at, updated_at";

fn stored_from_row(row: &SqliteRow) -> Result<StoredRecord> {
    let date: String = row.get("date");
    let sessions: String = row.get("sessions");
    let sessions: Vec<Session> = serde_json::from_str(&sessions)
        .map_err(|e| Error::Internal(format!("Failed to deserialize sessions: {}", e)))?;
    let status: String = row.get("status");
    let status = AttendanceStatus::parse(&status)
        .ok_or_else(|| Error::Internal(format!("Unknown attendance status: {}", status)))?;
    let total_duration: i64 = row.get("total_duration_ms");
    let created_at: String = row.get("created_at");
    let updated_at: String = row.get("updated_at");

    Ok(StoredRecord {
        record: AttendanceRecord {
            identity: row.get("identity"),
            display_name: row.get("display_name"),
            date: parse_date("date", &date)?,
            sessions,
            total_duration,
            total_duration_formatted: format_hours_minutes(total_duration),
            status,
            created_at: parse_timestamp("created_at", &created_at)?,
            updated_at: parse_timestamp("updated_at", &updated_at)?,
        },
        version: row.get("version"),
    })
}

fn records_from_rows(rows: &[SqliteRow]) -> Result<Vec<AttendanceRecord>> {
    rows.iter()
        .map(|row| stored_from_row(row).map(|stored| stored.record))
        .collect()
}

pub async fn load_record(
    pool: &SqlitePool,
    identity: &str,
    date: NaiveDate,
) -> Result<Option<StoredRecord>> {
    let sql = format!(
        "SELECT {} FROM attendance WHERE identity = ? AND date = ?",
        RECORD_COLUMNS
    );
    let row = sqlx::query(&sql)
        .bind(identity)
        .bind(date.to_string())
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(stored_from_row).transpose()
}

/// Create the day's record at version 1
///
/// Returns `false` when a record for (identity, date) already exists.
pub async fn insert_record(pool: &SqlitePool, record: &AttendanceRecord) -> Result<bool> {
    let sessions = serde_json::to_string(&record.sessions)?;

    let result = sqlx::query(
        r#"
        INSERT INTO attendance (
            identity, date, display_name, sessions, total_duration_ms,
            status, version, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, 1, ?, ?)
        ON CONFLICT(identity, date) DO NOTHING
        "#,
    )
    .bind(&record.identity)
    .bind(record.date.to_string())
    .bind(&record.display_name)
    .bind(&sessions)
    .bind(record.total_duration)
    .bind(record.status.as_str())
    .bind(record.created_at.to_rfc3339())
    .bind(record.updated_at.to_rfc3339())
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Replace the record if it is still at `expected_version`
///
/// Returns `false` when another writer got there first.
pub async fn update_record(
    pool: &SqlitePool,
    record: &AttendanceRecord,
    expected_version: i64,
) -> Result<bool> {
    let sessions = serde_json::to_string(&record.sessions)?;

    let result = sqlx::query(
        r#"
        UPDATE attendance
        SET display_name = ?,
            sessions = ?,
            total_duration_ms = ?,
            status = ?,
            version = version + 1,
            updated_at = ?
        WHERE identity = ? AND date = ? AND version = ?
        "#,
    )
    .bind(&record.display_name)
    .bind(&sessions)
    .bind(record.total_duration)
    .bind(record.status.as_str())
    .bind(record.updated_at.to_rfc3339())
    .bind(&record.identity)
    .bind(record.date.to_string())
    .bind(expected_version)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// All records of one day, optionally for a single identity
pub async fn records_for_day(
    pool: &SqlitePool,
    date: NaiveDate,
    identity: Option<&str>,
) -> Result<Vec<AttendanceRecord>> {
    let filter = AttendanceFilter {
        identity: identity.map(str::to_string),
        start_date: Some(date),
        end_date: Some(date),
        status: None,
    };
    list_records(pool, &filter, None).await
}

/// Records with `start <= date <= end`, optionally for a single identity
pub async fn records_in_range(
    pool: &SqlitePool,
    start: NaiveDate,
    end: NaiveDate,
    identity: Option<&str>,
) -> Result<Vec<AttendanceRecord>> {
    let filter = AttendanceFilter {
        identity: identity.map(str::to_string),
        start_date: Some(start),
        end_date: Some(end),
        status: None,
    };
    list_records(pool, &filter, None).await
}

fn push_filter<'a>(builder: &mut QueryBuilder<'a, Sqlite>, filter: &'a AttendanceFilter) {
    builder.push(" WHERE 1 = 1");

    if let Some(identity) = &filter.identity {
        builder.push(" AND identity = ").push_bind(identity.as_str());
    }
    if let Some(start) = filter.start_date {
        builder.push(" AND date >= ").push_bind(start.to_string());
    }
    if let Some(end) = filter.end_date {
        builder.push(" AND date <= ").push_bind(end.to_string());
    }
    if let Some(status) = filter.status {
        builder.push(" AND status = ").push_bind(status.as_str());
    }
}

pub async fn count_records(pool: &SqlitePool, filter: &AttendanceFilter) -> Result<i64> {
    let mut builder = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM attendance");
    push_filter(&mut builder, filter);

    let count: i64 = builder.build_query_scalar::<i64>().fetch_one(pool).await?;
    Ok(count)
}

/// Filtered records, newest day first, then most recently updated
///
/// `page` is `(limit, offset)`; `None` returns every match.
pub async fn list_records(
    pool: &SqlitePool,
    filter: &AttendanceFilter,
    page: Option<(i64, i64)>,
) -> Result<Vec<AttendanceRecord>> {
    let mut builder = QueryBuilder::<Sqlite>::new(format!("SELECT {} FROM attendance", RECORD_COLUMNS));
    push_filter(&mut builder, filter);
    builder.push(" ORDER BY date DESC, updated_at DESC, identity ASC");

    if let Some((limit, offset)) = page {
        builder.push(" LIMIT ").push_bind(limit);
        builder.push(" OFFSET ").push_bind(offset);
    }

    let rows = builder.build().fetch_all(pool).await?;
    records_from_rows(&rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::record::apply_transition;
    use acs_common::db::init_memory_database;
    use acs_common::events::ClockAction;
    use chrono::{DateTime, Local, TimeZone, Utc};

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Local
            .with_ymd_and_hms(2026, 3, day, hour, 0, 0)
            .unwrap()
            .with_timezone(&Utc)
    }

    fn clocked_in(identity: &str, day: u32, hour: u32) -> AttendanceRecord {
        apply_transition(None, ClockAction::In, identity, None, at(day, hour)).unwrap()
    }

    #[tokio::test]
    async fn test_insert_then_load() {
        let pool = init_memory_database().await.unwrap();
        let record = clocked_in("E001", 2, 9);

        assert!(insert_record(&pool, &record).await.unwrap());

        let stored = load_record(&pool, "E001", record.date).await.unwrap().unwrap();
        assert_eq!(stored.version, 1);
        assert_eq!(stored.record, record);
    }

    #[tokio::test]
    async fn test_second_insert_for_same_day_is_rejected() {
        let pool = init_memory_database().await.unwrap();
        let record = clocked_in("E001", 2, 9);

        assert!(insert_record(&pool, &record).await.unwrap());
        assert!(!insert_record(&pool, &clocked_in("E001", 2, 10)).await.unwrap());

        let stored = load_record(&pool, "E001", record.date).await.unwrap().unwrap();
        assert_eq!(stored.record.sessions[0].clock_in, at(2, 9));
    }

    #[tokio::test]
    async fn test_update_with_stale_version_is_rejected() {
        let pool = init_memory_database().await.unwrap();
        let record = clocked_in("E001", 2, 9);
        insert_record(&pool, &record).await.unwrap();

        let closed = apply_transition(Some(record.clone()), ClockAction::Out, "E001", None, at(2, 12)).unwrap();
        assert!(update_record(&pool, &closed, 1).await.unwrap());
        // Same expected version again: already bumped to 2
        assert!(!update_record(&pool, &closed, 1).await.unwrap());

        let stored = load_record(&pool, "E001", record.date).await.unwrap().unwrap();
        assert_eq!(stored.version, 2);
        assert_eq!(stored.record.status, AttendanceStatus::Completed);
        assert_eq!(stored.record.total_duration, 3 * 3_600_000);
    }

    #[tokio::test]
    async fn test_filters_and_ordering() {
        let pool = init_memory_database().await.unwrap();
        insert_record(&pool, &clocked_in("E001", 2, 9)).await.unwrap();
        insert_record(&pool, &clocked_in("E002", 2, 10)).await.unwrap();
        insert_record(&pool, &clocked_in("E001", 3, 9)).await.unwrap();
        insert_record(&pool, &clocked_in("E001", 20, 9)).await.unwrap();

        let day = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        assert_eq!(records_for_day(&pool, day, None).await.unwrap().len(), 2);
        assert_eq!(records_for_day(&pool, day, Some("E002")).await.unwrap().len(), 1);

        let start = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2026, 3, 10).unwrap();
        let ranged = records_in_range(&pool, start, end, Some("E001")).await.unwrap();
        let days: Vec<u32> = ranged.iter().map(|r| chrono::Datelike::day(&r.date)).collect();
        assert_eq!(days, vec![3, 2]);

        let filter = AttendanceFilter {
            status: Some(AttendanceStatus::Active),
            ..Default::default()
        };
        assert_eq!(count_records(&pool, &filter).await.unwrap(), 4);

        let page = list_records(&pool, &filter, Some((2, 2))).await.unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[1].date, day);
    }
}
