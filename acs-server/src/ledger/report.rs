//! Day and month views over attendance records

use acs_common::events::AttendanceStatus;
use acs_common::human_time::format_hours_minutes;
use chrono::NaiveDate;
use serde::Serialize;

use super::record::{AttendanceRecord, Session};

/// One identity's line in the day view
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TodayEntry {
    pub identity: String,
    pub display_name: Option<String>,
    pub status: AttendanceStatus,
    pub session_count: usize,
    pub total_duration: i64,
    pub total_duration_formatted: String,
    /// `Clocked in at HH:MM:SS` or `Clocked out at HH:MM:SS`
    pub last_action: Option<String>,
    pub sessions: Vec<Session>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TodaySummary {
    pub date: NaiveDate,
    pub total_present: usize,
    /// Records with an open session
    pub clocked_in: usize,
    /// Records with every session closed
    pub clocked_out: usize,
    pub records: Vec<TodayEntry>,
}

/// Summarize one day's records, most recent activity first
pub fn summarize_day(date: NaiveDate, mut records: Vec<AttendanceRecord>) -> TodaySummary {
    records.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));

    let clocked_in = records
        .iter()
        .filter(|r| r.status == AttendanceStatus::Active)
        .count();

    let entries: Vec<TodayEntry> = records
        .into_iter()
        .map(|record| TodayEntry {
            last_action: record.last_action().map(|a| a.to_string()),
            session_count: record.sessions.len(),
            identity: record.identity,
            display_name: record.display_name,
            status: record.status,
            total_duration: record.total_duration,
            total_duration_formatted: record.total_duration_formatted,
            sessions: record.sessions,
        })
        .collect();

    TodaySummary {
        date,
        total_present: entries.len(),
        clocked_in,
        clocked_out: entries.len() - clocked_in,
        records: entries,
    }
}

/// One record's line in the month view
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRow {
    pub date: NaiveDate,
    pub identity: String,
    pub display_name: Option<String>,
    pub session_count: usize,
    pub first_clock_in_time: Option<String>,
    pub last_clock_out_time: Option<String>,
    pub total_duration: i64,
    pub total_duration_formatted: String,
    pub status: AttendanceStatus,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyReport {
    /// `YYYY-MM`
    pub period: String,
    /// Requested identity, or `ALL`
    pub identity: String,
    pub total_days: usize,
    pub completed_days: usize,
    pub incomplete_days: usize,
    pub total_duration: i64,
    pub total_duration_formatted: String,
    /// Truncated mean over all records, 0 with no records
    pub avg_duration: i64,
    pub avg_duration_formatted: String,
    pub records: Vec<ReportRow>,
}

/// Aggregate a month's records, oldest day first
pub fn build_monthly_report(
    year: i32,
    month: u32,
    identity: Option<&str>,
    mut records: Vec<AttendanceRecord>,
) -> MonthlyReport {
    records.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.identity.cmp(&b.identity)));

    let total_days = records.len();
    let completed_days = records
        .iter()
        .filter(|r| r.status == AttendanceStatus::Completed)
        .count();
    let total_duration: i64 = records.iter().map(|r| r.total_duration).sum();
    let avg_duration = if total_days > 0 {
        total_duration / total_days as i64
    } else {
        0
    };

    let rows = records
        .into_iter()
        .map(|record| ReportRow {
            session_count: record.sessions.len(),
            first_clock_in_time: record.sessions.first().map(|s| s.clock_in_time.clone()),
            last_clock_out_time: record.sessions.last().and_then(|s| s.clock_out_time.clone()),
            date: record.date,
            identity: record.identity,
            display_name: record.display_name,
            total_duration: record.total_duration,
            total_duration_formatted: record.total_duration_formatted,
            status: record.status,
        })
        .collect();

    MonthlyReport {
        period: format!("{}-{:02}", year, month),
        identity: identity.unwrap_or("ALL").to_string(),
        total_days,
        completed_days,
        incomplete_days: total_days - completed_days,
        total_duration,
        total_duration_formatted: format_hours_minutes(total_duration),
        avg_duration,
        avg_duration_formatted: format_hours_minutes(avg_duration),
        records: rows,
    }
}
