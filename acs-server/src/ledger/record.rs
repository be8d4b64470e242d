//! Attendance record and session state machine
//!
//! One [`AttendanceRecord`] exists per (identity, local day). Its sessions
//! are kept in chronological order and at most one of them is open.
//! Transitions are pure: they compute the next state in memory and the
//! caller persists the whole record.

use acs_common::events::{AttendanceStatus, ClockAction};
use acs_common::human_time::format_hours_minutes;
use acs_common::time::{local_day, local_time_of_day};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Precondition violations of the clock state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("Already clocked in")]
    AlreadyClockedIn,

    #[error("Please clock in first")]
    NotClockedIn,

    #[error("Already clocked out")]
    AlreadyClockedOut,
}

/// One work session inside a day's record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub clock_in: DateTime<Utc>,
    /// Local `HH:MM:SS`
    pub clock_in_time: String,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub clock_out: Option<DateTime<Utc>>,
    #[serde(default)]
    pub clock_out_time: Option<String>,
    /// Milliseconds; absent while the session is open
    #[serde(default)]
    pub duration: Option<i64>,
    #[serde(default)]
    pub duration_formatted: Option<String>,
}

impl Session {
    fn open(at: DateTime<Utc>) -> Self {
        Self {
            clock_in: at,
            clock_in_time: local_time_of_day(at),
            clock_out: None,
            clock_out_time: None,
            duration: None,
            duration_formatted: None,
        }
    }

    fn close(&mut self, at: DateTime<Utc>) {
        // No clock-skew correction: a backwards clock yields a zero duration
        let duration = (at - self.clock_in).num_milliseconds().max(0);
        self.clock_out = Some(at);
        self.clock_out_time = Some(local_time_of_day(at));
        self.duration = Some(duration);
        self.duration_formatted = Some(format_hours_minutes(duration));
    }

    pub fn is_open(&self) -> bool {
        self.clock_out.is_none()
    }
}

/// Most recent action on a record, for display
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LastAction {
    ClockedIn { time: String },
    ClockedOut { time: String },
}

impl fmt::Display for LastAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LastAction::ClockedIn { time } => write!(f, "Clocked in at {}", time),
            LastAction::ClockedOut { time } => write!(f, "Clocked out at {}", time),
        }
    }
}

/// Attendance for one identity on one local calendar day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    pub identity: String,
    pub display_name: Option<String>,
    pub date: NaiveDate,
    /// Chronological; at most one open session
    pub sessions: Vec<Session>,
    /// Sum of closed-session durations (ms)
    pub total_duration: i64,
    pub total_duration_formatted: String,
    pub status: AttendanceStatus,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub updated_at: DateTime<Utc>,
}

impl AttendanceRecord {
    /// Record created by the first clock-in of the day
    pub fn first_clock_in(identity: &str, display_name: Option<&str>, at: DateTime<Utc>) -> Self {
        let mut record = Self {
            identity: identity.to_string(),
            display_name: display_name.map(str::to_string),
            date: local_day(at),
            sessions: vec![Session::open(at)],
            total_duration: 0,
            total_duration_formatted: String::new(),
            status: AttendanceStatus::Active,
            created_at: at,
            updated_at: at,
        };
        record.refresh_aggregates();
        record
    }

    /// Open a new session
    pub fn clock_in(&mut self, at: DateTime<Utc>) -> Result<(), TransitionError> {
        if self.open_session().is_some() {
            return Err(TransitionError::AlreadyClockedIn);
        }

        self.sessions.push(Session::open(at));
        self.updated_at = at;
        self.refresh_aggregates();
        Ok(())
    }

    /// Close the open session
    pub fn clock_out(&mut self, at: DateTime<Utc>) -> Result<(), TransitionError> {
        if self.sessions.is_empty() {
            return Err(TransitionError::NotClockedIn);
        }

        let open = self
            .sessions
            .iter_mut()
            .rev()
            .find(|s| s.is_open())
            .ok_or(TransitionError::AlreadyClockedOut)?;

        open.close(at);
        self.updated_at = at;
        self.refresh_aggregates();
        Ok(())
    }

    pub fn open_session(&self) -> Option<&Session> {
        self.sessions.iter().find(|s| s.is_open())
    }

    /// Sum of durations over closed sessions only
    pub fn closed_duration(&self) -> i64 {
        self.sessions
            .iter()
            .filter(|s| !s.is_open())
            .filter_map(|s| s.duration)
            .sum()
    }

    /// Action that produced the most recent session state
    pub fn last_action(&self) -> Option<LastAction> {
        let last = self.sessions.last()?;
        Some(match &last.clock_out_time {
            Some(time) => LastAction::ClockedOut { time: time.clone() },
            None => LastAction::ClockedIn {
                time: last.clock_in_time.clone(),
            },
        })
    }

    fn refresh_aggregates(&mut self) {
        self.total_duration = self.closed_duration();
        self.total_duration_formatted = format_hours_minutes(self.total_duration);
        self.status = if self.open_session().is_some() {
            AttendanceStatus::Active
        } else {
            AttendanceStatus::Completed
        };
    }
}

/// Apply one clock event to the day's record (if any)
///
/// A `None` record with `In` creates the record; every rejection leaves
/// the input untouched because the caller only persists the `Ok` value.
pub fn apply_transition(
    existing: Option<AttendanceRecord>,
    action: ClockAction,
    identity: &str,
    display_name: Option<&str>,
    at: DateTime<Utc>,
) -> Result<AttendanceRecord, TransitionError> {
    match (existing, action) {
        (None, ClockAction::In) => Ok(AttendanceRecord::first_clock_in(identity, display_name, at)),
        (None, ClockAction::Out) => Err(TransitionError::NotClockedIn),
        (Some(mut record), action) => {
            match action {
                ClockAction::In => record.clock_in(at)?,
                ClockAction::Out => record.clock_out(at)?,
            }
            if let Some(name) = display_name {
                record.display_name = Some(name.to_string());
            }
            Ok(record)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Local, TimeZone};

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Local
            .with_ymd_and_hms(2026, 3, 2, hour, minute, 0)
            .unwrap()
            .with_timezone(&Utc)
    }

    fn assert_invariants(record: &AttendanceRecord) {
        let open = record.sessions.iter().filter(|s| s.is_open()).count();
        assert!(open <= 1, "more than one open session");
        assert_eq!(record.status == AttendanceStatus::Active, open == 1);
        assert_eq!(record.total_duration, record.closed_duration());
    }

    #[test]
    fn test_first_clock_in_creates_active_record() {
        let record = apply_transition(None, ClockAction::In, "E001", Some("Ada"), at(9, 0)).unwrap();

        assert_eq!(record.identity, "E001");
        assert_eq!(record.date, NaiveDate::from_ymd_opt(2026, 3, 2).unwrap());
        assert_eq!(record.sessions.len(), 1);
        assert_eq!(record.sessions[0].clock_in_time, "09:00:00");
        assert_eq!(record.total_duration, 0);
        assert_eq!(record.status, AttendanceStatus::Active);
        assert_invariants(&record);
    }

    #[test]
    fn test_clock_out_without_record_rejected() {
        let err = apply_transition(None, ClockAction::Out, "E001", None, at(9, 0)).unwrap_err();
        assert_eq!(err, TransitionError::NotClockedIn);
        assert_eq!(err.to_string(), "Please clock in first");
    }

    #[test]
    fn test_double_clock_in_rejected() {
        let record = apply_transition(None, ClockAction::In, "E001", None, at(9, 0)).unwrap();
        let before = record.clone();

        let err = apply_transition(Some(record), ClockAction::In, "E001", None, at(9, 5)).unwrap_err();
        assert_eq!(err, TransitionError::AlreadyClockedIn);
        assert_invariants(&before);
    }

    #[test]
    fn test_double_clock_out_rejected() {
        let record = apply_transition(None, ClockAction::In, "E001", None, at(9, 0)).unwrap();
        let record = apply_transition(Some(record), ClockAction::Out, "E001", None, at(10, 0)).unwrap();

        let err = apply_transition(Some(record), ClockAction::Out, "E001", None, at(10, 5)).unwrap_err();
        assert_eq!(err, TransitionError::AlreadyClockedOut);
    }

    #[test]
    fn test_two_sessions_scenario() {
        let record = apply_transition(None, ClockAction::In, "E001", None, at(9, 0)).unwrap();
        let record = apply_transition(Some(record), ClockAction::Out, "E001", None, at(12, 0)).unwrap();
        let record = apply_transition(Some(record), ClockAction::In, "E001", None, at(13, 0)).unwrap();
        let record = apply_transition(Some(record), ClockAction::Out, "E001", None, at(17, 0)).unwrap();

        assert_eq!(record.sessions.len(), 2);
        assert_eq!(record.sessions[0].duration_formatted.as_deref(), Some("3h 0m"));
        assert_eq!(record.sessions[1].duration_formatted.as_deref(), Some("4h 0m"));
        assert_eq!(record.total_duration, 7 * 3_600_000);
        assert_eq!(record.total_duration_formatted, "7h 0m");
        assert_eq!(record.status, AttendanceStatus::Completed);
        assert_invariants(&record);
    }

    #[test]
    fn test_clock_in_after_out_appends_and_keeps_prior_sessions() {
        let record = apply_transition(None, ClockAction::In, "E001", None, at(9, 0)).unwrap();
        let closed = apply_transition(Some(record), ClockAction::Out, "E001", None, at(11, 30)).unwrap();
        let prior = closed.sessions.clone();

        let reopened = apply_transition(Some(closed), ClockAction::In, "E001", None, at(12, 15)).unwrap();

        assert_eq!(reopened.sessions.len(), prior.len() + 1);
        assert_eq!(&reopened.sessions[..prior.len()], &prior[..]);
        assert_eq!(reopened.status, AttendanceStatus::Active);
        // Open session contributes nothing
        assert_eq!(reopened.total_duration, 150 * 60_000);
        assert_invariants(&reopened);
    }

    #[test]
    fn test_invariants_hold_over_mixed_sequence() {
        let actions = [
            ClockAction::Out,
            ClockAction::In,
            ClockAction::In,
            ClockAction::Out,
            ClockAction::Out,
            ClockAction::In,
            ClockAction::Out,
            ClockAction::In,
        ];

        let mut record: Option<AttendanceRecord> = None;
        for (i, action) in actions.iter().enumerate() {
            let when = at(8 + i as u32, 0);
            match apply_transition(record.clone(), *action, "E002", None, when) {
                Ok(next) => {
                    assert_invariants(&next);
                    record = Some(next);
                }
                Err(_) => {
                    // Rejections leave the stored state as it was
                    if let Some(r) = &record {
                        assert_invariants(r);
                    }
                }
            }
        }

        let record = record.unwrap();
        assert_eq!(record.sessions.len(), 3);
        assert_eq!(record.status, AttendanceStatus::Active);
    }

    #[test]
    fn test_duration_truncated_to_minutes() {
        let start = at(9, 0);
        let end = start + chrono::Duration::seconds(59 * 60 + 59);
        let record = apply_transition(None, ClockAction::In, "E001", None, start).unwrap();
        let record = apply_transition(Some(record), ClockAction::Out, "E001", None, end).unwrap();

        assert_eq!(record.sessions[0].duration_formatted.as_deref(), Some("0h 59m"));
    }

    #[test]
    fn test_backwards_clock_yields_zero_duration() {
        let record = apply_transition(None, ClockAction::In, "E001", None, at(10, 0)).unwrap();
        let record = apply_transition(Some(record), ClockAction::Out, "E001", None, at(9, 0)).unwrap();
        assert_eq!(record.sessions[0].duration, Some(0));
    }

    #[test]
    fn test_last_action() {
        let record = apply_transition(None, ClockAction::In, "E001", None, at(9, 0)).unwrap();
        assert_eq!(record.last_action().unwrap().to_string(), "Clocked in at 09:00:00");

        let record = apply_transition(Some(record), ClockAction::Out, "E001", None, at(12, 30)).unwrap();
        assert_eq!(record.last_action().unwrap().to_string(), "Clocked out at 12:30:00");
    }

    #[test]
    fn test_json_roundtrip_of_open_session() {
        let record = apply_transition(None, ClockAction::In, "E001", Some("Ada"), at(9, 0)).unwrap();
        let json = serde_json::to_value(&record).unwrap();

        assert_eq!(json["status"], "ACTIVE");
        assert_eq!(json["sessions"][0]["clockInTime"], "09:00:00");
        assert!(json["sessions"][0]["clockOut"].is_null());

        let back: AttendanceRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }
}
