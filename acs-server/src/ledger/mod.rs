//! Session Ledger
//!
//! Turns clock events into per-day attendance records and publishes every
//! successful transition on the event bus.
//!
//! A transition runs under the per-(identity, day) lock, then writes the
//! full next record with a version-guarded statement. A lost write (another
//! process sharing the database got there first) reloads and re-applies.

pub mod locks;
pub mod record;
pub mod report;

use std::sync::Arc;

use acs_common::events::{AcsEvent, AttendanceUpdate, ClockAction, EventBus};
use acs_common::time::{local_day, month_bounds, Clock};
use chrono::NaiveDate;
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::db::attendance::{self, AttendanceFilter};
use crate::pagination::{calculate_pagination, Pagination};
use locks::KeyedLocks;
use record::{apply_transition, AttendanceRecord, TransitionError};
use report::{build_monthly_report, summarize_day, MonthlyReport, TodaySummary};

/// Write attempts per transition before giving up
pub const MAX_WRITE_ATTEMPTS: usize = 5;

#[derive(Debug, Error)]
pub enum LedgerError {
    /// Malformed request; nothing was read or written
    #[error("{0}")]
    Validation(String),

    /// Transition not allowed from the current state; nothing was written
    #[error(transparent)]
    Conflict(#[from] TransitionError),

    /// Every write attempt lost to a concurrent writer
    #[error("Attendance record is being modified concurrently, please retry")]
    Contention,

    #[error(transparent)]
    Storage(#[from] acs_common::Error),
}

/// Validated clock event
#[derive(Debug, Clone)]
pub struct ClockRequest {
    pub identity: String,
    pub display_name: Option<String>,
    pub action: ClockAction,
}

impl ClockRequest {
    /// Validate raw request fields
    pub fn from_raw(
        identity: Option<&str>,
        display_name: Option<&str>,
        action: Option<&str>,
    ) -> Result<Self, LedgerError> {
        let identity = identity.map(str::trim).filter(|s| !s.is_empty());
        let action = action.map(str::trim).filter(|s| !s.is_empty());

        let (identity, action) = match (identity, action) {
            (Some(identity), Some(action)) => (identity, action),
            _ => {
                return Err(LedgerError::Validation(
                    "identity and action are required".to_string(),
                ))
            }
        };

        let action = ClockAction::parse(action).ok_or_else(|| {
            LedgerError::Validation(format!("Invalid action '{}': must be IN or OUT", action))
        })?;

        Ok(Self {
            identity: identity.to_string(),
            display_name: display_name
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
            action,
        })
    }
}

/// Result of a successful transition
#[derive(Debug, Clone)]
pub struct ClockOutcome {
    pub message: String,
    pub record: AttendanceRecord,
}

/// One page of attendance records
#[derive(Debug, Clone)]
pub struct RecordsPage {
    pub records: Vec<AttendanceRecord>,
    pub total: i64,
    pub pagination: Pagination,
}

pub struct SessionLedger {
    db: SqlitePool,
    events: EventBus,
    clock: Arc<dyn Clock>,
    locks: KeyedLocks<(String, NaiveDate)>,
}

impl SessionLedger {
    pub fn new(db: SqlitePool, events: EventBus, clock: Arc<dyn Clock>) -> Self {
        Self {
            db,
            events,
            clock,
            locks: KeyedLocks::new(),
        }
    }

    /// Apply a clock event to today's record for the identity
    pub async fn clock(&self, request: ClockRequest) -> Result<ClockOutcome, LedgerError> {
        let now = self.clock.now();
        let day = local_day(now);
        let _guard = self.locks.lock((request.identity.clone(), day)).await;

        for attempt in 1..=MAX_WRITE_ATTEMPTS {
            let stored = attendance::load_record(&self.db, &request.identity, day).await?;
            let version = stored.as_ref().map(|s| s.version);

            let next = apply_transition(
                stored.map(|s| s.record),
                request.action,
                &request.identity,
                request.display_name.as_deref(),
                now,
            )?;

            let written = match version {
                None => attendance::insert_record(&self.db, &next).await?,
                Some(expected) => attendance::update_record(&self.db, &next, expected).await?,
            };

            if written {
                info!(
                    identity = %next.identity,
                    date = %next.date,
                    action = request.action.as_str(),
                    sessions = next.sessions.len(),
                    total = %next.total_duration_formatted,
                    "Attendance updated"
                );
                self.publish(&next, request.action);

                let verb = match request.action {
                    ClockAction::In => "in",
                    ClockAction::Out => "out",
                };
                return Ok(ClockOutcome {
                    message: format!("Clocked {} successfully", verb),
                    record: next,
                });
            }

            warn!(
                identity = %request.identity,
                date = %day,
                attempt,
                "Attendance write lost to a concurrent writer, reloading"
            );
        }

        Err(LedgerError::Contention)
    }

    fn publish(&self, record: &AttendanceRecord, action: ClockAction) {
        let update = AttendanceUpdate {
            identity: record.identity.clone(),
            display_name: record.display_name.clone(),
            date: record.date,
            action,
            status: record.status,
            session_count: record.sessions.len(),
            total_duration: record.total_duration,
            timestamp: record.updated_at,
        };
        debug!(subscribers = self.events.subscriber_count(), "Broadcasting attendance update");
        self.events.emit_lossy(AcsEvent::AttendanceUpdate { update });
    }

    /// Records for the current local day
    pub async fn today(&self, identity: Option<&str>) -> Result<TodaySummary, LedgerError> {
        let day = local_day(self.clock.now());
        let records = attendance::records_for_day(&self.db, day, identity).await?;
        Ok(summarize_day(day, records))
    }

    /// Aggregate one calendar month
    pub async fn monthly_report(
        &self,
        identity: Option<&str>,
        month: u32,
        year: i32,
    ) -> Result<MonthlyReport, LedgerError> {
        let (start, end) = month_bounds(year, month).ok_or_else(|| {
            LedgerError::Validation("Month must be between 1 and 12".to_string())
        })?;

        let records = attendance::records_in_range(&self.db, start, end, identity).await?;
        Ok(build_monthly_report(year, month, identity, records))
    }

    /// Filtered records, newest first
    pub async fn records(
        &self,
        filter: &AttendanceFilter,
        page: i64,
        page_size: i64,
    ) -> Result<RecordsPage, LedgerError> {
        let total = attendance::count_records(&self.db, filter).await?;
        let pagination = calculate_pagination(total, page, page_size);
        let records = attendance::list_records(
            &self.db,
            filter,
            Some((pagination.page_size, pagination.offset)),
        )
        .await?;

        Ok(RecordsPage {
            records,
            total,
            pagination,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use acs_common::db::init_memory_database;
    use acs_common::events::AttendanceStatus;
    use acs_common::time::ManualClock;
    use chrono::{DateTime, Local, TimeZone, Utc};

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Local
            .with_ymd_and_hms(2026, 3, 2, hour, minute, 0)
            .unwrap()
            .with_timezone(&Utc)
    }

    async fn ledger() -> (SessionLedger, Arc<ManualClock>, EventBus) {
        let db = init_memory_database().await.unwrap();
        let events = EventBus::new(16);
        let clock = Arc::new(ManualClock::new(at(9, 0)));
        let ledger = SessionLedger::new(db, events.clone(), clock.clone());
        (ledger, clock, events)
    }

    fn request(identity: &str, action: &str) -> ClockRequest {
        ClockRequest::from_raw(Some(identity), None, Some(action)).unwrap()
    }

    #[test]
    fn test_request_validation() {
        let err = ClockRequest::from_raw(None, None, Some("IN")).unwrap_err();
        assert_eq!(err.to_string(), "identity and action are required");

        let err = ClockRequest::from_raw(Some("E001"), None, Some("  ")).unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));

        let err = ClockRequest::from_raw(Some("E001"), None, Some("LUNCH")).unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));

        let ok = ClockRequest::from_raw(Some(" E001 "), Some(""), Some("in")).unwrap();
        assert_eq!(ok.identity, "E001");
        assert_eq!(ok.display_name, None);
        assert_eq!(ok.action, ClockAction::In);
    }

    #[tokio::test]
    async fn test_full_day_scenario() {
        let (ledger, clock, _events) = ledger().await;

        ledger.clock(request("E001", "IN")).await.unwrap();
        clock.set(at(12, 0));
        ledger.clock(request("E001", "OUT")).await.unwrap();
        clock.set(at(13, 0));
        ledger.clock(request("E001", "IN")).await.unwrap();
        clock.set(at(17, 0));
        let outcome = ledger.clock(request("E001", "OUT")).await.unwrap();

        assert_eq!(outcome.message, "Clocked out successfully");
        let record = outcome.record;
        assert_eq!(record.sessions.len(), 2);
        assert_eq!(record.total_duration_formatted, "7h 0m");
        assert_eq!(record.status, AttendanceStatus::Completed);

        let today = ledger.today(None).await.unwrap();
        assert_eq!(today.total_present, 1);
        assert_eq!(today.clocked_out, 1);
    }

    #[tokio::test]
    async fn test_rejected_transition_does_not_write_or_publish() {
        let (ledger, _clock, events) = ledger().await;
        let mut rx = events.subscribe();

        let err = ledger.clock(request("E001", "OUT")).await.unwrap_err();
        assert!(matches!(err, LedgerError::Conflict(TransitionError::NotClockedIn)));
        assert!(rx.try_recv().is_err());
        assert_eq!(ledger.today(None).await.unwrap().total_present, 0);
    }

    #[tokio::test]
    async fn test_successful_transition_publishes_update() {
        let (ledger, _clock, events) = ledger().await;
        let mut rx = events.subscribe();

        ledger.clock(request("E001", "IN")).await.unwrap();

        match rx.try_recv().unwrap() {
            AcsEvent::AttendanceUpdate { update } => {
                assert_eq!(update.identity, "E001");
                assert_eq!(update.action, ClockAction::In);
                assert_eq!(update.status, AttendanceStatus::Active);
                assert_eq!(update.total_duration, 0);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_monthly_report_validates_month() {
        let (ledger, _clock, _events) = ledger().await;

        let err = ledger.monthly_report(None, 13, 2026).await.unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));

        ledger.clock(request("E001", "IN")).await.unwrap();
        let report = ledger.monthly_report(None, 3, 2026).await.unwrap();
        assert_eq!(report.total_days, 1);
        assert_eq!(report.incomplete_days, 1);
    }

    #[tokio::test]
    async fn test_concurrent_clock_ins_single_success() {
        let (ledger, _clock, _events) = ledger().await;
        let ledger = Arc::new(ledger);

        let mut handles = Vec::new();
        for _ in 0..8 {
            let ledger = Arc::clone(&ledger);
            handles.push(tokio::spawn(async move { ledger.clock(request("E001", "IN")).await }));
        }

        let mut successes = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => successes += 1,
                Err(LedgerError::Conflict(TransitionError::AlreadyClockedIn)) => {}
                Err(other) => panic!("unexpected error {:?}", other),
            }
        }
        assert_eq!(successes, 1);

        let today = ledger.today(Some("E001")).await.unwrap();
        assert_eq!(today.records[0].session_count, 1);
    }
}
