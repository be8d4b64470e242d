//! Event types and EventBus for ACS
//!
//! The EventBus is the update broadcaster: handlers publish attendance
//! changes to it and every live SSE subscription receives a copy.
//! Delivery is at-most-once to currently connected subscribers only;
//! there is no replay for late subscribers.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Clock event direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClockAction {
    #[serde(rename = "IN")]
    In,
    #[serde(rename = "OUT")]
    Out,
}

impl ClockAction {
    /// Parse the wire form (`"IN"` / `"OUT"`, case-insensitive)
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "IN" => Some(ClockAction::In),
            "OUT" => Some(ClockAction::Out),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ClockAction::In => "IN",
            ClockAction::Out => "OUT",
        }
    }
}

/// Aggregate status of one attendance record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttendanceStatus {
    /// A session is currently open
    Active,
    /// All sessions are closed
    Completed,
}

impl AttendanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttendanceStatus::Active => "ACTIVE",
            AttendanceStatus::Completed => "COMPLETED",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "ACTIVE" => Some(AttendanceStatus::Active),
            "COMPLETED" => Some(AttendanceStatus::Completed),
            _ => None,
        }
    }
}

/// Ledger change carried by [`AcsEvent::AttendanceUpdate`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceUpdate {
    /// Identity whose record changed
    pub identity: String,
    pub display_name: Option<String>,
    /// Local calendar day of the record
    pub date: NaiveDate,
    /// Transition that produced the change
    pub action: ClockAction,
    /// Record status after the transition
    pub status: AttendanceStatus,
    pub session_count: usize,
    /// Sum of closed-session durations (ms)
    pub total_duration: i64,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
}

/// ACS event types
///
/// Serialized with a `type` tag, so an attendance change goes over the wire
/// as `{"type": "attendance_update", "update": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AcsEvent {
    /// First event on every new subscription
    Connected {
        #[serde(with = "chrono::serde::ts_milliseconds")]
        timestamp: DateTime<Utc>,
    },

    /// Periodic event keeping idle subscriptions open
    Keepalive {
        #[serde(with = "chrono::serde::ts_milliseconds")]
        timestamp: DateTime<Utc>,
    },

    /// An attendance record was created or changed
    AttendanceUpdate { update: AttendanceUpdate },
}

impl AcsEvent {
    /// SSE `event:` field for this event
    pub fn event_type(&self) -> &'static str {
        match self {
            AcsEvent::Connected { .. } => "connected",
            AcsEvent::Keepalive { .. } => "keepalive",
            AcsEvent::AttendanceUpdate { .. } => "attendance_update",
        }
    }
}

// ========================================
// EventBus Implementation
// ========================================

/// Central event distribution bus
///
/// Backed by `tokio::sync::broadcast`:
/// - publishing never blocks on slow subscribers
/// - dropping a receiver deregisters it
/// - a subscriber more than `capacity` events behind skips the gap
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<AcsEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<AcsEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    #[allow(clippy::result_large_err)]
    pub fn emit(&self, event: AcsEvent) -> Result<usize, broadcast::error::SendError<AcsEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: AcsEvent) {
        let _ = self.tx.send(event);
    }

    /// Current number of live subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
