//! acs-server library - access control and attendance service
//!
//! Profiles with duplicate detection, access logs, and the attendance
//! session ledger with live SSE updates.

use std::sync::Arc;
use std::time::Duration;

use acs_common::events::EventBus;
use acs_common::time::Clock;
use axum::Router;
use sqlx::SqlitePool;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod db;
pub mod error;
pub mod gate;
pub mod ledger;
pub mod matcher;
pub mod models;
pub mod pagination;
pub mod registration;

use gate::{DuplicateGate, SqliteProfileScan};
use ledger::SessionLedger;
use registration::ProfileRegistry;

/// Service name reported by `/health` and SSE logging
pub const SERVICE_NAME: &str = "acs-server";

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    /// Update broadcaster; one receiver per SSE subscription
    pub events: EventBus,
    pub ledger: Arc<SessionLedger>,
    pub registry: Arc<ProfileRegistry>,
    pub clock: Arc<dyn Clock>,
    /// Interval between keepalive events on each SSE stream
    pub keepalive: Duration,
}

impl AppState {
    /// Wire the ledger, gate and registry around one pool and one bus
    pub fn new(db: SqlitePool, events: EventBus, clock: Arc<dyn Clock>, keepalive: Duration) -> Self {
        let ledger = SessionLedger::new(db.clone(), events.clone(), Arc::clone(&clock));
        let gate = DuplicateGate::new(Arc::new(SqliteProfileScan::new(db.clone())));
        let registry = ProfileRegistry::new(db.clone(), gate);

        Self {
            db,
            events,
            ledger: Arc::new(ledger),
            registry: Arc::new(registry),
            clock,
            keepalive,
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::attendance_routes())
        .merge(api::profile_routes())
        .merge(api::access_routes())
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
