//! Server-Sent Events for attendance updates

use crate::{AppState, SERVICE_NAME};
use axum::{
    extract::State,
    response::sse::{Event, Sse},
};
use futures::stream::Stream;
use std::convert::Infallible;

/// GET /api/attendance/stream
///
/// Streams `connected` once, then `attendance_update` for every ledger
/// change and `keepalive` while idle. The subscription is released when
/// the client disconnects.
pub async fn attendance_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    acs_common::sse::create_event_sse_stream(SERVICE_NAME, &state.events, state.keepalive)
}
