//! Server-Sent Events (SSE) utilities
//!
//! Turns an [`EventBus`] subscription into the attendance event stream:
//! a `connected` event first, then bus events interleaved with periodic
//! `keepalive` events. When the client disconnects axum drops the stream,
//! which drops the broadcast receiver and deregisters the subscriber.

use crate::events::{AcsEvent, EventBus};
use axum::response::sse::{Event, Sse};
use futures::stream::{Stream, StreamExt};
use std::convert::Infallible;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

/// Logs subscriber lifetime; dropped together with the stream
struct SubscriberGuard {
    service_name: &'static str,
}

impl Drop for SubscriberGuard {
    fn drop(&mut self) {
        info!("SSE client disconnected from {}", self.service_name);
    }
}

enum Next {
    Forward(AcsEvent),
    Skip,
    Stop,
}

/// Subscribe to the bus and produce the event sequence for one client
///
/// The subscription is registered before this function returns, so events
/// emitted after the call are delivered even if the stream has not been
/// polled yet.
pub fn subscribe_events(
    service_name: &'static str,
    bus: &EventBus,
    keepalive: Duration,
) -> impl Stream<Item = AcsEvent> {
    let mut rx = bus.subscribe();
    info!(
        "New SSE client connected to {} ({} subscribers)",
        service_name,
        bus.subscriber_count()
    );

    async_stream::stream! {
        let _guard = SubscriberGuard { service_name };

        yield AcsEvent::Connected { timestamp: crate::time::now() };

        let period = keepalive.max(Duration::from_millis(1));
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);

        loop {
            let next = tokio::select! {
                _ = ticker.tick() => {
                    debug!("SSE: Sending keepalive");
                    Next::Forward(AcsEvent::Keepalive { timestamp: crate::time::now() })
                }
                received = rx.recv() => match received {
                    Ok(event) => Next::Forward(event),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("SSE client on {} lagged, skipped {} events", service_name, skipped);
                        Next::Skip
                    }
                    Err(RecvError::Closed) => Next::Stop,
                },
            };

            match next {
                Next::Forward(event) => yield event,
                Next::Skip => continue,
                Next::Stop => break,
            }
        }
    }
}

/// Create the axum SSE response for a new subscriber
pub fn create_event_sse_stream(
    service_name: &'static str,
    bus: &EventBus,
    keepalive: Duration,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream = subscribe_events(service_name, bus, keepalive).filter_map(|event| async move {
        match Event::default().event(event.event_type()).json_data(&event) {
            Ok(sse_event) => Some(Ok(sse_event)),
            Err(e) => {
                warn!("Failed to serialize SSE event: {}", e);
                None
            }
        }
    });

    Sse::new(stream)
}
