//! Common types shared by inputs

use std::sync::atomic::{AtomicU64, Ordering};

use logship_protocol::{Event, Fields};

/// Metrics shared by all input types
#[derive(Debug, Default)]
pub struct InputMetrics {
    /// Currently active connections
    pub connections_active: AtomicU64,

    /// Total connections accepted
    pub connections_total: AtomicU64,

    /// Total events pushed to the buffer
    pub events_received: AtomicU64,

    /// Total payload bytes consumed
    pub bytes_received: AtomicU64,

    /// Total errors encountered
    pub errors: AtomicU64,
}

impl InputMetrics {
    /// Create a metrics instance with all counters at zero
    pub const fn new() -> Self {
        Self {
            connections_active: AtomicU64::new(0),
            connections_total: AtomicU64::new(0),
            events_received: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
            errors: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn connection_opened(&self) {
        self.connections_active.fetch_add(1, Ordering::Relaxed);
        self.connections_total.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn connection_closed(&self) {
        self.connections_active.fetch_sub(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn event_received(&self, bytes: u64) {
        self.events_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_received.fetch_add(bytes, Ordering::Relaxed);
    }

    #[inline]
    pub fn error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of all counters
    pub fn snapshot(&self) -> InputSnapshot {
        InputSnapshot {
            connections_active: self.connections_active.load(Ordering::Relaxed),
            connections_total: self.connections_total.load(Ordering::Relaxed),
            events_received: self.events_received.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time snapshot of input metrics
#[derive(Debug, Clone, Copy, Default)]
pub struct InputSnapshot {
    pub connections_active: u64,
    pub connections_total: u64,
    pub events_received: u64,
    pub bytes_received: u64,
    pub errors: u64,
}

/// Build an event from a raw line or broker payload
///
/// With `json_decode` the payload must be a JSON object; its members
/// become the event's fields (numbers kept at full precision). Returns
/// `None` when decoding was requested but failed - callers skip the
/// payload.
pub fn event_from_payload(payload: &str, json_decode: bool) -> Option<Event> {
    let mut event = Event::from_text(payload);
    if json_decode {
        match serde_json::from_str::<Fields>(payload) {
            Ok(fields) => event.fields = fields,
            Err(e) => {
                tracing::debug!(error = %e, "skipping undecodable payload");
                return None;
            }
        }
    }
    Some(event)
}
