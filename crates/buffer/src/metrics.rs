//! Buffer metrics
//!
//! Atomic counters with relaxed ordering; values are eventually consistent
//! and safe to read from any task.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for one buffer
#[derive(Debug, Default)]
pub struct BufferMetrics {
    /// Events dequeued from the input queue
    events_received: AtomicU64,

    /// Per-subscriber sends that were queued
    events_delivered: AtomicU64,

    /// Per-subscriber sends dropped on a full channel
    events_dropped: AtomicU64,

    /// Subscriber registrations accepted
    subscribers_added: AtomicU64,

    /// Duplicate registrations rejected
    subscribers_rejected: AtomicU64,
}

impl BufferMetrics {
    /// Create a metrics instance with all counters at zero
    pub const fn new() -> Self {
        Self {
            events_received: AtomicU64::new(0),
            events_delivered: AtomicU64::new(0),
            events_dropped: AtomicU64::new(0),
            subscribers_added: AtomicU64::new(0),
            subscribers_rejected: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn record_received(&self) {
        self.events_received.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_delivered(&self) {
        self.events_delivered.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_dropped(&self) {
        self.events_dropped.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_subscriber_added(&self) {
        self.subscribers_added.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_subscriber_rejected(&self) {
        self.subscribers_rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of all counters
    pub fn snapshot(&self) -> BufferSnapshot {
        BufferSnapshot {
            events_received: self.events_received.load(Ordering::Relaxed),
            events_delivered: self.events_delivered.load(Ordering::Relaxed),
            events_dropped: self.events_dropped.load(Ordering::Relaxed),
            subscribers_added: self.subscribers_added.load(Ordering::Relaxed),
            subscribers_rejected: self.subscribers_rejected.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time snapshot of buffer metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BufferSnapshot {
    pub events_received: u64,
    pub events_delivered: u64,
    pub events_dropped: u64,
    pub subscribers_added: u64,
    pub subscribers_rejected: u64,
}

impl BufferSnapshot {
    /// Total per-subscriber send attempts (delivered + dropped)
    #[inline]
    pub fn send_attempts(&self) -> u64 {
        self.events_delivered + self.events_dropped
    }
}

/// Rate-limited logging for subscriber drops
///
/// Aggregates drop events and emits one summary per second instead of a
/// log line per event, so a stalled sink cannot flood the log while still
/// being visible to operators.
pub struct DropTracker {
    interval_drops: AtomicU64,
    last_log_ms: AtomicU64,
}

/// Log interval in milliseconds
const LOG_INTERVAL_MS: u64 = 1000;

impl DropTracker {
    pub fn new() -> Self {
        Self {
            interval_drops: AtomicU64::new(0),
            last_log_ms: AtomicU64::new(now_ms()),
        }
    }

    /// Record one dropped event for the named subscriber; logs at most
    /// once per interval
    pub fn record_drop(&self, buffer: &str, subscriber: &str) {
        self.interval_drops.fetch_add(1, Ordering::Relaxed);

        let now = now_ms();
        let last = self.last_log_ms.load(Ordering::Relaxed);
        if now.saturating_sub(last) < LOG_INTERVAL_MS {
            return;
        }
        // Claim the log slot; losers skip
        if self
            .last_log_ms
            .compare_exchange(last, now, Ordering::SeqCst, Ordering::Relaxed)
            .is_err()
        {
            return;
        }

        let drops = self.interval_drops.swap(0, Ordering::Relaxed);
        if drops > 0 {
            tracing::warn!(
                buffer = %buffer,
                subscriber = %subscriber,
                dropped = drops,
                "subscriber channel full, events dropped in last second"
            );
        }
    }

    #[cfg(test)]
    pub fn current_drops(&self) -> u64 {
        self.interval_drops.load(Ordering::Relaxed)
    }
}

impl Default for DropTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[inline]
fn now_ms() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
