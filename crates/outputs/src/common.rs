//! Common types shared by outputs

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use logship_buffer::{BufferHandle, DEFAULT_QUEUE_SIZE};
use logship_protocol::Event;
use logship_routing::Route;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::Result;

/// What a routed output receives at construction: its buffer and route
///
/// Outputs without a route get no binding and idle; see [`run_unrouted`].
#[derive(Debug, Clone)]
pub struct Binding {
    /// Handle to the input buffer this output draws from
    pub buffer: BufferHandle,

    /// The route that selected this output
    pub route: Route,

    /// Capacity for the subscriber channel
    pub queue_size: usize,
}

impl Binding {
    /// Create a binding with the default subscriber queue capacity
    pub fn new(buffer: BufferHandle, route: Route) -> Self {
        Self {
            buffer,
            route,
            queue_size: DEFAULT_QUEUE_SIZE,
        }
    }

    /// Override the subscriber queue capacity
    pub fn with_queue_size(mut self, queue_size: usize) -> Self {
        self.queue_size = queue_size;
        self
    }

    /// Register a subscriber under `name` and return its receiver
    pub async fn subscribe(&self, name: &str) -> Result<mpsc::Receiver<Arc<Event>>> {
        let (tx, rx) = mpsc::channel(self.queue_size);
        self.buffer.add_subscriber(name, tx).await?;
        Ok(rx)
    }

    /// Unregister a subscriber; safe to call for names never registered
    pub async fn unsubscribe(&self, name: &str) {
        let _ = self.buffer.del_subscriber(name).await;
    }

    /// Apply the route's field filter and sample gate
    #[inline]
    pub fn accepts(&self, event: &Event) -> bool {
        self.route.accepts(event)
    }
}

/// Idle loop for an output with no matching route
///
/// Logs once and parks until the pipeline stops.
pub async fn run_unrouted(name: &str, kind: &str, cancel: CancellationToken) {
    tracing::info!(output = %name, kind = %kind, "no route configured, output idle");
    cancel.cancelled().await;
    tracing::info!(output = %name, "output stopped");
}

/// Metrics shared by all output types
#[derive(Debug, Default)]
pub struct OutputMetrics {
    /// Events taken off the subscriber channel
    pub events_received: AtomicU64,

    /// Events rejected by the field filter or sample gate
    pub events_filtered: AtomicU64,

    /// Events delivered to the external system
    pub events_written: AtomicU64,

    /// Batches flushed (batch outputs only)
    pub batches_flushed: AtomicU64,

    /// Errors encountered
    pub errors: AtomicU64,
}

impl OutputMetrics {
    /// Create a metrics instance with all counters at zero
    pub const fn new() -> Self {
        Self {
            events_received: AtomicU64::new(0),
            events_filtered: AtomicU64::new(0),
            events_written: AtomicU64::new(0),
            batches_flushed: AtomicU64::new(0),
            errors: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn event_received(&self) {
        self.events_received.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn event_filtered(&self) {
        self.events_filtered.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn event_written(&self) {
        self.events_written.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn batch_flushed(&self) {
        self.batches_flushed.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of all counters
    pub fn snapshot(&self) -> OutputSnapshot {
        OutputSnapshot {
            events_received: self.events_received.load(Ordering::Relaxed),
            events_filtered: self.events_filtered.load(Ordering::Relaxed),
            events_written: self.events_written.load(Ordering::Relaxed),
            batches_flushed: self.batches_flushed.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time snapshot of output metrics
#[derive(Debug, Clone, Copy, Default)]
pub struct OutputSnapshot {
    pub events_received: u64,
    pub events_filtered: u64,
    pub events_written: u64,
    pub batches_flushed: u64,
    pub errors: u64,
}
