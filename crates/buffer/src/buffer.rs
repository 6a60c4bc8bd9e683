//! The fan-out buffer and its handle
//!
//! `Buffer::run` is the owning task: the only code that touches the
//! subscriber map. `BufferHandle` is the cheap, cloneable face given to
//! inputs (blocking event sends) and outputs (subscriber registration).

use std::collections::HashMap;
use std::sync::Arc;

use logship_protocol::Event;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use crate::metrics::{BufferMetrics, BufferSnapshot, DropTracker};
use crate::subscriber::{SendOutcome, SubscriberHandle};
use crate::{BufferError, Result, DEFAULT_QUEUE_SIZE};

/// Sending half of a buffer's input queue
///
/// Handed to inputs; the send blocks when the queue is full, which is the
/// backpressure path back to the network receiver.
pub type EventSender = mpsc::Sender<Event>;

/// Control requests handled by the owning task
enum ControlMsg {
    Add {
        name: String,
        sender: mpsc::Sender<Arc<Event>>,
        reply: oneshot::Sender<Result<()>>,
    },
    Del {
        name: String,
    },
}

/// One buffer instance: bounded input queue plus named subscribers
pub struct Buffer {
    name: String,
    input_rx: mpsc::Receiver<Event>,
    control_rx: mpsc::Receiver<ControlMsg>,
    subscribers: HashMap<String, SubscriberHandle>,
    metrics: Arc<BufferMetrics>,
    drop_tracker: DropTracker,
}

/// Cloneable handle for talking to a running buffer
#[derive(Clone)]
pub struct BufferHandle {
    name: String,
    input_tx: EventSender,
    control_tx: mpsc::Sender<ControlMsg>,
    metrics: Arc<BufferMetrics>,
}

impl Buffer {
    /// Create a buffer and its handle with the default queue capacity
    pub fn new(name: impl Into<String>) -> (Self, BufferHandle) {
        Self::with_capacity(name, DEFAULT_QUEUE_SIZE)
    }

    /// Create a buffer with a custom input queue capacity
    pub fn with_capacity(name: impl Into<String>, capacity: usize) -> (Self, BufferHandle) {
        let name = name.into();
        let (input_tx, input_rx) = mpsc::channel(capacity);
        let (control_tx, control_rx) = mpsc::channel(16);
        let metrics = Arc::new(BufferMetrics::new());

        let buffer = Self {
            name: name.clone(),
            input_rx,
            control_rx,
            subscribers: HashMap::new(),
            metrics: Arc::clone(&metrics),
            drop_tracker: DropTracker::new(),
        };
        let handle = BufferHandle {
            name,
            input_tx,
            control_tx,
            metrics,
        };
        (buffer, handle)
    }

    /// The buffer's name (its input's name)
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run the owning task until cancelled or all handles are gone
    ///
    /// Events still sitting in the input queue when the task stops are
    /// dropped; shutdown is best-effort by design.
    pub async fn run(mut self, cancel: CancellationToken) {
        tracing::debug!(buffer = %self.name, "buffer starting");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                msg = self.control_rx.recv() => match msg {
                    Some(msg) => self.handle_control(msg),
                    None => break,
                },
                event = self.input_rx.recv() => match event {
                    Some(event) => self.publish(event),
                    None => break,
                },
            }
        }

        let snapshot = self.metrics.snapshot();
        tracing::info!(
            buffer = %self.name,
            events_received = snapshot.events_received,
            events_delivered = snapshot.events_delivered,
            events_dropped = snapshot.events_dropped,
            "buffer stopped"
        );
    }

    /// Apply one control request on the owning task
    fn handle_control(&mut self, msg: ControlMsg) {
        match msg {
            ControlMsg::Add {
                name,
                sender,
                reply,
            } => {
                let result = if self.subscribers.contains_key(&name) {
                    tracing::warn!(
                        buffer = %self.name,
                        subscriber = %name,
                        "duplicate subscriber registration rejected"
                    );
                    self.metrics.record_subscriber_rejected();
                    Err(BufferError::SubscriberExists(name))
                } else {
                    tracing::debug!(
                        buffer = %self.name,
                        subscriber = %name,
                        capacity = sender.max_capacity(),
                        "subscriber registered"
                    );
                    self.metrics.record_subscriber_added();
                    self.subscribers
                        .insert(name.clone(), SubscriberHandle::new(name, sender));
                    Ok(())
                };
                // The requester may have given up waiting; that's fine
                let _ = reply.send(result);
            }
            ControlMsg::Del { name } => {
                if self.subscribers.remove(&name).is_some() {
                    tracing::debug!(
                        buffer = %self.name,
                        subscriber = %name,
                        "subscriber unregistered"
                    );
                }
            }
        }
    }

    /// Fan one event out to every subscriber, never blocking
    fn publish(&mut self, event: Event) {
        self.metrics.record_received();
        let event = Arc::new(event);

        let mut stale = Vec::new();
        for sub in self.subscribers.values() {
            match sub.try_send(Arc::clone(&event)) {
                SendOutcome::Delivered => self.metrics.record_delivered(),
                SendOutcome::Full => {
                    self.metrics.record_dropped();
                    self.drop_tracker.record_drop(&self.name, sub.name());
                }
                SendOutcome::Closed => {
                    self.metrics.record_dropped();
                    stale.push(sub.name().to_string());
                }
            }
        }

        // A closed channel means the output vanished without unregistering
        for name in stale {
            tracing::warn!(
                buffer = %self.name,
                subscriber = %name,
                "subscriber channel closed, removing"
            );
            self.subscribers.remove(&name);
        }
    }
}

impl BufferHandle {
    /// The buffer's name
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Clone of the input-queue sender for an input to own
    #[inline]
    pub fn sender(&self) -> EventSender {
        self.input_tx.clone()
    }

    /// Enqueue an event, waiting while the input queue is full
    pub async fn send(&self, event: Event) -> Result<()> {
        self.input_tx
            .send(event)
            .await
            .map_err(|_| BufferError::Closed(self.name.clone()))
    }

    /// Register a named subscriber
    ///
    /// The caller owns the receiving half of `sender`'s channel. A
    /// duplicate name is rejected and the existing subscriber stays.
    pub async fn add_subscriber(
        &self,
        name: impl Into<String>,
        sender: mpsc::Sender<Arc<Event>>,
    ) -> Result<()> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.control_tx
            .send(ControlMsg::Add {
                name: name.into(),
                sender,
                reply: reply_tx,
            })
            .await
            .map_err(|_| BufferError::Closed(self.name.clone()))?;
        reply_rx
            .await
            .map_err(|_| BufferError::Closed(self.name.clone()))?
    }

    /// Unregister a subscriber; unknown names are a no-op
    pub async fn del_subscriber(&self, name: impl Into<String>) -> Result<()> {
        self.control_tx
            .send(ControlMsg::Del { name: name.into() })
            .await
            .map_err(|_| BufferError::Closed(self.name.clone()))
    }

    /// Current buffer metrics
    #[inline]
    pub fn metrics(&self) -> BufferSnapshot {
        self.metrics.snapshot()
    }
}

impl std::fmt::Debug for BufferHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferHandle")
            .field("name", &self.name)
            .finish()
    }
}
