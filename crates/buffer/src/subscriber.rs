//! Subscriber handle
//!
//! Wraps the sending half of a subscriber's bounded channel so the buffer
//! task can fan out without knowing anything about the output behind it.

use std::sync::Arc;

use logship_protocol::Event;
use tokio::sync::mpsc;

/// Outcome of a non-blocking send to one subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// The event was queued for the subscriber
    Delivered,
    /// The subscriber channel was full; the event is dropped for it
    Full,
    /// The subscriber went away without unregistering
    Closed,
}

/// A named receiver registered with a buffer
pub struct SubscriberHandle {
    name: String,
    sender: mpsc::Sender<Arc<Event>>,
}

impl SubscriberHandle {
    /// Create a handle from a subscriber name and channel sender
    pub fn new(name: impl Into<String>, sender: mpsc::Sender<Arc<Event>>) -> Self {
        Self {
            name: name.into(),
            sender,
        }
    }

    /// The subscriber's unique name within its buffer
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Maximum capacity of the subscriber channel
    #[inline]
    pub fn capacity(&self) -> usize {
        self.sender.max_capacity()
    }

    /// Attempt a non-blocking send
    #[inline]
    pub fn try_send(&self, event: Arc<Event>) -> SendOutcome {
        match self.sender.try_send(event) {
            Ok(()) => SendOutcome::Delivered,
            Err(mpsc::error::TrySendError::Full(_)) => SendOutcome::Full,
            Err(mpsc::error::TrySendError::Closed(_)) => SendOutcome::Closed,
        }
    }
}

impl std::fmt::Debug for SubscriberHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriberHandle")
            .field("name", &self.name)
            .field("capacity", &self.capacity())
            .finish()
    }
}
