//! Logship Buffer - per-input fan-out broadcaster
//!
//! One `Buffer` exists per input. It owns a bounded input queue and a
//! dynamic set of named subscribers, each with its own bounded channel.
//!
//! # Backpressure policy
//!
//! The input-side send **blocks** when the input queue is full; that
//! pressure propagates back to the network receiver, which stops acking
//! and slows the upstream agent. The subscriber-side send is
//! **non-blocking**: a subscriber whose channel is full drops that event
//! for that subscriber only. One slow sink can never stall producers or
//! its peers - subscribers that need durability must spool themselves.
//!
//! # Ownership
//!
//! All mutation of the subscriber map happens on the buffer's owning task.
//! External callers talk to it through [`BufferHandle`], which sends typed
//! requests over a control channel - there is no shared lock.

mod buffer;
mod error;
mod metrics;
mod subscriber;

pub use buffer::{Buffer, BufferHandle, EventSender};
pub use error::BufferError;
pub use metrics::{BufferMetrics, BufferSnapshot, DropTracker};
pub use subscriber::SubscriberHandle;

/// Result type for buffer operations
pub type Result<T> = std::result::Result<T, BufferError>;

/// Default capacity for the input queue and subscriber channels
pub const DEFAULT_QUEUE_SIZE: usize = 100;
