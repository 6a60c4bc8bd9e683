//! Buffer error types

use thiserror::Error;

/// Errors surfaced by buffer operations
#[derive(Debug, Error)]
pub enum BufferError {
    /// A subscriber with this name is already registered
    #[error("subscriber {0} already exists")]
    SubscriberExists(String),

    /// The buffer task has stopped and no longer accepts requests
    #[error("buffer {0} is closed")]
    Closed(String),
}
