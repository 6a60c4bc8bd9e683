//! Output error types

use thiserror::Error;

use logship_buffer::BufferError;

/// Errors raised by outputs
#[derive(Debug, Error)]
pub enum OutputError {
    /// Subscriber registration failed
    #[error("subscription failed: {0}")]
    Subscribe(#[from] BufferError),

    /// Failed to bind the listen address
    #[error("failed to bind to {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    /// I/O error on a connection
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The remote end rejected a bulk request
    #[error("bulk request rejected with status {0}")]
    BulkRejected(u16),

    /// Broker error
    #[error("broker error: {0}")]
    Redis(#[from] redis::RedisError),

    /// WebSocket protocol error
    #[error("websocket error: {0}")]
    Websocket(#[from] tokio_tungstenite::tungstenite::Error),
}
