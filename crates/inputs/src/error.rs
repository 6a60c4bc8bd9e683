//! Input error types

use thiserror::Error;

use logship_protocol::ProtocolError;

/// Errors raised by inputs
#[derive(Debug, Error)]
pub enum InputError {
    /// Failed to bind the listen address
    #[error("failed to bind to {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to read a certificate or key file
    #[error("failed to load TLS material from '{path}': {source}")]
    TlsLoad {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The key file held no usable private key
    #[error("no private key found in '{path}'")]
    NoPrivateKey { path: String },

    /// TLS configuration was rejected
    #[error("invalid TLS configuration: {0}")]
    Tls(#[from] tokio_rustls::rustls::Error),

    /// I/O error on a connection or stream
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Wire decoding failed; the connection is closed
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Broker error
    #[error("broker error: {0}")]
    Redis(#[from] redis::RedisError),

    /// The buffer went away; the pipeline is shutting down
    #[error("event channel closed")]
    ChannelClosed,
}
