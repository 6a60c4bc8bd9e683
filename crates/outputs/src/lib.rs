//! Logship Outputs - components that subscribe to a buffer and forward
//! events to an external system
//!
//! Every output honors the same contract:
//! - on start, register a subscriber with its buffer (batch outputs under
//!   the output name, connection-oriented outputs once per client)
//! - consume events, apply the route's field filter and sample gate
//! - deliver to the external system, tolerating lost events - the fan-out
//!   is non-blocking and a full subscriber channel drops events
//! - on stop, unregister and flush pending work
//!
//! An output with no matching route starts in a logged no-op state.
//!
//! Batch outputs (elasticsearch, s3, redis) own a flush timer and retry a
//! failed flush a fixed number of times before dropping the batch.

mod common;
mod elasticsearch;
mod error;
mod redis_output;
mod s3;
mod tcp;
mod websocket;

pub use common::{Binding, OutputMetrics, OutputSnapshot};
pub use elasticsearch::{ElasticsearchConfig, ElasticsearchOutput};
pub use error::OutputError;
pub use redis_output::{RedisOutput, RedisOutputConfig};
pub use s3::{S3Config, S3Output};
pub use tcp::{TcpConfig, TcpOutput};
pub use websocket::{WebsocketConfig, WebsocketOutput};

/// Result type for output operations
pub type Result<T> = std::result::Result<T, OutputError>;

/// Events buffered before a batch output forces a flush
pub const BATCH_SIZE: usize = 100;

/// Attempts before a failing batch is dropped
pub const FLUSH_RETRIES: u32 = 3;
