//! Logship Inputs - components that receive events and push them to a buffer
//!
//! Three inputs ship with the pipeline:
//! - `filebeat` - a Lumberjack v1/v2 server over TLS (or plaintext) for
//!   filebeat-style agents, acknowledging each compressed window
//! - `stdin` - newline-delimited events on standard input
//! - `redis` - a broker list consumer
//!
//! Every input owns a clone of its buffer's input-queue sender and sends
//! with backpressure: when the queue is full the input stalls, which for
//! the filebeat input means acks stop flowing and the upstream agent slows
//! down.

mod common;
mod error;
mod filebeat;
mod parser;
mod redis_input;
mod stdin;

pub use common::{event_from_payload, InputMetrics, InputSnapshot};
pub use error::InputError;
pub use filebeat::{FilebeatConfig, FilebeatInput};
pub use parser::Parser;
pub use redis_input::{RedisInput, RedisInputConfig};
pub use stdin::{StdinConfig, StdinInput};

/// Result type for input operations
pub type Result<T> = std::result::Result<T, InputError>;

#[cfg(test)]
mod parser_test;
