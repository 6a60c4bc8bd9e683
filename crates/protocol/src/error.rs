//! Protocol error types

use thiserror::Error;

use crate::{MAX_KEY_LEN, MAX_VALUE_LEN};

/// Errors produced while decoding the Lumberjack wire format
///
/// Every variant aborts the connection it occurred on; there are no
/// retries at this layer.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The stream ended in the middle of a frame
    #[error("truncated frame while reading {0}")]
    Truncated(&'static str),

    /// A key length exceeded the guard
    #[error("key exceeds max len {MAX_KEY_LEN}, got {0} bytes")]
    KeyTooLong(u32),

    /// A value length exceeded the guard
    #[error("value exceeds max len {MAX_VALUE_LEN}, got {0} bytes")]
    ValueTooLong(u32),

    /// An unrecognized frame tag
    #[error("unknown frame type: {}{}", *.0 as char, *.1 as char)]
    UnknownFrame(u8, u8),

    /// The compressed block could not be inflated
    #[error("failed to decompress block: {0}")]
    Decompress(#[source] std::io::Error),

    /// A JSON frame body was not a valid JSON object
    #[error("invalid JSON frame: {0}")]
    Json(#[from] serde_json::Error),
}
