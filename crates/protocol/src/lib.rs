//! Logship Protocol - Event model and Lumberjack wire format
//!
//! This crate provides the types that flow through the pipeline and the
//! codec for the Lumberjack protocol spoken by filebeat-style agents:
//! - `Event` - the in-flight log record
//! - `WindowDecoder` - decoder for the inner frames of a compressed block
//! - `encode` - the client side of the protocol (used by tests and
//!   forwarding clients)
//!
//! # Wire format
//!
//! The stream is a sequence of two-byte frame tags (version byte + type
//! byte, big-endian lengths throughout):
//!
//! ```text
//! '2W' u32 wlen                      window: wlen data frames follow
//! '2C' u32 plen, plen bytes          zlib-compressed block of inner frames
//! '2D' u32 seq, u32 count, pairs     key/value data frame
//! '2J' u32 seq, u32 len, len bytes   JSON data frame
//! '2A' u32 seq                       ack (written by the server)
//! ```
//!
//! Version 1 frames (`'1'` prefix) carry identical semantics; only the ack
//! differs (a fixed six-byte `ACKMSG`).
//!
//! # Design
//!
//! - Decoding is synchronous over byte slices; the connection-level read
//!   loop lives with the inputs. A compressed block is fully decompressed
//!   before the first event is yielded, so a corrupt block never delivers
//!   partial events.
//! - Field values are dynamic (`serde_json::Value`) so JSON frames keep
//!   their numeric literals at full precision.

mod decode;
mod encode;
mod error;
mod event;

pub use decode::{decompress_block, WindowDecoder};
pub use encode::{compressed_block, data_frame, json_frame, window_frame, WindowBuilder};
pub use error::ProtocolError;
pub use event::{Event, Fields};

/// Result type for protocol operations
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Protocol version byte for Lumberjack v1
pub const VERSION_1: u8 = b'1';

/// Protocol version byte for Lumberjack v2
pub const VERSION_2: u8 = b'2';

/// Frame type: window length announcement
pub const FRAME_WINDOW: u8 = b'W';

/// Frame type: zlib-compressed block
pub const FRAME_COMPRESSED: u8 = b'C';

/// Frame type: key/value data frame (inside a compressed block)
pub const FRAME_DATA: u8 = b'D';

/// Frame type: JSON data frame (inside a compressed block)
pub const FRAME_JSON: u8 = b'J';

/// Frame type: acknowledgement
pub const FRAME_ACK: u8 = b'A';

/// Fixed v1 acknowledgement payload
pub const ACKMSG_V1: &[u8; 6] = b"ACKMSG";

/// Maximum accepted key length (100 MiB)
pub const MAX_KEY_LEN: u32 = 100 * 1024 * 1024;

/// Maximum accepted value length (250 MiB)
pub const MAX_VALUE_LEN: u32 = 250 * 1024 * 1024;

/// Encode a v2 acknowledgement frame for the given sequence number
pub fn ack_frame(seq: u32) -> [u8; 6] {
    let mut buf = [0u8; 6];
    buf[0] = VERSION_2;
    buf[1] = FRAME_ACK;
    buf[2..].copy_from_slice(&seq.to_be_bytes());
    buf
}

// Test modules - only compiled during testing
#[cfg(test)]
mod decode_test;
#[cfg(test)]
mod event_test;
