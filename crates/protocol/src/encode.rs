//! The client side of the Lumberjack protocol
//!
//! Frame writers for agents that ship events to a logship server. Used by
//! the integration tests; the layout mirrors the decoder in `decode`.

use std::io::Write;

use flate2::write::ZlibEncoder;
use flate2::Compression;

use crate::{FRAME_COMPRESSED, FRAME_DATA, FRAME_JSON, FRAME_WINDOW, VERSION_2};

/// Encode a window frame announcing `wlen` upcoming data frames
pub fn window_frame(wlen: u32) -> [u8; 6] {
    let mut buf = [0u8; 6];
    buf[0] = VERSION_2;
    buf[1] = FRAME_WINDOW;
    buf[2..].copy_from_slice(&wlen.to_be_bytes());
    buf
}

/// Encode a key/value data frame
pub fn data_frame(seq: u32, pairs: &[(&str, &str)]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(10 + pairs.len() * 16);
    buf.push(VERSION_2);
    buf.push(FRAME_DATA);
    buf.extend_from_slice(&seq.to_be_bytes());
    buf.extend_from_slice(&(pairs.len() as u32).to_be_bytes());
    for (key, value) in pairs {
        buf.extend_from_slice(&(key.len() as u32).to_be_bytes());
        buf.extend_from_slice(key.as_bytes());
        buf.extend_from_slice(&(value.len() as u32).to_be_bytes());
        buf.extend_from_slice(value.as_bytes());
    }
    buf
}

/// Encode a JSON data frame
pub fn json_frame(seq: u32, json: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(10 + json.len());
    buf.push(VERSION_2);
    buf.push(FRAME_JSON);
    buf.extend_from_slice(&seq.to_be_bytes());
    buf.extend_from_slice(&(json.len() as u32).to_be_bytes());
    buf.extend_from_slice(json);
    buf
}

/// Compress inner frames into a `2C` frame
pub fn compressed_block(inner: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(inner).expect("write to Vec cannot fail");
    let payload = encoder.finish().expect("finish to Vec cannot fail");

    let mut buf = Vec::with_capacity(6 + payload.len());
    buf.push(VERSION_2);
    buf.push(FRAME_COMPRESSED);
    buf.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    buf.extend_from_slice(&payload);
    buf
}

/// Builder for a complete window: window frame + compressed block
///
/// Sequence numbers are assigned consecutively starting from the seed
/// passed to [`WindowBuilder::new`], the way upstream agents number their
/// in-flight window.
///
/// # Example
///
/// ```
/// use logship_protocol::WindowBuilder;
///
/// let stream = WindowBuilder::new(1)
///     .push(&[("host", "h"), ("file", "/var/log/app"), ("line", "hello")])
///     .push(&[("host", "h"), ("file", "/var/log/app"), ("line", "world")])
///     .finish();
/// assert_eq!(&stream[..2], b"2W");
/// ```
#[derive(Debug)]
pub struct WindowBuilder {
    next_seq: u32,
    frames: Vec<u8>,
    count: u32,
}

impl WindowBuilder {
    /// Start a window whose first frame carries `first_seq`
    pub fn new(first_seq: u32) -> Self {
        Self {
            next_seq: first_seq,
            frames: Vec::new(),
            count: 0,
        }
    }

    /// Append a key/value data frame
    pub fn push(mut self, pairs: &[(&str, &str)]) -> Self {
        self.frames.extend_from_slice(&data_frame(self.next_seq, pairs));
        self.next_seq += 1;
        self.count += 1;
        self
    }

    /// Append a JSON data frame
    pub fn push_json(mut self, json: &[u8]) -> Self {
        self.frames.extend_from_slice(&json_frame(self.next_seq, json));
        self.next_seq += 1;
        self.count += 1;
        self
    }

    /// Produce the full byte stream for this window
    pub fn finish(self) -> Vec<u8> {
        let mut stream = Vec::new();
        stream.extend_from_slice(&window_frame(self.count));
        stream.extend_from_slice(&compressed_block(&self.frames));
        stream
    }
}
