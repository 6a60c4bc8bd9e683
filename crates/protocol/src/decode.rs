//! Decoder for the inner frames of a compressed block
//!
//! The connection read loop hands a fully inflated block here along with
//! the window length announced by the peer; `WindowDecoder` then yields
//! one `Event` per inner frame. Keeping decompression ahead of iteration
//! means a corrupt block fails before any event escapes.

use std::io::Read;

use chrono::{SecondsFormat, Utc};
use serde_json::Value;

use crate::event::{Event, Fields};
use crate::{
    ProtocolError, Result, FRAME_DATA, FRAME_JSON, MAX_KEY_LEN, MAX_VALUE_LEN, VERSION_1,
    VERSION_2,
};

/// Inflate the payload of a compressed frame into memory
///
/// The block is bounded by the `plen` the peer announced, so the whole
/// inflated window fits a single allocation.
pub fn decompress_block(payload: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    flate2::read::ZlibDecoder::new(payload)
        .read_to_end(&mut out)
        .map_err(ProtocolError::Decompress)?;
    Ok(out)
}

/// Streaming decoder over one decompressed window
///
/// Yields exactly `wlen` events (or an error); trailing bytes beyond the
/// announced window are ignored. Tracks the highest sequence number seen
/// so the caller can acknowledge the block.
pub struct WindowDecoder<'a> {
    buf: &'a [u8],
    remaining: u32,
    max_seq: u32,
}

impl<'a> WindowDecoder<'a> {
    /// Create a decoder over an inflated block expecting `wlen` frames
    pub fn new(block: &'a [u8], wlen: u32) -> Self {
        Self {
            buf: block,
            remaining: wlen,
            max_seq: 0,
        }
    }

    /// Highest sequence number observed so far
    #[inline]
    pub fn max_seq(&self) -> u32 {
        self.max_seq
    }

    /// Decode the next event, or `None` once the window is exhausted
    pub fn next_event(&mut self) -> Result<Option<Event>> {
        if self.remaining == 0 {
            return Ok(None);
        }
        self.remaining -= 1;

        let tag = self.read_bytes(2, "frame tag")?;
        match (tag[0], tag[1]) {
            (VERSION_1 | VERSION_2, FRAME_DATA) => self.decode_data_frame().map(Some),
            (VERSION_1 | VERSION_2, FRAME_JSON) => self.decode_json_frame().map(Some),
            (v, t) => Err(ProtocolError::UnknownFrame(v, t)),
        }
    }

    /// Decode a key/value data frame into an event
    fn decode_data_frame(&mut self) -> Result<Event> {
        let seq = self.read_u32("data frame seq")?;
        let count = self.read_u32("data frame pair count")?;
        self.max_seq = self.max_seq.max(seq);

        let mut fields = Fields::new();
        fields.insert(
            "timestamp".into(),
            Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Nanos, true)),
        );

        for _ in 0..count {
            let klen = self.read_u32("key length")?;
            if klen > MAX_KEY_LEN {
                return Err(ProtocolError::KeyTooLong(klen));
            }
            let key = self.read_bytes(klen as usize, "key")?;

            let vlen = self.read_u32("value length")?;
            if vlen > MAX_VALUE_LEN {
                return Err(ProtocolError::ValueTooLong(vlen));
            }
            let value = self.read_bytes(vlen as usize, "value")?;

            fields.insert(
                String::from_utf8_lossy(key).into_owned(),
                Value::String(String::from_utf8_lossy(value).into_owned()),
            );
        }

        let offset = fields
            .get("offset")
            .and_then(Value::as_str)
            .and_then(|s| s.parse().ok())
            .unwrap_or(0);
        let text = fields
            .get("line")
            .and_then(Value::as_str)
            .map(str::to_string);

        Ok(Event {
            source: lumberjack_source(&fields),
            text,
            offset,
            line: u64::from(seq),
            fields,
            tag: String::new(),
        })
    }

    /// Decode a JSON data frame into an event
    ///
    /// Numeric literals survive at full precision (arbitrary-precision
    /// numbers), matching the deferred-number decoding upstream agents
    /// rely on.
    fn decode_json_frame(&mut self) -> Result<Event> {
        let seq = self.read_u32("JSON frame seq")?;
        let len = self.read_u32("JSON frame length")?;
        self.max_seq = self.max_seq.max(seq);

        let body = self.read_bytes(len as usize, "JSON frame body")?;
        let fields: Fields = serde_json::from_slice(body)?;

        let offset = fields.get("offset").and_then(Value::as_i64).unwrap_or(0);
        let text = fields
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string);

        Ok(Event {
            source: lumberjack_source(&fields),
            text,
            offset,
            line: u64::from(seq),
            fields,
            tag: String::new(),
        })
    }

    #[inline]
    fn read_u32(&mut self, context: &'static str) -> Result<u32> {
        let bytes = self.read_bytes(4, context)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    #[inline]
    fn read_bytes(&mut self, len: usize, context: &'static str) -> Result<&'a [u8]> {
        if self.buf.len() < len {
            return Err(ProtocolError::Truncated(context));
        }
        let (head, tail) = self.buf.split_at(len);
        self.buf = tail;
        Ok(head)
    }
}

/// Build the `lumberjack://<host><file>` origin identifier
fn lumberjack_source(fields: &Fields) -> String {
    let host = fields.get("host").and_then(Value::as_str).unwrap_or("");
    let file = fields.get("file").and_then(Value::as_str).unwrap_or("");
    format!("lumberjack://{host}{file}")
}
