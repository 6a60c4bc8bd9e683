//! The in-flight log record
//!
//! `Event` is created by an input, broadcast through a buffer, and consumed
//! by outputs. Field values are dynamic (`serde_json::Value`) so structured
//! sources keep their types and JSON numeric literals lose no precision.

use serde::Serialize;
use serde_json::Value;

/// Dynamic field mapping carried by every structured event
pub type Fields = serde_json::Map<String, Value>;

/// A single log record flowing through the pipeline
///
/// `source` identifies the origin (`lumberjack://<host><file>` for
/// Lumberjack events). `text` is the raw log line when the source carries
/// one; outputs that need a string payload fall back to the serialized
/// fields via [`Event::text_or_json`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct Event {
    /// Origin identifier
    #[serde(skip_serializing_if = "String::is_empty")]
    pub source: String,

    /// Raw log line, if the source carries one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    /// Decoded structured fields (may be empty for raw-text sources)
    pub fields: Fields,

    /// Tag assigned by downstream processing, empty otherwise
    #[serde(skip_serializing_if = "String::is_empty")]
    pub tag: String,

    /// Byte offset reported by the upstream agent
    #[serde(skip_serializing_if = "is_zero_i64")]
    pub offset: i64,

    /// Sequence number within the upstream window
    #[serde(skip_serializing_if = "is_zero_u64")]
    pub line: u64,
}

fn is_zero_i64(v: &i64) -> bool {
    *v == 0
}

fn is_zero_u64(v: &u64) -> bool {
    *v == 0
}

impl Event {
    /// Create an event carrying only a raw text line
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }

    /// Get a field as a string slice, if present and a string
    #[inline]
    pub fn field_str(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }

    /// Resolve a string payload for this event
    ///
    /// Returns the raw text when present, otherwise the fields serialized
    /// as JSON. `None` means the event has neither and the caller should
    /// drop it.
    pub fn text_or_json(&self) -> Option<String> {
        if let Some(ref text) = self.text {
            return Some(text.clone());
        }
        if self.fields.is_empty() {
            return None;
        }
        serde_json::to_string(&self.fields).ok()
    }
}
