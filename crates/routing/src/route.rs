//! Route binding and field matching

use std::collections::HashMap;

use logship_protocol::Event;

use crate::SampleGate;

/// A named binding from an input buffer to one output
///
/// Compiled once from configuration; every output is attached to at most
/// one route. Outputs without a matching route run in a logged no-op mode.
#[derive(Debug, Clone)]
pub struct Route {
    /// Route name, unique across the config
    pub name: String,

    /// Name of the input buffer this route draws from
    pub input: String,

    /// Name of the output this route feeds
    pub output: String,

    /// Field values an event must match, all of them
    pub fields: HashMap<String, String>,

    /// Percent sample gate applied after the field filter
    pub sample: SampleGate,
}

impl Route {
    /// Create a route that forwards everything from `input` to `output`
    pub fn new(
        name: impl Into<String>,
        input: impl Into<String>,
        output: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            input: input.into(),
            output: output.into(),
            fields: HashMap::new(),
            sample: SampleGate::default(),
        }
    }

    /// Attach field-match rules
    pub fn with_fields(mut self, fields: HashMap<String, String>) -> Self {
        self.fields = fields;
        self
    }

    /// Attach a sample percentage
    pub fn with_sample(mut self, percent: u8) -> Self {
        self.sample = SampleGate::new(percent);
        self
    }

    /// Apply the field filter
    ///
    /// Every `(key, value)` rule requires `event.fields[key]` to be a
    /// string equal to `value`. A missing key or a non-string value
    /// disqualifies the event. No rules means everything matches.
    pub fn matches(&self, event: &Event) -> bool {
        self.fields
            .iter()
            .all(|(key, value)| event.field_str(key) == Some(value.as_str()))
    }

    /// Apply both policy checks: field filter, then sample gate
    #[inline]
    pub fn accepts(&self, event: &Event) -> bool {
        self.matches(event) && self.sample.accept()
    }
}
