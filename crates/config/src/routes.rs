//! Route configuration sections

use std::collections::HashMap;

use serde::Deserialize;

/// One named route binding an input to an output
///
/// ```toml
/// [[routes]]
/// name = "beats-to-search"
/// input = "beats"
/// output = "search"
/// sample_size = 100
/// [routes.rules]
/// type = "access"
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RouteConfig {
    /// Unique route name
    pub name: String,

    /// Name of the input whose buffer feeds this route
    pub input: String,

    /// Name of the output this route feeds
    pub output: String,

    /// Field values an event must match for the output to accept it
    #[serde(default)]
    pub rules: HashMap<String, String>,

    /// Percent sample gate; falls back to the output's own value, then 100
    #[serde(default)]
    pub sample_size: Option<u8>,
}
