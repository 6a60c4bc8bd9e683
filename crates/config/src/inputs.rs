//! Input configuration sections

use serde::Deserialize;

/// One named input
#[derive(Debug, Clone, Deserialize)]
pub struct InputConfig {
    /// Unique input name; routes reference it and its buffer carries it
    pub name: String,

    /// Type-specific options, discriminated by the `type` key
    #[serde(flatten)]
    pub kind: InputKind,
}

/// Recognised input types
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum InputKind {
    /// Lumberjack server for filebeat-style agents
    Filebeat(FilebeatConfig),
    /// Broker queue consumer
    Redis(RedisInputConfig),
    /// Line reader on standard input
    Stdin(StdinConfig),
}

impl InputKind {
    /// The type name as written in configuration
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Filebeat(_) => "filebeat",
            Self::Redis(_) => "redis",
            Self::Stdin(_) => "stdin",
        }
    }
}

/// Lumberjack listener options
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FilebeatConfig {
    /// Listen address, `<addr:port>`
    pub host: String,

    /// PEM certificate path; empty together with `ssl_key` means a
    /// plaintext listener
    #[serde(default)]
    pub ssl_crt: String,

    /// PEM private key path
    #[serde(default)]
    pub ssl_key: String,

    /// Reserved; sampling happens on outputs
    #[serde(default)]
    pub sample_size: Option<u8>,
}

/// Broker consumer options
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RedisInputConfig {
    /// Broker host
    pub host: String,

    /// Broker port
    #[serde(default = "default_redis_port")]
    pub port: u16,

    /// Database index
    #[serde(default)]
    pub db: i64,

    /// Password, empty for none
    #[serde(default)]
    pub password: String,

    /// List key to consume from
    pub input_queue: String,

    /// Decode each payload as a JSON object into the event fields
    #[serde(default)]
    pub json_decode: bool,

    /// Reserved; sampling happens on outputs
    #[serde(default)]
    pub sample_size: Option<u8>,
}

/// Standard input options
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StdinConfig {
    /// Decode each line as a JSON object into the event fields
    #[serde(default)]
    pub json_decode: bool,
}

fn default_redis_port() -> u16 {
    6379
}
