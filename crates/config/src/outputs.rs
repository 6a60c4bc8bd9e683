//! Output configuration sections

use serde::Deserialize;

/// One named output
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Unique output name; at most one route may reference it
    pub name: String,

    /// Type-specific options, discriminated by the `type` key
    #[serde(flatten)]
    pub kind: OutputKind,
}

impl OutputConfig {
    /// The output's own sample percentage, if it carries one
    ///
    /// The route's `sample_size` takes precedence; this is the fallback.
    pub fn sample_size(&self) -> Option<u8> {
        match &self.kind {
            OutputKind::Elasticsearch(c) => c.sample_size,
            OutputKind::Redis(c) => c.sample_size,
            OutputKind::S3(c) => c.sample_size,
            OutputKind::Tcp(c) => c.sample_size,
            OutputKind::Websocket(c) => c.sample_size,
        }
    }
}

/// Recognised output types
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OutputKind {
    /// Search-cluster bulk indexer
    Elasticsearch(ElasticsearchConfig),
    /// Broker queue producer
    Redis(RedisOutputConfig),
    /// Object-storage gzip batcher
    S3(S3Config),
    /// Line-push TCP server
    Tcp(TcpConfig),
    /// WebSocket broadcaster
    Websocket(WebsocketConfig),
}

impl OutputKind {
    /// The type name as written in configuration
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Elasticsearch(_) => "elasticsearch",
            Self::Redis(_) => "redis",
            Self::S3(_) => "s3",
            Self::Tcp(_) => "tcp",
            Self::Websocket(_) => "websocket",
        }
    }
}

/// Search-cluster bulk indexer options
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ElasticsearchConfig {
    /// Cluster base URLs, e.g. `http://127.0.0.1:9200`
    pub hosts: Vec<String>,

    /// Index name prefix; the UTC date is appended per day
    #[serde(default = "default_index_prefix")]
    pub index_prefix: String,

    /// Flush interval for partial batches, in seconds
    #[serde(default = "default_flush_interval")]
    pub flush_interval_secs: u64,

    /// Percent sample gate, route value wins
    #[serde(default)]
    pub sample_size: Option<u8>,
}

/// Broker producer options
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RedisOutputConfig {
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

    /// List keys each payload is pushed to
    pub keys: Vec<String>,

    /// Flush interval for partial batches, in seconds
    #[serde(default = "default_flush_interval")]
    pub flush_interval_secs: u64,

    /// Percent sample gate, route value wins
    #[serde(default)]
    pub sample_size: Option<u8>,
}

/// Object-storage batcher options
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct S3Config {
    /// S3-compatible endpoint, e.g. `http://127.0.0.1:9000`
    pub endpoint: String,

    /// Bucket name
    pub bucket: String,

    /// Key prefix for uploaded objects
    #[serde(default)]
    pub prefix: String,

    /// Flush interval between uploads, in seconds
    #[serde(default = "default_flush_interval")]
    pub flush_interval_secs: u64,

    /// Percent sample gate, route value wins
    #[serde(default)]
    pub sample_size: Option<u8>,
}

/// Line-push TCP server options
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TcpConfig {
    /// Listen address, `<addr:port>`
    pub host: String,

    /// Percent sample gate, route value wins
    #[serde(default)]
    pub sample_size: Option<u8>,
}

/// WebSocket broadcaster options
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WebsocketConfig {
    /// Listen address, `<addr:port>`
    pub host: String,

    /// Percent sample gate, route value wins
    #[serde(default)]
    pub sample_size: Option<u8>,
}

fn default_redis_port() -> u16 {
    6379
}

fn default_index_prefix() -> String {
    "logship".into()
}

fn default_flush_interval() -> u64 {
    5
}
