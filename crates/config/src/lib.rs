//! Logship Configuration
//!
//! TOML-based configuration loading with validation. Inputs, outputs, and
//! routes are arrays of tables so declaration order is preserved and the
//! same type can appear several times under different names.
//!
//! # Example
//!
//! ```toml
//! [[inputs]]
//! name = "beats"
//! type = "filebeat"
//! host = "0.0.0.0:5044"
//! ssl_crt = "server.crt"
//! ssl_key = "server.key"
//!
//! [[outputs]]
//! name = "raw"
//! type = "tcp"
//! host = "127.0.0.1:6000"
//!
//! [[routes]]
//! name = "beats-to-raw"
//! input = "beats"
//! output = "raw"
//! [routes.rules]
//! type = "access"
//! ```

mod error;
mod global;
mod inputs;
mod logging;
mod outputs;
mod routes;
mod validation;

use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde::Deserialize;

pub use error::{ConfigError, Result};
pub use global::GlobalConfig;
pub use inputs::{FilebeatConfig, InputConfig, InputKind, RedisInputConfig, StdinConfig};
pub use logging::{LogConfig, LogFormat, LogLevel};
pub use outputs::{
    ElasticsearchConfig, OutputConfig, OutputKind, RedisOutputConfig, S3Config, TcpConfig,
    WebsocketConfig,
};
pub use routes::RouteConfig;

/// Main configuration structure
///
/// All sections are optional; an empty document is valid (and does
/// nothing).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Logging configuration
    pub log: LogConfig,

    /// Process-wide tunables
    pub global: GlobalConfig,

    /// Event inputs, in declaration order
    pub inputs: Vec<InputConfig>,

    /// Event outputs, in declaration order
    pub outputs: Vec<OutputConfig>,

    /// Routes binding inputs to outputs
    pub routes: Vec<RouteConfig>,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::from_str(&contents)
    }

    /// Look up an input by name
    pub fn input(&self, name: &str) -> Option<&InputConfig> {
        self.inputs.iter().find(|i| i.name == name)
    }

    /// Look up an output by name
    pub fn output(&self, name: &str) -> Option<&OutputConfig> {
        self.outputs.iter().find(|o| o.name == name)
    }

    /// Find the route feeding the named output, if any
    pub fn route_for_output(&self, output: &str) -> Option<&RouteConfig> {
        self.routes.iter().find(|r| r.output == output)
    }
}

impl FromStr for Config {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        let config: Config = toml::from_str(s)?;
        validation::validate(&config)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_is_valid() {
        let config = Config::from_str("").unwrap();
        assert!(config.inputs.is_empty());
        assert!(config.outputs.is_empty());
        assert!(config.routes.is_empty());
        assert_eq!(config.global.queue_size, 100);
    }

    #[test]
    fn test_full_config_parse() {
        let toml = r#"
[log]
level = "debug"
format = "json"

[global]
queue_size = 200
shutdown_timeout_secs = 10

[[inputs]]
name = "beats"
type = "filebeat"
host = "0.0.0.0:5044"
ssl_crt = "server.crt"
ssl_key = "server.key"

[[inputs]]
name = "console"
type = "stdin"
json_decode = true

[[inputs]]
name = "queue"
type = "redis"
host = "127.0.0.1"
port = 6380
input_queue = "logs"

[[outputs]]
name = "search"
type = "elasticsearch"
hosts = ["http://127.0.0.1:9200"]

[[outputs]]
name = "raw"
type = "tcp"
host = "127.0.0.1:6000"

[[routes]]
name = "beats-to-search"
input = "beats"
output = "search"
sample_size = 50
[routes.rules]
type = "access"

[[routes]]
name = "console-to-raw"
input = "console"
output = "raw"
"#;
        let config = Config::from_str(toml).unwrap();

        assert_eq!(config.log.level, LogLevel::Debug);
        assert_eq!(config.log.format, LogFormat::Json);
        assert_eq!(config.global.queue_size, 200);
        assert_eq!(config.inputs.len(), 3);
        assert_eq!(config.outputs.len(), 2);
        assert_eq!(config.routes.len(), 2);

        match &config.input("beats").unwrap().kind {
            InputKind::Filebeat(fb) => {
                assert_eq!(fb.host, "0.0.0.0:5044");
                assert_eq!(fb.ssl_crt, "server.crt");
            }
            other => panic!("expected filebeat, got {other:?}"),
        }
        match &config.input("queue").unwrap().kind {
            InputKind::Redis(r) => {
                assert_eq!(r.port, 6380);
                assert_eq!(r.input_queue, "logs");
                assert!(!r.json_decode);
            }
            other => panic!("expected redis, got {other:?}"),
        }

        let route = config.route_for_output("search").unwrap();
        assert_eq!(route.input, "beats");
        assert_eq!(route.sample_size, Some(50));
        assert_eq!(route.rules.get("type").map(String::as_str), Some("access"));

        assert!(config.route_for_output("nope").is_none());
    }

    #[test]
    fn test_duplicate_type_under_distinct_names() {
        let toml = r#"
[[outputs]]
name = "raw-a"
type = "tcp"
host = "127.0.0.1:6000"

[[outputs]]
name = "raw-b"
type = "tcp"
host = "127.0.0.1:6001"
"#;
        let config = Config::from_str(toml).unwrap();
        assert_eq!(config.outputs.len(), 2);
        assert_eq!(config.outputs[0].name, "raw-a");
        assert_eq!(config.outputs[1].name, "raw-b");
    }

    #[test]
    fn test_invalid_toml_is_rejected() {
        assert!(Config::from_str("inputs = {{ nope").is_err());
    }

    #[test]
    fn test_unknown_input_type_is_rejected() {
        let toml = r#"
[[inputs]]
name = "x"
type = "carrier-pigeon"
"#;
        assert!(matches!(
            Config::from_str(toml),
            Err(ConfigError::Parse(_))
        ));
    }
}
