//! Cross-section configuration validation
//!
//! Everything here is fatal at startup: a config that parses but fails
//! validation never reaches the server.

use std::collections::HashSet;

use crate::{Config, ConfigError, InputKind, OutputKind, Result};

/// Validate a parsed configuration
pub fn validate(config: &Config) -> Result<()> {
    check_unique_names(config)?;
    check_routes(config)?;
    check_inputs(config)?;
    check_outputs(config)?;
    Ok(())
}

fn check_unique_names(config: &Config) -> Result<()> {
    let mut seen = HashSet::new();
    for input in &config.inputs {
        if !seen.insert(input.name.as_str()) {
            return Err(ConfigError::duplicate("input", &input.name));
        }
    }

    seen.clear();
    for output in &config.outputs {
        if !seen.insert(output.name.as_str()) {
            return Err(ConfigError::duplicate("output", &output.name));
        }
    }

    seen.clear();
    for route in &config.routes {
        if !seen.insert(route.name.as_str()) {
            return Err(ConfigError::duplicate("route", &route.name));
        }
    }
    Ok(())
}

fn check_routes(config: &Config) -> Result<()> {
    let mut used_outputs = HashSet::new();

    for route in &config.routes {
        if config.input(&route.input).is_none() {
            return Err(ConfigError::UnknownInput {
                route: route.name.clone(),
                input: route.input.clone(),
            });
        }
        if config.output(&route.output).is_none() {
            return Err(ConfigError::UnknownOutput {
                route: route.name.clone(),
                output: route.output.clone(),
            });
        }
        // Every output is attached to at most one route
        if !used_outputs.insert(route.output.as_str()) {
            return Err(ConfigError::OutputReused {
                output: route.output.clone(),
            });
        }
        if let Some(size) = route.sample_size {
            if size > 100 {
                return Err(ConfigError::invalid_value(
                    "route",
                    &route.name,
                    "sample_size",
                    "must be between 0 and 100",
                ));
            }
        }
    }
    Ok(())
}

fn check_inputs(config: &Config) -> Result<()> {
    for input in &config.inputs {
        match &input.kind {
            InputKind::Filebeat(fb) => {
                if fb.host.is_empty() {
                    return Err(ConfigError::missing_field("input", &input.name, "host"));
                }
                // TLS needs both halves of the keypair
                if fb.ssl_crt.is_empty() != fb.ssl_key.is_empty() {
                    return Err(ConfigError::invalid_value(
                        "input",
                        &input.name,
                        "ssl_crt",
                        "ssl_crt and ssl_key must be set together",
                    ));
                }
            }
            InputKind::Redis(r) => {
                if r.host.is_empty() {
                    return Err(ConfigError::missing_field("input", &input.name, "host"));
                }
                if r.input_queue.is_empty() {
                    return Err(ConfigError::missing_field(
                        "input",
                        &input.name,
                        "input_queue",
                    ));
                }
            }
            InputKind::Stdin(_) => {}
        }
        check_sample_size("input", &input.name, sample_size_of_input(&input.kind))?;
    }
    Ok(())
}

fn check_outputs(config: &Config) -> Result<()> {
    for output in &config.outputs {
        match &output.kind {
            OutputKind::Elasticsearch(es) => {
                if es.hosts.is_empty() {
                    return Err(ConfigError::missing_field("output", &output.name, "hosts"));
                }
            }
            OutputKind::Redis(r) => {
                if r.host.is_empty() {
                    return Err(ConfigError::missing_field("output", &output.name, "host"));
                }
                if r.keys.is_empty() {
                    return Err(ConfigError::missing_field("output", &output.name, "keys"));
                }
            }
            OutputKind::S3(s3) => {
                if s3.endpoint.is_empty() {
                    return Err(ConfigError::missing_field(
                        "output",
                        &output.name,
                        "endpoint",
                    ));
                }
                if s3.bucket.is_empty() {
                    return Err(ConfigError::missing_field("output", &output.name, "bucket"));
                }
            }
            OutputKind::Tcp(tcp) => {
                if tcp.host.is_empty() {
                    return Err(ConfigError::missing_field("output", &output.name, "host"));
                }
            }
            OutputKind::Websocket(ws) => {
                if ws.host.is_empty() {
                    return Err(ConfigError::missing_field("output", &output.name, "host"));
                }
            }
        }
        check_sample_size("output", &output.name, output.sample_size())?;
    }
    Ok(())
}

fn sample_size_of_input(kind: &InputKind) -> Option<u8> {
    match kind {
        InputKind::Filebeat(fb) => fb.sample_size,
        InputKind::Redis(r) => r.sample_size,
        InputKind::Stdin(_) => None,
    }
}

fn check_sample_size(component: &'static str, name: &str, size: Option<u8>) -> Result<()> {
    if let Some(size) = size {
        if size > 100 {
            return Err(ConfigError::invalid_value(
                component,
                name,
                "sample_size",
                "must be between 0 and 100",
            ));
        }
    }
    Ok(())
}
