//! Configuration error types

use std::io;

use thiserror::Error;

/// Result type for configuration operations
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors raised while loading or validating configuration
///
/// All of these are fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file
    #[error("failed to read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    /// Failed to parse TOML
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Two components of the same kind share a name
    #[error("duplicate {component} name '{name}'")]
    DuplicateName {
        component: &'static str,
        name: String,
    },

    /// A route references an input that is not configured
    #[error("route '{route}' references unknown input '{input}'")]
    UnknownInput { route: String, input: String },

    /// A route references an output that is not configured
    #[error("route '{route}' references unknown output '{output}'")]
    UnknownOutput { route: String, output: String },

    /// More than one route feeds the same output
    #[error("output '{output}' is attached to more than one route")]
    OutputReused { output: String },

    /// A required field is missing
    #[error("{component} '{name}' is missing required field '{field}'")]
    MissingField {
        component: &'static str,
        name: String,
        field: &'static str,
    },

    /// A field holds an invalid value
    #[error("{component} '{name}' has invalid {field}: {message}")]
    InvalidValue {
        component: &'static str,
        name: String,
        field: &'static str,
        message: String,
    },
}

impl ConfigError {
    /// Create a DuplicateName error
    pub fn duplicate(component: &'static str, name: impl Into<String>) -> Self {
        Self::DuplicateName {
            component,
            name: name.into(),
        }
    }

    /// Create a MissingField error
    pub fn missing_field(
        component: &'static str,
        name: impl Into<String>,
        field: &'static str,
    ) -> Self {
        Self::MissingField {
            component,
            name: name.into(),
            field,
        }
    }

    /// Create an InvalidValue error
    pub fn invalid_value(
        component: &'static str,
        name: impl Into<String>,
        field: &'static str,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidValue {
            component,
            name: name.into(),
            field,
            message: message.into(),
        }
    }
}
