//! Component registry
//!
//! Maps input/output type names to constructor closures. The registry is
//! an explicit object handed to the server - there is no ambient global
//! state, and plugins extend the pipeline by registering a factory before
//! the server starts.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use logship_buffer::EventSender;
use logship_config::{InputKind, OutputKind};
use logship_inputs as inputs;
use logship_outputs as outputs;
use logship_outputs::Binding;
use tokio_util::sync::CancellationToken;

use crate::server::ServerError;

/// Error type components surface from their run loops
pub type ComponentError = Box<dyn std::error::Error + Send + Sync>;

/// A running component, boxed for the registry
pub type ComponentTask =
    Pin<Box<dyn Future<Output = Result<(), ComponentError>> + Send + 'static>>;

/// Everything an input factory needs to build its component
pub struct InputSpec<'a> {
    /// Configured input name
    pub name: &'a str,

    /// Type-specific options from configuration
    pub kind: &'a InputKind,

    /// Sender for the input's buffer queue
    pub events: EventSender,

    /// Cooperative stop signal
    pub cancel: CancellationToken,
}

/// Everything an output factory needs to build its component
pub struct OutputSpec<'a> {
    /// Configured output name
    pub name: &'a str,

    /// Type-specific options from configuration
    pub kind: &'a OutputKind,

    /// Buffer and route, or `None` for an unrouted output
    pub binding: Option<Binding>,

    /// Cooperative stop signal
    pub cancel: CancellationToken,
}

type InputFactory = Box<dyn Fn(InputSpec<'_>) -> Result<ComponentTask, ServerError> + Send + Sync>;
type OutputFactory =
    Box<dyn Fn(OutputSpec<'_>) -> Result<ComponentTask, ServerError> + Send + Sync>;

/// Registry of input and output constructors
pub struct Registry {
    inputs: HashMap<&'static str, InputFactory>,
    outputs: HashMap<&'static str, OutputFactory>,
}

impl Registry {
    /// An empty registry
    pub fn new() -> Self {
        Self {
            inputs: HashMap::new(),
            outputs: HashMap::new(),
        }
    }

    /// A registry with every built-in input and output type
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register_builtin_inputs();
        registry.register_builtin_outputs();
        registry
    }

    /// Register an input constructor under its type name
    pub fn register_input(
        &mut self,
        type_name: &'static str,
        factory: impl Fn(InputSpec<'_>) -> Result<ComponentTask, ServerError> + Send + Sync + 'static,
    ) {
        self.inputs.insert(type_name, Box::new(factory));
    }

    /// Register an output constructor under its type name
    pub fn register_output(
        &mut self,
        type_name: &'static str,
        factory: impl Fn(OutputSpec<'_>) -> Result<ComponentTask, ServerError> + Send + Sync + 'static,
    ) {
        self.outputs.insert(type_name, Box::new(factory));
    }

    /// Build a running input for the given spec
    pub(crate) fn build_input(&self, spec: InputSpec<'_>) -> Result<ComponentTask, ServerError> {
        let type_name = spec.kind.type_name();
        let factory = self
            .inputs
            .get(type_name)
            .ok_or_else(|| ServerError::UnknownType {
                component: "input",
                name: spec.name.to_string(),
                type_name: type_name.to_string(),
            })?;
        factory(spec)
    }

    /// Build a running output for the given spec
    pub(crate) fn build_output(&self, spec: OutputSpec<'_>) -> Result<ComponentTask, ServerError> {
        let type_name = spec.kind.type_name();
        let factory = self
            .outputs
            .get(type_name)
            .ok_or_else(|| ServerError::UnknownType {
                component: "output",
                name: spec.name.to_string(),
                type_name: type_name.to_string(),
            })?;
        factory(spec)
    }

    fn register_builtin_inputs(&mut self) {
        self.register_input("filebeat", |spec| {
            let InputKind::Filebeat(config) = spec.kind else {
                return Err(ServerError::type_mismatch("input", spec.name));
            };
            let input = inputs::FilebeatInput::new(
                spec.name,
                inputs::FilebeatConfig {
                    host: config.host.clone(),
                    ssl_crt: config.ssl_crt.clone(),
                    ssl_key: config.ssl_key.clone(),
                    sample_size: config.sample_size,
                },
                spec.events,
            );
            let cancel = spec.cancel;
            Ok(Box::pin(async move {
                input.run(cancel).await.map_err(ComponentError::from)
            }))
        });

        self.register_input("stdin", |spec| {
            let InputKind::Stdin(config) = spec.kind else {
                return Err(ServerError::type_mismatch("input", spec.name));
            };
            let input = inputs::StdinInput::new(
                spec.name,
                inputs::StdinConfig {
                    json_decode: config.json_decode,
                },
                spec.events,
            );
            let cancel = spec.cancel;
            Ok(Box::pin(async move {
                input.run(cancel).await.map_err(ComponentError::from)
            }))
        });

        self.register_input("redis", |spec| {
            let InputKind::Redis(config) = spec.kind else {
                return Err(ServerError::type_mismatch("input", spec.name));
            };
            let input = inputs::RedisInput::new(
                spec.name,
                inputs::RedisInputConfig {
                    host: config.host.clone(),
                    port: config.port,
                    db: config.db,
                    password: config.password.clone(),
                    input_queue: config.input_queue.clone(),
                    json_decode: config.json_decode,
                },
                spec.events,
            );
            let cancel = spec.cancel;
            Ok(Box::pin(async move {
                input.run(cancel).await.map_err(ComponentError::from)
            }))
        });
    }

    fn register_builtin_outputs(&mut self) {
        self.register_output("tcp", |spec| {
            let OutputKind::Tcp(config) = spec.kind else {
                return Err(ServerError::type_mismatch("output", spec.name));
            };
            let output = outputs::TcpOutput::new(
                spec.name,
                outputs::TcpConfig {
                    host: config.host.clone(),
                },
                spec.binding,
            );
            let cancel = spec.cancel;
            Ok(Box::pin(async move {
                output.run(cancel).await.map_err(ComponentError::from)
            }))
        });

        self.register_output("websocket", |spec| {
            let OutputKind::Websocket(config) = spec.kind else {
                return Err(ServerError::type_mismatch("output", spec.name));
            };
            let output = outputs::WebsocketOutput::new(
                spec.name,
                outputs::WebsocketConfig {
                    host: config.host.clone(),
                },
                spec.binding,
            );
            let cancel = spec.cancel;
            Ok(Box::pin(async move {
                output.run(cancel).await.map_err(ComponentError::from)
            }))
        });

        self.register_output("elasticsearch", |spec| {
            let OutputKind::Elasticsearch(config) = spec.kind else {
                return Err(ServerError::type_mismatch("output", spec.name));
            };
            let output = outputs::ElasticsearchOutput::new(
                spec.name,
                outputs::ElasticsearchConfig {
                    hosts: config.hosts.clone(),
                    index_prefix: config.index_prefix.clone(),
                    flush_interval: Duration::from_secs(config.flush_interval_secs),
                },
                spec.binding,
            );
            let cancel = spec.cancel;
            Ok(Box::pin(async move {
                output.run(cancel).await.map_err(ComponentError::from)
            }))
        });

        self.register_output("s3", |spec| {
            let OutputKind::S3(config) = spec.kind else {
                return Err(ServerError::type_mismatch("output", spec.name));
            };
            let output = outputs::S3Output::new(
                spec.name,
                outputs::S3Config {
                    endpoint: config.endpoint.clone(),
                    bucket: config.bucket.clone(),
                    prefix: config.prefix.clone(),
                    flush_interval: Duration::from_secs(config.flush_interval_secs),
                },
                spec.binding,
            );
            let cancel = spec.cancel;
            Ok(Box::pin(async move {
                output.run(cancel).await.map_err(ComponentError::from)
            }))
        });

        self.register_output("redis", |spec| {
            let OutputKind::Redis(config) = spec.kind else {
                return Err(ServerError::type_mismatch("output", spec.name));
            };
            let output = outputs::RedisOutput::new(
                spec.name,
                outputs::RedisOutputConfig {
                    host: config.host.clone(),
                    port: config.port,
                    db: config.db,
                    password: config.password.clone(),
                    keys: config.keys.clone(),
                    flush_interval: Duration::from_secs(config.flush_interval_secs),
                },
                spec.binding,
            );
            let cancel = spec.cancel;
            Ok(Box::pin(async move {
                output.run(cancel).await.map_err(ComponentError::from)
            }))
        });
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("inputs", &self.inputs.keys().collect::<Vec<_>>())
            .field("outputs", &self.outputs.keys().collect::<Vec<_>>())
            .finish()
    }
}
