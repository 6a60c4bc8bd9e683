//! Server lifecycle
//!
//! Instantiates buffers, inputs, and outputs from configuration, runs
//! them, and stops them in order on a termination signal: inputs first
//! (cutting off new events), then outputs (draining their subscriber
//! channels), then buffers.

use std::collections::HashMap;
use std::time::Duration;

use logship_buffer::{Buffer, BufferHandle};
use logship_config::{Config, ConfigError, OutputConfig, RouteConfig};
use logship_outputs::Binding;
use logship_routing::Route;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::registry::{ComponentTask, InputSpec, OutputSpec, Registry};

/// Errors raised while assembling or running the server
#[derive(Debug, Error)]
pub enum ServerError {
    /// Configuration failed to load or validate
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A component names a type the registry does not know
    #[error("{component} '{name}' has unknown type '{type_name}'")]
    UnknownType {
        component: &'static str,
        name: String,
        type_name: String,
    },

    /// A factory was invoked with the wrong config variant
    #[error("{component} '{name}' dispatched to the wrong factory")]
    TypeMismatch {
        component: &'static str,
        name: String,
    },

    /// A component died with a fatal error
    #[error("{kind} '{name}' failed: {message}")]
    Component {
        kind: &'static str,
        name: String,
        message: String,
    },
}

impl ServerError {
    pub(crate) fn type_mismatch(component: &'static str, name: &str) -> Self {
        Self::TypeMismatch {
            component,
            name: name.to_string(),
        }
    }
}

/// A component failure reported by a running task
struct Failure {
    kind: &'static str,
    name: String,
    message: String,
}

/// Top-level wiring: configuration plus a registry of constructors
pub struct Server {
    config: Config,
    registry: Registry,
}

/// A started server; stop it with [`RunningServer::shutdown`] or let
/// [`RunningServer::run_until_signal`] drive it
pub struct RunningServer {
    buffer_tasks: Vec<JoinHandle<()>>,
    input_tasks: Vec<(String, JoinHandle<()>)>,
    output_tasks: Vec<(String, JoinHandle<()>)>,
    inputs_cancel: CancellationToken,
    outputs_cancel: CancellationToken,
    buffers_cancel: CancellationToken,
    failures: mpsc::Receiver<Failure>,
    shutdown_timeout: Duration,
}

impl Server {
    /// Create a server from validated configuration and a registry
    pub fn new(config: Config, registry: Registry) -> Self {
        Self { config, registry }
    }

    /// Instantiate and start everything
    ///
    /// Buffers come up first (one per distinct route input), then inputs,
    /// then outputs. Inputs that no route references are skipped with a
    /// warning - they would have nowhere to send.
    pub async fn start(self) -> Result<RunningServer, ServerError> {
        let queue_size = self.config.global.queue_size;
        let shutdown_timeout = Duration::from_secs(self.config.global.shutdown_timeout_secs);

        let inputs_cancel = CancellationToken::new();
        let outputs_cancel = CancellationToken::new();
        let buffers_cancel = CancellationToken::new();
        let (failure_tx, failures) = mpsc::channel(16);

        // One buffer per distinct route input name
        let mut buffers: HashMap<String, BufferHandle> = HashMap::new();
        let mut buffer_tasks = Vec::new();
        for route in &self.config.routes {
            if buffers.contains_key(&route.input) {
                continue;
            }
            let (buffer, handle) = Buffer::with_capacity(&route.input, queue_size);
            info!(buffer = %route.input, "starting buffer");
            buffer_tasks.push(tokio::spawn(buffer.run(buffers_cancel.clone())));
            buffers.insert(route.input.clone(), handle);
        }

        // Inputs
        let mut input_tasks = Vec::new();
        for input in &self.config.inputs {
            let Some(handle) = buffers.get(&input.name) else {
                warn!(input = %input.name, "no route references this input, skipping");
                continue;
            };
            let task = self.registry.build_input(InputSpec {
                name: &input.name,
                kind: &input.kind,
                events: handle.sender(),
                cancel: inputs_cancel.clone(),
            })?;
            info!(input = %input.name, kind = input.kind.type_name(), "starting input");
            input_tasks.push((
                input.name.clone(),
                spawn_component("input", &input.name, task, failure_tx.clone()),
            ));
        }

        // Outputs, each bound to the route that selected it (if any)
        let mut output_tasks = Vec::new();
        for output in &self.config.outputs {
            let binding = self
                .config
                .route_for_output(&output.name)
                .map(|route_cfg| {
                    let handle = buffers
                        .get(&route_cfg.input)
                        .expect("validated route input has a buffer");
                    Binding::new(handle.clone(), build_route(route_cfg, output))
                        .with_queue_size(queue_size)
                });
            let task = self.registry.build_output(OutputSpec {
                name: &output.name,
                kind: &output.kind,
                binding,
                cancel: outputs_cancel.clone(),
            })?;
            info!(
                output = %output.name,
                kind = output.kind.type_name(),
                routed = self.config.route_for_output(&output.name).is_some(),
                "starting output"
            );
            output_tasks.push((
                output.name.clone(),
                spawn_component("output", &output.name, task, failure_tx.clone()),
            ));
        }

        info!(
            buffers = buffer_tasks.len(),
            inputs = input_tasks.len(),
            outputs = output_tasks.len(),
            "server running"
        );

        Ok(RunningServer {
            buffer_tasks,
            input_tasks,
            output_tasks,
            inputs_cancel,
            outputs_cancel,
            buffers_cancel,
            failures,
            shutdown_timeout,
        })
    }
}

impl RunningServer {
    /// Run until a termination signal or a fatal component failure, then
    /// stop in order
    pub async fn run_until_signal(mut self) -> Result<(), ServerError> {
        let result = tokio::select! {
            _ = wait_for_signal() => {
                info!("termination signal received");
                Ok(())
            }
            failure = self.failures.recv() => match failure {
                Some(f) => {
                    error!(kind = f.kind, name = %f.name, error = %f.message, "component failed");
                    Err(ServerError::Component {
                        kind: f.kind,
                        name: f.name,
                        message: f.message,
                    })
                }
                None => Ok(()),
            },
        };

        self.shutdown().await;
        result
    }

    /// Ordered stop: inputs, then outputs, then buffers
    ///
    /// Each join is bounded by the configured shutdown timeout and logged
    /// on failure; events still queued in buffers are dropped.
    pub async fn shutdown(self) {
        info!("stopping server");

        info!("stopping inputs");
        self.inputs_cancel.cancel();
        join_all("input", self.input_tasks, self.shutdown_timeout).await;

        info!("stopping outputs");
        self.outputs_cancel.cancel();
        join_all("output", self.output_tasks, self.shutdown_timeout).await;

        info!("stopping buffers");
        self.buffers_cancel.cancel();
        for task in self.buffer_tasks {
            if tokio::time::timeout(self.shutdown_timeout, task)
                .await
                .is_err()
            {
                warn!("buffer did not stop within timeout");
            }
        }

        info!("server stopped");
    }
}

/// Spawn a component task, reporting a fatal error to the failure channel
fn spawn_component(
    kind: &'static str,
    name: &str,
    task: ComponentTask,
    failures: mpsc::Sender<Failure>,
) -> JoinHandle<()> {
    let name = name.to_string();
    tokio::spawn(async move {
        if let Err(e) = task.await {
            let _ = failures
                .send(Failure {
                    kind,
                    name,
                    message: e.to_string(),
                })
                .await;
        }
    })
}

/// Join a set of named component tasks, logging stragglers and panics
async fn join_all(kind: &str, tasks: Vec<(String, JoinHandle<()>)>, limit: Duration) {
    for (name, task) in tasks {
        match tokio::time::timeout(limit, task).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(kind = %kind, name = %name, error = %e, "task panicked during shutdown"),
            Err(_) => warn!(kind = %kind, name = %name, "task did not stop within timeout"),
        }
    }
}

/// Compile a config route into the runtime route
///
/// The sample rate resolves route-first, then the output's own option,
/// then 100 (forward everything).
fn build_route(route: &RouteConfig, output: &OutputConfig) -> Route {
    let sample = route
        .sample_size
        .or_else(|| output.sample_size())
        .unwrap_or(100);
    Route::new(&route.name, &route.input, &route.output)
        .with_fields(route.rules.clone())
        .with_sample(sample)
}

/// Block until SIGINT, SIGTERM, or SIGQUIT
#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut interrupt = signal(SignalKind::interrupt()).expect("failed to install SIGINT handler");
    let mut terminate = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
    let mut quit = signal(SignalKind::quit()).expect("failed to install SIGQUIT handler");

    tokio::select! {
        _ = interrupt.recv() => {}
        _ = terminate.recv() => {}
        _ = quit.recv() => {}
    }
}

/// Block until ctrl-c
#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
