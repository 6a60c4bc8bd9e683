//! TCP output - line-push server
//!
//! Listens on a socket and pushes one newline-terminated line per event to
//! every connected client: `"<source> <text>\n"`. Each client is its own
//! subscriber on the buffer, so a stalled client drops only its own
//! events.

use std::sync::Arc;

use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;

use crate::common::{run_unrouted, Binding, OutputMetrics};
use crate::{OutputError, Result};

/// TCP output configuration
#[derive(Debug, Clone)]
pub struct TcpConfig {
    /// Listen address, `<addr:port>`
    pub host: String,
}

/// Line-push TCP server output
pub struct TcpOutput {
    name: String,
    config: TcpConfig,
    binding: Option<Binding>,
    metrics: Arc<OutputMetrics>,
}

impl TcpOutput {
    /// Create a TCP output; `binding` is `None` when no route selected it
    pub fn new(name: impl Into<String>, config: TcpConfig, binding: Option<Binding>) -> Self {
        Self {
            name: name.into(),
            config,
            binding,
            metrics: Arc::new(OutputMetrics::new()),
        }
    }

    /// Shared metrics for this output
    pub fn metrics(&self) -> Arc<OutputMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Listen and serve until cancelled
    pub async fn run(self, cancel: CancellationToken) -> Result<()> {
        let Some(binding) = self.binding else {
            run_unrouted(&self.name, "tcp", cancel).await;
            return Ok(());
        };

        let listener =
            TcpListener::bind(&self.config.host)
                .await
                .map_err(|e| OutputError::Bind {
                    address: self.config.host.clone(),
                    source: e,
                })?;

        tracing::info!(
            output = %self.name,
            address = %self.config.host,
            input = %binding.route.input,
            "tcp output listening"
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                result = listener.accept() => match result {
                    Ok((stream, peer)) => {
                        let binding = binding.clone();
                        let name = self.name.clone();
                        let metrics = Arc::clone(&self.metrics);
                        let cancel = cancel.clone();
                        tokio::spawn(async move {
                            serve_client(name, binding, stream, peer.to_string(), metrics, cancel)
                                .await;
                        });
                    }
                    Err(e) => {
                        tracing::warn!(output = %self.name, error = %e, "accept error");
                        self.metrics.error();
                    }
                },
            }
        }

        tracing::info!(output = %self.name, "tcp output stopped");
        Ok(())
    }
}

/// Subscribe one client and stream events to it until it goes away
async fn serve_client(
    output: String,
    binding: Binding,
    mut stream: TcpStream,
    peer: String,
    metrics: Arc<OutputMetrics>,
    cancel: CancellationToken,
) {
    tracing::info!(output = %output, peer = %peer, "accepting tcp connection");

    let subscriber = format!("{output}/{peer}");
    let mut rx = match binding.subscribe(&subscriber).await {
        Ok(rx) => rx,
        Err(e) => {
            metrics.error();
            tracing::warn!(output = %output, peer = %peer, error = %e, "subscribe failed");
            return;
        }
    };

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            event = rx.recv() => {
                let Some(event) = event else { break };
                metrics.event_received();

                if !binding.accepts(&event) {
                    metrics.event_filtered();
                    continue;
                }
                let Some(payload) = event.text_or_json() else {
                    metrics.event_filtered();
                    continue;
                };

                let line = format!("{} {}\n", event.source, payload);
                if let Err(e) = stream.write_all(line.as_bytes()).await {
                    metrics.error();
                    tracing::debug!(output = %output, peer = %peer, error = %e, "client write failed");
                    break;
                }
                metrics.event_written();
            }
        }
    }

    binding.unsubscribe(&subscriber).await;
    tracing::info!(output = %output, peer = %peer, "closing tcp connection");
}
